//! Running `claude` once against the active account.
//!
//! The child's stdout and stderr are drained concurrently while a timer runs;
//! on timeout the child is killed. Only one probe runs at a time.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::Result;
use crate::locate::ExecutableLocator;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
pub const PROBE_PROMPT: &str = "Reply with just the word OK.";
pub const PROBE_MODEL: &str = "haiku";
/// Response text kept per account
pub const RESPONSE_LIMIT: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub response: String,
}

impl ProbeOutcome {
    pub fn success(response: impl AsRef<str>) -> Self {
        Self {
            status: ProbeStatus::Success,
            response: truncate_chars(response.as_ref(), RESPONSE_LIMIT),
        }
    }

    pub fn error(response: impl AsRef<str>) -> Self {
        Self {
            status: ProbeStatus::Error,
            response: truncate_chars(response.as_ref(), RESPONSE_LIMIT),
        }
    }
}

/// Exercises whichever account is currently active.
///
/// `Err` means probing as a whole cannot proceed (e.g. no executable);
/// a failed call for this account is an `Ok` with [`ProbeStatus::Error`].
pub trait Prober {
    fn probe(&mut self, email: &str) -> Result<ProbeOutcome>;
}

/// Probes by running `claude -p <prompt> --model <model>`
pub struct ClaudeProbe<L> {
    locator: L,
    executable: Option<PathBuf>,
    timeout: Duration,
}

impl<L: ExecutableLocator> ClaudeProbe<L> {
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            executable: None,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolved on first use, then reused
    fn executable(&mut self) -> Result<PathBuf> {
        if let Some(path) = &self.executable {
            return Ok(path.clone());
        }
        let path = self.locator.find_executable()?;
        self.executable = Some(path.clone());
        Ok(path)
    }
}

impl<L: ExecutableLocator> Prober for ClaudeProbe<L> {
    fn probe(&mut self, email: &str) -> Result<ProbeOutcome> {
        let timeout = self.timeout;
        let program = self.executable()?;
        debug!(%email, program = %program.display(), "probing account");
        Ok(run_command(
            &program,
            &["-p", PROBE_PROMPT, "--model", PROBE_MODEL],
            timeout,
        ))
    }
}

/// Run `program` to completion or until `timeout`, classifying the result.
///
/// Success means exit status 0 with non-empty stdout.
pub fn run_command(program: &Path, args: &[&str], timeout: Duration) -> ProbeOutcome {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return ProbeOutcome::error(format!("Failed to start runtime: {e}")),
    };

    runtime.block_on(async {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => return ProbeOutcome::error(format!("Failed to run {}: {e}", program.display())),
        };

        // dropping the child on timeout kills it
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ProbeOutcome::error(format!("Failed to wait for claude: {e}")),
            Err(_) => {
                return ProbeOutcome::error(format!(
                    "Timed out after {}s",
                    timeout.as_secs_f32()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() && !stdout.is_empty() {
            return ProbeOutcome::success(stdout);
        }
        if !output.status.success() {
            let detail = [stderr, stdout]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or_else(|| format!("claude exited with {}", output.status));
            return ProbeOutcome::error(detail);
        }
        ProbeOutcome::error("Empty response")
    })
}

/// First `limit` characters of `text`, never splitting a char
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RotateError;
    use std::time::Instant;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(ProbeOutcome::success("x".repeat(400)).response.len(), RESPONSE_LIMIT);
    }

    #[cfg(unix)]
    #[test]
    fn test_success_needs_output() {
        let sh = Path::new("/bin/sh");
        let ok = run_command(sh, &["-c", "echo '  OK  '"], Duration::from_secs(5));
        assert_eq!(ok, ProbeOutcome::success("OK"));

        let silent = run_command(sh, &["-c", "true"], Duration::from_secs(5));
        assert_eq!(silent.status, ProbeStatus::Error);
        assert_eq!(silent.response, "Empty response");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let outcome = run_command(
            Path::new("/bin/sh"),
            &["-c", "echo partial; echo 'OAuth token has expired' >&2; exit 1"],
            Duration::from_secs(5),
        );
        assert_eq!(outcome.status, ProbeStatus::Error);
        assert_eq!(outcome.response, "OAuth token has expired");

        let bare = run_command(Path::new("/bin/sh"), &["-c", "exit 3"], Duration::from_secs(5));
        assert_eq!(bare.status, ProbeStatus::Error);
        assert!(bare.response.contains('3'));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let started = Instant::now();
        let outcome = run_command(
            Path::new("/bin/sh"),
            &["-c", "sleep 30"],
            Duration::from_millis(200),
        );
        assert_eq!(outcome.status, ProbeStatus::Error);
        assert!(outcome.response.starts_with("Timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_spawn_failure() {
        let outcome = run_command(
            Path::new("/definitely/not/here/claude"),
            &[],
            Duration::from_secs(1),
        );
        assert_eq!(outcome.status, ProbeStatus::Error);
        assert!(outcome.response.starts_with("Failed to run"));
    }

    struct Missing;

    impl ExecutableLocator for Missing {
        fn find_executable(&self) -> Result<PathBuf> {
            Err(RotateError::ExecutableNotFound {
                tried: "nowhere".into(),
                env_var: "X",
            })
        }
    }

    /// Hands out a fixed path and counts lookups
    struct Fixed {
        path: PathBuf,
        lookups: std::cell::Cell<usize>,
    }

    impl ExecutableLocator for Fixed {
        fn find_executable(&self) -> Result<PathBuf> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self.path.clone())
        }
    }

    #[cfg(unix)]
    fn fake_claude(dir: &tempfile::TempDir, body: &str) -> Fixed {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Fixed {
            path,
            lookups: std::cell::Cell::new(0),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_claude_probe_runs_located_executable() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut probe = ClaudeProbe::new(fake_claude(&dir, r#"echo "OK $3 $4""#));

        let first = probe.probe("a@example.com").unwrap();
        assert_eq!(first, ProbeOutcome::success("OK --model haiku"));
        probe.probe("b@example.com").unwrap();
        assert_eq!(probe.locator.lookups.get(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_claude_probe_honours_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut probe = ClaudeProbe::new(fake_claude(&dir, "sleep 30"))
            .with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let outcome = probe.probe("a@example.com").unwrap();
        assert_eq!(outcome.status, ProbeStatus::Error);
        assert!(outcome.response.starts_with("Timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_missing_executable_is_fatal() {
        let mut probe = ClaudeProbe::new(Missing);
        assert!(matches!(
            probe.probe("a@example.com").unwrap_err(),
            RotateError::ExecutableNotFound { .. }
        ));
    }
}
