//! Finding the `claude` executable.
//!
//! Each [`LocateStrategy`] either finds a path or doesn't; a [`StrategyChain`]
//! tries them in order and stops at the first hit.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, RotateError};
use crate::paths::Paths;

pub const EXECUTABLE_NAME: &str = "claude";
/// Explicit path to the claude executable
pub const EXECUTABLE_ENV: &str = "CCROTATE_CLAUDE_BIN";

pub trait ExecutableLocator {
    fn find_executable(&self) -> Result<PathBuf>;
}

pub trait LocateStrategy {
    fn name(&self) -> &'static str;
    fn locate(&self) -> Option<PathBuf>;
}

/// Fixed install locations used by the Claude Code installers
pub struct WellKnownPaths {
    candidates: Vec<PathBuf>,
}

impl WellKnownPaths {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn for_home(home: &Path) -> Self {
        Self::new(vec![
            home.join(".claude/local/claude"),
            home.join(".local/bin/claude"),
            home.join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from("/opt/homebrew/bin/claude"),
        ])
    }
}

impl LocateStrategy for WellKnownPaths {
    fn name(&self) -> &'static str {
        "install paths"
    }

    fn locate(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| is_executable(p)).cloned()
    }
}

/// Directories listed in `PATH`
pub struct SearchPath {
    path_var: Option<OsString>,
}

impl SearchPath {
    pub fn from_env() -> Self {
        Self {
            path_var: std::env::var_os("PATH"),
        }
    }
}

impl LocateStrategy for SearchPath {
    fn name(&self) -> &'static str {
        "PATH"
    }

    fn locate(&self) -> Option<PathBuf> {
        let path_var = self.path_var.as_ref()?;
        std::env::split_paths(path_var)
            .map(|dir| dir.join(EXECUTABLE_NAME))
            .find(|candidate| is_executable(candidate))
    }
}

/// `alias claude` as defined in the user's interactive shell
pub struct ShellAlias {
    shell: Option<PathBuf>,
    home: PathBuf,
}

impl ShellAlias {
    pub fn from_env(home: &Path) -> Self {
        Self {
            shell: std::env::var_os("SHELL").map(PathBuf::from),
            home: home.to_path_buf(),
        }
    }
}

impl LocateStrategy for ShellAlias {
    fn name(&self) -> &'static str {
        "shell alias"
    }

    fn locate(&self) -> Option<PathBuf> {
        let shell = self.shell.as_ref()?;
        let output = Command::new(shell)
            .args(["-i", "-c", &format!("alias {EXECUTABLE_NAME}")])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        parse_alias_output(&text, &self.home).filter(|p| is_executable(p))
    }
}

/// Explicit override from an environment variable
pub struct EnvOverride {
    var: &'static str,
}

impl EnvOverride {
    pub fn new(var: &'static str) -> Self {
        Self { var }
    }
}

impl LocateStrategy for EnvOverride {
    fn name(&self) -> &'static str {
        "environment override"
    }

    fn locate(&self) -> Option<PathBuf> {
        std::env::var_os(self.var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .filter(|p| is_executable(p))
    }
}

pub struct StrategyChain {
    strategies: Vec<Box<dyn LocateStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn LocateStrategy>>) -> Self {
        Self { strategies }
    }

    /// install paths, PATH, shell alias, then `CCROTATE_CLAUDE_BIN`
    pub fn standard(paths: &Paths) -> Self {
        Self::new(vec![
            Box::new(WellKnownPaths::for_home(&paths.home_dir)),
            Box::new(SearchPath::from_env()),
            Box::new(ShellAlias::from_env(&paths.home_dir)),
            Box::new(EnvOverride::new(EXECUTABLE_ENV)),
        ])
    }
}

impl ExecutableLocator for StrategyChain {
    fn find_executable(&self) -> Result<PathBuf> {
        for strategy in &self.strategies {
            if let Some(path) = strategy.locate() {
                debug!(strategy = strategy.name(), path = %path.display(), "found claude executable");
                return Ok(path);
            }
            debug!(strategy = strategy.name(), "claude executable not found");
        }

        let tried: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        Err(RotateError::ExecutableNotFound {
            tried: tried.join(", "),
            env_var: EXECUTABLE_ENV,
        })
    }
}

/// Pull the command path out of `alias claude` output.
///
/// Handles bash (`alias claude='/path/claude'`) and zsh (`claude=/path/claude`)
/// formats, and expands a leading `~`.
pub fn parse_alias_output(output: &str, home: &Path) -> Option<PathBuf> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.strip_prefix("alias ").unwrap_or(line);
    let (name, value) = line.split_once('=')?;
    if name.trim() != EXECUTABLE_NAME {
        return None;
    }

    let value = value.trim().trim_matches(|c: char| c == '\'' || c == '"');
    let command = value.split_whitespace().next()?;
    let path = match command.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if command == "~" => return None,
        None => PathBuf::from(command),
    };
    Some(path)
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
