//! `ccrotate doctor`: checks the setup for common issues.
//!
//! - the store directory and whether the store parses
//! - profiles missing credentials or account data
//! - whether Claude's active account can be read
//! - whether the `claude` executable can be found

use anstyle::AnsiColor;

use crate::active::ActiveState;
use crate::error::RotateError;
use crate::locate::ExecutableLocator;
use crate::paths::Paths;
use crate::store::Store;
use crate::ui::Ui;

/// Run every check; true when none reported a problem
pub fn run_doctor(paths: &Paths, ui: &Ui, locator: &dyn ExecutableLocator) -> bool {
    ui.section("ccrotate Doctor");
    ui.newline();

    let mut healthy = true;

    healthy &= check_step(ui, "Directories", || {
        if paths.base_dir.exists() {
            ui.println(format!(
                "  {} Store directory exists: {}",
                ui.icon_ok(),
                paths.base_dir.display()
            ));
        } else {
            // created on first snap
            ui.println(format!(
                "  {} Store directory missing: {}",
                ui.icon_warn(),
                paths.base_dir.display()
            ));
        }

        if paths.claude_dir.exists() {
            ui.println(format!(
                "  {} Claude directory exists: {}",
                ui.icon_ok(),
                paths.claude_dir.display()
            ));
        } else {
            ui.println(format!(
                "  {} Claude directory missing: {}",
                ui.icon_warn(),
                paths.claude_dir.display()
            ));
        }
        true
    });

    healthy &= check_step(ui, "Saved Accounts", || {
        let store = Store::new(paths);
        let profiles = match store.load() {
            Ok(profiles) => profiles,
            Err(e) => {
                ui.println(format!("  {} {}", ui.icon_err(), e));
                return false;
            }
        };

        if profiles.is_empty() {
            ui.println(format!("  {} No saved accounts", ui.icon_warn()));
            return true;
        }

        ui.println(format!("  Found {} accounts:", profiles.len()));
        let mut all_complete = true;
        for (email, profile) in &profiles {
            match profile.require_complete(email) {
                Ok(_) => ui.println(format!("    {} {}", ui.icon_ok(), email)),
                Err(RotateError::IncompleteProfile { missing, .. }) => {
                    ui.println(format!(
                        "    {} {} (missing {})",
                        ui.icon_err(),
                        email,
                        missing
                    ));
                    all_complete = false;
                }
                Err(e) => {
                    ui.println(format!("    {} {} ({})", ui.icon_err(), email, e));
                    all_complete = false;
                }
            }
        }
        all_complete
    });

    healthy &= check_step(ui, "Active Account", || {
        match ActiveState::new(paths).read() {
            Ok(account) => {
                ui.println(format!("  {} Active account: {}", ui.icon_ok(), account.email));
                true
            }
            Err(e @ (RotateError::NoActiveAccount { .. } | RotateError::NoActiveConfig { .. })) => {
                ui.println(format!("  {} {}", ui.icon_warn(), e));
                true
            }
            Err(e) => {
                ui.println(format!("  {} {}", ui.icon_err(), e));
                false
            }
        }
    });

    healthy &= check_step(ui, "Claude Executable", || match locator.find_executable() {
        Ok(path) => {
            ui.println(format!("  {} Found: {}", ui.icon_ok(), path.display()));
            true
        }
        Err(e) => {
            ui.println(format!("  {} {}", ui.icon_err(), e));
            false
        }
    });

    healthy
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_profile, sample_profiles, seed_active, setup_test_paths};
    use crate::ui::ColorMode;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Found;

    impl ExecutableLocator for Found {
        fn find_executable(&self) -> crate::error::Result<PathBuf> {
            Ok(PathBuf::from("/usr/local/bin/claude"))
        }
    }

    struct Missing;

    impl ExecutableLocator for Missing {
        fn find_executable(&self) -> crate::error::Result<PathBuf> {
            Err(RotateError::ExecutableNotFound {
                tried: "PATH".into(),
                env_var: "CCROTATE_CLAUDE_BIN",
            })
        }
    }

    #[test]
    fn test_fresh_install_is_healthy() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = Ui::new(ColorMode::Never, false);

        assert!(run_doctor(&paths, &ui, &Found));
    }

    #[test]
    fn test_flags_incomplete_profile() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = Ui::new(ColorMode::Never, false);
        let mut profiles = sample_profiles(&["a@x.io"]);
        profiles["a@x.io"].credentials = None;
        Store::new(&paths).save(&profiles).unwrap();
        seed_active(&paths, &sample_profile("a@x.io", "a"));

        assert!(!run_doctor(&paths, &ui, &Found));
    }

    #[test]
    fn test_missing_executable() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = Ui::new(ColorMode::Never, false);

        assert!(!run_doctor(&paths, &ui, &Missing));
    }
}
