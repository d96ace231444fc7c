//! Where ccrotate and Claude Code keep their files.

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Overrides the ccrotate store directory
pub const HOME_ENV: &str = "CCROTATE_HOME";
/// Claude Code's own override for where it keeps credentials and config
pub const CLAUDE_CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// All computed paths used by ccrotate
#[derive(Debug, Clone)]
pub struct Paths {
    /// The user's home directory
    pub home_dir: PathBuf,
    /// ~/.ccrotate
    pub base_dir: PathBuf,
    /// ~/.ccrotate/profiles.json
    pub profiles_file: PathBuf,
    /// ~/.claude
    pub claude_dir: PathBuf,
    /// ~/.claude/.credentials.json
    pub credentials_file: PathBuf,
    /// ~/.claude.json
    pub claude_config: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        Ok(Self::from_home(base_dirs.home_dir(), |key| {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        }))
    }

    /// Build paths under an explicit home, reading overrides through `lookup`
    pub fn from_home(home: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_dir = lookup(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".ccrotate"));
        let profiles_file = base_dir.join("profiles.json");

        let (claude_dir, claude_config) = match lookup(CLAUDE_CONFIG_DIR_ENV) {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                let config = dir.join(".claude.json");
                (dir, config)
            }
            None => (home.join(".claude"), home.join(".claude.json")),
        };
        let credentials_file = claude_dir.join(".credentials.json");

        Self {
            home_dir: home.to_path_buf(),
            base_dir,
            profiles_file,
            claude_dir,
            credentials_file,
            claude_config,
        }
    }
}
