//! Typed errors for the ccrotate core.
//!
//! Library modules return [`Result`]; the command layer wraps these in
//! `anyhow` for display.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RotateError>;

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("No active Claude account found ({}). Please login with claude first.", path.display())]
    NoActiveAccount { path: PathBuf },

    #[error("Claude config file not found ({}). Please login with claude first.", path.display())]
    NoActiveConfig { path: PathBuf },

    #[error("Active Claude account is malformed: {reason}")]
    MalformedActiveAccount { reason: String },

    #[error("Failed to parse profile store {}: {source}", path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Account {email} not found. Run 'ccrotate list' to see available accounts.")]
    ProfileNotFound { email: String },

    #[error("No saved accounts found. Please add accounts first using `ccrotate snap`.")]
    NoSavedAccounts,

    #[error("Profile for {email} is incomplete: missing {missing}")]
    IncompleteProfile { email: String, missing: &'static str },

    #[error("Invalid export data: {0}")]
    MalformedBlob(String),

    #[error("Integrity check failed (expected {expected}): {detail}")]
    IntegrityMismatch { expected: String, detail: String },

    #[error(
        "Could not locate the claude executable (tried: {tried}).\nHint: install Claude Code or set {env_var} to its path."
    )]
    ExecutableNotFound {
        tried: String,
        env_var: &'static str,
    },

    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode export data: {0}")]
    Encode(String),
}

impl RotateError {
    /// True for the failures that only mean "current identity is unknown".
    pub fn is_identity_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NoActiveAccount { .. }
                | Self::NoActiveConfig { .. }
                | Self::MalformedActiveAccount { .. }
        )
    }

    pub(crate) fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}
