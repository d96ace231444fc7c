//! Access to the account Claude Code is currently logged in as.
//!
//! Two files owned by Claude Code make up the active state:
//! - the credentials file, which ccrotate replaces wholesale with a saved
//!   document, and
//! - the config file, where only `userId` and `oauthAccount` belong to us.
//!   Everything else in it is merged through untouched.
//!
//! Each file is replaced atomically on its own. The pair is not a single
//! transaction: a crash between the two renames can leave them describing
//! different accounts.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Result, RotateError};
use crate::fs_utils::{atomic_write, read_optional, remove_if_exists};
use crate::paths::Paths;
use crate::profile::{OAuthAccount, OAuthCredentials, Profile};

const USER_ID_KEY: &str = "userId";
const OAUTH_ACCOUNT_KEY: &str = "oauthAccount";

/// The logged-in account as read from Claude's files
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAccount {
    pub email: String,
    /// The whole credentials document
    pub credentials: Value,
    pub tokens: OAuthCredentials,
    pub user_id: Option<Value>,
    /// The config's `oauthAccount` entry, unparsed
    pub oauth_account: Value,
}

impl ActiveAccount {
    /// Does `profile` still hold exactly these tokens and identity?
    pub fn matches(&self, profile: &Profile) -> bool {
        profile.credentials.as_ref() == Some(&self.credentials)
            && profile.oauth_account.as_ref() == Some(&self.oauth_account)
    }
}

/// Raw bytes of both active-state files; `None` means the file was absent
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub credentials: Option<Vec<u8>>,
    pub config: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ActiveState {
    credentials_path: PathBuf,
    config_path: PathBuf,
}

impl ActiveState {
    pub fn new(paths: &Paths) -> Self {
        Self {
            credentials_path: paths.credentials_file.clone(),
            config_path: paths.claude_config.clone(),
        }
    }

    /// Read the current account.
    ///
    /// Fails with `NoActiveAccount` / `NoActiveConfig` when a file is absent
    /// and `MalformedActiveAccount` when either cannot be understood.
    pub fn read(&self) -> Result<ActiveAccount> {
        let creds_bytes =
            read_optional(&self.credentials_path)?.ok_or_else(|| RotateError::NoActiveAccount {
                path: self.credentials_path.clone(),
            })?;
        let config_bytes =
            read_optional(&self.config_path)?.ok_or_else(|| RotateError::NoActiveConfig {
                path: self.config_path.clone(),
            })?;

        let credentials: Value = serde_json::from_slice(&creds_bytes).map_err(|e| {
            malformed(format!("unreadable {}: {e}", self.credentials_path.display()))
        })?;
        let tokens = OAuthCredentials::from_file(&credentials)
            .ok_or_else(|| malformed("credentials file has no usable claudeAiOauth entry"))?;

        let mut config = parse_config(&config_bytes, &self.config_path)?;
        let oauth_account = config
            .remove(OAUTH_ACCOUNT_KEY)
            .filter(|v| !v.is_null())
            .ok_or_else(|| malformed("no OAuth account information found in Claude config"))?;
        let account = OAuthAccount::from_value(&oauth_account)
            .ok_or_else(|| malformed("unreadable oauthAccount"))?;
        if account.email().is_empty() {
            return Err(malformed("oauthAccount has no emailAddress"));
        }

        let user_id = config.remove(USER_ID_KEY).filter(|v| !v.is_null());

        Ok(ActiveAccount {
            email: account.email().to_string(),
            credentials,
            tokens,
            user_id,
            oauth_account,
        })
    }

    /// Best-effort current email; any failure just means "unknown"
    pub fn current_email(&self) -> Option<String> {
        match self.read() {
            Ok(account) => Some(account.email),
            Err(e) => {
                debug!(error = %e, "active account unavailable");
                None
            }
        }
    }

    /// Make `profile` the live account.
    ///
    /// The credentials file is replaced with the saved document; the config
    /// keeps its existing keys with `userId` and `oauthAccount` overwritten.
    pub fn write(&self, email: &str, profile: &Profile) -> Result<()> {
        let complete = profile.require_complete(email)?;

        let existing = read_optional(&self.config_path)?;
        let mut config = match existing {
            Some(bytes) => parse_config(&bytes, &self.config_path)?,
            None => Map::new(),
        };
        match &profile.user_id {
            Some(id) => {
                config.insert(USER_ID_KEY.to_string(), id.clone());
            }
            None => {
                config.shift_remove(USER_ID_KEY);
            }
        }
        config.insert(
            OAUTH_ACCOUNT_KEY.to_string(),
            complete.oauth_account.clone(),
        );

        let creds_json = serde_json::to_vec_pretty(complete.credentials).map_err(|source| {
            RotateError::Serialize {
                what: "credentials",
                source,
            }
        })?;
        let config_json = serde_json::to_vec_pretty(&Value::Object(config)).map_err(|source| {
            RotateError::Serialize {
                what: "Claude config",
                source,
            }
        })?;

        atomic_write(&self.credentials_path, &creds_json)?;
        atomic_write(&self.config_path, &config_json)?;
        info!(%email, "activated account");
        Ok(())
    }

    /// Snapshot both files byte-for-byte
    pub fn backup(&self) -> Result<Backup> {
        Ok(Backup {
            credentials: read_optional(&self.credentials_path)?,
            config: read_optional(&self.config_path)?,
        })
    }

    /// Put both files back exactly as captured, deleting any that were absent
    pub fn restore(&self, backup: &Backup) -> Result<()> {
        restore_file(&self.credentials_path, backup.credentials.as_deref())?;
        restore_file(&self.config_path, backup.config.as_deref())?;
        info!("restored active account files from backup");
        Ok(())
    }
}

fn restore_file(path: &Path, contents: Option<&[u8]>) -> Result<()> {
    match contents {
        Some(bytes) => atomic_write(path, bytes),
        None => remove_if_exists(path),
    }
}

fn parse_config(bytes: &[u8], path: &Path) -> Result<Map<String, Value>> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(malformed(format!("{} is not a JSON object", path.display()))),
        Err(e) => Err(malformed(format!("unreadable {}: {e}", path.display()))),
    }
}

fn malformed(reason: impl Into<String>) -> RotateError {
    RotateError::MalformedActiveAccount {
        reason: reason.into(),
    }
}
