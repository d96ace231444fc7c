//! Moving accounts between the profile store and Claude's active files.
//!
//! - [`snapshot`] captures the live account into the store.
//! - [`switch_to`] makes a saved profile live.
//! - [`remove`] drops a saved profile.

use chrono::Utc;
use tracing::info;

use crate::active::ActiveState;
use crate::error::{Result, RotateError};
use crate::paths::Paths;
use crate::profile::Profile;
use crate::store::Store;
use crate::ui::Confirmer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapOutcome {
    Saved { email: String, replaced: bool },
    Declined { email: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { email: String },
    Declined { email: String },
}

/// Save the live account, asking before replacing an existing entry unless `force`
pub fn snapshot(paths: &Paths, force: bool, confirmer: &dyn Confirmer) -> Result<SnapOutcome> {
    let account = ActiveState::new(paths).read()?;
    let store = Store::new(paths);
    let mut profiles = store.load()?;

    let replaced = profiles.contains_key(&account.email);
    if replaced
        && !force
        && !confirmer.confirm(&format!(
            "Account {} already exists. Overwrite?",
            account.email
        ))
    {
        return Ok(SnapOutcome::Declined {
            email: account.email,
        });
    }

    let email = account.email.clone();
    let profile = Profile {
        credentials: Some(account.credentials),
        user_id: account.user_id,
        oauth_account: Some(account.oauth_account),
        last_used: Some(Utc::now()),
    };
    // insert keeps an existing key's rotation slot
    profiles.insert(email.clone(), profile);
    store.save(&profiles)?;

    info!(%email, replaced, "saved active account");
    Ok(SnapOutcome::Saved { email, replaced })
}

/// Forced snapshot that callers treat as optional groundwork
pub fn snapshot_quietly(paths: &Paths) -> Result<String> {
    match snapshot(paths, true, &crate::ui::AssumeYes)? {
        SnapOutcome::Saved { email, .. } | SnapOutcome::Declined { email } => Ok(email),
    }
}

/// Activate a saved profile and stamp its `lastUsed`.
///
/// Claude's files are written before the store so an interruption can only
/// leave `lastUsed` stale.
pub fn switch_to(paths: &Paths, email: &str) -> Result<()> {
    let store = Store::new(paths);
    let mut profiles = store.load()?;
    let profile = profiles
        .get_mut(email)
        .ok_or_else(|| RotateError::ProfileNotFound {
            email: email.to_string(),
        })?;

    ActiveState::new(paths).write(email, profile)?;

    profile.last_used = Some(Utc::now());
    store.save(&profiles)
}

/// Delete a saved profile after confirmation
pub fn remove(paths: &Paths, email: &str, confirmer: &dyn Confirmer) -> Result<RemoveOutcome> {
    let store = Store::new(paths);
    let mut profiles = store.load()?;
    if !profiles.contains_key(email) {
        return Err(RotateError::ProfileNotFound {
            email: email.to_string(),
        });
    }

    if !confirmer.confirm(&format!("Are you sure you want to remove account {email}?")) {
        return Ok(RemoveOutcome::Declined {
            email: email.to_string(),
        });
    }

    profiles.shift_remove(email);
    store.save(&profiles)?;
    info!(%email, "removed account");
    Ok(RemoveOutcome::Removed {
        email: email.to_string(),
    })
}
