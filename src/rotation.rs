//! Round-robin rotation to the next saved account.

use tracing::{info, warn};

use crate::active::ActiveState;
use crate::error::{Result, RotateError};
use crate::paths::Paths;
use crate::store::Store;
use crate::switch::{snapshot_quietly, switch_to};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    Switched { from: Option<String>, to: String },
    /// Only one saved account, nothing to rotate to
    SingleAccount { email: String },
}

/// The profile after `current` in store order, wrapping to the first.
/// An unknown or absent current account starts from the first entry.
pub fn next_target<'a>(emails: &'a [String], current: Option<&str>) -> Option<&'a str> {
    let first = emails.first()?;
    let next = current
        .and_then(|cur| emails.iter().position(|e| e == cur))
        .map(|idx| &emails[(idx + 1) % emails.len()])
        .unwrap_or(first);
    Some(next.as_str())
}

/// Save the live account, then switch to the next saved one
pub fn next(paths: &Paths) -> Result<RotateOutcome> {
    if let Err(e) = snapshot_quietly(paths) {
        warn!(error = %e, "could not save current account before rotating");
    }

    let emails: Vec<String> = Store::new(paths).load()?.keys().cloned().collect();
    match emails.as_slice() {
        [] => return Err(RotateError::NoSavedAccounts),
        [only] => {
            return Ok(RotateOutcome::SingleAccount {
                email: only.clone(),
            });
        }
        _ => {}
    }

    let current = ActiveState::new(paths).current_email();
    let Some(target) = next_target(&emails, current.as_deref()) else {
        return Err(RotateError::NoSavedAccounts);
    };
    let target = target.to_string();

    info!(from = current.as_deref().unwrap_or("unknown"), to = %target, "rotating account");
    switch_to(paths, &target)?;
    Ok(RotateOutcome::Switched {
        from: current,
        to: target,
    })
}
