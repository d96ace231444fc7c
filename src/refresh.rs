//! Probing every saved account in turn.
//!
//! Each profile is activated, probed, and checked for drift: if `claude`
//! refreshed its tokens during the probe, the new tokens are written back to
//! the store. Afterwards the originally active account is reactivated from its
//! latest stored version, so a refresh never regresses it to expired tokens.
//! Without a known original account the raw backup is restored instead.
//!
//! Accounts are probed strictly one after another: there is only one active
//! slot.

use tracing::{debug, info, warn};

use crate::active::{ActiveAccount, ActiveState, Backup};
use crate::error::{Result, RotateError};
use crate::paths::Paths;
use crate::probe::{ProbeStatus, Prober, RESPONSE_LIMIT, truncate_chars};
use crate::profile::{Profile, Profiles};
use crate::store::Store;
use crate::switch::snapshot_quietly;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Pending,
    Testing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    pub email: String,
    pub status: AccountStatus,
    pub response: String,
    pub credentials_updated: bool,
}

impl AccountReport {
    fn pending(email: &str) -> Self {
        Self {
            email: email.to_string(),
            status: AccountStatus::Pending,
            response: String::new(),
            credentials_updated: false,
        }
    }

    fn fail(&mut self, message: impl AsRef<str>) {
        self.status = AccountStatus::Error;
        self.response = truncate_chars(message.as_ref(), RESPONSE_LIMIT);
    }
}

/// Observer for per-account progress; nothing here affects the refresh
pub trait RefreshReporter {
    fn begin(&mut self, _reports: &[AccountReport]) {}
    fn update(&mut self, index: usize, report: &AccountReport);
    fn finish(&mut self, _reports: &[AccountReport]) {}
}

/// Probe every saved account and leave the original one active.
///
/// Per-account failures are reported, not returned. An `Err` means the run
/// itself could not continue; the active account is restored either way.
pub fn refresh(
    paths: &Paths,
    prober: &mut dyn Prober,
    reporter: &mut dyn RefreshReporter,
) -> Result<Vec<AccountReport>> {
    if let Err(e) = snapshot_quietly(paths) {
        warn!(error = %e, "could not save current account before refresh");
    }

    let store = Store::new(paths);
    let profiles = store.load()?;
    if profiles.is_empty() {
        return Err(RotateError::NoSavedAccounts);
    }

    let active = ActiveState::new(paths);
    let original_email = active.current_email();
    let backup = active.backup()?;
    debug!(original = ?original_email, "captured active account before refresh");

    let mut reports: Vec<AccountReport> =
        profiles.keys().map(|e| AccountReport::pending(e)).collect();
    reporter.begin(&reports);

    let probed = probe_each(&store, &active, &profiles, prober, reporter, &mut reports);
    let restored = restore_active(&store, &active, original_email.as_deref(), &backup);

    reporter.finish(&reports);
    probed?;
    restored?;
    Ok(reports)
}

fn probe_each(
    store: &Store,
    active: &ActiveState,
    profiles: &Profiles,
    prober: &mut dyn Prober,
    reporter: &mut dyn RefreshReporter,
    reports: &mut [AccountReport],
) -> Result<()> {
    for (index, (email, profile)) in profiles.iter().enumerate() {
        reports[index].status = AccountStatus::Testing;
        reporter.update(index, &reports[index]);

        if let Err(e) = active.write(email, profile) {
            warn!(%email, error = %e, "could not activate account for probing");
            reports[index].fail(e.to_string());
            reporter.update(index, &reports[index]);
            continue;
        }

        let outcome = match prober.probe(email) {
            Ok(outcome) => outcome,
            Err(e) => {
                abandon(reports, index, &e, reporter);
                return Err(e);
            }
        };
        reports[index].status = match outcome.status {
            ProbeStatus::Success => AccountStatus::Success,
            ProbeStatus::Error => AccountStatus::Error,
        };
        reports[index].response = outcome.response;

        if let Some(account) = detect_drift(active, email, profile) {
            if let Err(e) = persist_drift(store, email, &account) {
                abandon(reports, index + 1, &e, reporter);
                return Err(e);
            }
            reports[index].credentials_updated = true;
        }
        reporter.update(index, &reports[index]);
    }
    Ok(())
}

/// The active account, if the probe left it holding different tokens
fn detect_drift(
    active: &ActiveState,
    email: &str,
    profile: &Profile,
) -> Option<ActiveAccount> {
    let account = match active.read() {
        Ok(account) => account,
        Err(e) => {
            warn!(%email, error = %e, "could not re-read active account after probe");
            return None;
        }
    };
    if account.email != email {
        warn!(%email, found = %account.email, "active account changed identity during probe");
        return None;
    }
    (!account.matches(profile)).then_some(account)
}

fn persist_drift(store: &Store, email: &str, account: &ActiveAccount) -> Result<()> {
    store.update(|profiles| {
        if let Some(saved) = profiles.get_mut(email) {
            saved.credentials = Some(account.credentials.clone());
            saved.oauth_account = Some(account.oauth_account.clone());
            if account.user_id.is_some() {
                saved.user_id = account.user_id.clone();
            }
        }
        Ok(())
    })?;
    info!(%email, "stored refreshed credentials");
    Ok(())
}

/// Mark `reports[from..]` as failed after a run-ending error
fn abandon(
    reports: &mut [AccountReport],
    from: usize,
    error: &RotateError,
    reporter: &mut dyn RefreshReporter,
) {
    for (index, report) in reports.iter_mut().enumerate().skip(from) {
        report.fail(error.to_string());
        reporter.update(index, report);
    }
}

fn restore_active(
    store: &Store,
    active: &ActiveState,
    original_email: Option<&str>,
    backup: &Backup,
) -> Result<()> {
    let Some(email) = original_email else {
        return active.restore(backup);
    };

    let latest = match store.load() {
        Ok(mut profiles) => profiles.shift_remove(email),
        Err(e) => {
            warn!(error = %e, "could not reload profiles for restore");
            None
        }
    };
    let Some(profile) = latest else {
        return active.restore(backup);
    };

    if let Err(e) = active.write(email, &profile) {
        warn!(%email, error = %e, "could not reactivate original account, restoring backup");
        active.restore(backup)?;
        return Err(e);
    }
    info!(%email, "reactivated original account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::test_utils::{sample_profile, sample_profiles, seed_active, setup_test_paths};
    use std::fs;
    use tempfile::TempDir;

    /// Records which account was live at each probe and runs a per-call hook
    struct ScriptedProbe<'a> {
        paths: Paths,
        seen: Vec<Option<String>>,
        hook: Box<dyn FnMut(&Paths, &str) -> Result<ProbeOutcome> + 'a>,
    }

    impl<'a> ScriptedProbe<'a> {
        fn new(
            paths: &Paths,
            hook: impl FnMut(&Paths, &str) -> Result<ProbeOutcome> + 'a,
        ) -> Self {
            Self {
                paths: paths.clone(),
                seen: Vec::new(),
                hook: Box::new(hook),
            }
        }
    }

    impl Prober for ScriptedProbe<'_> {
        fn probe(&mut self, email: &str) -> Result<ProbeOutcome> {
            self.seen
                .push(ActiveState::new(&self.paths).current_email());
            (self.hook)(&self.paths, email)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<(usize, AccountStatus)>,
        finished: Option<Vec<AccountReport>>,
    }

    impl RefreshReporter for Recorder {
        fn update(&mut self, index: usize, report: &AccountReport) {
            self.events.push((index, report.status));
        }

        fn finish(&mut self, reports: &[AccountReport]) {
            self.finished = Some(reports.to_vec());
        }
    }

    /// Simulates `claude` rotating its own tokens while it runs
    fn rotate_tokens(paths: &Paths, email: &str, token: &str) {
        let mut refreshed = sample_profile(email, token);
        refreshed.last_used = None;
        let creds = serde_json::to_vec(refreshed.credentials.as_ref().unwrap()).unwrap();
        fs::write(&paths.credentials_file, creds).unwrap();
    }

    fn active_token(paths: &Paths) -> String {
        let account = ActiveState::new(paths).read().unwrap();
        account.tokens.access_token.unwrap()
    }

    #[test]
    fn test_empty_store_fails_without_probing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let mut calls = 0;
        let mut probe = ScriptedProbe::new(&paths, |_, _| {
            calls += 1;
            Ok(ProbeOutcome::success("OK"))
        });

        let err = refresh(&paths, &mut probe, &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, RotateError::NoSavedAccounts));
        drop(probe);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_each_account_is_live_while_probed_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        Store::new(&paths)
            .save(&sample_profiles(&["c@x.io", "a@x.io", "b@x.io"]))
            .unwrap();
        seed_active(&paths, &sample_profile("a@x.io", "a@x.io"));

        let mut probe = ScriptedProbe::new(&paths, |_, _| Ok(ProbeOutcome::success("OK")));
        let mut recorder = Recorder::default();
        let reports = refresh(&paths, &mut probe, &mut recorder).unwrap();

        assert_eq!(
            probe.seen,
            vec![
                Some("c@x.io".to_string()),
                Some("a@x.io".to_string()),
                Some("b@x.io".to_string())
            ]
        );
        assert!(reports.iter().all(|r| r.status == AccountStatus::Success));
        assert!(reports.iter().all(|r| !r.credentials_updated));
        assert_eq!(
            &recorder.events[..2],
            &[(0, AccountStatus::Testing), (0, AccountStatus::Success)]
        );
        assert_eq!(recorder.finished.unwrap().len(), 3);
        assert_eq!(
            ActiveState::new(&paths).current_email().as_deref(),
            Some("a@x.io")
        );
    }

    #[test]
    fn test_drift_is_stored_and_original_restored_with_new_tokens() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let store = Store::new(&paths);
        store.save(&sample_profiles(&["a@x.io", "b@x.io"])).unwrap();
        seed_active(&paths, &sample_profile("a@x.io", "a@x.io"));

        let mut probe = ScriptedProbe::new(&paths, |paths, email| {
            if email == "a@x.io" {
                rotate_tokens(paths, email, "fresh");
            }
            Ok(ProbeOutcome::success("OK"))
        });
        let reports = refresh(&paths, &mut probe, &mut Recorder::default()).unwrap();

        assert!(reports[0].credentials_updated);
        assert!(!reports[1].credentials_updated);

        let saved = store.load().unwrap();
        assert_eq!(
            saved["a@x.io"].oauth_credentials().unwrap().access_token.as_deref(),
            Some("sk-ant-oat01-fresh")
        );
        assert_eq!(active_token(&paths), "sk-ant-oat01-fresh");
    }

    #[test]
    fn test_probe_errors_do_not_stop_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        Store::new(&paths)
            .save(&sample_profiles(&["a@x.io", "b@x.io", "c@x.io"]))
            .unwrap();
        seed_active(&paths, &sample_profile("c@x.io", "c@x.io"));

        let mut probe = ScriptedProbe::new(&paths, |_, email| {
            Ok(if email == "b@x.io" {
                ProbeOutcome::error("Timed out after 30s")
            } else {
                ProbeOutcome::success("OK")
            })
        });
        let reports = refresh(&paths, &mut probe, &mut Recorder::default()).unwrap();

        let statuses: Vec<AccountStatus> = reports.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [AccountStatus::Success, AccountStatus::Error, AccountStatus::Success]
        );
        assert_eq!(reports[1].response, "Timed out after 30s");
        assert_eq!(
            ActiveState::new(&paths).current_email().as_deref(),
            Some("c@x.io")
        );
    }

    #[test]
    fn test_unknown_original_restores_raw_backup() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        Store::new(&paths)
            .save(&sample_profiles(&["a@x.io", "b@x.io"]))
            .unwrap();
        fs::write(&paths.claude_config, r#"{"foo": "bar"}"#).unwrap();

        let mut probe = ScriptedProbe::new(&paths, |_, _| Ok(ProbeOutcome::success("OK")));
        refresh(&paths, &mut probe, &mut Recorder::default()).unwrap();

        assert_eq!(probe.seen.len(), 2);
        assert!(!paths.credentials_file.exists());
        assert_eq!(
            fs::read_to_string(&paths.claude_config).unwrap(),
            r#"{"foo": "bar"}"#
        );
    }

    #[test]
    fn test_fatal_probe_error_still_restores() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        Store::new(&paths)
            .save(&sample_profiles(&["a@x.io", "b@x.io"]))
            .unwrap();
        seed_active(&paths, &sample_profile("b@x.io", "b@x.io"));

        let mut probe = ScriptedProbe::new(&paths, |_, _| {
            Err(RotateError::ExecutableNotFound {
                tried: "install paths".into(),
                env_var: "CCROTATE_CLAUDE_BIN",
            })
        });
        let mut recorder = Recorder::default();
        let err = refresh(&paths, &mut probe, &mut recorder).unwrap_err();

        assert!(matches!(err, RotateError::ExecutableNotFound { .. }));
        let finished = recorder.finished.unwrap();
        assert!(finished.iter().all(|r| r.status == AccountStatus::Error));
        assert_eq!(
            ActiveState::new(&paths).current_email().as_deref(),
            Some("b@x.io")
        );
    }

    #[test]
    fn test_incomplete_profile_is_reported_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let mut profiles = sample_profiles(&["a@x.io"]);
        profiles.insert("broken@x.io".into(), Profile::default());
        Store::new(&paths).save(&profiles).unwrap();

        let mut probe = ScriptedProbe::new(&paths, |_, _| Ok(ProbeOutcome::success("OK")));
        let reports = refresh(&paths, &mut probe, &mut Recorder::default()).unwrap();

        assert_eq!(reports[0].status, AccountStatus::Success);
        assert_eq!(reports[1].status, AccountStatus::Error);
        assert!(reports[1].response.contains("incomplete"));
        assert_eq!(probe.seen.len(), 1);
    }
}
