//! Handlers for each CLI subcommand.
//!
//! These sit between `main.rs` and the library: they call into the core
//! modules, wrap failures with `anyhow` context, and report through
//! [`Ui`]. Every function here corresponds to a subcommand.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};

use crate::active::ActiveState;
use crate::codec::{self, ImportOutcome};
use crate::doctor::run_doctor;
use crate::locate::StrategyChain;
use crate::paths::Paths;
use crate::probe::ClaudeProbe;
use crate::profile::{format_expires_at, format_last_used};
use crate::refresh::AccountStatus;
use crate::rotation::{self, RotateOutcome};
use crate::store::Store;
use crate::switch::{self, RemoveOutcome, SnapOutcome};
use crate::ui::{AssumeYes, Confirmer, RefreshProgress, Ui};

/// Save the currently active account
pub fn snap(paths: &Paths, ui: &Ui, force: bool) -> Result<()> {
    let outcome =
        switch::snapshot(paths, force, ui).context("Failed to save the active account")?;

    match outcome {
        SnapOutcome::Saved {
            email,
            replaced: false,
        } => ui.ok(format!("Saved account {}", ui.bold(&email))),
        SnapOutcome::Saved {
            email,
            replaced: true,
        } => ui.ok(format!("Updated saved account {}", ui.bold(&email))),
        SnapOutcome::Declined { email } => {
            ui.info(format!("Kept the existing profile for {email}"))
        }
    }
    Ok(())
}

/// List saved accounts in rotation order
pub fn list(paths: &Paths, ui: &Ui) -> Result<()> {
    let profiles = Store::new(paths)
        .load()
        .context("Failed to load saved accounts")?;

    if profiles.is_empty() {
        ui.warn("No saved accounts.");
        ui.newline();
        ui.println("Log in with Claude Code, then save the account with:");
        ui.println(format!("  {} snap", ui.bold("ccrotate")));
        return Ok(());
    }

    let current = ActiveState::new(paths).current_email();

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell("#"),
        ui.header_cell(""),
        ui.header_cell("Email"),
        ui.header_cell("Last used"),
        ui.header_cell("Token expires"),
        ui.header_cell(""),
    ]);

    for (index, (email, profile)) in profiles.iter().enumerate() {
        let is_active = current.as_deref() == Some(email.as_str());
        let marker = if is_active {
            ui.colored_cell("★", AnsiColor::Yellow)
        } else {
            ui.cell("")
        };
        let email_cell = if is_active {
            ui.colored_cell(email, AnsiColor::Green)
        } else {
            ui.cell(email)
        };
        let flag = if profile.is_complete() {
            ui.cell("")
        } else {
            ui.colored_cell("incomplete", AnsiColor::Red)
        };

        table.add_row(vec![
            ui.cell((index + 1).to_string()),
            marker,
            email_cell,
            ui.cell(format_last_used(profile.last_used)),
            ui.cell(format_expires_at(profile.expires_at())),
            flag,
        ]);
    }

    ui.println(table.to_string());
    Ok(())
}

/// Show the active account and whether it is saved
pub fn current(paths: &Paths, ui: &Ui) -> Result<()> {
    let account = match ActiveState::new(paths).read() {
        Ok(account) => account,
        Err(e) if e.is_identity_unavailable() => {
            ui.warn(format!("No active account: {e}"));
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to read the active account"),
    };

    ui.println(format!(
        "{} Active account: {}",
        ui.icon_ok(),
        ui.bold(&account.email)
    ));
    ui.println(format!(
        "  {} Token expires: {}",
        ui.icon_info(),
        format_expires_at(account.tokens.expires_at)
    ));

    let profiles = Store::new(paths)
        .load()
        .context("Failed to load saved accounts")?;
    match profiles.get_index_of(&account.email) {
        Some(index) => ui.println(format!(
            "  {} Saved as #{} of {}",
            ui.icon_ok(),
            index + 1,
            profiles.len()
        )),
        None => ui.println(format!(
            "  {} Not saved yet (run {})",
            ui.icon_warn(),
            ui.bold("ccrotate snap")
        )),
    }
    Ok(())
}

/// Activate a saved account
pub fn switch(paths: &Paths, email: &str, ui: &Ui) -> Result<()> {
    let spinner = ui.spinner(format!("Switching to {email}..."));

    match switch::switch_to(paths, email) {
        Ok(()) => {
            ui.spinner_finish_ok(&spinner, format!("Active account: {email}"));
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to switch to {email}"));
            Err(e).with_context(|| format!("Failed to switch to {email}"))
        }
    }
}

/// Rotate to the next saved account
pub fn next(paths: &Paths, ui: &Ui) -> Result<()> {
    match rotation::next(paths).context("Failed to rotate accounts")? {
        RotateOutcome::Switched { from, to } => {
            let from = from.unwrap_or_else(|| "unknown".to_string());
            ui.ok(format!("Switched {} → {}", ui.dim(from), ui.bold(&to)));
        }
        RotateOutcome::SingleAccount { email } => {
            ui.info(format!("Only one saved account ({email}); nothing to rotate to"));
        }
    }
    Ok(())
}

/// Delete a saved account
pub fn remove(paths: &Paths, email: &str, ui: &Ui, force: bool) -> Result<()> {
    let confirmer: &dyn Confirmer = if force { &AssumeYes } else { ui };

    match switch::remove(paths, email, confirmer)
        .with_context(|| format!("Failed to remove {email}"))?
    {
        RemoveOutcome::Removed { email } => ui.ok(format!("Removed account {email}")),
        RemoveOutcome::Declined { .. } => ui.info("Cancelled."),
    }
    Ok(())
}

/// Probe every saved account and store refreshed tokens
pub fn refresh(paths: &Paths, ui: &Ui) -> Result<()> {
    let mut prober = ClaudeProbe::new(StrategyChain::standard(paths));
    let mut progress = RefreshProgress::new(ui);

    let reports = crate::refresh::refresh(paths, &mut prober, &mut progress)
        .context("Refresh did not complete")?;

    let healthy = reports
        .iter()
        .filter(|r| r.status == AccountStatus::Success)
        .count();
    let updated = reports.iter().filter(|r| r.credentials_updated).count();

    if healthy == reports.len() {
        ui.ok(format!("All {healthy} accounts responded"));
    } else {
        ui.warn(format!(
            "{} of {} accounts failed",
            reports.len() - healthy,
            reports.len()
        ));
    }
    if updated > 0 {
        ui.info(format!("Stored refreshed credentials for {updated} accounts"));
    }
    Ok(())
}

/// Print every complete profile as a single shell-safe line
pub fn export(paths: &Paths, ui: &Ui) -> Result<()> {
    let profiles = Store::new(paths)
        .load()
        .context("Failed to load saved accounts")?;
    if profiles.is_empty() {
        ui.warn("No saved accounts to export. Run `ccrotate snap` first.");
        return Ok(());
    }

    let exported = codec::export(&profiles).context("Failed to encode profiles")?;
    for email in &exported.skipped {
        ui.note(format!("skipped incomplete profile {email}"));
    }
    if exported.exported.is_empty() {
        bail!("None of the saved accounts are complete enough to export");
    }

    ui.println(&exported.text);
    ui.note(format!(
        "{} accounts, {} characters, integrity tag {}",
        exported.exported.len(),
        exported.text.len(),
        exported.tag
    ));
    Ok(())
}

/// Replace the saved accounts with an exported set
pub fn import(paths: &Paths, data: &str, ui: &Ui, yes: bool) -> Result<()> {
    let store = Store::new(paths);
    let confirmer: &dyn Confirmer = if yes { &AssumeYes } else { ui };

    match codec::import(&store, data, confirmer).context("Failed to import accounts")? {
        ImportOutcome::Imported { emails } => {
            ui.ok(format!("Imported {} accounts", emails.len()));
            for email in emails {
                ui.println(format!("  {} {email}", ui.icon_info()));
            }
        }
        ImportOutcome::Declined => ui.info("Import cancelled."),
    }
    Ok(())
}

/// Run diagnostics
pub fn doctor(paths: &Paths, ui: &Ui) -> Result<()> {
    let healthy = run_doctor(paths, ui, &StrategyChain::standard(paths));
    if !healthy {
        ui.warn("Some checks reported problems.");
    }
    Ok(())
}
