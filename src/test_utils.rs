//! Test utilities shared across test modules
//!
//! Builders for profiles and a fake Claude home so each test runs against its
//! own temp directory.

use std::cell::RefCell;
use std::fs;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use crate::paths::Paths;
use crate::profile::{OAuthAccount, OAuthCredentials, Profile, Profiles};
use crate::ui::Confirmer;

/// Paths rooted in the temp directory, mimicking ~/.ccrotate and ~/.claude
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::from_home(temp_dir.path(), |_| None)
}

/// A complete profile whose tokens are derived from `token`
pub fn sample_profile(email: &str, token: &str) -> Profile {
    let tokens = OAuthCredentials {
        access_token: Some(format!("sk-ant-oat01-{token}")),
        refresh_token: Some(format!("sk-ant-ort01-{token}")),
        expires_at: Some(1_750_000_000_000),
        scopes: Some(vec!["user:inference".into(), "user:profile".into()]),
        subscription_type: Some("max".into()),
    };
    let account = OAuthAccount {
        account_uuid: Some(format!("acct-{email}")),
        email_address: Some(email.to_string()),
        organization_uuid: Some("org-1".into()),
        organization_role: Some("admin".into()),
        workspace_role: None,
        organization_name: Some(format!("{email}'s Organization")),
    };
    Profile {
        credentials: Some(tokens.to_file().unwrap()),
        user_id: Some(json!(format!("uid-{email}"))),
        oauth_account: Some(account.to_value().unwrap()),
        last_used: Some(Utc.with_ymd_and_hms(2025, 5, 1, 9, 30, 0).unwrap()),
    }
}

/// `sample_profile` plus keys Claude Code writes that ccrotate has no view of
pub fn sample_profile_with_extras(email: &str, token: &str) -> Profile {
    let mut profile = sample_profile(email, token);
    let credentials = profile.credentials.as_mut().unwrap();
    credentials["claudeAiOauth"]["rateLimitTier"] = json!("default_claude_max_20x");
    credentials["mcpOAuth"] = json!({"linear": {"accessToken": format!("mcp-{token}")}});
    let account = profile.oauth_account.as_mut().unwrap();
    account["displayName"] = json!("Sample User");
    account["billingType"] = json!("stripe_subscription");
    profile
}

/// Profiles for `emails`, in that order
pub fn sample_profiles(emails: &[&str]) -> Profiles {
    emails
        .iter()
        .map(|e| (e.to_string(), sample_profile(e, e)))
        .collect()
}

/// Write Claude's credentials and config files as if `profile` were logged in
pub fn seed_active(paths: &Paths, profile: &Profile) {
    fs::create_dir_all(&paths.claude_dir).unwrap();
    fs::write(
        &paths.credentials_file,
        serde_json::to_vec_pretty(profile.credentials.as_ref().unwrap()).unwrap(),
    )
    .unwrap();
    let config = json!({
        "numStartups": 12,
        "userId": profile.user_id,
        "oauthAccount": profile.oauth_account,
    });
    fs::write(&paths.claude_config, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
}

/// Confirmer that gives a fixed answer and records every prompt
#[derive(Default)]
pub struct ScriptedConfirm {
    pub answer: bool,
    pub prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Confirmer for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answer
    }
}
