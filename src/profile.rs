//! Saved account profiles.
//!
//! A [`Profile`] mirrors what Claude Code keeps for a logged-in account: the
//! whole `.credentials.json` document and the `oauthAccount` / `userId`
//! identity from `.claude.json`. Both are stored exactly as captured so keys
//! ccrotate does not know about survive a snap and switch. [`OAuthCredentials`]
//! and [`OAuthAccount`] are read-only views used to validate, compare and
//! compact them.

use chrono::{DateTime, Local, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RotateError};

/// All saved profiles keyed by email, in insertion (rotation) order
pub type Profiles = IndexMap<String, Profile>;

/// Key of the token bundle inside Claude's credentials file
pub const CLAUDE_AI_OAUTH_KEY: &str = "claudeAiOauth";

/// The token bundle Claude Code refreshes on its own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, epoch milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,
}

impl OAuthCredentials {
    /// View the bundle inside a credentials document, if it has a usable one
    pub fn from_file(credentials: &Value) -> Option<Self> {
        Self::deserialize(credentials.get(CLAUDE_AI_OAUTH_KEY)?).ok()
    }

    /// A credentials document holding just this bundle
    pub fn to_file(&self) -> Result<Value> {
        let bundle = serde_json::to_value(self).map_err(|source| RotateError::Serialize {
            what: "credentials",
            source,
        })?;
        let mut file = Map::new();
        file.insert(CLAUDE_AI_OAUTH_KEY.to_string(), bundle);
        Ok(Value::Object(file))
    }
}

/// Account identity as stored under `oauthAccount` in `.claude.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthAccount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
}

impl OAuthAccount {
    pub fn from_value(account: &Value) -> Option<Self> {
        Self::deserialize(account).ok()
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|source| RotateError::Serialize {
            what: "oauthAccount",
            source,
        })
    }

    /// Empty when the account carries no email
    pub fn email(&self) -> &str {
        self.email_address.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// The credentials file as captured
    pub credentials: Option<Value>,
    /// Opaque; Claude Code writes a hex string here
    pub user_id: Option<Value>,
    /// The config's `oauthAccount` entry as captured
    pub oauth_account: Option<Value>,
    pub last_used: Option<DateTime<Utc>>,
}

/// A profile that can be activated, with its parsed views
#[derive(Debug)]
pub struct Complete<'a> {
    pub credentials: &'a Value,
    pub oauth_account: &'a Value,
    pub tokens: OAuthCredentials,
    pub account: OAuthAccount,
}

impl Profile {
    pub fn oauth_credentials(&self) -> Option<OAuthCredentials> {
        OAuthCredentials::from_file(self.credentials.as_ref()?)
    }

    pub fn account(&self) -> Option<OAuthAccount> {
        OAuthAccount::from_value(self.oauth_account.as_ref()?)
    }

    /// The parts every usable profile must carry
    pub fn require_complete(&self, email: &str) -> Result<Complete<'_>> {
        let incomplete = |missing| RotateError::IncompleteProfile {
            email: email.to_string(),
            missing,
        };

        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| incomplete("credentials"))?;
        let tokens = OAuthCredentials::from_file(credentials)
            .ok_or_else(|| incomplete("credentials.claudeAiOauth"))?;
        let oauth_account = self
            .oauth_account
            .as_ref()
            .ok_or_else(|| incomplete("oauthAccount"))?;
        let account =
            OAuthAccount::from_value(oauth_account).ok_or_else(|| incomplete("oauthAccount"))?;
        if account.email().is_empty() {
            return Err(incomplete("oauthAccount.emailAddress"));
        }
        Ok(Complete {
            credentials,
            oauth_account,
            tokens,
            account,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.require_complete("").is_ok()
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.oauth_credentials().and_then(|c| c.expires_at)
    }
}

/// Render a token expiry in local time for listings
pub fn format_expires_at(expires_at: Option<i64>) -> String {
    let Some(millis) = expires_at else {
        return "Unknown".to_string();
    };
    match DateTime::from_timestamp_millis(millis) {
        Some(at) => at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "Invalid".to_string(),
    }
}

/// Render a last-used instant as a local date
pub fn format_last_used(last_used: Option<DateTime<Utc>>) -> String {
    last_used
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "never".to_string())
}
