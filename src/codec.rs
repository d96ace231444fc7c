//! Portable export format for the whole profile store.
//!
//! Wire text: `"mp-gz-b64:<tag>:<payload>"`
//! - payload: profiles projected onto short field tags, MessagePack encoded,
//!   gzipped, then base64.
//! - tag: first 8 hex chars of the MD5 of the projected profiles as JSON
//!   with emails sorted.
//!
//! The gzip member always carries the same header plus a `cr` extra field
//! holding the CRC-32 of the deflate body, so every byte of the payload is
//! covered by a check. Import never re-compresses, so any deflate encoder
//! can produce valid exports.
//!
//! Only the fields ccrotate models travel; keys captured from Claude's
//! files that have no view are left behind.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use indexmap::IndexMap;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, RotateError};
use crate::profile::{Complete, OAuthAccount, OAuthCredentials, Profile, Profiles};
use crate::store::Store;
use crate::ui::Confirmer;

/// Names the pack -> compress -> text-encode pipeline
pub const FORMAT_TAG: &str = "mp-gz-b64";
pub const TAG_LEN: usize = 8;
/// Refuse payloads that inflate beyond this
const MAX_DECOMPRESSED: u64 = 16 * 1024 * 1024;

/// FEXTRA set, zero mtime, unknown OS, then the `cr` subfield header
const GZIP_HEADER: [u8; 16] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x08, 0x00, b'c', b'r', 0x04,
    0x00,
];
/// CRC-32 and length of the uncompressed data
const GZIP_TRAILER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompactProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<CompactCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    o: Option<CompactAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    i: Option<Value>,
    #[serde(default)]
    l: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompactCredentials {
    #[serde(default)]
    a: Option<String>,
    #[serde(default)]
    r: Option<String>,
    /// Older exporters wrote this as a float64
    #[serde(default)]
    e: Option<f64>,
    #[serde(default)]
    s: Option<Vec<String>>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompactAccount {
    #[serde(default)]
    u: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    g: Option<String>,
    #[serde(default)]
    r: Option<String>,
    #[serde(default)]
    w: Option<String>,
    #[serde(default)]
    n: Option<String>,
}

type CompactProfiles = IndexMap<String, CompactProfile>;

fn compact(profile: &Profile, complete: &Complete<'_>) -> CompactProfile {
    let tokens = &complete.tokens;
    let account = &complete.account;
    CompactProfile {
        c: Some(CompactCredentials {
            a: tokens.access_token.clone(),
            r: tokens.refresh_token.clone(),
            e: tokens.expires_at.map(|ms| ms as f64),
            s: tokens.scopes.clone(),
            t: tokens.subscription_type.clone(),
        }),
        o: Some(CompactAccount {
            u: account.account_uuid.clone(),
            e: account.email_address.clone(),
            g: account.organization_uuid.clone(),
            r: account.organization_role.clone(),
            w: account.workspace_role.clone(),
            n: account.organization_name.clone(),
        }),
        i: profile.user_id.clone(),
        l: profile.last_used,
    }
}

fn expand(compact: CompactProfile) -> Result<Profile> {
    let credentials = compact
        .c
        .map(|c| {
            OAuthCredentials {
                access_token: c.a,
                refresh_token: c.r,
                expires_at: c.e.map(|ms| ms as i64),
                scopes: c.s,
                subscription_type: c.t,
            }
            .to_file()
        })
        .transpose()?;
    let oauth_account = compact
        .o
        .map(|o| {
            OAuthAccount {
                account_uuid: o.u,
                email_address: o.e,
                organization_uuid: o.g,
                organization_role: o.r,
                workspace_role: o.w,
                organization_name: o.n,
            }
            .to_value()
        })
        .transpose()?;
    Ok(Profile {
        credentials,
        user_id: compact.i,
        oauth_account,
        last_used: compact.l,
    })
}

fn expand_all(projected: CompactProfiles) -> Result<Profiles> {
    projected
        .into_iter()
        .map(|(email, compact)| Ok((email, expand(compact)?)))
        .collect()
}

/// MD5 over the email-sorted JSON of `profiles`, first 8 hex chars
pub fn integrity_tag(profiles: &Profiles) -> Result<String> {
    let sorted: BTreeMap<&String, &Profile> = profiles.iter().collect();
    let canonical = serde_json::to_vec(&sorted).map_err(|source| RotateError::Serialize {
        what: "profiles",
        source,
    })?;
    let digest = Md5::digest(&canonical);
    let mut tag = hex::encode(digest);
    tag.truncate(TAG_LEN);
    Ok(tag)
}

#[derive(Debug, Clone)]
pub struct Exported {
    /// Quoted wire text, ready to paste into a shell
    pub text: String,
    pub tag: String,
    pub exported: Vec<String>,
    pub skipped: Vec<String>,
}

/// Project complete profiles, returning them alongside the emails left out
fn project(profiles: &Profiles) -> (CompactProfiles, Vec<String>) {
    let mut projected = CompactProfiles::new();
    let mut skipped = Vec::new();

    for (email, profile) in profiles {
        match profile.require_complete(email) {
            Ok(complete) => {
                projected.insert(email.clone(), compact(profile, &complete));
            }
            Err(e) => {
                warn!(%email, error = %e, "skipping incomplete profile in export");
                skipped.push(email.clone());
            }
        }
    }
    (projected, skipped)
}

/// MessagePack, gzip, base64
fn pack(projected: &CompactProfiles) -> Result<String> {
    let packed = rmp_serde::to_vec_named(projected).map_err(encode_error)?;
    let gzipped = gzip(&packed, Compression::default())?;
    debug!(packed = packed.len(), gzipped = gzipped.len(), "packed profiles");
    Ok(STANDARD.encode(gzipped))
}

fn gzip(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut deflater = DeflateEncoder::new(Vec::new(), level);
    deflater.write_all(data).map_err(encode_error)?;
    let body = deflater.finish().map_err(encode_error)?;

    let mut data_crc = Crc::new();
    data_crc.update(data);

    let mut gzipped = Vec::with_capacity(GZIP_HEADER.len() + 4 + body.len() + GZIP_TRAILER_LEN);
    gzipped.extend_from_slice(&GZIP_HEADER);
    gzipped.extend_from_slice(&crc32(&body).to_le_bytes());
    gzipped.extend_from_slice(&body);
    gzipped.extend_from_slice(&data_crc.sum().to_le_bytes());
    gzipped.extend_from_slice(&data_crc.amount().to_le_bytes());
    Ok(gzipped)
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}

fn encode_error(e: impl std::fmt::Display) -> RotateError {
    RotateError::Encode(e.to_string())
}

/// Encode every complete profile; incomplete ones are left out
pub fn export(profiles: &Profiles) -> Result<Exported> {
    let (projected, skipped) = project(profiles);
    let payload = pack(&projected)?;
    let exported: Vec<String> = projected.keys().cloned().collect();
    let tag = integrity_tag(&expand_all(projected)?)?;

    Ok(Exported {
        text: format!("\"{FORMAT_TAG}:{tag}:{payload}\""),
        tag,
        exported,
        skipped,
    })
}

/// Decode and verify wire text without touching the store
pub fn decode(text: &str) -> Result<Profiles> {
    let (expected, payload) = split_wire(text)?;
    let mismatch = |detail: String| RotateError::IntegrityMismatch {
        expected: expected.to_string(),
        detail,
    };

    let projected = unpack(payload).map_err(mismatch)?;
    let profiles = expand_all(projected)?;

    let actual = integrity_tag(&profiles)?;
    if actual != expected {
        return Err(mismatch(format!("got {actual}; the data may be corrupted")));
    }

    validate(&profiles)?;
    Ok(profiles)
}

/// Strip quotes and the format prefix, returning `(tag, payload)`
fn split_wire(text: &str) -> Result<(&str, &str)> {
    let mut clean = text.trim();
    for quote in ['"', '\''] {
        if clean.len() >= 2 && clean.starts_with(quote) && clean.ends_with(quote) {
            clean = &clean[1..clean.len() - 1];
            break;
        }
    }

    let body = clean
        .strip_prefix(FORMAT_TAG)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| RotateError::MalformedBlob(format!("expected {FORMAT_TAG}: prefix")))?;
    let (tag, payload) = body
        .split_once(':')
        .ok_or_else(|| RotateError::MalformedBlob("missing integrity tag".into()))?;
    if tag.chars().count() != TAG_LEN {
        return Err(RotateError::MalformedBlob(format!(
            "integrity tag must be {TAG_LEN} characters, got {}",
            tag.chars().count()
        )));
    }
    Ok((tag, payload))
}

fn unpack(payload: &str) -> std::result::Result<CompactProfiles, String> {
    let gzipped = STANDARD
        .decode(payload)
        .map_err(|e| format!("payload is not valid base64: {e}"))?;
    check_framing(&gzipped)?;

    let mut packed = Vec::new();
    GzDecoder::new(gzipped.as_slice())
        .take(MAX_DECOMPRESSED + 1)
        .read_to_end(&mut packed)
        .map_err(|e| format!("payload does not decompress: {e}"))?;
    if packed.len() as u64 > MAX_DECOMPRESSED {
        return Err(format!("payload inflates beyond {MAX_DECOMPRESSED} bytes"));
    }

    rmp_serde::from_slice(&packed).map_err(|e| format!("payload does not unpack: {e}"))
}

/// The header must be ours and the deflate body must match its recorded CRC
fn check_framing(gzipped: &[u8]) -> std::result::Result<(), String> {
    let rest = gzipped
        .strip_prefix(GZIP_HEADER.as_slice())
        .ok_or("payload has an unexpected gzip header")?;
    if rest.len() < 4 + GZIP_TRAILER_LEN {
        return Err("payload is truncated".into());
    }
    let (recorded, rest) = rest.split_at(4);
    let body = &rest[..rest.len() - GZIP_TRAILER_LEN];
    if recorded != crc32(body).to_le_bytes() {
        return Err("compressed data does not match its checksum".into());
    }
    Ok(())
}

fn validate(profiles: &Profiles) -> Result<()> {
    if profiles.is_empty() {
        return Err(RotateError::MalformedBlob("no profiles in export data".into()));
    }
    for (email, profile) in profiles {
        if email.is_empty() {
            return Err(RotateError::MalformedBlob("profile with empty email".into()));
        }
        profile.require_complete(email)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { emails: Vec<String> },
    Declined,
}

/// Replace the whole store with the decoded profiles once confirmed
pub fn import(store: &Store, text: &str, confirmer: &dyn Confirmer) -> Result<ImportOutcome> {
    let profiles = decode(text)?;

    let emails: Vec<&str> = profiles.keys().map(String::as_str).collect();
    let mut prompt = format!(
        "Import {} accounts ({})?",
        profiles.len(),
        emails.join(", ")
    );
    if store.exists() {
        prompt.push_str(" This replaces all existing profile data.");
    }
    if !confirmer.confirm(&prompt) {
        return Ok(ImportOutcome::Declined);
    }

    store.save(&profiles)?;
    Ok(ImportOutcome::Imported {
        emails: profiles.into_keys().collect(),
    })
}
