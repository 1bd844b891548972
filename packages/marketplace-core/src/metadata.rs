//! Metadata integrity checking.
//!
//! Asset metadata is fingerprinted at mint time and the fingerprint is
//! snapshotted again onto every listing. `verify_listing` recomputes the
//! fingerprint of the stored content and compares it to the snapshot,
//! detecting tampering between mint and display. This is a detective
//! control only: a mismatch is surfaced to display layers and never
//! invalidates the listing, because on-chain settlement stays authoritative.

use crate::error::Error;
use crate::model::{now_secs, Listing};
use crate::store::MemStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Hex length of a fingerprint (first 8 bytes of a SHA-256 digest).
pub const FINGERPRINT_LEN: usize = 16;

/// Content-derived hash of a metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a metadata document.
///
/// serde_json's default map keeps keys sorted, so re-serializing a `Value`
/// yields a canonical form regardless of the order fields arrived in.
pub fn fingerprint_of(content: &Value) -> Fingerprint {
    let canonical = serde_json::to_string(content).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    Fingerprint(hex::encode(digest)[..FINGERPRINT_LEN].to_string())
}

/// Validated shape of a metadata document: the fields every asset type
/// shares, plus an open extension map for type-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataContent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Validate a metadata document at the registration boundary. Past this
/// point content is only fingerprinted and displayed.
pub fn validate_content(content: &Value) -> Result<(), Error> {
    let doc: MetadataContent = serde_json::from_value(content.clone())
        .map_err(|e| Error::Validation(format!("invalid metadata document: {e}")))?;
    if doc.name.trim().is_empty() {
        return Err(Error::Validation("metadata name must not be empty".into()));
    }
    Ok(())
}

/// Immutable metadata record. A new fingerprint is a new record, never an
/// in-place edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: Uuid,
    pub fingerprint: Fingerprint,
    pub content: Value,
    pub created_at: u64,
}

impl MetadataRecord {
    pub fn new(content: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint: fingerprint_of(&content),
            content,
            created_at: now_secs(),
        }
    }
}

/// Recompute the fingerprint of the listing's asset metadata and compare it
/// to the snapshot taken at listing time. `true` = unchanged.
pub fn verify_listing(store: &MemStore, listing: &Listing) -> Result<bool, Error> {
    let asset = store.asset(&listing.asset_id)?;
    let record = store.metadata_record(asset.metadata_id)?;
    Ok(fingerprint_of(&record.content) == listing.fingerprint)
}
