//! Response types for the marketplace API.

use crate::metadata::Fingerprint;
use crate::model::{Asset, FailureReason, Listing, ListingStatus};
use crate::template::UnsignedTransaction;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Response from the listing/purchase template endpoints.
#[derive(Serialize)]
pub struct TemplateResponse {
    pub listing_id: Uuid,
    pub unsigned_transaction: UnsignedTransaction,
}

/// Response from the submit endpoints: the submission was accepted for
/// tracking, not confirmed.
#[derive(Serialize)]
pub struct SubmitResponse {
    pub listing_id: Uuid,
    pub status: ListingStatus,
    pub transaction_hash: String,
}

#[derive(Serialize)]
pub struct ListingView {
    pub listing_id: Uuid,
    pub asset_id: String,
    pub seller_address: String,
    pub price_minor_units: u64,
    pub status: ListingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureReason>,
    /// Whether the asset's current metadata still hashes to the fingerprint
    /// snapshotted at listing time.
    pub verified_metadata: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ListingView {
    pub fn from_listing(listing: Listing, verified_metadata: bool) -> Self {
        Self {
            listing_id: listing.id,
            asset_id: listing.asset_id,
            seller_address: listing.seller,
            price_minor_units: listing.price_drops,
            status: listing.status,
            offer_id: listing.offer_id,
            last_failure: listing.last_failure,
            verified_metadata,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct AssetView {
    pub asset_id: String,
    pub owner_address: String,
    pub status: crate::model::AssetStatus,
    pub mint_tx_hash: String,
    pub fingerprint: Fingerprint,
    pub metadata: Value,
    pub created_at: u64,
}

impl AssetView {
    pub fn new(asset: Asset, metadata: Value) -> Self {
        Self {
            asset_id: asset.id,
            owner_address: asset.owner,
            status: asset.status,
            mint_tx_hash: asset.mint_tx,
            fingerprint: asset.fingerprint,
            metadata,
            created_at: asset.created_at,
        }
    }
}

/// Response from the health endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_ledger: Option<String>,
    pub ledger_failovers: u64,
    pub uptime_secs: u64,
    pub requests: u64,
    pub active_polls: u64,
}
