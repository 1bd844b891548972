//! Request payloads for the marketplace API.

use serde::Deserialize;
use serde_json::Value;

/// Register an asset from an already-finalized mint transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAssetRequest {
    pub mint_tx_hash: String,
    pub owner_address: String,
    /// Full metadata document; fingerprinted on registration.
    pub metadata: Value,
}

/// Create a listing and receive its unsigned sell-offer template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRequest {
    pub asset_id: String,
    pub seller_address: String,
    /// Price in integer minor units (drops).
    pub price_minor_units: u64,
}

/// Submit an externally signed sell offer for confirmation tracking.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub transaction_hash: String,
    /// Base64 of the signed transaction JSON as produced by the signer.
    pub signed_payload: String,
}

/// Request an accept-offer template for an active listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseTemplateRequest {
    pub buyer_address: String,
}

/// Submit an externally signed accept offer.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseSubmitRequest {
    pub buyer_address: String,
    pub transaction_hash: String,
    pub signed_payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub seller_address: String,
}
