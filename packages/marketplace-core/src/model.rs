//! Domain types: assets, listings, tracked transactions, and their state
//! machines.

use crate::metadata::Fingerprint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger-assigned token id (opaque hex string).
pub type AssetId = String;
/// Ledger account address.
pub type Address = String;
/// Ledger transaction hash.
pub type TxHash = String;

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Asset ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Minted,
    Listed,
    Sold,
}

/// An asset tracked by the platform. Mutated only via verified transaction
/// outcomes (and listing release, which returns it to `minted`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub owner: Address,
    pub mint_tx: TxHash,
    pub metadata_id: Uuid,
    pub fingerprint: Fingerprint,
    pub status: AssetStatus,
    pub created_at: u64,
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    PendingTemplate,
    PendingConfirmation,
    Active,
    Sold,
    Cancelled,
    Invalid,
}

impl ListingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ListingStatus::Sold | ListingStatus::Cancelled | ListingStatus::Invalid
        )
    }

    /// A listing in an open (non-terminal) state blocks new listings for
    /// its asset.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` is a legal transition from `self`. Cancellation is the
    /// only client-driven transition; everything else is driven by verified
    /// transaction outcomes. An `active` listing leaves that state only
    /// through a confirmed sale or seller cancellation: failed purchase
    /// attempts fail their own tracked transaction, never the listing.
    pub fn may_become(self, next: ListingStatus) -> bool {
        use ListingStatus::*;
        matches!(
            (self, next),
            (PendingTemplate, PendingConfirmation)
                | (PendingTemplate, Cancelled)
                | (PendingConfirmation, Active)
                | (PendingConfirmation, Sold)
                | (PendingConfirmation, Invalid)
                | (PendingConfirmation, PendingTemplate)
                | (Active, Sold)
                | (Active, Cancelled)
        )
    }
}

/// Why a listing last left the happy path. Surfaced so clients can decide
/// whether to retry with a new template or treat the asset as released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    Mismatch,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub asset_id: AssetId,
    pub seller: Address,
    /// Integer minor units (drops). Immutable after creation.
    pub price_drops: u64,
    pub status: ListingStatus,
    /// Ledger-assigned offer id, set once on first confirmation.
    pub offer_id: Option<String>,
    /// Metadata fingerprint snapshot taken at listing time.
    pub fingerprint: Fingerprint,
    pub last_failure: Option<FailureReason>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Listing {
    pub fn new(asset_id: AssetId, seller: Address, price_drops: u64, fingerprint: Fingerprint) -> Self {
        let now = now_secs();
        Self {
            id: Uuid::new_v4(),
            asset_id,
            seller,
            price_drops,
            status: ListingStatus::PendingTemplate,
            offer_id: None,
            fingerprint,
            last_failure: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Tracked transaction ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Mint,
    SellOffer,
    AcceptOffer,
}

impl TxKind {
    /// Ledger wire name for this transaction kind.
    pub fn wire_name(self) -> &'static str {
        match self {
            TxKind::Mint => "NFTokenMint",
            TxKind::SellOffer => "NFTokenCreateOffer",
            TxKind::AcceptOffer => "NFTokenAcceptOffer",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "NFTokenMint" => Some(TxKind::Mint),
            "NFTokenCreateOffer" => Some(TxKind::SellOffer),
            "NFTokenAcceptOffer" => Some(TxKind::AcceptOffer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// Status transitions are monotonic: `submitted` may finalize either
    /// way, finalized states never move again.
    pub fn may_become(self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Submitted, TxStatus::Confirmed) | (TxStatus::Submitted, TxStatus::Failed)
        )
    }
}

/// Local record of a submitted, ledger-bound transaction. Created on
/// submission; finalized only by the transaction verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedTransaction {
    pub hash: TxHash,
    pub kind: TxKind,
    pub status: TxStatus,
    /// `None` for mint registrations, which have no listing.
    pub listing_id: Option<Uuid>,
    pub asset_id: AssetId,
    pub submitted_at: u64,
}

impl TrackedTransaction {
    pub fn submitted(hash: TxHash, kind: TxKind, listing_id: Option<Uuid>, asset_id: AssetId) -> Self {
        Self {
            hash,
            kind,
            status: TxStatus::Submitted,
            listing_id,
            asset_id,
            submitted_at: now_secs(),
        }
    }
}
