//! Listing lifecycle manager.
//!
//! Owns the listing/asset state machines and enforces the single invariant
//! everything else leans on: at most one listing in a non-terminal state per
//! asset. Every mutation runs under the asset's exclusive lock; all
//! transitions except cancellation are driven by transaction verifier
//! outcomes, never by client-asserted status.

use crate::error::Error;
use crate::metadata;
use crate::model::{
    AssetStatus, FailureReason, Listing, ListingStatus, TrackedTransaction, TxKind, TxStatus,
};
use crate::store::MemStore;
use crate::template::{self, UnsignedTransaction};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<MemStore>,
}

impl Lifecycle {
    pub fn new(store: Arc<MemStore>) -> Self {
        Self { store }
    }

    /// Create a pending listing and its unsigned sell-offer template.
    ///
    /// Preconditions, checked under the asset lock: asset exists, seller is
    /// the recorded owner, price is positive, and no open listing exists for
    /// the asset. The fingerprint snapshot is taken at this instant so later
    /// mismatch detection has a baseline.
    pub async fn create_listing(
        &self,
        asset_id: &str,
        seller: &str,
        price_drops: u64,
    ) -> Result<(Listing, UnsignedTransaction), Error> {
        if price_drops == 0 {
            return Err(Error::Validation("price must be greater than 0".into()));
        }

        let lock = self.store.asset_lock(asset_id);
        let _guard = lock.lock().await;

        let asset = self.store.asset(asset_id)?;
        if asset.owner != seller {
            return Err(Error::Validation(
                "seller_address does not match the asset's current owner".into(),
            ));
        }
        if let Some(open) = self.store.open_listing_for_asset(asset_id) {
            return Err(Error::Conflict(format!(
                "asset {asset_id} already has an open listing ({})",
                open.id
            )));
        }

        let record = self.store.metadata_record(asset.metadata_id)?;
        let snapshot = metadata::fingerprint_of(&record.content);
        let listing = Listing::new(asset_id.to_string(), seller.to_string(), price_drops, snapshot);
        self.store.insert_listing(listing.clone())?;

        info!(
            listing_id = %listing.id,
            asset_id,
            price_drops,
            "Listing created, awaiting signed sell offer"
        );
        let unsigned = template::sell_offer(&listing);
        Ok((listing, unsigned))
    }

    /// Record a candidate signed sell offer: track the hash and move the
    /// listing to `pending_confirmation`.
    pub async fn attach_sell_submission(
        &self,
        listing_id: Uuid,
        tx_hash: &str,
    ) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        let listing = self.store.listing(listing_id)?;
        if listing.status != ListingStatus::PendingTemplate {
            return Err(Error::Validation(format!(
                "listing is not in pending_template (currently {:?})",
                listing.status
            )));
        }

        // Hash uniqueness is the replay guard; check it before transitioning
        // so a duplicate leaves the listing untouched.
        self.store.insert_transaction(TrackedTransaction::submitted(
            tx_hash.to_string(),
            TxKind::SellOffer,
            Some(listing_id),
            asset_id,
        ))?;

        self.store.update_listing(listing_id, |l| {
            l.status = ListingStatus::PendingConfirmation;
            Ok(())
        })
    }

    /// Record a candidate signed accept offer against an active listing.
    /// The listing stays `active`; the first confirmed accept wins.
    pub async fn attach_purchase_submission(
        &self,
        listing_id: Uuid,
        tx_hash: &str,
    ) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        let listing = self.store.listing(listing_id)?;
        if listing.status != ListingStatus::Active {
            return Err(Error::Conflict(format!(
                "listing is not active (currently {:?})",
                listing.status
            )));
        }

        self.store.insert_transaction(TrackedTransaction::submitted(
            tx_hash.to_string(),
            TxKind::AcceptOffer,
            Some(listing_id),
            asset_id,
        ))?;
        Ok(listing)
    }

    /// Seller cancellation. Allowed from `active` or `pending_template`
    /// only; a listing with a confirmation in flight must resolve first.
    pub async fn cancel(&self, listing_id: Uuid, caller: &str) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        let listing = self.store.listing(listing_id)?;
        if listing.seller != caller {
            return Err(Error::Validation(
                "only the recorded seller may cancel a listing".into(),
            ));
        }
        if listing.status == ListingStatus::PendingConfirmation {
            return Err(Error::Conflict(
                "a confirmation is in flight; cancel after it resolves".into(),
            ));
        }
        if !listing.status.may_become(ListingStatus::Cancelled) {
            return Err(Error::Conflict(format!(
                "listing in {:?} cannot be cancelled",
                listing.status
            )));
        }

        let updated = self.store.update_listing(listing_id, |l| {
            l.status = ListingStatus::Cancelled;
            Ok(())
        })?;
        self.release_asset(&asset_id)?;
        info!(listing_id = %listing_id, asset_id = %asset_id, "Listing cancelled by seller");
        Ok(updated)
    }

    // ── Verifier-driven transitions ──────────────────────────────────────────

    /// Sell offer confirmed on the ledger: listing becomes `active` and the
    /// ledger-assigned offer id is recorded (set only once).
    pub async fn confirm_sell(
        &self,
        listing_id: Uuid,
        tx_hash: &str,
        offer_id: Option<String>,
    ) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        let updated = self.store.update_listing(listing_id, |l| {
            if !l.status.may_become(ListingStatus::Active) {
                return Err(Error::Conflict(format!(
                    "listing in {:?} cannot become active",
                    l.status
                )));
            }
            l.status = ListingStatus::Active;
            if l.offer_id.is_none() {
                l.offer_id = offer_id;
            }
            l.last_failure = None;
            Ok(())
        })?;
        self.finalize_tx(tx_hash, TxStatus::Confirmed)?;
        self.store
            .update_asset(&asset_id, |a| a.status = AssetStatus::Listed)?;
        info!(listing_id = %listing_id, tx_hash, "Sell offer confirmed, listing active");
        Ok(updated)
    }

    /// Accept offer confirmed on the ledger: listing becomes `sold` and the
    /// asset moves to the buyer. A confirmation arriving after the listing
    /// is already sold is an external double-accept: the tracked transaction
    /// is failed and `Conflict` is returned for upstream reconciliation.
    pub async fn confirm_accept(
        &self,
        listing_id: Uuid,
        tx_hash: &str,
        buyer: &str,
    ) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        let listing = self.store.listing(listing_id)?;
        if !listing.status.may_become(ListingStatus::Sold) {
            self.finalize_tx(tx_hash, TxStatus::Failed)?;
            if listing.status == ListingStatus::Sold {
                return Err(Error::Conflict(format!(
                    "listing {listing_id} already sold; duplicate accept {tx_hash} needs manual reconciliation"
                )));
            }
            return Err(Error::Conflict(format!(
                "listing in {:?} cannot be sold",
                listing.status
            )));
        }

        let updated = self.store.update_listing(listing_id, |l| {
            l.status = ListingStatus::Sold;
            l.last_failure = None;
            Ok(())
        })?;
        self.finalize_tx(tx_hash, TxStatus::Confirmed)?;
        self.store.update_asset(&asset_id, |a| {
            a.owner = buyer.to_string();
            a.status = AssetStatus::Sold;
        })?;
        info!(listing_id = %listing_id, tx_hash, buyer, "Accept offer confirmed, listing sold");
        Ok(updated)
    }

    /// Ledger-reported fields did not match the template: fail the
    /// transaction and hand the listing back for a fresh template. A
    /// mismatched accept against an active listing fails only its own
    /// transaction; the seller's listing carries no trace of it.
    pub async fn apply_mismatch(&self, listing_id: Uuid, tx_hash: &str) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        self.finalize_tx(tx_hash, TxStatus::Failed)?;
        self.store.update_listing(listing_id, |l| {
            if l.status == ListingStatus::PendingConfirmation {
                l.status = ListingStatus::PendingTemplate;
                l.last_failure = Some(FailureReason::Mismatch);
            }
            Ok(())
        })
    }

    /// Confirmation deadline expired or the ledger rejected the
    /// transaction. A listing still awaiting its sell confirmation is
    /// invalidated and the asset released, so a stalled external signature
    /// cannot block it forever. An active listing is untouched: a buyer's
    /// failed accept fails only its own tracked transaction, leaving the
    /// on-ledger sell offer standing.
    pub async fn apply_failure(
        &self,
        listing_id: Uuid,
        tx_hash: &str,
        reason: FailureReason,
    ) -> Result<Listing, Error> {
        let asset_id = self.store.listing(listing_id)?.asset_id;
        let lock = self.store.asset_lock(&asset_id);
        let _guard = lock.lock().await;

        self.finalize_tx(tx_hash, TxStatus::Failed)?;
        let listing = self.store.listing(listing_id)?;
        if !listing.status.may_become(ListingStatus::Invalid) {
            // Active, or already resolved some other way; the tx record is
            // enough.
            return Ok(listing);
        }
        let updated = self.store.update_listing(listing_id, |l| {
            l.status = ListingStatus::Invalid;
            l.last_failure = Some(reason);
            Ok(())
        })?;
        self.release_asset(&asset_id)?;
        info!(listing_id = %listing_id, tx_hash, ?reason, "Listing invalidated, asset released");
        Ok(updated)
    }

    /// Return a released asset to `minted` unless it was sold.
    fn release_asset(&self, asset_id: &str) -> Result<(), Error> {
        self.store.update_asset(asset_id, |a| {
            if a.status != AssetStatus::Sold {
                a.status = AssetStatus::Minted;
            }
        })?;
        Ok(())
    }

    /// Finalize a tracked transaction, tolerating an already-finalized
    /// record (status transitions are monotonic).
    fn finalize_tx(&self, tx_hash: &str, status: TxStatus) -> Result<(), Error> {
        self.store.update_transaction(tx_hash, |tx| {
            if tx.status.may_become(status) {
                tx.status = status;
            }
            Ok(())
        })?;
        Ok(())
    }
}
