//! In-memory system of record.
//!
//! The store is the single source of truth; the ownership cache is a derived
//! projection and never feeds decisions. Mutations that affect a given
//! asset's listing state must run under that asset's lock (`asset_lock`),
//! which is what serializes concurrent sell/buy attempts on the same asset.
//! Operations on different assets proceed fully in parallel.

use crate::error::Error;
use crate::metadata::MetadataRecord;
use crate::model::{Asset, AssetId, Listing, TrackedTransaction, TxHash};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    assets: HashMap<AssetId, Asset>,
    listings: HashMap<Uuid, Listing>,
    listings_by_asset: HashMap<AssetId, Vec<Uuid>>,
    transactions: HashMap<TxHash, TrackedTransaction>,
    metadata: HashMap<Uuid, MetadataRecord>,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
    /// Per-asset exclusive locks. Entries are created on first use and kept
    /// for the life of the asset.
    asset_locks: Mutex<HashMap<AssetId, Arc<AsyncMutex<()>>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The exclusive lock serializing listing-state mutations for one asset.
    /// Never held across ledger I/O.
    pub fn asset_lock(&self, asset_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.asset_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(asset_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    // ── Assets ───────────────────────────────────────────────────────────────

    pub fn asset(&self, id: &str) -> Result<Asset, Error> {
        self.lock()
            .assets
            .get(id)
            .cloned()
            .ok_or_else(|| Error::asset_not_found(id))
    }

    pub fn insert_asset(&self, asset: Asset) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.assets.contains_key(&asset.id) {
            return Err(Error::Conflict(format!(
                "asset {} is already registered",
                asset.id
            )));
        }
        inner.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    pub fn update_asset(
        &self,
        id: &str,
        f: impl FnOnce(&mut Asset),
    ) -> Result<Asset, Error> {
        let mut inner = self.lock();
        let asset = inner
            .assets
            .get_mut(id)
            .ok_or_else(|| Error::asset_not_found(id))?;
        f(asset);
        Ok(asset.clone())
    }

    // ── Listings ─────────────────────────────────────────────────────────────

    pub fn listing(&self, id: Uuid) -> Result<Listing, Error> {
        self.lock()
            .listings
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::listing_not_found(id))
    }

    /// The listing currently blocking this asset, if any. At most one exists
    /// at any time; callers must hold the asset lock before acting on it.
    pub fn open_listing_for_asset(&self, asset_id: &str) -> Option<Listing> {
        let inner = self.lock();
        let ids = inner.listings_by_asset.get(asset_id)?;
        ids.iter()
            .filter_map(|id| inner.listings.get(id))
            .find(|l| l.status.is_open())
            .cloned()
    }

    pub fn insert_listing(&self, listing: Listing) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.listings.contains_key(&listing.id) {
            return Err(Error::Conflict(format!(
                "listing {} already exists",
                listing.id
            )));
        }
        inner
            .listings_by_asset
            .entry(listing.asset_id.clone())
            .or_default()
            .push(listing.id);
        inner.listings.insert(listing.id, listing);
        Ok(())
    }

    /// Apply a fallible mutation to a listing. The updated record is
    /// returned; on `Err` nothing is persisted.
    pub fn update_listing(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Listing) -> Result<(), Error>,
    ) -> Result<Listing, Error> {
        let mut inner = self.lock();
        let listing = inner
            .listings
            .get_mut(&id)
            .ok_or_else(|| Error::listing_not_found(id))?;
        let mut candidate = listing.clone();
        f(&mut candidate)?;
        candidate.updated_at = crate::model::now_secs();
        *listing = candidate.clone();
        Ok(candidate)
    }

    pub fn active_listings(&self) -> Vec<Listing> {
        let inner = self.lock();
        let mut listings: Vec<Listing> = inner
            .listings
            .values()
            .filter(|l| l.status == crate::model::ListingStatus::Active)
            .cloned()
            .collect();
        listings.sort_by_key(|l| l.created_at);
        listings
    }

    /// Count of listings in a non-terminal state for one asset. Test and
    /// diagnostics helper for the single-active-listing invariant.
    pub fn open_listing_count(&self, asset_id: &str) -> usize {
        let inner = self.lock();
        inner
            .listings_by_asset
            .get(asset_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.listings.get(id))
                    .filter(|l| l.status.is_open())
                    .count()
            })
            .unwrap_or(0)
    }

    // ── Tracked transactions ─────────────────────────────────────────────────

    pub fn transaction(&self, hash: &str) -> Option<TrackedTransaction> {
        self.lock().transactions.get(hash).cloned()
    }

    /// Insert a tracked transaction. The hash is the idempotency key: a hash
    /// already tracked for any listing is rejected.
    pub fn insert_transaction(&self, tx: TrackedTransaction) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.transactions.contains_key(&tx.hash) {
            return Err(Error::Conflict(format!(
                "transaction {} is already tracked",
                tx.hash
            )));
        }
        inner.transactions.insert(tx.hash.clone(), tx);
        Ok(())
    }

    pub fn update_transaction(
        &self,
        hash: &str,
        f: impl FnOnce(&mut TrackedTransaction) -> Result<(), Error>,
    ) -> Result<TrackedTransaction, Error> {
        let mut inner = self.lock();
        let tx = inner
            .transactions
            .get_mut(hash)
            .ok_or_else(|| Error::NotFound(format!("transaction {hash} not tracked")))?;
        let mut candidate = tx.clone();
        f(&mut candidate)?;
        *tx = candidate.clone();
        Ok(candidate)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn metadata_record(&self, id: Uuid) -> Result<MetadataRecord, Error> {
        self.lock()
            .metadata
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("metadata record {id} not found")))
    }

    pub fn insert_metadata(&self, record: MetadataRecord) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.metadata.contains_key(&record.id) {
            return Err(Error::Conflict(format!(
                "metadata record {} already exists",
                record.id
            )));
        }
        inner.metadata.insert(record.id, record);
        Ok(())
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.lock().assets.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fingerprint_of;
    use crate::model::{Listing, ListingStatus, TrackedTransaction, TxKind};
    use serde_json::json;

    fn test_asset(id: &str, owner: &str) -> Asset {
        let content = json!({"name": "test"});
        Asset {
            id: id.into(),
            owner: owner.into(),
            mint_tx: format!("MINT-{id}"),
            metadata_id: Uuid::new_v4(),
            fingerprint: fingerprint_of(&content),
            status: crate::model::AssetStatus::Minted,
            created_at: crate::model::now_secs(),
        }
    }

    #[test]
    fn duplicate_asset_registration_conflicts() {
        let store = MemStore::new();
        store.insert_asset(test_asset("A1", "rSeller")).unwrap();
        assert!(matches!(
            store.insert_asset(test_asset("A1", "rOther")),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn duplicate_transaction_hash_conflicts() {
        let store = MemStore::new();
        let tx = TrackedTransaction::submitted("T1".into(), TxKind::SellOffer, None, "A1".into());
        store.insert_transaction(tx.clone()).unwrap();
        let replay =
            TrackedTransaction::submitted("T1".into(), TxKind::AcceptOffer, None, "A2".into());
        assert!(matches!(
            store.insert_transaction(replay),
            Err(Error::Conflict(_))
        ));
        // The first record is untouched.
        assert_eq!(store.transaction("T1").unwrap().kind, TxKind::SellOffer);
    }

    #[test]
    fn update_listing_rolls_back_on_error() {
        let store = MemStore::new();
        let asset = test_asset("A1", "rSeller");
        let listing = Listing::new("A1".into(), "rSeller".into(), 100, asset.fingerprint);
        let id = listing.id;
        store.insert_listing(listing).unwrap();

        let err = store.update_listing(id, |l| {
            l.status = ListingStatus::Active;
            Err(Error::Conflict("nope".into()))
        });
        assert!(err.is_err());
        assert_eq!(store.listing(id).unwrap().status, ListingStatus::PendingTemplate);
    }

    #[test]
    fn open_listing_lookup_ignores_terminal_listings() {
        let store = MemStore::new();
        let asset = test_asset("A1", "rSeller");
        let mut dead = Listing::new("A1".into(), "rSeller".into(), 100, asset.fingerprint.clone());
        dead.status = ListingStatus::Cancelled;
        store.insert_listing(dead).unwrap();
        assert!(store.open_listing_for_asset("A1").is_none());

        let live = Listing::new("A1".into(), "rSeller".into(), 100, asset.fingerprint);
        let live_id = live.id;
        store.insert_listing(live).unwrap();
        assert_eq!(store.open_listing_for_asset("A1").unwrap().id, live_id);
        assert_eq!(store.open_listing_count("A1"), 1);
    }
}
