//! Ownership cache.
//!
//! Read-through projection of current asset ownership, updated only from
//! verified transactions. Derived and rebuildable; never an authoritative
//! input to a decision (double-sell prevention lives in the listing state
//! machine under the asset lock).

use crate::model::{Address, AssetStatus, TxHash};
use crate::store::MemStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct OwnerEntry {
    pub owner: Address,
    pub status: AssetStatus,
    /// Hash of the confirmed transaction that produced this entry.
    pub last_tx: TxHash,
}

pub struct OwnershipCache {
    store: Arc<MemStore>,
    entries: Mutex<HashMap<String, OwnerEntry>>,
}

impl OwnershipCache {
    pub fn new(store: Arc<MemStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Last confirmed owner of the asset. Misses fall through to the store
    /// and populate the cache.
    pub fn get(&self, asset_id: &str) -> Option<OwnerEntry> {
        {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get(asset_id) {
                return Some(entry.clone());
            }
        }
        let asset = self.store.asset(asset_id).ok()?;
        let entry = OwnerEntry {
            owner: asset.owner,
            status: asset.status,
            last_tx: asset.mint_tx,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(asset_id.to_string(), entry.clone());
        Some(entry)
    }

    /// Apply a confirmed transaction outcome. Idempotent: the same hash
    /// applied twice is a no-op. Returns whether the entry changed.
    pub fn apply(&self, asset_id: &str, tx_hash: &str, owner: Address, status: AssetStatus) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(asset_id) {
            if existing.last_tx == tx_hash {
                return false;
            }
        }
        debug!(asset_id, tx_hash, owner = %owner, "Ownership cache updated");
        entries.insert(
            asset_id.to_string(),
            OwnerEntry {
                owner,
                status,
                last_tx: tx_hash.to_string(),
            },
        );
        true
    }

    /// Drop everything and repopulate from the store.
    pub fn rebuild(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        for asset in self.store.assets() {
            entries.insert(
                asset.id.clone(),
                OwnerEntry {
                    owner: asset.owner,
                    status: asset.status,
                    last_tx: asset.mint_tx,
                },
            );
        }
    }
}
