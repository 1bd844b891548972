//! Application state shared across handlers.

use crate::config::Config;
use crate::ledger::LedgerClient;
use crate::lifecycle::Lifecycle;
use crate::ownership::OwnershipCache;
use crate::store::MemStore;
use crate::verifier::Verifier;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<MemStore>,
    pub ledger: Arc<dyn LedgerClient>,
    pub lifecycle: Lifecycle,
    pub verifier: Verifier,
    pub ownership: Arc<OwnershipCache>,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Create application state from configuration and a ledger client.
    pub fn new(config: Config, ledger: Arc<dyn LedgerClient>) -> Self {
        let store = Arc::new(MemStore::new());
        let lifecycle = Lifecycle::new(Arc::clone(&store));
        let ownership = Arc::new(OwnershipCache::new(Arc::clone(&store)));
        let verifier = Verifier::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&ledger),
            lifecycle.clone(),
            Arc::clone(&ownership),
        );
        Self {
            config,
            store,
            ledger,
            lifecycle,
            verifier,
            ownership,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }
}
