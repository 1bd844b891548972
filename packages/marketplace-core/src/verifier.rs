//! Transaction verifier.
//!
//! Owns every tracked transaction from submission to resolution. Validates
//! the claimed signed result against the issued template, then polls the
//! ledger collaborator until the hash is finalized or the deadline expires.
//! Confirmation polling runs as one task per tracked transaction, bounded by
//! a semaphore and cancellable through a shutdown token.

use crate::config::Config;
use crate::error::Error;
use crate::ledger::{LedgerClient, LedgerTransaction};
use crate::lifecycle::Lifecycle;
use crate::metadata::MetadataRecord;
use crate::metrics::METRICS;
use crate::model::{
    Asset, AssetStatus, FailureReason, Listing, ListingStatus, TrackedTransaction, TxKind, TxStatus,
};
use crate::ownership::OwnershipCache;
use crate::store::MemStore;
use base64::Engine as _;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Template fields a signed transaction must reproduce.
#[derive(Debug, Clone)]
struct Expected {
    kind: TxKind,
    account: String,
    asset_id: String,
    amount_drops: u64,
}

#[derive(Debug, Clone, Copy)]
enum ConfirmAction {
    Sell,
    Accept,
}

pub struct Verifier {
    store: Arc<MemStore>,
    ledger: Arc<dyn LedgerClient>,
    lifecycle: Lifecycle,
    ownership: Arc<OwnershipCache>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    confirm_deadline: Duration,
    /// Bound on the single synchronous lookup done for mint registration.
    lookup_timeout: Duration,
    max_confirm_tasks: usize,
}

impl Verifier {
    pub fn new(
        config: &Config,
        store: Arc<MemStore>,
        ledger: Arc<dyn LedgerClient>,
        lifecycle: Lifecycle,
        ownership: Arc<OwnershipCache>,
    ) -> Self {
        Self {
            store,
            ledger,
            lifecycle,
            ownership,
            permits: Arc::new(Semaphore::new(config.max_confirm_tasks)),
            shutdown: CancellationToken::new(),
            poll_interval: config.poll_interval(),
            confirm_deadline: config.confirm_deadline(),
            lookup_timeout: Duration::from_secs(config.request_timeout_secs),
            max_confirm_tasks: config.max_confirm_tasks,
        }
    }

    /// Cancel all in-flight confirmation polls (service shutdown).
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// In-flight confirmation poll tasks (for health/metrics).
    pub fn active_polls(&self) -> u64 {
        (self.max_confirm_tasks - self.permits.available_permits()) as u64
    }

    // ── Submissions ──────────────────────────────────────────────────────────

    /// Accept a candidate signed sell offer for a pending listing and start
    /// polling for its confirmation.
    pub async fn submit_sell(
        &self,
        listing_id: Uuid,
        tx_hash: &str,
        signed_payload: &str,
    ) -> Result<Listing, Error> {
        if tx_hash.is_empty() {
            return Err(Error::Validation("transaction_hash is required".into()));
        }
        let listing = self.store.listing(listing_id)?;
        if listing.status != ListingStatus::PendingTemplate {
            return Err(Error::Validation(format!(
                "listing is not in pending_template (currently {:?})",
                listing.status
            )));
        }
        let expected = Expected {
            kind: TxKind::SellOffer,
            account: listing.seller.clone(),
            asset_id: listing.asset_id.clone(),
            amount_drops: listing.price_drops,
        };
        check_declared(signed_payload, &expected)?;

        let listing = self.lifecycle.attach_sell_submission(listing_id, tx_hash).await?;
        METRICS.submissions_total.fetch_add(1, Ordering::Relaxed);
        self.spawn_confirmation(listing_id, tx_hash.to_string(), expected, ConfirmAction::Sell);
        Ok(listing)
    }

    /// Accept a candidate signed accept offer against an active listing.
    /// Multiple buyers may race; the first ledger confirmation wins.
    pub async fn submit_purchase(
        &self,
        listing_id: Uuid,
        buyer: &str,
        tx_hash: &str,
        signed_payload: &str,
    ) -> Result<Listing, Error> {
        if tx_hash.is_empty() {
            return Err(Error::Validation("transaction_hash is required".into()));
        }
        if buyer.is_empty() {
            return Err(Error::Validation("buyer_address is required".into()));
        }
        let listing = self.store.listing(listing_id)?;
        if listing.status != ListingStatus::Active {
            return Err(Error::Conflict(format!(
                "listing is not active (currently {:?})",
                listing.status
            )));
        }
        let expected = Expected {
            kind: TxKind::AcceptOffer,
            account: buyer.to_string(),
            asset_id: listing.asset_id.clone(),
            amount_drops: listing.price_drops,
        };
        check_declared(signed_payload, &expected)?;

        let listing = self
            .lifecycle
            .attach_purchase_submission(listing_id, tx_hash)
            .await?;
        METRICS.submissions_total.fetch_add(1, Ordering::Relaxed);
        self.spawn_confirmation(listing_id, tx_hash.to_string(), expected, ConfirmAction::Accept);
        Ok(listing)
    }

    /// Register an asset from an already-finalized mint transaction. Single
    /// lookup, no polling: the mint happened before the platform heard of it.
    pub async fn register_mint(
        &self,
        owner: &str,
        mint_tx_hash: &str,
        content: Value,
    ) -> Result<Asset, Error> {
        let tx = tokio::time::timeout(
            self.lookup_timeout,
            self.ledger.lookup_transaction(mint_tx_hash),
        )
        .await
        .map_err(|_| {
            Error::LedgerTimeout(format!(
                "ledger lookup for {mint_tx_hash} did not complete in time"
            ))
        })??
        .ok_or_else(|| {
            Error::NotFound(format!("mint transaction {mint_tx_hash} not found on the ledger"))
        })?;
        if !tx.finalized {
            return Err(Error::Conflict(
                "mint transaction is not finalized yet; retry once it validates".into(),
            ));
        }
        if !tx.success {
            return Err(Error::Validation(
                "mint transaction was rejected by the ledger".into(),
            ));
        }
        if tx.kind != TxKind::Mint {
            return Err(Error::Validation(format!(
                "transaction {mint_tx_hash} is not a mint"
            )));
        }
        if tx.account != owner {
            return Err(Error::Validation(
                "owner_address does not match the minting account".into(),
            ));
        }
        let asset_id = tx
            .asset_id
            .ok_or_else(|| Error::Ledger("mint transaction reports no token id".into()))?;

        if self.store.asset(&asset_id).is_ok() {
            return Err(Error::Conflict(format!(
                "asset {asset_id} is already registered"
            )));
        }
        crate::metadata::validate_content(&content)?;
        self.store.insert_transaction(TrackedTransaction {
            hash: mint_tx_hash.to_string(),
            kind: TxKind::Mint,
            status: TxStatus::Confirmed,
            listing_id: None,
            asset_id: asset_id.clone(),
            submitted_at: crate::model::now_secs(),
        })?;

        let record = MetadataRecord::new(content);
        let asset = Asset {
            id: asset_id.clone(),
            owner: owner.to_string(),
            mint_tx: mint_tx_hash.to_string(),
            metadata_id: record.id,
            fingerprint: record.fingerprint.clone(),
            status: AssetStatus::Minted,
            created_at: crate::model::now_secs(),
        };
        self.store.insert_metadata(record)?;
        self.store.insert_asset(asset.clone())?;
        info!(asset_id = %asset_id, owner, mint_tx = mint_tx_hash, "Asset registered from verified mint");
        Ok(asset)
    }

    // ── Confirmation polling ─────────────────────────────────────────────────

    fn spawn_confirmation(
        &self,
        listing_id: Uuid,
        tx_hash: String,
        expected: Expected,
        action: ConfirmAction,
    ) {
        let task = PollTask {
            ledger: Arc::clone(&self.ledger),
            lifecycle: self.lifecycle.clone(),
            ownership: Arc::clone(&self.ownership),
            permits: Arc::clone(&self.permits),
            cancel: self.shutdown.child_token(),
            poll_interval: self.poll_interval,
            deadline: self.confirm_deadline,
            listing_id,
            tx_hash,
            expected,
            action,
        };
        tokio::spawn(task.run());
    }
}

struct PollTask {
    ledger: Arc<dyn LedgerClient>,
    lifecycle: Lifecycle,
    ownership: Arc<OwnershipCache>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    poll_interval: Duration,
    deadline: Duration,
    listing_id: Uuid,
    tx_hash: String,
    expected: Expected,
    action: ConfirmAction,
}

impl PollTask {
    async fn run(self) {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };
        let start = Instant::now();
        let deadline = start + self.deadline;

        loop {
            match self.ledger.lookup_transaction(&self.tx_hash).await {
                Ok(Some(tx)) if tx.finalized => {
                    self.resolve(tx).await;
                    METRICS.record_confirm_duration(start.into_std());
                    return;
                }
                // Unknown or not yet finalized: keep polling.
                Ok(_) => {}
                Err(e) => {
                    warn!(tx_hash = %self.tx_hash, error = %e, "Ledger lookup failed, will retry");
                }
            }

            if Instant::now() >= deadline {
                METRICS.timeouts_total.fetch_add(1, Ordering::Relaxed);
                warn!(
                    listing_id = %self.listing_id,
                    tx_hash = %self.tx_hash,
                    "Confirmation deadline exceeded"
                );
                if let Err(e) = self
                    .lifecycle
                    .apply_failure(self.listing_id, &self.tx_hash, FailureReason::Timeout)
                    .await
                {
                    error!(listing_id = %self.listing_id, error = %e, "Failed to apply timeout");
                }
                METRICS.record_confirm_duration(start.into_std());
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(tx_hash = %self.tx_hash, "Confirmation poll cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// The hash is finalized on the ledger; drive the listing accordingly.
    async fn resolve(&self, tx: LedgerTransaction) {
        if !tx.success {
            METRICS.rejects_total.fetch_add(1, Ordering::Relaxed);
            warn!(tx_hash = %self.tx_hash, "Transaction finalized unsuccessfully");
            if let Err(e) = self
                .lifecycle
                .apply_failure(self.listing_id, &self.tx_hash, FailureReason::Rejected)
                .await
            {
                error!(listing_id = %self.listing_id, error = %e, "Failed to apply rejection");
            }
            return;
        }

        if !fields_match(&tx, &self.expected) {
            METRICS.mismatches_total.fetch_add(1, Ordering::Relaxed);
            warn!(
                listing_id = %self.listing_id,
                tx_hash = %self.tx_hash,
                "Confirmed transaction does not match its template"
            );
            if let Err(e) = self.lifecycle.apply_mismatch(self.listing_id, &self.tx_hash).await {
                error!(listing_id = %self.listing_id, error = %e, "Failed to apply mismatch");
            }
            return;
        }

        match self.action {
            ConfirmAction::Sell => {
                match self
                    .lifecycle
                    .confirm_sell(self.listing_id, &self.tx_hash, tx.offer_id.clone())
                    .await
                {
                    Ok(listing) => {
                        METRICS.confirms_total.fetch_add(1, Ordering::Relaxed);
                        self.ownership.apply(
                            &listing.asset_id,
                            &self.tx_hash,
                            listing.seller.clone(),
                            AssetStatus::Listed,
                        );
                    }
                    Err(e) => {
                        error!(listing_id = %self.listing_id, error = %e, "Sell confirmation not applied");
                    }
                }
            }
            ConfirmAction::Accept => {
                match self
                    .lifecycle
                    .confirm_accept(self.listing_id, &self.tx_hash, &tx.account)
                    .await
                {
                    Ok(listing) => {
                        METRICS.confirms_total.fetch_add(1, Ordering::Relaxed);
                        self.ownership.apply(
                            &listing.asset_id,
                            &self.tx_hash,
                            tx.account.clone(),
                            AssetStatus::Sold,
                        );
                    }
                    Err(Error::Conflict(msg)) => {
                        METRICS.double_accepts_total.fetch_add(1, Ordering::Relaxed);
                        error!(
                            listing_id = %self.listing_id,
                            tx_hash = %self.tx_hash,
                            "Late accept confirmation: {msg}"
                        );
                    }
                    Err(e) => {
                        error!(listing_id = %self.listing_id, error = %e, "Accept confirmation not applied");
                    }
                }
            }
        }
    }
}

/// Compare the ledger's report of a transaction against the template it was
/// issued for.
fn fields_match(tx: &LedgerTransaction, expected: &Expected) -> bool {
    tx.kind == expected.kind
        && tx.account == expected.account
        && tx.asset_id.as_deref() == Some(expected.asset_id.as_str())
        && tx.amount_drops == Some(expected.amount_drops)
}

/// Validate the declared fields inside a claimed signed payload before
/// tracking it. The payload is a base64 JSON blob produced by the external
/// signer; a declared field differing from the template is rejected
/// immediately so the listing never leaves `pending_template`.
fn check_declared(payload_b64: &str, expected: &Expected) -> Result<(), Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload_b64.trim())
        .map_err(|_| Error::Validation("signed_payload is not valid base64".into()))?;
    let declared: Value = serde_json::from_slice(&bytes)
        .map_err(|_| Error::Validation("signed_payload does not decode to JSON".into()))?;

    let field = |name: &str| declared.get(name).and_then(Value::as_str).unwrap_or_default();

    if field("TransactionType") != expected.kind.wire_name() {
        return Err(Error::TransactionMismatch(format!(
            "declared transaction type {:?} does not match the template",
            field("TransactionType")
        )));
    }
    if field("Account") != expected.account {
        return Err(Error::TransactionMismatch(
            "declared account does not match the template".into(),
        ));
    }
    if field("NFTokenID") != expected.asset_id {
        return Err(Error::TransactionMismatch(
            "declared token id does not match the template".into(),
        ));
    }
    if field("Amount") != expected.amount_drops.to_string() {
        return Err(Error::TransactionMismatch(
            "declared amount does not match the template".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted ledger: tests insert exactly the facts the ledger should
    /// report.
    #[derive(Default)]
    struct FakeLedger {
        txs: Mutex<HashMap<String, LedgerTransaction>>,
    }

    impl FakeLedger {
        fn insert(&self, tx: LedgerTransaction) {
            self.txs
                .lock()
                .unwrap()
                .insert(tx.hash.clone(), tx);
        }

        fn sell_offer(hash: &str, seller: &str, asset: &str, amount: u64) -> LedgerTransaction {
            LedgerTransaction {
                hash: hash.into(),
                kind: TxKind::SellOffer,
                account: seller.into(),
                destination: None,
                asset_id: Some(asset.into()),
                amount_drops: Some(amount),
                offer_id: Some(format!("OFFER-{hash}")),
                finalized: true,
                success: true,
            }
        }

        fn accept_offer(hash: &str, buyer: &str, asset: &str, amount: u64) -> LedgerTransaction {
            LedgerTransaction {
                hash: hash.into(),
                kind: TxKind::AcceptOffer,
                account: buyer.into(),
                destination: None,
                asset_id: Some(asset.into()),
                amount_drops: Some(amount),
                offer_id: None,
                finalized: true,
                success: true,
            }
        }

        fn mint(hash: &str, minter: &str, asset: &str) -> LedgerTransaction {
            LedgerTransaction {
                hash: hash.into(),
                kind: TxKind::Mint,
                account: minter.into(),
                destination: None,
                asset_id: Some(asset.into()),
                amount_drops: None,
                offer_id: None,
                finalized: true,
                success: true,
            }
        }
    }

    #[async_trait]
    impl LedgerClient for FakeLedger {
        async fn lookup_transaction(
            &self,
            hash: &str,
        ) -> Result<Option<LedgerTransaction>, Error> {
            Ok(self.txs.lock().unwrap().get(hash).cloned())
        }
    }

    struct Harness {
        store: Arc<MemStore>,
        ledger: Arc<FakeLedger>,
        lifecycle: Lifecycle,
        verifier: Verifier,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(FakeLedger::default());
        let lifecycle = Lifecycle::new(Arc::clone(&store));
        let ownership = Arc::new(OwnershipCache::new(Arc::clone(&store)));
        let config = Config {
            poll_interval_ms: 50,
            confirm_deadline_secs: 2,
            max_confirm_tasks: 4,
            ..Config::default()
        };
        let verifier = Verifier::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            lifecycle.clone(),
            ownership,
        );
        Harness {
            store,
            ledger,
            lifecycle,
            verifier,
        }
    }

    async fn seed_asset(h: &Harness, asset: &str, owner: &str) {
        h.ledger.insert(FakeLedger::mint("MINT-1", owner, asset));
        h.verifier
            .register_mint(owner, "MINT-1", json!({"name": "Sunset"}))
            .await
            .unwrap();
    }

    fn payload(kind: TxKind, account: &str, asset: &str, amount: u64) -> String {
        let declared = json!({
            "TransactionType": kind.wire_name(),
            "Account": account,
            "NFTokenID": asset,
            "Amount": amount.to_string(),
            "TxnSignature": "DEADBEEF",
        });
        base64::engine::general_purpose::STANDARD.encode(declared.to_string())
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_confirmed_sell_offer_activates_listing() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, unsigned) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();
        assert_eq!(unsigned.template["Amount"], "100");

        h.ledger
            .insert(FakeLedger::sell_offer("T1", "rSeller", "000A1", 100));
        let accepted = h
            .verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();
        assert_eq!(accepted.status, ListingStatus::PendingConfirmation);

        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Active).await;
        let active = h.store.listing(listing.id).unwrap();
        assert_eq!(active.offer_id.as_deref(), Some("OFFER-T1"));
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_accept_offer_sells_and_late_accept_conflicts() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();
        h.ledger
            .insert(FakeLedger::sell_offer("T1", "rSeller", "000A1", 100));
        h.verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Active).await;

        // Two buyers race. T2 is already confirmed; T3 confirms later.
        h.ledger
            .insert(FakeLedger::accept_offer("T2", "rBuyer", "000A1", 100));
        h.verifier
            .submit_purchase(listing.id, "rBuyer", "T2", &payload(TxKind::AcceptOffer, "rBuyer", "000A1", 100))
            .await
            .unwrap();
        h.verifier
            .submit_purchase(listing.id, "rOther", "T3", &payload(TxKind::AcceptOffer, "rOther", "000A1", 100))
            .await
            .unwrap();

        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Sold).await;
        assert_eq!(h.store.asset("000A1").unwrap().owner, "rBuyer");

        // The ledger later "confirms" the second accept as well.
        h.ledger
            .insert(FakeLedger::accept_offer("T3", "rOther", "000A1", 100));
        let store = Arc::clone(&h.store);
        wait_for(move || {
            store.transaction("T3").map(|t| t.status) == Some(TxStatus::Failed)
        })
        .await;

        // First buyer keeps the asset.
        assert_eq!(h.store.asset("000A1").unwrap().owner, "rBuyer");
        assert_eq!(h.store.listing(listing.id).unwrap().status, ListingStatus::Sold);
    }

    #[tokio::test(start_paused = true)]
    async fn purchase_submission_after_sale_conflicts() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();
        h.ledger
            .insert(FakeLedger::sell_offer("T1", "rSeller", "000A1", 100));
        h.verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Active).await;

        h.ledger
            .insert(FakeLedger::accept_offer("T2", "rBuyer", "000A1", 100));
        h.verifier
            .submit_purchase(listing.id, "rBuyer", "T2", &payload(TxKind::AcceptOffer, "rBuyer", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Sold).await;

        let err = h
            .verifier
            .submit_purchase(listing.id, "rLate", "T9", &payload(TxKind::AcceptOffer, "rLate", "000A1", 100))
            .await;
        assert!(matches!(err, Err(Error::Conflict(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_transaction_times_out_and_releases_asset() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();

        // The ledger never hears of T1.
        h.verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();

        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Invalid).await;
        let dead = h.store.listing(listing.id).unwrap();
        assert_eq!(dead.last_failure, Some(FailureReason::Timeout));
        assert_eq!(h.store.transaction("T1").unwrap().status, TxStatus::Failed);

        // The asset is listable again.
        assert!(h.lifecycle.create_listing("000A1", "rSeller", 50).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn ledger_field_mismatch_returns_listing_for_retry() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();

        // The signed blob declared the right amount, but the ledger reports
        // a different one.
        h.ledger
            .insert(FakeLedger::sell_offer("T1", "rSeller", "000A1", 999));
        h.verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();

        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::PendingTemplate).await;
        let back = h.store.listing(listing.id).unwrap();
        assert_eq!(back.last_failure, Some(FailureReason::Mismatch));

        // Retry with a fresh hash succeeds.
        h.ledger
            .insert(FakeLedger::sell_offer("T2", "rSeller", "000A1", 100));
        h.verifier
            .submit_sell(listing.id, "T2", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Active).await;
    }

    #[tokio::test(start_paused = true)]
    async fn declared_amount_mismatch_is_rejected_synchronously() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();

        let err = h
            .verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 50))
            .await;
        assert!(matches!(err, Err(Error::TransactionMismatch(_))));

        // Listing never left pending_template and the hash was not tracked.
        assert_eq!(
            h.store.listing(listing.id).unwrap().status,
            ListingStatus::PendingTemplate
        );
        assert!(h.store.transaction("T1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_hash_across_listings_conflicts() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        h.ledger.insert(FakeLedger::mint("MINT-2", "rSeller", "000A2"));
        h.verifier
            .register_mint("rSeller", "MINT-2", json!({"name": "Dawn"}))
            .await
            .unwrap();

        let (l1, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();
        let (l2, _) = h.lifecycle.create_listing("000A2", "rSeller", 100).await.unwrap();

        h.verifier
            .submit_sell(l1.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();
        let err = h
            .verifier
            .submit_sell(l2.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A2", 100))
            .await;
        assert!(matches!(err, Err(Error::Conflict(_))));
        assert_eq!(
            h.store.listing(l2.id).unwrap().status,
            ListingStatus::PendingTemplate
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_transaction_invalidates_listing() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();

        let mut tx = FakeLedger::sell_offer("T1", "rSeller", "000A1", 100);
        tx.success = false;
        h.ledger.insert(tx);
        h.verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();

        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Invalid).await;
        assert_eq!(
            h.store.listing(listing.id).unwrap().last_failure,
            Some(FailureReason::Rejected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn buyer_failures_leave_listing_active() {
        let h = harness();
        seed_asset(&h, "000A1", "rSeller").await;
        let (listing, _) = h.lifecycle.create_listing("000A1", "rSeller", 100).await.unwrap();
        h.ledger
            .insert(FakeLedger::sell_offer("T1", "rSeller", "000A1", 100));
        h.verifier
            .submit_sell(listing.id, "T1", &payload(TxKind::SellOffer, "rSeller", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Active).await;

        // T2 never reaches the ledger and times out.
        h.verifier
            .submit_purchase(listing.id, "rBuyer", "T2", &payload(TxKind::AcceptOffer, "rBuyer", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        wait_for(move || {
            store.transaction("T2").map(|t| t.status) == Some(TxStatus::Failed)
        })
        .await;

        // T3 is finalized by the ledger but unsuccessful.
        let mut rejected = FakeLedger::accept_offer("T3", "rOther", "000A1", 100);
        rejected.success = false;
        h.ledger.insert(rejected);
        h.verifier
            .submit_purchase(listing.id, "rOther", "T3", &payload(TxKind::AcceptOffer, "rOther", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        wait_for(move || {
            store.transaction("T3").map(|t| t.status) == Some(TxStatus::Failed)
        })
        .await;

        // The seller's listing and asset are untouched by either failure.
        let survivor = h.store.listing(listing.id).unwrap();
        assert_eq!(survivor.status, ListingStatus::Active);
        assert_eq!(survivor.last_failure, None);
        let asset = h.store.asset("000A1").unwrap();
        assert_eq!(asset.owner, "rSeller");
        assert_eq!(asset.status, AssetStatus::Listed);

        // A well-behaved buyer can still complete the purchase.
        h.ledger
            .insert(FakeLedger::accept_offer("T4", "rBuyer", "000A1", 100));
        h.verifier
            .submit_purchase(listing.id, "rBuyer", "T4", &payload(TxKind::AcceptOffer, "rBuyer", "000A1", 100))
            .await
            .unwrap();
        let store = Arc::clone(&h.store);
        let id = listing.id;
        wait_for(move || store.listing(id).unwrap().status == ListingStatus::Sold).await;
        assert_eq!(h.store.asset("000A1").unwrap().owner, "rBuyer");
    }

    /// Ledger that never answers, for lookup-deadline coverage.
    struct StalledLedger;

    #[async_trait]
    impl LedgerClient for StalledLedger {
        async fn lookup_transaction(
            &self,
            _hash: &str,
        ) -> Result<Option<LedgerTransaction>, Error> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_mint_lookup_times_out() {
        let store = Arc::new(MemStore::new());
        let lifecycle = Lifecycle::new(Arc::clone(&store));
        let ownership = Arc::new(OwnershipCache::new(Arc::clone(&store)));
        let verifier = Verifier::new(
            &Config::default(),
            Arc::clone(&store),
            Arc::new(StalledLedger) as Arc<dyn LedgerClient>,
            lifecycle,
            ownership,
        );

        let err = verifier
            .register_mint("rSeller", "MINT-1", json!({"name": "Sunset"}))
            .await;
        assert!(matches!(err, Err(Error::LedgerTimeout(_))));
        assert!(store.transaction("MINT-1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn mint_registration_guards() {
        let h = harness();
        h.ledger.insert(FakeLedger::mint("MINT-1", "rSeller", "000A1"));

        assert!(matches!(
            h.verifier.register_mint("rSeller", "MISSING", json!({})).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            h.verifier.register_mint("rMallory", "MINT-1", json!({})).await,
            Err(Error::Validation(_))
        ));

        let asset = h
            .verifier
            .register_mint("rSeller", "MINT-1", json!({"name": "Sunset"}))
            .await
            .unwrap();
        assert_eq!(asset.id, "000A1");
        assert_eq!(asset.status, AssetStatus::Minted);

        // Replaying the mint hash is a conflict.
        assert!(matches!(
            h.verifier.register_mint("rSeller", "MINT-1", json!({})).await,
            Err(Error::Conflict(_))
        ));
    }
}
