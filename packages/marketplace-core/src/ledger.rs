//! Ledger collaborator client.
//!
//! The ledger is consumed as an opaque fact source: the core only ever asks
//! "is this transaction hash accepted, and what does it say". The HTTP
//! implementation speaks JSON-RPC with primary → fallback failover and a
//! circuit breaker.

use crate::error::Error;
use crate::model::{Address, AssetId, TxHash, TxKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

/// What the ledger reports about a transaction hash.
#[derive(Debug, Clone)]
pub struct LedgerTransaction {
    pub hash: TxHash,
    pub kind: TxKind,
    pub account: Address,
    pub destination: Option<Address>,
    pub asset_id: Option<AssetId>,
    pub amount_drops: Option<u64>,
    /// Ledger-assigned offer id, present once a create-offer is applied.
    pub offer_id: Option<String>,
    /// Included in a validated ledger. Only finalized transactions drive
    /// state transitions.
    pub finalized: bool,
    /// Engine result was success. A finalized-but-failed transaction is
    /// treated like a rejection.
    pub success: bool,
}

/// Read-only view of the ledger. `Ok(None)` means the hash is unknown,
/// which during polling is treated as "not confirmed yet".
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn lookup_transaction(&self, hash: &str) -> Result<Option<LedgerTransaction>, Error>;

    /// Connectivity check for health reporting.
    async fn health_check(&self) -> Result<&'static str, Error> {
        Ok("ok")
    }

    /// Endpoint currently serving lookups, when known.
    fn active_endpoint(&self) -> Option<String> {
        None
    }

    fn failover_count(&self) -> u64 {
        0
    }
}

// ── HTTP implementation ──────────────────────────────────────────────────────

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// JSON-RPC ledger client with primary → fallback failover.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    primary_url: String,
    fallback_url: String,
    circuit: Mutex<CircuitState>,
    total_failovers: AtomicU64,
}

impl HttpLedgerClient {
    pub fn new(primary_url: &str, fallback_url: &str) -> Self {
        info!(
            primary = primary_url,
            fallback = fallback_url,
            "Ledger client initialized with failover"
        );
        Self {
            http: reqwest::Client::new(),
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            total_failovers: AtomicU64::new(0),
        }
    }

    async fn rpc(&self, url: &str, body: &Value) -> Result<Value, Error> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Ledger(format!("request to {url} failed: {e}")))?;
        resp.json::<Value>()
            .await
            .map_err(|e| Error::Ledger(format!("invalid JSON from {url}: {e}")))
    }

    /// Active provider first, fallback on error.
    async fn rpc_with_failover(&self, body: &Value) -> Result<Value, Error> {
        let active = self.active_url().to_string();
        match self.rpc(&active, body).await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "Primary ledger RPC failed, trying fallback");
                self.rpc(&self.fallback_url, body).await.map_err(|e2| {
                    Error::Ledger(format!("both ledger RPCs failed: primary={e}, fallback={e2}"))
                })
            }
        }
    }

    // ── Circuit breaker ──────────────────────────────────────────────────────

    fn record_success(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary ledger recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        crate::metrics::METRICS
            .ledger_errors
            .fetch_add(1, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_failovers.fetch_add(1, Ordering::Relaxed);
            crate::metrics::METRICS
                .ledger_failovers
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened — routing to fallback ledger"
            );
        }
    }

    fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        // Half-open: retry primary after the window.
        if now_ms() - circuit.last_failure_ms > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn lookup_transaction(&self, hash: &str) -> Result<Option<LedgerTransaction>, Error> {
        let body = json!({
            "method": "tx",
            "params": [{"transaction": hash, "binary": false}],
        });
        let resp = self.rpc_with_failover(&body).await?;
        parse_tx_response(hash, &resp)
    }

    /// Quick connectivity check. Returns "ok", "degraded", or error.
    async fn health_check(&self) -> Result<&'static str, Error> {
        let body = json!({"method": "server_info", "params": [{}]});
        if self.rpc(&self.primary_url, &body).await.is_ok() {
            return Ok("ok");
        }
        match self.rpc(&self.fallback_url, &body).await {
            Ok(_) => Ok("degraded"),
            Err(e) => Err(Error::Ledger(format!("both ledgers unreachable: {e}"))),
        }
    }

    fn active_endpoint(&self) -> Option<String> {
        Some(self.active_url().to_string())
    }

    fn failover_count(&self) -> u64 {
        self.total_failovers.load(Ordering::Relaxed)
    }
}

/// Parse a `tx` lookup response. Unknown hashes come back as an error object
/// rather than a result, and map to `Ok(None)`.
fn parse_tx_response(hash: &str, resp: &Value) -> Result<Option<LedgerTransaction>, Error> {
    let result = resp
        .get("result")
        .ok_or_else(|| Error::Ledger("tx response missing result".into()))?;

    if let Some(err) = result.get("error").and_then(Value::as_str) {
        if err == "txnNotFound" {
            return Ok(None);
        }
        return Err(Error::Ledger(format!("tx lookup failed: {err}")));
    }

    let kind_name = result
        .get("TransactionType")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Ledger("tx response missing TransactionType".into()))?;
    // A hash pointing at an unrelated transaction kind cannot be modeled,
    // only reported.
    let kind = TxKind::from_wire(kind_name)
        .ok_or_else(|| Error::Ledger(format!("unsupported transaction type {kind_name}")))?;

    let account = result
        .get("Account")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Ledger("tx response missing Account".into()))?
        .to_string();

    let amount_drops = result
        .get("Amount")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok());

    let meta = result.get("meta");
    let engine_result = meta
        .and_then(|m| m.get("TransactionResult"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(Some(LedgerTransaction {
        hash: hash.to_string(),
        kind,
        account,
        destination: result
            .get("Destination")
            .and_then(Value::as_str)
            .map(str::to_string),
        asset_id: result
            .get("NFTokenID")
            .or_else(|| meta.and_then(|m| m.get("nftoken_id")))
            .and_then(Value::as_str)
            .map(str::to_string),
        amount_drops,
        offer_id: meta
            .and_then(|m| m.get("offer_id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        finalized: result
            .get("validated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        success: engine_result == "tesSUCCESS",
    }))
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
