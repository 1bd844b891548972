//! Error types for the marketplace core.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

/// Marketplace error type.
///
/// Every variant except `Config` is recoverable at the API boundary and
/// returned to the client as a structured response.
#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed or out-of-range input. The client must correct and resend.
    Validation(String),
    /// Missing asset, listing, or tracked transaction.
    NotFound(String),
    /// State-machine violation: double listing, duplicate transaction hash,
    /// double accept.
    Conflict(String),
    /// Signed payload does not match the issued template. The listing
    /// returns to `pending_template`; the client may retry with a fresh
    /// template.
    TransactionMismatch(String),
    /// Confirmation deadline exceeded. The listing moved to `invalid`.
    LedgerTimeout(String),
    /// Ledger collaborator unreachable or returned garbage.
    Ledger(String),
    /// Configuration error, surfaced at startup.
    Config(String),
}

impl Error {
    /// Stable machine-readable error kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::TransactionMismatch(_) => "transaction_mismatch",
            Error::LedgerTimeout(_) => "ledger_timeout",
            Error::Ledger(_) => "ledger",
            Error::Config(_) => "config",
        }
    }

    pub fn listing_not_found(id: impl fmt::Display) -> Self {
        Error::NotFound(format!("listing {id} not found"))
    }

    pub fn asset_not_found(id: &str) -> Self {
        Error::NotFound(format!("asset {id} not found"))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "validation error: {msg}"),
            Error::NotFound(msg) => write!(f, "not found: {msg}"),
            Error::Conflict(msg) => write!(f, "conflict: {msg}"),
            Error::TransactionMismatch(msg) => write!(f, "transaction mismatch: {msg}"),
            Error::LedgerTimeout(msg) => write!(f, "ledger timeout: {msg}"),
            Error::Ledger(msg) => write!(f, "ledger error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::TransactionMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::LedgerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Ledger(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "success": false,
            "kind": self.kind(),
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
