//! # Marketplace Core
//!
//! Listing and settlement tracking for ledger-native assets. The service
//! never holds keys: it issues unsigned transaction templates, accepts the
//! externally signed results, and verifies them against the ledger before
//! any listing state changes.
//!
//! ## Quick Start
//! ```bash
//! cargo run --bin marketd
//! ```
//!
//! ## Endpoints
//! - `GET  /health` - Health check with metrics
//! - `GET  /metrics` - Prometheus metrics
//! - `POST /marketplace/assets` - Register an asset from a finalized mint
//! - `GET  /marketplace/assets/{asset_id}` - Asset with metadata
//! - `GET  /marketplace/assets/{asset_id}/owner` - Cached owner
//! - `POST /marketplace/listings` - Create a listing, get the sell template
//! - `GET  /marketplace/listings` - Browse active listings
//! - `GET  /marketplace/listings/{listing_id}` - Listing with integrity check
//! - `POST /marketplace/listings/{listing_id}/submit` - Submit signed sell offer
//! - `POST /marketplace/listings/{listing_id}/cancel` - Seller cancellation
//! - `POST /marketplace/purchases/{listing_id}/template` - Accept-offer template
//! - `POST /marketplace/purchases/{listing_id}/submit` - Submit signed accept
//! - `GET  /marketplace/transactions/{tx_hash}` - Tracked transaction

pub mod config;
mod error;
mod handlers;
pub mod ledger;
pub mod lifecycle;
pub mod metadata;
pub mod metrics;
mod middleware;
pub mod model;
pub mod ownership;
mod response;
mod router;
mod schemas;
mod state;
pub mod store;
pub mod template;
pub mod verifier;

pub use config::Config;
pub use error::Error;
pub use router::create as create_router;
pub use state::AppState;
