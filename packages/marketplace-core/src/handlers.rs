//! HTTP request handlers.

use crate::error::Error;
use crate::metadata;
use crate::metrics::METRICS;
use crate::model::ListingStatus;
use crate::response::{
    AssetView, HealthResponse, ListingView, SubmitResponse, TemplateResponse,
};
use crate::schemas::{
    CancelRequest, PurchaseSubmitRequest, PurchaseTemplateRequest, RegisterAssetRequest,
    SubmitRequest, TemplateRequest,
};
use crate::middleware::RequestId;
use crate::state::AppState;
use crate::template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Health check with basic metrics.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ledger = state.ledger.health_check().await.unwrap_or("unreachable");
    let status = if ledger == "unreachable" { "degraded" } else { "ok" };
    Json(HealthResponse {
        status,
        ledger,
        active_ledger: state.ledger.active_endpoint(),
        ledger_failovers: state.ledger.failover_count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
        active_polls: state.verifier.active_polls(),
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    METRICS.render(state.verifier.active_polls())
}

// ── Assets ───────────────────────────────────────────────────────────────────

/// Register an asset from a finalized mint transaction.
pub async fn register_asset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAssetRequest>,
) -> Result<impl IntoResponse, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    if req.owner_address.is_empty() {
        return Err(Error::Validation("owner_address is required".into()));
    }
    if req.mint_tx_hash.is_empty() {
        return Err(Error::Validation("mint_tx_hash is required".into()));
    }
    let asset = state
        .verifier
        .register_mint(&req.owner_address, &req.mint_tx_hash, req.metadata)
        .await?;
    let record = state.store.metadata_record(asset.metadata_id)?;
    Ok((
        StatusCode::CREATED,
        Json(AssetView::new(asset, record.content)),
    ))
}

pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let asset = state.store.asset(&asset_id)?;
    let record = state.store.metadata_record(asset.metadata_id)?;
    Ok(Json(AssetView::new(asset, record.content)))
}

/// Cached owner of an asset, derived from verified transactions only.
pub async fn get_owner(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let entry = state
        .ownership
        .get(&asset_id)
        .ok_or_else(|| Error::asset_not_found(&asset_id))?;
    Ok(Json(entry))
}

// ── Listings ─────────────────────────────────────────────────────────────────

/// Create a listing and return the unsigned sell-offer template.
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TemplateRequest>,
) -> Result<impl IntoResponse, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    if req.seller_address.is_empty() {
        return Err(Error::Validation("seller_address is required".into()));
    }
    let (listing, unsigned) = state
        .lifecycle
        .create_listing(&req.asset_id, &req.seller_address, req.price_minor_units)
        .await?;
    METRICS.listings_created.fetch_add(1, Ordering::Relaxed);
    Ok((
        StatusCode::CREATED,
        Json(TemplateResponse {
            listing_id: listing.id,
            unsigned_transaction: unsigned,
        }),
    ))
}

/// Browse active listings, oldest first.
pub async fn list_active(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, Error> {
    let views = state
        .store
        .active_listings()
        .into_iter()
        .map(|listing| {
            let verified = metadata::verify_listing(&state.store, &listing).unwrap_or(false);
            ListingView::from_listing(listing, verified)
        })
        .collect::<Vec<_>>();
    Ok(Json(views))
}

pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, Error> {
    let listing = state.store.listing(listing_id)?;
    let verified = metadata::verify_listing(&state.store, &listing)?;
    Ok(Json(ListingView::from_listing(listing, verified)))
}

/// Accept a signed sell offer and start confirmation tracking.
pub async fn submit_listing(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let listing = state
        .verifier
        .submit_sell(listing_id, &req.transaction_hash, &req.signed_payload)
        .await?;
    info!(
        listing_id = %listing_id,
        tx_hash = %req.transaction_hash,
        request_id = %request_id.0,
        "Sell offer submitted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            listing_id,
            status: listing.status,
            transaction_hash: req.transaction_hash,
        }),
    ))
}

/// Seller-initiated cancellation.
pub async fn cancel_listing(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let listing = state.lifecycle.cancel(listing_id, &req.seller_address).await?;
    let verified = metadata::verify_listing(&state.store, &listing)?;
    Ok(Json(ListingView::from_listing(listing, verified)))
}

// ── Purchases ────────────────────────────────────────────────────────────────

/// Accept-offer template for a buyer purchasing an active listing.
pub async fn purchase_template(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<PurchaseTemplateRequest>,
) -> Result<impl IntoResponse, Error> {
    if req.buyer_address.is_empty() {
        return Err(Error::Validation("buyer_address is required".into()));
    }
    let listing = state.store.listing(listing_id)?;
    if listing.status != ListingStatus::Active {
        return Err(Error::Conflict(format!(
            "listing is not active (currently {:?})",
            listing.status
        )));
    }
    let unsigned = template::accept_offer(&listing, &req.buyer_address);
    Ok(Json(TemplateResponse {
        listing_id,
        unsigned_transaction: unsigned,
    }))
}

/// Accept a signed accept offer and start confirmation tracking.
pub async fn submit_purchase(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<PurchaseSubmitRequest>,
) -> Result<impl IntoResponse, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let listing = state
        .verifier
        .submit_purchase(
            listing_id,
            &req.buyer_address,
            &req.transaction_hash,
            &req.signed_payload,
        )
        .await?;
    info!(
        listing_id = %listing_id,
        buyer = %req.buyer_address,
        tx_hash = %req.transaction_hash,
        request_id = %request_id.0,
        "Accept offer submitted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            listing_id,
            status: listing.status,
            transaction_hash: req.transaction_hash,
        }),
    ))
}

// ── Transactions ─────────────────────────────────────────────────────────────

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(tx_hash): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let tx = state
        .store
        .transaction(&tx_hash)
        .ok_or_else(|| Error::NotFound(format!("transaction {tx_hash} not tracked")))?;
    Ok(Json(tx))
}
