//! HTTP router setup.

use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/marketplace/assets", post(handlers::register_asset))
        .route("/marketplace/assets/{asset_id}", get(handlers::get_asset))
        .route(
            "/marketplace/assets/{asset_id}/owner",
            get(handlers::get_owner),
        )
        .route(
            "/marketplace/listings",
            post(handlers::create_listing).get(handlers::list_active),
        )
        .route(
            "/marketplace/listings/{listing_id}",
            get(handlers::get_listing),
        )
        .route(
            "/marketplace/listings/{listing_id}/submit",
            post(handlers::submit_listing),
        )
        .route(
            "/marketplace/listings/{listing_id}/cancel",
            post(handlers::cancel_listing),
        )
        .route(
            "/marketplace/purchases/{listing_id}/template",
            post(handlers::purchase_template),
        )
        .route(
            "/marketplace/purchases/{listing_id}/submit",
            post(handlers::submit_purchase),
        )
        .route(
            "/marketplace/transactions/{tx_hash}",
            get(handlers::get_transaction),
        )
        .layer(axum::middleware::from_fn(middleware::inject_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
