//! Marketplace core binary.

use marketplace_core::ledger::HttpLedgerClient;
use marketplace_core::{create_router, AppState, Config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting marketplace core");

    // A malformed config file or env var is a startup failure, not a reason
    // to silently run on defaults.
    let config: Config = config::Config::builder()
        .add_source(config::File::with_name("marketd").required(false))
        .add_source(config::Environment::with_prefix("MARKETD"))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| marketplace_core::Error::Config(e.to_string()))?;

    info!(
        ledger = %config.ledger_url,
        fallback = %config.fallback_ledger_url,
        "Configuration loaded"
    );

    let bind_address = config.bind_address.clone();
    let ledger = Arc::new(HttpLedgerClient::new(
        &config.ledger_url,
        &config.fallback_ledger_url,
    ));
    let state = Arc::new(AppState::new(config, ledger));

    let app = create_router(Arc::clone(&state));

    info!(address = %bind_address, "Listening");

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then cancel in-flight confirmation polls before the
/// server drains.
async fn shutdown_signal(state: Arc<AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested, cancelling confirmation polls");
    state.verifier.shutdown();
}
