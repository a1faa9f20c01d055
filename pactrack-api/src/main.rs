//! # Pactrack API Server
//!
//! Contract lifecycle tracking over HTTP. The storage backend (PostgreSQL,
//! Google Sheets or in-memory) is chosen by `STORAGE_BACKEND`.
//!
//! ```bash
//! STORAGE_BACKEND=memory JWT_SECRET=... cargo run -p pactrack-api
//! ```

use pactrack_api::{app, config::Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pactrack_api=debug,pactrack_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Pactrack API v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let storage = app::connect_storage(&config.storage).await?;
    app::bootstrap_admin(storage.as_ref(), &config.admin).await?;

    let address = config.bind_address();
    let state = app::AppState::new(storage, config)?;
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Listening on http://{}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
