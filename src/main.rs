use anyhow::Result;
use axum::{extract::FromRef, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use crate::config::{Settings, SourceMode};
use crate::search::SearchService;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt};

// Declare modules
mod config;
mod error;
mod export;
mod marketplace_api;
mod models;
mod normalize;
mod ranking;
mod report;
mod routes;
mod scraper;
mod search;

// Shared by every handler
#[derive(Clone, FromRef)]
struct AppState {
    settings: Arc<Settings>,
    search: Arc<SearchService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "market_scout=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing market scout server...");

    let settings = match config::Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    match settings.source.mode {
        SourceMode::Api if settings.source.credential.is_none() => {
            tracing::warn!("No API credential configured (APP_SOURCE__CREDENTIAL); the search API may refuse requests");
        }
        mode => tracing::info!(?mode, "Listing source selected"),
    }
    let shared_settings = Arc::new(settings);

    let http_client = marketplace_api::build_client(&shared_settings.source)?;
    tracing::info!("Shared HTTP client created.");

    let app_state = AppState {
        settings: shared_settings.clone(),
        search: Arc::new(SearchService::new(shared_settings.clone(), http_client)),
    };

    let router: Router = routes::create_router(app_state.clone());
    let app = router.nest_service("/static", ServeDir::new("static"));

    let addr: SocketAddr = match app_state.settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid server address format in configuration ('{}'): {}", app_state.settings.server_address, e);
            return Err(anyhow::anyhow!("Invalid server address format: {}", shared_settings.server_address));
        }
    };

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
