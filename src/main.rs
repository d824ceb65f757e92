//! Speaker Roster Backend
//!
//! Keeps each identity's roster of public speakers in SQLite, mirrors it into
//! live per-identity sessions and renders it as shareable text, a paginated
//! document and a portable export file.

mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod errors;
mod import;
mod models;
mod session;
mod views;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog::TalkCatalog;
use config::Config;
use db::Repository;
use session::{SessionManager, SessionOptions};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub catalog: Arc<TalkCatalog>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Speaker Roster Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (ROSTER_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    // Load the talk catalog, seeding the store on first run
    let catalog = Arc::new(catalog::load_or_seed(&repo, config.catalog_path.as_deref()).await?);
    tracing::info!("Talk catalog ready with {} talks", catalog.len());

    let options = SessionOptions {
        settings_debounce: config.settings_debounce,
        idle_ttl: config.session_idle,
        ..SessionOptions::default()
    };
    let sessions = Arc::new(SessionManager::new(
        repo.clone(),
        Arc::clone(&catalog),
        options,
    ));
    let sweeper_cancel = CancellationToken::new();
    let sweeper = sessions.spawn_sweeper(sweeper_cancel.clone());

    // Create application state
    let state = AppState {
        sessions: Arc::clone(&sessions),
        catalog,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush scheduled settings writes before the pool goes away
    sweeper_cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Session sweeper ended abnormally: {}", e);
    }
    sessions.close_all().await;
    repo.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, keep serving until the process is killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Session and model
        .route("/roster", get(api::get_roster))
        .route("/roster/notice", delete(api::dismiss_notice))
        .route("/session", delete(api::close_session))
        .route("/events", get(api::roster_events))
        // Speakers
        .route("/speakers", get(api::list_speakers))
        .route("/speakers", post(api::add_speaker))
        .route("/speakers/{id}", get(api::get_speaker))
        .route("/speakers/{id}", delete(api::remove_speaker))
        .route(
            "/speakers/{id}/availability",
            post(api::toggle_speaker_availability),
        )
        .route("/speakers/{id}/role", put(api::change_role))
        .route("/speakers/{id}/phone", put(api::update_phone))
        // Talk assignments
        .route("/speakers/{id}/talks", post(api::add_talk))
        .route("/speakers/{id}/talks/{talk_id}", delete(api::remove_talk))
        .route(
            "/speakers/{id}/talks/{talk_id}/availability",
            post(api::toggle_talk_availability),
        )
        // Settings
        .route(
            "/settings",
            get(api::get_settings).patch(api::patch_settings),
        )
        // Views
        .route("/share", get(api::get_share_text))
        .route("/document", get(api::get_document))
        .route("/export", get(api::get_export))
        // Import
        .route("/import/preview", post(api::preview_import))
        .route("/import", post(api::import_roster))
        // Talk catalog
        .route("/talks", get(api::list_talks))
        .route("/talks/{id}", get(api::get_talk))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
