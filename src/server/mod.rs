//! HTTP server for the upload-and-display web app.
//!
//! Assembles the Axum routes, the session cookie middleware and request
//! tracing into a single `Router`.

mod cookie;
mod handlers;
mod page;

use crate::config::Config;
use crate::ingest::FieldAliases;
use crate::session::SessionStore;
use page::PageRenderer;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// View settings shared by every request.
#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub precision: usize,
    pub default_vocation: String,
    pub default_mode: String,
    pub csv_filename: String,
}

impl From<&Config> for ViewSettings {
    fn from(config: &Config) -> Self {
        Self {
            precision: config.export.precision,
            default_vocation: config.general.default_vocation.clone(),
            default_mode: config.general.default_mode.clone(),
            csv_filename: config.export.csv_filename.clone(),
        }
    }
}

pub struct AppState {
    pub sessions: SessionStore,
    pub view: ViewSettings,
    pub page: PageRenderer,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            sessions: SessionStore::new(
                FieldAliases::from(&config.ingest),
                Duration::from_secs(config.server.session_ttl_seconds),
            ),
            view: ViewSettings::from(config),
            page: PageRenderer::new().context("Failed to load page template")?,
        })
    }
}

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload_form))
        .route("/reset", post(handlers::reset_form))
        .route("/pending/{index}", post(handlers::resolve_pending_form))
        .route("/pending/{index}/delete", post(handlers::delete_pending_form))
        .route("/api/upload", post(handlers::api_upload))
        .route("/api/filters", get(handlers::api_filters))
        .route("/api/zones", get(handlers::api_zones))
        .route("/api/pending", get(handlers::api_pending))
        .route(
            "/api/pending/{index}",
            post(handlers::api_resolve_pending).delete(handlers::api_delete_pending),
        )
        .route("/api/export.csv", get(handlers::api_export))
        .route("/api/session", delete(handlers::api_reset))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(cookie::session_cookie))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let app = build_router(state, config.server.max_upload_bytes);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);
    println!("🌐 Zone Averages running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
