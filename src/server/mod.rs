//! Control API server
//!
//! Thin HTTP layer over the scheduler and the work store: start/stop the
//! crawl, read progress, search cached items, and run operator maintenance
//! actions. All state lives in the store; handlers are stateless glue.

pub mod handlers;

use crate::crawler::Scheduler;
use crate::storage::SqliteStore;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<SqliteStore>>,
    pub scheduler: Arc<Scheduler>,
}

/// Builds the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/status", get(handlers::status))
        .route("/api/scraper/start", post(handlers::start_scraper))
        .route("/api/scraper/stop", post(handlers::stop_scraper))
        .route("/api/db/reset", post(handlers::reset_all))
        .route("/api/db/reset-errors", post(handlers::reset_errors))
        .route("/api/db/requeue", post(handlers::requeue_one))
        .route("/api/db/delete", post(handlers::delete_one))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the listener and serves the API until the process exits
pub async fn serve(addr: SocketAddr, state: AppState) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Control API listening on http://{}", addr);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
