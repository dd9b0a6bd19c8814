//! Control API handlers

use crate::server::AppState;
use crate::storage::WorkStore;
use crate::ModelCacheError;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// Maximum rows returned by a search
const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

fn message(text: impl Into<String>) -> Response {
    Json(json!({ "message": text.into() })).into_response()
}

fn bad_request(text: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": text.into() }))).into_response()
}

fn not_found(text: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": text.into() }))).into_response()
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    tracing::error!("Request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// Search cached items by title or tag
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let results = {
        let store = state.store.lock().unwrap();
        store.search_done(&params.q, SEARCH_LIMIT)
    };

    match results {
        Ok(items) => Json(items).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Point-in-time progress aggregate of the work store
pub async fn status(State(state): State<AppState>) -> Response {
    let progress = {
        let store = state.store.lock().unwrap();
        store.progress()
    };

    match progress {
        Ok(progress) => Json(progress).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Start the scheduler in the requested politeness mode
pub async fn start_scraper(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Response {
    match state.scheduler.start(&req.mode).await {
        Ok(()) => message(format!("Scraper started in {} mode", req.mode)),
        Err(e @ ModelCacheError::InvalidMode(_)) => bad_request(e.to_string()),
        Err(e) => internal_error(e),
    }
}

/// Stop the scheduler and reconcile in-flight items
pub async fn stop_scraper(State(state): State<AppState>) -> Response {
    state.scheduler.stop().await;
    message("Scraper stopped")
}

/// Requeue every item
pub async fn reset_all(State(state): State<AppState>) -> Response {
    let result = {
        let mut store = state.store.lock().unwrap();
        store.requeue_all()
    };

    match result {
        Ok(n) => message(format!("{} item(s) re-queued", n)),
        Err(e) => internal_error(e),
    }
}

/// Requeue only failed items
pub async fn reset_errors(State(state): State<AppState>) -> Response {
    let result = {
        let mut store = state.store.lock().unwrap();
        store.requeue_failed()
    };

    match result {
        Ok(n) => message(format!("{} failed item(s) re-queued", n)),
        Err(e) => internal_error(e),
    }
}

/// Requeue one item by URL
pub async fn requeue_one(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Response {
    let result = {
        let mut store = state.store.lock().unwrap();
        store.requeue_one(&req.url)
    };

    match result {
        Ok(true) => message(format!("Item {} re-queued", req.url)),
        Ok(false) => not_found("Item not found"),
        Err(e) => internal_error(e),
    }
}

/// Delete one item by URL
pub async fn delete_one(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Response {
    let result = {
        let mut store = state.store.lock().unwrap();
        store.delete_one(&req.url)
    };

    match result {
        Ok(true) => message(format!("Item {} deleted", req.url)),
        Ok(false) => not_found("Item not found"),
        Err(e) => internal_error(e),
    }
}
