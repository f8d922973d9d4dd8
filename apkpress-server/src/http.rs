//! apkpress HTTP REST API
//!
//! Axum-based HTTP server exposing the link engine to the admin panel and CLI.
//! Runs alongside the Unix socket IPC server on port 8787 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, Value)`. The inner functions build an IPC request
//! and go through the same router as the socket server.
//!
//! Endpoints:
//! - GET  /health                  - store health
//! - GET  /version                 - server version info
//! - POST /articles/:id/links      - link specific articles into this one
//! - POST /articles/:id/auto-link  - auto-discover and link for one article
//! - POST /articles/auto-link      - auto-link every published article
//! - GET  /articles/:id/links      - outbound links view
//! - POST /articles/rewrite        - ingest an externally rewritten draft

use std::sync::Arc;

use anyhow::Result;
use apkpress_core::ipc::{PressRequest, PressResponse, RewriteDraft, TargetRef};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::router::{handle_request, AppContext};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub ctx: AppContext,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/articles/auto-link", post(auto_link_all_handler))
        .route("/articles/rewrite", post(rewrite_handler))
        .route("/articles/:id/links", post(link_handler).get(outbound_handler))
        .route("/articles/:id/auto-link", post(auto_link_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(ctx: AppContext, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.http.host, ctx.config.http.port);
    let state = Arc::new(HttpState { ctx });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("apkpress HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    #[serde(default)]
    pub targets: Vec<TargetRef>,
    pub max_links: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AutoLinkRequest {
    pub max_links: Option<usize>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check - asks the store and returns (status_code, json_body).
pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    match ctx.store.health().await {
        Ok(backend) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": ctx.store.name(),
                "backend": backend,
                "socket": ctx.config.service.socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "apkpress/1",
    })
}

/// Inner targeted link - requires at least one target.
pub async fn link_inner(ctx: &AppContext, article_id: Uuid, req: LinkRequest) -> (StatusCode, serde_json::Value) {
    if req.targets.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!(ErrorResponse::new("targets must not be empty")),
        );
    }

    let ipc_request = PressRequest::LinkArticles {
        article_id,
        targets: req.targets,
        max_links: req.max_links,
    };
    dispatch(ctx, ipc_request).await
}

pub async fn auto_link_inner(
    ctx: &AppContext,
    article_id: Uuid,
    req: AutoLinkRequest,
) -> (StatusCode, serde_json::Value) {
    dispatch(ctx, PressRequest::AutoLink { article_id, max_links: req.max_links }).await
}

pub async fn auto_link_all_inner(ctx: &AppContext, req: AutoLinkRequest) -> (StatusCode, serde_json::Value) {
    dispatch(ctx, PressRequest::AutoLinkAll { max_links: req.max_links }).await
}

pub async fn outbound_inner(ctx: &AppContext, article_id: Uuid) -> (StatusCode, serde_json::Value) {
    dispatch(ctx, PressRequest::OutboundLinks { article_id }).await
}

/// Inner rewrite ingest - rejects blank content before touching the store.
pub async fn rewrite_inner(ctx: &AppContext, draft: RewriteDraft) -> (StatusCode, serde_json::Value) {
    if draft.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!(ErrorResponse::new("content field is required")),
        );
    }

    match dispatch(ctx, PressRequest::IngestRewrite { draft }).await {
        (StatusCode::OK, body) => (StatusCode::CREATED, body),
        other => other,
    }
}

async fn dispatch(ctx: &AppContext, request: PressRequest) -> (StatusCode, serde_json::Value) {
    let response = handle_request(request, ctx).await;
    let status = status_for(&response);

    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => (status, serde_json::json!(ErrorResponse::new(e))),
    }
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn link_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<LinkRequest>,
) -> impl IntoResponse {
    let (status, body) = link_inner(&state.ctx, id, req).await;
    (status, Json(body))
}

pub async fn auto_link_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    req: Option<Json<AutoLinkRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let (status, body) = auto_link_inner(&state.ctx, id, req).await;
    (status, Json(body))
}

pub async fn auto_link_all_handler(
    State(state): State<Arc<HttpState>>,
    req: Option<Json<AutoLinkRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let (status, body) = auto_link_all_inner(&state.ctx, req).await;
    (status, Json(body))
}

pub async fn outbound_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = outbound_inner(&state.ctx, id).await;
    (status, Json(body))
}

pub async fn rewrite_handler(
    State(state): State<Arc<HttpState>>,
    Json(draft): Json<RewriteDraft>,
) -> impl IntoResponse {
    let (status, body) = rewrite_inner(&state.ctx, draft).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert an IPC `PressResponse` into an HTTP body value, or an error string.
pub fn response_to_http(response: PressResponse) -> std::result::Result<serde_json::Value, String> {
    if response.status == "ok" {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err(response.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}

/// HTTP status for a failed IPC response, from its error code.
pub fn status_for(response: &PressResponse) -> StatusCode {
    match response.code.as_deref() {
        _ if response.status == "ok" => StatusCode::OK,
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("duplicate_slug") | Some("conflict") => StatusCode::CONFLICT,
        Some("other") => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================
