//! HTTP server: `vsearch serve`.
//!
//! Exposes search, question answering, and single-document indexing over a
//! JSON API. The engine's store lives as long as the server; a background
//! task saves a snapshot every `storage.autosave_secs`, and a final save
//! runs on Ctrl-C.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Status and version |
//! | `POST`   | `/search` | `{query, limit?, rerank?}` → `{results}` |
//! | `POST`   | `/ask` | `{question}` → `{answer, sources}` |
//! | `PUT`    | `/documents` | `{path, title?, text}` → `{path, chunks}` |
//! | `DELETE` | `/documents` | `{path}` → `{path, removed}` |
//! | `POST`   | `/snapshot` | Save now → `{saved, chunks}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `answer_failed` (502), `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use vaultsearch_core::models::{DocumentInput, SearchResult};

use crate::config::Config;
use crate::engine::Engine;
use crate::ingest::open_indexed;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(open_indexed(config).await?);

    let autosave = match (&engine.autosaver, config.storage.autosave_secs) {
        (Some(saver), secs) if secs > 0 => Some(saver.clone().spawn(
            engine.store.clone(),
            engine.model_name().to_string(),
            Duration::from_secs(secs),
        )),
        _ => None,
    };

    let app = router(engine.clone());
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("vaultsearch listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = autosave {
        task.abort();
    }
    if let Some(count) = engine.save().await? {
        info!(chunks = count, "final snapshot saved");
    }
    Ok(())
}

fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .route(
            "/documents",
            axum::routing::put(handle_put_document).delete(handle_delete_document),
        )
        .route("/snapshot", post(handle_snapshot))
        .layer(cors)
        .with_state(AppState { engine })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn answer_failed(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "answer_failed",
        message: format!("{:#}", err),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

// ============ GET /health ============

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    rerank: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let retrieval = &state.engine.config.retrieval;
    let limit = req.limit.unwrap_or(retrieval.limit);
    if limit == 0 {
        return Err(bad_request("limit must be >= 1"));
    }

    let results = state
        .engine
        .retriever
        .search(
            state.engine.store.as_ref(),
            &req.query,
            limit,
            req.rerank.unwrap_or(retrieval.use_reranking),
        )
        .await;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SearchResult>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let answer = state
        .engine
        .answer(&req.question)
        .await
        .map_err(answer_failed)?;
    Ok(Json(AskResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}

// ============ PUT/DELETE /documents ============

#[derive(Deserialize)]
struct PutDocumentRequest {
    path: String,
    #[serde(default)]
    title: Option<String>,
    text: String,
}

#[derive(Debug, Serialize)]
struct PutDocumentResponse {
    path: String,
    chunks: usize,
}

async fn handle_put_document(
    State(state): State<AppState>,
    Json(req): Json<PutDocumentRequest>,
) -> Result<Json<PutDocumentResponse>, AppError> {
    if req.path.trim().is_empty() {
        return Err(bad_request("path must not be empty"));
    }

    let mut doc = DocumentInput::from_path(&req.path, &req.text, chrono::Utc::now().timestamp());
    if let Some(title) = req.title.filter(|t| !t.trim().is_empty()) {
        doc.title = title;
    }

    let report = state
        .engine
        .retriever
        .index_document(state.engine.store.as_ref(), &doc)
        .await
        .map_err(internal)?;
    Ok(Json(PutDocumentResponse {
        path: doc.path,
        chunks: report.chunks,
    }))
}

#[derive(Deserialize)]
struct DeleteDocumentRequest {
    path: String,
}

#[derive(Debug, Serialize)]
struct DeleteDocumentResponse {
    path: String,
    removed: usize,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Json(req): Json<DeleteDocumentRequest>,
) -> Json<DeleteDocumentResponse> {
    let removed = state
        .engine
        .retriever
        .remove_document(state.engine.store.as_ref(), &req.path);
    Json(DeleteDocumentResponse {
        path: req.path,
        removed,
    })
}

// ============ POST /snapshot ============

#[derive(Debug, Serialize)]
struct SnapshotResponse {
    saved: bool,
    chunks: usize,
}

async fn handle_snapshot(
    State(state): State<AppState>,
) -> Result<Json<SnapshotResponse>, AppError> {
    if state.engine.autosaver.is_none() {
        return Err(bad_request("persistent storage is disabled"));
    }
    let saved = state.engine.save().await.map_err(internal)?;
    Ok(Json(SnapshotResponse {
        saved: saved.is_some(),
        chunks: saved.unwrap_or(0),
    }))
}
