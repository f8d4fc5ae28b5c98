//! Serve command handler.
//!
//! Exposes the augmentation pipeline over HTTP.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer a conversation against one source |
//! | `GET`  | `/sources` | List configured sources |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error responses carry `{ "error": { "code": ..., "message": ... } }`.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Args;
use citeflow_core::{config::AppConfig, AppError, AppResult};
use citeflow_llm::ChatMessage;
use citeflow_rag::augment::ANONYMOUS_USER;
use citeflow_rag::wire::{STREAM_CACHE_CONTROL, STREAM_CONTENT_TYPE};
use citeflow_rag::{
    into_wire_stream, AugmentOutcome, AugmentRequest, Augmenter, ResponseEnvelope,
    SearchMode, SourceCatalog,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Serve the chat endpoint over HTTP
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (overrides server.bind)
    #[arg(long, env = "CITEFLOW_BIND")]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (augmenter, catalog) = super::build_pipeline(config)?;
        let state = ServerState::new(augmenter, catalog, config.model.clone());

        let bind = self
            .bind
            .clone()
            .unwrap_or_else(|| config.server.bind.clone());
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        tracing::info!(
            sources = state.catalog.len(),
            "Chat server listening on http://{}",
            listener.local_addr()?
        );

        axum::serve(listener, router(state)).await?;
        Ok(())
    }
}

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct ServerState {
    augmenter: Arc<Augmenter>,
    catalog: Arc<SourceCatalog>,
    default_model: String,
}

impl ServerState {
    pub fn new(augmenter: Augmenter, catalog: SourceCatalog, default_model: String) -> Self {
        Self {
            augmenter: Arc::new(augmenter),
            catalog: Arc::new(catalog),
            default_model,
        }
    }
}

pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/sources", get(handle_sources))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
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

struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::NoUserMessage => StatusCode::BAD_REQUEST,
            AppError::SourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SearchFailed { .. } | AppError::Llm(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ Handlers ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    messages: Vec<ChatMessage>,
    source_id: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_stream")]
    stream: bool,
    #[serde(default)]
    user: Option<String>,
}

fn default_stream() -> bool {
    true
}

async fn handle_chat(
    State(state): State<ServerState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    let model = body.model.unwrap_or_else(|| state.default_model.clone());
    let request = AugmentRequest::new(body.messages, body.source_id, model)
        .with_streaming(body.stream)
        .with_user(body.user.unwrap_or_else(|| ANONYMOUS_USER.to_string()));

    match state.augmenter.augment(request, state.catalog.sources()).await? {
        AugmentOutcome::Complete(completion) => {
            Ok(Json(ResponseEnvelope::from(completion)).into_response())
        }
        AugmentOutcome::Stream(stream) => {
            let body = Body::from_stream(into_wire_stream(stream));
            Ok((
                [
                    (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
                    (header::CACHE_CONTROL, STREAM_CACHE_CONTROL),
                ],
                body,
            )
                .into_response())
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SourceSummary {
    id: String,
    name: String,
    mode: SearchMode,
    profile: String,
}

async fn handle_sources(State(state): State<ServerState>) -> Json<Vec<SourceSummary>> {
    let sources = state
        .catalog
        .sources()
        .iter()
        .map(|source| SourceSummary {
            id: source.id.clone(),
            name: source.name.clone(),
            mode: source.mode,
            profile: source.profile.id.clone(),
        })
        .collect();
    Json(sources)
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
