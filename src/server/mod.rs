//! HTTP surface over the copilot.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ask` | Answer `{question, engine?}`; `engine` may also be a query parameter |
//! | `GET`  | `/api/strategies` | `{name: displayName}` in registry order |
//! | `POST` | `/api/init` | Rebuild every index, returns `"Initialized N indexers"` |
//! | `GET`  | `/health` | Liveness and version |
//!
//! Errors are returned as `{"error": {"code", "message"}}`.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::copilot::Copilot;
use crate::error::AppError;
use crate::models::AnswerResponse;
use crate::services::IndexManager;

#[derive(Clone)]
pub struct ServerState {
    pub copilot: Arc<Copilot>,
    pub index_manager: Arc<IndexManager>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub engine: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineQuery {
    pub engine: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    fn backend(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "backend_error",
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Config(e) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: e.to_string(),
            },
            other => Self::backend(other.to_string()),
        }
    }
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

pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ask", post(handle_ask))
        .route("/api/strategies", get(handle_strategies))
        .route("/api/init", post(handle_init))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(state: ServerState, bind: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn handle_ask(
    State(state): State<ServerState>,
    Query(query): Query<EngineQuery>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let engine = query
        .engine
        .filter(|e| !e.trim().is_empty())
        .or(req.engine);
    match state.copilot.ask(question, engine.as_deref()).await {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            warn!(error = %e, "ask failed");
            Err(e.into())
        }
    }
}

async fn handle_strategies(State(state): State<ServerState>) -> Json<StrategiesBody> {
    Json(StrategiesBody(state.copilot.clone()))
}

/// Serializes the copilot's registry as `{name: displayName}`.
struct StrategiesBody(Arc<Copilot>);

impl Serialize for StrategiesBody {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.registry().serialize(serializer)
    }
}

async fn handle_init(State(state): State<ServerState>) -> Result<String, ApiError> {
    match state.index_manager.init().await {
        Ok(count) => Ok(format!("Initialized {count} indexers")),
        Err(e) => {
            error!(error = %e, "index init failed");
            Err(ApiError::backend(e.to_string()))
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
