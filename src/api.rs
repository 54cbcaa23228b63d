//! REST API server for the supervisor
//!
//! Exposes the session resume protocol over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::SupervisorError;
use crate::models::{ConfidenceEnvelope, ModelTier, ResumeDecision, RunOutcome};
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub decision: String,
    pub payload: Option<String>,
}

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Outcome summary returned to HTTP callers
#[derive(Debug, Serialize)]
pub struct OutcomeView {
    pub session_id: String,
    pub status: &'static str,
    pub answer: Option<String>,
    pub pending: Option<ConfidenceEnvelope>,
    pub cycles: u32,
    pub model: ModelTier,
}

impl From<RunOutcome> for OutcomeView {
    fn from(outcome: RunOutcome) -> Self {
        let state = outcome.state();
        let (session_id, cycles, model) = (state.session_id.clone(), state.cycles, state.current_model);

        match outcome {
            RunOutcome::Completed { answer, .. } => Self {
                session_id,
                status: "completed",
                answer: Some(answer),
                pending: None,
                cycles,
                model,
            },
            RunOutcome::Suspended { envelope, .. } => Self {
                session_id,
                status: "suspended",
                answer: None,
                pending: Some(envelope),
                cycles,
                model,
            },
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

fn status_for(error: &SupervisorError) -> StatusCode {
    match error {
        SupervisorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        SupervisorError::NotSuspended(_) => StatusCode::CONFLICT,
        SupervisorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        e if e.is_fatal_to_run() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: crate::Result<RunOutcome>) -> (StatusCode, Json<ApiResponse>) {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(OutcomeView::from(outcome)))),
        Err(e) => {
            error!(error = %e, "Request failed");
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// Handlers
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "strategy": state.orchestrator.strategy().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn invoke(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<InvokeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(%session_id, query = %req.query, "Invoke request");
    respond(state.orchestrator.invoke(&session_id, &req.query).await)
}

async fn resume(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<ResumeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(%session_id, decision = %req.decision, "Resume request");

    let decision = match ResumeDecision::parse(&req.decision, req.payload) {
        Ok(decision) => decision,
        Err(e) => return (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    };
    respond(state.orchestrator.resume(&session_id, decision).await)
}

async fn pending(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.orchestrator.pending(&session_id).await {
        Ok(Some(envelope)) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": session_id,
                "status": "suspended",
                "pending": envelope,
            }))),
        ),
        Ok(None) => {
            let e = SupervisorError::NotSuspended(session_id);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions/:id", get(pending))
        .route("/api/sessions/:id/invoke", post(invoke))
        .route("/api/sessions/:id/resume", post(resume))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
