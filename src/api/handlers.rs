//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AnswerRequest, ErrorResponse, HealthResponse, LeadListResponse, LeadResponse, LeadSubmission,
    SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{ChatSnapshot, SessionHandle, WidgetEvent};
use crate::store::{LeadStats, StoreError};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Lead dashboard
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/export", get(export_leads))
        .route("/api/leads/stats", get(lead_stats))
        .route("/api/leads/:id", delete(delete_lead))
        // Widget sessions
        .route("/api/chat/sessions", post(create_session))
        .route(
            "/api/chat/sessions/:id",
            get(get_session).delete(end_session),
        )
        .route("/api/chat/sessions/:id/restart", post(restart_session))
        .route("/api/chat/sessions/:id/answer", post(answer_session))
        .route("/api/chat/sessions/:id/stream", get(stream_session))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ts: chrono::Utc::now().to_rfc3339(),
    })
}

// ============================================================
// Leads
// ============================================================

async fn list_leads(State(state): State<AppState>) -> Result<Json<LeadListResponse>, AppError> {
    let leads = state.store.list_records().map_err(store_error)?;
    Ok(Json(LeadListResponse {
        success: true,
        count: leads.len(),
        leads,
    }))
}

async fn create_lead(
    State(state): State<AppState>,
    Json(submission): Json<LeadSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let lead = state
        .store
        .create_record(&submission.into_record())
        .map_err(store_error)?;
    tracing::info!(lead_id = %lead.id, "Lead created via API");
    Ok((
        StatusCode::CREATED,
        Json(LeadResponse {
            success: true,
            lead,
        }),
    ))
}

async fn delete_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.store.delete_record(&id).map_err(store_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn export_leads(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let csv = state.store.export_csv().map_err(store_error)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"leads.csv\"",
            ),
        ],
        csv,
    ))
}

async fn lead_stats(State(state): State<AppState>) -> Result<Json<LeadStats>, AppError> {
    Ok(Json(state.store.stats().map_err(store_error)?))
}

fn store_error(e: StoreError) -> AppError {
    match e {
        StoreError::MissingFields | StoreError::UnknownUserType(_) => {
            AppError::BadRequest(e.to_string())
        }
        StoreError::NotFound(_) => AppError::NotFound(e.to_string()),
        StoreError::Io(_) | StoreError::Json(_) => {
            tracing::error!(error = %e, "Lead store failure");
            AppError::Internal("Failed to access lead storage.".to_string())
        }
    }
}

// ============================================================
// Widget Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    let handle = state
        .sessions
        .create_session()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(SessionResponse {
        id: handle.id.clone(),
        snapshot: handle.snapshot(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatSnapshot>, AppError> {
    Ok(Json(session(&state, &id).await?.snapshot()))
}

async fn restart_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    session(&state, &id)
        .await?
        .start()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(SuccessResponse { success: true })))
}

/// Answers are queued; the session drops any that arrive while it is
/// not awaiting input.
async fn answer_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    session(&state, &id)
        .await?
        .submit_answer(req.value, req.label)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(SuccessResponse { success: true })))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session(&state, &id).await?;
    // Subscribe before snapshotting so nothing falls between the two
    let broadcast_rx = handle.subscribe();
    let init = WidgetEvent::Init {
        snapshot: handle.snapshot(),
    };
    Ok(sse_stream(init, broadcast_rx))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.end_session(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound("Session not found.".to_string()))
    }
}

async fn session(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("Session not found.".to_string()))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
