//! Read-only admin endpoints over the applicant store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::store::{Database, UserId};

/// Shared state for admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn Database>,
    /// Age after which an incomplete applicant counts as pending.
    pub reminder_threshold: chrono::Duration,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/applicants/{id}
///
/// The full applicant record, or 404 if none exists.
async fn get_applicant(State(state): State<AdminState>, Path(id): Path<UserId>) -> Response {
    match state.store.get_applicant(id).await {
        Ok(Some(applicant)) => Json(applicant).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("applicant {id} not found")),
        Err(e) => {
            tracing::error!(user_id = id, "Applicant lookup failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "database error")
        }
    }
}

/// GET /api/applicants/pending
///
/// Applicants the next reminder sweep would nudge, oldest first.
async fn list_pending(State(state): State<AdminState>) -> Response {
    let cutoff = Utc::now() - state.reminder_threshold;
    match state.store.list_pending_interviews(cutoff).await {
        Ok(applicants) => Json(applicants).into_response(),
        Err(e) => {
            tracing::error!("Pending applicant query failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "database error")
        }
    }
}

/// Build the admin REST routes.
pub fn admin_routes(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/applicants/pending", get(list_pending))
        .route("/api/applicants/{id}", get(get_applicant))
        .with_state(state)
}
