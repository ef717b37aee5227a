use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::Deserialize;

use crate::db::{booking, import, queries};
use crate::errors::AppError;
use crate::models::{Appointment, Reminder};
use crate::services::reminders::{self, DispatchSummary};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let appointments = {
        let conn = state.conn()?;
        queries::list_appointments(&conn, query.status.as_deref(), limit)?
    };
    Ok(Json(appointments))
}

// POST /api/admin/appointments/:confirmation_id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(confirmation_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let cancelled = {
        let mut conn = state.conn()?;
        booking::cancel_appointment(&mut conn, &confirmation_id)?
    };

    if !cancelled {
        return Err(AppError::NotFound(format!("appointment {confirmation_id}")));
    }
    tracing::info!(%confirmation_id, "appointment cancelled by admin");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/admin/reminders
pub async fn get_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Reminder>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let reminders = {
        let conn = state.conn()?;
        queries::list_reminders(&conn)?
    };
    Ok(Json(reminders))
}

// POST /api/admin/reminders/dispatch
pub async fn dispatch_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DispatchSummary>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let summary = reminders::dispatch_due(&state, Local::now().naive_local()).await?;
    tracing::info!(due = summary.due, sent = summary.sent, failed = summary.failed, "manual reminder dispatch");
    Ok(Json(summary))
}

// GET /api/admin/patients.csv
pub async fn export_patients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut body = Vec::new();
    {
        let conn = state.conn()?;
        import::export_patients(&conn, &mut body)?;
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"patients.csv\""),
        ],
        body,
    )
        .into_response())
}
