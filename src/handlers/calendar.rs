use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::models::AppointmentStatus;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    // Strip .ics suffix if present
    let confirmation_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let appointment = state
        .conn()
        .and_then(|conn| queries::get_appointment(&conn, confirmation_id));
    let appointment = match appointment {
        Ok(Some(a)) if a.status == AppointmentStatus::Confirmed => a,
        Ok(_) => {
            return (StatusCode::NOT_FOUND, "Appointment not found").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load appointment for .ics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let ics = generate_ics(&appointment, &state.config.clinic_name);
    let filename = format!("appointment-{confirmation_id}.ics");

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
