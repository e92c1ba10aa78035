use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use gather_db::DomainError;
use gather_db::models::RegistrationRow;
use gather_types::api::{ApiResponse, CreateRegistrationRequest, UpdateRegistrationRequest};
use gather_types::models::{Registration, RegistrationStatus};

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::sessions::Session;

/// Register the calling user for an event. Capacity and duplicate rules are
/// enforced inside the storage transaction.
pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateRegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let notes = req.notes.unwrap_or_default().trim().to_string();

    let db = state.clone();
    let user_id = session.user_id;
    let row =
        run_blocking(move || db.db.register_for_event(req.event_id, user_id, &notes)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            row.into_registration(),
            "Registration successful",
        )),
    ))
}

/// The calling user's own registrations, newest first.
pub async fn my_registrations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = session.user_id;
    let rows = run_blocking(move || db.db.list_registrations_for_user(user_id)).await?;

    Ok(Json(ApiResponse::ok(
        into_registrations(rows),
        "Your registrations retrieved successfully",
    )))
}

#[derive(Debug, Deserialize)]
pub struct AllRegistrationsQuery {
    pub status: Option<String>,
}

pub async fn all_registrations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<AllRegistrationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    let db = state.clone();
    let rows = run_blocking(move || db.db.list_all_registrations(status)).await?;

    Ok(Json(ApiResponse::ok(
        into_registrations(rows),
        "All registrations retrieved successfully",
    )))
}

pub async fn event_registrations(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = run_blocking(move || db.db.list_registrations_for_event(event_id)).await?;

    Ok(Json(ApiResponse::ok(
        into_registrations(rows),
        "Registrations retrieved successfully",
    )))
}

/// Status transition. Approval is admin-only; cancellation is open to the
/// owner as well; the storage layer holds the full rule set.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_status = parse_status(&req.status)?;

    let db = state.clone();
    let (user_id, is_admin) = (session.user_id, session.is_admin());
    let row =
        run_blocking(move || db.db.set_registration_status(id, new_status, user_id, is_admin))
            .await?;

    Ok(Json(ApiResponse::ok(
        row.into_registration(),
        "Registration updated successfully",
    )))
}

/// Owner-side cancel (`DELETE`). Admins cancel through `set_status`.
pub async fn cancel(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = session.user_id;
    let row = run_blocking(move || db.db.cancel_registration(id, user_id)).await?;

    Ok(Json(ApiResponse::ok(
        row.into_registration(),
        "Registration cancelled successfully",
    )))
}

fn parse_status(raw: &str) -> Result<RegistrationStatus, ApiError> {
    RegistrationStatus::parse(raw).ok_or_else(|| {
        DomainError::validation(["status must be one of pending, approved, cancelled".to_string()])
            .into()
    })
}

fn into_registrations(rows: Vec<RegistrationRow>) -> Vec<Registration> {
    rows.into_iter()
        .map(RegistrationRow::into_registration)
        .collect()
}
