use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use gather_db::DomainError;
use gather_db::models::{EventFilter, EventRow, EventSortField, RegistrationRow, SortDirection};
use gather_types::api::{ApiResponse, CreateEventRequest, EventDetail, UpdateEventRequest};
use gather_types::models::{Event, EventStatus};

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::sessions::Session;
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(EventStatus::parse(raw).ok_or_else(|| {
            DomainError::validation(["status must be one of open, closed, cancelled".to_string()])
        })?),
        None => None,
    };

    // Unknown sort fields and directions fall back silently; see the enums.
    let filter = EventFilter {
        status,
        search: query.search,
        sort: EventSortField::from_param(query.sort.as_deref()),
        order: SortDirection::from_param(query.order.as_deref()),
    };

    let db = state.clone();
    let rows = run_blocking(move || db.db.list_events(&filter)).await?;
    let events: Vec<Event> = rows.into_iter().map(EventRow::into_event).collect();

    Ok(Json(ApiResponse::ok(
        events,
        "Events retrieved successfully",
    )))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (event, registrations) = run_blocking(move || {
        let event = db.db.get_event(id)?;
        let registrations = db.db.list_registrations_for_event(id)?;
        Ok((event, registrations))
    })
    .await?;

    let detail = EventDetail {
        event: event.into_event(),
        registrations: registrations
            .into_iter()
            .map(RegistrationRow::into_registration)
            .collect(),
    };

    Ok(Json(ApiResponse::ok(
        detail,
        "Event retrieved successfully",
    )))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let new_event = validate::validate_new_event(&req)?;

    let db = state.clone();
    let created_by = session.user_id;
    let row = run_blocking(move || db.db.create_event(&new_event, created_by)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            row.into_event(),
            "Event created successfully",
        )),
    ))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let patch = validate::validate_event_patch(&req)?;

    let db = state.clone();
    let row = run_blocking(move || db.db.update_event(id, &patch)).await?;

    Ok(Json(ApiResponse::ok(
        row.into_event(),
        "Event updated successfully",
    )))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;

    let db = state.clone();
    run_blocking(move || db.db.delete_event(id)).await?;

    Ok(Json(ApiResponse::<()>::ok_empty(
        "Event deleted successfully",
    )))
}
