use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use gather_db::models::EventRow;
use gather_types::api::{ApiResponse, PopularEvent};
use gather_types::models::Event;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::middleware::MaybeSession;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    5
}

/// Dashboard counters. Anonymous callers get the global numbers with zeroed
/// personal fields; the pending count only shows for admin sessions.
pub async fn stats(
    State(state): State<AppState>,
    Extension(MaybeSession(session)): Extension<MaybeSession>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = session.map(|s| (s.user_id, s.is_admin()));

    let db = state.clone();
    let stats = run_blocking(move || db.db.dashboard_stats(caller)).await?;

    Ok(Json(ApiResponse::ok(
        stats,
        "Statistics retrieved successfully",
    )))
}

pub async fn popular(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(100);

    let db = state.clone();
    let rows = run_blocking(move || db.db.popular_events(limit)).await?;
    let events: Vec<PopularEvent> = rows
        .into_iter()
        .map(|(row, occupancy_percentage)| PopularEvent {
            event: row.into_event(),
            occupancy_percentage,
        })
        .collect();

    Ok(Json(ApiResponse::ok(
        events,
        "Popular events retrieved successfully",
    )))
}

pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(100);

    let db = state.clone();
    let rows = run_blocking(move || db.db.recent_events(limit)).await?;
    let events: Vec<Event> = rows.into_iter().map(EventRow::into_event).collect();

    Ok(Json(ApiResponse::ok(
        events,
        "Recent events retrieved successfully",
    )))
}
