//! Poll event endpoints.

use apollusia_common::AppResult;
use apollusia_core::EventInput;
use apollusia_db::entities::poll_event;
use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    extractors::{ApiJson, BearerToken},
    middleware::AppState,
    response::ApiResponse,
};

/// Poll event response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub poll: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub note: Option<String>,
}

impl From<poll_event::Model> for EventResponse {
    fn from(event: poll_event::Model) -> Self {
        Self {
            id: event.id,
            poll: event.poll_id,
            start: event.start.with_timezone(&Utc),
            end: event.end.with_timezone(&Utc),
            note: event.note,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/events", get(get_events).post(post_events))
}

async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<EventResponse>>> {
    let events = state.poll_service.get_events(&id).await?;
    Ok(ApiResponse::ok(events.into_iter().map(Into::into).collect()))
}

/// Replace the event set. Returns the stored events ordered by start.
async fn post_events(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(events): ApiJson<Vec<EventInput>>,
) -> AppResult<ApiResponse<Vec<EventResponse>>> {
    let events = state.poll_service.post_events(&id, events, &token).await?;
    Ok(ApiResponse::ok(events.into_iter().map(Into::into).collect()))
}
