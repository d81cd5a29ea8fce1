//! Poll endpoints.

use apollusia_common::{AppResult, Token};
use apollusia_core::{ExportOptions, PollInput, PollStats};
use apollusia_db::entities::poll;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{ApiJson, BearerToken, MaybeToken},
    middleware::AppState,
    response::ApiResponse,
};

/// Poll settings response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub deadline: Option<DateTime<Utc>>,
    pub allow_maybe: bool,
    pub allow_edit: bool,
    pub anonymous: bool,
}

/// Poll response. Never carries the admin token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub time_zone: Option<String>,
    /// Only shown to the admin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_mail: Option<String>,
    /// Only shown to the admin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_push: Option<serde_json::Value>,
    pub settings: SettingsResponse,
    pub booked_events: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PollResponse {
    /// Build the view of a poll for a caller.
    #[must_use]
    pub fn for_caller(poll: poll::Model, token: Option<&Token>) -> Self {
        let is_admin = token.is_some_and(|t| t.matches(&poll.admin_token));
        let booked_events = poll.booked_event_ids();
        Self {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            location: poll.location,
            time_zone: poll.time_zone,
            admin_mail: poll.admin_mail.filter(|_| is_admin),
            admin_push: poll.admin_push.filter(|_| is_admin),
            settings: SettingsResponse {
                deadline: poll.deadline.map(|d| d.with_timezone(&Utc)),
                allow_maybe: poll.allow_maybe,
                allow_edit: poll.allow_edit,
                anonymous: poll.anonymous,
            },
            booked_events,
            created_at: poll.created_at.with_timezone(&Utc),
            updated_at: poll.updated_at.with_timezone(&Utc),
        }
    }
}

/// Poll with counts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatsResponse {
    #[serde(flatten)]
    pub poll: PollResponse,
    pub events: u64,
    pub participants: u64,
}

impl PollStatsResponse {
    fn for_caller(stats: PollStats, token: &Token) -> Self {
        Self {
            poll: PollResponse::for_caller(stats.poll, Some(token)),
            events: stats.events,
            participants: stats.participants,
        }
    }
}

/// List polls query.
#[derive(Debug, Default, Deserialize)]
pub struct ListPollsQuery {
    /// `true` for open polls, `false` for closed ones, absent for all.
    pub active: Option<bool>,
}

/// Book events request.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub events: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_polls).post(post_poll))
        .route("/participated", get(get_participated_polls))
        .route("/{id}", get(get_poll).put(put_poll).delete(delete_poll))
        .route("/{id}/admin", get(is_admin))
        .route("/{id}/clone", post(clone_poll))
        .route("/{id}/book", post(book_events))
        .route("/{id}/export.ics", get(export_calendar))
}

/// Polls administered by the caller.
async fn get_polls(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Query(query): Query<ListPollsQuery>,
) -> AppResult<ApiResponse<Vec<PollStatsResponse>>> {
    let polls = state.poll_service.get_polls(&token, query.active).await?;
    Ok(ApiResponse::ok(
        polls
            .into_iter()
            .map(|s| PollStatsResponse::for_caller(s, &token))
            .collect(),
    ))
}

/// Polls the caller participated in.
async fn get_participated_polls(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PollStatsResponse>>> {
    let polls = state.poll_service.get_participated_polls(&token).await?;
    Ok(ApiResponse::ok(
        polls
            .into_iter()
            .map(|s| PollStatsResponse::for_caller(s, &token))
            .collect(),
    ))
}

async fn get_poll(
    MaybeToken(token): MaybeToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.get_poll(&id).await?;
    Ok(ApiResponse::ok(PollResponse::for_caller(poll, token.as_ref())))
}

async fn is_admin(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<bool>> {
    let is_admin = state.poll_service.is_admin(&id, &token).await?;
    Ok(ApiResponse::ok(is_admin))
}

async fn post_poll(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PollInput>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.post_poll(input, &token).await?;
    Ok(ApiResponse::ok(PollResponse::for_caller(poll, Some(&token))))
}

async fn put_poll(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<PollInput>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.put_poll(&id, input, &token).await?;
    Ok(ApiResponse::ok(PollResponse::for_caller(poll, Some(&token))))
}

async fn clone_poll(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.clone_poll(&id, &token).await?;
    Ok(ApiResponse::ok(PollResponse::for_caller(poll, Some(&token))))
}

async fn delete_poll(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.delete_poll(&id, &token).await?;
    Ok(ApiResponse::ok(PollResponse::for_caller(poll, Some(&token))))
}

async fn book_events(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<BookRequest>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state
        .poll_service
        .book_events(&id, req.events, &token)
        .await?;
    Ok(ApiResponse::ok(PollResponse::for_caller(poll, Some(&token))))
}

/// Download the poll as an iCalendar file.
async fn export_calendar(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(options): Query<ExportOptions>,
) -> AppResult<Response> {
    let (poll, ics) = state.poll_service.export(&id, &token, &options).await?;
    let disposition = format!("attachment; filename=\"{}.ics\"", file_stem(&poll.title));

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics,
    )
        .into_response())
}

/// Title reduced to characters safe in a header file name.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "poll".to_string() } else { stem }
}
