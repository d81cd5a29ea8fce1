//! Participant endpoints.

use apollusia_common::AppResult;
use apollusia_core::{ParticipantInput, ParticipantView};
use apollusia_db::entities::participant;
use axum::{
    Router,
    extract::{Path, State},
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    extractors::{ApiJson, BearerToken, MaybeToken},
    middleware::AppState,
    response::ApiResponse,
};

/// Participant response.
///
/// Mail and token are only present on the caller's own records.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub id: String,
    pub poll: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub participation: Vec<String>,
    pub indeterminate_participation: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ParticipantResponse {
    fn new(participant: participant::Model, own: bool) -> Self {
        let participation = participant.yes_ids();
        let indeterminate_participation = participant.maybe_ids();
        Self {
            id: participant.id,
            poll: participant.poll_id,
            name: participant.name,
            mail: participant.mail.filter(|_| own),
            token: Some(participant.token).filter(|_| own),
            participation,
            indeterminate_participation,
            created_at: participant.created_at.with_timezone(&Utc),
            updated_at: participant.updated_at.with_timezone(&Utc),
        }
    }

    /// Full view, for records the caller just wrote.
    fn own(participant: participant::Model) -> Self {
        Self::new(participant, true)
    }
}

impl From<ParticipantView> for ParticipantResponse {
    fn from(view: ParticipantView) -> Self {
        Self::new(view.participant, view.own)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/participants",
            get(get_participants).post(post_participation),
        )
        .route(
            "/{id}/participants/{participant_id}",
            put(edit_participation).delete(delete_participation),
        )
}

async fn get_participants(
    MaybeToken(token): MaybeToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<ParticipantResponse>>> {
    let participants = state
        .poll_service
        .get_participants(&id, token.as_ref())
        .await?;
    Ok(ApiResponse::ok(
        participants.into_iter().map(Into::into).collect(),
    ))
}

async fn post_participation(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ParticipantInput>,
) -> AppResult<ApiResponse<ParticipantResponse>> {
    let participant = state
        .poll_service
        .post_participation(&id, input, &token)
        .await?;
    Ok(ApiResponse::ok(ParticipantResponse::own(participant)))
}

async fn edit_participation(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path((id, participant_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<ParticipantInput>,
) -> AppResult<ApiResponse<ParticipantResponse>> {
    let participant = state
        .poll_service
        .edit_participation(&id, &participant_id, input, &token)
        .await?;
    Ok(ApiResponse::ok(ParticipantResponse::own(participant)))
}

async fn delete_participation(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    Path((id, participant_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<ParticipantResponse>> {
    let participant = state
        .poll_service
        .delete_participation(&id, &participant_id, &token)
        .await?;
    let own = token.matches(&participant.token);
    Ok(ApiResponse::ok(ParticipantResponse::new(participant, own)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn participant() -> participant::Model {
        let now = Utc::now().into();
        participant::Model {
            id: "a".to_string(),
            poll_id: "p1".to_string(),
            name: "Alice".to_string(),
            mail: Some("alice@example.com".to_string()),
            token: "t1".to_string(),
            participation: json!(["e1"]),
            indeterminate_participation: json!(["e2"]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_masks_other_participants() {
        let view = ParticipantView {
            participant: participant(),
            own: false,
        };
        let value = serde_json::to_value(ParticipantResponse::from(view)).unwrap();

        assert!(value.get("mail").is_none());
        assert!(value.get("token").is_none());
        assert_eq!(value["participation"], json!(["e1"]));
        assert_eq!(value["indeterminateParticipation"], json!(["e2"]));
    }

    #[test]
    fn test_shows_own_record() {
        let value = serde_json::to_value(ParticipantResponse::own(participant())).unwrap();

        assert_eq!(value["mail"], json!("alice@example.com"));
        assert_eq!(value["token"], json!("t1"));
    }
}
