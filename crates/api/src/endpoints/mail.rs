//! Mail address endpoint.

use apollusia_common::AppResult;
use axum::{Router, extract::State, routing::put};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{ApiJson, BearerToken},
    middleware::AppState,
    response::ApiResponse,
};

/// Set mail request.
#[derive(Debug, Deserialize, Validate)]
pub struct SetMailRequest {
    /// New address; `null` clears it.
    #[validate(email)]
    pub mail: Option<String>,
}

/// Set mail response.
#[derive(Debug, Serialize)]
pub struct SetMailResponse {
    pub updated: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", put(set_mail))
}

/// Set the mail address on all of the caller's participations.
async fn set_mail(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SetMailRequest>,
) -> AppResult<ApiResponse<SetMailResponse>> {
    req.validate()?;
    let updated = state.poll_service.set_mail(&token, req.mail).await?;
    Ok(ApiResponse::ok(SetMailResponse { updated }))
}
