//! API middleware.

#![allow(missing_docs)]

use apollusia_common::Token;
use apollusia_core::PollService;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub poll_service: PollService,
}

/// Authentication middleware.
///
/// Stores the bearer token, if any, in the request extensions. Whether the
/// token grants anything is decided per operation.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() {
        let token = bearer.token().trim();
        if !token.is_empty() {
            let token = Token::from(token);
            req.extensions_mut().insert(token);
        }
    }

    next.run(req).await
}
