//! API endpoints.

mod events;
pub mod health;
mod mail;
mod participants;
mod polls;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/polls",
            polls::router()
                .merge(events::router())
                .merge(participants::router()),
        )
        .nest("/mail", mail::router())
}
