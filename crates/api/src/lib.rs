//! HTTP API layer for apollusia-rs.
//!
//! - **Endpoints**: polls, events, participants, mail and health
//! - **Extractors**: bearer token, required or optional
//! - **Middleware**: token extraction
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{health::router as health_router, router};
