//! Core business logic for Apollusia.

pub mod services;

pub use services::*;
