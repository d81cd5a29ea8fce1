//! Common utilities and shared types for apollusia-rs.
//!
//! This crate provides foundational components used across all apollusia-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Credentials**: Opaque bearer tokens compared in constant time via [`Token`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use apollusia_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {} for {}", id, config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod id;

pub use config::Config;
pub use credential::Token;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
