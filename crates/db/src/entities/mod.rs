//! Database entities.

pub mod participant;
pub mod poll;
pub mod poll_event;

pub use participant::Entity as Participant;
pub use poll::Entity as Poll;
pub use poll_event::Entity as PollEvent;

/// Decode a JSON array of ids stored in a `JsonBinary` column.
///
/// Malformed values decode as an empty list.
#[must_use]
pub fn decode_ids(value: &serde_json::Value) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

/// Encode ids for a `JsonBinary` column.
#[must_use]
pub fn encode_ids(ids: &[String]) -> serde_json::Value {
    serde_json::json!(ids)
}
