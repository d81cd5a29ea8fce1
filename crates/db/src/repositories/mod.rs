//! Repositories over the poll tables.

mod participant;
mod poll;
mod poll_event;

pub use participant::ParticipantRepository;
pub use poll::{ActiveFilter, PollRepository};
pub use poll_event::PollEventRepository;
