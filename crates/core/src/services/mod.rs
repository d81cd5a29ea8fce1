//! Business logic services.

#![allow(missing_docs)]

pub mod email;
pub mod event_set;
pub mod ical;
pub mod jobs;
pub mod poll;
pub mod push_notification;
pub mod render;

pub use email::{EmailMessage, EmailService, MailTemplate};
pub use event_set::{EventInput, EventSetDiff, EventUpdate, prune_ids, reconcile};
pub use ical::{ExportOptions, export_calendar};
pub use jobs::{Job, JobSender, JobService, JobWorkerContext};
pub use poll::{
    ParticipantInput, ParticipantView, PollInput, PollService, PollSettings, PollStats,
    normalize_selection,
};
pub use push_notification::{PushKeys, PushNotificationService, PushPayload, PushSubscription};
pub use render::Answer;
