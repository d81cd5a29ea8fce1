//! Event set reconciliation.
//!
//! Replacing a poll's events is a three-way diff between the stored rows and
//! the submitted list, keyed by event id. The diff is computed here without
//! touching the store; [`crate::PollService`] applies it.

use std::collections::{HashMap, HashSet};

use apollusia_common::{AppError, AppResult};
use apollusia_db::entities::poll_event;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// A submitted poll event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    /// Id of an existing event. Absent for new events.
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

impl EventInput {
    /// Reject events that end before they start.
    pub fn check_range(&self) -> AppResult<()> {
        if self.start >= self.end {
            return Err(AppError::Validation(format!(
                "event must end after it starts ({} >= {})",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// An event whose stored row must change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUpdate {
    /// The submitted values, with `id` set.
    pub input: EventInput,
    /// Whether start or end moved. Answers for a moved slot no longer hold.
    pub rescheduled: bool,
}

/// Result of comparing stored events against a submitted list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSetDiff {
    /// New events, to be stored under fresh ids.
    pub inserted: Vec<EventInput>,
    /// Known events whose start, end or note differ.
    pub updated: Vec<EventUpdate>,
    /// Ids of stored events missing from the submission.
    pub deleted: Vec<String>,
}

impl EventSetDiff {
    /// Whether applying the diff changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Ids whose answers must be removed from every participant.
    #[must_use]
    pub fn invalidated_ids(&self) -> HashSet<String> {
        self.deleted
            .iter()
            .cloned()
            .chain(
                self.updated
                    .iter()
                    .filter(|u| u.rescheduled)
                    .filter_map(|u| u.input.id.clone()),
            )
            .collect()
    }
}

/// Compute the diff that turns `stored` into `incoming`.
///
/// Entries without an id, or with an id that does not belong to this poll,
/// are inserted. When the same id is submitted twice the first entry wins.
#[must_use]
pub fn reconcile(stored: &[poll_event::Model], incoming: &[EventInput]) -> EventSetDiff {
    let by_id: HashMap<&str, &poll_event::Model> =
        stored.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut diff = EventSetDiff::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for input in incoming {
        let existing = input
            .id
            .as_deref()
            .and_then(|id| by_id.get(id).map(|model| (id, *model)));

        match existing {
            Some((id, _)) if !seen.insert(id) => {}
            Some((_, model)) => {
                let rescheduled = model.start != input.start || model.end != input.end;
                if rescheduled || model.note != input.note {
                    diff.updated.push(EventUpdate {
                        input: input.clone(),
                        rescheduled,
                    });
                }
            }
            None => diff.inserted.push(EventInput {
                id: None,
                ..input.clone()
            }),
        }
    }

    diff.deleted = stored
        .iter()
        .filter(|e| !seen.contains(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();

    diff
}

/// Remove `removed` ids from a list, keeping order.
///
/// Returns `None` when nothing was removed so callers can skip the write.
#[must_use]
pub fn prune_ids(ids: &[String], removed: &HashSet<String>) -> Option<Vec<String>> {
    if !ids.iter().any(|id| removed.contains(id)) {
        return None;
    }
    Some(ids.iter().filter(|id| !removed.contains(*id)).cloned().collect())
}
