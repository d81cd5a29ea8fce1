//! Text rendering shared by mails and calendar export.

use apollusia_db::entities::{participant, poll_event};
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M %Z";

/// A participant's answer for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    Maybe,
    No,
}

impl Answer {
    /// The answer of `participant` for `event_id`. Unmarked events are `No`.
    #[must_use]
    pub fn of(participant: &participant::Model, event_id: &str) -> Self {
        if participant.yes_ids().iter().any(|id| id == event_id) {
            Self::Yes
        } else if participant.maybe_ids().iter().any(|id| id == event_id) {
            Self::Maybe
        } else {
            Self::No
        }
    }

    /// Whether the participant can attend at all.
    #[must_use]
    pub const fn is_selected(self) -> bool {
        matches!(self, Self::Yes | Self::Maybe)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::Maybe => "maybe",
            Self::No => "no",
        }
    }

    /// Marker shown in the admin summary table.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Yes => "✓",
            Self::Maybe => "?",
            Self::No => "X",
        }
    }

    /// CSS class used in the admin summary table.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Yes => "p-yes",
            Self::Maybe => "p-maybe",
            Self::No => "p-no",
        }
    }
}

/// Parse a poll's time zone, falling back to UTC for missing or unknown names.
#[must_use]
pub fn time_zone(name: Option<&str>) -> Tz {
    name.and_then(|n| n.parse::<Tz>().ok()).unwrap_or(Tz::UTC)
}

/// Render an instant in the given zone.
#[must_use]
pub fn render_date<Z: TimeZone>(date: &DateTime<Z>, tz: Tz) -> String {
    date.with_timezone(&tz).format(DATE_FORMAT).to_string()
}

/// Render an event as `<start> - <end>`.
#[must_use]
pub fn render_event(event: &poll_event::Model, tz: Tz) -> String {
    format!(
        "{} - {}",
        render_date(&event.start, tz),
        render_date(&event.end, tz)
    )
}

/// One line per booked event, suffixed ` *` where the participant can attend.
#[must_use]
pub fn booking_lines(
    booked: &[poll_event::Model],
    participant: &participant::Model,
    tz: Tz,
) -> Vec<String> {
    booked
        .iter()
        .map(|event| {
            let mut line = render_event(event, tz);
            if Answer::of(participant, &event.id).is_selected() {
                line.push_str(" *");
            }
            line
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(id: &str, hour: u32) -> poll_event::Model {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap();
        poll_event::Model {
            id: id.to_string(),
            poll_id: "p1".to_string(),
            start: start.into(),
            end: (start + chrono::Duration::minutes(30)).into(),
            note: None,
            created_at: start.into(),
        }
    }

    fn participant(yes: &[&str], maybe: &[&str]) -> participant::Model {
        let now = Utc::now().into();
        participant::Model {
            id: "a".to_string(),
            poll_id: "p1".to_string(),
            name: "Alice".to_string(),
            mail: Some("alice@example.com".to_string()),
            token: "t1".to_string(),
            participation: json!(yes),
            indeterminate_participation: json!(maybe),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_answer_of() {
        let p = participant(&["e1"], &["e2"]);
        assert_eq!(Answer::of(&p, "e1"), Answer::Yes);
        assert_eq!(Answer::of(&p, "e2"), Answer::Maybe);
        assert_eq!(Answer::of(&p, "e3"), Answer::No);
        assert_eq!(Answer::No.icon(), "X");
        assert_eq!(Answer::Maybe.css_class(), "p-maybe");
    }

    #[test]
    fn test_time_zone_fallback() {
        assert_eq!(time_zone(Some("Europe/Berlin")), Tz::Europe__Berlin);
        assert_eq!(time_zone(Some("Mars/Olympus")), Tz::UTC);
        assert_eq!(time_zone(None), Tz::UTC);
    }

    #[test]
    fn test_render_event_in_zone() {
        let line = render_event(&event("e1", 9), Tz::Europe__Berlin);
        assert_eq!(line, "Mon, 10 Mar 2025 10:00 CET - Mon, 10 Mar 2025 10:30 CET");
    }

    #[test]
    fn test_booking_lines_mark_selected() {
        let booked = [event("e1", 9), event("e2", 11), event("e3", 13)];
        let p = participant(&["e1"], &["e3"]);

        let lines = booking_lines(&booked, &p, Tz::UTC);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Mon, 10 Mar 2025 09:00 UTC - Mon, 10 Mar 2025 09:30 UTC *");
        assert!(!lines[1].ends_with(" *"));
        assert!(lines[2].ends_with(" *"));
    }
}
