//! iCalendar export of a poll.

use apollusia_db::entities::{participant, poll, poll_event};
use chrono::Utc;
use icalendar::{Calendar, Component, EventLike, Property};
use serde::Deserialize;

use super::render::Answer;

/// Export options chosen by the admin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// Event summary instead of the poll title.
    pub custom_title: Option<String>,
    /// Add participants with a mail address as attendees.
    #[serde(default)]
    pub invite_participants: bool,
}

/// Participants of one event who answered yes or maybe, in submission order.
fn attendees<'a>(
    participants: &'a [participant::Model],
    event_id: &str,
) -> Vec<(&'a participant::Model, Answer)> {
    participants
        .iter()
        .map(|p| (p, Answer::of(p, event_id)))
        .filter(|(_, answer)| answer.is_selected())
        .collect()
}

/// Summary line of an exported event.
#[must_use]
pub fn event_summary(title: &str, attendees: &[(&participant::Model, Answer)]) -> String {
    match attendees {
        [(only, _)] => format!("{title}: {}", only.name),
        _ => title.to_string(),
    }
}

/// Description of an exported event.
#[must_use]
pub fn event_description(
    poll_description: Option<&str>,
    note: Option<&str>,
    attendees: &[(&participant::Model, Answer)],
) -> String {
    let mut description = poll_description.unwrap_or_default().to_string();
    if let Some(note) = note.filter(|n| !n.is_empty()) {
        description.push_str(&format!("\n\nNote: {note}"));
    }
    description.push_str("\n\nParticipants:");
    for (participant, answer) in attendees {
        description.push_str(&format!("\n- {} ({})", participant.name, answer.as_str()));
    }
    description
}

/// Build the calendar document for a poll.
///
/// Every event is exported, including ones nobody selected.
#[must_use]
pub fn export_calendar(
    poll: &poll::Model,
    events: &[poll_event::Model],
    participants: &[participant::Model],
    url: &str,
    options: &ExportOptions,
) -> String {
    let mut calendar = Calendar::new();
    calendar.append_property(Property::new("METHOD", "REQUEST"));
    calendar.append_property(Property::new("X-WR-CALNAME", &poll.title));
    if let Some(description) = &poll.description {
        calendar.append_property(Property::new("X-WR-CALDESC", description));
    }
    if let Some(time_zone) = &poll.time_zone {
        calendar.append_property(Property::new("X-WR-TIMEZONE", time_zone));
    }

    let title = options.custom_title.as_deref().unwrap_or(&poll.title);

    for event in events {
        let selected = attendees(participants, &event.id);

        let mut ics_event = icalendar::Event::new();
        ics_event.uid(&event.id);
        ics_event.starts(event.start.with_timezone(&Utc));
        ics_event.ends(event.end.with_timezone(&Utc));
        ics_event.summary(&event_summary(title, &selected));
        ics_event.description(&event_description(
            poll.description.as_deref(),
            event.note.as_deref(),
            &selected,
        ));
        if let Some(location) = &poll.location {
            ics_event.location(location);
        }
        ics_event.add_property("URL", url);

        if options.invite_participants {
            for (participant, answer) in &selected {
                let Some(mail) = &participant.mail else {
                    continue;
                };
                let mut prop = Property::new("ATTENDEE", format!("mailto:{mail}"));
                prop.add_parameter("CN", &participant.name);
                prop.add_parameter(
                    "PARTSTAT",
                    if *answer == Answer::Yes {
                        "ACCEPTED"
                    } else {
                        "TENTATIVE"
                    },
                );
                ics_event.append_multi_property(prop);
            }
        }

        calendar.push(ics_event.done());
    }

    calendar.done().to_string()
}
