//! Poll service.

use std::collections::HashSet;

use apollusia_common::{AppError, AppResult, IdGenerator, Token};
use apollusia_db::{
    entities::{encode_ids, participant, poll, poll_event},
    repositories::{ActiveFilter, ParticipantRepository, PollEventRepository, PollRepository},
};
use chrono::{DateTime, Utc};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use tracing::{debug, info, warn};
use validator::Validate;

use super::email::MailTemplate;
use super::event_set::{prune_ids, reconcile, EventInput};
use super::ical::{export_calendar, ExportOptions};
use super::jobs::JobSender;
use super::push_notification::{PushPayload, PushSubscription};
use super::render::{booking_lines, time_zone};

const fn default_true() -> bool {
    true
}

/// Poll settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSettings {
    /// Participation closes at this instant.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub allow_maybe: bool,
    #[serde(default = "default_true")]
    pub allow_edit: bool,
    /// Participants only see their own answers.
    #[serde(default)]
    pub anonymous: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            deadline: None,
            allow_maybe: true,
            allow_edit: true,
            anonymous: false,
        }
    }
}

/// Input for creating or replacing a poll.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PollInput {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(length(max = 512))]
    pub location: Option<String>,
    /// IANA time zone name.
    pub time_zone: Option<String>,
    #[validate(email)]
    pub admin_mail: Option<String>,
    #[validate(nested)]
    pub admin_push: Option<PushSubscription>,
    #[serde(default)]
    pub settings: PollSettings,
}

impl PollInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        match &self.time_zone {
            Some(name) if name.parse::<chrono_tz::Tz>().is_err() => Err(AppError::Validation(
                format!("unknown time zone: {name}"),
            )),
            _ => Ok(()),
        }
    }

    fn admin_push_json(&self) -> AppResult<Option<serde_json::Value>> {
        self.admin_push
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Failed to encode push subscription: {e}")))
    }
}

/// Input for submitting or editing a participation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInput {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(email)]
    pub mail: Option<String>,
    /// Event ids answered with yes.
    #[serde(default)]
    pub participation: Vec<String>,
    /// Event ids answered with maybe.
    #[serde(default)]
    pub indeterminate_participation: Vec<String>,
}

/// A poll with its event and participant counts.
#[derive(Debug, Clone)]
pub struct PollStats {
    pub poll: poll::Model,
    pub events: u64,
    pub participants: u64,
}

/// A participant as seen by a caller.
#[derive(Debug, Clone)]
pub struct ParticipantView {
    pub participant: participant::Model,
    /// Whether the record belongs to the caller.
    pub own: bool,
}

/// Check an answer set against the poll's events and settings.
///
/// Returns the deduplicated yes and maybe lists, keeping submission order.
pub fn normalize_selection(
    yes: &[String],
    maybe: &[String],
    event_ids: &HashSet<&str>,
    allow_maybe: bool,
) -> AppResult<(Vec<String>, Vec<String>)> {
    if !allow_maybe && !maybe.is_empty() {
        return Err(AppError::BadRequest(
            "This poll does not allow maybe answers".to_string(),
        ));
    }

    let yes = dedup_ids(yes, event_ids)?;
    let maybe = dedup_ids(maybe, event_ids)?;
    if let Some(id) = maybe.iter().find(|id| yes.contains(id)) {
        return Err(AppError::BadRequest(format!(
            "Event {id} is marked both yes and maybe"
        )));
    }
    Ok((yes, maybe))
}

fn dedup_ids(ids: &[String], event_ids: &HashSet<&str>) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !event_ids.contains(id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Event {id} does not belong to this poll"
            )));
        }
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    Ok(out)
}

fn ensure_admin(poll: &poll::Model, token: &Token) -> AppResult<()> {
    if token.matches(&poll.admin_token) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Not the admin of poll {}",
            poll.id
        )))
    }
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    event_repo: PollEventRepository,
    participant_repo: ParticipantRepository,
    jobs: Option<JobSender>,
    origin: String,
    id_gen: IdGenerator,
}

impl PollService {
    /// Create a new poll service.
    ///
    /// `origin` is the public frontend URL used in notification links.
    #[must_use]
    pub fn new(
        poll_repo: PollRepository,
        event_repo: PollEventRepository,
        participant_repo: ParticipantRepository,
        jobs: Option<JobSender>,
        origin: &str,
    ) -> Self {
        Self {
            poll_repo,
            event_repo,
            participant_repo,
            jobs,
            origin: origin.trim_end_matches('/').to_string(),
            id_gen: IdGenerator::new(),
        }
    }

    fn participate_url(&self, poll_id: &str) -> String {
        format!("{}/poll/{poll_id}/participate", self.origin)
    }

    // ==================== Polls ====================

    /// Polls administered by `token`, newest first.
    pub async fn get_polls(&self, token: &Token, active: Option<bool>) -> AppResult<Vec<PollStats>> {
        let polls = self
            .poll_repo
            .find_by_admin_token(token.as_str(), ActiveFilter::from_flag(active))
            .await?;
        self.with_stats(polls).await
    }

    /// Polls in which `token` holds at least one participant record.
    pub async fn get_participated_polls(&self, token: &Token) -> AppResult<Vec<PollStats>> {
        let ids = self
            .participant_repo
            .find_poll_ids_by_token(token.as_str())
            .await?;
        let polls = self.poll_repo.find_by_ids(&ids).await?;
        self.with_stats(polls).await
    }

    async fn with_stats(&self, polls: Vec<poll::Model>) -> AppResult<Vec<PollStats>> {
        let mut stats = Vec::with_capacity(polls.len());
        for poll in polls {
            let events = self.event_repo.count_by_poll(&poll.id).await?;
            let participants = self.participant_repo.count_by_poll(&poll.id).await?;
            stats.push(PollStats {
                poll,
                events,
                participants,
            });
        }
        Ok(stats)
    }

    /// Get a poll.
    pub async fn get_poll(&self, id: &str) -> AppResult<poll::Model> {
        self.poll_repo.get_by_id(id).await
    }

    /// Whether `token` administers the poll.
    pub async fn is_admin(&self, id: &str, token: &Token) -> AppResult<bool> {
        let poll = self.poll_repo.get_by_id(id).await?;
        Ok(token.matches(&poll.admin_token))
    }

    /// Create a poll administered by `token`.
    pub async fn post_poll(&self, input: PollInput, token: &Token) -> AppResult<poll::Model> {
        input.check()?;
        let admin_push = input.admin_push_json()?;
        let now = Utc::now();

        let model = poll::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            description: Set(input.description),
            location: Set(input.location),
            time_zone: Set(input.time_zone),
            admin_token: Set(token.as_str().to_string()),
            admin_mail: Set(input.admin_mail),
            admin_push: Set(admin_push),
            deadline: Set(input.settings.deadline.map(Into::into)),
            allow_maybe: Set(input.settings.allow_maybe),
            allow_edit: Set(input.settings.allow_edit),
            anonymous: Set(input.settings.anonymous),
            booked_events: Set(encode_ids(&[])),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let poll = self.poll_repo.create(model).await?;
        info!(poll_id = %poll.id, "Poll created");
        Ok(poll)
    }

    /// Replace a poll's fields. Booked events are kept.
    pub async fn put_poll(&self, id: &str, input: PollInput, token: &Token) -> AppResult<poll::Model> {
        input.check()?;
        let poll = self.poll_repo.get_by_id(id).await?;
        ensure_admin(&poll, token)?;
        let admin_push = input.admin_push_json()?;

        let mut active = poll.into_active_model();
        active.title = Set(input.title);
        active.description = Set(input.description);
        active.location = Set(input.location);
        active.time_zone = Set(input.time_zone);
        active.admin_mail = Set(input.admin_mail);
        active.admin_push = Set(admin_push);
        active.deadline = Set(input.settings.deadline.map(Into::into));
        active.allow_maybe = Set(input.settings.allow_maybe);
        active.allow_edit = Set(input.settings.allow_edit);
        active.anonymous = Set(input.settings.anonymous);
        active.updated_at = Set(Utc::now().into());

        self.poll_repo.update(active).await
    }

    /// Copy a poll and its events under a new id.
    ///
    /// The copy has no participants and no bookings and belongs to `token`.
    pub async fn clone_poll(&self, id: &str, token: &Token) -> AppResult<poll::Model> {
        let source = self.poll_repo.get_by_id(id).await?;
        ensure_admin(&source, token)?;
        let events = self.event_repo.find_by_poll(id).await?;
        let now = Utc::now();

        let model = poll::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(format!("{} (clone)", source.title)),
            description: Set(source.description),
            location: Set(source.location),
            time_zone: Set(source.time_zone),
            admin_token: Set(token.as_str().to_string()),
            admin_mail: Set(source.admin_mail),
            admin_push: Set(source.admin_push),
            deadline: Set(source.deadline),
            allow_maybe: Set(source.allow_maybe),
            allow_edit: Set(source.allow_edit),
            anonymous: Set(source.anonymous),
            booked_events: Set(encode_ids(&[])),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let clone = self.poll_repo.create(model).await?;

        for event in events {
            self.event_repo
                .create(poll_event::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    poll_id: Set(clone.id.clone()),
                    start: Set(event.start),
                    end: Set(event.end),
                    note: Set(event.note),
                    created_at: Set(now.into()),
                })
                .await?;
        }

        info!(poll_id = %clone.id, source_id = %id, "Poll cloned");
        Ok(clone)
    }

    /// Delete a poll, then its events, then its participants.
    pub async fn delete_poll(&self, id: &str, token: &Token) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(id).await?;
        ensure_admin(&poll, token)?;

        if !self.poll_repo.delete(id).await? {
            return Err(AppError::PollNotFound(id.to_string()));
        }
        let events = self.event_repo.delete_by_poll(id).await?;
        let participants = self.participant_repo.delete_by_poll(id).await?;

        info!(poll_id = %id, events, participants, "Poll deleted");
        Ok(poll)
    }

    // ==================== Events ====================

    /// Events of a poll ordered by start.
    pub async fn get_events(&self, id: &str) -> AppResult<Vec<poll_event::Model>> {
        self.poll_repo.get_by_id(id).await?;
        self.event_repo.find_by_poll(id).await
    }

    /// Replace the event set of a poll.
    ///
    /// Answers for deleted or rescheduled events are removed from every
    /// participant, and deleted events are removed from the bookings.
    pub async fn post_events(
        &self,
        id: &str,
        incoming: Vec<EventInput>,
        token: &Token,
    ) -> AppResult<Vec<poll_event::Model>> {
        for event in &incoming {
            event.validate()?;
            event.check_range()?;
        }

        let poll = self.poll_repo.get_by_id(id).await?;
        ensure_admin(&poll, token)?;

        let stored = self.event_repo.find_by_poll(id).await?;
        let diff = reconcile(&stored, &incoming);
        if diff.is_empty() {
            return Ok(stored);
        }

        let now = Utc::now();
        for input in &diff.inserted {
            self.event_repo
                .create(poll_event::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    poll_id: Set(id.to_string()),
                    start: Set(input.start.into()),
                    end: Set(input.end.into()),
                    note: Set(input.note.clone()),
                    created_at: Set(now.into()),
                })
                .await?;
        }

        for update in &diff.updated {
            let Some(model) = stored
                .iter()
                .find(|e| Some(e.id.as_str()) == update.input.id.as_deref())
            else {
                continue;
            };
            let mut active = model.clone().into_active_model();
            active.start = Set(update.input.start.into());
            active.end = Set(update.input.end.into());
            active.note = Set(update.input.note.clone());
            self.event_repo.update(active).await?;
        }

        self.event_repo.delete_by_ids(id, &diff.deleted).await?;

        let invalidated = diff.invalidated_ids();
        if !invalidated.is_empty() {
            let pruned = self.prune_participations(id, &invalidated).await?;
            debug!(poll_id = %id, pruned, "Pruned participations");
        }

        let deleted: HashSet<String> = diff.deleted.iter().cloned().collect();
        if let Some(booked) = prune_ids(&poll.booked_event_ids(), &deleted) {
            self.poll_repo.set_booked_events(poll, &booked).await?;
        }

        info!(
            poll_id = %id,
            inserted = diff.inserted.len(),
            updated = diff.updated.len(),
            deleted = diff.deleted.len(),
            "Poll events replaced"
        );

        self.event_repo.find_by_poll(id).await
    }

    async fn prune_participations(&self, poll_id: &str, removed: &HashSet<String>) -> AppResult<usize> {
        let participants = self.participant_repo.find_by_poll(poll_id).await?;
        let mut count = 0;

        for participant in participants {
            let yes = participant.yes_ids();
            let maybe = participant.maybe_ids();
            let pruned_yes = prune_ids(&yes, removed);
            let pruned_maybe = prune_ids(&maybe, removed);
            if pruned_yes.is_none() && pruned_maybe.is_none() {
                continue;
            }

            let yes = pruned_yes.unwrap_or(yes);
            let maybe = pruned_maybe.unwrap_or(maybe);
            self.participant_repo
                .set_selection(participant, &yes, &maybe)
                .await?;
            count += 1;
        }

        Ok(count)
    }

    // ==================== Participants ====================

    /// Participants of a poll as seen by `token`.
    ///
    /// Other people's records come first, the caller's own last. On anonymous
    /// polls only the admin sees other people's records.
    pub async fn get_participants(
        &self,
        id: &str,
        token: Option<&Token>,
    ) -> AppResult<Vec<ParticipantView>> {
        let poll = self.poll_repo.get_by_id(id).await?;
        let participants = self.participant_repo.find_by_poll(id).await?;

        let is_admin = token.is_some_and(|t| t.matches(&poll.admin_token));
        let show_others = !poll.anonymous || is_admin;

        let (own, others): (Vec<_>, Vec<_>) = participants
            .into_iter()
            .partition(|p| token.is_some_and(|t| t.matches(&p.token)));

        let others = others
            .into_iter()
            .filter(|_| show_others)
            .map(|participant| ParticipantView {
                participant,
                own: false,
            });
        let own = own.into_iter().map(|participant| ParticipantView {
            participant,
            own: true,
        });

        Ok(others.chain(own).collect())
    }

    /// Submit a participation.
    ///
    /// Notifications are queued after the record is stored and never awaited.
    pub async fn post_participation(
        &self,
        id: &str,
        input: ParticipantInput,
        token: &Token,
    ) -> AppResult<participant::Model> {
        input.validate()?;
        let poll = self.poll_repo.get_by_id(id).await?;
        if poll.is_closed(Utc::now().into()) {
            return Err(AppError::Forbidden(format!("Poll {id} is closed")));
        }

        let events = self.event_repo.find_by_poll(id).await?;
        let event_ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        let (yes, maybe) = normalize_selection(
            &input.participation,
            &input.indeterminate_participation,
            &event_ids,
            poll.allow_maybe,
        )?;

        let now = Utc::now();
        let participant = self
            .participant_repo
            .create(participant::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(id.to_string()),
                name: Set(input.name),
                mail: Set(input.mail),
                token: Set(token.as_str().to_string()),
                participation: Set(encode_ids(&yes)),
                indeterminate_participation: Set(encode_ids(&maybe)),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            })
            .await?;

        info!(poll_id = %id, participant_id = %participant.id, "Participation submitted");
        self.notify_participation(&poll, &participant, &events);
        Ok(participant)
    }

    fn notify_participation(
        &self,
        poll: &poll::Model,
        participant: &participant::Model,
        events: &[poll_event::Model],
    ) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        let tz = time_zone(poll.time_zone.as_deref());

        if let Some(admin_mail) = &poll.admin_mail {
            let message = MailTemplate::Participant {
                poll,
                participant,
                events,
            }
            .render("Poll Admin", admin_mail, &self.origin, tz);
            if let Err(e) = jobs.mail(message) {
                warn!(poll_id = %poll.id, error = %e, "Failed to queue admin mail");
            }
        }

        if let Some(subscription) = poll.admin_push.as_ref().and_then(PushSubscription::from_json) {
            let payload = PushPayload {
                title: "Updates in Poll | Apollusia".to_string(),
                body: format!("{} participated in your poll {}", participant.name, poll.title),
                url: self.participate_url(&poll.id),
            };
            if let Err(e) = jobs.push(subscription, payload) {
                warn!(poll_id = %poll.id, error = %e, "Failed to queue admin push");
            }
        }

        if let Some(mail) = &participant.mail {
            let message = MailTemplate::Participated { poll, participant }.render(
                &participant.name,
                mail,
                &self.origin,
                tz,
            );
            if let Err(e) = jobs.mail(message) {
                warn!(poll_id = %poll.id, error = %e, "Failed to queue participant mail");
            }
        }
    }

    /// Edit a participation. Only the token that submitted it may edit.
    pub async fn edit_participation(
        &self,
        id: &str,
        participant_id: &str,
        input: ParticipantInput,
        token: &Token,
    ) -> AppResult<participant::Model> {
        input.validate()?;
        let poll = self.poll_repo.get_by_id(id).await?;
        let participant = self.participant_repo.get_in_poll(id, participant_id).await?;

        if !token.matches(&participant.token) {
            return Err(AppError::Forbidden(format!(
                "Not the owner of participation {participant_id}"
            )));
        }
        if !poll.allow_edit {
            return Err(AppError::Forbidden(format!("Poll {id} does not allow edits")));
        }
        if poll.is_closed(Utc::now().into()) {
            return Err(AppError::Forbidden(format!("Poll {id} is closed")));
        }

        let events = self.event_repo.find_by_poll(id).await?;
        let event_ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        let (yes, maybe) = normalize_selection(
            &input.participation,
            &input.indeterminate_participation,
            &event_ids,
            poll.allow_maybe,
        )?;

        let mut active = participant.into_active_model();
        active.name = Set(input.name);
        active.mail = Set(input.mail);
        active.participation = Set(encode_ids(&yes));
        active.indeterminate_participation = Set(encode_ids(&maybe));
        active.updated_at = Set(Utc::now().into());

        self.participant_repo.update(active).await
    }

    /// Delete a participation. Allowed to the poll admin and the owner.
    pub async fn delete_participation(
        &self,
        id: &str,
        participant_id: &str,
        token: &Token,
    ) -> AppResult<participant::Model> {
        let poll = self.poll_repo.get_by_id(id).await?;
        let participant = self.participant_repo.get_in_poll(id, participant_id).await?;

        if !token.matches(&poll.admin_token) && !token.matches(&participant.token) {
            return Err(AppError::Forbidden(format!(
                "Not allowed to delete participation {participant_id}"
            )));
        }

        if !self.participant_repo.delete(participant_id).await? {
            return Err(AppError::ParticipantNotFound(participant_id.to_string()));
        }
        info!(poll_id = %id, participant_id = %participant_id, "Participation deleted");
        Ok(participant)
    }

    /// Set the mail address on every participation held by `token`.
    pub async fn set_mail(&self, token: &Token, mail: Option<String>) -> AppResult<u64> {
        self.participant_repo
            .set_mail_by_token(token.as_str(), mail)
            .await
    }

    // ==================== Booking ====================

    /// Book events and mail every participant with an address.
    pub async fn book_events(
        &self,
        id: &str,
        event_ids: Vec<String>,
        token: &Token,
    ) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(id).await?;
        ensure_admin(&poll, token)?;

        let events = self.event_repo.find_by_poll(id).await?;
        let mut seen = HashSet::new();
        let mut booked = Vec::with_capacity(event_ids.len());
        for event_id in event_ids {
            let Some(event) = events.iter().find(|e| e.id == event_id) else {
                return Err(AppError::BadRequest(format!(
                    "Event {event_id} does not belong to this poll"
                )));
            };
            if !seen.insert(event_id.clone()) {
                return Err(AppError::BadRequest(format!(
                    "Event {event_id} is booked more than once"
                )));
            }
            booked.push(event.clone());
        }

        let ids: Vec<String> = booked.iter().map(|e| e.id.clone()).collect();
        let poll = self.poll_repo.set_booked_events(poll, &ids).await?;
        info!(poll_id = %id, booked = ids.len(), "Events booked");

        if let Some(jobs) = &self.jobs {
            let tz = time_zone(poll.time_zone.as_deref());
            let participants = self.participant_repo.find_by_poll(id).await?;

            for participant in &participants {
                let Some(mail) = &participant.mail else {
                    continue;
                };
                let appointments = booking_lines(&booked, participant, tz);
                let message = MailTemplate::Book {
                    poll: &poll,
                    participant,
                    appointments: &appointments,
                }
                .render(&participant.name, mail, &self.origin, tz);
                if let Err(e) = jobs.mail(message) {
                    warn!(poll_id = %id, participant_id = %participant.id, error = %e, "Failed to queue booking mail");
                }
            }
        }

        Ok(poll)
    }

    // ==================== Export ====================

    /// Export a poll as an iCalendar document.
    pub async fn export(&self, id: &str, token: &Token, options: &ExportOptions) -> AppResult<(poll::Model, String)> {
        let poll = self.poll_repo.get_by_id(id).await?;
        ensure_admin(&poll, token)?;

        let events = self.event_repo.find_by_poll(id).await?;
        let participants = self.participant_repo.find_by_poll(id).await?;
        let ics = export_calendar(&poll, &events, &participants, &self.participate_url(id), options);

        Ok((poll, ics))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::jobs::{Job, JobService};
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use serde_json::json;

    const ADMIN: &str = "admin-token";

    fn test_poll() -> poll::Model {
        let now = Utc::now().into();
        poll::Model {
            id: "p1".to_string(),
            title: "Standup".to_string(),
            description: None,
            location: None,
            time_zone: Some("UTC".to_string()),
            admin_token: ADMIN.to_string(),
            admin_mail: None,
            admin_push: None,
            deadline: None,
            allow_maybe: true,
            allow_edit: true,
            anonymous: false,
            booked_events: json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    fn test_event(id: &str, hour: u32) -> poll_event::Model {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap();
        poll_event::Model {
            id: id.to_string(),
            poll_id: "p1".to_string(),
            start: start.into(),
            end: (start + Duration::hours(1)).into(),
            note: None,
            created_at: start.into(),
        }
    }

    fn test_participant(id: &str, token: &str, yes: &[&str]) -> participant::Model {
        let now = Utc::now().into();
        participant::Model {
            id: id.to_string(),
            poll_id: "p1".to_string(),
            name: "Alice".to_string(),
            mail: Some("alice@example.com".to_string()),
            token: token.to_string(),
            participation: json!(yes),
            indeterminate_participation: json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    fn input_for(event: &poll_event::Model) -> EventInput {
        EventInput {
            id: Some(event.id.clone()),
            start: event.start.with_timezone(&Utc),
            end: event.end.with_timezone(&Utc),
            note: event.note.clone(),
        }
    }

    fn service(db: &Arc<DatabaseConnection>, jobs: Option<JobSender>) -> PollService {
        PollService::new(
            PollRepository::new(db.clone()),
            PollEventRepository::new(db.clone()),
            ParticipantRepository::new(db.clone()),
            jobs,
            "https://apollusia.com/",
        )
    }

    fn sql_log(db: Arc<DatabaseConnection>) -> String {
        let conn = Arc::try_unwrap(db).ok().unwrap();
        format!("{:?}", conn.into_transaction_log())
    }

    /// The logged statement whose SQL contains `sql`.
    fn statement<'a>(log: &'a str, sql: &str) -> &'a str {
        log.split("Statement {").find(|s| s.contains(sql)).unwrap()
    }

    /// Debug form of a JSON column value as it appears in the log.
    fn json_value(value: serde_json::Value) -> String {
        format!("{:?}", sea_orm::Value::Json(Some(Box::new(value))))
    }

    #[tokio::test]
    async fn test_get_poll_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let result = service(&db, None).get_poll("missing").await;
        assert!(matches!(result, Err(AppError::PollNotFound(_))));
    }

    #[tokio::test]
    async fn test_put_poll_rejects_wrong_token() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .into_connection(),
        );

        let input = PollInput {
            title: "Renamed".to_string(),
            description: None,
            location: None,
            time_zone: None,
            admin_mail: None,
            admin_push: None,
            settings: PollSettings::default(),
        };
        let result = service(&db, None)
            .put_poll("p1", input, &Token::from("someone-else"))
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_post_poll_rejects_unknown_time_zone() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let input = PollInput {
            title: "Standup".to_string(),
            description: None,
            location: None,
            time_zone: Some("Mars/Olympus".to_string()),
            admin_mail: None,
            admin_push: None,
            settings: PollSettings::default(),
        };
        let result = service(&db, None).post_poll(input, &Token::from(ADMIN)).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_clone_poll_appends_suffix() {
        let mut clone = test_poll();
        clone.id = "p2".to_string();
        clone.title = "Standup (clone)".to_string();
        let copied: Vec<_> = [("e8", 9), ("e9", 10)]
            .into_iter()
            .map(|(id, hour)| {
                let mut event = test_event(id, hour);
                event.poll_id = "p2".to_string();
                event
            })
            .collect();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_event("e1", 9), test_event("e2", 10)]])
                .append_query_results([[clone]])
                .append_query_results([[copied[0].clone()]])
                .append_query_results([[copied[1].clone()]])
                .into_connection(),
        );

        let svc = service(&db, None);
        let result = svc.clone_poll("p1", &Token::from(ADMIN)).await.unwrap();
        drop(svc);

        assert_eq!(result.title, "Standup (clone)");
        let log = sql_log(db);
        assert!(log.contains("Standup (clone)"));
        assert_eq!(log.matches(r#"INSERT INTO \"poll_event\""#).count(), 2);
    }

    #[tokio::test]
    async fn test_delete_poll_cascades() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 2,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 3,
                    },
                ])
                .into_connection(),
        );

        let svc = service(&db, None);
        let deleted = svc.delete_poll("p1", &Token::from(ADMIN)).await.unwrap();
        drop(svc);

        assert_eq!(deleted.id, "p1");
        let log = sql_log(db);
        assert!(log.contains(r#"DELETE FROM \"poll\""#));
        assert!(log.contains(r#"DELETE FROM \"poll_event\""#));
        assert!(log.contains(r#"DELETE FROM \"participant\""#));
    }

    #[tokio::test]
    async fn test_post_events_unchanged_is_noop() {
        let events = vec![test_event("e1", 9), test_event("e2", 10)];
        let incoming = events.iter().map(input_for).collect();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([events])
                .into_connection(),
        );

        let svc = service(&db, None);
        let result = svc
            .post_events("p1", incoming, &Token::from(ADMIN))
            .await
            .unwrap();
        drop(svc);

        assert_eq!(result.len(), 2);
        let log = sql_log(db);
        assert!(!log.contains("INSERT"));
        assert!(!log.contains("UPDATE"));
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn test_post_events_prunes_deleted_event() {
        // Stored E1, E2; Alice answered yes to both; only E1 is resubmitted
        let e1 = test_event("e1", 9);
        let e2 = test_event("e2", 10);
        let alice = test_participant("a", "t1", &["e1", "e2"]);
        let mut pruned = alice.clone();
        pruned.participation = json!(["e1"]);
        let mut booked_poll = test_poll();
        booked_poll.booked_events = json!(["e2"]);
        let mut unbooked_poll = booked_poll.clone();
        unbooked_poll.booked_events = json!([]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[booked_poll]])
                .append_query_results([[e1.clone(), e2]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[alice]])
                .append_query_results([[pruned]])
                .append_query_results([[unbooked_poll]])
                .append_query_results([[e1.clone()]])
                .into_connection(),
        );

        let svc = service(&db, None);
        let result = svc
            .post_events("p1", vec![input_for(&e1)], &Token::from(ADMIN))
            .await
            .unwrap();
        drop(svc);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "e1");
        let log = sql_log(db);
        assert!(log.contains(r#"DELETE FROM \"poll_event\""#));
        assert!(log.contains(r#"UPDATE \"participant\""#));
        assert!(log.contains(r#"UPDATE \"poll\""#));
    }

    #[tokio::test]
    async fn test_post_events_prunes_maybe_answer() {
        // Alice: yes to E1, maybe to E2; E2 is dropped from the resubmitted set
        let e1 = test_event("e1", 9);
        let e2 = test_event("e2", 10);
        let mut alice = test_participant("a", "t1", &["e1"]);
        alice.indeterminate_participation = json!(["e2"]);
        let mut pruned = alice.clone();
        pruned.indeterminate_participation = json!([]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[e1.clone(), e2]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[alice]])
                .append_query_results([[pruned]])
                .append_query_results([[e1.clone()]])
                .into_connection(),
        );

        let svc = service(&db, None);
        let result = svc
            .post_events("p1", vec![input_for(&e1)], &Token::from(ADMIN))
            .await
            .unwrap();
        drop(svc);

        assert_eq!(result.len(), 1);
        let log = sql_log(db);
        let update = statement(&log, r#"UPDATE \"participant\""#);
        assert!(update.contains(&json_value(json!(["e1"]))));
        assert!(update.contains(&json_value(json!([]))));
        assert!(!update.contains(r#"String("e2")"#));
        assert!(!log.contains(r#"UPDATE \"poll\""#));
    }

    #[tokio::test]
    async fn test_post_events_rejects_inverted_range() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let mut event = input_for(&test_event("e1", 9));
        std::mem::swap(&mut event.start, &mut event.end);

        let result = service(&db, None)
            .post_events("p1", vec![event], &Token::from(ADMIN))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_post_participation_after_deadline() {
        let mut poll = test_poll();
        poll.deadline = Some((Utc::now() - Duration::hours(1)).into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .into_connection(),
        );

        let input = ParticipantInput {
            name: "Alice".to_string(),
            mail: None,
            participation: vec![],
            indeterminate_participation: vec![],
        };
        let result = service(&db, None)
            .post_participation("p1", input, &Token::from("t1"))
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_post_participation_queues_notifications() {
        let mut poll = test_poll();
        poll.admin_mail = Some("admin@example.com".to_string());
        poll.admin_push = Some(json!({
            "endpoint": "https://push.example.com/send/abc",
            "keys": {"p256dh": "BNcR", "auth": "tBHI"}
        }));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .append_query_results([[test_event("e1", 9), test_event("e2", 10)]])
                .append_query_results([[test_participant("a", "t1", &["e1"])]])
                .into_connection(),
        );

        let jobs = JobService::new();
        let sender = jobs.sender();
        let mut receiver = jobs.into_receiver();

        let input = ParticipantInput {
            name: "Alice".to_string(),
            mail: Some("alice@example.com".to_string()),
            participation: vec!["e1".to_string()],
            indeterminate_participation: vec![],
        };
        let participant = service(&db, Some(sender))
            .post_participation("p1", input, &Token::from("t1"))
            .await
            .unwrap();
        assert_eq!(participant.id, "a");

        let Job::Mail(admin_mail) = receiver.try_recv().unwrap() else {
            panic!("expected admin mail first");
        };
        assert_eq!(admin_mail.to, "admin@example.com");
        assert_eq!(admin_mail.subject, "Updates in Poll");

        let Job::Push { payload, .. } = receiver.try_recv().unwrap() else {
            panic!("expected admin push second");
        };
        assert_eq!(payload.title, "Updates in Poll | Apollusia");
        assert_eq!(payload.body, "Alice participated in your poll Standup");
        assert_eq!(payload.url, "https://apollusia.com/poll/p1/participate");

        let Job::Mail(confirmation) = receiver.try_recv().unwrap() else {
            panic!("expected participant mail last");
        };
        assert_eq!(confirmation.subject, "Participated in Poll");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_post_participation_rejects_foreign_event() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_event("e1", 9)]])
                .into_connection(),
        );

        let input = ParticipantInput {
            name: "Alice".to_string(),
            mail: None,
            participation: vec!["other-poll-event".to_string()],
            indeterminate_participation: vec![],
        };
        let result = service(&db, None)
            .post_participation("p1", input, &Token::from("t1"))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_edit_participation_rejects_token_mismatch() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_participant("a", "t1", &["e1"])]])
                .into_connection(),
        );

        let input = ParticipantInput {
            name: "Mallory".to_string(),
            mail: None,
            participation: vec![],
            indeterminate_participation: vec![],
        };
        let svc = service(&db, None);
        let result = svc
            .edit_participation("p1", "a", input, &Token::from("t2"))
            .await;
        drop(svc);

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(!sql_log(db).contains("UPDATE"));
    }

    #[tokio::test]
    async fn test_delete_participation_by_admin() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_participant("a", "t1", &[])]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let deleted = service(&db, None)
            .delete_participation("p1", "a", &Token::from(ADMIN))
            .await
            .unwrap();
        assert_eq!(deleted.id, "a");
    }

    #[tokio::test]
    async fn test_delete_participation_by_stranger() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_participant("a", "t1", &[])]])
                .into_connection(),
        );

        let result = service(&db, None)
            .delete_participation("p1", "a", &Token::from("t2"))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_participants_anonymous_poll() {
        let mut poll = test_poll();
        poll.anonymous = true;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .append_query_results([[
                    test_participant("a", "t1", &["e1"]),
                    test_participant("b", "t2", &["e1"]),
                ]])
                .into_connection(),
        );

        let views = service(&db, None)
            .get_participants("p1", Some(&Token::from("t2")))
            .await
            .unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].participant.id, "b");
        assert!(views[0].own);
    }

    #[tokio::test]
    async fn test_get_participants_own_last() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[
                    test_participant("a", "t1", &["e1"]),
                    test_participant("b", "t2", &["e1"]),
                ]])
                .into_connection(),
        );

        let views = service(&db, None)
            .get_participants("p1", Some(&Token::from("t1")))
            .await
            .unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].participant.id, "b");
        assert!(!views[0].own);
        assert_eq!(views[1].participant.id, "a");
        assert!(views[1].own);
    }

    #[tokio::test]
    async fn test_book_events_rejects_foreign_event() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_event("e1", 9)]])
                .into_connection(),
        );

        let result = service(&db, None)
            .book_events("p1", vec!["e1".to_string(), "nope".to_string()], &Token::from(ADMIN))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_book_events_rejects_duplicate_ids() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_event("e1", 9), test_event("e2", 10)]])
                .into_connection(),
        );

        let svc = service(&db, None);
        let result = svc
            .book_events(
                "p1",
                vec!["e1".to_string(), "e2".to_string(), "e1".to_string()],
                &Token::from(ADMIN),
            )
            .await;
        drop(svc);

        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("e1")));
        assert!(!sql_log(db).contains("UPDATE"));
    }

    #[tokio::test]
    async fn test_book_events_mails_participants_with_address() {
        let mut booked = test_poll();
        booked.booked_events = json!(["e2"]);
        let mut silent = test_participant("b", "t2", &[]);
        silent.mail = None;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll()]])
                .append_query_results([[test_event("e1", 9), test_event("e2", 10)]])
                .append_query_results([[booked]])
                .append_query_results([[test_participant("a", "t1", &["e2"]), silent]])
                .into_connection(),
        );

        let jobs = JobService::new();
        let sender = jobs.sender();
        let mut receiver = jobs.into_receiver();

        let poll = service(&db, Some(sender))
            .book_events("p1", vec!["e2".to_string()], &Token::from(ADMIN))
            .await
            .unwrap();
        assert_eq!(poll.booked_event_ids(), vec!["e2"]);

        let Job::Mail(message) = receiver.try_recv().unwrap() else {
            panic!("expected booking mail");
        };
        assert_eq!(message.to, "alice@example.com");
        assert_eq!(message.subject, "Poll booked");
        assert!(message
            .text_body
            .contains("Mon, 10 Mar 2025 10:00 UTC - Mon, 10 Mar 2025 11:00 UTC *"));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_normalize_selection() {
        let ids: HashSet<&str> = ["e1", "e2", "e3"].into_iter().collect();
        let (yes, maybe) = normalize_selection(
            &["e1".to_string(), "e1".to_string()],
            &["e2".to_string()],
            &ids,
            true,
        )
        .unwrap();
        assert_eq!(yes, vec!["e1".to_string()]);
        assert_eq!(maybe, vec!["e2".to_string()]);

        assert!(normalize_selection(&[], &["e2".to_string()], &ids, false).is_err());
        assert!(normalize_selection(&["e1".to_string()], &["e1".to_string()], &ids, true).is_err());
        assert!(normalize_selection(&["zz".to_string()], &[], &ids, true).is_err());
    }
}
