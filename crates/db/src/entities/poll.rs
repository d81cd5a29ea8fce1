//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub location: Option<String>,

    /// IANA time zone name, e.g. `Europe/Berlin`
    #[sea_orm(nullable)]
    pub time_zone: Option<String>,

    /// Write credential of the poll creator. Never leaves the service layer.
    #[serde(skip_serializing)]
    pub admin_token: String,

    #[sea_orm(nullable)]
    pub admin_mail: Option<String>,

    /// Web Push subscription of the admin (`{endpoint, keys: {p256dh, auth}}`)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub admin_push: Option<Json>,

    /// Participation closes at this instant (null for never)
    #[sea_orm(nullable)]
    pub deadline: Option<DateTimeWithTimeZone>,

    pub allow_maybe: bool,

    pub allow_edit: bool,

    /// Participants only see their own answers
    pub anonymous: bool,

    /// Booked poll event ids in booking order (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub booked_events: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_event::Entity")]
    PollEvent,
    #[sea_orm(has_many = "super::participant::Entity")]
    Participant,
}

impl Related<super::poll_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollEvent.def()
    }
}

impl Related<super::participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Booked event ids.
    #[must_use]
    pub fn booked_event_ids(&self) -> Vec<String> {
        super::decode_ids(&self.booked_events)
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_closed(&self, now: DateTimeWithTimeZone) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}
