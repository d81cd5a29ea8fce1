//! Participant entity: one person's answers to a poll.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub poll_id: String,

    pub name: String,

    #[sea_orm(nullable)]
    pub mail: Option<String>,

    /// Client token of the person who submitted this record
    pub token: String,

    /// Event ids answered with yes (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub participation: Json,

    /// Event ids answered with maybe (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub indeterminate_participation: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Poll,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Event ids answered with yes.
    #[must_use]
    pub fn yes_ids(&self) -> Vec<String> {
        super::decode_ids(&self.participation)
    }

    /// Event ids answered with maybe.
    #[must_use]
    pub fn maybe_ids(&self) -> Vec<String> {
        super::decode_ids(&self.indeterminate_participation)
    }
}
