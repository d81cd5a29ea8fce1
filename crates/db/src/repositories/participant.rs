//! Participant repository.

use std::sync::Arc;

use apollusia_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{encode_ids, participant, Participant};

/// Repository for participant operations.
#[derive(Clone)]
pub struct ParticipantRepository {
    db: Arc<DatabaseConnection>,
}

impl ParticipantRepository {
    /// Create a new participant repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a participant by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<participant::Model>> {
        Participant::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a participant of a poll, returning an error if not found.
    pub async fn get_in_poll(&self, poll_id: &str, id: &str) -> AppResult<participant::Model> {
        self.find_by_id(id)
            .await?
            .filter(|p| p.poll_id == poll_id)
            .ok_or_else(|| AppError::ParticipantNotFound(id.to_string()))
    }

    /// Participants of a poll in submission order.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<participant::Model>> {
        Participant::find()
            .filter(participant::Column::PollId.eq(poll_id))
            .order_by(participant::Column::CreatedAt, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count participants of a poll.
    pub async fn count_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        Participant::find()
            .filter(participant::Column::PollId.eq(poll_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct poll ids in which a token holds a participant record.
    pub async fn find_poll_ids_by_token(&self, token: &str) -> AppResult<Vec<String>> {
        Participant::find()
            .select_only()
            .column(participant::Column::PollId)
            .filter(participant::Column::Token.eq(token))
            .distinct()
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new participant.
    pub async fn create(&self, model: participant::ActiveModel) -> AppResult<participant::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a participant.
    pub async fn update(&self, model: participant::ActiveModel) -> AppResult<participant::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite both answer sets of a participant.
    pub async fn set_selection(
        &self,
        participant: participant::Model,
        yes: &[String],
        maybe: &[String],
    ) -> AppResult<participant::Model> {
        let mut active = participant.into_active_model();
        active.participation = Set(encode_ids(yes));
        active.indeterminate_participation = Set(encode_ids(maybe));
        active.updated_at = Set(Utc::now().into());
        self.update(active).await
    }

    /// Set the mail address on every record held by a token.
    pub async fn set_mail_by_token(&self, token: &str, mail: Option<String>) -> AppResult<u64> {
        let result = Participant::update_many()
            .col_expr(participant::Column::Mail, Expr::value(mail))
            .col_expr(participant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(participant::Column::Token.eq(token))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete a participant. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Participant::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Delete all participants of a poll.
    pub async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = Participant::delete_many()
            .filter(participant::Column::PollId.eq(poll_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
