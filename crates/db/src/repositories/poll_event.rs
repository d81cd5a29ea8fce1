//! Poll event repository.

use std::sync::Arc;

use apollusia_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};

use crate::entities::{poll_event, PollEvent};

/// Repository for poll event operations.
#[derive(Clone)]
pub struct PollEventRepository {
    db: Arc<DatabaseConnection>,
}

impl PollEventRepository {
    /// Create a new poll event repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Events of a poll ordered by start.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_event::Model>> {
        PollEvent::find()
            .filter(poll_event::Column::PollId.eq(poll_id))
            .order_by(poll_event::Column::Start, Order::Asc)
            .order_by(poll_event::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count events of a poll.
    pub async fn count_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        PollEvent::find()
            .filter(poll_event::Column::PollId.eq(poll_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new event.
    pub async fn create(&self, model: poll_event::ActiveModel) -> AppResult<poll_event::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an event.
    pub async fn update(&self, model: poll_event::ActiveModel) -> AppResult<poll_event::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete the given events of a poll. Returns the number of deleted rows.
    pub async fn delete_by_ids(&self, poll_id: &str, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = PollEvent::delete_many()
            .filter(poll_event::Column::PollId.eq(poll_id))
            .filter(poll_event::Column::Id.is_in(ids.iter().cloned()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete all events of a poll.
    pub async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = PollEvent::delete_many()
            .filter(poll_event::Column::PollId.eq(poll_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
