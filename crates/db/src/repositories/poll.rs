//! Poll repository.

use std::sync::Arc;

use apollusia_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    Order, QueryFilter, QueryOrder, Set,
};

use crate::entities::{encode_ids, poll, Poll};

/// Deadline state filter for poll listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveFilter {
    /// No deadline, or the deadline lies in the future.
    Active,
    /// A deadline is set and has passed.
    Inactive,
}

impl ActiveFilter {
    /// Map the optional `active` query flag.
    #[must_use]
    pub const fn from_flag(active: Option<bool>) -> Option<Self> {
        match active {
            Some(true) => Some(Self::Active),
            Some(false) => Some(Self::Inactive),
            None => None,
        }
    }

    fn condition(self) -> Condition {
        let now = Utc::now();
        match self {
            Self::Active => Condition::any()
                .add(poll::Column::Deadline.is_null())
                .add(poll::Column::Deadline.gt(now)),
            Self::Inactive => Condition::all()
                .add(poll::Column::Deadline.is_not_null())
                .add(poll::Column::Deadline.lte(now)),
        }
    }
}

/// Repository for poll operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(id.to_string()))
    }

    /// Polls administered by a token, newest first.
    pub async fn find_by_admin_token(
        &self,
        token: &str,
        filter: Option<ActiveFilter>,
    ) -> AppResult<Vec<poll::Model>> {
        let mut query = Poll::find().filter(poll::Column::AdminToken.eq(token));

        if let Some(filter) = filter {
            query = query.filter(filter.condition());
        }

        query
            .order_by(poll::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Polls with the given IDs, newest first.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<poll::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Poll::find()
            .filter(poll::Column::Id.is_in(ids.iter().cloned()))
            .order_by(poll::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new poll.
    pub async fn create(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the booked event list.
    pub async fn set_booked_events(
        &self,
        poll: poll::Model,
        event_ids: &[String],
    ) -> AppResult<poll::Model> {
        let mut active = poll.into_active_model();
        active.booked_events = Set(encode_ids(event_ids));
        active.updated_at = Set(Utc::now().into());
        self.update(active).await
    }

    /// Delete a poll. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Poll::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}
