//! Competition invitation repository.

use std::sync::Arc;

use arena_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, prelude::DateTimeWithTimeZone,
};

use super::{Inserted, is_unique_violation};
use crate::entities::competition::Slot;
use crate::entities::competition_invitation::{self, InvitationStatus};
use crate::entities::CompetitionInvitation;

/// Storage for invitations and direct challenges.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    /// Find an invitation by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition_invitation::Model>>;

    /// Get an invitation by ID, returning error if not found.
    async fn get_by_id(&self, id: &str) -> AppResult<competition_invitation::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invitation not found: {id}")))
    }

    /// Create an invitation. A slot holds at most one pending or accepted
    /// invitation at a time.
    async fn insert(
        &self,
        model: competition_invitation::Model,
    ) -> AppResult<Inserted<competition_invitation::Model>>;

    /// The pending or accepted invitation holding a slot, if any.
    async fn find_live_for_slot(
        &self,
        competition_id: &str,
        slot: Slot,
    ) -> AppResult<Option<competition_invitation::Model>>;

    /// The invitee's pending invitation in a competition, if any.
    async fn find_pending_for_invitee(
        &self,
        competition_id: &str,
        invitee_id: &str,
    ) -> AppResult<Option<competition_invitation::Model>>;

    /// All invitations of a competition, oldest first.
    async fn list_by_competition(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_invitation::Model>>;

    /// A user's unexpired pending invitations, newest first.
    async fn list_pending_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<competition_invitation::Model>>;

    /// Move an invitation from `from` to `to`. Returns `false` when the
    /// stored status no longer matches `from`.
    async fn update_status(
        &self,
        id: &str,
        from: InvitationStatus,
        to: InvitationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Pending invitations whose expiry has passed.
    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition_invitation::Model>>;
}

/// Invitation repository for database operations.
#[derive(Clone)]
pub struct InvitationRepository {
    db: Arc<DatabaseConnection>,
}

impl InvitationRepository {
    /// Create a new invitation repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InvitationStore for InvitationRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition_invitation::Model>> {
        CompetitionInvitation::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert(
        &self,
        model: competition_invitation::Model,
    ) -> AppResult<Inserted<competition_invitation::Model>> {
        let result = competition_invitation::ActiveModel {
            id: Set(model.id),
            competition_id: Set(model.competition_id),
            invitee_id: Set(model.invitee_id),
            inviter_id: Set(model.inviter_id),
            slot: Set(model.slot),
            status: Set(model.status),
            message: Set(model.message),
            expires_at: Set(model.expires_at),
            responded_at: Set(model.responded_at),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(self.db.as_ref())
        .await;

        match result {
            Ok(model) => Ok(Inserted::Created(model)),
            Err(e) if is_unique_violation(&e) => Ok(Inserted::Duplicate),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn find_live_for_slot(
        &self,
        competition_id: &str,
        slot: Slot,
    ) -> AppResult<Option<competition_invitation::Model>> {
        CompetitionInvitation::find()
            .filter(competition_invitation::Column::CompetitionId.eq(competition_id))
            .filter(competition_invitation::Column::Slot.eq(slot))
            .filter(competition_invitation::Column::Status.is_in([
                InvitationStatus::Pending.to_value(),
                InvitationStatus::Accepted.to_value(),
            ]))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_pending_for_invitee(
        &self,
        competition_id: &str,
        invitee_id: &str,
    ) -> AppResult<Option<competition_invitation::Model>> {
        CompetitionInvitation::find()
            .filter(competition_invitation::Column::CompetitionId.eq(competition_id))
            .filter(competition_invitation::Column::InviteeId.eq(invitee_id))
            .filter(competition_invitation::Column::Status.eq(InvitationStatus::Pending))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_by_competition(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        CompetitionInvitation::find()
            .filter(competition_invitation::Column::CompetitionId.eq(competition_id))
            .order_by_asc(competition_invitation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_pending_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        let now: DateTimeWithTimeZone = now.into();
        CompetitionInvitation::find()
            .filter(competition_invitation::Column::InviteeId.eq(user_id))
            .filter(competition_invitation::Column::Status.eq(InvitationStatus::Pending))
            .filter(competition_invitation::Column::ExpiresAt.gt(now))
            .order_by_desc(competition_invitation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_status(
        &self,
        id: &str,
        from: InvitationStatus,
        to: InvitationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let now: DateTimeWithTimeZone = now.into();
        let mut query = CompetitionInvitation::update_many()
            .col_expr(competition_invitation::Column::Status, Expr::value(to.to_value()))
            .col_expr(competition_invitation::Column::UpdatedAt, Expr::value(now));
        if matches!(to, InvitationStatus::Accepted | InvitationStatus::Declined) {
            query = query.col_expr(competition_invitation::Column::RespondedAt, Expr::value(now));
        }

        let result = query
            .filter(competition_invitation::Column::Id.eq(id))
            .filter(competition_invitation::Column::Status.eq(from.to_value()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        let now: DateTimeWithTimeZone = now.into();
        CompetitionInvitation::find()
            .filter(competition_invitation::Column::Status.eq(InvitationStatus::Pending))
            .filter(competition_invitation::Column::ExpiresAt.lte(now))
            .order_by_asc(competition_invitation::Column::ExpiresAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
