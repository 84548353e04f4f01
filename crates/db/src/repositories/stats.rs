//! User competition stats and reward grant repository.

use std::sync::Arc;

use arena_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
};

use super::{Inserted, is_unique_violation};
use crate::entities::{RewardGrant, UserCompetitionStats, reward_grant, user_competition_stats};

/// Result of a settled competition from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

/// How a settlement moves a user's win streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Extend,
    Reset,
}

/// Storage for per-user stats and the reward grant ledger.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// A user's stats row, if they have one.
    async fn find_by_user(&self, user_id: &str)
    -> AppResult<Option<user_competition_stats::Model>>;

    /// Record a grant and add its points to the user's total.
    ///
    /// Returns `Duplicate` without touching points if the same
    /// `(user, competition, reason)` was already granted.
    async fn record_grant(
        &self,
        grant: reward_grant::Model,
    ) -> AppResult<Inserted<reward_grant::Model>>;

    /// Extend or reset the user's win streak and return the updated row.
    async fn apply_streak(
        &self,
        user_id: &str,
        change: StreakChange,
        now: DateTime<Utc>,
    ) -> AppResult<user_competition_stats::Model>;

    /// Count a win, loss or draw.
    async fn record_outcome(
        &self,
        user_id: &str,
        outcome: MatchOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Count a cast vote.
    async fn increment_votes_cast(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<()>;
}

/// Stats repository for database operations.
#[derive(Clone)]
pub struct StatsRepository {
    db: Arc<DatabaseConnection>,
}

impl StatsRepository {
    /// Create a new stats repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a zeroed stats row unless one exists.
    async fn ensure_row<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        now: DateTimeWithTimeZone,
    ) -> Result<(), DbErr> {
        let row = user_competition_stats::ActiveModel {
            user_id: Set(user_id.to_string()),
            points: Set(0),
            wins: Set(0),
            losses: Set(0),
            draws: Set(0),
            current_streak: Set(0),
            best_streak: Set(0),
            votes_cast: Set(0),
            updated_at: Set(now),
        };

        UserCompetitionStats::insert(row)
            .on_conflict(
                OnConflict::column(user_competition_stats::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn bump(
        &self,
        user_id: &str,
        column: user_competition_stats::Column,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let now: DateTimeWithTimeZone = now.into();
        Self::ensure_row(self.db.as_ref(), user_id, now)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        UserCompetitionStats::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .col_expr(user_competition_stats::Column::UpdatedAt, Expr::value(now))
            .filter(user_competition_stats::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl StatsStore for StatsRepository {
    async fn find_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Option<user_competition_stats::Model>> {
        UserCompetitionStats::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn record_grant(
        &self,
        grant: reward_grant::Model,
    ) -> AppResult<Inserted<reward_grant::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let inserted = reward_grant::ActiveModel {
            id: Set(grant.id),
            user_id: Set(grant.user_id),
            competition_id: Set(grant.competition_id),
            reason: Set(grant.reason),
            points: Set(grant.points),
            created_at: Set(grant.created_at),
        }
        .insert(&txn)
        .await;

        let model = match inserted {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => return Ok(Inserted::Duplicate),
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        Self::ensure_row(&txn, &model.user_id, model.created_at)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        UserCompetitionStats::update_many()
            .col_expr(
                user_competition_stats::Column::Points,
                Expr::col(user_competition_stats::Column::Points).add(model.points),
            )
            .col_expr(
                user_competition_stats::Column::UpdatedAt,
                Expr::value(model.created_at),
            )
            .filter(user_competition_stats::Column::UserId.eq(model.user_id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Inserted::Created(model))
    }

    async fn apply_streak(
        &self,
        user_id: &str,
        change: StreakChange,
        now: DateTime<Utc>,
    ) -> AppResult<user_competition_stats::Model> {
        let now: DateTimeWithTimeZone = now.into();
        Self::ensure_row(self.db.as_ref(), user_id, now)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut query = UserCompetitionStats::update_many()
            .col_expr(user_competition_stats::Column::UpdatedAt, Expr::value(now));
        query = match change {
            StreakChange::Extend => query
                .col_expr(
                    user_competition_stats::Column::CurrentStreak,
                    Expr::col(user_competition_stats::Column::CurrentStreak).add(1),
                )
                .col_expr(
                    user_competition_stats::Column::BestStreak,
                    Expr::cust("GREATEST(best_streak, current_streak + 1)"),
                ),
            StreakChange::Reset => query.col_expr(
                user_competition_stats::Column::CurrentStreak,
                Expr::value(0),
            ),
        };

        // RETURNING reads the row this statement wrote; a separate read could
        // observe a concurrent settlement's increment instead.
        query
            .filter(user_competition_stats::Column::UserId.eq(user_id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Stats not found: {user_id}")))
    }

    async fn record_outcome(
        &self,
        user_id: &str,
        outcome: MatchOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let column = match outcome {
            MatchOutcome::Win => user_competition_stats::Column::Wins,
            MatchOutcome::Loss => user_competition_stats::Column::Losses,
            MatchOutcome::Draw => user_competition_stats::Column::Draws,
        };
        self.bump(user_id, column, now).await
    }

    async fn increment_votes_cast(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.bump(user_id, user_competition_stats::Column::VotesCast, now)
            .await
    }
}
