//! Competition vote repository.

use std::sync::Arc;

use arena_common::{AppError, AppResult};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};

use super::is_unique_violation;
use crate::entities::competition::{CompetitionStatus, Slot};
use crate::entities::{Competition, CompetitionEntry, CompetitionVote, competition, competition_entry, competition_vote};

/// Result of casting a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    /// The vote was recorded and every tally it touches was incremented.
    Cast(competition_vote::Model),
    /// The voter already has a vote in this competition.
    AlreadyVoted,
    /// The competition is no longer in voting.
    Closed,
}

/// Storage for votes.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Record a vote and bump the competition and entry tallies in one
    /// transaction. `slot` names the side credited in a 1-on-1; open
    /// competitions pass `None` and only the total moves.
    async fn cast(
        &self,
        vote: competition_vote::Model,
        slot: Option<Slot>,
    ) -> AppResult<CastOutcome>;

    /// The voter's vote in a competition, if any.
    async fn find_by_voter(
        &self,
        competition_id: &str,
        voter_id: &str,
    ) -> AppResult<Option<competition_vote::Model>>;
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VoteStore for VoteRepository {
    async fn cast(
        &self,
        vote: competition_vote::Model,
        slot: Option<Slot>,
    ) -> AppResult<CastOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Locks the competition row, so settlement's total_votes guard and
        // this increment are serialized.
        let mut tally = Competition::update_many()
            .col_expr(
                competition::Column::TotalVotes,
                Expr::col(competition::Column::TotalVotes).add(1),
            )
            .filter(competition::Column::Id.eq(vote.competition_id.as_str()))
            .filter(competition::Column::Status.eq(CompetitionStatus::Voting.to_value()));
        tally = match slot {
            Some(Slot::First) => tally.col_expr(
                competition::Column::Participant1Votes,
                Expr::col(competition::Column::Participant1Votes).add(1),
            ),
            Some(Slot::Second) => tally.col_expr(
                competition::Column::Participant2Votes,
                Expr::col(competition::Column::Participant2Votes).add(1),
            ),
            None => tally,
        };

        let result = tally
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(CastOutcome::Closed);
        }

        let entry_id = vote.entry_id.clone();
        let inserted = competition_vote::ActiveModel {
            id: Set(vote.id),
            competition_id: Set(vote.competition_id),
            voter_id: Set(vote.voter_id),
            entry_id: Set(vote.entry_id),
            created_at: Set(vote.created_at),
        }
        .insert(&txn)
        .await;

        let model = match inserted {
            Ok(model) => model,
            // The failed statement aborted the transaction; dropping it rolls back.
            Err(e) if is_unique_violation(&e) => return Ok(CastOutcome::AlreadyVoted),
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        CompetitionEntry::update_many()
            .col_expr(
                competition_entry::Column::VoteCount,
                Expr::col(competition_entry::Column::VoteCount).add(1),
            )
            .filter(competition_entry::Column::Id.eq(entry_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(CastOutcome::Cast(model))
    }

    async fn find_by_voter(
        &self,
        competition_id: &str,
        voter_id: &str,
    ) -> AppResult<Option<competition_vote::Model>> {
        CompetitionVote::find()
            .filter(competition_vote::Column::CompetitionId.eq(competition_id))
            .filter(competition_vote::Column::VoterId.eq(voter_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
