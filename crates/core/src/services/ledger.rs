//! Reward ledger.
//!
//! Settlement does not touch user stats directly. It returns a list of
//! [`RewardEffect`]s and the engine hands them to a [`RewardLedger`] after
//! the competition's status change has been written.

use std::fmt;
use std::sync::Arc;

use arena_common::{AppResult, IdGenerator, RewardConfig};
use arena_db::entities::reward_grant;
use arena_db::repositories::{Inserted, MatchOutcome, StatsStore, StreakChange};
use async_trait::async_trait;
use chrono::Utc;

/// Why points were granted. Doubles as the idempotency key of a grant
/// together with the user and the competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewardReason {
    Vote,
    Win,
    Loss,
    Draw,
    /// 1-based placement in an open competition.
    Placement(usize),
    Participation,
    /// Win streak milestone reached.
    Streak(i32),
}

impl fmt::Display for RewardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vote => f.write_str("vote"),
            Self::Win => f.write_str("win"),
            Self::Loss => f.write_str("loss"),
            Self::Draw => f.write_str("draw"),
            Self::Placement(place) => write!(f, "placement_{place}"),
            Self::Participation => f.write_str("participation"),
            Self::Streak(streak) => write!(f, "streak_{streak}"),
        }
    }
}

/// One change to a user's standing produced by settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardEffect {
    Grant {
        user_id: String,
        reason: RewardReason,
        points: i64,
    },
    Outcome {
        user_id: String,
        outcome: MatchOutcome,
    },
    Streak {
        user_id: String,
        change: StreakChange,
    },
}

impl RewardEffect {
    #[must_use]
    pub fn grant(user_id: &str, reason: RewardReason, points: i64) -> Self {
        Self::Grant {
            user_id: user_id.to_string(),
            reason,
            points,
        }
    }

    #[must_use]
    pub fn outcome(user_id: &str, outcome: MatchOutcome) -> Self {
        Self::Outcome {
            user_id: user_id.to_string(),
            outcome,
        }
    }

    #[must_use]
    pub fn streak(user_id: &str, change: StreakChange) -> Self {
        Self::Streak {
            user_id: user_id.to_string(),
            change,
        }
    }

    /// The user this effect applies to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Grant { user_id, .. }
            | Self::Outcome { user_id, .. }
            | Self::Streak { user_id, .. } => user_id,
        }
    }
}

/// Trait for applying rewards and stat changes.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// Grant points once per `(user, competition, reason)`.
    ///
    /// Returns `false` if the grant had already been issued.
    async fn grant(
        &self,
        competition_id: &str,
        user_id: &str,
        reason: RewardReason,
        points: i64,
    ) -> AppResult<bool>;

    /// Count a win, loss or draw.
    async fn record_outcome(&self, user_id: &str, outcome: MatchOutcome) -> AppResult<()>;

    /// Move the win streak and return the streak afterwards.
    async fn update_streak(&self, user_id: &str, change: StreakChange) -> AppResult<i32>;

    /// Reward a voter and count the vote.
    async fn record_vote(&self, competition_id: &str, voter_id: &str, points: i64)
    -> AppResult<()>;
}

/// Shared ledger handle.
pub type RewardLedgerService = Arc<dyn RewardLedger>;

/// Ledger backed by the stats tables.
#[derive(Clone)]
pub struct StatsLedger {
    stats: Arc<dyn StatsStore>,
    id_gen: IdGenerator,
}

impl StatsLedger {
    /// Create a new stats ledger.
    #[must_use]
    pub fn new(stats: Arc<dyn StatsStore>) -> Self {
        Self {
            stats,
            id_gen: IdGenerator::new(),
        }
    }
}

#[async_trait]
impl RewardLedger for StatsLedger {
    async fn grant(
        &self,
        competition_id: &str,
        user_id: &str,
        reason: RewardReason,
        points: i64,
    ) -> AppResult<bool> {
        let grant = reward_grant::Model {
            id: self.id_gen.generate(),
            user_id: user_id.to_string(),
            competition_id: competition_id.to_string(),
            reason: reason.to_string(),
            points,
            created_at: Utc::now().into(),
        };

        match self.stats.record_grant(grant).await? {
            Inserted::Created(_) => {
                tracing::debug!(user_id = %user_id, competition_id = %competition_id, reason = %reason, points, "Granted reward");
                Ok(true)
            }
            Inserted::Duplicate => {
                tracing::debug!(user_id = %user_id, competition_id = %competition_id, reason = %reason, "Reward already granted");
                Ok(false)
            }
        }
    }

    async fn record_outcome(&self, user_id: &str, outcome: MatchOutcome) -> AppResult<()> {
        self.stats.record_outcome(user_id, outcome, Utc::now()).await
    }

    async fn update_streak(&self, user_id: &str, change: StreakChange) -> AppResult<i32> {
        let stats = self.stats.apply_streak(user_id, change, Utc::now()).await?;
        Ok(stats.current_streak)
    }

    async fn record_vote(
        &self,
        competition_id: &str,
        voter_id: &str,
        points: i64,
    ) -> AppResult<()> {
        if self
            .grant(competition_id, voter_id, RewardReason::Vote, points)
            .await?
        {
            self.stats.increment_votes_cast(voter_id, Utc::now()).await?;
        }
        Ok(())
    }
}

/// A ledger that drops everything, for when rewards are handled elsewhere.
#[derive(Clone, Default)]
pub struct NoOpLedger;

#[async_trait]
impl RewardLedger for NoOpLedger {
    async fn grant(
        &self,
        _competition_id: &str,
        _user_id: &str,
        _reason: RewardReason,
        _points: i64,
    ) -> AppResult<bool> {
        Ok(true)
    }

    async fn record_outcome(&self, _user_id: &str, _outcome: MatchOutcome) -> AppResult<()> {
        Ok(())
    }

    async fn update_streak(&self, _user_id: &str, _change: StreakChange) -> AppResult<i32> {
        Ok(0)
    }

    async fn record_vote(
        &self,
        _competition_id: &str,
        _voter_id: &str,
        _points: i64,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Apply settlement effects in order, granting streak milestone bonuses as
/// streaks reach them.
///
/// Failures are logged and skipped; the competition has already been settled
/// and the remaining effects are still worth applying. Returns the number of
/// effects that failed.
pub async fn apply_effects(
    ledger: &dyn RewardLedger,
    rewards: &RewardConfig,
    competition_id: &str,
    effects: &[RewardEffect],
) -> usize {
    let mut failures = 0;

    for effect in effects {
        let result = match effect {
            RewardEffect::Grant {
                user_id,
                reason,
                points,
            } => ledger
                .grant(competition_id, user_id, *reason, *points)
                .await
                .map(|_| ()),
            RewardEffect::Outcome { user_id, outcome } => {
                ledger.record_outcome(user_id, *outcome).await
            }
            RewardEffect::Streak { user_id, change } => {
                match ledger.update_streak(user_id, *change).await {
                    Ok(streak) => match rewards.streak_bonus(streak) {
                        Some(bonus) => ledger
                            .grant(competition_id, user_id, RewardReason::Streak(streak), bonus)
                            .await
                            .map(|_| ()),
                        None => Ok(()),
                    },
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = result {
            failures += 1;
            tracing::warn!(
                error = %e,
                competition_id = %competition_id,
                user_id = %effect.user_id(),
                "Failed to apply settlement effect"
            );
        }
    }

    failures
}
