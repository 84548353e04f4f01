//! Settlement: deciding a competition once and paying out its rewards.
//!
//! The outcome is computed by pure planning functions. The engine writes the
//! resulting status behind a `WHERE status = 'voting' AND total_votes = ?`
//! guard, and only the caller whose write lands applies the plan's effects.

use std::cmp::Ordering;

use arena_common::{AppError, AppResult, CompetitionConfig, RewardConfig};
use arena_db::entities::competition::{self, CompetitionStatus};
use arena_db::entities::competition_entry;
use arena_db::repositories::{MatchOutcome, StatusUpdate, StreakChange};
use chrono::Utc;
use serde_json::json;

use super::{Actor, CompetitionEngine, competition_payload, require_status};
use crate::services::ledger::{self, RewardEffect, RewardReason};
use crate::services::notifier::NotificationKind;

/// What settling a competition would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub status: CompetitionStatus,
    pub winner_id: Option<String>,
    pub effects: Vec<RewardEffect>,
    pub notices: Vec<(String, NotificationKind)>,
}

impl SettlementPlan {
    fn cancelled(user_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            status: CompetitionStatus::Cancelled,
            winner_id: None,
            effects: Vec::new(),
            notices: user_ids
                .into_iter()
                .map(|user_id| (user_id, NotificationKind::CompetitionCancelled))
                .collect(),
        }
    }
}

/// Result of [`CompetitionEngine::settle`].
#[derive(Debug, Clone)]
pub struct Settlement {
    pub competition: competition::Model,
    pub status: CompetitionStatus,
    pub winner_id: Option<String>,
    /// Effects applied by this call. Empty when it was already settled.
    pub effects: Vec<RewardEffect>,
    pub already_settled: bool,
}

/// Decide a 1-on-1.
///
/// A margin of at most `draw_threshold_percent` of all votes is a draw. The
/// winner's bonus scales with the margin: a unanimous result earns the whole
/// `max_margin_bonus`.
pub fn plan_head_to_head(
    competition: &competition::Model,
    config: &CompetitionConfig,
    rewards: &RewardConfig,
) -> AppResult<SettlementPlan> {
    let (Some(first), Some(second)) = (
        competition.participant1_id.as_deref(),
        competition.participant2_id.as_deref(),
    ) else {
        return Err(AppError::Internal(format!(
            "Competition {} reached voting without two participants",
            competition.id
        )));
    };

    let first_votes = i64::from(competition.participant1_votes);
    let second_votes = i64::from(competition.participant2_votes);
    let total = first_votes + second_votes;
    if total == 0 {
        return Ok(SettlementPlan::cancelled([
            first.to_string(),
            second.to_string(),
        ]));
    }

    let diff = (first_votes - second_votes).abs();
    if diff * 100 <= i64::from(config.draw_threshold_percent) * total {
        let mut effects = Vec::with_capacity(4);
        let mut notices = Vec::with_capacity(2);
        for user_id in [first, second] {
            effects.push(RewardEffect::grant(user_id, RewardReason::Draw, rewards.draw));
            effects.push(RewardEffect::outcome(user_id, MatchOutcome::Draw));
            notices.push((user_id.to_string(), NotificationKind::CompetitionDraw));
        }
        return Ok(SettlementPlan {
            status: CompetitionStatus::Draw,
            winner_id: None,
            effects,
            notices,
        });
    }

    let (winner, loser) = if first_votes > second_votes {
        (first, second)
    } else {
        (second, first)
    };
    let bonus = diff * rewards.max_margin_bonus / total;

    Ok(SettlementPlan {
        status: CompetitionStatus::Completed,
        winner_id: Some(winner.to_string()),
        effects: vec![
            RewardEffect::grant(winner, RewardReason::Win, rewards.win_base + bonus),
            RewardEffect::outcome(winner, MatchOutcome::Win),
            RewardEffect::streak(winner, StreakChange::Extend),
            RewardEffect::grant(loser, RewardReason::Loss, rewards.loss),
            RewardEffect::outcome(loser, MatchOutcome::Loss),
            RewardEffect::streak(loser, StreakChange::Reset),
        ],
        notices: vec![
            (winner.to_string(), NotificationKind::CompetitionWon),
            (loser.to_string(), NotificationKind::CompetitionLost),
        ],
    })
}

/// Order open entries for placement: most votes first, then the earlier
/// submission, then entry id.
fn placement_order(a: &competition_entry::Model, b: &competition_entry::Model) -> Ordering {
    b.vote_count
        .cmp(&a.vote_count)
        .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Rank an open competition.
///
/// The top `max_winners` finalized entries are paid from the placement
/// table; every other entrant gets the participation reward. Only first place
/// counts as a win.
#[must_use]
pub fn plan_open(
    competition: &competition::Model,
    entries: &[competition_entry::Model],
    rewards: &RewardConfig,
) -> SettlementPlan {
    let mut ranked: Vec<_> = entries.iter().filter(|e| e.is_submitted()).collect();
    let total: i64 = ranked.iter().map(|e| i64::from(e.vote_count)).sum();
    if total == 0 {
        return SettlementPlan::cancelled(ranked.iter().map(|e| e.user_id.clone()));
    }
    ranked.sort_by(|a, b| placement_order(a, b));

    let max_winners = usize::try_from(competition.max_winners).unwrap_or(1).max(1);
    let mut effects = Vec::with_capacity(ranked.len() + 2);
    let mut notices = Vec::with_capacity(ranked.len());

    for (index, entry) in ranked.iter().enumerate() {
        let place = index + 1;
        if place <= max_winners {
            let points = rewards
                .placements
                .get(index)
                .copied()
                .unwrap_or(rewards.placement_participation);
            effects.push(RewardEffect::grant(
                &entry.user_id,
                RewardReason::Placement(place),
                points,
            ));
            notices.push((entry.user_id.clone(), NotificationKind::PlacementAwarded));
        } else {
            effects.push(RewardEffect::grant(
                &entry.user_id,
                RewardReason::Participation,
                rewards.participation,
            ));
            notices.push((entry.user_id.clone(), NotificationKind::CompetitionLost));
        }
    }

    let winner_id = ranked.first().map(|e| e.user_id.clone());
    if let Some(winner) = &winner_id {
        effects.push(RewardEffect::outcome(winner, MatchOutcome::Win));
        effects.push(RewardEffect::streak(winner, StreakChange::Extend));
    }

    SettlementPlan {
        status: CompetitionStatus::Completed,
        winner_id,
        effects,
        notices,
    }
}

impl CompetitionEngine {
    async fn plan(&self, competition: &competition::Model) -> AppResult<SettlementPlan> {
        if competition.kind.is_one_on_one() {
            plan_head_to_head(competition, &self.config, &self.rewards)
        } else {
            let entries = self
                .stores
                .entries
                .list_by_competition(&competition.id)
                .await?;
            Ok(plan_open(competition, &entries, &self.rewards))
        }
    }

    /// Settle a competition in VOTING.
    ///
    /// Safe to call any number of times: once the competition has ended, the
    /// stored result comes back with `already_settled` set and nothing is
    /// paid again. A vote landing mid-settlement makes the guarded write miss,
    /// and the tally is re-read.
    pub async fn settle(&self, competition_id: &str) -> AppResult<Settlement> {
        for attempt in 1..=self.config.max_claim_attempts {
            let competition = self.load(competition_id).await?;
            if competition.status.is_terminal() {
                tracing::debug!(competition_id = %competition_id, status = ?competition.status, "Already settled");
                return Ok(Settlement {
                    status: competition.status,
                    winner_id: competition.winner_id.clone(),
                    effects: Vec::new(),
                    already_settled: true,
                    competition,
                });
            }
            require_status(&competition, &[CompetitionStatus::Voting], "settle")?;

            let plan = self.plan(&competition).await?;
            let update = StatusUpdate::new([CompetitionStatus::Voting], plan.status, Utc::now())
                .with_winner(plan.winner_id.clone())
                .expecting_total_votes(competition.total_votes);
            if !self.advance(competition_id, update).await? {
                tracing::debug!(competition_id = %competition_id, attempt, "Settlement guard missed, re-reading tally");
                continue;
            }

            tracing::info!(
                competition_id = %competition_id,
                status = ?plan.status,
                winner_id = ?plan.winner_id,
                total_votes = competition.total_votes,
                "Settled competition"
            );

            let failures =
                ledger::apply_effects(self.ledger.as_ref(), &self.rewards, competition_id, &plan.effects)
                    .await;
            if failures > 0 {
                tracing::warn!(competition_id = %competition_id, failures, "Settlement rewards need reconciliation");
            }

            let mut payload = competition_payload(&competition);
            payload["status"] = json!(plan.status);
            payload["winnerId"] = json!(plan.winner_id);
            for (user_id, kind) in &plan.notices {
                self.notify(user_id, *kind, payload.clone()).await;
            }

            return Ok(Settlement {
                competition: self.load(competition_id).await?,
                status: plan.status,
                winner_id: plan.winner_id,
                effects: plan.effects,
                already_settled: false,
            });
        }

        Err(AppError::Conflict(format!(
            "Competition {competition_id} kept changing while being settled"
        )))
    }

    /// Settle a competition ahead of its voting deadline.
    pub async fn complete_competition(
        &self,
        actor: &Actor,
        competition_id: &str,
    ) -> AppResult<Settlement> {
        actor.require_admin()?;
        self.settle(competition_id).await
    }
}
