//! Read models.

use arena_common::{AppError, AppResult};
use arena_db::entities::competition::{self, CompetitionKind, CompetitionStatus, Slot};
use arena_db::entities::{prompt, user_competition_stats};
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

use super::CompetitionEngine;

/// Largest page any list operation returns.
const MAX_PAGE: u64 = 100;

/// Vote tallies, or an explicit marker that they are not public yet.
///
/// A hidden tally is not the same as 0-0: clients must not render one as
/// the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum VoteStats {
    Hidden,
    #[serde(rename_all = "camelCase")]
    Revealed {
        /// Per-side tallies; `None` for open competitions, whose per-entry
        /// counts come with the entries.
        participant1_votes: Option<i32>,
        participant2_votes: Option<i32>,
        total_votes: i32,
    },
}

impl VoteStats {
    #[must_use]
    pub fn for_competition(competition: &competition::Model) -> Self {
        if !competition.status.reveals_tallies() {
            return Self::Hidden;
        }
        let one_on_one = competition.kind.is_one_on_one();
        Self::Revealed {
            participant1_votes: one_on_one.then(|| competition.votes_for(Slot::First)),
            participant2_votes: one_on_one.then(|| competition.votes_for(Slot::Second)),
            total_votes: competition.total_votes,
        }
    }
}

/// A competition as returned to callers, with tallies masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionView {
    pub id: String,
    pub kind: CompetitionKind,
    pub title: String,
    pub content_type: String,
    pub prompt_id: String,
    pub status: CompetitionStatus,
    pub creator_id: String,
    pub participant1_id: Option<String>,
    pub participant2_id: Option<String>,
    pub winner_id: Option<String>,
    pub votes: VoteStats,
    pub skill_tier: i32,
    pub submission_hours: i32,
    pub voting_hours: i32,
    pub max_winners: i32,
    pub submission_deadline: Option<DateTimeWithTimeZone>,
    pub voting_deadline: Option<DateTimeWithTimeZone>,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    /// The viewer's side of a 1-on-1.
    pub viewer_slot: Option<Slot>,
    /// Whether the viewer has voted; `None` without a viewer.
    pub has_voted: Option<bool>,
}

impl CompetitionView {
    fn new(competition: competition::Model, viewer: Option<&str>, has_voted: Option<bool>) -> Self {
        Self {
            votes: VoteStats::for_competition(&competition),
            viewer_slot: viewer.and_then(|v| competition.slot_of(v)),
            has_voted,
            id: competition.id,
            kind: competition.kind,
            title: competition.title,
            content_type: competition.content_type,
            prompt_id: competition.prompt_id,
            status: competition.status,
            creator_id: competition.creator_id,
            participant1_id: competition.participant1_id,
            participant2_id: competition.participant2_id,
            winner_id: competition.winner_id,
            skill_tier: competition.skill_tier,
            submission_hours: competition.submission_hours,
            voting_hours: competition.voting_hours,
            max_winners: competition.max_winners,
            submission_deadline: competition.submission_deadline,
            voting_deadline: competition.voting_deadline,
            started_at: competition.started_at,
            completed_at: competition.completed_at,
            created_at: competition.created_at,
        }
    }
}

impl CompetitionEngine {
    /// Get a competition as `viewer` sees it.
    pub async fn get_competition(
        &self,
        competition_id: &str,
        viewer: Option<&str>,
    ) -> AppResult<CompetitionView> {
        let competition = self.load(competition_id).await?;
        let has_voted = match viewer {
            Some(viewer) => Some(self.has_voted(competition_id, viewer).await?),
            None => None,
        };
        Ok(CompetitionView::new(competition, viewer, has_voted))
    }

    /// Competitions the user takes part in, newest first.
    pub async fn list_competitions_for_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<CompetitionView>> {
        let competitions = self
            .stores
            .competitions
            .list_for_user(user_id, limit.min(MAX_PAGE), offset)
            .await?;
        Ok(competitions
            .into_iter()
            .map(|c| CompetitionView::new(c, Some(user_id), None))
            .collect())
    }

    /// Tallies of a competition, hidden until the result is final.
    pub async fn get_vote_stats(&self, competition_id: &str) -> AppResult<VoteStats> {
        let competition = self.load(competition_id).await?;
        Ok(VoteStats::for_competition(&competition))
    }

    pub async fn get_prompt(&self, prompt_id: &str) -> AppResult<prompt::Model> {
        self.stores
            .prompts
            .find_by_id(prompt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {prompt_id}")))
    }

    /// Active prompts, optionally for one content type.
    pub async fn list_prompts(
        &self,
        content_type: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<prompt::Model>> {
        self.stores
            .prompts
            .list_active(content_type, limit.min(MAX_PAGE))
            .await
    }

    /// A user's competition stats. Users who never played get zeroes.
    pub async fn get_user_stats(&self, user_id: &str) -> AppResult<user_competition_stats::Model> {
        Ok(self
            .stores
            .stats
            .find_by_user(user_id)
            .await?
            .unwrap_or_else(|| user_competition_stats::Model {
                user_id: user_id.to_string(),
                points: 0,
                wins: 0,
                losses: 0,
                draws: 0,
                current_streak: 0,
                best_streak: 0,
                votes_cast: 0,
                updated_at: Utc::now().into(),
            }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::competition::testing::{Harness, PROMPT, PROMPT_TYPE, RETIRED_PROMPT};

    #[tokio::test]
    async fn test_tallies_hidden_while_voting() {
        let h = Harness::new().await;
        let (competition, alices, _) = h.voting_match("alice", "bob").await;
        h.vote_many(&competition.id, &alices.id, "fan", 2).await;

        let stats = h.engine.get_vote_stats(&competition.id).await.unwrap();
        assert_eq!(stats, VoteStats::Hidden);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["visibility"], "hidden");

        h.engine.settle(&competition.id).await.unwrap();
        let stats = h.engine.get_vote_stats(&competition.id).await.unwrap();
        assert_eq!(
            stats,
            VoteStats::Revealed {
                participant1_votes: Some(2),
                participant2_votes: Some(0),
                total_votes: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_view_for_participant_and_voter() {
        let h = Harness::new().await;
        let (competition, alices, _) = h.voting_match("alice", "bob").await;
        h.engine
            .cast_vote(&competition.id, "carol", &alices.id)
            .await
            .unwrap();

        let bobs_view = h
            .engine
            .get_competition(&competition.id, Some("bob"))
            .await
            .unwrap();
        assert_eq!(bobs_view.viewer_slot, Some(Slot::Second));
        assert_eq!(bobs_view.has_voted, Some(false));
        assert_eq!(bobs_view.votes, VoteStats::Hidden);

        let carols_view = h
            .engine
            .get_competition(&competition.id, Some("carol"))
            .await
            .unwrap();
        assert_eq!(carols_view.viewer_slot, None);
        assert_eq!(carols_view.has_voted, Some(true));

        let anonymous = h.engine.get_competition(&competition.id, None).await.unwrap();
        assert_eq!(anonymous.has_voted, None);
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;

        let bobs = h.engine.list_competitions_for_user("bob", 10, 0).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, competition.id);
        assert!(h.engine.list_competitions_for_user("carol", 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_catalog() {
        let h = Harness::new().await;

        let prompt = h.engine.get_prompt(PROMPT).await.unwrap();
        assert_eq!(prompt.content_type, PROMPT_TYPE);

        let active = h.engine.list_prompts(Some(PROMPT_TYPE), 50).await.unwrap();
        assert!(active.iter().all(|p| p.id != RETIRED_PROMPT));
        assert_eq!(active.len(), 1);

        assert!(matches!(
            h.engine.get_prompt("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_for_newcomer() {
        let h = Harness::new().await;
        let stats = h.engine.get_user_stats("newcomer").await.unwrap();
        assert_eq!(stats.points, 0);
        assert_eq!(stats.best_streak, 0);
    }
}
