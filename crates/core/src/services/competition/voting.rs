//! Vote casting.

use arena_common::{AppError, AppResult};
use arena_db::entities::competition::CompetitionStatus;
use arena_db::entities::competition_vote;
use arena_db::repositories::CastOutcome;
use chrono::Utc;

use super::{CompetitionEngine, deadline_passed, require_status};

impl CompetitionEngine {
    /// Cast the voter's single, final vote.
    ///
    /// The vote row and every tally it touches are written together; a
    /// second vote from the same voter loses on the unique index and comes
    /// back as `AlreadyVoted`.
    pub async fn cast_vote(
        &self,
        competition_id: &str,
        voter_id: &str,
        entry_id: &str,
    ) -> AppResult<competition_vote::Model> {
        let competition = self.load(competition_id).await?;
        require_status(&competition, &[CompetitionStatus::Voting], "vote")?;

        let now = Utc::now();
        if deadline_passed(competition.voting_deadline.as_ref(), now) {
            return Err(AppError::DeadlinePassed(
                "The voting deadline has passed".to_string(),
            ));
        }
        if self.is_participant(&competition, voter_id).await? {
            return Err(AppError::Forbidden(
                "Participants cannot vote in their own competition".to_string(),
            ));
        }

        let entry = self
            .stores
            .entries
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry not found: {entry_id}")))?;
        if entry.competition_id != competition_id {
            return Err(AppError::Validation(format!(
                "Entry {entry_id} does not belong to competition {competition_id}"
            )));
        }
        if !entry.is_submitted() {
            return Err(AppError::InvalidState(format!(
                "Entry {entry_id} was never submitted"
            )));
        }

        let slot = if competition.kind.is_one_on_one() {
            Some(competition.slot_of(&entry.user_id).ok_or_else(|| {
                AppError::Internal(format!(
                    "Entry {entry_id} belongs to neither side of {competition_id}"
                ))
            })?)
        } else {
            None
        };

        let vote = competition_vote::Model {
            id: self.id_gen.generate(),
            competition_id: competition_id.to_string(),
            voter_id: voter_id.to_string(),
            entry_id: entry_id.to_string(),
            created_at: now.into(),
        };
        let vote = match self.stores.votes.cast(vote, slot).await? {
            CastOutcome::Cast(vote) => vote,
            CastOutcome::AlreadyVoted => {
                return Err(AppError::AlreadyVoted(competition_id.to_string()));
            }
            CastOutcome::Closed => {
                return Err(AppError::InvalidState(
                    "Voting closed before the vote was recorded".to_string(),
                ));
            }
        };
        tracing::info!(competition_id = %competition_id, voter_id = %voter_id, entry_id = %entry_id, "Vote cast");

        if let Err(e) = self
            .ledger
            .record_vote(competition_id, voter_id, self.rewards.vote)
            .await
        {
            tracing::warn!(error = %e, competition_id = %competition_id, voter_id = %voter_id, "Failed to reward voter");
        }

        Ok(vote)
    }

    /// Whether the user has voted in a competition.
    pub async fn has_voted(&self, competition_id: &str, voter_id: &str) -> AppResult<bool> {
        Ok(self
            .stores
            .votes
            .find_by_voter(competition_id, voter_id)
            .await?
            .is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::competition::testing::Harness;

    #[tokio::test]
    async fn test_vote_moves_every_tally() {
        let h = Harness::new().await;
        let (competition, alices, bobs) = h.voting_match("alice", "bob").await;

        h.vote_many(&competition.id, &alices.id, "fan", 3).await;
        h.vote_many(&competition.id, &bobs.id, "critic", 2).await;

        let competition = h.store.competition(&competition.id).await.unwrap();
        assert_eq!(competition.participant1_votes, 3);
        assert_eq!(competition.participant2_votes, 2);
        assert_eq!(competition.total_votes, 5);
        assert_eq!(h.store.votes(&competition.id).await.len(), 5);
        assert!(h.engine.has_voted(&competition.id, "fan-0").await.unwrap());
        assert!(!h.engine.has_voted(&competition.id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_vote_rejected() {
        let h = Harness::new().await;
        let (competition, alices, bobs) = h.voting_match("alice", "bob").await;

        h.engine
            .cast_vote(&competition.id, "carol", &alices.id)
            .await
            .unwrap();
        let again = h.engine.cast_vote(&competition.id, "carol", &bobs.id).await;
        assert!(matches!(again, Err(AppError::AlreadyVoted(_))));

        let competition = h.store.competition(&competition.id).await.unwrap();
        assert_eq!(competition.total_votes, 1);
    }

    #[tokio::test]
    async fn test_participants_cannot_vote() {
        let h = Harness::new().await;
        let (competition, _, bobs) = h.voting_match("alice", "bob").await;

        let result = h.engine.cast_vote(&competition.id, "alice", &bobs.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_vote_before_voting_opens() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;
        let alices = h.submit(&competition.id, "alice").await;

        let result = h.engine.cast_vote(&competition.id, "carol", &alices.id).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_vote_after_deadline() {
        let h = Harness::new().await;
        let (competition, alices, _) = h.voting_match("alice", "bob").await;
        h.expire_deadlines(&competition.id).await;

        let result = h.engine.cast_vote(&competition.id, "carol", &alices.id).await;
        assert!(matches!(result, Err(AppError::DeadlinePassed(_))));
    }

    #[tokio::test]
    async fn test_vote_for_foreign_entry() {
        let h = Harness::new().await;
        let (first, _, _) = h.voting_match("alice", "bob").await;
        let (_, daves, _) = h.voting_match("dave", "erin").await;

        let result = h.engine.cast_vote(&first.id, "carol", &daves.id).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_voter_is_rewarded_once() {
        let h = Harness::new().await;
        let (competition, alices, _) = h.voting_match("alice", "bob").await;

        h.engine
            .cast_vote(&competition.id, "carol", &alices.id)
            .await
            .unwrap();

        let stats = h.engine.get_user_stats("carol").await.unwrap();
        assert_eq!(stats.votes_cast, 1);
        assert_eq!(stats.points, 1);
    }
}
