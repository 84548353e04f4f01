//! Entries and blind-mode submission.

use arena_common::{AppError, AppResult};
use arena_db::entities::competition::{self, CompetitionStatus};
use arena_db::entities::competition_entry;
use arena_db::repositories::{EntryContent, Inserted, StatusUpdate};
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{CompetitionEngine, competition_payload, deadline_passed, hours_from, require_status};
use crate::services::notifier::NotificationKind;

/// Content of a draft entry.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(url)]
    pub media_url: Option<String>,
}

impl From<EntryInput> for EntryContent {
    fn from(input: EntryInput) -> Self {
        Self {
            title: input.title,
            description: input.description,
            media_url: input.media_url,
        }
    }
}

/// An entry as one requester is allowed to see it.
///
/// Content of other participants' entries is nulled out while submissions
/// are open, and vote counts stay hidden until the result is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub id: String,
    pub competition_id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub vote_count: Option<i32>,
    pub submitted_at: Option<DateTimeWithTimeZone>,
    pub is_submitted: bool,
    pub is_redacted: bool,
}

impl EntryView {
    fn full(entry: competition_entry::Model, status: CompetitionStatus) -> Self {
        Self {
            is_submitted: entry.is_submitted(),
            vote_count: status.reveals_tallies().then_some(entry.vote_count),
            id: entry.id,
            competition_id: entry.competition_id,
            user_id: entry.user_id,
            title: Some(entry.title),
            description: entry.description,
            media_url: entry.media_url,
            submitted_at: entry.submitted_at,
            is_redacted: false,
        }
    }

    fn redacted(entry: competition_entry::Model) -> Self {
        Self {
            is_submitted: entry.is_submitted(),
            id: entry.id,
            competition_id: entry.competition_id,
            user_id: entry.user_id,
            title: None,
            description: None,
            media_url: None,
            vote_count: None,
            submitted_at: entry.submitted_at,
            is_redacted: true,
        }
    }

    /// Apply the visibility rules for `requester` in a competition at `status`.
    fn for_requester(
        entry: competition_entry::Model,
        status: CompetitionStatus,
        requester: Option<&str>,
    ) -> Option<Self> {
        if requester == Some(entry.user_id.as_str()) {
            Some(Self::full(entry, status))
        } else if status.reveals_entries() {
            // drafts never left their owner
            entry.is_submitted().then(|| Self::full(entry, status))
        } else {
            Some(Self::redacted(entry))
        }
    }
}

impl CompetitionEngine {
    async fn submission_target(
        &self,
        competition_id: &str,
        user_id: &str,
        action: &str,
        now: DateTime<Utc>,
    ) -> AppResult<competition::Model> {
        let competition = self.load(competition_id).await?;
        if !self.is_participant(&competition, user_id).await? {
            return Err(AppError::Forbidden(format!(
                "Not a participant of competition {competition_id}"
            )));
        }
        if !competition.status.accepts_submissions() {
            return Err(AppError::InvalidState(format!(
                "Cannot {action} while competition is {:?}",
                competition.status
            )));
        }
        if deadline_passed(competition.submission_deadline.as_ref(), now) {
            return Err(AppError::DeadlinePassed(
                "The submission deadline has passed".to_string(),
            ));
        }
        Ok(competition)
    }

    /// Create or overwrite the caller's draft entry.
    pub async fn upsert_entry(
        &self,
        competition_id: &str,
        user_id: &str,
        input: EntryInput,
    ) -> AppResult<competition_entry::Model> {
        Self::validate(&input)?;
        let now = Utc::now();
        self.submission_target(competition_id, user_id, "edit entries", now)
            .await?;
        let content = EntryContent::from(input);

        let existing = match self
            .stores
            .entries
            .find_by_participant(competition_id, user_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let model = competition_entry::Model {
                    id: self.id_gen.generate(),
                    competition_id: competition_id.to_string(),
                    user_id: user_id.to_string(),
                    title: content.title.clone(),
                    description: content.description.clone(),
                    media_url: content.media_url.clone(),
                    vote_count: 0,
                    submitted_at: None,
                    created_at: now.into(),
                    updated_at: None,
                };
                match self.stores.entries.insert(model).await? {
                    Inserted::Created(entry) => {
                        tracing::debug!(entry_id = %entry.id, competition_id = %competition_id, user_id = %user_id, "Created entry");
                        return Ok(entry);
                    }
                    // a concurrent upsert created it first; overwrite that one
                    Inserted::Duplicate => self
                        .stores
                        .entries
                        .find_by_participant(competition_id, user_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal("Entry vanished after duplicate insert".to_string())
                        })?,
                }
            }
        };

        if existing.is_submitted() {
            return Err(AppError::AlreadySubmitted(existing.id));
        }
        self.stores
            .entries
            .update_draft(&existing.id, &content, now)
            .await?
            .ok_or(AppError::AlreadySubmitted(existing.id))
    }

    /// Lock the caller's entry for judging.
    ///
    /// The second finalized entry of a 1-on-1 moves it straight to VOTING.
    pub async fn finalize_entry(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> AppResult<competition_entry::Model> {
        let now = Utc::now();
        let competition = self
            .submission_target(competition_id, user_id, "finalize entries", now)
            .await?;

        let entry = self
            .stores
            .entries
            .find_by_participant(competition_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No entry to finalize".to_string()))?;
        if entry.is_submitted() {
            return Err(AppError::AlreadySubmitted(entry.id));
        }
        if !entry.has_content() {
            return Err(AppError::Validation(
                "An entry needs a description or media before it can be submitted".to_string(),
            ));
        }

        let finalized = self
            .stores
            .entries
            .finalize(&entry.id, competition_id, now)
            .await?
            .ok_or(AppError::AlreadySubmitted(entry.id))?;
        tracing::info!(
            entry_id = %finalized.entry.id,
            competition_id = %competition_id,
            submitted = finalized.submitted_count,
            "Finalized entry"
        );

        if competition.kind.is_one_on_one() && finalized.submitted_count >= 2 {
            self.start_voting(&competition, now).await?;
        }

        Ok(finalized.entry)
    }

    /// Move a competition from its submission phase into VOTING.
    ///
    /// Returns `false` if a concurrent caller already did.
    pub(super) async fn start_voting(
        &self,
        competition: &competition::Model,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let update = StatusUpdate::new([competition.status], CompetitionStatus::Voting, now)
            .with_voting_deadline(hours_from(now, competition.voting_hours));
        if !self.advance(&competition.id, update).await? {
            return Ok(false);
        }

        let participants = self.participants(competition).await?;
        self.notify_all(
            &participants,
            NotificationKind::VotingStarted,
            &competition_payload(competition),
        )
        .await;
        Ok(true)
    }

    /// Entries of a competition as `requester` may see them.
    pub async fn list_entries(
        &self,
        competition_id: &str,
        requester: Option<&str>,
    ) -> AppResult<Vec<EntryView>> {
        let competition = self.load(competition_id).await?;
        require_status(
            &competition,
            &[
                CompetitionStatus::Active,
                CompetitionStatus::Open,
                CompetitionStatus::Voting,
                CompetitionStatus::Completed,
                CompetitionStatus::Draw,
                CompetitionStatus::Cancelled,
            ],
            "list entries",
        )?;

        let entries = self
            .stores
            .entries
            .list_by_competition(competition_id)
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(|e| EntryView::for_requester(e, competition.status, requester))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::competition::testing::{Harness, PROMPT, PROMPT_TYPE, entry_input};

    #[tokio::test]
    async fn test_upsert_replaces_draft() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;

        let first = h
            .engine
            .upsert_entry(&competition.id, "alice", entry_input("alice"))
            .await
            .unwrap();
        let mut input = entry_input("alice");
        input.title = "Second draft".to_string();
        let second = h
            .engine
            .upsert_entry(&competition.id, "alice", input)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "Second draft");
    }

    #[tokio::test]
    async fn test_outsiders_cannot_submit() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;

        let result = h
            .engine
            .upsert_entry(&competition.id, "mallory", entry_input("mallory"))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_finalize_twice_fails() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;
        h.submit(&competition.id, "alice").await;

        let again = h.engine.finalize_entry(&competition.id, "alice").await;
        assert!(matches!(again, Err(AppError::AlreadySubmitted(_))));

        let edit = h
            .engine
            .upsert_entry(&competition.id, "alice", entry_input("alice"))
            .await;
        assert!(matches!(edit, Err(AppError::AlreadySubmitted(_))));
    }

    #[tokio::test]
    async fn test_finalize_needs_content() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;
        let input = EntryInput {
            title: "Untitled".to_string(),
            description: Some("   ".to_string()),
            media_url: None,
        };
        h.engine
            .upsert_entry(&competition.id, "alice", input)
            .await
            .unwrap();

        let result = h.engine.finalize_entry(&competition.id, "alice").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_finalize_after_deadline() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;
        h.engine
            .upsert_entry(&competition.id, "alice", entry_input("alice"))
            .await
            .unwrap();
        h.expire_deadlines(&competition.id).await;

        let result = h.engine.finalize_entry(&competition.id, "alice").await;
        assert!(matches!(result, Err(AppError::DeadlinePassed(_))));
    }

    #[tokio::test]
    async fn test_second_finalize_starts_voting() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;

        h.submit(&competition.id, "alice").await;
        let still_active = h.store.competition(&competition.id).await.unwrap();
        assert_eq!(still_active.status, CompetitionStatus::Active);

        h.submit(&competition.id, "bob").await;
        let voting = h.store.competition(&competition.id).await.unwrap();
        assert_eq!(voting.status, CompetitionStatus::Voting);
        assert!(voting.voting_deadline.is_some());
        assert!(
            h.sent_to("bob")
                .await
                .contains(&NotificationKind::VotingStarted)
        );
    }

    #[tokio::test]
    async fn test_blind_mode_hides_opponent_until_voting() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;
        h.submit(&competition.id, "alice").await;
        h.engine
            .upsert_entry(&competition.id, "bob", entry_input("bob"))
            .await
            .unwrap();

        let seen_by_bob = h
            .engine
            .list_entries(&competition.id, Some("bob"))
            .await
            .unwrap();
        let alices = seen_by_bob.iter().find(|e| e.user_id == "alice").unwrap();
        assert!(alices.is_redacted);
        assert!(alices.title.is_none());
        assert!(alices.description.is_none());
        assert!(alices.vote_count.is_none());
        let bobs = seen_by_bob.iter().find(|e| e.user_id == "bob").unwrap();
        assert!(!bobs.is_redacted);

        h.engine.finalize_entry(&competition.id, "bob").await.unwrap();
        let revealed = h
            .engine
            .list_entries(&competition.id, Some("bob"))
            .await
            .unwrap();
        assert!(revealed.iter().all(|e| !e.is_redacted && e.title.is_some()));
        // per-entry counts stay hidden while voting
        assert!(revealed.iter().all(|e| e.vote_count.is_none()));
    }

    #[tokio::test]
    async fn test_cancelled_match_keeps_entries_blind() {
        let h = Harness::new().await;
        let competition = h.active_match("alice", "bob").await;
        h.submit(&competition.id, "alice").await;
        h.expire_deadlines(&competition.id).await;
        h.engine
            .sweep_submission_deadlines(chrono::Utc::now())
            .await
            .unwrap();
        let cancelled = h.store.competition(&competition.id).await.unwrap();
        assert_eq!(cancelled.status, CompetitionStatus::Cancelled);

        let seen_by_bob = h
            .engine
            .list_entries(&competition.id, Some("bob"))
            .await
            .unwrap();
        assert_eq!(seen_by_bob.len(), 1);
        assert!(seen_by_bob[0].is_redacted);
        assert!(seen_by_bob[0].description.is_none());

        let seen_by_alice = h
            .engine
            .list_entries(&competition.id, Some("alice"))
            .await
            .unwrap();
        assert!(!seen_by_alice[0].is_redacted);
    }

    #[tokio::test]
    async fn test_pending_competition_has_no_entries() {
        let h = Harness::new().await;
        let waiting = h
            .engine
            .join_queue("alice", PROMPT_TYPE, PROMPT, 1)
            .await
            .unwrap();

        let result = h.engine.list_entries(&waiting.id, Some("alice")).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }
}
