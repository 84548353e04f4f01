//! Competition creation, the matchmaking queue and direct challenges.

use arena_common::{AppError, AppResult};
use arena_db::entities::competition::{self, CompetitionKind, CompetitionStatus, Slot};
use arena_db::entities::competition_invitation::InvitationStatus;
use arena_db::entities::prompt;
use arena_db::repositories::{Inserted, MatchQuery, StatusUpdate};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{
    Acquisition, Actor, CompetitionEngine, competition_payload, hours_from, require_status,
};
use crate::services::notifier::NotificationKind;

/// Candidates fetched per tier on each matchmaking pass.
const CANDIDATES_PER_TIER: u64 = 5;

/// Input for creating a competition.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompetitionInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50))]
    pub content_type: String,
    #[validate(length(min = 1))]
    pub prompt_id: String,
    pub kind: CompetitionKind,
    pub submission_hours: Option<i32>,
    pub voting_hours: Option<i32>,
    pub challenged_user_id: Option<String>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
    pub skill_tier: Option<i32>,
    pub max_winners: Option<i32>,
}

impl CompetitionEngine {
    /// Load a prompt that can back a new competition of `content_type`.
    pub(super) async fn usable_prompt(
        &self,
        prompt_id: &str,
        content_type: &str,
    ) -> AppResult<prompt::Model> {
        let prompt = self
            .stores
            .prompts
            .find_by_id(prompt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {prompt_id}")))?;

        if !prompt.is_active {
            return Err(AppError::Validation(format!(
                "Prompt {prompt_id} is no longer active"
            )));
        }
        if prompt.content_type != content_type {
            return Err(AppError::Validation(format!(
                "Prompt {prompt_id} is for {}, not {content_type}",
                prompt.content_type
            )));
        }
        Ok(prompt)
    }

    fn new_competition(
        &self,
        acquisition: &Acquisition,
        creator_id: &str,
        title: String,
        prompt: &prompt::Model,
        submission_hours: i32,
        voting_hours: i32,
        now: DateTime<Utc>,
    ) -> competition::Model {
        competition::Model {
            id: self.id_gen.generate(),
            kind: acquisition.kind(),
            title,
            content_type: prompt.content_type.clone(),
            prompt_id: prompt.id.clone(),
            status: acquisition.initial_status(),
            creator_id: creator_id.to_string(),
            participant1_id: acquisition
                .creator_participates()
                .then(|| creator_id.to_string()),
            participant2_id: None,
            winner_id: None,
            participant1_votes: 0,
            participant2_votes: 0,
            total_votes: 0,
            skill_tier: acquisition.skill_tier(),
            submission_hours,
            voting_hours,
            max_winners: acquisition.max_winners(),
            submission_deadline: None,
            voting_deadline: None,
            started_at: None,
            completed_at: None,
            created_at: now.into(),
            updated_at: None,
        }
    }

    /// Create a competition of any kind.
    ///
    /// Queue matches and challenges start PENDING with the creator in the
    /// first slot; curated kinds are admin-only and start as DRAFT.
    pub async fn create_competition(
        &self,
        actor: &Actor,
        input: CreateCompetitionInput,
    ) -> AppResult<competition::Model> {
        Self::validate(&input)?;

        let acquisition = Acquisition::for_kind(
            input.kind,
            &actor.user_id,
            input.challenged_user_id.as_deref(),
            input.message.as_deref(),
            input.skill_tier,
            input.max_winners,
        )?;
        if acquisition.requires_admin() {
            actor.require_admin()?;
        }

        let prompt = self.usable_prompt(&input.prompt_id, &input.content_type).await?;
        let submission_hours = self.window(
            input.submission_hours,
            self.config.default_submission_hours,
            "submission_hours",
        )?;
        let voting_hours = self.window(
            input.voting_hours,
            self.config.default_voting_hours,
            "voting_hours",
        )?;

        let now = Utc::now();
        let model = self.new_competition(
            &acquisition,
            &actor.user_id,
            input.title,
            &prompt,
            submission_hours,
            voting_hours,
            now,
        );
        let competition = self.stores.competitions.insert(model).await?;
        tracing::info!(
            competition_id = %competition.id,
            kind = ?competition.kind,
            creator_id = %actor.user_id,
            "Created competition"
        );

        if let Acquisition::DirectChallenge {
            challenged_user_id,
            message,
        } = acquisition
            && let Err(e) = self
                .send_challenge(&competition, &challenged_user_id, message, now)
                .await
        {
            // a challenge without its invitation could never start
            let update = StatusUpdate::new(
                [CompetitionStatus::Pending],
                CompetitionStatus::Cancelled,
                Utc::now(),
            );
            if let Err(cancel_err) = self.advance(&competition.id, update).await {
                tracing::warn!(error = %cancel_err, competition_id = %competition.id, "Failed to cancel orphaned challenge");
            }
            return Err(e);
        }

        Ok(competition)
    }

    async fn send_challenge(
        &self,
        competition: &competition::Model,
        challenged_user_id: &str,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let invitation = self.new_invitation(
            &competition.id,
            challenged_user_id,
            &competition.creator_id,
            Slot::Second,
            message,
            now,
        );
        let invitation = match self.stores.invitations.insert(invitation).await? {
            Inserted::Created(invitation) => invitation,
            Inserted::Duplicate => {
                return Err(AppError::AlreadyExists(format!(
                    "Competition {} already has a challenge outstanding",
                    competition.id
                )));
            }
        };

        let mut payload = competition_payload(competition);
        payload["challengerId"] = json!(competition.creator_id);
        payload["invitationId"] = json!(invitation.id);
        payload["message"] = json!(invitation.message);
        self.notify(challenged_user_id, NotificationKind::ChallengeReceived, payload)
            .await;
        Ok(())
    }

    /// Join the matchmaking queue.
    ///
    /// Claims the oldest waiting match at the caller's tier, then one tier
    /// above, then one below. Losing a claim to a concurrent joiner is normal
    /// and just moves on to the next candidate. With nothing left to claim a
    /// new PENDING competition is created for the next joiner to find.
    pub async fn join_queue(
        &self,
        user_id: &str,
        content_type: &str,
        prompt_id: &str,
        skill_tier: i32,
    ) -> AppResult<competition::Model> {
        let prompt = self.usable_prompt(prompt_id, content_type).await?;

        if let Some(waiting) = self
            .stores
            .competitions
            .find_waiting_by_creator(user_id, content_type, prompt_id)
            .await?
        {
            tracing::debug!(competition_id = %waiting.id, user_id = %user_id, "Already waiting in queue");
            return Ok(waiting);
        }

        let tiers = [skill_tier, skill_tier + 1, skill_tier - 1];
        for attempt in 1..=self.config.max_claim_attempts {
            let mut contested = false;

            for tier in tiers {
                let query = MatchQuery {
                    content_type,
                    prompt_id,
                    skill_tier: tier,
                    exclude_user_id: user_id,
                    limit: CANDIDATES_PER_TIER,
                };
                for candidate in self.stores.competitions.find_match_candidates(&query).await? {
                    let now = Utc::now();
                    let deadline = hours_from(now, candidate.submission_hours);
                    if self
                        .stores
                        .competitions
                        .claim_opponent(&candidate.id, user_id, now, deadline)
                        .await?
                    {
                        let competition = self.load(&candidate.id).await?;
                        tracing::info!(
                            competition_id = %competition.id,
                            user_id = %user_id,
                            tier,
                            "Matched opponent from queue"
                        );
                        let participants = self.participants(&competition).await?;
                        self.notify_all(
                            &participants,
                            NotificationKind::CompetitionStarted,
                            &competition_payload(&competition),
                        )
                        .await;
                        return Ok(competition);
                    }

                    contested = true;
                    tracing::debug!(
                        competition_id = %candidate.id,
                        user_id = %user_id,
                        attempt,
                        "Lost queue claim to another joiner"
                    );
                }
            }

            if !contested {
                break;
            }
        }

        let now = Utc::now();
        let acquisition = Acquisition::QueueMatch { skill_tier };
        let model = self.new_competition(
            &acquisition,
            user_id,
            prompt.title.clone(),
            &prompt,
            self.config.default_submission_hours,
            self.config.default_voting_hours,
            now,
        );
        let competition = self.stores.competitions.insert(model).await?;
        tracing::info!(competition_id = %competition.id, user_id = %user_id, skill_tier, "Waiting in queue");
        Ok(competition)
    }

    /// Accept or decline a direct challenge.
    ///
    /// Accepting takes the second slot and starts the submission window at
    /// once; declining cancels the competition.
    pub async fn respond_to_challenge(
        &self,
        user_id: &str,
        competition_id: &str,
        accept: bool,
    ) -> AppResult<competition::Model> {
        let competition = self.load(competition_id).await?;
        if competition.kind != CompetitionKind::DirectChallenge {
            return Err(AppError::InvalidState(format!(
                "Competition {competition_id} is not a direct challenge"
            )));
        }

        let invitation = self
            .stores
            .invitations
            .list_by_competition(competition_id)
            .await?
            .into_iter()
            .find(|i| i.invitee_id == user_id)
            .ok_or_else(|| AppError::Forbidden("You were not challenged".to_string()))?;

        require_status(&competition, &[CompetitionStatus::Pending], "respond to a challenge")?;
        if invitation.status != InvitationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Challenge was already {:?}",
                invitation.status
            )));
        }

        let now = Utc::now();
        if invitation.expires_at <= now {
            return Err(AppError::DeadlinePassed(
                "The challenge has expired".to_string(),
            ));
        }

        let to = if accept {
            InvitationStatus::Accepted
        } else {
            InvitationStatus::Declined
        };
        if !self
            .stores
            .invitations
            .update_status(&invitation.id, InvitationStatus::Pending, to, now)
            .await?
        {
            return Err(AppError::InvalidState(
                "Challenge was answered concurrently".to_string(),
            ));
        }

        let payload = competition_payload(&competition);
        if accept {
            let deadline = hours_from(now, competition.submission_hours);
            if !self
                .stores
                .competitions
                .claim_opponent(competition_id, user_id, now, deadline)
                .await?
            {
                // the competition moved on under us; the challenge is dead
                self.stores
                    .invitations
                    .update_status(&invitation.id, InvitationStatus::Accepted, InvitationStatus::Expired, now)
                    .await?;
                return Err(AppError::InvalidState(format!(
                    "Competition {competition_id} is no longer pending"
                )));
            }
            tracing::info!(competition_id = %competition_id, user_id = %user_id, "Challenge accepted");

            let competition = self.load(competition_id).await?;
            self.notify(
                &competition.creator_id,
                NotificationKind::ChallengeAccepted,
                payload.clone(),
            )
            .await;
            let participants = self.participants(&competition).await?;
            self.notify_all(&participants, NotificationKind::CompetitionStarted, &payload)
                .await;
            Ok(competition)
        } else {
            let update = StatusUpdate::new(
                [CompetitionStatus::Pending],
                CompetitionStatus::Cancelled,
                now,
            );
            self.advance(competition_id, update).await?;
            tracing::info!(competition_id = %competition_id, user_id = %user_id, "Challenge declined");

            self.notify(
                &competition.creator_id,
                NotificationKind::ChallengeDeclined,
                payload,
            )
            .await;
            self.load(competition_id).await
        }
    }

    /// Withdraw a competition before it finishes.
    ///
    /// Creators may cancel their own queue match or challenge while it is
    /// still PENDING; admins may cancel any curated competition that has not
    /// ended.
    pub async fn cancel_competition(
        &self,
        actor: &Actor,
        competition_id: &str,
    ) -> AppResult<competition::Model> {
        let competition = self.load(competition_id).await?;
        if competition.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Competition {competition_id} has already ended"
            )));
        }

        if competition.kind.is_curated() {
            actor.require_admin()?;
        } else {
            if competition.creator_id != actor.user_id && !actor.is_admin {
                return Err(AppError::Forbidden(
                    "Only the creator can cancel this competition".to_string(),
                ));
            }
            require_status(&competition, &[CompetitionStatus::Pending], "cancel")?;
        }

        let now = Utc::now();
        let update = StatusUpdate::new([competition.status], CompetitionStatus::Cancelled, now);
        if !self.advance(competition_id, update).await? {
            return Err(AppError::InvalidState(format!(
                "Competition {competition_id} changed status concurrently"
            )));
        }

        // Outstanding invitations die with the competition.
        for invitation in self
            .stores
            .invitations
            .list_by_competition(competition_id)
            .await?
            .into_iter()
            .filter(|i| i.status == InvitationStatus::Pending)
        {
            if let Err(e) = self
                .stores
                .invitations
                .update_status(
                    &invitation.id,
                    InvitationStatus::Pending,
                    InvitationStatus::Expired,
                    now,
                )
                .await
            {
                tracing::warn!(error = %e, invitation_id = %invitation.id, "Failed to expire invitation");
            }
        }

        let participants: Vec<String> = self
            .participants(&competition)
            .await?
            .into_iter()
            .filter(|id| *id != actor.user_id)
            .collect();
        self.notify_all(
            &participants,
            NotificationKind::CompetitionCancelled,
            &competition_payload(&competition),
        )
        .await;

        self.load(competition_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::competition::testing::{Harness, PROMPT, PROMPT_TYPE};

    fn challenge_input(challenged: &str) -> CreateCompetitionInput {
        CreateCompetitionInput {
            title: "Haiku duel".to_string(),
            content_type: PROMPT_TYPE.to_string(),
            prompt_id: PROMPT.to_string(),
            kind: CompetitionKind::DirectChallenge,
            submission_hours: None,
            voting_hours: None,
            challenged_user_id: Some(challenged.to_string()),
            message: Some("Best of one?".to_string()),
            skill_tier: None,
            max_winners: None,
        }
    }

    #[tokio::test]
    async fn test_join_queue_pairs_two_users() {
        let h = Harness::new().await;

        let waiting = h.engine.join_queue("alice", PROMPT_TYPE, PROMPT, 2).await.unwrap();
        assert_eq!(waiting.status, CompetitionStatus::Pending);
        assert_eq!(waiting.participant1_id.as_deref(), Some("alice"));

        let matched = h.engine.join_queue("bob", PROMPT_TYPE, PROMPT, 2).await.unwrap();
        assert_eq!(matched.id, waiting.id);
        assert_eq!(matched.status, CompetitionStatus::Active);
        assert_eq!(matched.participant2_id.as_deref(), Some("bob"));
        assert!(matched.submission_deadline.is_some());

        assert_eq!(h.sent_to("alice").await, vec![NotificationKind::CompetitionStarted]);
    }

    #[tokio::test]
    async fn test_join_queue_widens_to_adjacent_tier() {
        let h = Harness::new().await;

        let waiting = h.engine.join_queue("alice", PROMPT_TYPE, PROMPT, 3).await.unwrap();
        let matched = h.engine.join_queue("bob", PROMPT_TYPE, PROMPT, 2).await.unwrap();
        assert_eq!(matched.id, waiting.id);

        // two tiers apart is too far
        h.engine.join_queue("carol", PROMPT_TYPE, PROMPT, 5).await.unwrap();
        let separate = h.engine.join_queue("dave", PROMPT_TYPE, PROMPT, 3).await.unwrap();
        assert_eq!(separate.status, CompetitionStatus::Pending);
        assert_eq!(separate.creator_id, "dave");
    }

    #[tokio::test]
    async fn test_join_queue_is_idempotent_for_waiting_user() {
        let h = Harness::new().await;

        let first = h.engine.join_queue("alice", PROMPT_TYPE, PROMPT, 1).await.unwrap();
        let again = h.engine.join_queue("alice", PROMPT_TYPE, PROMPT, 1).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.status, CompetitionStatus::Pending);
    }

    #[tokio::test]
    async fn test_join_queue_rejects_mismatched_prompt() {
        let h = Harness::new().await;

        let wrong_type = h.engine.join_queue("alice", "photography", PROMPT, 1).await;
        assert!(matches!(wrong_type, Err(AppError::Validation(_))));

        let missing = h.engine.join_queue("alice", PROMPT_TYPE, "nope", 1).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_curated_creation_is_admin_only() {
        let h = Harness::new().await;
        let mut input = challenge_input("bob");
        input.kind = CompetitionKind::Curated1v1;
        input.challenged_user_id = None;

        let denied = h
            .engine
            .create_competition(&Actor::user("alice"), input.clone())
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let created = h
            .engine
            .create_competition(&Actor::admin("admin"), input)
            .await
            .unwrap();
        assert_eq!(created.status, CompetitionStatus::Draft);
        assert!(created.participant1_id.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_window_over_limit() {
        let h = Harness::new().await;
        let mut input = challenge_input("bob");
        input.voting_hours = Some(h.engine.config().max_hours + 1);

        let result = h.engine.create_competition(&Actor::user("alice"), input).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_accepted_challenge_starts_immediately() {
        let h = Harness::new().await;
        let competition = h
            .engine
            .create_competition(&Actor::user("alice"), challenge_input("bob"))
            .await
            .unwrap();
        assert_eq!(competition.status, CompetitionStatus::Pending);
        assert_eq!(h.sent_to("bob").await, vec![NotificationKind::ChallengeReceived]);

        let stranger = h.engine.respond_to_challenge("carol", &competition.id, true).await;
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));

        let started = h
            .engine
            .respond_to_challenge("bob", &competition.id, true)
            .await
            .unwrap();
        assert_eq!(started.status, CompetitionStatus::Active);
        assert_eq!(started.participant2_id.as_deref(), Some("bob"));
        assert!(
            h.sent_to("alice")
                .await
                .contains(&NotificationKind::ChallengeAccepted)
        );

        let twice = h.engine.respond_to_challenge("bob", &competition.id, true).await;
        assert!(matches!(twice, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_failed_claim_does_not_leave_challenge_accepted() {
        let h = Harness::new().await;
        let competition = h
            .engine
            .create_competition(&Actor::user("alice"), challenge_input("bob"))
            .await
            .unwrap();
        // a concurrent writer took the slot while the row still reads PENDING
        h.store
            .update_competition(&competition.id, |c| {
                c.participant2_id = Some("mallory".to_string());
            })
            .await;

        let result = h.engine.respond_to_challenge("bob", &competition.id, true).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));

        let invitation = h
            .engine
            .stores
            .invitations
            .list_by_competition(&competition.id)
            .await
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(invitation.status, InvitationStatus::Expired);
        assert!(!h.sent_to("alice").await.contains(&NotificationKind::ChallengeAccepted));
    }

    #[tokio::test]
    async fn test_declined_challenge_cancels() {
        let h = Harness::new().await;
        let competition = h
            .engine
            .create_competition(&Actor::user("alice"), challenge_input("bob"))
            .await
            .unwrap();

        let cancelled = h
            .engine
            .respond_to_challenge("bob", &competition.id, false)
            .await
            .unwrap();
        assert_eq!(cancelled.status, CompetitionStatus::Cancelled);
        assert_eq!(
            h.sent_to("alice").await,
            vec![NotificationKind::ChallengeDeclined]
        );
    }

    #[tokio::test]
    async fn test_creator_can_leave_queue() {
        let h = Harness::new().await;
        let waiting = h.engine.join_queue("alice", PROMPT_TYPE, PROMPT, 1).await.unwrap();

        let other = h.engine.cancel_competition(&Actor::user("bob"), &waiting.id).await;
        assert!(matches!(other, Err(AppError::Forbidden(_))));

        let cancelled = h
            .engine
            .cancel_competition(&Actor::user("alice"), &waiting.id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, CompetitionStatus::Cancelled);

        let again = h.engine.cancel_competition(&Actor::user("alice"), &waiting.id).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_cancelling_challenge_expires_invitation() {
        let h = Harness::new().await;
        let competition = h
            .engine
            .create_competition(&Actor::user("alice"), challenge_input("bob"))
            .await
            .unwrap();

        h.engine
            .cancel_competition(&Actor::user("alice"), &competition.id)
            .await
            .unwrap();

        let invitations = h
            .engine
            .list_invitations(&Actor::user("alice"), &competition.id)
            .await
            .unwrap();
        assert_eq!(invitations.len(), 1);
        assert_eq!(invitations[0].status, InvitationStatus::Expired);
    }
}
