//! Curated competitions: slot invitations, activation and open enrollment.

use arena_common::{AppError, AppResult};
use arena_db::entities::competition::{self, CompetitionKind, CompetitionStatus, Slot};
use arena_db::entities::competition_invitation::{self, InvitationStatus};
use arena_db::entities::competition_participant;
use arena_db::repositories::{Inserted, StatusUpdate};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{Actor, CompetitionEngine, competition_payload, hours_from, require_status};
use crate::services::notifier::NotificationKind;

const SETUP: [CompetitionStatus; 2] = [CompetitionStatus::Draft, CompetitionStatus::Inviting];

/// Input for inviting a user into a slot.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteInput {
    #[validate(length(min = 1))]
    pub invitee_id: String,
    pub slot: Slot,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

fn require_kind(competition: &competition::Model, kind: CompetitionKind) -> AppResult<()> {
    if competition.kind == kind {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "Competition {} is {:?}, not {kind:?}",
            competition.id, competition.kind
        )))
    }
}

impl CompetitionEngine {
    /// Reject an invitee who already holds a slot or has a pending invitation.
    async fn check_invitee(
        &self,
        competition: &competition::Model,
        invitee_id: &str,
    ) -> AppResult<()> {
        if competition.slot_of(invitee_id).is_some() {
            return Err(AppError::AlreadyExists(format!(
                "{invitee_id} already holds a slot"
            )));
        }
        if self
            .stores
            .invitations
            .find_pending_for_invitee(&competition.id, invitee_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyExists(format!(
                "{invitee_id} already has a pending invitation"
            )));
        }
        Ok(())
    }

    pub(super) fn new_invitation(
        &self,
        competition_id: &str,
        invitee_id: &str,
        inviter_id: &str,
        slot: Slot,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> competition_invitation::Model {
        competition_invitation::Model {
            id: self.id_gen.generate(),
            competition_id: competition_id.to_string(),
            invitee_id: invitee_id.to_string(),
            inviter_id: inviter_id.to_string(),
            slot,
            status: InvitationStatus::Pending,
            message,
            expires_at: (now + Duration::hours(self.config.invitation_expiry_hours)).into(),
            responded_at: None,
            created_at: now.into(),
            updated_at: None,
        }
    }

    /// Invite a user into a slot of a curated 1-on-1.
    ///
    /// The first invitation moves the competition from DRAFT to INVITING.
    pub async fn invite_participant(
        &self,
        actor: &Actor,
        competition_id: &str,
        input: InviteInput,
    ) -> AppResult<competition_invitation::Model> {
        actor.require_admin()?;
        Self::validate(&input)?;

        let competition = self.load(competition_id).await?;
        require_kind(&competition, CompetitionKind::Curated1v1)?;
        require_status(&competition, &SETUP, "invite participants")?;
        self.check_invitee(&competition, &input.invitee_id).await?;

        if let Some(live) = self
            .stores
            .invitations
            .find_live_for_slot(competition_id, input.slot)
            .await?
        {
            return Err(AppError::AlreadyExists(format!(
                "Slot {:?} is held by invitation {}",
                input.slot, live.id
            )));
        }

        let now = Utc::now();
        let invitation = self.new_invitation(
            competition_id,
            &input.invitee_id,
            &actor.user_id,
            input.slot,
            input.message,
            now,
        );
        let Inserted::Created(invitation) = self.stores.invitations.insert(invitation).await?
        else {
            // lost the slot to a concurrent invite
            return Err(AppError::AlreadyExists(format!(
                "Slot {:?} already has a live invitation",
                input.slot
            )));
        };
        tracing::info!(
            invitation_id = %invitation.id,
            competition_id = %competition_id,
            invitee_id = %invitation.invitee_id,
            slot = ?invitation.slot,
            "Invited participant"
        );

        if competition.status == CompetitionStatus::Draft {
            let update = StatusUpdate::new(
                [CompetitionStatus::Draft],
                CompetitionStatus::Inviting,
                now,
            );
            self.advance(competition_id, update).await?;
        }

        let mut payload = competition_payload(&competition);
        payload["invitationId"] = json!(invitation.id);
        payload["message"] = json!(invitation.message);
        self.notify(
            &invitation.invitee_id,
            NotificationKind::InvitationReceived,
            payload,
        )
        .await;

        Ok(invitation)
    }

    /// Accept or decline an invitation.
    ///
    /// Accepting takes the invitation's slot; declining leaves the slot open
    /// for a replacement.
    pub async fn respond_to_invitation(
        &self,
        user_id: &str,
        invitation_id: &str,
        accept: bool,
    ) -> AppResult<competition_invitation::Model> {
        let invitation = self.stores.invitations.get_by_id(invitation_id).await?;
        if invitation.invitee_id != user_id {
            return Err(AppError::Forbidden(
                "This invitation is addressed to someone else".to_string(),
            ));
        }

        let competition = self.load(&invitation.competition_id).await?;
        if competition.kind == CompetitionKind::DirectChallenge {
            self.respond_to_challenge(user_id, &competition.id, accept)
                .await?;
            return self.stores.invitations.get_by_id(invitation_id).await;
        }

        if invitation.status != InvitationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Invitation was already {:?}",
                invitation.status
            )));
        }
        let now = Utc::now();
        if invitation.expires_at <= now {
            return Err(AppError::DeadlinePassed(
                "The invitation has expired".to_string(),
            ));
        }
        require_status(&competition, &SETUP, "respond to invitations")?;

        let payload = competition_payload(&competition);
        if accept {
            if !self
                .stores
                .competitions
                .assign_slot(&competition.id, invitation.slot, user_id)
                .await?
            {
                return Err(AppError::InvalidState(format!(
                    "Slot {:?} is no longer open",
                    invitation.slot
                )));
            }
            if !self
                .stores
                .invitations
                .update_status(
                    invitation_id,
                    InvitationStatus::Pending,
                    InvitationStatus::Accepted,
                    now,
                )
                .await?
            {
                // lost to a replacement or the expiry sweep; give the slot back
                self.stores
                    .competitions
                    .release_slot(&competition.id, invitation.slot, user_id)
                    .await?;
                return Err(AppError::InvalidState(
                    "Invitation changed before it could be accepted".to_string(),
                ));
            }
            tracing::info!(invitation_id = %invitation_id, competition_id = %competition.id, user_id = %user_id, "Invitation accepted");
            self.notify(
                &invitation.inviter_id,
                NotificationKind::InvitationAccepted,
                payload,
            )
            .await;
        } else {
            if !self
                .stores
                .invitations
                .update_status(
                    invitation_id,
                    InvitationStatus::Pending,
                    InvitationStatus::Declined,
                    now,
                )
                .await?
            {
                return Err(AppError::InvalidState(
                    "Invitation changed before it could be declined".to_string(),
                ));
            }
            tracing::info!(invitation_id = %invitation_id, competition_id = %competition.id, user_id = %user_id, "Invitation declined");
            self.notify(
                &invitation.inviter_id,
                NotificationKind::InvitationDeclined,
                payload,
            )
            .await;
        }

        self.stores.invitations.get_by_id(invitation_id).await
    }

    /// Retire an invitation and invite someone else into its slot.
    pub async fn replace_invitation(
        &self,
        actor: &Actor,
        invitation_id: &str,
        invitee_id: &str,
        message: Option<String>,
    ) -> AppResult<competition_invitation::Model> {
        actor.require_admin()?;

        let old = self.stores.invitations.get_by_id(invitation_id).await?;
        let competition = self.load(&old.competition_id).await?;
        require_kind(&competition, CompetitionKind::Curated1v1)?;
        require_status(&competition, &SETUP, "replace invitations")?;
        if old.status == InvitationStatus::Replaced {
            return Err(AppError::InvalidState(
                "Invitation was already replaced".to_string(),
            ));
        }
        let input = InviteInput {
            invitee_id: invitee_id.to_string(),
            slot: old.slot,
            message,
        };
        Self::validate(&input)?;
        // nothing is released until the new invitee is known to be acceptable
        self.check_invitee(&competition, invitee_id).await?;

        if old.status == InvitationStatus::Accepted
            && !self
                .stores
                .competitions
                .release_slot(&competition.id, old.slot, &old.invitee_id)
                .await?
        {
            return Err(AppError::InvalidState(format!(
                "Slot {:?} is no longer held by {}",
                old.slot, old.invitee_id
            )));
        }

        let now = Utc::now();
        if !self
            .stores
            .invitations
            .update_status(invitation_id, old.status, InvitationStatus::Replaced, now)
            .await?
        {
            return Err(AppError::InvalidState(
                "Invitation changed while being replaced".to_string(),
            ));
        }
        tracing::info!(invitation_id = %invitation_id, competition_id = %competition.id, slot = ?old.slot, "Replaced invitation");

        match self.invite_participant(actor, &competition.id, input).await {
            Ok(invitation) => Ok(invitation),
            Err(e) => {
                self.restore_replaced(&old).await;
                Err(e)
            }
        }
    }

    /// Put back an invitation whose replacement could not be issued.
    async fn restore_replaced(&self, old: &competition_invitation::Model) {
        let now = Utc::now();
        let reverted = self
            .stores
            .invitations
            .update_status(&old.id, InvitationStatus::Replaced, old.status, now)
            .await;
        let reassigned = if old.status == InvitationStatus::Accepted {
            self.stores
                .competitions
                .assign_slot(&old.competition_id, old.slot, &old.invitee_id)
                .await
        } else {
            Ok(true)
        };
        match (reverted, reassigned) {
            (Ok(true), Ok(true)) => {
                tracing::info!(invitation_id = %old.id, "Restored invitation after failed replacement");
            }
            (reverted, reassigned) => {
                tracing::warn!(
                    invitation_id = %old.id,
                    reverted = ?reverted,
                    reassigned = ?reassigned,
                    "Could not fully restore invitation after failed replacement"
                );
            }
        }
    }

    /// Start a curated 1-on-1 once both slots are filled.
    pub async fn activate(
        &self,
        actor: &Actor,
        competition_id: &str,
    ) -> AppResult<competition::Model> {
        actor.require_admin()?;

        let competition = self.load(competition_id).await?;
        require_kind(&competition, CompetitionKind::Curated1v1)?;
        require_status(&competition, &SETUP, "activate")?;
        if competition.participant1_id.is_none() || competition.participant2_id.is_none() {
            return Err(AppError::InvalidState(
                "Both slots must be accepted before activation".to_string(),
            ));
        }

        let now = Utc::now();
        let update = StatusUpdate::new([competition.status], CompetitionStatus::Active, now)
            .with_submission_deadline(hours_from(now, competition.submission_hours));
        if !self.advance(competition_id, update).await? {
            return Err(AppError::InvalidState(format!(
                "Competition {competition_id} changed status concurrently"
            )));
        }

        let participants = self.participants(&competition).await?;
        self.notify_all(
            &participants,
            NotificationKind::CompetitionStarted,
            &competition_payload(&competition),
        )
        .await;
        self.load(competition_id).await
    }

    /// Open a curated open competition for enrollment and entries.
    pub async fn open_competition(
        &self,
        actor: &Actor,
        competition_id: &str,
    ) -> AppResult<competition::Model> {
        actor.require_admin()?;

        let competition = self.load(competition_id).await?;
        require_kind(&competition, CompetitionKind::CuratedOpen)?;
        require_status(&competition, &[CompetitionStatus::Draft], "open")?;

        let now = Utc::now();
        let update = StatusUpdate::new([CompetitionStatus::Draft], CompetitionStatus::Open, now)
            .with_submission_deadline(hours_from(now, competition.submission_hours));
        if !self.advance(competition_id, update).await? {
            return Err(AppError::InvalidState(format!(
                "Competition {competition_id} changed status concurrently"
            )));
        }
        self.load(competition_id).await
    }

    /// Enroll the caller in an open competition.
    pub async fn join_open(
        &self,
        user_id: &str,
        competition_id: &str,
    ) -> AppResult<competition_participant::Model> {
        let competition = self.load(competition_id).await?;
        require_kind(&competition, CompetitionKind::CuratedOpen)?;
        require_status(&competition, &[CompetitionStatus::Open], "join")?;

        let participant = competition_participant::Model {
            id: self.id_gen.generate(),
            competition_id: competition_id.to_string(),
            user_id: user_id.to_string(),
            joined_at: Utc::now().into(),
        };
        match self.stores.competitions.enroll(participant).await? {
            Inserted::Created(participant) => {
                tracing::info!(competition_id = %competition_id, user_id = %user_id, "Joined open competition");
                Ok(participant)
            }
            Inserted::Duplicate => Err(AppError::AlreadyExists(format!(
                "{user_id} already joined competition {competition_id}"
            ))),
        }
    }

    /// End the submission phase of an open competition and start voting.
    pub async fn close_submissions(
        &self,
        actor: &Actor,
        competition_id: &str,
    ) -> AppResult<competition::Model> {
        actor.require_admin()?;

        let competition = self.load(competition_id).await?;
        require_kind(&competition, CompetitionKind::CuratedOpen)?;
        require_status(&competition, &[CompetitionStatus::Open], "close submissions")?;

        if !self.start_voting(&competition, Utc::now()).await? {
            return Err(AppError::InvalidState(format!(
                "Competition {competition_id} changed status concurrently"
            )));
        }
        self.load(competition_id).await
    }

    /// Every invitation of a competition, for its admins and creator.
    pub async fn list_invitations(
        &self,
        actor: &Actor,
        competition_id: &str,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        let competition = self.load(competition_id).await?;
        if !actor.is_admin && competition.creator_id != actor.user_id {
            return Err(AppError::Forbidden(
                "Only admins and the creator can list invitations".to_string(),
            ));
        }
        self.stores
            .invitations
            .list_by_competition(competition_id)
            .await
    }

    /// The user's unexpired pending invitations and challenges.
    pub async fn list_pending_invitations(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        self.stores
            .invitations
            .list_pending_for_user(user_id, Utc::now())
            .await
    }
}
