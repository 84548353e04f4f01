//! Deadline sweeps, driven periodically by the scheduler.

use arena_common::AppResult;
use arena_db::entities::competition::{self, CompetitionKind, CompetitionStatus};
use arena_db::entities::competition_invitation::{self, InvitationStatus};
use arena_db::repositories::StatusUpdate;
use chrono::{DateTime, Utc};

use super::{CompetitionEngine, competition_payload};
use crate::services::notifier::NotificationKind;

/// Outcome counts of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows found past their deadline.
    pub examined: usize,
    /// Rows moved along: into voting, settled with a result, or expired.
    pub advanced: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl SweepReport {
    /// Whether the pass changed anything.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.advanced == 0 && self.cancelled == 0 && self.failed == 0
    }

    fn log(&self, sweep: &str) {
        if !self.is_idle() {
            tracing::info!(
                sweep,
                examined = self.examined,
                advanced = self.advanced,
                cancelled = self.cancelled,
                failed = self.failed,
                "Sweep finished"
            );
        }
    }
}

enum Swept {
    Advanced,
    Cancelled,
    /// Someone else handled it first.
    Skipped,
}

impl SweepReport {
    fn record(&mut self, result: AppResult<Swept>, id: &str) {
        match result {
            Ok(Swept::Advanced) => self.advanced += 1,
            Ok(Swept::Cancelled) => self.cancelled += 1,
            Ok(Swept::Skipped) => {}
            Err(e) => {
                self.failed += 1;
                tracing::warn!(error = %e, id = %id, "Sweep failed for row");
            }
        }
    }
}

impl CompetitionEngine {
    /// Close 1-on-1s whose submission window ran out.
    ///
    /// With both entries in, voting starts late; otherwise the competition is
    /// cancelled without rewards. Open competitions are only ever closed by
    /// an admin.
    pub async fn sweep_submission_deadlines(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self
            .stores
            .competitions
            .find_submission_expired(now, self.config.sweep_batch_size)
            .await?;

        let mut report = SweepReport::default();
        for competition in due {
            report.examined += 1;
            let result = self.expire_submission(&competition, now).await;
            report.record(result, &competition.id);
        }
        report.log("submission");
        Ok(report)
    }

    async fn expire_submission(
        &self,
        competition: &competition::Model,
        now: DateTime<Utc>,
    ) -> AppResult<Swept> {
        let submitted = self
            .stores
            .entries
            .count_submitted(&competition.id)
            .await?;
        if submitted >= 2 {
            return Ok(if self.start_voting(competition, now).await? {
                Swept::Advanced
            } else {
                Swept::Skipped
            });
        }

        let update = StatusUpdate::new(
            [CompetitionStatus::Active],
            CompetitionStatus::Cancelled,
            now,
        );
        if !self.advance(&competition.id, update).await? {
            return Ok(Swept::Skipped);
        }
        tracing::info!(competition_id = %competition.id, submitted, "Submission window closed without both entries");

        let participants = self.participants(competition).await?;
        self.notify_all(
            &participants,
            NotificationKind::CompetitionCancelled,
            &competition_payload(competition),
        )
        .await;
        Ok(Swept::Cancelled)
    }

    /// Settle competitions whose voting window ran out.
    pub async fn sweep_voting_deadlines(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self
            .stores
            .competitions
            .find_voting_expired(now, self.config.sweep_batch_size)
            .await?;

        let mut report = SweepReport::default();
        for competition in due {
            report.examined += 1;
            let result = self.settle(&competition.id).await.map(|settlement| {
                if settlement.already_settled {
                    Swept::Skipped
                } else if settlement.status == CompetitionStatus::Cancelled {
                    Swept::Cancelled
                } else {
                    Swept::Advanced
                }
            });
            report.record(result, &competition.id);
        }
        report.log("voting");
        Ok(report)
    }

    /// Expire unanswered invitations.
    ///
    /// An expired curated invitation just frees its slot; an expired direct
    /// challenge takes its competition down with it.
    pub async fn sweep_invitations(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self
            .stores
            .invitations
            .find_expired_pending(now, self.config.sweep_batch_size)
            .await?;

        let mut report = SweepReport::default();
        for invitation in due {
            report.examined += 1;
            let result = self.expire_invitation(&invitation, now).await;
            report.record(result, &invitation.id);
        }
        report.log("invitation");
        Ok(report)
    }

    async fn expire_invitation(
        &self,
        invitation: &competition_invitation::Model,
        now: DateTime<Utc>,
    ) -> AppResult<Swept> {
        if !self
            .stores
            .invitations
            .update_status(
                &invitation.id,
                InvitationStatus::Pending,
                InvitationStatus::Expired,
                now,
            )
            .await?
        {
            return Ok(Swept::Skipped);
        }
        tracing::debug!(invitation_id = %invitation.id, competition_id = %invitation.competition_id, "Invitation expired");

        let competition = self.load(&invitation.competition_id).await?;
        if competition.kind != CompetitionKind::DirectChallenge {
            return Ok(Swept::Advanced);
        }

        let update = StatusUpdate::new(
            [CompetitionStatus::Pending],
            CompetitionStatus::Cancelled,
            now,
        );
        if !self.advance(&competition.id, update).await? {
            return Ok(Swept::Advanced);
        }
        self.notify(
            &competition.creator_id,
            NotificationKind::CompetitionCancelled,
            competition_payload(&competition),
        )
        .await;
        Ok(Swept::Cancelled)
    }
}
