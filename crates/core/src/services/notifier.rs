//! Notifier service.
//!
//! Provides an abstraction for telling users about competition events.
//! Delivery is someone else's job: the engine calls [`Notifier::notify`]
//! after a transition has been written and never waits on the outcome.

use std::fmt;
use std::sync::Arc;

use arena_common::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Event types sent to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ChallengeReceived,
    ChallengeAccepted,
    ChallengeDeclined,
    CompetitionStarted,
    VotingStarted,
    CompetitionWon,
    CompetitionLost,
    CompetitionDraw,
    CompetitionCancelled,
    PlacementAwarded,
    InvitationReceived,
    InvitationAccepted,
    InvitationDeclined,
}

impl NotificationKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChallengeReceived => "challenge_received",
            Self::ChallengeAccepted => "challenge_accepted",
            Self::ChallengeDeclined => "challenge_declined",
            Self::CompetitionStarted => "competition_started",
            Self::VotingStarted => "voting_started",
            Self::CompetitionWon => "competition_won",
            Self::CompetitionLost => "competition_lost",
            Self::CompetitionDraw => "competition_draw",
            Self::CompetitionCancelled => "competition_cancelled",
            Self::PlacementAwarded => "placement_awarded",
            Self::InvitationReceived => "invitation_received",
            Self::InvitationAccepted => "invitation_accepted",
            Self::InvitationDeclined => "invitation_declined",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for delivering competition events to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one event to one user.
    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: Value)
    -> AppResult<()>;
}

/// Shared notifier handle.
pub type NotifierService = Arc<dyn Notifier>;

/// A no-op notifier for testing or when notifications are disabled.
#[derive(Clone, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(
        &self,
        _user_id: &str,
        _kind: NotificationKind,
        _payload: Value,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Notifier that writes every event to the log.
#[derive(Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: Value) -> AppResult<()> {
        tracing::info!(user_id = %user_id, kind = %kind, payload = %payload, "Notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names_match_serde() {
        let kinds = [
            NotificationKind::ChallengeReceived,
            NotificationKind::VotingStarted,
            NotificationKind::PlacementAwarded,
            NotificationKind::InvitationDeclined,
        ];
        for kind in kinds {
            let json = serde_json::to_value(kind).unwrap_or_default();
            assert_eq!(json, Value::String(kind.as_str().to_string()));
        }
    }

    #[tokio::test]
    async fn test_noop_notifier_accepts_everything() {
        let notifier: NotifierService = Arc::new(NoOpNotifier);
        let result = notifier
            .notify("alice", NotificationKind::CompetitionWon, serde_json::json!({}))
            .await;
        assert!(result.is_ok());
    }
}
