//! Participant acquisition strategies.

use arena_common::{AppError, AppResult};
use arena_db::entities::competition::{CompetitionKind, CompetitionStatus};

/// How a competition gets its participants. One strategy per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// The creator waits in the matchmaking queue for an opponent.
    QueueMatch { skill_tier: i32 },
    /// The creator names an opponent, who accepts or declines.
    DirectChallenge {
        challenged_user_id: String,
        message: Option<String>,
    },
    /// An admin fills both slots by invitation.
    AdminInvite,
    /// Users enroll themselves once an admin opens the competition.
    OpenEnroll { max_winners: i32 },
}

impl Acquisition {
    /// Pick the strategy for `kind` from the creation request.
    pub fn for_kind(
        kind: CompetitionKind,
        creator_id: &str,
        challenged_user_id: Option<&str>,
        message: Option<&str>,
        skill_tier: Option<i32>,
        max_winners: Option<i32>,
    ) -> AppResult<Self> {
        match kind {
            CompetitionKind::DirectMatch => Ok(Self::QueueMatch {
                skill_tier: skill_tier.unwrap_or_default(),
            }),
            CompetitionKind::DirectChallenge => {
                let challenged = challenged_user_id.ok_or_else(|| {
                    AppError::Validation("A direct challenge needs an opponent".to_string())
                })?;
                if challenged == creator_id {
                    return Err(AppError::Validation(
                        "You cannot challenge yourself".to_string(),
                    ));
                }
                Ok(Self::DirectChallenge {
                    challenged_user_id: challenged.to_string(),
                    message: message.map(ToString::to_string),
                })
            }
            CompetitionKind::Curated1v1 => Ok(Self::AdminInvite),
            CompetitionKind::CuratedOpen => {
                let max_winners = max_winners.unwrap_or(1);
                if max_winners < 1 {
                    return Err(AppError::Validation(
                        "max_winners must be at least 1".to_string(),
                    ));
                }
                Ok(Self::OpenEnroll { max_winners })
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CompetitionKind {
        match self {
            Self::QueueMatch { .. } => CompetitionKind::DirectMatch,
            Self::DirectChallenge { .. } => CompetitionKind::DirectChallenge,
            Self::AdminInvite => CompetitionKind::Curated1v1,
            Self::OpenEnroll { .. } => CompetitionKind::CuratedOpen,
        }
    }

    /// Status a freshly created competition starts in.
    #[must_use]
    pub const fn initial_status(&self) -> CompetitionStatus {
        match self {
            Self::QueueMatch { .. } | Self::DirectChallenge { .. } => CompetitionStatus::Pending,
            Self::AdminInvite | Self::OpenEnroll { .. } => CompetitionStatus::Draft,
        }
    }

    /// Curated competitions are created by admins only.
    #[must_use]
    pub const fn requires_admin(&self) -> bool {
        matches!(self, Self::AdminInvite | Self::OpenEnroll { .. })
    }

    /// Whether the creator is the first participant.
    #[must_use]
    pub const fn creator_participates(&self) -> bool {
        matches!(self, Self::QueueMatch { .. } | Self::DirectChallenge { .. })
    }

    #[must_use]
    pub const fn skill_tier(&self) -> i32 {
        match self {
            Self::QueueMatch { skill_tier } => *skill_tier,
            _ => 0,
        }
    }

    #[must_use]
    pub const fn max_winners(&self) -> i32 {
        match self {
            Self::OpenEnroll { max_winners } => *max_winners,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_needs_someone_else() {
        let missing =
            Acquisition::for_kind(CompetitionKind::DirectChallenge, "alice", None, None, None, None);
        assert!(matches!(missing, Err(AppError::Validation(_))));

        let own = Acquisition::for_kind(
            CompetitionKind::DirectChallenge,
            "alice",
            Some("alice"),
            None,
            None,
            None,
        );
        assert!(matches!(own, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_open_defaults_to_single_winner() {
        let acquisition =
            Acquisition::for_kind(CompetitionKind::CuratedOpen, "admin", None, None, None, None);
        assert_eq!(acquisition.ok().map(|a| a.max_winners()), Some(1));

        let zero =
            Acquisition::for_kind(CompetitionKind::CuratedOpen, "admin", None, None, None, Some(0));
        assert!(matches!(zero, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_strategy_shapes() {
        let queue = Acquisition::QueueMatch { skill_tier: 3 };
        assert_eq!(queue.initial_status(), CompetitionStatus::Pending);
        assert!(queue.creator_participates());
        assert!(!queue.requires_admin());

        let curated = Acquisition::AdminInvite;
        assert_eq!(curated.kind(), CompetitionKind::Curated1v1);
        assert_eq!(curated.initial_status(), CompetitionStatus::Draft);
        assert!(curated.requires_admin());
        assert!(!curated.creator_participates());
    }
}
