//! Competition entity: the aggregate record of one 1-on-1 or open contest.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How participants come to be in a competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CompetitionKind {
    /// Two users paired by the matchmaking queue.
    #[sea_orm(string_value = "direct_match")]
    DirectMatch,
    /// A user challenging a named opponent.
    #[sea_orm(string_value = "direct_challenge")]
    DirectChallenge,
    /// Platform-curated 1-on-1 filled by admin invitations.
    #[sea_orm(string_value = "curated_1v1")]
    Curated1v1,
    /// Platform-curated open contest with self-enrollment.
    #[sea_orm(string_value = "curated_open")]
    CuratedOpen,
}

impl CompetitionKind {
    /// Whether the competition has exactly two sides.
    #[must_use]
    pub const fn is_one_on_one(self) -> bool {
        !matches!(self, Self::CuratedOpen)
    }

    /// Whether the competition is created and steered by admins.
    #[must_use]
    pub const fn is_curated(self) -> bool {
        matches!(self, Self::Curated1v1 | Self::CuratedOpen)
    }
}

/// Lifecycle status.
///
/// Statuses only move forward; COMPLETED, DRAW and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    /// Waiting for an opponent (queue match or direct challenge).
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Curated competition being prepared by an admin.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Curated 1-on-1 with invitations outstanding.
    #[sea_orm(string_value = "inviting")]
    Inviting,
    /// Open competition accepting enrollment and entries.
    #[sea_orm(string_value = "open")]
    Open,
    /// 1-on-1 accepting entries.
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "voting")]
    Voting,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "draw")]
    Draw,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl CompetitionStatus {
    /// Position in the forward-only ordering. OPEN and ACTIVE share a rank:
    /// they are the submission phase of the open and 1-on-1 variants.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending | Self::Draft => 0,
            Self::Inviting => 1,
            Self::Open | Self::Active => 2,
            Self::Voting => 3,
            Self::Completed | Self::Draw | Self::Cancelled => 4,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Draw | Self::Cancelled)
    }

    /// Whether entries may be created, edited and finalized.
    #[must_use]
    pub const fn accepts_submissions(self) -> bool {
        matches!(self, Self::Active | Self::Open)
    }

    /// Whether entry content is visible to everyone.
    #[must_use]
    pub const fn reveals_entries(self) -> bool {
        matches!(self, Self::Voting | Self::Completed | Self::Draw)
    }

    /// Whether vote tallies are visible to everyone.
    #[must_use]
    pub const fn reveals_tallies(self) -> bool {
        matches!(self, Self::Completed | Self::Draw | Self::Cancelled)
    }

    /// Whether `next` is a legal successor of this status.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Active | Self::Cancelled),
            Self::Draft => matches!(
                next,
                Self::Inviting | Self::Active | Self::Open | Self::Cancelled
            ),
            Self::Inviting => matches!(next, Self::Active | Self::Cancelled),
            Self::Open | Self::Active => matches!(next, Self::Voting | Self::Cancelled),
            Self::Voting => matches!(next, Self::Completed | Self::Draw | Self::Cancelled),
            Self::Completed | Self::Draw | Self::Cancelled => false,
        }
    }
}

/// A participant position in a 1-on-1 competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i16", db_type = "SmallInteger")]
pub enum Slot {
    #[sea_orm(num_value = 1)]
    First,
    #[sea_orm(num_value = 2)]
    Second,
}

impl Slot {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub kind: CompetitionKind,

    pub title: String,

    #[sea_orm(indexed)]
    pub content_type: String,

    #[sea_orm(indexed)]
    pub prompt_id: String,

    #[sea_orm(indexed)]
    pub status: CompetitionStatus,

    /// User (or admin) who created the competition.
    #[sea_orm(indexed)]
    pub creator_id: String,

    /// First side of a 1-on-1. For queue matches and challenges this is the creator.
    #[sea_orm(indexed, nullable)]
    pub participant1_id: Option<String>,

    /// Second side of a 1-on-1, claimed by matchmaking or by invitation.
    #[sea_orm(indexed, nullable)]
    pub participant2_id: Option<String>,

    #[sea_orm(nullable)]
    pub winner_id: Option<String>,

    pub participant1_votes: i32,
    pub participant2_votes: i32,
    pub total_votes: i32,

    /// Skill tier the creator queued with (matchmaking only).
    pub skill_tier: i32,

    pub submission_hours: i32,
    pub voting_hours: i32,

    /// Number of placements rewarded (open kind only).
    pub max_winners: i32,

    #[sea_orm(nullable)]
    pub submission_deadline: Option<DateTimeWithTimeZone>,
    #[sea_orm(nullable)]
    pub voting_deadline: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub started_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// The user occupying `slot`, if any.
    #[must_use]
    pub fn participant(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::First => self.participant1_id.as_deref(),
            Slot::Second => self.participant2_id.as_deref(),
        }
    }

    /// The slot `user_id` occupies in a 1-on-1.
    #[must_use]
    pub fn slot_of(&self, user_id: &str) -> Option<Slot> {
        if self.participant1_id.as_deref() == Some(user_id) {
            Some(Slot::First)
        } else if self.participant2_id.as_deref() == Some(user_id) {
            Some(Slot::Second)
        } else {
            None
        }
    }

    /// Vote tally for `slot`.
    #[must_use]
    pub const fn votes_for(&self, slot: Slot) -> i32 {
        match slot {
            Slot::First => self.participant1_votes,
            Slot::Second => self.participant2_votes,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::prompt::Entity",
        from = "Column::PromptId",
        to = "super::prompt::Column::Id",
        on_delete = "Restrict"
    )]
    Prompt,
    #[sea_orm(has_many = "super::competition_entry::Entity")]
    Entry,
    #[sea_orm(has_many = "super::competition_vote::Entity")]
    Vote,
    #[sea_orm(has_many = "super::competition_invitation::Entity")]
    Invitation,
    #[sea_orm(has_many = "super::competition_participant::Entity")]
    Participant,
}

impl Related<super::prompt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prompt.def()
    }
}

impl Related<super::competition_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entry.def()
    }
}

impl Related<super::competition_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::competition_invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitation.def()
    }
}

impl Related<super::competition_participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_transitions_never_move_backwards() {
        for from in CompetitionStatus::iter() {
            for to in CompetitionStatus::iter() {
                if from.can_transition_to(to) {
                    assert!(
                        to.rank() > from.rank(),
                        "{from:?} -> {to:?} does not move forward"
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in CompetitionStatus::iter().filter(|s| s.is_terminal()) {
            assert!(CompetitionStatus::iter().all(|to| !from.can_transition_to(to)));
        }
    }

    #[test]
    fn test_kind_shape() {
        assert!(CompetitionKind::DirectMatch.is_one_on_one());
        assert!(CompetitionKind::Curated1v1.is_one_on_one());
        assert!(!CompetitionKind::CuratedOpen.is_one_on_one());
        assert!(!CompetitionKind::DirectChallenge.is_curated());
    }

    #[test]
    fn test_slot_other() {
        assert_eq!(Slot::First.other(), Slot::Second);
        assert_eq!(Slot::Second.other(), Slot::First);
    }

    #[test]
    fn test_cancelled_reveals_tallies_not_entries() {
        assert!(CompetitionStatus::Cancelled.reveals_tallies());
        assert!(!CompetitionStatus::Cancelled.reveals_entries());
        assert!(CompetitionStatus::Voting.reveals_entries());
        assert!(!CompetitionStatus::Voting.reveals_tallies());
    }
}
