//! Database entities.

pub mod competition;
pub mod competition_entry;
pub mod competition_invitation;
pub mod competition_participant;
pub mod competition_vote;
pub mod prompt;
pub mod reward_grant;
pub mod user_competition_stats;

pub use competition::Entity as Competition;
pub use competition_entry::Entity as CompetitionEntry;
pub use competition_invitation::Entity as CompetitionInvitation;
pub use competition_participant::Entity as CompetitionParticipant;
pub use competition_vote::Entity as CompetitionVote;
pub use prompt::Entity as Prompt;
pub use reward_grant::Entity as RewardGrant;
pub use user_competition_stats::Entity as UserCompetitionStats;
