//! Repositories.
//!
//! Each entity has a store trait that the engine is written against and a
//! sea-orm repository implementing it. Race-sensitive writes are expressed as
//! single guarded statements (`UPDATE ... WHERE <guard>`) or inserts backed by
//! a unique index, so that the database decides which of two concurrent
//! callers wins.

use sea_orm::{DbErr, SqlErr};

pub mod competition;
pub mod entry;
pub mod invitation;
pub mod prompt;
pub mod stats;
pub mod vote;

pub use competition::{CompetitionRepository, CompetitionStore, MatchQuery, StatusUpdate};
pub use entry::{EntryContent, EntryRepository, EntryStore, FinalizedEntry};
pub use invitation::{InvitationRepository, InvitationStore};
pub use prompt::{PromptRepository, PromptStore};
pub use stats::{MatchOutcome, StatsRepository, StatsStore, StreakChange};
pub use vote::{CastOutcome, VoteRepository, VoteStore};

/// Outcome of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted<T> {
    /// The row was written.
    Created(T),
    /// A row with the same unique key already exists.
    Duplicate,
}

impl<T> Inserted<T> {
    /// Returns the created row, if any.
    pub fn created(self) -> Option<T> {
        match self {
            Self::Created(value) => Some(value),
            Self::Duplicate => None,
        }
    }
}

/// Whether a database error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
