//! Common utilities and shared types for arena-rs.
//!
//! This crate provides foundational components used across all arena-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error taxonomy via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use arena_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("{} hours to submit, competition {id}", config.competition.default_submission_hours);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    CompetitionConfig, Config, DatabaseConfig, LogConfig, RewardConfig, SchedulerSettings,
    StreakMilestone,
};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
