//! Background work for arena-rs.
//!
//! Competitions move past their deadlines without anyone calling in, so
//! the [`run_scheduler`] loop sweeps them periodically:
//!
//! - **Submission deadlines**: start voting late or cancel
//! - **Voting deadlines**: settle and pay out
//! - **Invitations**: expire unanswered invitations and challenges

pub mod scheduler;

pub use scheduler::{
    ScheduledSweep, SchedulerConfig, SchedulerHandle, SchedulerState, SweepExecutor,
    run_scheduler,
};
