//! Periodic deadline sweeps.

use std::sync::Arc;
use std::time::Duration;

use arena_common::{AppResult, SchedulerSettings};
use arena_core::{CompetitionEngine, SweepReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// The periodic sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledSweep {
    /// Close submission windows that ran out.
    SubmissionDeadlines,
    /// Settle voting windows that ran out.
    VotingDeadlines,
    /// Expire unanswered invitations.
    Invitations,
}

impl ScheduledSweep {
    /// Every sweep, in the order they are started.
    pub const ALL: [Self; 3] = [
        Self::SubmissionDeadlines,
        Self::VotingDeadlines,
        Self::Invitations,
    ];

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubmissionDeadlines => "submission_deadlines",
            Self::VotingDeadlines => "voting_deadlines",
            Self::Invitations => "invitations",
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval for the submission deadline sweep (default: 1 minute).
    pub submission_interval: Duration,
    /// Interval for the voting deadline sweep (default: 1 minute).
    pub voting_interval: Duration,
    /// Interval for the invitation sweep (default: 5 minutes).
    pub invitation_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        // A zero period would make tokio's interval panic.
        let secs = |s: u64| Duration::from_secs(s.max(1));
        Self {
            submission_interval: secs(settings.submission_sweep_secs),
            voting_interval: secs(settings.voting_sweep_secs),
            invitation_interval: secs(settings.invitation_sweep_secs),
        }
    }
}

impl SchedulerConfig {
    /// Interval for one sweep.
    #[must_use]
    pub const fn interval_for(&self, sweep: ScheduledSweep) -> Duration {
        match sweep {
            ScheduledSweep::SubmissionDeadlines => self.submission_interval,
            ScheduledSweep::VotingDeadlines => self.voting_interval,
            ScheduledSweep::Invitations => self.invitation_interval,
        }
    }
}

/// Scheduler state for tracking sweep runs.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub last_submission_sweep: Option<DateTime<Utc>>,
    pub last_voting_sweep: Option<DateTime<Utc>>,
    pub last_invitation_sweep: Option<DateTime<Utc>>,
    /// Rows that failed across all passes.
    pub failures: usize,
}

impl SchedulerState {
    fn record(&mut self, sweep: ScheduledSweep, at: DateTime<Utc>, report: &SweepReport) {
        let slot = match sweep {
            ScheduledSweep::SubmissionDeadlines => &mut self.last_submission_sweep,
            ScheduledSweep::VotingDeadlines => &mut self.last_voting_sweep,
            ScheduledSweep::Invitations => &mut self.last_invitation_sweep,
        };
        *slot = Some(at);
        self.failures += report.failed;
    }

    /// When `sweep` last finished.
    #[must_use]
    pub const fn last_run(&self, sweep: ScheduledSweep) -> Option<DateTime<Utc>> {
        match sweep {
            ScheduledSweep::SubmissionDeadlines => self.last_submission_sweep,
            ScheduledSweep::VotingDeadlines => self.last_voting_sweep,
            ScheduledSweep::Invitations => self.last_invitation_sweep,
        }
    }
}

/// Executor for the scheduled sweeps.
#[async_trait::async_trait]
pub trait SweepExecutor: Send + Sync {
    /// Close submission windows that ended before `now`.
    async fn sweep_submission_deadlines(&self, now: DateTime<Utc>) -> AppResult<SweepReport>;

    /// Settle voting windows that ended before `now`.
    async fn sweep_voting_deadlines(&self, now: DateTime<Utc>) -> AppResult<SweepReport>;

    /// Expire invitations that ran out before `now`.
    async fn sweep_invitations(&self, now: DateTime<Utc>) -> AppResult<SweepReport>;

    /// Run one pass of `sweep`.
    async fn run(&self, sweep: ScheduledSweep, now: DateTime<Utc>) -> AppResult<SweepReport> {
        match sweep {
            ScheduledSweep::SubmissionDeadlines => self.sweep_submission_deadlines(now).await,
            ScheduledSweep::VotingDeadlines => self.sweep_voting_deadlines(now).await,
            ScheduledSweep::Invitations => self.sweep_invitations(now).await,
        }
    }
}

#[async_trait::async_trait]
impl SweepExecutor for CompetitionEngine {
    async fn sweep_submission_deadlines(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        Self::sweep_submission_deadlines(self, now).await
    }

    async fn sweep_voting_deadlines(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        Self::sweep_voting_deadlines(self, now).await
    }

    async fn sweep_invitations(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        Self::sweep_invitations(self, now).await
    }
}

/// Handle to the running sweep tasks.
#[derive(Debug)]
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
    state: Arc<RwLock<SchedulerState>>,
}

impl SchedulerHandle {
    /// Snapshot of the run history.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    /// Stop every sweep task.
    ///
    /// A pass in flight is dropped at its next await point; each pass only
    /// commits guarded single-row writes, so the next run picks up the rest.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                tracing::error!(error = %e, "Sweep task panicked");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// Each sweep gets its own task, so a slow settlement pass never delays
/// invitation expiry. The first pass of every sweep runs immediately.
pub fn run_scheduler<E: SweepExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
) -> SchedulerHandle {
    let state = Arc::new(RwLock::new(SchedulerState::default()));

    let tasks = ScheduledSweep::ALL
        .into_iter()
        .map(|sweep| {
            let period = config.interval_for(sweep);
            let executor = executor.clone();
            let state = state.clone();
            tracing::info!(sweep = sweep.as_str(), period_secs = period.as_secs(), "Starting sweep");

            tokio::spawn(async move {
                let mut interval = interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    let now = Utc::now();
                    match executor.run(sweep, now).await {
                        Ok(report) => {
                            state.write().await.record(sweep, now, &report);
                        }
                        Err(e) => {
                            tracing::error!(sweep = sweep.as_str(), error = %e, "Sweep failed");
                        }
                    }
                }
            })
        })
        .collect();

    SchedulerHandle { tasks, state }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.submission_interval, Duration::from_secs(60));
        assert_eq!(config.voting_interval, Duration::from_secs(60));
        assert_eq!(config.invitation_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let settings = SchedulerSettings {
            submission_sweep_secs: 0,
            voting_sweep_secs: 30,
            invitation_sweep_secs: 0,
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.submission_interval, Duration::from_secs(1));
        assert_eq!(config.interval_for(ScheduledSweep::VotingDeadlines), Duration::from_secs(30));
    }

    #[test]
    fn test_scheduler_state_records_runs() {
        let mut state = SchedulerState::default();
        assert!(state.last_run(ScheduledSweep::Invitations).is_none());

        let now = Utc::now();
        let report = SweepReport {
            examined: 3,
            advanced: 1,
            cancelled: 0,
            failed: 2,
        };
        state.record(ScheduledSweep::Invitations, now, &report);
        assert_eq!(state.last_run(ScheduledSweep::Invitations), Some(now));
        assert!(state.last_run(ScheduledSweep::VotingDeadlines).is_none());
        assert_eq!(state.failures, 2);
    }

    #[test]
    fn test_sweep_names() {
        let json = serde_json::to_string(&ScheduledSweep::VotingDeadlines).unwrap();
        assert_eq!(json, "\"voting_deadlines\"");
        assert_eq!(ScheduledSweep::VotingDeadlines.as_str(), "voting_deadlines");
    }
}
