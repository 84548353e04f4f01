//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Competition lifecycle configuration.
    #[serde(default)]
    pub competition: CompetitionConfig,
    /// Point values issued by settlement and voting.
    #[serde(default)]
    pub rewards: RewardConfig,
    /// Deadline sweep intervals.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Competition lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionConfig {
    /// Submission window used when a creator does not pick one.
    #[serde(default = "default_submission_hours")]
    pub default_submission_hours: i32,
    /// Voting window used when a creator does not pick one.
    #[serde(default = "default_voting_hours")]
    pub default_voting_hours: i32,
    /// Upper bound for either window.
    #[serde(default = "default_max_hours")]
    pub max_hours: i32,
    /// Lifetime of a pending invitation or direct challenge.
    #[serde(default = "default_invitation_expiry_hours")]
    pub invitation_expiry_hours: i64,
    /// Vote margin, in whole percent, at or below which a 1-on-1 is a draw.
    #[serde(default = "default_draw_threshold_percent")]
    pub draw_threshold_percent: u32,
    /// How many times a lost conditional write is retried before giving up.
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,
    /// Rows handled per sweep pass.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u64,
}

/// A bonus granted when a win streak reaches `streak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StreakMilestone {
    /// Consecutive wins needed.
    pub streak: i32,
    /// Bonus points.
    pub bonus: i64,
}

/// Point values issued by settlement and voting.
#[derive(Debug, Clone, Deserialize)]
pub struct RewardConfig {
    /// Granted to a voter per cast vote.
    #[serde(default = "default_vote_reward")]
    pub vote: i64,
    /// Granted to each side of a drawn 1-on-1.
    #[serde(default = "default_draw_reward")]
    pub draw: i64,
    /// Base reward for a 1-on-1 win.
    #[serde(default = "default_win_base")]
    pub win_base: i64,
    /// Bonus scaled by the winning margin (100% margin earns all of it).
    #[serde(default = "default_max_margin_bonus")]
    pub max_margin_bonus: i64,
    /// Participation reward for the losing side of a 1-on-1.
    #[serde(default = "default_loss_reward")]
    pub loss: i64,
    /// Open competition rewards by placement, first place first.
    #[serde(default = "default_placements")]
    pub placements: Vec<i64>,
    /// Reward for placements inside `max_winners` but past the explicit table.
    #[serde(default = "default_placement_participation")]
    pub placement_participation: i64,
    /// Flat reward for open competition entrants who did not place.
    #[serde(default = "default_participation")]
    pub participation: i64,
    /// Win streak bonuses.
    #[serde(default = "default_streak_milestones")]
    pub streak_milestones: Vec<StreakMilestone>,
}

/// Deadline sweep intervals, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// How often expired submission windows are swept.
    #[serde(default = "default_sweep_secs")]
    pub submission_sweep_secs: u64,
    /// How often expired voting windows are settled.
    #[serde(default = "default_sweep_secs")]
    pub voting_sweep_secs: u64,
    /// How often stale invitations are expired.
    #[serde(default = "default_invitation_sweep_secs")]
    pub invitation_sweep_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_submission_hours() -> i32 {
    72
}

const fn default_voting_hours() -> i32 {
    48
}

const fn default_max_hours() -> i32 {
    336
}

const fn default_invitation_expiry_hours() -> i64 {
    72
}

const fn default_draw_threshold_percent() -> u32 {
    5
}

const fn default_max_claim_attempts() -> u32 {
    3
}

const fn default_sweep_batch_size() -> u64 {
    100
}

const fn default_vote_reward() -> i64 {
    1
}

const fn default_draw_reward() -> i64 {
    10
}

const fn default_win_base() -> i64 {
    20
}

const fn default_max_margin_bonus() -> i64 {
    20
}

const fn default_loss_reward() -> i64 {
    5
}

fn default_placements() -> Vec<i64> {
    vec![50, 30, 20]
}

const fn default_placement_participation() -> i64 {
    10
}

const fn default_participation() -> i64 {
    5
}

fn default_streak_milestones() -> Vec<StreakMilestone> {
    vec![
        StreakMilestone { streak: 3, bonus: 15 },
        StreakMilestone { streak: 5, bonus: 30 },
    ]
}

const fn default_sweep_secs() -> u64 {
    60
}

const fn default_invitation_sweep_secs() -> u64 {
    300
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            default_submission_hours: default_submission_hours(),
            default_voting_hours: default_voting_hours(),
            max_hours: default_max_hours(),
            invitation_expiry_hours: default_invitation_expiry_hours(),
            draw_threshold_percent: default_draw_threshold_percent(),
            max_claim_attempts: default_max_claim_attempts(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            vote: default_vote_reward(),
            draw: default_draw_reward(),
            win_base: default_win_base(),
            max_margin_bonus: default_max_margin_bonus(),
            loss: default_loss_reward(),
            placements: default_placements(),
            placement_participation: default_placement_participation(),
            participation: default_participation(),
            streak_milestones: default_streak_milestones(),
        }
    }
}

impl RewardConfig {
    /// Bonus for reaching `streak` consecutive wins, if it is a milestone.
    #[must_use]
    pub fn streak_bonus(&self, streak: i32) -> Option<i64> {
        self.streak_milestones
            .iter()
            .find(|m| m.streak == streak)
            .map(|m| m.bonus)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            submission_sweep_secs: default_sweep_secs(),
            voting_sweep_secs: default_sweep_secs(),
            invitation_sweep_secs: default_invitation_sweep_secs(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `ARENA_ENV`)
    /// 3. Environment variables with `ARENA_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("ARENA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ARENA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ARENA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
