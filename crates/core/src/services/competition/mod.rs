//! Competition engine.
//!
//! One engine drives queue matches, direct challenges, curated 1-on-1s and
//! curated open competitions through the same lifecycle. The operations are
//! split across submodules by concern; they all hang off [`CompetitionEngine`].

mod acquisition;
mod entry;
mod invitation;
mod matchmaking;
mod settlement;
mod sweep;
mod view;
mod voting;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use arena_common::{AppError, AppResult, CompetitionConfig, IdGenerator, RewardConfig};
use arena_db::entities::competition::{self, CompetitionStatus};
use arena_db::repositories::{
    CompetitionRepository, CompetitionStore, EntryRepository, EntryStore, InvitationRepository,
    InvitationStore, PromptRepository, PromptStore, StatsRepository, StatsStore, StatusUpdate,
    VoteRepository, VoteStore,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use sea_orm::DatabaseConnection;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value;
use validator::Validate;

use super::ledger::RewardLedgerService;
use super::notifier::{NotificationKind, NotifierService};

pub use acquisition::Acquisition;
pub use entry::{EntryInput, EntryView};
pub use invitation::InviteInput;
pub use matchmaking::CreateCompetitionInput;
pub use settlement::{Settlement, SettlementPlan, plan_head_to_head, plan_open};
pub use sweep::SweepReport;
pub use view::{CompetitionView, VoteStats};

/// The caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    /// A regular user.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    /// A platform admin.
    #[must_use]
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }

    fn require_admin(&self) -> AppResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

/// The repositories the engine reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub prompts: Arc<dyn PromptStore>,
    pub competitions: Arc<dyn CompetitionStore>,
    pub entries: Arc<dyn EntryStore>,
    pub votes: Arc<dyn VoteStore>,
    pub invitations: Arc<dyn InvitationStore>,
    pub stats: Arc<dyn StatsStore>,
}

impl Stores {
    /// sea-orm repositories over one connection pool.
    #[must_use]
    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self {
            prompts: Arc::new(PromptRepository::new(db.clone())),
            competitions: Arc::new(CompetitionRepository::new(db.clone())),
            entries: Arc::new(EntryRepository::new(db.clone())),
            votes: Arc::new(VoteRepository::new(db.clone())),
            invitations: Arc::new(InvitationRepository::new(db.clone())),
            stats: Arc::new(StatsRepository::new(db)),
        }
    }

    /// Every store served by one object.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: PromptStore
            + CompetitionStore
            + EntryStore
            + VoteStore
            + InvitationStore
            + StatsStore
            + 'static,
    {
        Self {
            prompts: store.clone(),
            competitions: store.clone(),
            entries: store.clone(),
            votes: store.clone(),
            invitations: store.clone(),
            stats: store,
        }
    }
}

/// Competition engine.
#[derive(Clone)]
pub struct CompetitionEngine {
    stores: Stores,
    ledger: RewardLedgerService,
    notifier: NotifierService,
    config: CompetitionConfig,
    rewards: RewardConfig,
    id_gen: IdGenerator,
}

impl CompetitionEngine {
    /// Create a new competition engine.
    #[must_use]
    pub fn new(
        stores: Stores,
        ledger: RewardLedgerService,
        notifier: NotifierService,
        config: CompetitionConfig,
        rewards: RewardConfig,
    ) -> Self {
        Self {
            stores,
            ledger,
            notifier,
            config,
            rewards,
            id_gen: IdGenerator::new(),
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &CompetitionConfig {
        &self.config
    }

    async fn load(&self, competition_id: &str) -> AppResult<competition::Model> {
        self.stores.competitions.get_by_id(competition_id).await
    }

    /// Apply a guarded status change after checking it against the
    /// transition table.
    ///
    /// Returns `false` when another caller moved the competition first.
    async fn advance(&self, competition_id: &str, update: StatusUpdate) -> AppResult<bool> {
        if let Some(from) = update.from.iter().find(|from| !from.can_transition_to(update.to)) {
            return Err(AppError::Internal(format!(
                "Illegal transition {from:?} -> {:?}",
                update.to
            )));
        }

        let applied = self.stores.competitions.transition(competition_id, &update).await?;
        if applied {
            tracing::info!(competition_id = %competition_id, status = ?update.to, "Competition status changed");
        } else {
            tracing::debug!(competition_id = %competition_id, status = ?update.to, "Status change lost to a concurrent update");
        }
        Ok(applied)
    }

    /// Users taking part in a competition: both sides of a 1-on-1, or every
    /// enrolled user of an open competition.
    async fn participants(&self, competition: &competition::Model) -> AppResult<Vec<String>> {
        if competition.kind.is_one_on_one() {
            Ok(competition
                .participant1_id
                .iter()
                .chain(competition.participant2_id.iter())
                .cloned()
                .collect())
        } else {
            Ok(self
                .stores
                .competitions
                .list_enrolled(&competition.id)
                .await?
                .into_iter()
                .map(|p| p.user_id)
                .collect())
        }
    }

    async fn is_participant(
        &self,
        competition: &competition::Model,
        user_id: &str,
    ) -> AppResult<bool> {
        if competition.kind.is_one_on_one() {
            Ok(competition.slot_of(user_id).is_some())
        } else {
            self.stores
                .competitions
                .is_enrolled(&competition.id, user_id)
                .await
        }
    }

    /// Best-effort notification; failures are logged only.
    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: Value) {
        if let Err(e) = self.notifier.notify(user_id, kind, payload).await {
            tracing::warn!(error = %e, user_id = %user_id, kind = %kind, "Failed to send notification");
        }
    }

    async fn notify_all(&self, user_ids: &[String], kind: NotificationKind, payload: &Value) {
        join_all(
            user_ids
                .iter()
                .map(|user_id| self.notify(user_id, kind, payload.clone())),
        )
        .await;
    }

    fn window(&self, hours: Option<i32>, default: i32, name: &str) -> AppResult<i32> {
        let hours = hours.unwrap_or(default);
        if hours < 1 || hours > self.config.max_hours {
            return Err(AppError::Validation(format!(
                "{name} must be between 1 and {} hours",
                self.config.max_hours
            )));
        }
        Ok(hours)
    }

    fn validate<T: Validate>(input: &T) -> AppResult<()> {
        input.validate().map_err(AppError::from)
    }
}

fn hours_from(now: DateTime<Utc>, hours: i32) -> DateTime<Utc> {
    now + Duration::hours(i64::from(hours))
}

fn deadline_passed(deadline: Option<&DateTimeWithTimeZone>, now: DateTime<Utc>) -> bool {
    deadline.is_some_and(|d| *d < now)
}

fn require_status(
    competition: &competition::Model,
    allowed: &[CompetitionStatus],
    action: &str,
) -> AppResult<()> {
    if allowed.contains(&competition.status) {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "Cannot {action} while competition is {:?}",
            competition.status
        )))
    }
}

fn competition_payload(competition: &competition::Model) -> Value {
    serde_json::json!({
        "competitionId": competition.id,
        "title": competition.title,
        "kind": competition.kind,
    })
}
