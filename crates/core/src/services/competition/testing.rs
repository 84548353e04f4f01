//! Engine fixtures over the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use arena_common::{AppResult, CompetitionConfig, RewardConfig};
use arena_db::entities::{competition, competition_entry, prompt};
use arena_db::memory::MemoryStore;
use arena_db::repositories::PromptStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{CompetitionEngine, EntryInput, Stores};
use crate::services::ledger::StatsLedger;
use crate::services::notifier::{NotificationKind, Notifier};

pub const PROMPT: &str = "prompt-haiku";
pub const PROMPT_TYPE: &str = "writing";
pub const RETIRED_PROMPT: &str = "prompt-retired";

/// Notifier that keeps every event for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotificationKind, Value)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: Value) -> AppResult<()> {
        self.sent
            .lock()
            .await
            .push((user_id.to_string(), kind, payload));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub engine: CompetitionEngine,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(CompetitionConfig::default(), RewardConfig::default()).await
    }

    pub async fn with_config(config: CompetitionConfig, rewards: RewardConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        for (id, is_active) in [(PROMPT, true), (RETIRED_PROMPT, false)] {
            PromptStore::insert(
                &*store,
                prompt::Model {
                    id: id.to_string(),
                    title: "Autumn haiku".to_string(),
                    description: "Seventeen syllables about falling leaves".to_string(),
                    content_type: PROMPT_TYPE.to_string(),
                    is_active,
                    created_at: Utc::now().into(),
                },
            )
            .await
            .unwrap();
        }

        let notifier = Arc::new(RecordingNotifier::default());
        let engine = CompetitionEngine::new(
            Stores::shared(store.clone()),
            Arc::new(StatsLedger::new(store.clone())),
            notifier.clone(),
            config,
            rewards,
        );

        Self {
            store,
            engine,
            notifier,
        }
    }

    /// Notification kinds sent to `user_id`, oldest first.
    pub async fn sent_to(&self, user_id: &str) -> Vec<NotificationKind> {
        self.notifier
            .sent
            .lock()
            .await
            .iter()
            .filter(|(to, _, _)| to == user_id)
            .map(|(_, kind, _)| *kind)
            .collect()
    }

    /// A queue match between `first` and `second`, in ACTIVE.
    pub async fn active_match(&self, first: &str, second: &str) -> competition::Model {
        self.engine
            .join_queue(first, PROMPT_TYPE, PROMPT, 1)
            .await
            .unwrap();
        self.engine
            .join_queue(second, PROMPT_TYPE, PROMPT, 1)
            .await
            .unwrap()
    }

    /// Write and finalize an entry for `user_id`.
    pub async fn submit(&self, competition_id: &str, user_id: &str) -> competition_entry::Model {
        self.engine
            .upsert_entry(competition_id, user_id, entry_input(user_id))
            .await
            .unwrap();
        self.engine
            .finalize_entry(competition_id, user_id)
            .await
            .unwrap()
    }

    /// A queue match in VOTING with both entries finalized.
    pub async fn voting_match(
        &self,
        first: &str,
        second: &str,
    ) -> (competition::Model, competition_entry::Model, competition_entry::Model) {
        let competition = self.active_match(first, second).await;
        let a = self.submit(&competition.id, first).await;
        let b = self.submit(&competition.id, second).await;
        let competition = self.store.competition(&competition.id).await.unwrap();
        (competition, a, b)
    }

    /// Cast `count` votes for `entry_id` from fresh voters named `{prefix}-{n}`.
    pub async fn vote_many(&self, competition_id: &str, entry_id: &str, prefix: &str, count: usize) {
        for n in 0..count {
            self.engine
                .cast_vote(competition_id, &format!("{prefix}-{n}"), entry_id)
                .await
                .unwrap();
        }
    }

    /// Move a competition's deadlines an hour into the past.
    pub async fn expire_deadlines(&self, competition_id: &str) {
        let past = (Utc::now() - Duration::hours(1)).into();
        self.store
            .update_competition(competition_id, |c| {
                if c.submission_deadline.is_some() {
                    c.submission_deadline = Some(past);
                }
                if c.voting_deadline.is_some() {
                    c.voting_deadline = Some(past);
                }
            })
            .await;
    }
}

pub fn entry_input(user_id: &str) -> EntryInput {
    EntryInput {
        title: format!("{user_id}'s haiku"),
        description: Some("leaves drift on the pond".to_string()),
        media_url: None,
    }
}
