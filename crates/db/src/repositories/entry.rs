//! Competition entry repository.

use std::sync::Arc;

use arena_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
};

use super::{Inserted, is_unique_violation};
use crate::entities::{Competition, CompetitionEntry, competition_entry};

/// Editable fields of a draft entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryContent {
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
}

/// An entry that was just finalized, with the competition's finalized count
/// read in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedEntry {
    pub entry: competition_entry::Model,
    pub submitted_count: u64,
}

/// Storage for competition entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Find an entry by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition_entry::Model>>;

    /// Find a participant's entry in a competition.
    async fn find_by_participant(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> AppResult<Option<competition_entry::Model>>;

    /// Create an entry. At most one exists per participant and competition.
    async fn insert(
        &self,
        model: competition_entry::Model,
    ) -> AppResult<Inserted<competition_entry::Model>>;

    /// Overwrite a draft. Returns `None` if the entry is already finalized.
    async fn update_draft(
        &self,
        id: &str,
        content: &EntryContent,
        now: DateTime<Utc>,
    ) -> AppResult<Option<competition_entry::Model>>;

    /// Set `submitted_at` on a draft and count the competition's finalized
    /// entries atomically. Returns `None` if it was already finalized.
    async fn finalize(
        &self,
        id: &str,
        competition_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FinalizedEntry>>;

    /// All entries of a competition in creation order.
    async fn list_by_competition(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_entry::Model>>;

    /// Number of finalized entries in a competition.
    async fn count_submitted(&self, competition_id: &str) -> AppResult<u64>;
}

/// Entry repository for database operations.
#[derive(Clone)]
pub struct EntryRepository {
    db: Arc<DatabaseConnection>,
}

impl EntryRepository {
    /// Create a new entry repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntryStore for EntryRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition_entry::Model>> {
        CompetitionEntry::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_participant(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> AppResult<Option<competition_entry::Model>> {
        CompetitionEntry::find()
            .filter(competition_entry::Column::CompetitionId.eq(competition_id))
            .filter(competition_entry::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert(
        &self,
        model: competition_entry::Model,
    ) -> AppResult<Inserted<competition_entry::Model>> {
        let result = competition_entry::ActiveModel {
            id: Set(model.id),
            competition_id: Set(model.competition_id),
            user_id: Set(model.user_id),
            title: Set(model.title),
            description: Set(model.description),
            media_url: Set(model.media_url),
            vote_count: Set(model.vote_count),
            submitted_at: Set(model.submitted_at),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(self.db.as_ref())
        .await;

        match result {
            Ok(model) => Ok(Inserted::Created(model)),
            Err(e) if is_unique_violation(&e) => Ok(Inserted::Duplicate),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn update_draft(
        &self,
        id: &str,
        content: &EntryContent,
        now: DateTime<Utc>,
    ) -> AppResult<Option<competition_entry::Model>> {
        let now: DateTimeWithTimeZone = now.into();

        let result = CompetitionEntry::update_many()
            .col_expr(competition_entry::Column::Title, Expr::value(content.title.clone()))
            .col_expr(
                competition_entry::Column::Description,
                Expr::value(content.description.clone()),
            )
            .col_expr(
                competition_entry::Column::MediaUrl,
                Expr::value(content.media_url.clone()),
            )
            .col_expr(competition_entry::Column::UpdatedAt, Expr::value(now))
            .filter(competition_entry::Column::Id.eq(id))
            .filter(competition_entry::Column::SubmittedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn finalize(
        &self,
        id: &str,
        competition_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FinalizedEntry>> {
        let now: DateTimeWithTimeZone = now.into();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Serializes finalizes of one competition: whichever commits second
        // counts the other's entry, so exactly one caller sees both.
        Competition::find_by_id(competition_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Competition not found: {competition_id}")))?;

        let result = CompetitionEntry::update_many()
            .col_expr(competition_entry::Column::SubmittedAt, Expr::value(now))
            .col_expr(competition_entry::Column::UpdatedAt, Expr::value(now))
            .filter(competition_entry::Column::Id.eq(id))
            .filter(competition_entry::Column::CompetitionId.eq(competition_id))
            .filter(competition_entry::Column::SubmittedAt.is_null())
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(None);
        }

        let entry = CompetitionEntry::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Entry not found: {id}")))?;

        let submitted_count = CompetitionEntry::find()
            .filter(competition_entry::Column::CompetitionId.eq(competition_id))
            .filter(competition_entry::Column::SubmittedAt.is_not_null())
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some(FinalizedEntry {
            entry,
            submitted_count,
        }))
    }

    async fn list_by_competition(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_entry::Model>> {
        CompetitionEntry::find()
            .filter(competition_entry::Column::CompetitionId.eq(competition_id))
            .order_by_asc(competition_entry::Column::CreatedAt)
            .order_by_asc(competition_entry::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_submitted(&self, competition_id: &str) -> AppResult<u64> {
        CompetitionEntry::find()
            .filter(competition_entry::Column::CompetitionId.eq(competition_id))
            .filter(competition_entry::Column::SubmittedAt.is_not_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::competition::{self, CompetitionKind, CompetitionStatus};
    use crate::test_utils::competition_row;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn create_test_entry(id: &str, user_id: &str, submitted: bool) -> competition_entry::Model {
        competition_entry::Model {
            id: id.to_string(),
            competition_id: "c1".to_string(),
            user_id: user_id.to_string(),
            title: "Lanterns".to_string(),
            description: Some("Paper lanterns over the river".to_string()),
            media_url: None,
            vote_count: 0,
            submitted_at: submitted.then(|| Utc::now().into()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_participant() {
        let entry = create_test_entry("e1", "alice", false);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[entry]])
                .into_connection(),
        );

        let repo = EntryRepository::new(db);
        let result = repo.find_by_participant("c1", "alice").await.unwrap();

        assert_eq!(result.unwrap().id, "e1");
    }

    #[tokio::test]
    async fn test_update_draft_rejected_once_submitted() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = EntryRepository::new(db);
        let content = EntryContent {
            title: "Lanterns, take two".to_string(),
            ..Default::default()
        };
        let result = repo.update_draft("e1", &content, Utc::now()).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_finalize_already_submitted() {
        let competition = competition_row("c1", CompetitionKind::DirectMatch, CompetitionStatus::Active);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[competition]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = EntryRepository::new(db);
        let result = repo.finalize("e1", "c1", Utc::now()).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_finalize_locks_competition_before_counting() {
        let competition = competition_row("c1", CompetitionKind::DirectMatch, CompetitionStatus::Active);
        let entry = create_test_entry("e2", "bob", true);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[competition]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[entry]])
                .append_query_results([[BTreeMap::from([(
                    "num_items",
                    Value::BigInt(Some(2)),
                )])]])
                .into_connection(),
        );

        let repo = EntryRepository::new(db.clone());
        let finalized = repo.finalize("e2", "c1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(finalized.entry.id, "e2");
        assert_eq!(finalized.submitted_count, 2);
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let statements = format!("{log:?}");
        let lock = statements.find("FOR UPDATE").unwrap();
        let update = statements.find("UPDATE \\\"competition_entry\\\"").unwrap();
        assert!(lock < update);
    }

    #[tokio::test]
    async fn test_finalize_missing_competition() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<competition::Model>::new()])
                .into_connection(),
        );

        let repo = EntryRepository::new(db);
        let result = repo.finalize("e1", "gone", Utc::now()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_competition() {
        let e1 = create_test_entry("e1", "alice", true);
        let e2 = create_test_entry("e2", "bob", false);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[e1, e2]])
                .into_connection(),
        );

        let repo = EntryRepository::new(db);
        let result = repo.list_by_competition("c1").await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(result[0].is_submitted());
        assert!(!result[1].is_submitted());
    }
}
