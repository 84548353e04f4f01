//! Prompt repository.

use std::sync::Arc;

use arena_common::{AppError, AppResult};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::{Prompt, prompt};

/// Read access to the prompt catalog.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Find a prompt by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<prompt::Model>>;

    /// List active prompts, optionally restricted to one content type.
    async fn list_active(
        &self,
        content_type: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<prompt::Model>>;

    /// Add a prompt to the catalog.
    async fn insert(&self, model: prompt::Model) -> AppResult<prompt::Model>;
}

/// Prompt repository for database operations.
#[derive(Clone)]
pub struct PromptRepository {
    db: Arc<DatabaseConnection>,
}

impl PromptRepository {
    /// Create a new prompt repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PromptStore for PromptRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<prompt::Model>> {
        Prompt::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_active(
        &self,
        content_type: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<prompt::Model>> {
        let mut query = Prompt::find().filter(prompt::Column::IsActive.eq(true));

        if let Some(content_type) = content_type {
            query = query.filter(prompt::Column::ContentType.eq(content_type));
        }

        query
            .order_by_desc(prompt::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert(&self, model: prompt::Model) -> AppResult<prompt::Model> {
        prompt::ActiveModel {
            id: Set(model.id),
            title: Set(model.title),
            description: Set(model.description),
            content_type: Set(model.content_type),
            is_active: Set(model.is_active),
            created_at: Set(model.created_at),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_prompt(id: &str, content_type: &str) -> prompt::Model {
        prompt::Model {
            id: id.to_string(),
            title: "Night market".to_string(),
            description: "Capture the light of a night market".to_string(),
            content_type: content_type.to_string(),
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let prompt = create_test_prompt("p1", "photography");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[prompt]])
                .into_connection(),
        );

        let repo = PromptRepository::new(db);
        let result = repo.find_by_id("p1").await.unwrap();

        assert_eq!(result.unwrap().content_type, "photography");
    }

    #[tokio::test]
    async fn test_list_active_by_content_type() {
        let p1 = create_test_prompt("p1", "writing");
        let p2 = create_test_prompt("p2", "writing");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PromptRepository::new(db);
        let result = repo.list_active(Some("writing"), 10).await.unwrap();

        assert_eq!(result.len(), 2);
    }
}
