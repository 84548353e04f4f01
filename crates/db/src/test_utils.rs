//! Test utilities for database operations.
//!
//! A throwaway migrated `PostgreSQL` database for the ignored integration
//! suites, plus row fixtures shared by those suites and the mock tests.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::competition::{CompetitionKind, CompetitionStatus};
use crate::entities::{competition, competition_entry, prompt};
use crate::migrations::Migrator;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Name of the database the suite connects to.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "arena_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "arena_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "arena_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// URL of the configured database.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the maintenance database used to create and drop test databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }

    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated database private to one test.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
    config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the configured database as is.
    pub async fn connect(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Ok(Self {
            conn: Arc::new(conn),
            config,
        })
    }

    /// Create a uniquely named database and apply every migration to it.
    pub async fn migrated() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("arena_test_{}", &suffix[..12]);

        let admin = Database::connect(&config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        admin.close().await?;

        let db = Self::connect(config).await?;
        Migrator::up(db.conn.as_ref(), None).await?;
        info!(database = %db.config.database, "Created migrated test database");
        Ok(db)
    }

    /// Shared handle for constructing repositories.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        self.conn.clone()
    }

    #[must_use]
    pub const fn config(&self) -> &TestDbConfig {
        &self.config
    }

    /// Insert the prompt every fixture competition points at.
    pub async fn seed_prompt(&self) -> Result<prompt::Model, DbErr> {
        use sea_orm::{ActiveModelTrait, IntoActiveModel};
        prompt_row().into_active_model().insert(self.conn.as_ref()).await
    }

    /// Insert an ACTIVE direct match between alice and bob with a draft
    /// entry for each of them (`e1` for alice, `e2` for bob).
    pub async fn seed_active_match(&self, id: &str) -> Result<competition::Model, DbErr> {
        use sea_orm::{ActiveModelTrait, IntoActiveModel};

        let mut row = competition_row(id, CompetitionKind::DirectMatch, CompetitionStatus::Active);
        row.participant2_id = Some("bob".to_string());
        row.started_at = Some(Utc::now().into());
        let competition = row.into_active_model().insert(self.conn.as_ref()).await?;

        for (entry_id, user) in [("e1", "alice"), ("e2", "bob")] {
            entry_row(entry_id, id, user)
                .into_active_model()
                .insert(self.conn.as_ref())
                .await?;
        }
        Ok(competition)
    }

    /// Drop the database. Other handles from [`Self::shared`] are cut off.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        if let Ok(conn) = Arc::try_unwrap(self.conn) {
            conn.close().await?;
        }

        let admin = Database::connect(&self.config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
                    self.config.database
                ),
            ))
            .await
            .ok();
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\"", self.config.database),
            ))
            .await?;
        admin.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}

/// An active writing prompt with id `p1`.
#[must_use]
pub fn prompt_row() -> prompt::Model {
    prompt::Model {
        id: "p1".to_string(),
        title: "Tidepools".to_string(),
        description: "Something small living in a large place".to_string(),
        content_type: "writing".to_string(),
        is_active: true,
        created_at: Utc::now().into(),
    }
}

/// A competition on prompt `p1` created by alice, who holds slot 1.
#[must_use]
pub fn competition_row(
    id: &str,
    kind: CompetitionKind,
    status: CompetitionStatus,
) -> competition::Model {
    competition::Model {
        id: id.to_string(),
        kind,
        title: "Tidepools".to_string(),
        content_type: "writing".to_string(),
        prompt_id: "p1".to_string(),
        status,
        creator_id: "alice".to_string(),
        participant1_id: Some("alice".to_string()),
        participant2_id: None,
        winner_id: None,
        participant1_votes: 0,
        participant2_votes: 0,
        total_votes: 0,
        skill_tier: 1,
        submission_hours: 72,
        voting_hours: 48,
        max_winners: 1,
        submission_deadline: None,
        voting_deadline: None,
        started_at: None,
        completed_at: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// A draft entry.
#[must_use]
pub fn entry_row(id: &str, competition_id: &str, user_id: &str) -> competition_entry::Model {
    competition_entry::Model {
        id: id.to_string(),
        competition_id: competition_id.to_string(),
        user_id: user_id.to_string(),
        title: "Anemone".to_string(),
        description: Some("It waited for the tide".to_string()),
        media_url: None,
        vote_count: 0,
        submitted_at: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}
