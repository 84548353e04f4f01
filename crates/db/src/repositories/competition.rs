//! Competition repository.

use std::sync::Arc;

use arena_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    prelude::DateTimeWithTimeZone,
};

use super::{Inserted, is_unique_violation};
use crate::entities::competition::{CompetitionKind, CompetitionStatus, Slot};
use crate::entities::{Competition, CompetitionParticipant, competition, competition_participant};

/// Filter for matchmaking candidates.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    pub content_type: &'a str,
    pub prompt_id: &'a str,
    pub skill_tier: i32,
    /// The joining user; their own waiting competitions are never candidates.
    pub exclude_user_id: &'a str,
    pub limit: u64,
}

/// A guarded status change.
///
/// The write only happens while the stored status is one of `from` (and,
/// when set, while `total_votes` still equals `expected_total_votes`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub from: Vec<CompetitionStatus>,
    pub to: CompetitionStatus,
    pub at: DateTime<Utc>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub voting_deadline: Option<DateTime<Utc>>,
    pub winner_id: Option<String>,
    pub expected_total_votes: Option<i32>,
}

impl StatusUpdate {
    /// A transition from any of `from` to `to` at time `at`.
    #[must_use]
    pub fn new(
        from: impl IntoIterator<Item = CompetitionStatus>,
        to: CompetitionStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            from: from.into_iter().collect(),
            to,
            at,
            submission_deadline: None,
            voting_deadline: None,
            winner_id: None,
            expected_total_votes: None,
        }
    }

    #[must_use]
    pub const fn with_submission_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.submission_deadline = Some(deadline);
        self
    }

    #[must_use]
    pub const fn with_voting_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.voting_deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_winner(mut self, winner_id: Option<String>) -> Self {
        self.winner_id = winner_id;
        self
    }

    #[must_use]
    pub const fn expecting_total_votes(mut self, total: i32) -> Self {
        self.expected_total_votes = Some(total);
        self
    }

    /// Whether the update's guard admits a row in `status` with `total_votes`.
    #[must_use]
    pub fn admits(&self, status: CompetitionStatus, total_votes: i32) -> bool {
        self.from.contains(&status)
            && self
                .expected_total_votes
                .is_none_or(|expected| expected == total_votes)
    }

    /// Apply the change to an in-memory row.
    pub fn apply_to(&self, model: &mut competition::Model) {
        let at: DateTimeWithTimeZone = self.at.into();
        model.status = self.to;
        model.updated_at = Some(at);
        if self.to.accepts_submissions() {
            model.started_at = Some(at);
        }
        if self.to.is_terminal() {
            model.completed_at = Some(at);
        }
        if let Some(deadline) = self.submission_deadline {
            model.submission_deadline = Some(deadline.into());
        }
        if let Some(deadline) = self.voting_deadline {
            model.voting_deadline = Some(deadline.into());
        }
        if let Some(winner_id) = &self.winner_id {
            model.winner_id = Some(winner_id.clone());
        }
    }
}

/// Storage for the competition aggregate and open-competition enrollment.
#[async_trait]
pub trait CompetitionStore: Send + Sync {
    /// Find a competition by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition::Model>>;

    /// Get a competition by ID, returning error if not found.
    async fn get_by_id(&self, id: &str) -> AppResult<competition::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Competition not found: {id}")))
    }

    /// Create a new competition.
    async fn insert(&self, model: competition::Model) -> AppResult<competition::Model>;

    /// Waiting queue matches for a joining user, oldest first.
    async fn find_match_candidates(
        &self,
        query: &MatchQuery<'_>,
    ) -> AppResult<Vec<competition::Model>>;

    /// The user's own waiting queue match for a prompt, if any.
    async fn find_waiting_by_creator(
        &self,
        creator_id: &str,
        content_type: &str,
        prompt_id: &str,
    ) -> AppResult<Option<competition::Model>>;

    /// Take the open second slot of a pending queue match and start it.
    ///
    /// Returns `false` when someone else got there first.
    async fn claim_opponent(
        &self,
        id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
        submission_deadline: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Put `user_id` into an empty slot of a competition still being set up.
    /// Fails if `user_id` already holds the other slot.
    async fn assign_slot(&self, id: &str, slot: Slot, user_id: &str) -> AppResult<bool>;

    /// Empty a slot still held by `user_id` in a competition being set up.
    async fn release_slot(&self, id: &str, slot: Slot, user_id: &str) -> AppResult<bool>;

    /// Apply a guarded status change. Returns `false` when the guard failed.
    async fn transition(&self, id: &str, update: &StatusUpdate) -> AppResult<bool>;

    /// Active 1-on-1 competitions whose submission deadline has passed.
    async fn find_submission_expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition::Model>>;

    /// Competitions in voting whose voting deadline has passed.
    async fn find_voting_expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition::Model>>;

    /// Competitions the user takes part in, newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<competition::Model>>;

    /// Enroll a user in an open competition.
    async fn enroll(
        &self,
        participant: competition_participant::Model,
    ) -> AppResult<Inserted<competition_participant::Model>>;

    /// Whether the user is enrolled in an open competition.
    async fn is_enrolled(&self, competition_id: &str, user_id: &str) -> AppResult<bool>;

    /// Enrolled users of an open competition in join order.
    async fn list_enrolled(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_participant::Model>>;
}

/// Competition repository for database operations.
#[derive(Clone)]
pub struct CompetitionRepository {
    db: Arc<DatabaseConnection>,
}

impl CompetitionRepository {
    /// Create a new competition repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    const fn slot_column(slot: Slot) -> competition::Column {
        match slot {
            Slot::First => competition::Column::Participant1Id,
            Slot::Second => competition::Column::Participant2Id,
        }
    }

    fn setup_statuses() -> [String; 2] {
        [
            CompetitionStatus::Draft.to_value(),
            CompetitionStatus::Inviting.to_value(),
        ]
    }
}

#[async_trait]
impl CompetitionStore for CompetitionRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition::Model>> {
        Competition::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert(&self, model: competition::Model) -> AppResult<competition::Model> {
        competition::ActiveModel {
            id: Set(model.id),
            kind: Set(model.kind),
            title: Set(model.title),
            content_type: Set(model.content_type),
            prompt_id: Set(model.prompt_id),
            status: Set(model.status),
            creator_id: Set(model.creator_id),
            participant1_id: Set(model.participant1_id),
            participant2_id: Set(model.participant2_id),
            winner_id: Set(model.winner_id),
            participant1_votes: Set(model.participant1_votes),
            participant2_votes: Set(model.participant2_votes),
            total_votes: Set(model.total_votes),
            skill_tier: Set(model.skill_tier),
            submission_hours: Set(model.submission_hours),
            voting_hours: Set(model.voting_hours),
            max_winners: Set(model.max_winners),
            submission_deadline: Set(model.submission_deadline),
            voting_deadline: Set(model.voting_deadline),
            started_at: Set(model.started_at),
            completed_at: Set(model.completed_at),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_match_candidates(
        &self,
        query: &MatchQuery<'_>,
    ) -> AppResult<Vec<competition::Model>> {
        Competition::find()
            .filter(competition::Column::Status.eq(CompetitionStatus::Pending))
            .filter(competition::Column::Kind.eq(CompetitionKind::DirectMatch))
            .filter(competition::Column::ContentType.eq(query.content_type))
            .filter(competition::Column::PromptId.eq(query.prompt_id))
            .filter(competition::Column::SkillTier.eq(query.skill_tier))
            .filter(competition::Column::Participant2Id.is_null())
            .filter(competition::Column::CreatorId.ne(query.exclude_user_id))
            .order_by_asc(competition::Column::CreatedAt)
            .order_by_asc(competition::Column::Id)
            .limit(query.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_waiting_by_creator(
        &self,
        creator_id: &str,
        content_type: &str,
        prompt_id: &str,
    ) -> AppResult<Option<competition::Model>> {
        Competition::find()
            .filter(competition::Column::Status.eq(CompetitionStatus::Pending))
            .filter(competition::Column::Kind.eq(CompetitionKind::DirectMatch))
            .filter(competition::Column::CreatorId.eq(creator_id))
            .filter(competition::Column::ContentType.eq(content_type))
            .filter(competition::Column::PromptId.eq(prompt_id))
            .order_by_asc(competition::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn claim_opponent(
        &self,
        id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
        submission_deadline: DateTime<Utc>,
    ) -> AppResult<bool> {
        let started_at: DateTimeWithTimeZone = started_at.into();
        let deadline: DateTimeWithTimeZone = submission_deadline.into();

        let result = Competition::update_many()
            .col_expr(competition::Column::Participant2Id, Expr::value(user_id))
            .col_expr(
                competition::Column::Status,
                Expr::value(CompetitionStatus::Active.to_value()),
            )
            .col_expr(competition::Column::StartedAt, Expr::value(started_at))
            .col_expr(competition::Column::SubmissionDeadline, Expr::value(deadline))
            .col_expr(competition::Column::UpdatedAt, Expr::value(started_at))
            .filter(competition::Column::Id.eq(id))
            .filter(competition::Column::Status.eq(CompetitionStatus::Pending))
            .filter(competition::Column::Participant2Id.is_null())
            .filter(competition::Column::CreatorId.ne(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn assign_slot(&self, id: &str, slot: Slot, user_id: &str) -> AppResult<bool> {
        let column = Self::slot_column(slot);
        let other = Self::slot_column(slot.other());
        let result = Competition::update_many()
            .col_expr(column, Expr::value(user_id))
            .col_expr(competition::Column::UpdatedAt, Expr::value(DateTimeWithTimeZone::from(Utc::now())))
            .filter(competition::Column::Id.eq(id))
            .filter(column.is_null())
            .filter(Condition::any().add(other.is_null()).add(other.ne(user_id)))
            .filter(competition::Column::Status.is_in(Self::setup_statuses()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn release_slot(&self, id: &str, slot: Slot, user_id: &str) -> AppResult<bool> {
        let column = Self::slot_column(slot);
        let result = Competition::update_many()
            .col_expr(column, Expr::value(Option::<String>::None))
            .col_expr(competition::Column::UpdatedAt, Expr::value(DateTimeWithTimeZone::from(Utc::now())))
            .filter(competition::Column::Id.eq(id))
            .filter(column.eq(user_id))
            .filter(competition::Column::Status.is_in(Self::setup_statuses()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn transition(&self, id: &str, update: &StatusUpdate) -> AppResult<bool> {
        let at: DateTimeWithTimeZone = update.at.into();

        let mut query = Competition::update_many()
            .col_expr(competition::Column::Status, Expr::value(update.to.to_value()))
            .col_expr(competition::Column::UpdatedAt, Expr::value(at));

        if update.to.accepts_submissions() {
            query = query.col_expr(competition::Column::StartedAt, Expr::value(at));
        }
        if update.to.is_terminal() {
            query = query.col_expr(competition::Column::CompletedAt, Expr::value(at));
        }
        if let Some(deadline) = update.submission_deadline {
            query = query.col_expr(
                competition::Column::SubmissionDeadline,
                Expr::value(DateTimeWithTimeZone::from(deadline)),
            );
        }
        if let Some(deadline) = update.voting_deadline {
            query = query.col_expr(
                competition::Column::VotingDeadline,
                Expr::value(DateTimeWithTimeZone::from(deadline)),
            );
        }
        if let Some(winner_id) = &update.winner_id {
            query = query.col_expr(competition::Column::WinnerId, Expr::value(winner_id.clone()));
        }

        query = query
            .filter(competition::Column::Id.eq(id))
            .filter(
                competition::Column::Status
                    .is_in(update.from.iter().map(|status| status.to_value())),
            );
        if let Some(total) = update.expected_total_votes {
            query = query.filter(competition::Column::TotalVotes.eq(total));
        }

        let result = query
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn find_submission_expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition::Model>> {
        let now: DateTimeWithTimeZone = now.into();
        Competition::find()
            .filter(competition::Column::Status.eq(CompetitionStatus::Active))
            .filter(competition::Column::SubmissionDeadline.lt(now))
            .order_by_asc(competition::Column::SubmissionDeadline)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_voting_expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition::Model>> {
        let now: DateTimeWithTimeZone = now.into();
        Competition::find()
            .filter(competition::Column::Status.eq(CompetitionStatus::Voting))
            .filter(competition::Column::VotingDeadline.lt(now))
            .order_by_asc(competition::Column::VotingDeadline)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<competition::Model>> {
        let enrolled = Query::select()
            .column(competition_participant::Column::CompetitionId)
            .from(CompetitionParticipant)
            .and_where(competition_participant::Column::UserId.eq(user_id))
            .to_owned();

        Competition::find()
            .filter(
                Condition::any()
                    .add(competition::Column::Participant1Id.eq(user_id))
                    .add(competition::Column::Participant2Id.eq(user_id))
                    .add(competition::Column::Id.in_subquery(enrolled)),
            )
            .order_by_desc(competition::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn enroll(
        &self,
        participant: competition_participant::Model,
    ) -> AppResult<Inserted<competition_participant::Model>> {
        let result = competition_participant::ActiveModel {
            id: Set(participant.id),
            competition_id: Set(participant.competition_id),
            user_id: Set(participant.user_id),
            joined_at: Set(participant.joined_at),
        }
        .insert(self.db.as_ref())
        .await;

        match result {
            Ok(model) => Ok(Inserted::Created(model)),
            Err(e) if is_unique_violation(&e) => Ok(Inserted::Duplicate),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn is_enrolled(&self, competition_id: &str, user_id: &str) -> AppResult<bool> {
        let count = CompetitionParticipant::find()
            .filter(competition_participant::Column::CompetitionId.eq(competition_id))
            .filter(competition_participant::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn list_enrolled(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_participant::Model>> {
        CompetitionParticipant::find()
            .filter(competition_participant::Column::CompetitionId.eq(competition_id))
            .order_by_asc(competition_participant::Column::JoinedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_competition(id: &str, creator_id: &str) -> competition::Model {
        competition::Model {
            id: id.to_string(),
            kind: CompetitionKind::DirectMatch,
            title: "Quick match".to_string(),
            content_type: "writing".to_string(),
            prompt_id: "prompt1".to_string(),
            status: CompetitionStatus::Pending,
            creator_id: creator_id.to_string(),
            participant1_id: Some(creator_id.to_string()),
            participant2_id: None,
            winner_id: None,
            participant1_votes: 0,
            participant2_votes: 0,
            total_votes: 0,
            skill_tier: 2,
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

    fn exec_result(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_find_match_candidates() {
        let c1 = create_test_competition("c1", "alice");
        let c2 = create_test_competition("c2", "bob");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[c1, c2]])
                .into_connection(),
        );

        let repo = CompetitionRepository::new(db);
        let query = MatchQuery {
            content_type: "writing",
            prompt_id: "prompt1",
            skill_tier: 2,
            exclude_user_id: "carol",
            limit: 5,
        };
        let result = repo.find_match_candidates(&query).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "c1");
    }

    #[tokio::test]
    async fn test_claim_opponent_wins_slot() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(1)])
                .into_connection(),
        );

        let repo = CompetitionRepository::new(db);
        let now = Utc::now();
        let claimed = repo
            .claim_opponent("c1", "bob", now, now + Duration::hours(72))
            .await
            .unwrap();

        assert!(claimed);
    }

    #[tokio::test]
    async fn test_claim_opponent_lost_race() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(0)])
                .into_connection(),
        );

        let repo = CompetitionRepository::new(db);
        let now = Utc::now();
        let claimed = repo
            .claim_opponent("c1", "bob", now, now + Duration::hours(72))
            .await
            .unwrap();

        assert!(!claimed);
    }

    #[tokio::test]
    async fn test_assign_slot_guards_other_slot() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(0)])
                .into_connection(),
        );

        let repo = CompetitionRepository::new(db.clone());
        assert!(!repo.assign_slot("c1", Slot::Second, "alice").await.unwrap());
        drop(repo);

        let log = format!("{:?}", Arc::try_unwrap(db).unwrap().into_transaction_log());
        // the second-slot write also checks who holds the first slot
        assert!(log.contains("participant1_id"));
        assert!(log.contains("IS NULL OR"));
    }

    #[tokio::test]
    async fn test_transition_guard_failed() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(0)])
                .into_connection(),
        );

        let repo = CompetitionRepository::new(db);
        let update = StatusUpdate::new(
            [CompetitionStatus::Voting],
            CompetitionStatus::Completed,
            Utc::now(),
        )
        .with_winner(Some("alice".to_string()))
        .expecting_total_votes(10);

        assert!(!repo.transition("c1", &update).await.unwrap());
    }

    #[test]
    fn test_status_update_apply_to() {
        let mut model = create_test_competition("c1", "alice");
        model.status = CompetitionStatus::Voting;
        model.total_votes = 4;
        let update = StatusUpdate::new(
            [CompetitionStatus::Voting],
            CompetitionStatus::Completed,
            Utc::now(),
        )
        .with_winner(Some("alice".to_string()))
        .expecting_total_votes(4);

        assert!(update.admits(model.status, model.total_votes));
        assert!(!update.admits(model.status, 5));
        update.apply_to(&mut model);

        assert_eq!(model.status, CompetitionStatus::Completed);
        assert_eq!(model.winner_id.as_deref(), Some("alice"));
        assert!(model.completed_at.is_some());
    }
}
