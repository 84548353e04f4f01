//! In-memory store for engine tests.
//!
//! Implements every store trait over one mutex-guarded state, applying the
//! same guards the SQL repositories express in their `WHERE` clauses and
//! unique indexes, so race-sensitive engine logic can be exercised without
//! a database.

use std::collections::BTreeMap;

use arena_common::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use tokio::sync::Mutex;

use crate::entities::competition::{CompetitionKind, CompetitionStatus, Slot};
use crate::entities::competition_invitation::InvitationStatus;
use crate::entities::{
    competition, competition_entry, competition_invitation, competition_participant,
    competition_vote, prompt, reward_grant, user_competition_stats,
};
use crate::repositories::{
    CastOutcome, CompetitionStore, EntryContent, EntryStore, FinalizedEntry, Inserted,
    InvitationStore, MatchOutcome, MatchQuery, PromptStore, StatsStore, StatusUpdate,
    StreakChange, VoteStore,
};

#[derive(Debug, Default)]
struct State {
    prompts: BTreeMap<String, prompt::Model>,
    competitions: BTreeMap<String, competition::Model>,
    participants: Vec<competition_participant::Model>,
    entries: BTreeMap<String, competition_entry::Model>,
    votes: Vec<competition_vote::Model>,
    invitations: BTreeMap<String, competition_invitation::Model>,
    stats: BTreeMap<String, user_competition_stats::Model>,
    grants: Vec<reward_grant::Model>,
}

impl State {
    fn stats_row(&mut self, user_id: &str, now: DateTimeWithTimeZone) -> &mut user_competition_stats::Model {
        self.stats
            .entry(user_id.to_string())
            .or_insert_with(|| user_competition_stats::Model {
                user_id: user_id.to_string(),
                points: 0,
                wins: 0,
                losses: 0,
                draws: 0,
                current_streak: 0,
                best_streak: 0,
                votes_cast: 0,
                updated_at: now,
            })
    }

    fn submitted_count(&self, competition_id: &str) -> u64 {
        self.entries
            .values()
            .filter(|e| e.competition_id == competition_id && e.is_submitted())
            .count() as u64
    }
}

fn at(time: DateTime<Utc>) -> DateTimeWithTimeZone {
    time.into()
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a competition row.
    pub async fn competition(&self, id: &str) -> Option<competition::Model> {
        self.state.lock().await.competitions.get(id).cloned()
    }

    /// Edit a competition row directly, e.g. to move a deadline into the past.
    pub async fn update_competition(&self, id: &str, f: impl FnOnce(&mut competition::Model)) {
        if let Some(model) = self.state.lock().await.competitions.get_mut(id) {
            f(model);
        }
    }

    /// Edit an invitation row directly.
    pub async fn update_invitation(
        &self,
        id: &str,
        f: impl FnOnce(&mut competition_invitation::Model),
    ) {
        if let Some(model) = self.state.lock().await.invitations.get_mut(id) {
            f(model);
        }
    }

    /// All votes of a competition.
    pub async fn votes(&self, competition_id: &str) -> Vec<competition_vote::Model> {
        self.state
            .lock()
            .await
            .votes
            .iter()
            .filter(|v| v.competition_id == competition_id)
            .cloned()
            .collect()
    }

    /// All grants issued to a user.
    pub async fn grants_for(&self, user_id: &str) -> Vec<reward_grant::Model> {
        self.state
            .lock()
            .await
            .grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<prompt::Model>> {
        Ok(self.state.lock().await.prompts.get(id).cloned())
    }

    async fn list_active(
        &self,
        content_type: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<prompt::Model>> {
        let state = self.state.lock().await;
        let mut prompts: Vec<_> = state
            .prompts
            .values()
            .filter(|p| p.is_active)
            .filter(|p| content_type.is_none_or(|ct| p.content_type == ct))
            .cloned()
            .collect();
        prompts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        prompts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(prompts)
    }

    async fn insert(&self, model: prompt::Model) -> AppResult<prompt::Model> {
        self.state
            .lock()
            .await
            .prompts
            .insert(model.id.clone(), model.clone());
        Ok(model)
    }
}

#[async_trait]
impl CompetitionStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition::Model>> {
        Ok(self.state.lock().await.competitions.get(id).cloned())
    }

    async fn insert(&self, model: competition::Model) -> AppResult<competition::Model> {
        self.state
            .lock()
            .await
            .competitions
            .insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn find_match_candidates(
        &self,
        query: &MatchQuery<'_>,
    ) -> AppResult<Vec<competition::Model>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<_> = state
            .competitions
            .values()
            .filter(|c| {
                c.status == CompetitionStatus::Pending
                    && c.kind == CompetitionKind::DirectMatch
                    && c.content_type == query.content_type
                    && c.prompt_id == query.prompt_id
                    && c.skill_tier == query.skill_tier
                    && c.participant2_id.is_none()
                    && c.creator_id != query.exclude_user_id
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        candidates.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));
        Ok(candidates)
    }

    async fn find_waiting_by_creator(
        &self,
        creator_id: &str,
        content_type: &str,
        prompt_id: &str,
    ) -> AppResult<Option<competition::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .competitions
            .values()
            .filter(|c| {
                c.status == CompetitionStatus::Pending
                    && c.kind == CompetitionKind::DirectMatch
                    && c.creator_id == creator_id
                    && c.content_type == content_type
                    && c.prompt_id == prompt_id
            })
            .min_by_key(|c| c.created_at)
            .cloned())
    }

    async fn claim_opponent(
        &self,
        id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
        submission_deadline: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(model) = state.competitions.get_mut(id) else {
            return Ok(false);
        };
        if model.status != CompetitionStatus::Pending
            || model.participant2_id.is_some()
            || model.creator_id == user_id
        {
            return Ok(false);
        }
        model.participant2_id = Some(user_id.to_string());
        model.status = CompetitionStatus::Active;
        model.started_at = Some(at(started_at));
        model.submission_deadline = Some(at(submission_deadline));
        model.updated_at = Some(at(started_at));
        Ok(true)
    }

    async fn assign_slot(&self, id: &str, slot: Slot, user_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(model) = state.competitions.get_mut(id) else {
            return Ok(false);
        };
        if !matches!(
            model.status,
            CompetitionStatus::Draft | CompetitionStatus::Inviting
        ) {
            return Ok(false);
        }
        if model.participant(slot.other()) == Some(user_id) {
            return Ok(false);
        }
        let target = match slot {
            Slot::First => &mut model.participant1_id,
            Slot::Second => &mut model.participant2_id,
        };
        if target.is_some() {
            return Ok(false);
        }
        *target = Some(user_id.to_string());
        model.updated_at = Some(at(Utc::now()));
        Ok(true)
    }

    async fn release_slot(&self, id: &str, slot: Slot, user_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(model) = state.competitions.get_mut(id) else {
            return Ok(false);
        };
        if !matches!(
            model.status,
            CompetitionStatus::Draft | CompetitionStatus::Inviting
        ) {
            return Ok(false);
        }
        let target = match slot {
            Slot::First => &mut model.participant1_id,
            Slot::Second => &mut model.participant2_id,
        };
        if target.as_deref() != Some(user_id) {
            return Ok(false);
        }
        *target = None;
        model.updated_at = Some(at(Utc::now()));
        Ok(true)
    }

    async fn transition(&self, id: &str, update: &StatusUpdate) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(model) = state.competitions.get_mut(id) else {
            return Ok(false);
        };
        if !update.admits(model.status, model.total_votes) {
            return Ok(false);
        }
        update.apply_to(model);
        Ok(true)
    }

    async fn find_submission_expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition::Model>> {
        let state = self.state.lock().await;
        let mut expired: Vec<_> = state
            .competitions
            .values()
            .filter(|c| {
                c.status == CompetitionStatus::Active
                    && c.submission_deadline.is_some_and(|d| d < at(now))
            })
            .cloned()
            .collect();
        expired.sort_by_key(|c| c.submission_deadline);
        expired.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(expired)
    }

    async fn find_voting_expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition::Model>> {
        let state = self.state.lock().await;
        let mut expired: Vec<_> = state
            .competitions
            .values()
            .filter(|c| {
                c.status == CompetitionStatus::Voting
                    && c.voting_deadline.is_some_and(|d| d < at(now))
            })
            .cloned()
            .collect();
        expired.sort_by_key(|c| c.voting_deadline);
        expired.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(expired)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<competition::Model>> {
        let state = self.state.lock().await;
        let mut competitions: Vec<_> = state
            .competitions
            .values()
            .filter(|c| {
                c.slot_of(user_id).is_some()
                    || state
                        .participants
                        .iter()
                        .any(|p| p.competition_id == c.id && p.user_id == user_id)
            })
            .cloned()
            .collect();
        competitions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(competitions
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn enroll(
        &self,
        participant: competition_participant::Model,
    ) -> AppResult<Inserted<competition_participant::Model>> {
        let mut state = self.state.lock().await;
        let duplicate = state.participants.iter().any(|p| {
            p.competition_id == participant.competition_id && p.user_id == participant.user_id
        });
        if duplicate {
            return Ok(Inserted::Duplicate);
        }
        state.participants.push(participant.clone());
        Ok(Inserted::Created(participant))
    }

    async fn is_enrolled(&self, competition_id: &str, user_id: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .participants
            .iter()
            .any(|p| p.competition_id == competition_id && p.user_id == user_id))
    }

    async fn list_enrolled(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_participant::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .participants
            .iter()
            .filter(|p| p.competition_id == competition_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition_entry::Model>> {
        Ok(self.state.lock().await.entries.get(id).cloned())
    }

    async fn find_by_participant(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> AppResult<Option<competition_entry::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .find(|e| e.competition_id == competition_id && e.user_id == user_id)
            .cloned())
    }

    async fn insert(
        &self,
        model: competition_entry::Model,
    ) -> AppResult<Inserted<competition_entry::Model>> {
        let mut state = self.state.lock().await;
        let duplicate = state
            .entries
            .values()
            .any(|e| e.competition_id == model.competition_id && e.user_id == model.user_id);
        if duplicate {
            return Ok(Inserted::Duplicate);
        }
        state.entries.insert(model.id.clone(), model.clone());
        Ok(Inserted::Created(model))
    }

    async fn update_draft(
        &self,
        id: &str,
        content: &EntryContent,
        now: DateTime<Utc>,
    ) -> AppResult<Option<competition_entry::Model>> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get_mut(id) else {
            return Ok(None);
        };
        if entry.is_submitted() {
            return Ok(None);
        }
        entry.title.clone_from(&content.title);
        entry.description.clone_from(&content.description);
        entry.media_url.clone_from(&content.media_url);
        entry.updated_at = Some(at(now));
        Ok(Some(entry.clone()))
    }

    async fn finalize(
        &self,
        id: &str,
        competition_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FinalizedEntry>> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get_mut(id) else {
            return Ok(None);
        };
        if entry.competition_id != competition_id || entry.is_submitted() {
            return Ok(None);
        }
        entry.submitted_at = Some(at(now));
        entry.updated_at = Some(at(now));
        let entry = entry.clone();
        let submitted_count = state.submitted_count(competition_id);
        Ok(Some(FinalizedEntry {
            entry,
            submitted_count,
        }))
    }

    async fn list_by_competition(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_entry::Model>> {
        let state = self.state.lock().await;
        let mut entries: Vec<_> = state
            .entries
            .values()
            .filter(|e| e.competition_id == competition_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(entries)
    }

    async fn count_submitted(&self, competition_id: &str) -> AppResult<u64> {
        Ok(self.state.lock().await.submitted_count(competition_id))
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn cast(
        &self,
        vote: competition_vote::Model,
        slot: Option<Slot>,
    ) -> AppResult<CastOutcome> {
        let mut state = self.state.lock().await;
        let voting = state
            .competitions
            .get(&vote.competition_id)
            .is_some_and(|c| c.status == CompetitionStatus::Voting);
        if !voting {
            return Ok(CastOutcome::Closed);
        }
        let duplicate = state
            .votes
            .iter()
            .any(|v| v.competition_id == vote.competition_id && v.voter_id == vote.voter_id);
        if duplicate {
            return Ok(CastOutcome::AlreadyVoted);
        }

        if let Some(model) = state.competitions.get_mut(&vote.competition_id) {
            model.total_votes += 1;
            match slot {
                Some(Slot::First) => model.participant1_votes += 1,
                Some(Slot::Second) => model.participant2_votes += 1,
                None => {}
            }
        }
        if let Some(entry) = state.entries.get_mut(&vote.entry_id) {
            entry.vote_count += 1;
        }
        state.votes.push(vote.clone());
        Ok(CastOutcome::Cast(vote))
    }

    async fn find_by_voter(
        &self,
        competition_id: &str,
        voter_id: &str,
    ) -> AppResult<Option<competition_vote::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .find(|v| v.competition_id == competition_id && v.voter_id == voter_id)
            .cloned())
    }
}

#[async_trait]
impl InvitationStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<competition_invitation::Model>> {
        Ok(self.state.lock().await.invitations.get(id).cloned())
    }

    async fn insert(
        &self,
        model: competition_invitation::Model,
    ) -> AppResult<Inserted<competition_invitation::Model>> {
        let mut state = self.state.lock().await;
        let slot_taken = model.status.holds_slot()
            && state.invitations.values().any(|i| {
                i.competition_id == model.competition_id
                    && i.slot == model.slot
                    && i.status.holds_slot()
            });
        if slot_taken {
            return Ok(Inserted::Duplicate);
        }
        state.invitations.insert(model.id.clone(), model.clone());
        Ok(Inserted::Created(model))
    }

    async fn find_live_for_slot(
        &self,
        competition_id: &str,
        slot: Slot,
    ) -> AppResult<Option<competition_invitation::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .invitations
            .values()
            .find(|i| i.competition_id == competition_id && i.slot == slot && i.status.holds_slot())
            .cloned())
    }

    async fn find_pending_for_invitee(
        &self,
        competition_id: &str,
        invitee_id: &str,
    ) -> AppResult<Option<competition_invitation::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .invitations
            .values()
            .find(|i| {
                i.competition_id == competition_id
                    && i.invitee_id == invitee_id
                    && i.status == InvitationStatus::Pending
            })
            .cloned())
    }

    async fn list_by_competition(
        &self,
        competition_id: &str,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        let state = self.state.lock().await;
        let mut invitations: Vec<_> = state
            .invitations
            .values()
            .filter(|i| i.competition_id == competition_id)
            .cloned()
            .collect();
        invitations.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(invitations)
    }

    async fn list_pending_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        let state = self.state.lock().await;
        let mut invitations: Vec<_> = state
            .invitations
            .values()
            .filter(|i| {
                i.invitee_id == user_id
                    && i.status == InvitationStatus::Pending
                    && i.expires_at > at(now)
            })
            .cloned()
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    async fn update_status(
        &self,
        id: &str,
        from: InvitationStatus,
        to: InvitationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(invitation) = state.invitations.get_mut(id) else {
            return Ok(false);
        };
        if invitation.status != from {
            return Ok(false);
        }
        invitation.status = to;
        invitation.updated_at = Some(at(now));
        if matches!(to, InvitationStatus::Accepted | InvitationStatus::Declined) {
            invitation.responded_at = Some(at(now));
        }
        Ok(true)
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<competition_invitation::Model>> {
        let state = self.state.lock().await;
        let mut expired: Vec<_> = state
            .invitations
            .values()
            .filter(|i| i.status == InvitationStatus::Pending && i.expires_at <= at(now))
            .cloned()
            .collect();
        expired.sort_by_key(|i| i.expires_at);
        expired.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(expired)
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn find_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Option<user_competition_stats::Model>> {
        Ok(self.state.lock().await.stats.get(user_id).cloned())
    }

    async fn record_grant(
        &self,
        grant: reward_grant::Model,
    ) -> AppResult<Inserted<reward_grant::Model>> {
        let mut state = self.state.lock().await;
        let duplicate = state.grants.iter().any(|g| {
            g.user_id == grant.user_id
                && g.competition_id == grant.competition_id
                && g.reason == grant.reason
        });
        if duplicate {
            return Ok(Inserted::Duplicate);
        }
        let row = state.stats_row(&grant.user_id, grant.created_at);
        row.points += grant.points;
        row.updated_at = grant.created_at;
        state.grants.push(grant.clone());
        Ok(Inserted::Created(grant))
    }

    async fn apply_streak(
        &self,
        user_id: &str,
        change: StreakChange,
        now: DateTime<Utc>,
    ) -> AppResult<user_competition_stats::Model> {
        let mut state = self.state.lock().await;
        let row = state.stats_row(user_id, at(now));
        match change {
            StreakChange::Extend => {
                row.current_streak += 1;
                row.best_streak = row.best_streak.max(row.current_streak);
            }
            StreakChange::Reset => row.current_streak = 0,
        }
        row.updated_at = at(now);
        Ok(row.clone())
    }

    async fn record_outcome(
        &self,
        user_id: &str,
        outcome: MatchOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let row = state.stats_row(user_id, at(now));
        match outcome {
            MatchOutcome::Win => row.wins += 1,
            MatchOutcome::Loss => row.losses += 1,
            MatchOutcome::Draw => row.draws += 1,
        }
        row.updated_at = at(now);
        Ok(())
    }

    async fn increment_votes_cast(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let row = state.stats_row(user_id, at(now));
        row.votes_cast += 1;
        row.updated_at = at(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pending_match(id: &str, creator_id: &str) -> competition::Model {
        competition::Model {
            id: id.to_string(),
            kind: CompetitionKind::DirectMatch,
            title: "Quick match".to_string(),
            content_type: "writing".to_string(),
            prompt_id: "p1".to_string(),
            status: CompetitionStatus::Pending,
            creator_id: creator_id.to_string(),
            participant1_id: Some(creator_id.to_string()),
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

    #[tokio::test]
    async fn test_claim_opponent_only_once() {
        let store = MemoryStore::new();
        CompetitionStore::insert(&store, pending_match("c1", "alice"))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.claim_opponent("c1", "bob", now, now).await.unwrap());
        assert!(!store.claim_opponent("c1", "carol", now, now).await.unwrap());

        let model = store.competition("c1").await.unwrap();
        assert_eq!(model.participant2_id.as_deref(), Some("bob"));
        assert_eq!(model.status, CompetitionStatus::Active);
    }

    #[tokio::test]
    async fn test_assign_slot_rejects_user_in_other_slot() {
        let store = MemoryStore::new();
        let mut draft = pending_match("c1", "admin");
        draft.kind = CompetitionKind::Curated1v1;
        draft.status = CompetitionStatus::Draft;
        draft.participant1_id = None;
        CompetitionStore::insert(&store, draft).await.unwrap();

        assert!(store.assign_slot("c1", Slot::First, "alice").await.unwrap());
        assert!(!store.assign_slot("c1", Slot::Second, "alice").await.unwrap());
        assert!(store.assign_slot("c1", Slot::Second, "bob").await.unwrap());

        let model = store.competition("c1").await.unwrap();
        assert_eq!(model.participant(Slot::First), Some("alice"));
        assert_eq!(model.participant(Slot::Second), Some("bob"));
    }

    #[tokio::test]
    async fn test_record_grant_is_idempotent() {
        let store = MemoryStore::new();
        let grant = reward_grant::Model {
            id: "g1".to_string(),
            user_id: "alice".to_string(),
            competition_id: "c1".to_string(),
            reason: "win".to_string(),
            points: 25,
            created_at: Utc::now().into(),
        };

        assert!(store.record_grant(grant.clone()).await.unwrap().created().is_some());
        let again = reward_grant::Model {
            id: "g2".to_string(),
            ..grant
        };
        assert_eq!(store.record_grant(again).await.unwrap(), Inserted::Duplicate);

        let stats = store.find_by_user("alice").await.unwrap().unwrap();
        assert_eq!(stats.points, 25);
    }
}
