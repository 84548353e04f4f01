//! End-to-end competition lifecycles against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;

use arena_common::{AppError, CompetitionConfig, RewardConfig};
use arena_core::{
    Actor, CompetitionEngine, CreateCompetitionInput, EntryInput, InviteInput, NoOpNotifier,
    StatsLedger, Stores, VoteStats,
};
use arena_db::entities::competition::{CompetitionKind, CompetitionStatus, Slot};
use arena_db::entities::prompt;
use arena_db::memory::MemoryStore;
use arena_db::repositories::PromptStore;
use chrono::Utc;
use maplit::hashmap;

const PROMPT: &str = "prompt-still-life";
const CONTENT_TYPE: &str = "photography";

async fn setup() -> (Arc<MemoryStore>, CompetitionEngine) {
    let store = Arc::new(MemoryStore::new());
    PromptStore::insert(
        &*store,
        prompt::Model {
            id: PROMPT.to_string(),
            title: "Still life".to_string(),
            description: "Arrange three objects in natural light".to_string(),
            content_type: CONTENT_TYPE.to_string(),
            is_active: true,
            created_at: Utc::now().into(),
        },
    )
    .await
    .unwrap();

    let engine = CompetitionEngine::new(
        Stores::shared(store.clone()),
        Arc::new(StatsLedger::new(store.clone())),
        Arc::new(NoOpNotifier),
        CompetitionConfig::default(),
        RewardConfig::default(),
    );
    (store, engine)
}

fn photo(user_id: &str) -> EntryInput {
    EntryInput {
        title: format!("{user_id}'s still life"),
        description: None,
        media_url: Some(format!("https://media.example.com/{user_id}.jpg")),
    }
}

async fn submit(engine: &CompetitionEngine, competition_id: &str, user_id: &str) -> String {
    engine
        .upsert_entry(competition_id, user_id, photo(user_id))
        .await
        .unwrap();
    engine
        .finalize_entry(competition_id, user_id)
        .await
        .unwrap()
        .id
}

async fn status_of(store: &MemoryStore, competition_id: &str) -> CompetitionStatus {
    store.competition(competition_id).await.unwrap().status
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joiners_have_one_winner() {
    let (store, engine) = setup().await;
    let waiting = engine
        .join_queue("host", CONTENT_TYPE, PROMPT, 2)
        .await
        .unwrap();

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.join_queue("left", CONTENT_TYPE, PROMPT, 2).await }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.join_queue("right", CONTENT_TYPE, PROMPT, 2).await }
    });
    let results = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

    let winners: Vec<_> = results.iter().filter(|c| c.id == waiting.id).collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find(|c| c.id != waiting.id).unwrap();
    assert_eq!(loser.status, CompetitionStatus::Pending);

    let matched = store.competition(&waiting.id).await.unwrap();
    assert_eq!(matched.status, CompetitionStatus::Active);
    assert!(matches!(matched.participant2_id.as_deref(), Some("left" | "right")));
}

#[tokio::test]
async fn test_one_on_one_lifecycle_moves_forward() {
    let (store, engine) = setup().await;
    let mut seen = Vec::new();

    let competition = engine
        .join_queue("alice", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    seen.push(competition.status);
    engine
        .join_queue("bob", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    seen.push(status_of(&store, &competition.id).await);

    let alices = submit(&engine, &competition.id, "alice").await;
    seen.push(status_of(&store, &competition.id).await);
    let bobs = submit(&engine, &competition.id, "bob").await;
    seen.push(status_of(&store, &competition.id).await);

    for n in 0..53 {
        engine
            .cast_vote(&competition.id, &format!("a-{n}"), &alices)
            .await
            .unwrap();
    }
    for n in 0..47 {
        engine
            .cast_vote(&competition.id, &format!("b-{n}"), &bobs)
            .await
            .unwrap();
    }
    let settlement = engine.settle(&competition.id).await.unwrap();
    seen.push(status_of(&store, &competition.id).await);

    assert_eq!(settlement.status, CompetitionStatus::Completed);
    assert_eq!(settlement.winner_id.as_deref(), Some("alice"));
    assert!(seen.windows(2).all(|w| w[0].rank() <= w[1].rank()));
    assert_eq!(seen.last(), Some(&CompetitionStatus::Completed));

    // nothing moves a settled competition
    let vote = engine.cast_vote(&competition.id, "late", &alices).await;
    assert!(matches!(vote, Err(AppError::InvalidState(_))));
    let cancel = engine
        .cancel_competition(&Actor::admin("admin"), &competition.id)
        .await;
    assert!(matches!(cancel, Err(AppError::InvalidState(_))));
    assert_eq!(status_of(&store, &competition.id).await, CompetitionStatus::Completed);
}

#[tokio::test]
async fn test_close_vote_is_draw() {
    let (store, engine) = setup().await;
    engine
        .join_queue("alice", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let competition = engine
        .join_queue("bob", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let alices = submit(&engine, &competition.id, "alice").await;
    let bobs = submit(&engine, &competition.id, "bob").await;

    for (entry, prefix, count) in [(&alices, "a", 52), (&bobs, "b", 48)] {
        for n in 0..count {
            engine
                .cast_vote(&competition.id, &format!("{prefix}-{n}"), entry)
                .await
                .unwrap();
        }
    }

    let settlement = engine.settle(&competition.id).await.unwrap();
    assert_eq!(settlement.status, CompetitionStatus::Draw);
    assert!(settlement.winner_id.is_none());

    for user_id in ["alice", "bob"] {
        let stats = engine.get_user_stats(user_id).await.unwrap();
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.points, 10);
        assert_eq!(stats.current_streak, 0);
    }
    assert!(store.competition(&competition.id).await.unwrap().winner_id.is_none());
}

#[tokio::test]
async fn test_tallies_match_vote_rows() {
    let (store, engine) = setup().await;
    engine
        .join_queue("alice", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let competition = engine
        .join_queue("bob", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let alices = submit(&engine, &competition.id, "alice").await;
    let bobs = submit(&engine, &competition.id, "bob").await;

    for n in 0..7 {
        let entry = if n % 3 == 0 { &bobs } else { &alices };
        engine
            .cast_vote(&competition.id, &format!("voter-{n}"), entry)
            .await
            .unwrap();
    }
    // rejected votes leave no trace
    let repeat = engine.cast_vote(&competition.id, "voter-0", &alices).await;
    assert!(matches!(repeat, Err(AppError::AlreadyVoted(_))));
    let own = engine.cast_vote(&competition.id, "bob", &alices).await;
    assert!(matches!(own, Err(AppError::Forbidden(_))));

    let rows = store.votes(&competition.id).await.len();
    let record = store.competition(&competition.id).await.unwrap();

    // per-entry counts are public once settled
    engine.settle(&competition.id).await.unwrap();
    let views = engine
        .list_entries(&competition.id, None)
        .await
        .unwrap();
    let per_entry: i32 = views.iter().map(|e| e.vote_count.unwrap()).sum();

    assert_eq!(rows, 7);
    assert_eq!(record.total_votes, 7);
    assert_eq!(record.participant1_votes + record.participant2_votes, 7);
    assert_eq!(per_entry, 7);
}

#[tokio::test]
async fn test_concurrent_settles_pay_once() {
    let (store, engine) = setup().await;
    engine
        .join_queue("alice", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let competition = engine
        .join_queue("bob", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let alices = submit(&engine, &competition.id, "alice").await;
    submit(&engine, &competition.id, "bob").await;
    engine
        .cast_vote(&competition.id, "carol", &alices)
        .await
        .unwrap();

    let (a, b) = tokio::join!(engine.settle(&competition.id), engine.settle(&competition.id));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.already_settled, b.already_settled);
    assert_eq!(a.winner_id, b.winner_id);

    let wins: Vec<_> = store
        .grants_for("alice")
        .await
        .into_iter()
        .filter(|g| g.reason == "win")
        .collect();
    assert_eq!(wins.len(), 1);
    assert_eq!(engine.get_user_stats("alice").await.unwrap().wins, 1);
}

#[tokio::test]
async fn test_blind_mode_until_both_submit() {
    let (_, engine) = setup().await;
    engine
        .join_queue("alice", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    let competition = engine
        .join_queue("bob", CONTENT_TYPE, PROMPT, 1)
        .await
        .unwrap();
    submit(&engine, &competition.id, "alice").await;

    let hidden = engine
        .list_entries(&competition.id, Some("bob"))
        .await
        .unwrap();
    let alices = hidden.iter().find(|e| e.user_id == "alice").unwrap();
    assert!(alices.title.is_none() && alices.media_url.is_none() && alices.description.is_none());

    submit(&engine, &competition.id, "bob").await;
    let visible = engine
        .list_entries(&competition.id, Some("bob"))
        .await
        .unwrap();
    let alices = visible.iter().find(|e| e.user_id == "alice").unwrap();
    assert_eq!(alices.media_url.as_deref(), Some("https://media.example.com/alice.jpg"));
    assert_eq!(
        engine.get_vote_stats(&competition.id).await.unwrap(),
        VoteStats::Hidden
    );
}

#[tokio::test]
async fn test_open_competition_placements() {
    let (store, engine) = setup().await;
    let admin = Actor::admin("curator");

    let input = CreateCompetitionInput {
        title: "Spring showcase".to_string(),
        content_type: CONTENT_TYPE.to_string(),
        prompt_id: PROMPT.to_string(),
        kind: CompetitionKind::CuratedOpen,
        submission_hours: Some(48),
        voting_hours: Some(48),
        challenged_user_id: None,
        message: None,
        skill_tier: None,
        max_winners: Some(3),
    };
    let competition = engine.create_competition(&admin, input).await.unwrap();
    engine
        .open_competition(&admin, &competition.id)
        .await
        .unwrap();

    let entrants = ["ana", "ben", "cho", "dev", "eli"];
    let mut entries = HashMap::new();
    for user_id in entrants {
        engine.join_open(user_id, &competition.id).await.unwrap();
        let entry_id = submit(&engine, &competition.id, user_id).await;
        entries.insert(user_id, entry_id);
    }
    // open competitions wait for an admin to close submissions
    assert_eq!(status_of(&store, &competition.id).await, CompetitionStatus::Open);

    let early = engine.cast_vote(&competition.id, "fan-0", &entries["ana"]).await;
    assert!(matches!(early, Err(AppError::InvalidState(_))));

    engine
        .close_submissions(&admin, &competition.id)
        .await
        .unwrap();

    let votes = hashmap! { "ana" => 10, "ben" => 8, "cho" => 8, "dev" => 5, "eli" => 2 };
    for (user_id, count) in &votes {
        for n in 0..*count {
            engine
                .cast_vote(&competition.id, &format!("{user_id}-fan-{n}"), &entries[user_id])
                .await
                .unwrap();
        }
    }

    let settlement = engine
        .complete_competition(&admin, &competition.id)
        .await
        .unwrap();
    assert_eq!(settlement.status, CompetitionStatus::Completed);
    assert_eq!(settlement.winner_id.as_deref(), Some("ana"));

    let expected = hashmap! {
        "ana" => ("placement_1", 50),
        "ben" => ("placement_2", 30),
        "cho" => ("placement_3", 20),
        "dev" => ("participation", 5),
        "eli" => ("participation", 5),
    };
    for (user_id, (reason, points)) in expected {
        let grants = store.grants_for(user_id).await;
        assert_eq!(grants.len(), 1, "{user_id}");
        assert_eq!(grants[0].reason, reason, "{user_id}");
        assert_eq!(grants[0].points, points, "{user_id}");
    }

    assert_eq!(engine.get_user_stats("ana").await.unwrap().current_streak, 1);
    assert_eq!(engine.get_user_stats("ben").await.unwrap().wins, 0);
    assert_eq!(
        engine.get_vote_stats(&competition.id).await.unwrap(),
        VoteStats::Revealed {
            participant1_votes: None,
            participant2_votes: None,
            total_votes: 33,
        }
    );
}

#[tokio::test]
async fn test_curated_one_on_one_through_invitations() {
    let (store, engine) = setup().await;
    let admin = Actor::admin("curator");

    let input = CreateCompetitionInput {
        title: "Invitational".to_string(),
        content_type: CONTENT_TYPE.to_string(),
        prompt_id: PROMPT.to_string(),
        kind: CompetitionKind::Curated1v1,
        submission_hours: None,
        voting_hours: None,
        challenged_user_id: None,
        message: None,
        skill_tier: None,
        max_winners: None,
    };
    let competition = engine.create_competition(&admin, input).await.unwrap();

    let mut invitations = Vec::new();
    for (user_id, slot) in [("ana", Slot::First), ("ben", Slot::Second)] {
        let invite = InviteInput {
            invitee_id: user_id.to_string(),
            slot,
            message: Some("You have been selected".to_string()),
        };
        invitations.push(
            engine
                .invite_participant(&admin, &competition.id, invite)
                .await
                .unwrap(),
        );
    }
    assert_eq!(engine.list_pending_invitations("ana").await.unwrap().len(), 1);

    for (invitation, user_id) in invitations.iter().zip(["ana", "ben"]) {
        engine
            .respond_to_invitation(user_id, &invitation.id, true)
            .await
            .unwrap();
    }
    assert_eq!(status_of(&store, &competition.id).await, CompetitionStatus::Inviting);

    engine.activate(&admin, &competition.id).await.unwrap();
    let ana = submit(&engine, &competition.id, "ana").await;
    submit(&engine, &competition.id, "ben").await;
    assert_eq!(status_of(&store, &competition.id).await, CompetitionStatus::Voting);

    engine.cast_vote(&competition.id, "judge", &ana).await.unwrap();
    let report = engine
        .sweep_voting_deadlines(Utc::now() + chrono::Duration::days(30))
        .await
        .unwrap();
    assert_eq!(report.advanced, 1);
    assert_eq!(
        store.competition(&competition.id).await.unwrap().winner_id.as_deref(),
        Some("ana")
    );
}
