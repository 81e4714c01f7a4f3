//! Progress engine tests: update protocol, puzzle submissions, queries and
//! concurrent writers against both ledger stores.

use std::fs;
use std::sync::Arc;
use std::thread;

use sage_common::{
    AttemptLog, ContentCatalog, EngineConfig, Identity, InMemoryCatalog, JsonDirLedgerStore,
    LedgerStore, MemoryAttemptLog, MemoryLedgerStore, NotFoundKind, PathUpdate, ProgressEngine,
    PuzzleSubmission, Result, SageError, Timeframe, UserId, UserProgressLedger, Versioned,
};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn catalog() -> InMemoryCatalog {
    let topics = json!([
        {
            "topicId": "ai-history",
            "title": "History of AI",
            "icon": "robot",
            "category": "computing",
            "published": true,
            "paths": [
                { "id": "early-challenges", "title": "Early challenges", "order": 1 },
                { "id": "key-milestones", "title": "Key milestones", "order": 2 },
                { "id": "modern-era", "title": "Modern era", "order": 3 },
                { "id": "ethics", "title": "Ethics", "order": 4 }
            ],
            "puzzles": [
                {
                    "pathId": "early-challenges",
                    "type": "matching",
                    "question": "Match the challenges",
                    "points": 10,
                    "data": { "pairs": [
                        { "term": "A", "definition": "1" },
                        { "term": "B", "definition": "2" }
                    ]},
                    "solution": [{ "A": 1 }, { "B": 2 }]
                },
                {
                    "pathId": "key-milestones",
                    "type": "timeline",
                    "question": "Order the milestones",
                    "points": 15,
                    "data": { "events": ["e1", "e2", "e3"] },
                    "solution": ["e1", "e2", "e3"]
                },
                {
                    "pathId": "modern-era",
                    "type": "fill-blank",
                    "question": "Deep ___ networks",
                    "data": { "text": "Deep ___ networks" },
                    "solution": "neural"
                }
            ]
        }
    ]);
    InMemoryCatalog::from_json_str(&topics.to_string()).unwrap()
}

fn engine_with(store: Arc<dyn LedgerStore>, log: Arc<MemoryAttemptLog>) -> ProgressEngine {
    ProgressEngine::new(Arc::new(catalog()), store, log, EngineConfig::default())
}

fn engine() -> (ProgressEngine, Arc<MemoryLedgerStore>, Arc<MemoryAttemptLog>) {
    let store = Arc::new(MemoryLedgerStore::new());
    let log = Arc::new(MemoryAttemptLog::new());
    (engine_with(store.clone(), log.clone()), store, log)
}

fn ada() -> Identity {
    Identity::new(UserId::new("ada").unwrap()).with_display_name("Ada L.")
}

fn submission(answers: serde_json::Value, secs: u64) -> PuzzleSubmission {
    PuzzleSubmission {
        answers,
        time_taken: secs,
    }
}

const TOPIC: &str = "ai-history";
const PATHS: [&str; 4] = ["early-challenges", "key-milestones", "modern-era", "ethics"];

// ============================================================================
// Path completion updates
// ============================================================================

#[test]
fn test_idempotent_completion() {
    let (engine, store, _) = engine();
    let user = ada();

    let first = engine
        .update_path_progress(&user, TOPIC, "ethics", &PathUpdate::completion(None))
        .unwrap();
    let date = first.progress.path("ethics").unwrap().completion_date;
    assert!(date.is_some());

    let second = engine
        .update_path_progress(&user, TOPIC, "ethics", &PathUpdate::completion(None))
        .unwrap();
    assert_eq!(second.progress.path("ethics").unwrap().completion_date, date);
    assert_eq!(second.progress.paths_completed, 1);

    for p in PATHS {
        engine
            .update_path_progress(&user, TOPIC, p, &PathUpdate::completion(None))
            .unwrap();
    }
    for p in PATHS {
        engine
            .update_path_progress(&user, TOPIC, p, &PathUpdate::completion(None))
            .unwrap();
    }
    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    assert_eq!(ledger.completed_topics, 1);
}

#[test]
fn test_score_monotonic() {
    let (engine, _, _) = engine();
    let user = ada();
    engine
        .update_path_progress(&user, TOPIC, "ethics", &PathUpdate::completion(Some(8)))
        .unwrap();
    let out = engine
        .update_path_progress(&user, TOPIC, "ethics", &PathUpdate::completion(Some(5)))
        .unwrap();
    assert_eq!(out.progress.path("ethics").unwrap().score, Some(8));
}

#[test]
fn test_percentage_derivation() {
    let (engine, _, _) = engine();
    let user = ada();

    let out = engine
        .update_path_progress(&user, TOPIC, PATHS[0], &PathUpdate::completion(None))
        .unwrap();
    assert_eq!(out.progress.total_paths, 4);
    assert_eq!(out.progress.progress_percentage, 25);
    assert!(!out.progress.completed);

    let mut last = out;
    for p in &PATHS[1..] {
        last = engine
            .update_path_progress(&user, TOPIC, p, &PathUpdate::completion(None))
            .unwrap();
    }
    assert_eq!(last.progress.progress_percentage, 100);
    assert!(last.progress.completed);
    assert!(last
        .new_achievements
        .iter()
        .any(|a| a.achievement_id == "first_topic"));
}

#[test]
fn test_unknown_topic_leaves_stored_ledger_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonDirLedgerStore::new(dir.path()).unwrap());
    let engine = engine_with(store, Arc::new(MemoryAttemptLog::new()));
    let user = ada();

    engine
        .update_path_progress(
            &user,
            TOPIC,
            "ethics",
            &PathUpdate::touch().with_time_spent(2.0),
        )
        .unwrap();
    let file = dir.path().join("ledgers").join("ada.json");
    let before = fs::read(&file).unwrap();

    let err = engine
        .update_path_progress(
            &user,
            "no-such-topic",
            "p1",
            &PathUpdate::completion(Some(5)),
        )
        .unwrap_err();
    assert!(matches!(err, SageError::NotFound { kind: NotFoundKind::Topic, .. }));
    assert_eq!(fs::read(&file).unwrap(), before);
}

#[test]
fn test_unknown_topic_creates_no_ledger() {
    let (engine, store, _) = engine();
    let user = ada();
    assert!(engine
        .update_path_progress(&user, "no-such-topic", "p1", &PathUpdate::touch())
        .is_err());
    assert!(store.load(&user.user_id).unwrap().is_none());
}

// ============================================================================
// Puzzle submissions
// ============================================================================

#[test]
fn test_correct_matching_submission() {
    let (engine, store, log) = engine();
    let user = ada();

    let result = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "early-challenges",
            &submission(json!({ "B": 2, "A": 1 }), 30),
        )
        .unwrap();
    assert!(result.correct);
    assert_eq!(result.score, 10);

    let attempts = log.for_user(&user.user_id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].id, result.attempt_id);
    assert!(attempts[0].is_correct);

    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    let path = ledger.topic(TOPIC).unwrap().path("early-challenges").unwrap();
    assert!(path.completed);
    assert_eq!(path.score, Some(10));
    assert_eq!(ledger.total_points, 10);
    assert_eq!(ledger.display_name.as_deref(), Some("Ada L."));
}

#[test]
fn test_incorrect_submission_touches_path() {
    let (engine, store, log) = engine();
    let user = ada();

    let result = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "early-challenges",
            &submission(json!({ "A": 2, "B": 1 }), 30),
        )
        .unwrap();
    assert!(!result.correct);
    assert_eq!(result.score, 0);
    assert_eq!(log.len(), 1);

    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    let path = ledger.topic(TOPIC).unwrap().path("early-challenges").unwrap();
    assert!(!path.completed);
    assert_eq!(path.attempts, 1);
    assert!(path.last_accessed.is_some());
    assert_eq!(ledger.total_points, 0);
    assert_eq!(ledger.total_time_spent, 0.0);
}

#[test]
fn test_first_solved_puzzle_earns_badge() {
    let (engine, store, _) = engine();
    let user = ada();

    let wrong = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "key-milestones",
            &submission(json!(["e3", "e2", "e1"]), 10),
        )
        .unwrap();
    assert!(wrong.new_achievements.is_empty());

    let right = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "key-milestones",
            &submission(json!(["e1", "e2", "e3"]), 10),
        )
        .unwrap();
    let ids: Vec<&str> = right
        .new_achievements
        .iter()
        .map(|a| a.achievement_id.as_str())
        .collect();
    assert!(ids.contains(&"first_puzzle"), "{:?}", ids);

    let again = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "key-milestones",
            &submission(json!(["e1", "e2", "e3"]), 10),
        )
        .unwrap();
    assert!(again.new_achievements.is_empty());

    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    assert_eq!(ledger.puzzles_solved, 2);
    assert_eq!(ledger.total_points, 15);
    assert!(ledger.has_achievement("first_puzzle"));
}

#[test]
fn test_path_completion_alone_earns_no_puzzle_badge() {
    let (engine, _, _) = engine();
    let out = engine
        .update_path_progress(&ada(), TOPIC, "ethics", &PathUpdate::completion(None))
        .unwrap();
    let ids: Vec<&str> = out
        .new_achievements
        .iter()
        .map(|a| a.achievement_id.as_str())
        .collect();
    assert_eq!(ids, vec!["first_path"]);
}

#[test]
fn test_repeated_correct_answers_never_over_credit() {
    let (engine, store, log) = engine();
    let user = ada();
    for _ in 0..3 {
        let r = engine
            .submit_puzzle_attempt(
                &user,
                TOPIC,
                "early-challenges",
                &submission(json!({ "A": 1, "B": 2 }), 6),
            )
            .unwrap();
        assert_eq!(r.score, 10);
    }
    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    assert_eq!(ledger.total_points, 10);
    assert_eq!(ledger.topic(TOPIC).unwrap().path("early-challenges").unwrap().attempts, 3);
    assert_eq!(log.len(), 3);
}

#[test]
fn test_cumulative_totals_across_paths() {
    let (engine, store, _) = engine();
    let user = ada();

    engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "early-challenges",
            &submission(json!([{ "A": 1 }, { "B": 2 }]), 90),
        )
        .unwrap();
    engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "key-milestones",
            &submission(json!(["e1", "e2", "e3"]), 150),
        )
        .unwrap();

    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    assert_eq!(ledger.total_points, 25);
    assert_eq!(ledger.total_time_spent, 4.0);
    let topic = ledger.topic(TOPIC).unwrap();
    assert_eq!(topic.time_spent, 4.0);
    assert_eq!(topic.overall_score, 25);
    assert_eq!(topic.progress_percentage, 50);
}

#[test]
fn test_timeline_out_of_order() {
    let (engine, _, _) = engine();
    let result = engine
        .submit_puzzle_attempt(
            &ada(),
            TOPIC,
            "key-milestones",
            &submission(json!(["e1", "e3", "e2"]), 10),
        )
        .unwrap();
    assert!(!result.correct);
}

#[test]
fn test_unsupported_type_scores_zero_and_is_recorded() {
    let (engine, store, log) = engine();
    let user = ada();

    let result = engine
        .submit_puzzle_attempt(&user, TOPIC, "modern-era", &submission(json!("neural"), 10))
        .unwrap();
    assert!(!result.correct);
    assert_eq!(result.score, 0);

    let attempts = log.for_user(&user.user_id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].judge_error.is_some());

    let ledger = store.load(&user.user_id).unwrap().unwrap().data;
    assert_eq!(ledger.total_points, 0);
}

#[test]
fn test_missing_puzzle_is_not_found_without_side_effects() {
    let (engine, store, log) = engine();
    let user = ada();

    let err = engine
        .submit_puzzle_attempt(&user, TOPIC, "ethics", &submission(json!({}), 1))
        .unwrap_err();
    assert!(matches!(err, SageError::NotFound { kind: NotFoundKind::Puzzle, .. }));

    let err = engine
        .submit_puzzle_attempt(&user, "nope", "ethics", &submission(json!({}), 1))
        .unwrap_err();
    assert!(matches!(err, SageError::NotFound { kind: NotFoundKind::Topic, .. }));

    assert!(log.is_empty());
    assert!(store.load(&user.user_id).unwrap().is_none());
}

// ============================================================================
// Storage failures
// ============================================================================

/// Store whose writes always fail or always conflict
struct BrokenStore {
    conflict: bool,
}

impl LedgerStore for BrokenStore {
    fn load(&self, _user: &UserId) -> Result<Option<Versioned<UserProgressLedger>>> {
        Ok(None)
    }

    fn save(&self, ledger: &UserProgressLedger, expected: Option<u64>) -> Result<u64> {
        if self.conflict {
            Err(SageError::PersistenceConflict {
                user: ledger.user_id.to_string(),
                expected,
                actual: Some(99),
            })
        } else {
            Err(SageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
        }
    }

    fn all(&self) -> Result<Vec<UserProgressLedger>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_attempt_kept_when_progress_write_fails() {
    let log = Arc::new(MemoryAttemptLog::new());
    let engine = engine_with(Arc::new(BrokenStore { conflict: false }), log.clone());

    let err = engine
        .submit_puzzle_attempt(
            &ada(),
            TOPIC,
            "early-challenges",
            &submission(json!({ "A": 1, "B": 2 }), 5),
        )
        .unwrap_err();
    assert!(matches!(err, SageError::PersistenceUnavailable(_)));
    assert_eq!(log.len(), 1);
}

#[test]
fn test_endless_conflicts_surface_as_unavailable() {
    let engine = engine_with(
        Arc::new(BrokenStore { conflict: true }),
        Arc::new(MemoryAttemptLog::new()),
    );
    let err = engine
        .update_path_progress(&ada(), TOPIC, "ethics", &PathUpdate::touch())
        .unwrap_err();
    assert!(matches!(err, SageError::PersistenceUnavailable(_)));
    assert!(err.is_retryable());
}

// ============================================================================
// Concurrency
// ============================================================================

fn hammer(store: Arc<dyn LedgerStore>) {
    let config = EngineConfig {
        max_conflict_retries: 10_000,
        ..EngineConfig::default()
    };
    let engine = Arc::new(ProgressEngine::new(
        Arc::new(catalog()),
        store.clone(),
        Arc::new(MemoryAttemptLog::new()),
        config,
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                let user = ada();
                let path = PATHS[i % PATHS.len()];
                for _ in 0..10 {
                    let update = PathUpdate {
                        score: Some(1),
                        ..PathUpdate::touch().with_time_spent(1.0)
                    };
                    engine.update_path_progress(&user, TOPIC, path, &update).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let ledger = store.load(&UserId::new("ada").unwrap()).unwrap().unwrap().data;
    assert_eq!(ledger.total_points, 80);
    assert_eq!(ledger.total_time_spent, 80.0);
    let attempts: u32 = ledger.topic(TOPIC).unwrap().paths.values().map(|p| p.attempts).sum();
    assert_eq!(attempts, 80);
}

#[test]
fn test_concurrent_updates_memory_store() {
    hammer(Arc::new(MemoryLedgerStore::new()));
}

#[test]
fn test_concurrent_updates_json_store() {
    let dir = TempDir::new().unwrap();
    hammer(Arc::new(JsonDirLedgerStore::new(dir.path()).unwrap()));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_topic_progress_for_untouched_topic() {
    let (engine, _, _) = engine();
    let progress = engine.topic_progress(&UserId::new("nobody").unwrap(), TOPIC).unwrap();
    assert_eq!(progress.topic_id, TOPIC);
    assert_eq!(progress.progress_percentage, 0);
    assert!(progress.paths.is_empty());
}

#[test]
fn test_user_progress_joins_catalog() {
    let (engine, _, _) = engine();
    let user = ada();
    engine
        .update_path_progress(&user, TOPIC, "ethics", &PathUpdate::completion(Some(4)))
        .unwrap();

    let view = engine.user_progress(&user.user_id).unwrap();
    assert_eq!(view.total_points, 4);
    assert_eq!(view.streak, 1);
    assert_eq!(view.topics.len(), 1);
    assert_eq!(view.topics[0].title.as_deref(), Some("History of AI"));
    assert_eq!(view.topics[0].icon.as_deref(), Some("robot"));
    assert!(view.achievements.iter().any(|a| a.achievement_id == "first_path"));

    let empty = engine.user_progress(&UserId::new("nobody").unwrap()).unwrap();
    assert!(empty.topics.is_empty());
    assert_eq!(empty.total_points, 0);
}

#[test]
fn test_leaderboard_limit_clamped() {
    let (engine, _, _) = engine();
    for (name, score) in [("ada", 5), ("alan", 9), ("grace", 7)] {
        let who = Identity::new(UserId::new(name).unwrap());
        engine
            .update_path_progress(
                &who,
                TOPIC,
                "ethics",
                &PathUpdate::completion(Some(score)),
            )
            .unwrap();
    }

    let board = engine.leaderboard(Some(2), Timeframe::Week).unwrap();
    let users: Vec<_> = board.iter().map(|e| e.user_id.to_string()).collect();
    assert_eq!(users, vec!["alan", "grace"]);

    assert_eq!(engine.leaderboard(Some(0), Timeframe::All).unwrap().len(), 1);
    assert_eq!(engine.leaderboard(None, Timeframe::Month).unwrap().len(), 3);
}

#[test]
fn test_attempt_history_newest_first() {
    let (engine, _, _) = engine();
    let user = ada();
    let first = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "key-milestones",
            &submission(json!(["e2"]), 3),
        )
        .unwrap();
    thread::sleep(std::time::Duration::from_millis(5));
    let second = engine
        .submit_puzzle_attempt(
            &user,
            TOPIC,
            "key-milestones",
            &submission(json!(["e1", "e2", "e3"]), 3),
        )
        .unwrap();

    let history = engine.attempt_history(&user.user_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.attempt_id);
    assert_eq!(history[1].id, first.attempt_id);
}

#[test]
fn test_catalog_is_reachable_from_engine() {
    let (engine, _, _) = engine();
    assert_eq!(engine.catalog().topic_path_count(TOPIC).unwrap(), 4);
}
