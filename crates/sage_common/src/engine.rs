//! Progress engine: path completion updates, puzzle submissions and the
//! read-only aggregate queries.
//!
//! Every mutation is a read-modify-write of one user's ledger. Writes are
//! compare-and-swap against the version that was read; on conflict the whole
//! update is re-applied to a fresh read, so concurrent increments are never
//! lost.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::achievements;
use crate::attempt::{AttemptLog, PuzzleAttempt};
use crate::catalog::ContentCatalog;
use crate::error::{Result, SageError};
use crate::identity::{Identity, UserId};
use crate::leaderboard::{self, LeaderboardEntry, Timeframe};
use crate::progress::{
    AchievementGrant, PathUpdate, ScoreCredit, TopicProgress, UserProgressLedger,
};
use crate::puzzle::{self, Verdict};
use crate::store::LedgerStore;
use crate::streaks;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub max_conflict_retries: u32,
    pub leaderboard_default_limit: usize,
    pub leaderboard_max_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 8,
            leaderboard_default_limit: leaderboard::DEFAULT_LIMIT,
            leaderboard_max_limit: 100,
        }
    }
}

/// Raw puzzle submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleSubmission {
    pub answers: Value,
    /// Seconds
    #[serde(default)]
    pub time_taken: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub correct: bool,
    pub score: u32,
    pub attempt_id: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_achievements: Vec<AchievementGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub progress: TopicProgress,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_achievements: Vec<AchievementGrant>,
}

/// Topic progress joined with catalog display fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgressView {
    #[serde(flatten)]
    pub progress: TopicProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Whole ledger for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerView {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub total_points: u64,
    pub total_time_spent: f64,
    pub completed_topics: u32,
    pub puzzles_solved: u32,
    /// Streak as of now; 0 once a day was missed
    pub streak: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub achievements: Vec<AchievementGrant>,
    pub topics: Vec<TopicProgressView>,
}

fn unavailable(e: SageError) -> SageError {
    match e {
        SageError::Io(e) => SageError::PersistenceUnavailable(e.to_string()),
        SageError::Json(e) => SageError::PersistenceUnavailable(format!("corrupt record: {}", e)),
        other => other,
    }
}

pub struct ProgressEngine {
    catalog: Arc<dyn ContentCatalog>,
    ledgers: Arc<dyn LedgerStore>,
    attempts: Arc<dyn AttemptLog>,
    config: EngineConfig,
}

impl ProgressEngine {
    pub fn new(
        catalog: Arc<dyn ContentCatalog>,
        ledgers: Arc<dyn LedgerStore>,
        attempts: Arc<dyn AttemptLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            ledgers,
            attempts,
            config,
        }
    }

    pub fn catalog(&self) -> &dyn ContentCatalog {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load, mutate and compare-and-swap one ledger, retrying on conflict.
    ///
    /// `apply` may run several times; it must derive everything from the
    /// ledger it is handed. An error from `apply` aborts without writing.
    fn with_ledger<T>(
        &self,
        identity: &Identity,
        mut apply: impl FnMut(&mut UserProgressLedger, DateTime<Utc>) -> Result<T>,
    ) -> Result<(T, Vec<AchievementGrant>)> {
        let user = &identity.user_id;

        for round in 0..=self.config.max_conflict_retries {
            let now = Utc::now();
            let (mut ledger, expected) = match self.ledgers.load(user).map_err(unavailable)? {
                Some(stored) => (stored.data, Some(stored.version)),
                None => (UserProgressLedger::new(user.clone(), now), None),
            };

            let out = apply(&mut ledger, now)?;

            if identity.display_name.is_some() {
                ledger.display_name = identity.display_name.clone();
            }
            let granted = achievements::award(&mut ledger, now);

            match self.ledgers.save(&ledger, expected) {
                Ok(_) => return Ok((out, granted)),
                Err(SageError::PersistenceConflict { expected, actual, .. }) => {
                    debug!(
                        "Ledger conflict for {} (round {}, expected {:?}, found {:?}), retrying",
                        user, round, expected, actual
                    );
                }
                Err(e) => return Err(unavailable(e)),
            }
        }

        warn!(
            "Giving up on ledger update for {} after {} conflicting writes",
            user,
            self.config.max_conflict_retries + 1
        );
        Err(SageError::PersistenceUnavailable(format!(
            "ledger for {} is too busy, try again",
            user
        )))
    }

    /// Record a visit or completion of a path
    pub fn update_path_progress(
        &self,
        identity: &Identity,
        topic_id: &str,
        path_id: &str,
        update: &PathUpdate,
    ) -> Result<ProgressUpdate> {
        update.validate()?;

        let catalog = self.catalog.as_ref();
        let (outcome, granted) = self.with_ledger(identity, |ledger, now| {
            ledger.apply_path_update(topic_id, path_id, update, catalog, now)
        })?;

        info!(
            "Progress {} {}/{}: {}% ({} of {} paths){}{}",
            identity.user_id,
            topic_id,
            path_id,
            outcome.topic.progress_percentage,
            outcome.topic.paths_completed,
            outcome.topic.total_paths,
            if outcome.path_completed_now { ", path completed" } else { "" },
            if outcome.topic_completed_now { ", topic completed" } else { "" },
        );

        Ok(ProgressUpdate {
            progress: outcome.topic,
            new_achievements: granted,
        })
    }

    /// Judge a puzzle submission, record it, and credit the path if correct
    pub fn submit_puzzle_attempt(
        &self,
        identity: &Identity,
        topic_id: &str,
        path_id: &str,
        submission: &PuzzleSubmission,
    ) -> Result<SubmissionResult> {
        let puzzle = self.catalog.puzzle(topic_id, path_id)?;
        self.catalog.path(topic_id, path_id)?;

        let (verdict, judge_error) = match puzzle::validate_puzzle(puzzle, &submission.answers) {
            Ok(verdict) => (verdict, None),
            Err(e @ SageError::ValidationUnsupported(_)) => {
                warn!("{}/{}: {}, scoring zero", topic_id, path_id, e);
                (Verdict::incorrect(), Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };
        let score = verdict.score(puzzle.points);

        let attempt = PuzzleAttempt {
            id: Uuid::new_v4(),
            user_id: identity.user_id.clone(),
            topic_id: topic_id.to_string(),
            path_id: path_id.to_string(),
            puzzle_type: puzzle.puzzle_type(),
            puzzle_data: puzzle.body.public_data(),
            user_answers: submission.answers.clone(),
            is_correct: verdict.correct,
            score,
            time_taken: submission.time_taken,
            judge_error,
            timestamp: Utc::now(),
        };

        // No credit without an audit record
        self.attempts.append(&attempt).map_err(unavailable)?;

        let update = if verdict.correct {
            PathUpdate::completion(Some(score))
                .with_time_spent(submission.time_taken as f64 / 60.0)
                .with_credit(ScoreCredit::BestImprovement)
        } else {
            PathUpdate::touch()
        };

        let catalog = self.catalog.as_ref();
        let result = self.with_ledger(identity, |ledger, now| {
            let outcome = ledger.apply_path_update(topic_id, path_id, &update, catalog, now)?;
            if verdict.correct {
                ledger.puzzles_solved = ledger.puzzles_solved.saturating_add(1);
            }
            Ok(outcome)
        });
        let (outcome, granted) = match result {
            Ok(done) => done,
            Err(e) => {
                error!(
                    "Attempt {} recorded but progress update for {} failed: {}",
                    attempt.id, identity.user_id, e
                );
                return Err(e);
            }
        };

        info!(
            "Attempt {} by {} on {}/{} ({}): correct={} score={} credited={}",
            attempt.id,
            identity.user_id,
            topic_id,
            path_id,
            attempt.puzzle_type,
            verdict.correct,
            score,
            outcome.points_credited,
        );

        Ok(SubmissionResult {
            correct: verdict.correct,
            score,
            attempt_id: attempt.id,
            new_achievements: granted,
        })
    }

    /// Progress on one topic; zeroed if never touched
    pub fn topic_progress(&self, user: &UserId, topic_id: &str) -> Result<TopicProgress> {
        let stored = self.ledgers.load(user).map_err(unavailable)?;
        Ok(stored
            .and_then(|v| v.data.topics.get(topic_id).cloned())
            .unwrap_or_else(|| TopicProgress::untouched(topic_id)))
    }

    /// Full ledger joined with catalog metadata; empty if the user has none
    pub fn user_progress(&self, user: &UserId) -> Result<LedgerView> {
        let now = Utc::now();
        let ledger = match self.ledgers.load(user).map_err(unavailable)? {
            Some(stored) => stored.data,
            None => UserProgressLedger::new(user.clone(), now),
        };

        let topics = ledger
            .topics
            .values()
            .map(|progress| {
                let meta = self.catalog.topic(&progress.topic_id);
                TopicProgressView {
                    progress: progress.clone(),
                    title: meta.map(|t| t.title.clone()),
                    icon: meta.and_then(|t| t.icon.clone()),
                    category: meta.map(|t| t.category.clone()),
                }
            })
            .collect();

        Ok(LedgerView {
            user_id: ledger.user_id.clone(),
            display_name: ledger.display_name.clone(),
            total_points: ledger.total_points,
            total_time_spent: ledger.total_time_spent,
            completed_topics: ledger.completed_topics,
            puzzles_solved: ledger.puzzles_solved,
            streak: streaks::current(ledger.streak, ledger.last_activity, now),
            last_activity: ledger.last_activity,
            achievements: ledger.achievements.clone(),
            topics,
        })
    }

    pub fn leaderboard(
        &self,
        limit: Option<usize>,
        timeframe: Timeframe,
    ) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit
            .unwrap_or(self.config.leaderboard_default_limit)
            .clamp(1, self.config.leaderboard_max_limit.max(1));
        let ledgers = self.ledgers.all().map_err(unavailable)?;
        Ok(leaderboard::rank(&ledgers, timeframe, limit, Utc::now()))
    }

    /// A user's attempts, newest first
    pub fn attempt_history(&self, user: &UserId) -> Result<Vec<PuzzleAttempt>> {
        let mut attempts = self.attempts.for_user(user).map_err(unavailable)?;
        attempts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(attempts)
    }
}
