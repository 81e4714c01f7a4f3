//! Per-user progress ledger and the path update state machine.
//!
//! A ledger holds one `TopicProgress` per touched topic, each holding one
//! `PathProgress` per touched path. Aggregates (paths completed, percentage,
//! totals) are always derived here, in one place, so they cannot drift.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ContentCatalog;
use crate::error::{Result, SageError};
use crate::identity::UserId;
use crate::streaks;

/// Lifecycle of one path for one user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathState {
    NotStarted,
    InProgress,
    /// Terminal
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathProgress {
    pub path_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    /// Minutes
    #[serde(default)]
    pub time_spent: f64,
    /// Best score ever achieved
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl PathProgress {
    pub fn new(path_id: impl Into<String>) -> Self {
        Self {
            path_id: path_id.into(),
            completed: false,
            completion_date: None,
            time_spent: 0.0,
            score: None,
            attempts: 0,
            last_accessed: None,
        }
    }

    pub fn state(&self) -> PathState {
        if self.completed {
            PathState::Completed
        } else if self.attempts == 0 {
            PathState::NotStarted
        } else {
            PathState::InProgress
        }
    }

    /// Raise the best score; never lowers it
    fn record_score(&mut self, incoming: Option<u32>) {
        let best = self.score.unwrap_or(0).max(incoming.unwrap_or(0));
        self.score = Some(best);
    }

    /// Returns true on the false -> true transition
    fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        let transitioned = !self.completed;
        self.completed = true;
        if self.completion_date.is_none() {
            self.completion_date = Some(now);
        }
        transitioned
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub topic_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paths_completed: u32,
    /// Catalog path count at first touch; not re-synced when the catalog changes
    #[serde(default)]
    pub total_paths: u32,
    #[serde(default)]
    pub progress_percentage: u8,
    /// Sum of best path scores
    #[serde(default)]
    pub overall_score: u64,
    /// Minutes
    #[serde(default)]
    pub time_spent: f64,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathProgress>,
}

impl TopicProgress {
    pub fn new(topic_id: impl Into<String>, total_paths: u32) -> Self {
        Self {
            topic_id: topic_id.into(),
            completed: false,
            completion_date: None,
            paths_completed: 0,
            total_paths,
            progress_percentage: 0,
            overall_score: 0,
            time_spent: 0.0,
            last_accessed: None,
            paths: BTreeMap::new(),
        }
    }

    /// Zeroed view for a topic the user never touched
    pub fn untouched(topic_id: impl Into<String>) -> Self {
        Self::new(topic_id, 0)
    }

    pub fn path(&self, path_id: &str) -> Option<&PathProgress> {
        self.paths.get(path_id)
    }

    /// Re-derive counters from the paths. Returns true if this call flipped
    /// the topic to completed.
    fn recompute(&mut self, now: DateTime<Utc>) -> bool {
        self.paths_completed = self.paths.values().filter(|p| p.completed).count() as u32;
        self.progress_percentage = percentage(self.paths_completed, self.total_paths);
        self.overall_score = self
            .paths
            .values()
            .map(|p| u64::from(p.score.unwrap_or(0)))
            .sum();

        let all_done = self.total_paths > 0 && self.paths_completed >= self.total_paths;
        if all_done && !self.completed {
            self.completed = true;
            self.completion_date = Some(now);
            return true;
        }
        false
    }
}

/// round(100 * done / total), clamped to 100
pub fn percentage(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (100.0 * f64::from(done) / f64::from(total)).round();
    pct.min(100.0) as u8
}

/// Badge granted once to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AchievementGrant {
    pub achievement_id: String,
    pub earned_at: DateTime<Utc>,
    pub points: u32,
}

/// How a score on an update feeds `total_points`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreCredit {
    /// Every supplied score is added
    #[default]
    Cumulative,
    /// Only the improvement over the path's previous best is added
    BestImprovement,
}

/// Path progress event
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathUpdate {
    #[serde(default)]
    pub completed: Option<bool>,
    /// Minutes
    #[serde(default)]
    pub time_spent: Option<f64>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(skip)]
    pub credit: ScoreCredit,
}

impl PathUpdate {
    /// Visit with no completion, time or score
    pub fn touch() -> Self {
        Self::default()
    }

    pub fn completion(score: Option<u32>) -> Self {
        Self {
            completed: Some(true),
            score,
            ..Self::default()
        }
    }

    pub fn with_time_spent(mut self, minutes: f64) -> Self {
        self.time_spent = Some(minutes);
        self
    }

    pub fn with_credit(mut self, credit: ScoreCredit) -> Self {
        self.credit = credit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.time_spent {
            if !t.is_finite() || t < 0.0 {
                return Err(SageError::InvalidInput(format!(
                    "timeSpent must be a non-negative number of minutes, got {}",
                    t
                )));
            }
        }
        Ok(())
    }
}

/// What an update changed
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub topic: TopicProgress,
    pub path_completed_now: bool,
    pub topic_completed_now: bool,
    pub points_credited: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressLedger {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicProgress>,
    #[serde(default)]
    pub total_points: u64,
    /// Minutes
    #[serde(default)]
    pub total_time_spent: f64,
    #[serde(default)]
    pub completed_topics: u32,
    /// Correct puzzle submissions, repeats included
    #[serde(default)]
    pub puzzles_solved: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub achievements: Vec<AchievementGrant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgressLedger {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            display_name: None,
            topics: BTreeMap::new(),
            total_points: 0,
            total_time_spent: 0.0,
            completed_topics: 0,
            puzzles_solved: 0,
            streak: 0,
            last_activity: None,
            achievements: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn topic(&self, topic_id: &str) -> Option<&TopicProgress> {
        self.topics.get(topic_id)
    }

    pub fn has_achievement(&self, achievement_id: &str) -> bool {
        self.achievements
            .iter()
            .any(|a| a.achievement_id == achievement_id)
    }

    /// Append a grant unless already held. Returns true if granted.
    pub fn grant_achievement(
        &mut self,
        achievement_id: &str,
        points: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if self.has_achievement(achievement_id) {
            return false;
        }
        self.achievements.push(AchievementGrant {
            achievement_id: achievement_id.to_string(),
            earned_at: now,
            points,
        });
        true
    }

    pub fn paths_completed(&self) -> u32 {
        self.topics.values().map(|t| t.paths_completed).sum()
    }

    /// Apply one path event.
    ///
    /// All catalog lookups happen before the first mutation, so a NotFound
    /// leaves the ledger untouched.
    pub fn apply_path_update(
        &mut self,
        topic_id: &str,
        path_id: &str,
        update: &PathUpdate,
        catalog: &dyn ContentCatalog,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        update.validate()?;

        let new_topic_total = if self.topics.contains_key(topic_id) {
            None
        } else {
            Some(catalog.topic_path_count(topic_id)? as u32)
        };
        let path_known = self
            .topics
            .get(topic_id)
            .is_some_and(|t| t.paths.contains_key(path_id));
        if !path_known {
            catalog.path(topic_id, path_id)?;
        }

        let topic = self
            .topics
            .entry(topic_id.to_string())
            .or_insert_with(|| TopicProgress::new(topic_id, new_topic_total.unwrap_or(0)));
        let path = topic
            .paths
            .entry(path_id.to_string())
            .or_insert_with(|| PathProgress::new(path_id));

        let previous_best = path.score.unwrap_or(0);

        path.attempts = path.attempts.saturating_add(1);
        path.last_accessed = Some(now);

        let mut path_completed_now = false;
        if update.completed == Some(true) {
            path_completed_now = path.mark_completed(now);
            path.record_score(update.score);
        }

        if let Some(minutes) = update.time_spent {
            path.time_spent += minutes;
        }

        let mut points_credited = 0u64;
        if let Some(score) = update.score {
            path.record_score(Some(score));
            points_credited = match update.credit {
                ScoreCredit::Cumulative => u64::from(score),
                ScoreCredit::BestImprovement => u64::from(score.saturating_sub(previous_best)),
            };
        }

        if let Some(minutes) = update.time_spent {
            topic.time_spent += minutes;
        }
        topic.last_accessed = Some(now);
        let topic_completed_now = topic.recompute(now);
        let topic_snapshot = topic.clone();

        if topic_completed_now {
            self.completed_topics += 1;
        }
        if let Some(minutes) = update.time_spent {
            self.total_time_spent += minutes;
        }
        self.total_points += points_credited;
        self.streak = streaks::advance(self.streak, self.last_activity, now);
        self.last_activity = Some(now);
        self.updated_at = now;

        Ok(UpdateOutcome {
            topic: topic_snapshot,
            path_completed_now,
            topic_completed_now,
            points_credited,
        })
    }
}
