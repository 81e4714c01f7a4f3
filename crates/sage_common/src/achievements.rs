//! Achievement badges.
//!
//! Unlock rules read only the ledger, so they can be re-evaluated after any
//! update. Grants are append-only and never feed `total_points`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::progress::{AchievementGrant, UserProgressLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    PuzzlesSolved(u32),
    PathsCompleted(u32),
    TopicsCompleted(u32),
    TotalPoints(u64),
    Streak(u32),
}

impl Rule {
    fn holds(&self, ledger: &UserProgressLedger) -> bool {
        match *self {
            Rule::PuzzlesSolved(n) => ledger.puzzles_solved >= n,
            Rule::PathsCompleted(n) => ledger.paths_completed() >= n,
            Rule::TopicsCompleted(n) => ledger.completed_topics >= n,
            Rule::TotalPoints(n) => ledger.total_points >= n,
            Rule::Streak(n) => ledger.streak >= n,
        }
    }
}

/// Achievement badge definition
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u32,
    #[serde(skip)]
    rule: Rule,
}

impl Achievement {
    const fn new(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        points: u32,
        rule: Rule,
    ) -> Self {
        Self {
            id,
            name,
            description,
            points,
            rule,
        }
    }
}

/// All available achievements
pub fn all_achievements() -> Vec<Achievement> {
    vec![
        // Milestones
        Achievement::new(
            "first_puzzle",
            "Puzzler",
            "Solve your first puzzle",
            5,
            Rule::PuzzlesSolved(1),
        ),
        Achievement::new(
            "first_path",
            "First Steps",
            "Complete your first path",
            5,
            Rule::PathsCompleted(1),
        ),
        Achievement::new(
            "first_topic",
            "Scholar",
            "Complete every path of a topic",
            25,
            Rule::TopicsCompleted(1),
        ),
        Achievement::new(
            "five_topics",
            "Polymath",
            "Complete 5 topics",
            100,
            Rule::TopicsCompleted(5),
        ),
        // Points
        Achievement::new(
            "points_100",
            "Centurion",
            "Earn 100 points",
            10,
            Rule::TotalPoints(100),
        ),
        Achievement::new(
            "points_500",
            "High Scorer",
            "Earn 500 points",
            50,
            Rule::TotalPoints(500),
        ),
        // Streaks
        Achievement::new(
            "streak_3",
            "On Fire",
            "Learn 3 days in a row",
            10,
            Rule::Streak(3),
        ),
        Achievement::new(
            "streak_7",
            "Week Warrior",
            "Learn 7 days in a row",
            30,
            Rule::Streak(7),
        ),
    ]
}

/// Grant every newly satisfied achievement. Returns the new grants.
pub fn award(ledger: &mut UserProgressLedger, now: DateTime<Utc>) -> Vec<AchievementGrant> {
    let mut granted = Vec::new();
    for achievement in all_achievements() {
        if !achievement.rule.holds(ledger) {
            continue;
        }
        if ledger.grant_achievement(achievement.id, achievement.points, now) {
            if let Some(grant) = ledger.achievements.last() {
                granted.push(grant.clone());
            }
        }
    }
    granted
}
