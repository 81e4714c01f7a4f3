//! Leaderboard ranking over all ledgers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SageError;
use crate::identity::UserId;
use crate::progress::UserProgressLedger;

pub const DEFAULT_LIMIT: usize = 10;

/// Activity window for the ranking
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[default]
    All,
    Week,
    Month,
}

impl Timeframe {
    pub fn window(&self) -> Option<Duration> {
        match self {
            Timeframe::All => None,
            Timeframe::Week => Some(Duration::days(7)),
            Timeframe::Month => Some(Duration::days(30)),
        }
    }

    /// Earliest `last_activity` that still counts
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|w| now - w)
    }
}

impl FromStr for Timeframe {
    type Err = SageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Timeframe::All),
            "week" => Ok(Timeframe::Week),
            "month" => Ok(Timeframe::Month),
            other => Err(SageError::InvalidInput(format!(
                "unknown timeframe '{}', expected all, week or month",
                other
            ))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::All => "all",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: UserId,
    pub display_name: String,
    pub total_points: u64,
    pub completed_topics: u32,
}

fn compare(a: &UserProgressLedger, b: &UserProgressLedger) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| b.completed_topics.cmp(&a.completed_topics))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Rank ledgers by points, keeping only those active inside the timeframe
pub fn rank(
    ledgers: &[UserProgressLedger],
    timeframe: Timeframe,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    let cutoff = timeframe.cutoff(now);
    let mut eligible: Vec<&UserProgressLedger> = ledgers
        .iter()
        .filter(|l| match cutoff {
            None => true,
            Some(cutoff) => l.last_activity.is_some_and(|t| t >= cutoff),
        })
        .collect();

    eligible.sort_by(|a, b| compare(a, b));

    eligible
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, l)| LeaderboardEntry {
            rank: i + 1,
            user_id: l.user_id.clone(),
            display_name: l
                .display_name
                .clone()
                .unwrap_or_else(|| l.user_id.to_string()),
            total_points: l.total_points,
            completed_topics: l.completed_topics,
        })
        .collect()
}
