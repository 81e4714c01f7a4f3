//! Daily activity streaks.
//!
//! Days are UTC calendar days counted from the epoch, the same bucketing the
//! leaderboard windows use.

use chrono::{DateTime, Utc};

const SECS_PER_DAY: i64 = 86_400;

/// Day number since epoch
pub fn day_number(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(SECS_PER_DAY)
}

/// Streak after activity at `now`, given the previous activity time.
///
/// Same day keeps the streak, the next day extends it, anything else
/// starts over at 1.
pub fn advance(streak: u32, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    let Some(last) = last_activity else {
        return 1;
    };

    let today = day_number(now);
    let last_day = day_number(last);

    if last_day == today {
        streak.max(1)
    } else if last_day + 1 == today {
        streak.saturating_add(1).max(1)
    } else {
        // Broken, or a clock that went backwards
        1
    }
}

/// Streak as it stands at `now` without new activity: 0 once a full day was missed
pub fn current(streak: u32, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    match last_activity {
        Some(last) if day_number(now) - day_number(last) <= 1 => streak,
        _ => 0,
    }
}
