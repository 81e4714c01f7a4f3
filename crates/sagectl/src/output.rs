//! Terminal rendering for sagectl
//!
//! Every renderer returns a String so it can be tested without a TTY.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use sage_common::{
    AchievementGrant, HealthResponse, LeaderboardEntry, LedgerView, ProgressUpdate,
    PuzzleAttempt, SubmissionResult, TopicProgress, TopicSummary,
};

const THIN_SEP: &str = "------------------------------------------------------------";
const BAR_WIDTH: usize = 20;

/// `[#######.............]  35%`
pub fn progress_bar(percentage: u8) -> String {
    let pct = percentage.min(100) as usize;
    let filled = pct * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        pct
    )
}

pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.round() as u64;
    if total < 60 {
        format!("{}m", total)
    } else {
        format!("{}h {:02}m", total / 60, total % 60)
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

fn achievements_line(out: &mut String, granted: &[AchievementGrant]) {
    for grant in granted {
        let _ = writeln!(
            out,
            "  {} {} (+{})",
            "Achievement unlocked:".yellow().bold(),
            grant.achievement_id,
            grant.points
        );
    }
}

pub fn render_health(health: &HealthResponse) -> String {
    let mut out = String::new();
    let status = if health.status == "healthy" {
        health.status.green().to_string()
    } else {
        health.status.red().to_string()
    };
    let _ = writeln!(out, "{}", "[DAEMON]".cyan());
    let _ = writeln!(out, "  Status:         {}", status);
    let _ = writeln!(out, "  Version:        {}", health.version);
    let _ = writeln!(out, "  Uptime:         {}s", health.uptime_seconds);
    let _ = writeln!(out, "  Topics:         {}", health.topics_available);
    out
}

pub fn render_topics(topics: &[TopicSummary]) -> String {
    if topics.is_empty() {
        return "  No topics published.\n".to_string();
    }
    let mut out = String::new();
    for topic in topics {
        let _ = writeln!(
            out,
            "  {:<24} {} [{}, {:?}]",
            topic.topic_id,
            topic.title.bold(),
            topic.category,
            topic.difficulty
        );
        if let Some(desc) = &topic.description {
            let _ = writeln!(out, "  {:<24} {}", "", desc.dimmed());
        }
    }
    out
}

pub fn render_topic_progress(progress: &TopicProgress) -> String {
    let mut out = String::new();
    let title = if progress.completed {
        format!("{} {}", progress.topic_id, "(completed)".green())
    } else {
        progress.topic_id.clone()
    };
    let _ = writeln!(out, "{}", title.bold());
    let _ = writeln!(
        out,
        "  {}  {}/{} paths",
        progress_bar(progress.progress_percentage),
        progress.paths_completed,
        progress.total_paths
    );
    let _ = writeln!(
        out,
        "  Score: {}   Time: {}   Last visit: {}",
        progress.overall_score,
        format_minutes(progress.time_spent),
        format_date(progress.last_accessed)
    );
    for (path_id, path) in &progress.paths {
        let mark = if path.completed {
            "done".green().to_string()
        } else {
            "open".yellow().to_string()
        };
        let score = path
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "    {} {:<28} score {:>4}  attempts {}",
            mark, path_id, score, path.attempts
        );
    }
    out
}

pub fn render_ledger(view: &LedgerView) -> String {
    let mut out = String::new();
    let name = view
        .display_name
        .clone()
        .unwrap_or_else(|| view.user_id.to_string());
    let _ = writeln!(out, "{}", format!("  {}", name).bold());
    let _ = writeln!(out, "{}", THIN_SEP);
    let _ = writeln!(out, "  Points:           {}", view.total_points);
    let _ = writeln!(out, "  Time spent:       {}", format_minutes(view.total_time_spent));
    let _ = writeln!(out, "  Topics completed: {}", view.completed_topics);
    let _ = writeln!(out, "  Streak:           {} day(s)", view.streak);
    let _ = writeln!(out, "  Last activity:    {}", format_date(view.last_activity));
    if !view.achievements.is_empty() {
        let ids: Vec<&str> = view
            .achievements
            .iter()
            .map(|a| a.achievement_id.as_str())
            .collect();
        let _ = writeln!(out, "  Achievements:     {}", ids.join(", "));
    }
    let _ = writeln!(out);
    if view.topics.is_empty() {
        let _ = writeln!(out, "  No progress yet.");
    }
    for topic in &view.topics {
        let title = topic.title.as_deref().unwrap_or(&topic.progress.topic_id);
        let _ = writeln!(
            out,
            "  {:<28} {}",
            title,
            progress_bar(topic.progress.progress_percentage)
        );
    }
    out
}

pub fn render_update(update: &ProgressUpdate) -> String {
    let mut out = render_topic_progress(&update.progress);
    achievements_line(&mut out, &update.new_achievements);
    out
}

pub fn render_submission(result: &SubmissionResult) -> String {
    let mut out = String::new();
    if result.correct {
        let _ = writeln!(out, "  {} +{} points", "Correct!".green().bold(), result.score);
    } else {
        let _ = writeln!(out, "  {} try again", "Not quite.".red().bold());
    }
    let _ = writeln!(out, "  Attempt {}", result.attempt_id.to_string().dimmed());
    achievements_line(&mut out, &result.new_achievements);
    out
}

pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "  Nobody on the board yet.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "  {:>4}  {:<24} {:>8}  {:>6}", "#", "Learner", "Points", "Topics");
    for entry in entries {
        let rank = format!("{:>4}", entry.rank);
        let rank = if entry.rank <= 3 {
            rank.yellow().bold().to_string()
        } else {
            rank
        };
        let _ = writeln!(
            out,
            "  {}  {:<24} {:>8}  {:>6}",
            rank, entry.display_name, entry.total_points, entry.completed_topics
        );
    }
    out
}

pub fn render_history(attempts: &[PuzzleAttempt], limit: Option<usize>) -> String {
    if attempts.is_empty() {
        return "  No attempts yet.\n".to_string();
    }
    let mut out = String::new();
    for attempt in attempts.iter().take(limit.unwrap_or(usize::MAX)) {
        let verdict = if attempt.is_correct {
            "correct".green().to_string()
        } else {
            "wrong".red().to_string()
        };
        let _ = writeln!(
            out,
            "  {}  {}/{} ({}) {} score {}",
            format_date(Some(attempt.timestamp)),
            attempt.topic_id,
            attempt.path_id,
            attempt.puzzle_type,
            verdict,
            attempt.score
        );
    }
    out
}
