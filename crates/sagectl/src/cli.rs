//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use sage_common::Timeframe;

/// Default daemon address
pub const DEFAULT_URL: &str = "http://127.0.0.1:7870";

/// Sage CLI
#[derive(Parser, Debug)]
#[command(name = "sagectl")]
#[command(about = "Sage - learning progress and puzzles from the terminal", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Daemon base URL
    #[arg(long, global = true, env = "SAGE_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Verified user id to act as
    #[arg(long, global = true, env = "SAGE_USER")]
    pub user: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Daemon health and, with --user, a progress summary
    Status,

    /// List published topics
    Topics {
        #[arg(long)]
        category: Option<String>,

        /// beginner, intermediate or advanced
        #[arg(long)]
        difficulty: Option<String>,
    },

    /// Show progress on one topic, or on all of them
    Progress { topic: Option<String> },

    /// Mark a path completed
    Complete {
        topic: String,
        path: String,

        /// Minutes spent
        #[arg(long)]
        time_spent: Option<f64>,

        #[arg(long)]
        score: Option<u32>,
    },

    /// Record a visit without completing
    Visit {
        topic: String,
        path: String,

        /// Minutes spent
        #[arg(long)]
        time_spent: Option<f64>,
    },

    /// Submit answers to a path's puzzle
    Submit {
        topic: String,
        path: String,

        /// Answers as JSON, e.g. '["e1","e2"]' or '{"A":1}'
        #[arg(long)]
        answers: String,

        /// Seconds taken
        #[arg(long, default_value_t = 0)]
        time_taken: u64,
    },

    /// Top learners
    Leaderboard {
        #[arg(long)]
        limit: Option<usize>,

        /// all, week or month
        #[arg(long, default_value = "all", value_parser = parse_timeframe)]
        timeframe: Timeframe,
    },

    /// Your puzzle attempts, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn parse_timeframe(s: &str) -> Result<Timeframe, String> {
    s.parse::<Timeframe>().map_err(|e| e.to_string())
}
