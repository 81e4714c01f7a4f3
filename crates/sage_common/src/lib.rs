//! Shared types and the progress engine for Sage components.
//!
//! The daemon and the CLI both depend on this crate: the daemon drives the
//! engine, the CLI only uses the wire types.

pub mod achievements;
pub mod api;
pub mod attempt;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod identity;
pub mod leaderboard;
pub mod progress;
pub mod puzzle;
pub mod store;
pub mod streaks;

pub use api::{ErrorBody, HealthResponse};
pub use attempt::{AttemptLog, JsonlAttemptLog, MemoryAttemptLog, PuzzleAttempt};
pub use catalog::{
    ContentCatalog, Difficulty, InMemoryCatalog, Path, Puzzle, PuzzleBody, PuzzleType, PuzzleView,
    Topic, TopicFilter, TopicSummary, TopicView,
};
pub use engine::{
    EngineConfig, LedgerView, ProgressEngine, ProgressUpdate, PuzzleSubmission, SubmissionResult,
    TopicProgressView,
};
pub use error::{NotFoundKind, Result, SageError};
pub use identity::{Identity, UserId};
pub use leaderboard::{LeaderboardEntry, Timeframe};
pub use progress::{
    AchievementGrant, PathProgress, PathState, PathUpdate, TopicProgress, UserProgressLedger,
};
pub use store::{JsonDirLedgerStore, LedgerStore, MemoryLedgerStore, Versioned};

/// Version shared by daemon and CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
