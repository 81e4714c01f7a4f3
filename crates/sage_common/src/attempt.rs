//! Puzzle attempt audit log.
//!
//! Every judged submission is appended here, right or wrong. Records are
//! never rewritten. The JSONL backend appends one line per attempt with fsync.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::catalog::PuzzleType;
use crate::error::{Result, SageError};
use crate::identity::UserId;

/// A single judged submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleAttempt {
    pub id: Uuid,
    pub user_id: UserId,
    pub topic_id: String,
    pub path_id: String,
    pub puzzle_type: PuzzleType,
    pub puzzle_data: Value,
    pub user_answers: Value,
    pub is_correct: bool,
    pub score: u32,
    /// Seconds
    pub time_taken: u64,
    /// Set when the type could not be judged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only store of attempts
pub trait AttemptLog: Send + Sync {
    fn append(&self, attempt: &PuzzleAttempt) -> Result<()>;

    /// All attempts by one user, oldest first
    fn for_user(&self, user: &UserId) -> Result<Vec<PuzzleAttempt>>;
}

#[derive(Debug, Default)]
pub struct MemoryAttemptLog {
    attempts: Mutex<Vec<PuzzleAttempt>>,
}

impl MemoryAttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttemptLog for MemoryAttemptLog {
    fn append(&self, attempt: &PuzzleAttempt) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| SageError::PersistenceUnavailable("attempt log lock poisoned".into()))?;
        attempts.push(attempt.clone());
        Ok(())
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<PuzzleAttempt>> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|_| SageError::PersistenceUnavailable("attempt log lock poisoned".into()))?;
        Ok(attempts.iter().filter(|a| &a.user_id == user).cloned().collect())
    }
}

/// Attempt log backed by a JSONL file
pub struct JsonlAttemptLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAttemptLog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join("attempts.jsonl");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<PuzzleAttempt>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut attempts = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(attempt) => attempts.push(attempt),
                Err(e) => {
                    // A torn final line after a crash should not hide the rest
                    warn!("Skipping malformed attempt line: {}", e);
                }
            }
        }

        Ok(attempts)
    }
}

impl AttemptLog for JsonlAttemptLog {
    fn append(&self, attempt: &PuzzleAttempt) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SageError::PersistenceUnavailable("attempt log lock poisoned".into()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(attempt)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        Ok(())
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<PuzzleAttempt>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|a| &a.user_id == user)
            .collect())
    }
}
