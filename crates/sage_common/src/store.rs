//! Ledger persistence.
//!
//! One ledger per user, versioned for optimistic concurrency: `save` only
//! succeeds when the caller read the version currently stored.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SageError};
use crate::identity::UserId;
use crate::progress::UserProgressLedger;

/// A value together with the version it was read at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub data: T,
}

pub trait LedgerStore: Send + Sync {
    fn load(&self, user: &UserId) -> Result<Option<Versioned<UserProgressLedger>>>;

    /// Compare-and-swap. `expected` is the version read by the caller, `None`
    /// if the ledger did not exist. Returns the new version.
    fn save(&self, ledger: &UserProgressLedger, expected: Option<u64>) -> Result<u64>;

    fn all(&self) -> Result<Vec<UserProgressLedger>>;
}

fn check_version(user: &UserId, expected: Option<u64>, actual: Option<u64>) -> Result<u64> {
    if expected != actual {
        return Err(SageError::PersistenceConflict {
            user: user.to_string(),
            expected,
            actual,
        });
    }
    Ok(actual.map_or(1, |v| v + 1))
}

fn poisoned() -> SageError {
    SageError::PersistenceUnavailable("ledger store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledgers: Mutex<HashMap<UserId, Versioned<UserProgressLedger>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self, user: &UserId) -> Result<Option<Versioned<UserProgressLedger>>> {
        let ledgers = self.ledgers.lock().map_err(|_| poisoned())?;
        Ok(ledgers.get(user).cloned())
    }

    fn save(&self, ledger: &UserProgressLedger, expected: Option<u64>) -> Result<u64> {
        let mut ledgers = self.ledgers.lock().map_err(|_| poisoned())?;
        let actual = ledgers.get(&ledger.user_id).map(|v| v.version);
        let version = check_version(&ledger.user_id, expected, actual)?;
        ledgers.insert(
            ledger.user_id.clone(),
            Versioned {
                version,
                data: ledger.clone(),
            },
        );
        Ok(version)
    }

    fn all(&self) -> Result<Vec<UserProgressLedger>> {
        let ledgers = self.ledgers.lock().map_err(|_| poisoned())?;
        Ok(ledgers.values().map(|v| v.data.clone()).collect())
    }
}

/// One JSON file per user under `<data_dir>/ledgers/`
pub struct JsonDirLedgerStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirLedgerStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = data_dir.into().join("ledgers");
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn file_for(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_name(user.as_str())))
    }

    fn read_file(path: &Path) -> Result<Option<Versioned<UserProgressLedger>>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let record = serde_json::from_str(&content)?;
        Ok(Some(record))
    }
}

impl LedgerStore for JsonDirLedgerStore {
    fn load(&self, user: &UserId) -> Result<Option<Versioned<UserProgressLedger>>> {
        Self::read_file(&self.file_for(user))
    }

    fn save(&self, ledger: &UserProgressLedger, expected: Option<u64>) -> Result<u64> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;

        let path = self.file_for(&ledger.user_id);
        let actual = Self::read_file(&path)?.map(|v| v.version);
        let version = check_version(&ledger.user_id, expected, actual)?;

        let record = Versioned {
            version,
            data: ledger,
        };
        let content = serde_json::to_string_pretty(&record)?;

        // Write-then-rename so readers never see a half-written ledger
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        debug!("Saved ledger for {} at version {}", ledger.user_id, version);
        Ok(version)
    }

    fn all(&self) -> Result<Vec<UserProgressLedger>> {
        let mut ledgers = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_file(&path) {
                Ok(Some(record)) => ledgers.push(record.data),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable ledger {}: {}", path.display(), e),
            }
        }
        Ok(ledgers)
    }
}

/// Percent-encode everything outside `[A-Za-z0-9_-]`
fn encode_file_name(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
