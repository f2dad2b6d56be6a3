//! JSON file persistence for the betting ledger.
//!
//! The on-disk format is `{"bets": [...]}` with four-space indentation.
//! Writes go to a uniquely-named temporary file next to the ledger, are
//! fsynced, then renamed over it, so readers only ever see a complete file.
//! Writers from different processes are serialized with an advisory lock
//! file created via `create_new`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::ledger::BetRecord;
use crate::error::{BettingError, Result};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    bets: Vec<BetRecord>,
}

/// Lock acquisition settings.
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    /// How long a writer waits for the lock before giving up.
    pub timeout: Duration,
    /// Lock files older than this belong to a crashed writer and are removed.
    pub stale_after: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(60),
        }
    }
}

pub struct LedgerStore {
    path: PathBuf,
    lock: LockSettings,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>, lock: LockSettings) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    /// Read every record. A missing file is an empty ledger.
    pub fn load(&self) -> Result<Vec<BetRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No ledger file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let document: LedgerDocument = serde_json::from_str(&contents)?;
        debug!(path = %self.path.display(), bets = document.bets.len(), "Ledger loaded");
        Ok(document.bets)
    }

    /// Atomically replace the file contents with `records`.
    pub fn save(&self, records: &[BetRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = sibling(&self.path, &format!("{}.tmp", Uuid::new_v4()));
        let result = write_document(&tmp_path, records)
            .and_then(|()| fs::rename(&tmp_path, &self.path).map_err(BettingError::from));

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        debug!(path = %self.path.display(), bets = records.len(), "Ledger saved");
        Ok(())
    }

    /// Take the cross-process write lock. Released when the guard drops.
    pub fn lock(&self) -> Result<StoreLock> {
        let lock_path = self.lock_path();
        let token = Uuid::new_v4();
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{} {}", std::process::id(), token) {
                        warn!(path = %lock_path.display(), error = %e, "Failed to write ledger lock owner");
                        drop(file);
                        let _ = fs::remove_file(&lock_path);
                        return Err(e.into());
                    }
                    return Ok(StoreLock { path: lock_path, token });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.reclaim_stale(&lock_path)? {
                        continue;
                    }
                    if started.elapsed() >= self.lock.timeout {
                        return Err(BettingError::LockTimeout {
                            path: lock_path.display().to_string(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove `lock_path` if it belongs to a crashed writer.
    ///
    /// Reclaimers serialize on a second `create_new` guard file and re-check
    /// staleness while holding it, so a lock another writer has just taken
    /// is never removed.
    fn reclaim_stale(&self, lock_path: &Path) -> Result<bool> {
        if !self.is_stale(lock_path) {
            return Ok(false);
        }

        let guard_path = sibling(lock_path, "reclaim");
        match OpenOptions::new().write(true).create_new(true).open(&guard_path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if self.is_stale(&guard_path) {
                    warn!(path = %guard_path.display(), "Removing abandoned lock reclaim guard");
                    let _ = fs::remove_file(&guard_path);
                }
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let reclaimed = self.is_stale(lock_path);
        if reclaimed {
            warn!(path = %lock_path.display(), "Removing stale ledger lock");
            match fs::remove_file(lock_path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    warn!(path = %lock_path.display(), error = %e, "Failed to remove stale ledger lock");
                }
                _ => {}
            }
        }
        if let Err(e) = fs::remove_file(&guard_path) {
            warn!(path = %guard_path.display(), error = %e, "Failed to remove lock reclaim guard");
        }
        Ok(reclaimed)
    }

    fn is_stale(&self, lock_path: &Path) -> bool {
        fs::metadata(lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.lock.stale_after)
    }
}

/// Held while a writer owns the ledger file.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    /// Written into the lock file; a lock reclaimed and retaken by another
    /// writer no longer carries it.
    token: Uuid,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        match fs::read_to_string(&self.path) {
            Ok(owner) if owner.contains(&self.token.to_string()) => {
                if let Err(e) = fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %e, "Failed to release ledger lock");
                }
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "Ledger lock was reclaimed by another writer, leaving it");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ledger lock vanished before release");
            }
        }
    }
}

fn write_document(path: &Path, records: &[BetRecord]) -> Result<()> {
    let document = LedgerDocument {
        bets: records.to_vec(),
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    buf.push(b'\n');

    let mut file = File::create(path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    Ok(())
}

/// `betting_history.json` + `lock` -> `betting_history.json.lock`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
