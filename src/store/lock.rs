//! Scoped advisory file locking for the on-disk stores.
//!
//! Every store file `<file>` is guarded by an exclusive advisory lock on a
//! sibling `<file>.lock`. Acquisition retries a bounded number of times with
//! a fixed delay and surfaces `StorageLocked` on exhaustion; the caller is
//! expected to retry. Dropping the guard unlocks and best-effort removes the
//! lock file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Bounded retry budget for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockBudget {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LockBudget {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(100),
        }
    }
}

impl LockBudget {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.lock_attempts,
            Duration::from_millis(config.lock_delay_ms),
        )
    }
}

/// RAII guard over the `<file>.lock` advisory lock.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    lock_path: PathBuf,
}

impl StoreLock {
    /// Acquires the exclusive lock guarding `target`.
    ///
    /// # Errors
    ///
    /// Returns `StorageLocked` when the lock stays contended for the whole
    /// retry budget; I/O errors creating the lock file are surfaced as `Io`.
    pub fn acquire(target: &Path, budget: &LockBudget) -> EngineResult<Self> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        for attempt in 0..budget.attempts {
            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file, lock_path });
            }
            if attempt + 1 < budget.attempts {
                std::thread::sleep(budget.delay);
            }
        }
        Err(EngineError::storage_locked(target, budget.attempts))
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        // Best-effort cleanup; a concurrent holder recreates it anyway.
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// `dataset.json` locks through `dataset.json.lock`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path_shape() {
        assert_eq!(
            lock_path_for(Path::new("/tmp/x/dataset.json")),
            PathBuf::from("/tmp/x/dataset.json.lock")
        );
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");
        let budget = LockBudget::default();

        let lock = StoreLock::acquire(&target, &budget).unwrap();
        assert!(lock.lock_path().exists());
        drop(lock);

        // Reacquirable after release; the lock file is gone.
        let lock = StoreLock::acquire(&target, &budget).unwrap();
        drop(lock);
        assert!(!lock_path_for(&target).exists());
    }

    #[test]
    fn test_contention_exhausts_budget() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");
        let budget = LockBudget::new(2, Duration::from_millis(5));

        let held = StoreLock::acquire(&target, &budget).unwrap();
        let contended = StoreLock::acquire(&target, &budget);
        match contended {
            Err(EngineError::StorageLocked { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected StorageLocked, got {other:?}"),
        }
        drop(held);
    }
}
