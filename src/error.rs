//! Crate-wide error taxonomy.
//!
//! Precondition violations (`InvalidGroup`, `InsufficientData`, `ModelMissing`)
//! are raised to the caller. `StorageLocked` is raised after the retry budget
//! is exhausted and is retryable. Corrupt optional stores are recovered as
//! empty reads by the store layer and never abort a run.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Convenience alias used across the crate.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input fails the group invariants (length, range, pair distinctness).
    #[error("invalid group: {reason}")]
    InvalidGroup { reason: String },

    /// The dataset is smaller than the requested operation requires.
    #[error("insufficient data for {operation}: have {have}, need {need}")]
    InsufficientData {
        operation: &'static str,
        have: usize,
        need: usize,
    },

    /// The advisory file lock could not be acquired within the retry budget.
    #[error("store {path} is locked (gave up after {attempts} attempts)")]
    StorageLocked { path: PathBuf, attempts: u32 },

    /// On-disk state failed to parse or violated a shape invariant.
    #[error("store {path} is corrupt: {detail}")]
    StorageCorrupt { path: PathBuf, detail: String },

    /// Prediction was requested but no usable model artifact exists.
    #[error("no trained model artifact at {path}")]
    ModelMissing { path: PathBuf },

    /// An indexed append skipped over one or more draw indices.
    #[error("draw index gap: expected {expected}, got {got}")]
    IndexGap { expected: u64, got: u64 },

    /// An indexed append repeated an already-stored draw index.
    #[error("duplicate draw index {index}")]
    DuplicateIndex { index: u64 },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_group(reason: impl Into<String>) -> Self {
        Self::InvalidGroup {
            reason: reason.into(),
        }
    }

    pub fn insufficient_data(operation: &'static str, have: usize, need: usize) -> Self {
        Self::InsufficientData {
            operation,
            have,
            need,
        }
    }

    pub fn storage_locked(path: &Path, attempts: u32) -> Self {
        Self::StorageLocked {
            path: path.to_path_buf(),
            attempts,
        }
    }

    pub fn storage_corrupt(path: &Path, detail: impl Into<String>) -> Self {
        Self::StorageCorrupt {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    pub fn model_missing(path: &Path) -> Self {
        Self::ModelMissing {
            path: path.to_path_buf(),
        }
    }

    /// True for errors the caller is expected to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageLocked { .. })
    }
}
