//! Lock-guarded persistence for the four on-disk stores.
//!
//! Every store follows the same discipline: acquire the advisory lock on
//! `<file>.lock`, read, mutate in memory, rewrite the whole file, release.
//! No partial-update semantics exist anywhere in the layer.

pub mod accuracy;
pub mod dataset;
pub mod lock;
pub mod predictions;

pub use accuracy::{AccuracyHistory, AccuracyRecord, AccuracyStore};
pub use dataset::{DatasetStore, DrawRecord};
pub use lock::{LockBudget, StoreLock};
pub use predictions::PredictionStore;
