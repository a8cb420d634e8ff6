//! Append-only accuracy history for the self-learning tracker.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::logging::EventLog;
use crate::store::lock::{LockBudget, StoreLock};

/// One persisted evaluation of a prediction set against a realized draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccuracyRecord {
    /// ISO-8601 evaluation timestamp.
    pub timestamp: String,
    pub actual_group: [u8; 4],
    /// Best pair-set match fraction in `[0, 1]`.
    pub best_match_score: f64,
    /// Pair-set matches of the best prediction, `0..=4`.
    pub matches_count: u8,
    pub analyzed_predictions_count: usize,
    /// The best-matching prediction, if any prediction was analyzed.
    pub best_prediction: Option<[u8; 4]>,
    /// Confidence score the best prediction carried when emitted.
    pub prediction_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyHistory {
    pub performance_history: Vec<AccuracyRecord>,
    pub last_updated: String,
}

/// Lock-guarded store for the accuracy history file.
pub struct AccuracyStore {
    path: PathBuf,
    budget: LockBudget,
    log: EventLog,
}

impl AccuracyStore {
    pub fn new(path: PathBuf, budget: LockBudget, log: EventLog) -> Self {
        Self { path, budget, log }
    }

    pub fn from_config(config: &EngineConfig, log: EventLog) -> Self {
        Self::new(
            config.learning_results_path(),
            LockBudget::from_config(config),
            log,
        )
    }

    /// Reads the full history; missing or corrupt reads as empty.
    pub fn load(&self) -> EngineResult<AccuracyHistory> {
        let _lock = StoreLock::acquire(&self.path, &self.budget)?;
        Ok(self.read_unlocked())
    }

    /// Appends one record and refreshes `last_updated`.
    pub fn append(&self, record: AccuracyRecord) -> EngineResult<()> {
        let _lock = StoreLock::acquire(&self.path, &self.budget)?;
        let mut history = self.read_unlocked();
        history.performance_history.push(record);
        history.last_updated = Utc::now().to_rfc3339();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&history)
            .map_err(|err| EngineError::storage_corrupt(&self.path, err.to_string()))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn read_unlocked(&self) -> AccuracyHistory {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return AccuracyHistory::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(history) => history,
            Err(err) => {
                self.log.note(
                    "accuracy_recovered",
                    &format!("{} failed to parse: {err}", self.path.display()),
                );
                AccuracyHistory::default()
            }
        }
    }
}
