//! The most recent emitted prediction set (C9).
//!
//! One file, rewritten in whole on every emission. A missing or malformed
//! file reads as empty so a corrupt store never blocks the next emission.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::group::Group;
use crate::logging::EventLog;
use crate::predictors::Prediction;
use crate::store::lock::{LockBudget, StoreLock};

#[derive(Debug, Serialize, Deserialize)]
struct PredictionFile {
    predictions: Vec<StoredPrediction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPrediction {
    group: [u8; 4],
    score: f64,
}

/// Lock-guarded store for the last emitted prediction set.
pub struct PredictionStore {
    path: PathBuf,
    budget: LockBudget,
    log: EventLog,
}

impl PredictionStore {
    pub fn new(path: PathBuf, budget: LockBudget, log: EventLog) -> Self {
        Self { path, budget, log }
    }

    pub fn from_config(config: &EngineConfig, log: EventLog) -> Self {
        Self::new(
            config.predictions_path(),
            LockBudget::from_config(config),
            log,
        )
    }

    /// Reads the stored set in emission order; missing or corrupt is empty.
    pub fn load(&self) -> EngineResult<Vec<Prediction>> {
        let _lock = StoreLock::acquire(&self.path, &self.budget)?;
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return Ok(Vec::new()),
        };
        let file: PredictionFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(err) => {
                self.log.note(
                    "predictions_recovered",
                    &format!("{} failed to parse: {err}", self.path.display()),
                );
                return Ok(Vec::new());
            }
        };

        let mut predictions = Vec::with_capacity(file.predictions.len());
        for stored in file.predictions {
            match Group::new(stored.group) {
                Ok(group) => predictions.push(Prediction::new(group, stored.score)),
                Err(err) => {
                    self.log.note(
                        "predictions_recovered",
                        &format!("stored prediction is invalid: {err}"),
                    );
                    return Ok(Vec::new());
                }
            }
        }
        Ok(predictions)
    }

    /// Atomically replaces the stored set with the given emission.
    pub fn replace(&self, predictions: &[Prediction]) -> EngineResult<()> {
        let _lock = StoreLock::acquire(&self.path, &self.budget)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = PredictionFile {
            predictions: predictions
                .iter()
                .map(|p| StoredPrediction {
                    group: p.group.values(),
                    score: p.score,
                })
                .collect(),
        };
        let contents = serde_json::to_string_pretty(&file)
            .map_err(|err| EngineError::storage_corrupt(&self.path, err.to_string()))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}
