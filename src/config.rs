//! Engine configuration management via TOML files.
//!
//! All tunables are injected at construction; nothing reads process-wide
//! state. Missing keys fall back to the documented defaults, so a partial
//! file (or no file at all) always yields a working configuration.

use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Value;

use crate::error::{EngineError, EngineResult};

/// Relative weight of each predictor inside the ensemble.
///
/// Weights need not sum to 1; only their relative magnitude matters. They are
/// fixed at construction and never changed at runtime.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnsembleWeights {
    pub neural: f64,
    pub statistical: f64,
    pub pattern: f64,
    pub frequency: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            neural: 0.6,
            statistical: 0.3,
            pattern: 0.25,
            frequency: 0.2,
        }
    }
}

/// Engine configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use draw_prediction_core::EngineConfig;
///
/// let config = EngineConfig::from_toml_str("[engine]\ntop_k = 4").unwrap();
/// assert_eq!(config.top_k, 4);
/// assert_eq!(config.min_full_train, 50);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    /// Directory holding every on-disk store.
    pub data_dir: PathBuf,
    /// Seed for all stochastic paths (weight init, sampling, shuffling).
    pub seed: u64,
    /// Default number of predictions returned from an emission.
    pub top_k: usize,
    /// Minimum dataset size (groups) for a full training run.
    pub min_full_train: usize,
    /// Minimum dataset size (groups) for an incremental fine-tune.
    pub min_fine_tune: usize,
    /// Minimum flattened history length (integers) required to predict.
    pub min_predict_integers: usize,
    /// Hidden layer width of the neural predictor.
    pub hidden_size: usize,
    /// Epoch budget for a full training run.
    pub full_train_epochs: usize,
    /// Epoch budget for an incremental fine-tune.
    pub fine_tune_epochs: usize,
    /// Base learning rate; fine-tuning halves it.
    pub learning_rate: f32,
    /// Ensemble weights per predictor.
    pub weights: EnsembleWeights,
    /// File-lock acquisition attempts before `StorageLocked`.
    pub lock_attempts: u32,
    /// Delay between lock attempts, in milliseconds.
    pub lock_delay_ms: u64,
    /// Optional JSON-lines event log path; `None` disables logging.
    pub event_log: Option<PathBuf>,
}

impl EngineConfig {
    /// Configuration rooted at the given data directory, all else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> EngineResult<Self> {
        let value: Value = toml::from_str(toml_str)
            .map_err(|err| EngineError::storage_corrupt(Path::new("config"), err.to_string()))?;
        let engine = value
            .get("engine")
            .and_then(|v| v.as_table())
            .cloned()
            .unwrap_or_default();

        let defaults = Self::default();

        let data_dir = engine
            .get("data_dir")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let seed = read_integer(&engine, "seed", defaults.seed as i64).max(0) as u64;
        let top_k = read_integer(&engine, "top_k", defaults.top_k as i64).max(1) as usize;
        let min_full_train =
            read_integer(&engine, "min_full_train", defaults.min_full_train as i64).max(1) as usize;
        let min_fine_tune =
            read_integer(&engine, "min_fine_tune", defaults.min_fine_tune as i64).max(1) as usize;
        let min_predict_integers = read_integer(
            &engine,
            "min_predict_integers",
            defaults.min_predict_integers as i64,
        )
        .max(4) as usize;
        let hidden_size =
            read_integer(&engine, "hidden_size", defaults.hidden_size as i64).max(4) as usize;
        let full_train_epochs = read_integer(
            &engine,
            "full_train_epochs",
            defaults.full_train_epochs as i64,
        )
        .max(1) as usize;
        let fine_tune_epochs =
            read_integer(&engine, "fine_tune_epochs", defaults.fine_tune_epochs as i64).max(1)
                as usize;
        let learning_rate = read_float(&engine, "learning_rate", defaults.learning_rate as f64)
            .clamp(1e-6, 1.0) as f32;
        let lock_attempts =
            read_integer(&engine, "lock_attempts", defaults.lock_attempts as i64).max(1) as u32;
        let lock_delay_ms =
            read_integer(&engine, "lock_delay_ms", defaults.lock_delay_ms as i64).max(1) as u64;
        let event_log = engine
            .get("event_log")
            .and_then(|v| v.as_str())
            .map(PathBuf::from);

        let weights = value
            .get("weights")
            .and_then(|v| v.as_table())
            .map(|table| {
                let base = EnsembleWeights::default();
                EnsembleWeights {
                    neural: read_float(table, "neural", base.neural),
                    statistical: read_float(table, "statistical", base.statistical),
                    pattern: read_float(table, "pattern", base.pattern),
                    frequency: read_float(table, "frequency", base.frequency),
                }
            })
            .unwrap_or_default();

        Ok(Self {
            data_dir,
            seed,
            top_k,
            min_full_train,
            min_fine_tune,
            min_predict_integers,
            hidden_size,
            full_train_epochs,
            fine_tune_epochs,
            learning_rate,
            weights,
            lock_attempts,
            lock_delay_ms,
            event_log,
        })
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join("dataset.json")
    }

    pub fn info_path(&self) -> PathBuf {
        self.data_dir.join("info.json")
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.data_dir.join("predictions.json")
    }

    pub fn learning_results_path(&self) -> PathBuf {
        self.data_dir.join("learning_results.json")
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join("model.bin")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            seed: 42,
            top_k: 10,
            min_full_train: 50,
            min_fine_tune: 30,
            min_predict_integers: 25,
            hidden_size: 128,
            full_train_epochs: 20,
            fine_tune_epochs: 5,
            learning_rate: 1e-3,
            weights: EnsembleWeights::default(),
            lock_attempts: 5,
            lock_delay_ms: 100,
            event_log: None,
        }
    }
}

fn read_integer(table: &toml::value::Table, key: &str, fallback: i64) -> i64 {
    table
        .get(key)
        .and_then(|v| v.as_integer())
        .unwrap_or(fallback)
}

fn read_float(table: &toml::value::Table, key: &str, fallback: f64) -> f64 {
    table
        .get(key)
        .map(|value| {
            if let Some(float) = value.as_float() {
                float
            } else if let Some(int) = value.as_integer() {
                int as f64
            } else {
                fallback
            }
        })
        .unwrap_or(fallback)
}
