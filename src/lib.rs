//! # Draw Prediction Core
//!
//! A self-learning prediction engine for paired-number draws. Each draw is a
//! group of four integers in `[1, 26]` arranged as two unordered pairs; the
//! engine keeps an append-only dataset of past draws, trains a neural
//! predictor over that history and, on every new draw, scores its previous
//! predictions, fine-tunes the model and emits a fresh ranked candidate
//! list fused from neural, frequency, pattern and statistical predictors.
//!
//! ## Quick Start
//!
//! ```rust
//! use draw_prediction_core::{match_groups, Group};
//!
//! let predicted: Group = "5 22 18 11".parse().unwrap();
//! let actual: Group = "19 5 18 4".parse().unwrap();
//!
//! // Pairs match as unordered 2-sets on the same side.
//! let report = match_groups(&predicted, &actual);
//! assert_eq!(report.total_matches, 2);
//! assert_eq!(report.score(), 0.5);
//! ```
//!
//! Driving the full engine needs a data directory:
//!
//! ```ignore
//! use draw_prediction_core::{EngineConfig, PredictionEngine};
//!
//! let mut engine = PredictionEngine::new(EngineConfig::with_data_dir("data"));
//! let predictions = engine.add_data_and_retrain("5 22 18 11", None)?;
//! for p in predictions {
//!     println!("{}  {:.6}", p.group, p.score);
//! }
//! ```
//!
//! ## Core Modules
//!
//! - [`config`] - engine configuration via TOML
//! - [`engine`] - the caller-facing surface
//! - [`features`] - history-to-feature mapping
//! - [`neural`] - the feed-forward predictor and its checkpoint format
//! - [`predictors`] - frequency, pattern and statistical candidate generators
//! - [`ensemble`] - weighted fusion into one ranked list
//! - [`tracker`] - prediction scoring against realized draws
//! - [`store`] - lock-guarded JSON and binary stores

pub mod config;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod filter;
pub mod group;
pub mod logging;
pub mod neural;
pub mod predictors;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod trainer;

pub use config::{EngineConfig, EnsembleWeights};
pub use engine::{EngineStatus, PredictionEngine};
pub use ensemble::Ensemble;
pub use error::{EngineError, EngineResult};
pub use features::{FeatureExtractor, FEATURE_WIDTH, HISTORY_WINDOW};
pub use filter::CandidateFilter;
pub use group::{flatten_groups, match_groups, Group, MatchReport};
pub use neural::{DrawNetwork, ModelArtifact};
pub use predictors::{Prediction, PredictorId};
pub use tracker::{LearningInsights, LearningTracker};
pub use trainer::{NullSink, ProgressSink, Trainer, TrainingConfig, TrainingEvent};
