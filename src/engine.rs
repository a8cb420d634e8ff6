//! Caller-facing engine surface.
//!
//! One `PredictionEngine` owns the stores and the prediction pipeline and
//! exposes the operations external surfaces drive: status, full training,
//! prediction, the ingest-score-tune-emit cycle, and learning insights.
//! Validation happens at every entry point before any state changes; each
//! store update is a single atomic rewrite under its lock, so partially
//! completed mutations are impossible.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use crate::config::EngineConfig;
use crate::ensemble::Ensemble;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureExtractor;
use crate::filter::CandidateFilter;
use crate::group::{flatten_groups, Group};
use crate::logging::EventLog;
use crate::neural::{DrawNetwork, ModelArtifact};
use crate::predictors::{AuxPredictor, Prediction, PredictorId};
use crate::store::{AccuracyStore, DatasetStore, LockBudget, PredictionStore};
use crate::tracker::{LearningInsights, LearningTracker};
use crate::trainer::{Trainer, TrainingConfig, TrainingEvent};

/// Candidates requested from each predictor before combining.
const CANDIDATES_PER_PREDICTOR: usize = 15;
/// Neural candidates kept from the distribution beam.
const NEURAL_CANDIDATES: usize = 20;
/// Values considered per position when beaming over the distributions.
const BEAM_PER_POSITION: usize = 4;

/// Snapshot of the engine's externally visible state.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub is_trained: bool,
    pub dataset_size: usize,
    pub has_sufficient_data: bool,
    pub model_path: PathBuf,
    pub learning_stats: LearningInsights,
}

/// The prediction engine facade.
pub struct PredictionEngine {
    config: EngineConfig,
    dataset: DatasetStore,
    predictions: PredictionStore,
    tracker: LearningTracker,
    ensemble: Ensemble,
    extractor: FeatureExtractor,
    aux: Vec<AuxPredictor>,
    budget: LockBudget,
    log: EventLog,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let log = config
            .event_log
            .as_ref()
            .map(EventLog::new)
            .unwrap_or_else(EventLog::disabled);
        let budget = LockBudget::from_config(&config);
        Self {
            dataset: DatasetStore::from_config(&config, log.clone()),
            predictions: PredictionStore::from_config(&config, log.clone()),
            tracker: LearningTracker::new(AccuracyStore::from_config(&config, log.clone())),
            ensemble: Ensemble::new(config.weights),
            extractor: FeatureExtractor::new(),
            aux: AuxPredictor::default_lineup(),
            budget,
            log,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Externally visible engine state.
    pub fn get_status(&self) -> EngineResult<EngineStatus> {
        let dataset_size = self.dataset.size()?;
        Ok(EngineStatus {
            is_trained: ModelArtifact::is_trained_at(&self.config.model_path(), &self.budget),
            dataset_size,
            has_sufficient_data: dataset_size >= self.config.min_full_train,
            model_path: self.config.model_path(),
            learning_stats: self.tracker.insights()?,
        })
    }

    /// Full retrain from fresh weights; persists the artifact and emits a new
    /// prediction set.
    ///
    /// A dataset below the full-training threshold returns an empty list
    /// without touching the model artifact or the prediction store.
    pub fn train(&mut self, epochs: Option<usize>) -> EngineResult<Vec<Prediction>> {
        let dataset = self.dataset.load()?;
        if dataset.len() < self.config.min_full_train {
            self.log.record(
                "train_skipped",
                &json!({
                    "dataset_size": dataset.len(),
                    "required": self.config.min_full_train,
                }),
            );
            return Ok(Vec::new());
        }

        let epochs = epochs.unwrap_or(self.config.full_train_epochs);
        let network = self.run_training(
            DrawNetwork::for_features(self.config.hidden_size, self.config.seed),
            &dataset,
            self.training_config(epochs),
            self.config.min_full_train,
            "full training",
        )?;
        self.emit(&network, &dataset, self.config.top_k)
    }

    /// Ranked predictions from the last trained artifact and the dataset tail.
    pub fn predict(&self, top_k: usize) -> EngineResult<Vec<Prediction>> {
        let artifact = ModelArtifact::load(&self.config.model_path(), &self.budget)?;
        if !artifact.is_trained {
            return Err(EngineError::model_missing(&self.config.model_path()));
        }
        let dataset = self.dataset.load()?;
        let flat = flatten_groups(&dataset);
        if flat.len() < self.config.min_predict_integers {
            return Err(EngineError::insufficient_data(
                "prediction",
                flat.len(),
                self.config.min_predict_integers,
            ));
        }
        self.emit(&artifact.into_network(), &dataset, top_k)
    }

    /// The full ingest cycle: validate, append, score the previous emission,
    /// train or fine-tune as the thresholds allow, emit the next set.
    pub fn add_data_and_retrain(
        &mut self,
        group_string: &str,
        epochs: Option<usize>,
    ) -> EngineResult<Vec<Prediction>> {
        let group: Group = group_string.parse()?;
        let draw_index = self.dataset.append(group)?;

        let previous = self.predictions.load()?;
        if !previous.is_empty() {
            let record = self.tracker.score_draw(group, &previous)?;
            self.log.record(
                "prediction_scored",
                &json!({
                    "draw": draw_index,
                    "matches": record.matches_count,
                    "best_match_score": record.best_match_score,
                }),
            );
        }

        let dataset = self.dataset.load()?;
        let loaded = ModelArtifact::load(&self.config.model_path(), &self.budget)
            .ok()
            .filter(|artifact| artifact.is_trained);

        let network = if let Some(artifact) = loaded {
            if dataset.len() >= self.config.min_fine_tune {
                let epochs = epochs.unwrap_or(self.config.fine_tune_epochs);
                let config = self.training_config(epochs).fine_tune(epochs);
                Some(self.run_training(
                    artifact.into_network(),
                    &dataset,
                    config,
                    self.config.min_fine_tune,
                    "fine-tuning",
                )?)
            } else {
                Some(artifact.into_network())
            }
        } else if dataset.len() >= self.config.min_full_train {
            let epochs = epochs.unwrap_or(self.config.full_train_epochs);
            Some(self.run_training(
                DrawNetwork::for_features(self.config.hidden_size, self.config.seed),
                &dataset,
                self.training_config(epochs),
                self.config.min_full_train,
                "full training",
            )?)
        } else {
            None
        };

        let flat_len = dataset.len() * 4;
        match network {
            Some(network) if flat_len >= self.config.min_predict_integers => {
                self.emit(&network, &dataset, self.config.top_k)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Accuracy statistics and recommendations from the tracker.
    pub fn get_learning_insights(&self) -> EngineResult<LearningInsights> {
        self.tracker.insights()
    }

    // ---- internals ----

    fn training_config(&self, epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            learning_rate: self.config.learning_rate,
            seed: self.config.seed,
            ..TrainingConfig::default()
        }
    }

    /// Runs one training cycle and persists the updated artifact.
    fn run_training(
        &self,
        mut network: DrawNetwork,
        dataset: &[Group],
        config: TrainingConfig,
        min_groups: usize,
        operation: &'static str,
    ) -> EngineResult<DrawNetwork> {
        let log = self.log.clone();
        let mut sink = move |event: &TrainingEvent| log.record("training", event);
        let mut trainer = Trainer::new(config, &mut sink);
        let report = trainer.train(&mut network, dataset, min_groups, operation)?;

        ModelArtifact::from_network(&network, true).save(&self.config.model_path(), &self.budget)?;
        self.log.record(
            "artifact_saved",
            &json!({
                "operation": operation,
                "epochs_run": report.epochs_run,
                "best_loss": report.best_loss,
                "examples": report.examples,
            }),
        );
        Ok(network)
    }

    /// Runs the prediction pipeline and replaces the prediction store.
    fn emit(
        &self,
        network: &DrawNetwork,
        dataset: &[Group],
        top_k: usize,
    ) -> EngineResult<Vec<Prediction>> {
        let flat = flatten_groups(dataset);
        // One seeded stream per dataset state keeps repeated emissions
        // identical until the next append.
        let mut rng = StdRng::seed_from_u64(self.config.seed ^ dataset.len() as u64);

        let mut inputs = BTreeMap::new();
        inputs.insert(PredictorId::Neural, self.neural_candidates(network, &flat));
        for predictor in &self.aux {
            inputs.insert(
                predictor.id(),
                predictor.candidates(dataset, CANDIDATES_PER_PREDICTOR, &mut rng),
            );
        }

        let combined = self.ensemble.combine(&inputs);
        let tail_start = flat.len().saturating_sub(self.extractor.window());
        let emitted = CandidateFilter::new(top_k).apply(&combined, &flat[tail_start..]);

        self.predictions.replace(&emitted)?;
        self.log.record(
            "predictions_emitted",
            &json!({ "count": emitted.len(), "dataset_size": dataset.len() }),
        );
        Ok(emitted)
    }

    /// Beam over the per-position distributions: the top values of each
    /// position head combine into candidate groups scored by probability
    /// product. Invalid combinations are dropped, not repaired.
    fn neural_candidates(&self, network: &DrawNetwork, flat: &[u8]) -> Vec<Prediction> {
        let features = self.extractor.extract(flat);
        let distributions = network.position_distributions(&features);

        let mut top_values: Vec<Vec<(u8, f64)>> = Vec::with_capacity(4);
        for position in 0..4 {
            let mut ranked: Vec<(u8, f64)> = distributions
                .row(position)
                .iter()
                .enumerate()
                .map(|(class, &p)| (class as u8 + 1, f64::from(p)))
                .collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            ranked.truncate(BEAM_PER_POSITION);
            top_values.push(ranked);
        }

        let mut candidates = Vec::new();
        for &(a, pa) in &top_values[0] {
            for &(b, pb) in &top_values[1] {
                for &(c, pc) in &top_values[2] {
                    for &(d, pd) in &top_values[3] {
                        let Ok(group) = Group::new([a, b, c, d]) else {
                            continue;
                        };
                        // Geometric mean of the position probabilities keeps
                        // the product ordering at a workable magnitude.
                        let score = (pa * pb * pc * pd).powf(0.25);
                        if score.is_finite() && score > 0.0 {
                            candidates.push(Prediction::new(group, score));
                        }
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.group.values().cmp(&b.group.values()))
        });
        candidates.truncate(NEURAL_CANDIDATES);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(dir: &std::path::Path) -> PredictionEngine {
        let mut config = EngineConfig::with_data_dir(dir);
        config.hidden_size = 16;
        config.full_train_epochs = 2;
        config.fine_tune_epochs = 1;
        PredictionEngine::new(config)
    }

    #[test]
    fn test_neural_candidates_are_valid_and_ranked() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let network = DrawNetwork::for_features(16, 3);
        let flat: Vec<u8> = (0..40).map(|i| (i % 26) as u8 + 1).collect();

        let candidates = engine.neural_candidates(&network, &flat);
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= NEURAL_CANDIDATES);
        for window in candidates.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for c in &candidates {
            assert!(Group::is_valid(c.group.values()));
        }
    }

    #[test]
    fn test_status_on_empty_engine() {
        let dir = tempfile::tempdir().unwrap();
        let status = engine(dir.path()).get_status().unwrap();
        assert!(!status.is_trained);
        assert_eq!(status.dataset_size, 0);
        assert!(!status.has_sufficient_data);
    }

    #[test]
    fn test_predict_without_artifact_is_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        match engine(dir.path()).predict(4) {
            Err(EngineError::ModelMissing { .. }) => {}
            other => panic!("expected ModelMissing, got {other:?}"),
        }
    }
}
