//! Supervised training of the neural predictor from the dataset.
//!
//! Training examples slide a window across the flattened draw history: the
//! input is the feature vector of the trailing window, the target is the
//! next four integers as independent classification targets. One trainer
//! handles both modes; full training starts from fresh weights, fine-tuning
//! starts from loaded weights with a halved learning rate and a smaller
//! epoch budget. Progress is reported through an injected sink the trainer
//! knows nothing about.

use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::features::{FeatureExtractor, FEATURE_WIDTH};
use crate::group::{flatten_groups, Group};
use crate::neural::loss::position_cross_entropy;
use crate::neural::network::POSITIONS;
use crate::neural::{AdamOptimizer, DrawNetwork};

/// Learning rate never scheduled below this floor.
const LR_FLOOR: f32 = 1e-6;
/// Epoch loss must improve by at least this much to count.
const IMPROVEMENT_EPSILON: f32 = 1e-6;

/// Progress events emitted during a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TrainingEvent {
    EpochStarted { epoch: usize, total: usize },
    EpochCompleted { epoch: usize, loss: f32 },
    BestModelSaved { epoch: usize, loss: f32 },
    Finished { epochs_run: usize, best_loss: f32 },
}

/// Caller-supplied receiver of [`TrainingEvent`]s.
pub trait ProgressSink {
    fn emit(&mut self, event: &TrainingEvent);
}

/// A sink that drops every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: &TrainingEvent) {}
}

impl<F: FnMut(&TrainingEvent)> ProgressSink for F {
    fn emit(&mut self, event: &TrainingEvent) {
        self(event)
    }
}

/// Hyperparameters of one training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
    /// Coefficient of the L2 term added to the reported loss.
    pub l2_penalty: f32,
    pub batch_size: usize,
    /// Epochs without improvement before training stops.
    pub early_stop_patience: usize,
    /// Epochs without improvement before the learning rate halves.
    pub lr_patience: usize,
    /// Global gradient-norm ceiling.
    pub grad_clip: f32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            learning_rate: 1e-3,
            weight_decay: 1e-4,
            l2_penalty: 1e-5,
            batch_size: 32,
            early_stop_patience: 5,
            lr_patience: 2,
            grad_clip: 1.0,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Derives the incremental fine-tune variant: halved learning rate and
    /// the given (smaller) epoch budget, same data pipeline.
    pub fn fine_tune(&self, epochs: usize) -> Self {
        Self {
            epochs: epochs.max(1),
            learning_rate: (self.learning_rate * 0.5).max(LR_FLOOR),
            ..*self
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_loss: f32,
    pub examples: usize,
}

/// The trainer (C4).
pub struct Trainer<'a> {
    config: TrainingConfig,
    extractor: FeatureExtractor,
    sink: &'a mut dyn ProgressSink,
}

impl<'a> Trainer<'a> {
    pub fn new(config: TrainingConfig, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            config,
            extractor: FeatureExtractor::new(),
            sink,
        }
    }

    /// Fits the network in place.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when the dataset holds fewer than `min_groups`
    /// groups or yields no training example.
    pub fn train(
        &mut self,
        network: &mut DrawNetwork,
        dataset: &[Group],
        min_groups: usize,
        operation: &'static str,
    ) -> EngineResult<TrainingReport> {
        if dataset.len() < min_groups {
            return Err(EngineError::insufficient_data(
                operation,
                dataset.len(),
                min_groups,
            ));
        }

        let (inputs, targets) = self.build_examples(dataset);
        if inputs.is_empty() {
            return Err(EngineError::insufficient_data(
                operation,
                dataset.len(),
                min_groups,
            ));
        }

        let mut optimizer = AdamOptimizer::new(self.config.learning_rate, self.config.weight_decay);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..inputs.len()).collect();

        let mut best_loss = f32::INFINITY;
        let mut best_weights: Option<DrawNetwork> = None;
        let mut stall = 0usize;
        let mut lr_stall = 0usize;
        let mut epochs_run = 0usize;

        for epoch in 0..self.config.epochs {
            epochs_run = epoch + 1;
            self.sink.emit(&TrainingEvent::EpochStarted {
                epoch,
                total: self.config.epochs,
            });

            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f32;
            let mut batches = 0usize;

            for chunk in order.chunks(self.config.batch_size) {
                let Some(loss) =
                    self.train_batch(network, &mut optimizer, &inputs, &targets, chunk, &mut rng)
                else {
                    // Non-finite loss or gradients: skip the step, keep the epoch.
                    continue;
                };
                loss_sum += loss;
                batches += 1;
            }
            if batches == 0 {
                continue;
            }

            let epoch_loss = loss_sum / batches as f32;
            self.sink.emit(&TrainingEvent::EpochCompleted {
                epoch,
                loss: epoch_loss,
            });

            if epoch_loss + IMPROVEMENT_EPSILON < best_loss {
                best_loss = epoch_loss;
                best_weights = Some(network.clone());
                stall = 0;
                lr_stall = 0;
                self.sink.emit(&TrainingEvent::BestModelSaved {
                    epoch,
                    loss: epoch_loss,
                });
            } else {
                stall += 1;
                lr_stall += 1;
                if lr_stall >= self.config.lr_patience {
                    optimizer.halve_learning_rate(LR_FLOOR);
                    lr_stall = 0;
                }
                if stall >= self.config.early_stop_patience {
                    break;
                }
            }
        }

        if let Some(best) = best_weights {
            *network = best;
        }
        let best_loss = if best_loss.is_finite() { best_loss } else { 0.0 };
        self.sink.emit(&TrainingEvent::Finished {
            epochs_run,
            best_loss,
        });

        Ok(TrainingReport {
            epochs_run,
            best_loss,
            examples: inputs.len(),
        })
    }

    /// Window-sliding example construction over the flattened history.
    fn build_examples(&self, dataset: &[Group]) -> (Vec<ndarray::Array1<f32>>, Vec<[usize; 4]>) {
        let flat = flatten_groups(dataset);
        let window = self.extractor.window();
        let end = flat.len().saturating_sub(POSITIONS);
        if end <= window {
            return (Vec::new(), Vec::new());
        }

        let starts: Vec<usize> = (window..end).collect();
        let extractor = &self.extractor;
        let inputs: Vec<ndarray::Array1<f32>> = starts
            .par_iter()
            .map(|&i| extractor.extract(&flat[i - window..i]))
            .collect();
        let targets: Vec<[usize; 4]> = starts
            .iter()
            .map(|&i| {
                // 1..=26 shifts to the 0-based classes fed to cross-entropy.
                [
                    usize::from(flat[i]) - 1,
                    usize::from(flat[i + 1]) - 1,
                    usize::from(flat[i + 2]) - 1,
                    usize::from(flat[i + 3]) - 1,
                ]
            })
            .collect();
        (inputs, targets)
    }

    fn train_batch(
        &self,
        network: &mut DrawNetwork,
        optimizer: &mut AdamOptimizer,
        inputs: &[ndarray::Array1<f32>],
        targets: &[[usize; 4]],
        chunk: &[usize],
        rng: &mut StdRng,
    ) -> Option<f32> {
        let mut batch = Array2::zeros((chunk.len(), FEATURE_WIDTH));
        let mut batch_targets = Vec::with_capacity(chunk.len());
        for (row, &example) in chunk.iter().enumerate() {
            batch.row_mut(row).assign(&inputs[example]);
            batch_targets.push(targets[example]);
        }

        let trace = network.forward_training(&batch, rng);
        let (cross_entropy, grad_logits) = position_cross_entropy(&trace.logits, &batch_targets);
        let loss = cross_entropy + self.config.l2_penalty * network.parameter_norm_sq();
        if !loss.is_finite() {
            return None;
        }

        let mut grads = network.backward(&trace, &grad_logits);
        if !grads.is_finite() {
            return None;
        }
        grads.clip(self.config.grad_clip);

        optimizer.begin_step();
        optimizer.step_matrix("w1", &mut network.w1, &grads.w1);
        optimizer.step_vector("b1", &mut network.b1, &grads.b1);
        optimizer.step_matrix("w2", &mut network.w2, &grads.w2);
        optimizer.step_vector("b2", &mut network.b2, &grads.b2);
        optimizer.step_matrix("w3", &mut network.w3, &grads.w3);
        optimizer.step_vector("b3", &mut network.b3, &grads.b3);

        Some(loss)
    }
}
