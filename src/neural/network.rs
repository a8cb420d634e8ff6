//! Feed-forward network mapping feature vectors to per-position distributions.
//!
//! Architecture: a 3-layer MLP (`input -> hidden -> hidden -> 4*26`) with
//! ReLU activations and dropout on the hidden layers during training. The
//! 104-wide output reshapes to four rows of 26 logits, one row per group
//! position; a per-row softmax turns each into a distribution over `{1..26}`.
//! The network is deterministic given its weights, its input, and the seed
//! used for any stochastic pass.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::features::FEATURE_WIDTH;

/// Number of group positions the network predicts.
pub const POSITIONS: usize = 4;
/// Number of classes per position (the values `1..=26`).
pub const VALUE_CLASSES: usize = 26;
/// Flat output width: one logit block of 26 per position.
pub const OUTPUT_WIDTH: usize = POSITIONS * VALUE_CLASSES;
/// Dropout probability applied to hidden activations during training.
pub const DEFAULT_DROPOUT: f32 = 0.2;

/// The draw-prediction MLP.
#[derive(Clone)]
pub struct DrawNetwork {
    pub(crate) w1: Array2<f32>,
    pub(crate) b1: Array1<f32>,
    pub(crate) w2: Array2<f32>,
    pub(crate) b2: Array1<f32>,
    pub(crate) w3: Array2<f32>,
    pub(crate) b3: Array1<f32>,
    input_size: usize,
    hidden_size: usize,
    dropout: f32,
}

impl DrawNetwork {
    /// Fresh network with He-initialized weights and zero biases.
    pub fn new(input_size: usize, hidden_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            w1: he_matrix(input_size, hidden_size, &mut rng),
            b1: Array1::zeros(hidden_size),
            w2: he_matrix(hidden_size, hidden_size, &mut rng),
            b2: Array1::zeros(hidden_size),
            w3: he_matrix(hidden_size, OUTPUT_WIDTH, &mut rng),
            b3: Array1::zeros(OUTPUT_WIDTH),
            input_size,
            hidden_size,
            dropout: DEFAULT_DROPOUT,
        }
    }

    /// Network sized for the standard feature pipeline.
    pub fn for_features(hidden_size: usize, seed: u64) -> Self {
        Self::new(FEATURE_WIDTH, hidden_size, seed)
    }

    pub(crate) fn from_parts(
        w1: Array2<f32>,
        b1: Array1<f32>,
        w2: Array2<f32>,
        b2: Array1<f32>,
        w3: Array2<f32>,
        b3: Array1<f32>,
    ) -> Self {
        let input_size = w1.nrows();
        let hidden_size = w1.ncols();
        Self {
            w1,
            b1,
            w2,
            b2,
            w3,
            b3,
            input_size,
            hidden_size,
            dropout: DEFAULT_DROPOUT,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Inference pass over a batch of feature rows; no dropout.
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let a1 = relu(&(input.dot(&self.w1) + &self.b1));
        let a2 = relu(&(a1.dot(&self.w2) + &self.b2));
        a2.dot(&self.w3) + &self.b3
    }

    /// Training pass with dropout; caches activations for `backward`.
    pub(crate) fn forward_training(&self, input: &Array2<f32>, rng: &mut StdRng) -> ForwardTrace {
        let z1 = input.dot(&self.w1) + &self.b1;
        let mask1 = dropout_mask(z1.dim(), self.dropout, rng);
        let a1 = relu(&z1) * &mask1;

        let z2 = a1.dot(&self.w2) + &self.b2;
        let mask2 = dropout_mask(z2.dim(), self.dropout, rng);
        let a2 = relu(&z2) * &mask2;

        let logits = a2.dot(&self.w3) + &self.b3;
        ForwardTrace {
            input: input.clone(),
            z1,
            mask1,
            a1,
            z2,
            mask2,
            a2,
            logits,
        }
    }

    /// Backward pass from the logit gradient to parameter gradients.
    pub(crate) fn backward(&self, trace: &ForwardTrace, grad_logits: &Array2<f32>) -> Gradients {
        let grad_w3 = trace.a2.t().dot(grad_logits);
        let grad_b3 = grad_logits.sum_axis(Axis(0));

        let mut grad_a2 = grad_logits.dot(&self.w3.t());
        grad_a2 = grad_a2 * &trace.mask2;
        let grad_z2 = grad_a2 * &relu_gate(&trace.z2);
        let grad_w2 = trace.a1.t().dot(&grad_z2);
        let grad_b2 = grad_z2.sum_axis(Axis(0));

        let mut grad_a1 = grad_z2.dot(&self.w2.t());
        grad_a1 = grad_a1 * &trace.mask1;
        let grad_z1 = grad_a1 * &relu_gate(&trace.z1);
        let grad_w1 = trace.input.t().dot(&grad_z1);
        let grad_b1 = grad_z1.sum_axis(Axis(0));

        Gradients {
            w1: grad_w1,
            b1: grad_b1,
            w2: grad_w2,
            b2: grad_b2,
            w3: grad_w3,
            b3: grad_b3,
        }
    }

    /// Four softmaxed distributions over `{1..26}` for one feature vector.
    ///
    /// Row `p` holds the distribution for group position `p`; column `c`
    /// is the probability of the value `c + 1`.
    pub fn position_distributions(&self, features: &Array1<f32>) -> Array2<f32> {
        let batch = features
            .clone()
            .into_shape((1, features.len()))
            .expect("row vector reshape");
        let logits = self.forward(&batch);
        let mut distributions = Array2::zeros((POSITIONS, VALUE_CLASSES));
        for position in 0..POSITIONS {
            let block: Vec<f32> = (0..VALUE_CLASSES)
                .map(|class| logits[[0, position * VALUE_CLASSES + class]])
                .collect();
            let softmaxed = softmax(&block);
            for (class, &p) in softmaxed.iter().enumerate() {
                distributions[[position, class]] = p;
            }
        }
        distributions
    }

    /// Sum of squared parameters, for the L2 term of the training loss.
    pub(crate) fn parameter_norm_sq(&self) -> f32 {
        [&self.w1, &self.w2, &self.w3]
            .iter()
            .map(|w| w.mapv(|x| x * x).sum())
            .sum::<f32>()
            + [&self.b1, &self.b2, &self.b3]
                .iter()
                .map(|b| b.mapv(|x| x * x).sum())
                .sum::<f32>()
    }
}

/// Cached activations of one training forward pass.
pub(crate) struct ForwardTrace {
    input: Array2<f32>,
    z1: Array2<f32>,
    mask1: Array2<f32>,
    a1: Array2<f32>,
    z2: Array2<f32>,
    mask2: Array2<f32>,
    a2: Array2<f32>,
    pub(crate) logits: Array2<f32>,
}

/// Parameter gradients of one batch.
pub(crate) struct Gradients {
    pub w1: Array2<f32>,
    pub b1: Array1<f32>,
    pub w2: Array2<f32>,
    pub b2: Array1<f32>,
    pub w3: Array2<f32>,
    pub b3: Array1<f32>,
}

impl Gradients {
    /// Global L2 norm over all parameter gradients.
    pub fn global_norm(&self) -> f32 {
        let sum_sq = self.w1.mapv(|x| x * x).sum()
            + self.w2.mapv(|x| x * x).sum()
            + self.w3.mapv(|x| x * x).sum()
            + self.b1.mapv(|x| x * x).sum()
            + self.b2.mapv(|x| x * x).sum()
            + self.b3.mapv(|x| x * x).sum();
        sum_sq.sqrt()
    }

    /// Scales all gradients down so the global norm is at most `max_norm`.
    pub fn clip(&mut self, max_norm: f32) {
        let norm = self.global_norm();
        if norm > max_norm && norm > 0.0 {
            let scale = max_norm / norm;
            self.w1 *= scale;
            self.b1 *= scale;
            self.w2 *= scale;
            self.b2 *= scale;
            self.w3 *= scale;
            self.b3 *= scale;
        }
    }

    pub fn is_finite(&self) -> bool {
        self.global_norm().is_finite()
    }
}

fn he_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f32> {
    let std = (2.0 / rows as f32).sqrt();
    let normal = Normal::new(0.0, std).expect("positive standard deviation");
    Array2::from_shape_fn((rows, cols), |_| normal.sample(rng))
}

fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

fn relu_gate(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

// Inverted dropout: surviving units are rescaled so inference needs no
// correction factor.
fn dropout_mask(dim: (usize, usize), dropout: f32, rng: &mut StdRng) -> Array2<f32> {
    if dropout <= 0.0 {
        return Array2::ones(dim);
    }
    let keep = 1.0 - dropout;
    Array2::from_shape_fn(dim, |_| {
        if rng.gen::<f32>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![1.0 / logits.len() as f32; logits.len()];
    }
    exps.iter().map(|&e| e / sum).collect()
}
