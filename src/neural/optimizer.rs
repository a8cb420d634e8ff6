//! Adam optimizer with decoupled weight decay.
//!
//! Moment state is keyed by parameter name so one optimizer instance drives
//! every tensor of the network. Weight decay only touches weight matrices;
//! biases decay-free.

use std::collections::HashMap;

use ndarray::{Array1, Array2};

/// Adam with decoupled (AdamW-style) weight decay.
pub struct AdamOptimizer {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    step: i32,
    matrix_moments: HashMap<String, (Array2<f32>, Array2<f32>)>,
    vector_moments: HashMap<String, (Array1<f32>, Array1<f32>)>,
}

impl AdamOptimizer {
    pub fn new(learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: weight_decay.max(0.0),
            step: 0,
            matrix_moments: HashMap::new(),
            vector_moments: HashMap::new(),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        if learning_rate.is_finite() && learning_rate > 0.0 {
            self.learning_rate = learning_rate;
        }
    }

    /// Halves the learning rate, bounded below by `floor`.
    pub fn halve_learning_rate(&mut self, floor: f32) {
        self.learning_rate = (self.learning_rate * 0.5).max(floor);
    }

    /// Advances the shared step counter; call once per batch before stepping
    /// the individual parameters.
    pub fn begin_step(&mut self) {
        self.step = self.step.saturating_add(1);
    }

    pub fn step_matrix(&mut self, name: &str, param: &mut Array2<f32>, grad: &Array2<f32>) {
        if param.raw_dim() != grad.raw_dim() {
            return;
        }
        if self.weight_decay > 0.0 {
            let decay = self.learning_rate * self.weight_decay;
            *param = &*param - &(&*param * decay);
        }

        let (m, v) = self
            .matrix_moments
            .entry(name.to_string())
            .or_insert_with(|| (Array2::zeros(grad.raw_dim()), Array2::zeros(grad.raw_dim())));

        *m = &*m * self.beta1 + &(grad * (1.0 - self.beta1));
        *v = &*v * self.beta2 + &(grad.mapv(|g| g * g) * (1.0 - self.beta2));

        let m_hat = &*m / (1.0 - self.beta1.powi(self.step));
        let v_hat = &*v / (1.0 - self.beta2.powi(self.step));
        let update = m_hat / (v_hat.mapv(f32::sqrt) + self.epsilon) * self.learning_rate;
        *param = &*param - &update;
    }

    pub fn step_vector(&mut self, name: &str, param: &mut Array1<f32>, grad: &Array1<f32>) {
        if param.raw_dim() != grad.raw_dim() {
            return;
        }
        let (m, v) = self
            .vector_moments
            .entry(name.to_string())
            .or_insert_with(|| (Array1::zeros(grad.raw_dim()), Array1::zeros(grad.raw_dim())));

        *m = &*m * self.beta1 + &(grad * (1.0 - self.beta1));
        *v = &*v * self.beta2 + &(grad.mapv(|g| g * g) * (1.0 - self.beta2));

        let m_hat = &*m / (1.0 - self.beta1.powi(self.step));
        let v_hat = &*v / (1.0 - self.beta2.powi(self.step));
        let update = m_hat / (v_hat.mapv(f32::sqrt) + self.epsilon) * self.learning_rate;
        *param = &*param - &update;
    }
}
