//! Per-position cross-entropy over the four softmax heads.

use ndarray::Array2;

use super::network::{POSITIONS, VALUE_CLASSES};

/// Mean cross-entropy over all positions of a batch, with the logit gradient.
///
/// `logits` is `[batch, 104]`; `targets[i][p]` is the 0-based class of
/// sample `i` at position `p`. The returned gradient has the shape of
/// `logits` and is already averaged, so callers feed it straight into the
/// backward pass.
pub fn position_cross_entropy(
    logits: &Array2<f32>,
    targets: &[[usize; POSITIONS]],
) -> (f32, Array2<f32>) {
    let batch = logits.nrows();
    assert_eq!(batch, targets.len(), "batch size mismatch");

    let mut grad = Array2::zeros(logits.raw_dim());
    let mut total_loss = 0.0f32;
    let denominator = (batch * POSITIONS) as f32;

    for (sample, target) in targets.iter().enumerate() {
        for (position, &class) in target.iter().enumerate() {
            let offset = position * VALUE_CLASSES;
            let block: Vec<f32> = (0..VALUE_CLASSES)
                .map(|c| logits[[sample, offset + c]])
                .collect();
            let probabilities = softmax(&block);

            total_loss -= probabilities[class].max(1e-12).ln();
            for (c, &p) in probabilities.iter().enumerate() {
                let indicator = if c == class { 1.0 } else { 0.0 };
                grad[[sample, offset + c]] = (p - indicator) / denominator;
            }
        }
    }

    (total_loss / denominator, grad)
}

/// Fraction of position heads whose argmax hits the target class.
pub fn position_accuracy(logits: &Array2<f32>, targets: &[[usize; POSITIONS]]) -> f32 {
    let batch = logits.nrows();
    if batch == 0 {
        return 0.0;
    }
    let mut hits = 0usize;
    for (sample, target) in targets.iter().enumerate() {
        for (position, &class) in target.iter().enumerate() {
            let offset = position * VALUE_CLASSES;
            let argmax = (0..VALUE_CLASSES)
                .max_by(|&a, &b| {
                    logits[[sample, offset + a]]
                        .partial_cmp(&logits[[sample, offset + b]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0);
            if argmax == class {
                hits += 1;
            }
        }
    }
    hits as f32 / (batch * POSITIONS) as f32
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::network::OUTPUT_WIDTH;

    #[test]
    fn test_uniform_logits_give_ln_classes() {
        let logits = Array2::zeros((1, OUTPUT_WIDTH));
        let targets = [[0usize, 5, 12, 25]];
        let (loss, grad) = position_cross_entropy(&logits, &targets);
        assert!((loss - (VALUE_CLASSES as f32).ln()).abs() < 1e-4);
        assert_eq!(grad.dim(), (1, OUTPUT_WIDTH));
    }

    #[test]
    fn test_gradient_rows_sum_to_zero_per_block() {
        let logits = Array2::from_shape_fn((2, OUTPUT_WIDTH), |(i, j)| (i + j) as f32 * 0.01);
        let targets = [[1usize, 2, 3, 4], [5, 6, 7, 8]];
        let (_, grad) = position_cross_entropy(&logits, &targets);
        for sample in 0..2 {
            for position in 0..POSITIONS {
                let block_sum: f32 = (0..VALUE_CLASSES)
                    .map(|c| grad[[sample, position * VALUE_CLASSES + c]])
                    .sum();
                assert!(block_sum.abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_confident_correct_prediction_has_low_loss() {
        let mut logits = Array2::zeros((1, OUTPUT_WIDTH));
        let targets = [[3usize, 3, 3, 3]];
        for position in 0..POSITIONS {
            logits[[0, position * VALUE_CLASSES + 3]] = 20.0;
        }
        let (loss, _) = position_cross_entropy(&logits, &targets);
        assert!(loss < 1e-3);
        assert!((position_accuracy(&logits, &targets) - 1.0).abs() < f32::EPSILON);
    }
}
