//! History-to-feature mapping for the neural predictor.
//!
//! Maps a flattened draw history to a fixed-width vector of `FEATURE_WIDTH`
//! floats. The slot layout is a stable contract shared by the trainer and the
//! predictor: the same history must produce the same vector bit-for-bit.
//!
//! Layout (50 slots):
//!
//! | slots  | content |
//! |--------|---------|
//! | 0..6   | window summary stats / 26 (mean, stddev, min, max, median) and distinct ratio |
//! | 6..32  | per-value frequency over the window, one slot per value 1..=26 |
//! | 32..35 | last-5 stats / 26 (mean, stddev, median), zeros when fewer than 5 values |
//! | 35..38 | last-10 stats / 26, zeros when fewer than 10 values |
//! | 38..46 | difference dynamics (means, sign fractions, autocorrelation, volatility) |
//! | 46..50 | categorical ratios (even, odd, low half, high half) |

use ndarray::Array1;

use crate::stats;

/// Width of every feature vector.
pub const FEATURE_WIDTH: usize = 50;
/// Number of trailing integers considered by the extractor.
pub const HISTORY_WINDOW: usize = 20;

/// Deterministic history-to-feature mapper.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            window: HISTORY_WINDOW,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Extracts the feature vector for a flattened history.
    ///
    /// Histories shorter than the window are zero-padded on the left; the
    /// summary statistics run over the padded window while the short-window
    /// and categorical slots use only the real (unpadded) tail. Every slot is
    /// finite: degenerate windows produce zeros, never NaN.
    pub fn extract(&self, history: &[u8]) -> Array1<f32> {
        let tail_len = history.len().min(self.window);
        let tail: Vec<f32> = history[history.len() - tail_len..]
            .iter()
            .map(|&v| f32::from(v))
            .collect();

        let mut window = vec![0.0f32; self.window - tail_len];
        window.extend_from_slice(&tail);

        let mut features = Vec::with_capacity(FEATURE_WIDTH);

        // Window summary statistics.
        features.push(stats::mean(&window) / 26.0);
        features.push(stats::stddev(&window) / 26.0);
        features.push(stats::min_value(&window) / 26.0);
        features.push(stats::max_value(&window) / 26.0);
        features.push(stats::median(&window) / 26.0);
        features.push(stats::distinct_ratio(&window));

        // Per-value frequency over the window; padding zeros never match.
        for value in 1..=26u8 {
            let count = window.iter().filter(|&&v| v == f32::from(value)).count();
            features.push(count as f32 / window.len() as f32);
        }

        // Short-window statistics over the real tail only.
        push_short_window_stats(&mut features, &tail, 5);
        push_short_window_stats(&mut features, &tail, 10);

        // Difference dynamics over the padded window.
        let diffs = stats::differences(&window);
        features.push(stats::mean(&diffs) / 25.0);
        features.push(stats::stddev(&diffs) / 25.0);
        features.push(fraction(&diffs, |d| d > 0.0));
        features.push(fraction(&diffs, |d| d < 0.0));
        features.push(fraction(&diffs, |d| d.abs() > 10.0));
        features.push(stats::autocorrelation(&window, 1).max(0.0));
        let volatility = (stats::stddev(&diffs) / 25.0).clamp(0.0, 1.0);
        features.push(volatility);
        features.push(1.0 - volatility);

        // Categorical ratios over the real tail; padding would skew them.
        features.push(fraction(&tail, |v| (v as u32) % 2 == 0));
        features.push(fraction(&tail, |v| (v as u32) % 2 == 1));
        features.push(fraction(&tail, |v| v <= 13.0));
        features.push(fraction(&tail, |v| v > 13.0));

        features.resize(FEATURE_WIDTH, 0.0);
        for value in features.iter_mut() {
            *value = stats::sanitize(*value);
        }
        Array1::from(features)
    }
}

fn push_short_window_stats(features: &mut Vec<f32>, tail: &[f32], span: usize) {
    if tail.len() < span {
        features.extend_from_slice(&[0.0, 0.0, 0.0]);
        return;
    }
    let recent = &tail[tail.len() - span..];
    features.push(stats::mean(recent) / 26.0);
    features.push(stats::stddev(recent) / 26.0);
    features.push(stats::median(recent) / 26.0);
}

fn fraction(values: &[f32], predicate: impl Fn(f32) -> bool) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| predicate(v)).count() as f32 / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_width_is_stable() {
        let extractor = FeatureExtractor::new();
        for len in [0usize, 1, 4, 19, 20, 21, 200] {
            let history: Vec<u8> = (0..len).map(|i| (i % 26) as u8 + 1).collect();
            let features = extractor.extract(&history);
            assert_eq!(features.len(), FEATURE_WIDTH, "history length {len}");
            assert!(features.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::new();
        let history: Vec<u8> = vec![5, 22, 18, 11, 3, 9, 14, 26, 1, 7, 12, 20];
        let a = extractor.extract(&history);
        let b = extractor.extract(&history);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_history_yields_padded_window() {
        let features = FeatureExtractor::new().extract(&[]);
        // All-zero window: mean, stddev, min, max, median are zero,
        // distinct ratio is 1/20 (the single zero value).
        assert_eq!(features[0], 0.0);
        assert!((features[5] - 1.0 / 20.0).abs() < 1e-6);
        // No value 1..=26 occurs.
        for slot in 6..32 {
            assert_eq!(features[slot], 0.0);
        }
    }

    #[test]
    fn test_frequency_slots_count_window_values() {
        let history = vec![7u8; 20];
        let features = FeatureExtractor::new().extract(&history);
        // Value 7 occupies slot 6 + (7 - 1).
        assert!((features[12] - 1.0).abs() < 1e-6);
        assert_eq!(features[6], 0.0);
    }

    #[test]
    fn test_short_window_slots_zero_when_history_too_short() {
        let features = FeatureExtractor::new().extract(&[3, 9, 14]);
        for slot in 32..38 {
            assert_eq!(features[slot], 0.0, "slot {slot}");
        }
    }

    #[test]
    fn test_short_window_slots_populated_when_available() {
        let history: Vec<u8> = (1..=12).collect();
        let features = FeatureExtractor::new().extract(&history);
        // last 5 of 1..=12 is 8..=12, mean 10.
        assert!((features[32] - 10.0 / 26.0).abs() < 1e-6);
        // last 10 is 3..=12, mean 7.5.
        assert!((features[35] - 7.5 / 26.0).abs() < 1e-6);
    }

    #[test]
    fn test_categorical_ratios_ignore_padding() {
        // Four odd values with a mostly-empty window.
        let features = FeatureExtractor::new().extract(&[1, 3, 5, 7]);
        assert_eq!(features[46], 0.0); // even
        assert!((features[47] - 1.0).abs() < 1e-6); // odd
        assert!((features[48] - 1.0).abs() < 1e-6); // all <= 13
        assert_eq!(features[49], 0.0);
    }

    #[test]
    fn test_volatility_slots_are_complementary() {
        let history: Vec<u8> = (0..40).map(|i| if i % 2 == 0 { 1 } else { 26 }).collect();
        let features = FeatureExtractor::new().extract(&history);
        assert!((features[44] + features[45] - 1.0).abs() < 1e-6);
    }
}
