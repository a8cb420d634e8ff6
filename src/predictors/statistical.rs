//! Statistical predictor: candidates from time-series features of the tail.
//!
//! Computes trend slope, autocorrelations at a few lags, a mean-reversion
//! score and a rough Hurst exponent over the recent history, then picks one
//! of three generation strategies: follow the trend, revert to the mean, or
//! balanced-random. Scores start from a small base and are boosted modestly
//! by autocorrelation support and by the chosen strategy.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::group::{flatten_groups, Group};
use crate::predictors::{dedup_by_group, repair_group, retain_usable, Prediction};
use crate::stats;

/// Trailing integers feeding the time-series features.
const TAIL_WINDOW: usize = 30;
/// Autocorrelation lags inspected for support.
const LAGS: [usize; 5] = [1, 2, 3, 5, 7];
/// Base candidate score before boosts.
const BASE_SCORE: f64 = 0.001;
/// Midpoint of the value range, the mean-reversion anchor.
const RANGE_MEAN: f32 = 13.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    FollowTrend,
    RevertToMean,
    BalancedRandom,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalPredictor;

impl StatisticalPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Produces up to `limit` candidates with the selected strategy.
    pub fn candidates(&self, dataset: &[Group], limit: usize, rng: &mut StdRng) -> Vec<Prediction> {
        let flat = flatten_groups(dataset);
        let tail: Vec<f32> = flat[flat.len().saturating_sub(TAIL_WINDOW)..]
            .iter()
            .map(|&v| f32::from(v))
            .collect();

        let slope = stats::linear_slope(&tail);
        let positive_lags = LAGS
            .iter()
            .filter(|&&lag| stats::autocorrelation(&tail, lag) > 0.0)
            .count();
        let reversion = stats::mean_reversion_score(&tail);
        let hurst = stats::hurst_exponent(&tail);

        let strategy = select_strategy(slope, reversion);
        let strategy_boost = match strategy {
            Strategy::FollowTrend if hurst > 0.6 => 1.5,
            Strategy::FollowTrend => 1.2,
            Strategy::RevertToMean => 1.2,
            Strategy::BalancedRandom => 1.0,
        };
        let base = BASE_SCORE * (1.0 + 0.15 * positive_lags as f64) * strategy_boost;

        let last = tail.last().copied().unwrap_or(RANGE_MEAN);
        let mut candidates = Vec::with_capacity(limit);
        for rank in 0..limit {
            let group = match strategy {
                Strategy::FollowTrend => trend_group(last, slope, rng),
                Strategy::RevertToMean => reverting_group(rng),
                Strategy::BalancedRandom => balanced_group(rng),
            };
            // Slight rank decay keeps the emitted ordering stable.
            let score = base * (1.0 - rank as f64 * 0.005);
            candidates.push(Prediction::new(group, score));
        }

        retain_usable(&mut candidates);
        dedup_by_group(&mut candidates);
        candidates.truncate(limit);
        candidates
    }
}

fn select_strategy(slope: f32, reversion: f32) -> Strategy {
    if slope.abs() > 0.15 {
        Strategy::FollowTrend
    } else if reversion > 0.9 {
        Strategy::RevertToMean
    } else {
        Strategy::BalancedRandom
    }
}

/// Projects the trend forward with per-position jitter.
fn trend_group(last: f32, slope: f32, rng: &mut StdRng) -> Group {
    let mut values = [0u8; 4];
    for (position, value) in values.iter_mut().enumerate() {
        let projected = last + slope * (position as f32 + 1.0) + rng.gen_range(-2.0..=2.0);
        *value = projected.round().clamp(1.0, 26.0) as u8;
    }
    repair_group(values)
}

/// Samples around the range midpoint.
fn reverting_group(rng: &mut StdRng) -> Group {
    let normal = Normal::new(RANGE_MEAN, 4.0).expect("positive standard deviation");
    let mut values = [0u8; 4];
    for value in values.iter_mut() {
        *value = normal.sample(rng).round().clamp(1.0, 26.0) as u8;
    }
    repair_group(values)
}

fn balanced_group(rng: &mut StdRng) -> Group {
    let mut values = [0u8; 4];
    for value in values.iter_mut() {
        *value = rng.gen_range(1..=26);
    }
    repair_group(values)
}
