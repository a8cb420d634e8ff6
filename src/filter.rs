//! Post-processing of the ensemble output: validity, diversity, quality.
//!
//! The filter drops unusable candidates, deduplicates, multiplies each score
//! by a quality factor derived from the candidate's internal structure and
//! the recent history, drops everything below a fixed floor and returns the
//! top-K by final score.

use crate::group::Group;
use crate::predictors::Prediction;
use crate::stats;

/// Final scores below this floor are dropped.
pub const SCORE_FLOOR: f64 = 5e-5;
/// Lower bound of the quality factor.
const QUALITY_MIN: f64 = 0.5;
/// Upper bound of the quality factor.
const QUALITY_MAX: f64 = 1.3;

/// The candidate filter (C7).
#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter {
    top_k: usize,
}

impl CandidateFilter {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Filters and re-scores a ranked candidate list.
    ///
    /// `history_tail` is the flattened recent history used by the
    /// trend-alignment quality bonus.
    pub fn apply(&self, candidates: &[Prediction], history_tail: &[u8]) -> Vec<Prediction> {
        let tail: Vec<f32> = history_tail.iter().map(|&v| f32::from(v)).collect();
        let tail_hurst = stats::hurst_exponent(&tail);
        let tail_mean = stats::mean(&tail);

        let mut seen = std::collections::HashSet::new();
        let mut kept: Vec<Prediction> = Vec::new();
        for candidate in candidates {
            if !candidate.score.is_finite() || candidate.score <= 0.0 {
                continue;
            }
            if !Group::is_valid(candidate.group.values()) {
                continue;
            }
            if !seen.insert(candidate.group.values()) {
                continue;
            }

            let quality = quality_factor(&candidate.group, tail_hurst, tail_mean);
            let score = candidate.score * quality;
            if score < SCORE_FLOOR {
                continue;
            }
            kept.push(Prediction::new(candidate.group, score));
        }

        kept.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.group.values().cmp(&b.group.values()))
        });
        kept.truncate(self.top_k);
        kept
    }
}

/// Structural quality of a candidate, clamped to `[0.5, 1.3]`.
///
/// Penalties: repeated values across pairs, single-parity groups, groups
/// confined to one half of the range. Bonus: persistent recent history
/// (Hurst above 0.7) with the candidate mean close to the history mean.
fn quality_factor(group: &Group, tail_hurst: f32, tail_mean: f32) -> f64 {
    let values = group.values();
    let mut quality = 1.0f64;

    if group.distinct_count() < 4 {
        quality *= 0.5;
    }

    let even = values.iter().filter(|v| *v % 2 == 0).count();
    if even == 4 || even == 0 {
        quality *= 0.7;
    }

    let low = values.iter().filter(|&&v| v <= 13).count();
    if low == 4 || low == 0 {
        quality *= 0.8;
    }

    if tail_hurst > 0.7 && (group.mean() - tail_mean).abs() < 3.0 {
        quality *= 1.2;
    }

    quality.clamp(QUALITY_MIN, QUALITY_MAX)
}
