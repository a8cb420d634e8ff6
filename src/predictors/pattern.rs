//! Pattern predictor: candidates from runs in the recent history.
//!
//! A run is a stretch of consecutive history values whose neighbours differ
//! by at most 3 (length >= 2). The most recent runs are extended with values
//! at distance 1..=3 from their last element; remaining positions are filled
//! from the complement of the run. When no runs exist the predictor falls
//! through to random valid groups with a low base score.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::group::{flatten_groups, Group};
use crate::predictors::{dedup_by_group, random_group, repair_group, retain_usable, Prediction};

/// Trailing integers scanned for runs.
const SCAN_WINDOW: usize = 40;
/// Maximum neighbour distance inside a run.
const RUN_STEP: u8 = 3;
/// Base score of a run-extension candidate.
const RUN_BASE_SCORE: f64 = 0.005;
/// Score of fall-through random candidates.
const FALLBACK_SCORE: f64 = 0.001;

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternPredictor;

impl PatternPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Produces up to `limit` candidates by extending recent runs.
    pub fn candidates(&self, dataset: &[Group], limit: usize, rng: &mut StdRng) -> Vec<Prediction> {
        let flat = flatten_groups(dataset);
        let tail = &flat[flat.len().saturating_sub(SCAN_WINDOW)..];
        let runs = find_runs(tail);

        let mut candidates = Vec::new();
        if runs.is_empty() {
            for _ in 0..limit.max(1) / 2 + 1 {
                candidates.push(Prediction::new(random_group(rng), FALLBACK_SCORE));
            }
        } else {
            // Most recent runs first.
            for run in runs.iter().rev() {
                extend_run(run, limit, rng, &mut candidates);
                if candidates.len() >= limit {
                    break;
                }
            }
        }

        retain_usable(&mut candidates);
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.group.values().cmp(&b.group.values()))
        });
        dedup_by_group(&mut candidates);
        candidates.truncate(limit);
        candidates
    }
}

/// A run of near-constant steps, oldest to newest.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    values: Vec<u8>,
}

impl Run {
    fn last(&self) -> u8 {
        *self.values.last().expect("runs have length >= 2")
    }

    fn contains(&self, value: u8) -> bool {
        self.values.contains(&value)
    }
}

fn find_runs(tail: &[u8]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for &value in tail {
        match current.last() {
            Some(&prev) if prev.abs_diff(value) <= RUN_STEP => current.push(value),
            _ => {
                if current.len() >= 2 {
                    runs.push(Run {
                        values: std::mem::take(&mut current),
                    });
                } else {
                    current.clear();
                }
                current.push(value);
            }
        }
    }
    if current.len() >= 2 {
        runs.push(Run { values: current });
    }
    runs
}

fn extend_run(run: &Run, limit: usize, rng: &mut StdRng, candidates: &mut Vec<Prediction>) {
    let last = run.last();
    let complement: Vec<u8> = (1..=26).filter(|v| !run.contains(*v)).collect();
    if complement.is_empty() {
        return;
    }

    for distance in 1..=RUN_STEP {
        for direction in [1i16, -1] {
            let extended = i16::from(last) + direction * i16::from(distance);
            if !(1..=26).contains(&extended) {
                continue;
            }
            let extended = extended as u8;

            let mut values = [extended, 0, 0, 0];
            for slot in values.iter_mut().skip(1) {
                *slot = complement[rng.gen_range(0..complement.len())];
            }
            let group = repair_group(values);

            let score = RUN_BASE_SCORE * run.values.len().min(5) as f64 / f64::from(distance);
            candidates.push(Prediction::new(group, score));
            if candidates.len() >= limit {
                return;
            }
        }
    }
}
