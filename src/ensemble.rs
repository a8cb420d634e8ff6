//! Weighted fusion of predictor outputs into one ranked candidate list.
//!
//! Each predictor's candidates contribute `weight * score` to the aggregate
//! of their group; predictors that did not emit a group contribute nothing.
//! The combiner is idempotent and stable: identical inputs produce the
//! identical ranking, with ties broken by group values. A re-entrancy flag
//! rejects recursive invocation — no predictor may call back into the
//! ensemble while a combine is in flight.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

use crate::config::EnsembleWeights;
use crate::predictors::{Prediction, PredictorId};

/// The ensemble combiner (C6).
pub struct Ensemble {
    weights: BTreeMap<PredictorId, f64>,
    combining: Cell<bool>,
}

impl Ensemble {
    pub fn new(weights: EnsembleWeights) -> Self {
        let mut map = BTreeMap::new();
        map.insert(PredictorId::Neural, weights.neural);
        map.insert(PredictorId::Statistical, weights.statistical);
        map.insert(PredictorId::Pattern, weights.pattern);
        map.insert(PredictorId::Frequency, weights.frequency);
        Self {
            weights: map,
            combining: Cell::new(false),
        }
    }

    /// Weight applied to a predictor's scores; unknown predictors weigh 0.
    pub fn weight(&self, id: PredictorId) -> f64 {
        self.weights.get(&id).copied().unwrap_or(0.0)
    }

    /// Merges the per-predictor candidate lists into one ranked list.
    ///
    /// An empty input mapping yields an empty list. A re-entrant call (the
    /// guard is already held) also yields an empty list instead of recursing.
    pub fn combine(&self, inputs: &BTreeMap<PredictorId, Vec<Prediction>>) -> Vec<Prediction> {
        if self.combining.replace(true) {
            return Vec::new();
        }
        let _guard = ResetFlag(&self.combining);

        let mut aggregate: HashMap<[u8; 4], (Prediction, f64)> = HashMap::new();
        for (&id, predictions) in inputs {
            let weight = self.weight(id);
            if weight == 0.0 {
                continue;
            }
            for prediction in predictions {
                let contribution = weight * prediction.score;
                if !contribution.is_finite() {
                    continue;
                }
                aggregate
                    .entry(prediction.group.values())
                    .and_modify(|(_, total)| *total += contribution)
                    .or_insert((*prediction, contribution));
            }
        }

        let mut combined: Vec<Prediction> = aggregate
            .into_values()
            .map(|(prediction, total)| Prediction::new(prediction.group, total))
            .collect();
        combined.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.group.values().cmp(&b.group.values()))
        });
        combined
    }
}

struct ResetFlag<'a>(&'a Cell<bool>);

impl Drop for ResetFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
