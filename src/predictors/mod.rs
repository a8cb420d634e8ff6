//! Candidate generators that feed the ensemble.
//!
//! Each predictor is a concrete tagged variant with one job: given the
//! dataset (and a seeded RNG for its stochastic paths), produce a list of
//! scored candidate groups. The ensemble is agnostic to which predictors are
//! present; it only sees `(PredictorId, Vec<Prediction>)` inputs.

pub mod frequency;
pub mod pattern;
pub mod statistical;

use std::fmt::{self, Display};

use rand::rngs::StdRng;

use crate::group::Group;

pub use frequency::FrequencyPredictor;
pub use pattern::PatternPredictor;
pub use statistical::StatisticalPredictor;

/// A candidate group with an unnormalized confidence score.
///
/// Only the order and relative magnitude of scores matter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub group: Group,
    pub score: f64,
}

impl Prediction {
    pub fn new(group: Group, score: f64) -> Self {
        Self { group, score }
    }
}

/// Identity of a predictor inside the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PredictorId {
    Neural,
    Frequency,
    Pattern,
    Statistical,
}

impl PredictorId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neural => "neural",
            Self::Frequency => "frequency",
            Self::Pattern => "pattern",
            Self::Statistical => "statistical",
        }
    }
}

impl Display for PredictorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The non-neural predictors, as one dispatchable variant type.
pub enum AuxPredictor {
    Frequency(FrequencyPredictor),
    Pattern(PatternPredictor),
    Statistical(StatisticalPredictor),
}

impl AuxPredictor {
    /// The default auxiliary lineup, in ensemble order.
    pub fn default_lineup() -> Vec<Self> {
        vec![
            Self::Frequency(FrequencyPredictor::new()),
            Self::Pattern(PatternPredictor::new()),
            Self::Statistical(StatisticalPredictor::new()),
        ]
    }

    pub fn id(&self) -> PredictorId {
        match self {
            Self::Frequency(_) => PredictorId::Frequency,
            Self::Pattern(_) => PredictorId::Pattern,
            Self::Statistical(_) => PredictorId::Statistical,
        }
    }

    /// Produces up to `limit` valid candidates from the dataset.
    pub fn candidates(&self, dataset: &[Group], limit: usize, rng: &mut StdRng) -> Vec<Prediction> {
        match self {
            Self::Frequency(p) => p.candidates(dataset, limit, rng),
            Self::Pattern(p) => p.candidates(dataset, limit, rng),
            Self::Statistical(p) => p.candidates(dataset, limit, rng),
        }
    }
}

/// Drops candidates with non-finite or non-positive scores and invalid groups.
///
/// Predictors already emit valid groups; this is the shared defensive pass
/// they all run before handing candidates out.
pub(crate) fn retain_usable(candidates: &mut Vec<Prediction>) {
    candidates.retain(|c| c.score.is_finite() && c.score > 0.0 && Group::is_valid(c.group.values()));
}

/// Keeps only the first occurrence of each group, preserving order.
pub(crate) fn dedup_by_group(candidates: &mut Vec<Prediction>) {
    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| seen.insert(c.group.values()));
}

/// A uniformly random valid group.
pub(crate) fn random_group(rng: &mut StdRng) -> Group {
    use rand::Rng;
    loop {
        let values = [
            rng.gen_range(1..=26u8),
            rng.gen_range(1..=26u8),
            rng.gen_range(1..=26u8),
            rng.gen_range(1..=26u8),
        ];
        if let Ok(group) = Group::new(values) {
            return group;
        }
    }
}

/// Repairs within-pair duplicates by nudging the second value of the pair.
pub(crate) fn repair_group(mut values: [u8; 4]) -> Group {
    for v in values.iter_mut() {
        *v = (*v).clamp(1, 26);
    }
    if values[0] == values[1] {
        values[1] = if values[1] == 26 { 1 } else { values[1] + 1 };
    }
    if values[2] == values[3] {
        values[3] = if values[3] == 26 { 1 } else { values[3] + 1 };
    }
    Group::new(values).unwrap_or_else(|_| {
        // Unreachable after the repairs above; kept as a hard fallback.
        Group::new([1, 2, 3, 4]).expect("constant group is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predictor_id_names() {
        assert_eq!(PredictorId::Neural.as_str(), "neural");
        assert_eq!(PredictorId::Statistical.to_string(), "statistical");
    }

    #[test]
    fn test_retain_usable_drops_bad_scores() {
        let group = Group::new([1, 2, 3, 4]).unwrap();
        let mut candidates = vec![
            Prediction::new(group, 0.5),
            Prediction::new(group, f64::NAN),
            Prediction::new(group, 0.0),
            Prediction::new(group, -1.0),
        ];
        retain_usable(&mut candidates);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_lineup_order() {
        let lineup = AuxPredictor::default_lineup();
        let ids: Vec<PredictorId> = lineup.iter().map(|p| p.id()).collect();
        assert_eq!(
            ids,
            vec![
                PredictorId::Frequency,
                PredictorId::Pattern,
                PredictorId::Statistical
            ]
        );
    }
}
