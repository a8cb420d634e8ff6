//! Frequency predictor: candidates from historical value and pair counts.
//!
//! Builds three additively-smoothed tables from the dataset (per-number,
//! per-position, per-sorted-pair) and scores a candidate as the product of
//! its smoothed per-position and per-pair likelihoods. Candidates come from
//! pairing the most frequent numbers, combining the most frequent pairs, and
//! count-weighted sampling.

use std::collections::HashMap;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::group::Group;
use crate::predictors::{retain_usable, Prediction};

/// Top numbers considered when pairing frequent values.
const TOP_NUMBERS: usize = 6;
/// Top pairs considered when combining frequent pairs.
const TOP_PAIRS: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyPredictor;

impl FrequencyPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Produces up to `limit` scored candidates from the dataset counts.
    pub fn candidates(&self, dataset: &[Group], limit: usize, rng: &mut StdRng) -> Vec<Prediction> {
        let tables = FrequencyTables::build(dataset);

        let mut groups = Vec::new();
        groups.extend(pair_top_numbers(&tables));
        groups.extend(combine_top_pairs(&tables));
        groups.extend(weighted_samples(&tables, limit, rng));

        let mut seen = HashMap::new();
        let mut candidates = Vec::new();
        for group in groups {
            if seen.insert(group.values(), ()).is_none() {
                candidates.push(Prediction::new(group, tables.score(&group)));
            }
        }

        retain_usable(&mut candidates);
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.group.values().cmp(&b.group.values()))
        });
        candidates.truncate(limit);
        candidates
    }
}

struct FrequencyTables {
    number_counts: [u64; 27],
    position_counts: [[u64; 27]; 4],
    pair_counts: HashMap<(u8, u8), u64>,
    draws: usize,
}

impl FrequencyTables {
    fn build(dataset: &[Group]) -> Self {
        let mut number_counts = [0u64; 27];
        let mut position_counts = [[0u64; 27]; 4];
        let mut pair_counts = HashMap::new();

        for group in dataset {
            for (position, &value) in group.values().iter().enumerate() {
                number_counts[value as usize] += 1;
                position_counts[position][value as usize] += 1;
            }
            *pair_counts.entry(group.sorted_pair(0)).or_insert(0) += 1;
            *pair_counts.entry(group.sorted_pair(1)).or_insert(0) += 1;
        }

        Self {
            number_counts,
            position_counts,
            pair_counts,
            draws: dataset.len(),
        }
    }

    /// Smoothed likelihood product over positions and pairs.
    fn score(&self, group: &Group) -> f64 {
        let n = self.draws as f64;
        let mut score = 1.0;
        for (position, &value) in group.values().iter().enumerate() {
            let count = self.position_counts[position][value as usize] as f64;
            score *= (count + 1.0) / (n + 26.0);
        }
        for half in 0..2 {
            let count = *self.pair_counts.get(&group.sorted_pair(half)).unwrap_or(&0) as f64;
            // 325 = C(26, 2), the number of distinct unordered pairs.
            score *= (count + 1.0) / (n + 325.0);
        }
        score
    }

    /// Values `1..=26` ordered by descending count, ties by value.
    fn ranked_numbers(&self) -> Vec<u8> {
        let mut numbers: Vec<u8> = (1..=26).collect();
        numbers.sort_by(|&a, &b| {
            self.number_counts[b as usize]
                .cmp(&self.number_counts[a as usize])
                .then(a.cmp(&b))
        });
        numbers
    }

    /// Stored pairs ordered by descending count, ties lexically.
    fn ranked_pairs(&self) -> Vec<(u8, u8)> {
        let mut pairs: Vec<((u8, u8), u64)> =
            self.pair_counts.iter().map(|(&p, &c)| (p, c)).collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        pairs.into_iter().map(|(p, _)| p).collect()
    }
}

fn pair_top_numbers(tables: &FrequencyTables) -> Vec<Group> {
    let top: Vec<u8> = tables.ranked_numbers().into_iter().take(TOP_NUMBERS).collect();
    let mut groups = Vec::new();
    for i in 0..top.len() {
        for j in 0..top.len() {
            if i == j {
                continue;
            }
            for k in 0..top.len() {
                for l in 0..top.len() {
                    if k == l {
                        continue;
                    }
                    // Only the canonical orientation of each pair; the group
                    // pairs are unordered anyway.
                    if top[i] < top[j] && top[k] < top[l] {
                        if let Ok(group) = Group::new([top[i], top[j], top[k], top[l]]) {
                            groups.push(group);
                        }
                    }
                }
            }
        }
    }
    groups
}

fn combine_top_pairs(tables: &FrequencyTables) -> Vec<Group> {
    let top = tables.ranked_pairs();
    let top = &top[..top.len().min(TOP_PAIRS)];
    let mut groups = Vec::new();
    for first in top {
        for second in top {
            if let Ok(group) = Group::new([first.0, first.1, second.0, second.1]) {
                groups.push(group);
            }
        }
    }
    groups
}

fn weighted_samples(tables: &FrequencyTables, limit: usize, rng: &mut StdRng) -> Vec<Group> {
    let weights: Vec<u64> = (1..=26).map(|v| tables.number_counts[v as usize] + 1).collect();
    let Ok(distribution) = WeightedIndex::new(&weights) else {
        return Vec::new();
    };

    let mut draw_value = |rng: &mut StdRng| distribution.sample(rng) as u8 + 1;
    let mut groups = Vec::new();
    for _ in 0..limit {
        let a = draw_value(rng);
        let mut b = draw_value(rng);
        while b == a {
            b = draw_value(rng);
        }
        let c = draw_value(rng);
        let mut d = draw_value(rng);
        while d == c {
            d = draw_value(rng);
        }
        if let Ok(group) = Group::new([a, b, c, d]) {
            groups.push(group);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn dataset_of(repeats: usize, values: [u8; 4]) -> Vec<Group> {
        vec![Group::new(values).unwrap(); repeats]
    }

    #[test]
    fn test_candidates_are_valid_and_ranked() {
        let mut dataset = dataset_of(10, [5, 22, 18, 11]);
        dataset.extend(dataset_of(5, [1, 2, 3, 4]));
        let mut rng = StdRng::seed_from_u64(9);

        let candidates = FrequencyPredictor::new().candidates(&dataset, 10, &mut rng);
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 10);
        for window in candidates.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for c in &candidates {
            assert!(Group::is_valid(c.group.values()));
            assert!(c.score > 0.0);
        }
    }

    #[test]
    fn test_dominant_pair_ranks_first() {
        let dataset = dataset_of(50, [5, 22, 18, 11]);
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = FrequencyPredictor::new().candidates(&dataset, 5, &mut rng);

        // The overwhelming historical first pair should top the ranking, and
        // the full historical combination must be among the candidates.
        let best = candidates[0].group;
        assert_eq!(best.sorted_pair(0), (5, 22));
        assert!(candidates.iter().any(|c| {
            c.group.sorted_pair(0) == (5, 22) && c.group.sorted_pair(1) == (11, 18)
        }));
    }

    #[test]
    fn test_empty_dataset_still_produces_candidates() {
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = FrequencyPredictor::new().candidates(&[], 8, &mut rng);
        assert!(!candidates.is_empty());
        for c in &candidates {
            assert!(Group::is_valid(c.group.values()));
        }
    }

    #[test]
    fn test_smoothed_score_formula() {
        let dataset = dataset_of(4, [1, 2, 3, 4]);
        let tables = FrequencyTables::build(&dataset);
        let group = Group::new([1, 2, 3, 4]).unwrap();
        // Position factors: ((4+1)/(4+26))^4; pair factors: ((4+1)/(4+325))^2.
        let expected = (5.0f64 / 30.0).powi(4) * (5.0f64 / 329.0).powi(2);
        assert!((tables.score(&group) - expected).abs() < 1e-12);
    }
}
