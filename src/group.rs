//! The draw group value type and its pair-matching semantics.
//!
//! A group is an ordered 4-tuple of integers in `[1, 26]` arranged as two
//! unordered pairs (positions 0-1 and 2-3). Within each pair the two values
//! must differ; nothing else is required, so a value may repeat across pairs.
//! On external boundaries a group is rendered as the whitespace-separated
//! string `"a b c d"`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Smallest value a draw position may hold.
pub const MIN_VALUE: u8 = 1;
/// Largest value a draw position may hold.
pub const MAX_VALUE: u8 = 26;
/// Number of positions in a group.
pub const GROUP_SIZE: usize = 4;

/// An ordered 4-tuple of draw values forming two unordered pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u8; 4]", into = "[u8; 4]")]
pub struct Group([u8; 4]);

impl Group {
    /// Builds a group from four values, checking the invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroup` when a value falls outside `[1, 26]` or the
    /// two values of a pair are equal.
    pub fn new(values: [u8; 4]) -> EngineResult<Self> {
        for (position, &value) in values.iter().enumerate() {
            if !(MIN_VALUE..=MAX_VALUE).contains(&value) {
                return Err(EngineError::invalid_group(format!(
                    "value {value} at position {position} is outside [{MIN_VALUE}, {MAX_VALUE}]"
                )));
            }
        }
        if values[0] == values[1] {
            return Err(EngineError::invalid_group(format!(
                "first pair repeats the value {}",
                values[0]
            )));
        }
        if values[2] == values[3] {
            return Err(EngineError::invalid_group(format!(
                "second pair repeats the value {}",
                values[2]
            )));
        }
        Ok(Self(values))
    }

    /// Checks the invariants without constructing a group.
    pub fn is_valid(values: [u8; 4]) -> bool {
        Self::new(values).is_ok()
    }

    pub fn values(&self) -> [u8; 4] {
        self.0
    }

    pub fn get(&self, position: usize) -> u8 {
        self.0[position]
    }

    /// The first unordered pair (positions 0 and 1).
    pub fn first_pair(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    /// The second unordered pair (positions 2 and 3).
    pub fn second_pair(&self) -> [u8; 2] {
        [self.0[2], self.0[3]]
    }

    /// Canonical (sorted) form of one pair, used as a frequency-table key.
    pub fn sorted_pair(&self, half: usize) -> (u8, u8) {
        let [a, b] = if half == 0 {
            self.first_pair()
        } else {
            self.second_pair()
        };
        (a.min(b), a.max(b))
    }

    /// Mean of the four values.
    pub fn mean(&self) -> f32 {
        self.0.iter().map(|&v| f32::from(v)).sum::<f32>() / GROUP_SIZE as f32
    }

    /// Number of distinct values across all four positions.
    pub fn distinct_count(&self) -> usize {
        let mut seen = [false; MAX_VALUE as usize + 1];
        let mut count = 0;
        for &v in &self.0 {
            if !seen[v as usize] {
                seen[v as usize] = true;
                count += 1;
            }
        }
        count
    }
}

impl FromStr for Group {
    type Err = EngineError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut values = [0u8; 4];
        let mut parts = input.split_whitespace();
        for slot in values.iter_mut() {
            let token = parts
                .next()
                .ok_or_else(|| EngineError::invalid_group("expected 4 numbers"))?;
            *slot = token.parse().map_err(|_| {
                EngineError::invalid_group(format!("'{token}' is not a number in [1, 26]"))
            })?;
        }
        if parts.next().is_some() {
            return Err(EngineError::invalid_group("expected exactly 4 numbers"));
        }
        Self::new(values)
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl TryFrom<[u8; 4]> for Group {
    type Error = EngineError;

    fn try_from(values: [u8; 4]) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Group> for [u8; 4] {
    fn from(group: Group) -> Self {
        group.0
    }
}

/// Outcome of matching one predicted group against a realized draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchReport {
    /// Overlap between the first pairs, as unordered 2-sets (0..2).
    pub pair1_matches: u8,
    /// Overlap between the second pairs, as unordered 2-sets (0..2).
    pub pair2_matches: u8,
    /// `pair1_matches + pair2_matches` (0..4).
    pub total_matches: u8,
    /// Positions where the exact same value sits in both groups (0..4).
    pub exact_matches: u8,
}

impl MatchReport {
    /// Fraction of the four positions matched under the pair-set semantics.
    pub fn score(&self) -> f64 {
        f64::from(self.total_matches) / GROUP_SIZE as f64
    }
}

/// Matches a predicted group against an actual draw.
///
/// Pairs are compared as unordered 2-sets on the same side: a value counts
/// only when it appears in the corresponding pair of both groups. Exact
/// positional matches are reported separately and do not affect the score.
pub fn match_groups(predicted: &Group, actual: &Group) -> MatchReport {
    let pair1_matches = pair_overlap(predicted.first_pair(), actual.first_pair());
    let pair2_matches = pair_overlap(predicted.second_pair(), actual.second_pair());
    let exact_matches = predicted
        .values()
        .iter()
        .zip(actual.values().iter())
        .filter(|(p, a)| p == a)
        .count() as u8;

    MatchReport {
        pair1_matches,
        pair2_matches,
        total_matches: pair1_matches + pair2_matches,
        exact_matches,
    }
}

/// Flattens groups into the integer sequence consumed by the feature pipeline.
pub fn flatten_groups(groups: &[Group]) -> Vec<u8> {
    let mut flat = Vec::with_capacity(groups.len() * GROUP_SIZE);
    for group in groups {
        flat.extend_from_slice(&group.values());
    }
    flat
}

// Pair values are distinct within a pair, so set intersection reduces to
// membership counting.
fn pair_overlap(predicted: [u8; 2], actual: [u8; 2]) -> u8 {
    predicted
        .iter()
        .filter(|&&v| actual.contains(&v))
        .count() as u8
}
