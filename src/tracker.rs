//! Self-learning tracker: scores emitted predictions against realized draws.
//!
//! After every new draw the tracker evaluates the prediction set emitted just
//! before it, using the unordered-pair match semantics of [`match_groups`],
//! and appends one accuracy record to its own history. It never mutates the
//! dataset, the model, or the prediction store.

use chrono::Utc;

use crate::error::EngineResult;
use crate::group::{match_groups, Group};
use crate::predictors::Prediction;
use crate::store::{AccuracyRecord, AccuracyStore};

/// Predictions analyzed per draw; the emitted set is capped at this depth.
const ANALYZED_DEPTH: usize = 10;
/// Records contributing to the rolling accuracy average.
const ROLLING_WINDOW: usize = 20;

/// Aggregated accuracy statistics and derived guidance.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningInsights {
    /// Mean best-match score over the most recent records.
    pub recent_accuracy_avg: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    pub total_draws_analyzed: usize,
    pub recommendations: Vec<String>,
}

/// The self-learning tracker (C8).
pub struct LearningTracker {
    store: AccuracyStore,
}

impl LearningTracker {
    pub fn new(store: AccuracyStore) -> Self {
        Self { store }
    }

    /// Scores a prediction set against the realized draw and appends exactly
    /// one accuracy record.
    ///
    /// The best prediction is the one with the highest pair-set match count;
    /// ties go to the higher emitted confidence. An empty prediction set
    /// still appends a record (with no best prediction) so every draw leaves
    /// a trace in the history.
    pub fn score_draw(
        &self,
        actual: Group,
        predictions: &[Prediction],
    ) -> EngineResult<AccuracyRecord> {
        let analyzed = &predictions[..predictions.len().min(ANALYZED_DEPTH)];

        let mut best: Option<(&Prediction, u8)> = None;
        for prediction in analyzed {
            let report = match_groups(&prediction.group, &actual);
            let better = match best {
                None => true,
                Some((current, matches)) => {
                    report.total_matches > matches
                        || (report.total_matches == matches && prediction.score > current.score)
                }
            };
            if better {
                best = Some((prediction, report.total_matches));
            }
        }

        let record = AccuracyRecord {
            timestamp: Utc::now().to_rfc3339(),
            actual_group: actual.values(),
            best_match_score: best.map_or(0.0, |(_, matches)| f64::from(matches) / 4.0),
            matches_count: best.map_or(0, |(_, matches)| matches),
            analyzed_predictions_count: analyzed.len(),
            best_prediction: best.map(|(p, _)| p.group.values()),
            prediction_confidence: best.map_or(0.0, |(p, _)| p.score),
        };
        self.store.append(record.clone())?;
        Ok(record)
    }

    /// Rolling statistics plus threshold-derived recommendations.
    pub fn insights(&self) -> EngineResult<LearningInsights> {
        let history = self.store.load()?;
        let records = &history.performance_history;

        if records.is_empty() {
            return Ok(LearningInsights {
                recent_accuracy_avg: 0.0,
                best_accuracy: 0.0,
                worst_accuracy: 0.0,
                total_draws_analyzed: 0,
                recommendations: vec![
                    "No draws scored yet; predictions have not been evaluated.".to_string(),
                ],
            });
        }

        let recent = &records[records.len().saturating_sub(ROLLING_WINDOW)..];
        let recent_accuracy_avg =
            recent.iter().map(|r| r.best_match_score).sum::<f64>() / recent.len() as f64;
        let best_accuracy = records
            .iter()
            .map(|r| r.best_match_score)
            .fold(0.0, f64::max);
        let worst_accuracy = records
            .iter()
            .map(|r| r.best_match_score)
            .fold(1.0, f64::min);

        Ok(LearningInsights {
            recent_accuracy_avg,
            best_accuracy,
            worst_accuracy,
            total_draws_analyzed: records.len(),
            recommendations: recommendations(recent_accuracy_avg, records.len()),
        })
    }
}

fn recommendations(recent_avg: f64, scored_draws: usize) -> Vec<String> {
    let mut out = Vec::new();
    if scored_draws < 5 {
        out.push(format!(
            "Only {scored_draws} draws scored; accuracy trends are not meaningful yet."
        ));
    }
    if recent_avg < 0.1 {
        out.push(
            "Recent accuracy is very low; a full retrain on the grown dataset is advisable."
                .to_string(),
        );
    } else if recent_avg < 0.25 {
        out.push(
            "Recent accuracy is below one matched value per draw; consider increasing \
             the fine-tune epoch budget."
                .to_string(),
        );
    } else {
        out.push("The ensemble is tracking the draw stream well; keep the current cadence.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::EventLog;
    use crate::store::LockBudget;
    use std::path::Path;

    fn tracker(dir: &Path) -> LearningTracker {
        LearningTracker::new(AccuracyStore::new(
            dir.join("learning_results.json"),
            LockBudget::default(),
            EventLog::disabled(),
        ))
    }

    fn prediction(values: [u8; 4], score: f64) -> Prediction {
        Prediction::new(Group::new(values).unwrap(), score)
    }

    #[test]
    fn test_score_draw_appends_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let actual = Group::new([19, 5, 18, 4]).unwrap();

        let record = tracker
            .score_draw(actual, &[prediction([5, 22, 18, 11], 0.01)])
            .unwrap();
        assert_eq!(record.matches_count, 2);
        assert!((record.best_match_score - 0.5).abs() < 1e-12);
        assert_eq!(record.best_prediction, Some([5, 22, 18, 11]));
        assert_eq!(record.analyzed_predictions_count, 1);

        let history = tracker.store.load().unwrap();
        assert_eq!(history.performance_history.len(), 1);
    }

    #[test]
    fn test_best_prediction_wins_by_matches_then_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let actual = Group::new([5, 22, 18, 11]).unwrap();

        let record = tracker
            .score_draw(
                actual,
                &[
                    prediction([1, 2, 3, 4], 0.9),    // 0 matches, high confidence
                    prediction([5, 3, 18, 4], 0.01),  // 2 matches
                    prediction([22, 5, 9, 10], 0.5),  // 2 matches, higher confidence
                ],
            )
            .unwrap();
        assert_eq!(record.matches_count, 2);
        assert_eq!(record.best_prediction, Some([22, 5, 9, 10]));
        assert!((record.prediction_confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_prediction_set_still_records() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let actual = Group::new([1, 2, 3, 4]).unwrap();

        let record = tracker.score_draw(actual, &[]).unwrap();
        assert_eq!(record.analyzed_predictions_count, 0);
        assert_eq!(record.best_prediction, None);
        assert_eq!(record.matches_count, 0);
    }

    #[test]
    fn test_only_top_ten_predictions_are_analyzed() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let actual = Group::new([5, 22, 18, 11]).unwrap();

        // The perfect match sits beyond the analyzed depth.
        let mut predictions = vec![prediction([1, 2, 3, 4], 0.9); 10];
        predictions.push(prediction([5, 22, 18, 11], 0.9));

        let record = tracker.score_draw(actual, &predictions).unwrap();
        assert_eq!(record.analyzed_predictions_count, 10);
        assert_eq!(record.matches_count, 0);
    }

    #[test]
    fn test_insights_rolling_average() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let actual = Group::new([5, 22, 18, 11]).unwrap();

        // Two perfect scores, one zero.
        tracker
            .score_draw(actual, &[prediction([5, 22, 18, 11], 1.0)])
            .unwrap();
        tracker
            .score_draw(actual, &[prediction([22, 5, 11, 18], 1.0)])
            .unwrap();
        tracker
            .score_draw(actual, &[prediction([1, 2, 3, 4], 1.0)])
            .unwrap();

        let insights = tracker.insights().unwrap();
        assert_eq!(insights.total_draws_analyzed, 3);
        assert!((insights.recent_accuracy_avg - 2.0 / 3.0).abs() < 1e-9);
        assert!((insights.best_accuracy - 1.0).abs() < 1e-12);
        assert!((insights.worst_accuracy - 0.0).abs() < 1e-12);
        assert!(!insights.recommendations.is_empty());
    }

    #[test]
    fn test_insights_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let insights = tracker(dir.path()).insights().unwrap();
        assert_eq!(insights.total_draws_analyzed, 0);
        assert_eq!(insights.recent_accuracy_avg, 0.0);
        assert_eq!(insights.recommendations.len(), 1);
    }
}
