//! End-to-end engine scenarios over temporary data directories.

use std::fs;
use std::path::Path;

use draw_prediction_core::{
    EngineConfig, EngineError, Group, LearningTracker, Prediction, PredictionEngine,
};
use draw_prediction_core::logging::EventLog;
use draw_prediction_core::store::{AccuracyStore, LockBudget, PredictionStore};

/// Engine sized for fast test runs.
fn test_engine(dir: &Path) -> PredictionEngine {
    let mut config = EngineConfig::with_data_dir(dir);
    config.hidden_size = 16;
    config.full_train_epochs = 2;
    config.fine_tune_epochs = 1;
    config.seed = 7;
    PredictionEngine::new(config)
}

/// A deterministic sequence of valid groups.
fn groups(count: usize) -> Vec<Group> {
    (0..count)
        .map(|i| {
            let a = (i % 26) as u8 + 1;
            let b = ((i + 9) % 26) as u8 + 1;
            let c = ((i + 3) % 26) as u8 + 1;
            let d = ((i + 17) % 26) as u8 + 1;
            Group::new([a, b, c, d]).expect("offsets keep pairs distinct")
        })
        .collect()
}

/// Seeds the flat dataset view; the store migrates it on first access.
fn seed_dataset(dir: &Path, count: usize) {
    let strings: Vec<String> = groups(count).iter().map(|g| g.to_string()).collect();
    fs::write(
        dir.join("dataset.json"),
        serde_json::to_string(&strings).unwrap(),
    )
    .unwrap();
}

fn stored_predictions(dir: &Path) -> Vec<Prediction> {
    PredictionStore::new(
        dir.join("predictions.json"),
        LockBudget::default(),
        EventLog::disabled(),
    )
    .load()
    .unwrap()
}

#[test]
fn valid_append_below_thresholds_changes_only_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = test_engine(dir.path());

    let emitted = engine.add_data_and_retrain("1 2 3 4", None).unwrap();
    assert!(emitted.is_empty());

    let status = engine.get_status().unwrap();
    assert_eq!(status.dataset_size, 1);
    assert!(!status.is_trained);

    // Too little data: no artifact written, prediction store untouched.
    assert!(!dir.path().join("model.bin").exists());
    assert!(!dir.path().join("predictions.json").exists());
}

#[test]
fn reaching_the_training_threshold_triggers_a_full_train() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 49);
    let mut engine = test_engine(dir.path());

    let emitted = engine.add_data_and_retrain("5 6 7 8", None).unwrap();
    assert!(!emitted.is_empty());
    assert!(dir.path().join("model.bin").exists());

    for p in &emitted {
        assert!(Group::is_valid(p.group.values()));
        assert!(p.score > 0.0);
    }

    // The prediction store holds exactly the emitted list.
    assert_eq!(stored_predictions(dir.path()), emitted);

    let status = engine.get_status().unwrap();
    assert!(status.is_trained);
    assert_eq!(status.dataset_size, 50);
    assert!(status.has_sufficient_data);
}

#[test]
fn invalid_group_is_rejected_before_any_state_change() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 10);
    let mut engine = test_engine(dir.path());

    match engine.add_data_and_retrain("1 1 3 4", None) {
        Err(EngineError::InvalidGroup { .. }) => {}
        other => panic!("expected InvalidGroup, got {other:?}"),
    }
    assert_eq!(engine.get_status().unwrap().dataset_size, 10);
}

#[test]
fn accuracy_scoring_closes_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let predictions = PredictionStore::new(
        dir.path().join("predictions.json"),
        LockBudget::default(),
        EventLog::disabled(),
    );
    predictions
        .replace(&[Prediction::new(
            Group::new([5, 22, 18, 11]).unwrap(),
            0.01,
        )])
        .unwrap();

    let tracker = LearningTracker::new(AccuracyStore::new(
        dir.path().join("learning_results.json"),
        LockBudget::default(),
        EventLog::disabled(),
    ));
    let record = tracker
        .score_draw(
            Group::new([19, 5, 18, 4]).unwrap(),
            &predictions.load().unwrap(),
        )
        .unwrap();

    assert_eq!(record.matches_count, 2);
    assert!((record.best_match_score - 0.5).abs() < 1e-12);

    // Exactly one record was appended and no other store was touched.
    let history: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("learning_results.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(history["performance_history"].as_array().unwrap().len(), 1);
    assert!(!dir.path().join("dataset.json").exists());
    assert_eq!(predictions.load().unwrap().len(), 1);
}

#[test]
fn predict_is_idempotent_for_a_fixed_dataset_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 50);
    let mut engine = test_engine(dir.path());
    engine.train(None).unwrap();

    let first = engine.predict(4).unwrap();
    let second = engine.predict(4).unwrap();
    assert_eq!(first, second);
    assert!(first.len() <= 4);
}

#[test]
fn corrupt_prediction_store_does_not_prevent_emission() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 50);
    let mut engine = test_engine(dir.path());
    engine.train(None).unwrap();

    fs::write(dir.path().join("predictions.json"), "{broken").unwrap();

    let emitted = engine.predict(10).unwrap();
    assert!(!emitted.is_empty());
    assert_eq!(stored_predictions(dir.path()), emitted);
}

#[test]
fn ingest_cycle_scores_previous_predictions_and_fine_tunes() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 50);
    let mut engine = test_engine(dir.path());
    let first = engine.train(None).unwrap();
    assert!(!first.is_empty());

    let emitted = engine.add_data_and_retrain("5 22 18 11", None).unwrap();
    assert!(!emitted.is_empty());

    // The realized draw was scored against the previous emission.
    let insights = engine.get_learning_insights().unwrap();
    assert_eq!(insights.total_draws_analyzed, 1);

    // The new emission replaced the old one in whole.
    assert_eq!(stored_predictions(dir.path()), emitted);
}

#[test]
fn emitted_predictions_are_sorted_and_capped() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 55);
    let mut engine = test_engine(dir.path());

    let emitted = engine.train(None).unwrap();
    assert!(!emitted.is_empty());
    assert!(emitted.len() <= 10);
    for window in emitted.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
}

#[test]
fn train_below_threshold_returns_empty_without_artifact() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 30);
    let mut engine = test_engine(dir.path());

    let emitted = engine.train(None).unwrap();
    assert!(emitted.is_empty());
    assert!(!dir.path().join("model.bin").exists());
}

#[test]
fn predict_refuses_a_too_short_history() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path(), 50);
    let mut engine = test_engine(dir.path());
    engine.train(None).unwrap();

    // Shrink the history below the prediction tail threshold.
    let dir2 = tempfile::tempdir().unwrap();
    seed_dataset(dir2.path(), 3);
    let mut config = EngineConfig::with_data_dir(dir2.path());
    config.hidden_size = 16;
    let engine2 = PredictionEngine::new(config);
    fs::copy(
        dir.path().join("model.bin"),
        dir2.path().join("model.bin"),
    )
    .unwrap();

    match engine2.predict(4) {
        Err(EngineError::InsufficientData { .. }) => {}
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}
