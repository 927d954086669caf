use std::sync::Arc;

use chrono::NaiveDate;
use composite_scorer::{Dimension, DimensionWeights};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::forest::ForestConfig;
use crate::model::{OptimizerConfig, TrainingSample};
use crate::optimizer::*;
use crate::repository::{FileModelRepository, InMemoryModelRepository, ModelRepository};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn small_config() -> OptimizerConfig {
    OptimizerConfig {
        forest: ForestConfig {
            n_trees: 20,
            max_depth: 5,
            ..ForestConfig::default()
        },
        ..OptimizerConfig::default()
    }
}

/// Returns driven almost entirely by the valuation score.
fn samples(n: usize, seed: u64) -> Vec<TrainingSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let scores: [f64; 5] = std::array::from_fn(|_| rng.gen_range(0.0..100.0));
            let noise = rng.gen_range(-0.01..0.01);
            TrainingSample {
                company_id: format!("C{i}"),
                score_date: date(2024, 1, 1),
                dimension_scores: scores,
                realized_return: scores[0] / 200.0 + scores[4] / 2000.0 + noise,
            }
        })
        .collect()
}

fn optimizer() -> WeightOptimizer {
    WeightOptimizer::new(small_config(), Arc::new(InMemoryModelRepository::default()))
}

#[test]
fn test_fit_model_learns_dominant_dimension() {
    let model = fit_model(&samples(300, 1), &small_config(), date(2025, 1, 1)).unwrap();
    let w = model.weights;
    assert!((w.sum() - 1.0).abs() < 1e-9);
    let valuation = w.get(Dimension::Valuation);
    for d in Dimension::ALL.iter().filter(|d| **d != Dimension::Valuation) {
        assert!(valuation > w.get(*d), "{d:?} outweighs valuation: {w:?}");
    }
    assert!(model.metrics.cv_r2_mean > 0.6);
    assert!(model.metrics.confidence > 0.0 && model.metrics.confidence <= 1.0);
    assert_eq!(model.metrics.n_samples, 300);
}

#[test]
fn test_fit_model_is_deterministic() {
    let data = samples(150, 9);
    let a = fit_model(&data, &small_config(), date(2025, 1, 1)).unwrap();
    let b = fit_model(&data, &small_config(), date(2025, 1, 1)).unwrap();
    assert_eq!(a.weights, b.weights);
    assert_eq!(a.metrics, b.metrics);
}

#[tokio::test]
async fn test_too_few_samples_keeps_defaults() {
    let mut opt = optimizer();
    let outcome = opt.train(samples(99, 2), date(2025, 1, 1), false).await;
    assert_eq!(
        outcome,
        TrainingOutcome::InsufficientSamples {
            available: 99,
            required: 100
        }
    );
    assert_eq!(opt.state(), ModelState::Untrained);
    assert_eq!(opt.weights(), DimensionWeights::default());
    assert_eq!(opt.confidence(), 0.0);
}

#[tokio::test]
async fn test_lifecycle_and_retrain_gate() {
    let mut opt = optimizer();
    let trained_on = date(2025, 1, 1);
    let outcome = opt.train(samples(200, 3), trained_on, false).await;
    assert!(matches!(outcome, TrainingOutcome::Trained { .. }));
    assert_eq!(opt.state(), ModelState::Trained);
    let learned = opt.weights();
    assert_ne!(learned, DimensionWeights::default());

    // Inside the interval a normal request is skipped.
    let outcome = opt.train(samples(200, 4), date(2025, 1, 20), false).await;
    assert_eq!(outcome, TrainingOutcome::Skipped { age_days: 19 });
    assert_eq!(opt.weights(), learned);

    // A forced run retrains regardless.
    let outcome = opt.train(samples(200, 4), date(2025, 1, 20), true).await;
    assert!(matches!(outcome, TrainingOutcome::Trained { .. }));
    assert_eq!(opt.model().unwrap().trained_on, date(2025, 1, 20));

    assert!(!opt.needs_training(date(2025, 2, 18)));
    assert!(opt.needs_training(date(2025, 2, 19)));
    assert_eq!(opt.state(), ModelState::Stale);
}

#[tokio::test]
async fn test_interrupted_training_can_run_again() {
    let mut opt = optimizer();
    let today = date(2025, 1, 1);
    let interrupted = tokio::time::timeout(
        std::time::Duration::from_millis(5),
        opt.train(samples(2000, 1), today, false),
    )
    .await;
    assert!(interrupted.is_err());
    assert_eq!(opt.state(), ModelState::Untrained);
    assert!(opt.needs_training(today));

    let outcome = opt.train(samples(200, 3), today, false).await;
    assert!(matches!(outcome, TrainingOutcome::Trained { .. }));
    assert_eq!(opt.state(), ModelState::Trained);
}

#[tokio::test]
async fn test_failed_training_leaves_model_untouched() {
    let mut opt = optimizer();
    let flat: Vec<TrainingSample> = samples(150, 5)
        .into_iter()
        .map(|mut s| {
            s.realized_return = 0.05;
            s
        })
        .collect();
    let outcome = opt.train(flat, date(2025, 1, 1), true).await;
    assert!(matches!(outcome, TrainingOutcome::Failed { .. }));
    assert_eq!(opt.state(), ModelState::Untrained);
    assert_eq!(opt.weights(), DimensionWeights::default());
}

#[tokio::test]
async fn test_load_marks_old_model_stale() {
    let repo = Arc::new(InMemoryModelRepository::default());
    let model = fit_model(&samples(120, 6), &small_config(), date(2025, 1, 1)).unwrap();
    repo.save(&model).await.unwrap();

    let mut fresh = WeightOptimizer::new(small_config(), repo.clone());
    assert_eq!(fresh.load(date(2025, 1, 10)).await.unwrap(), ModelState::Trained);
    assert_eq!(fresh.weights(), model.weights);

    let mut old = WeightOptimizer::new(small_config(), repo);
    assert_eq!(old.load(date(2025, 3, 1)).await.unwrap(), ModelState::Stale);
}

#[tokio::test]
async fn test_file_repository_round_trip() {
    let dir = std::env::temp_dir().join(format!("weights-{}", uuid::Uuid::new_v4()));
    let repo = FileModelRepository::new(dir.join("model.json"));
    assert!(repo.load().await.unwrap().is_none());

    let model = fit_model(&samples(120, 7), &small_config(), date(2025, 1, 1)).unwrap();
    repo.save(&model).await.unwrap();
    let loaded = repo.load().await.unwrap().unwrap();
    for (a, b) in loaded.weights.to_array().iter().zip(model.weights.to_array()) {
        assert!((a - b).abs() < 1e-12);
    }
    assert_eq!(loaded.trained_on, model.trained_on);
    let row = [50.0, 40.0, 30.0, 20.0, 10.0];
    assert!((loaded.predict(&row) - model.predict(&row)).abs() < 1e-9);
    assert!(!dir.join("model.json.tmp").exists());

    std::fs::write(repo.path(), b"{not json").unwrap();
    assert!(repo.load().await.is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}
