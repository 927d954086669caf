use analysis_core::{MarketDataPoint, Scenario, ValuationMethod};
use chrono::{Days, NaiveDate};
use feature_engineering::FEATURE_COUNT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use valuation_engine::{MultiMethodValuation, ValuationCalculator, ValuationInputs};

use crate::labels::*;
use crate::network::*;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn valuation() -> MultiMethodValuation {
    let inputs = ValuationInputs {
        company_id: "ACME".to_string(),
        shares_outstanding: 1_000.0,
        eps: 5.0,
        net_income: 5_000.0,
        book_equity: 40_000.0,
        base_fcf: 6_000.0,
        net_debt: 10_000.0,
        current_price: Some(50.0),
    };
    let mut v = ValuationCalculator::default()
        .value_inputs(&inputs, "ACME", start())
        .unwrap();
    for method in ValuationMethod::ALL {
        let triple = match method {
            ValuationMethod::Dcf => &mut v.dcf,
            ValuationMethod::Comparables => &mut v.comparables,
            ValuationMethod::AssetBased => &mut v.asset_based,
            ValuationMethod::Ddm => &mut v.ddm,
            ValuationMethod::Rim => &mut v.rim,
        };
        triple.bull.intrinsic_value = 80.0;
        triple.base.intrinsic_value = 60.0;
        triple.bear.intrinsic_value = 40.0;
    }
    v.comparables.base.intrinsic_value = 72.0;
    v
}

/// Daily closes rising linearly from 50 by 20 a year.
fn prices(days: u64) -> Vec<MarketDataPoint> {
    (0..=days)
        .map(|d| {
            let close = 50.0 + 20.0 * d as f64 / 365.0;
            MarketDataPoint {
                company_id: "ACME".to_string(),
                date: start() + Days::new(d),
                open: close,
                high: close,
                low: close,
                close,
                adjusted_close: None,
                volume: 1_000.0,
                market_cap: None,
                shares_outstanding: None,
            }
        })
        .collect()
}

#[test]
fn test_label_outcome() {
    let labels = label_outcome(&valuation(), &prices(400)).unwrap();
    assert_eq!(labels.best_method, ValuationMethod::Comparables);
    assert!((labels.returns[3] - 0.4).abs() < 1e-9);
    assert!((labels.returns[0] - (20.0 * 31.0 / 365.0) / 50.0).abs() < 1e-9);
    assert!(labels.returns.windows(2).all(|w| w[0] < w[1]));

    let p = labels.scenario_probabilities;
    assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(p[Scenario::Base.index()] > p[Scenario::Bull.index()]);
    assert!(p[Scenario::Bull.index()] > p[Scenario::Bear.index()]);

    // Base consensus 62.4 is first reached on day 227.
    assert!((labels.months_to_fair_value - 227.0 / 30.4375).abs() < 1e-9);
}

#[test]
fn test_label_outcome_needs_twelve_months() {
    assert!(label_outcome(&valuation(), &prices(200)).is_none());
}

#[test]
fn test_unreached_fair_value_is_capped() {
    let mut v = valuation();
    for triple in [&mut v.dcf, &mut v.comparables, &mut v.asset_based, &mut v.ddm, &mut v.rim] {
        triple.base.intrinsic_value = 500.0;
    }
    let labels = label_outcome(&v, &prices(400)).unwrap();
    assert_eq!(labels.months_to_fair_value, 24.0);
}

fn synthetic(n: usize, dim: usize, seed: u64) -> Vec<TrainingExample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let x: Vec<f64> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let best_method = if x[0] > 0.3 {
                ValuationMethod::Comparables
            } else if x[0] < -0.3 {
                ValuationMethod::Dcf
            } else {
                ValuationMethod::Rim
            };
            let e = [x[1].exp(), 1.0, (-x[1]).exp()];
            let sum: f64 = e.iter().sum();
            TrainingExample {
                labels: OutcomeLabels {
                    best_method,
                    scenario_probabilities: e.map(|v| v / sum),
                    returns: [0.01, 0.03, 0.06, 0.12].map(|k| k * x[2]),
                    months_to_fair_value: 12.0 + 10.0 * x[3],
                },
                features: x,
            }
        })
        .collect()
}

fn small_config() -> NetworkConfig {
    NetworkConfig {
        hidden_layers: vec![16],
        learning_rate: 0.05,
        epochs: 60,
        batch_size: 16,
        seed: 11,
        ..NetworkConfig::default()
    }
}

#[test]
fn test_training_reduces_loss() {
    let examples = synthetic(200, 6, 1);
    let (network, report) = PredictionNetwork::train(&examples, small_config()).unwrap();
    assert_eq!(report.n_examples, 200);
    assert!(report.final_loss < report.initial_loss);
    assert!(report.final_task_losses.method < 1.2);

    let prediction = network.predict(&examples[0].features).unwrap();
    assert!((prediction.method_probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!((prediction.scenario_probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(prediction.months_to_fair_value >= 0.0);
    assert_eq!(
        prediction.best_method.index(),
        (0..5)
            .max_by(|a, b| prediction.method_probabilities[*a].total_cmp(&prediction.method_probabilities[*b]))
            .unwrap()
    );
}

#[test]
fn test_uncertainty_weighting_trains() {
    let examples = synthetic(120, 6, 2);
    let config = NetworkConfig {
        loss_weighting: LossWeighting::Uncertainty,
        ..small_config()
    };
    let (_, report) = PredictionNetwork::train(&examples, config).unwrap();
    let raw: f64 = [
        report.final_task_losses.method,
        report.final_task_losses.scenario,
        report.final_task_losses.returns,
        report.final_task_losses.time,
    ]
    .iter()
    .sum();
    assert!(raw.is_finite());
    assert!(raw < report.initial_loss);
}

#[test]
fn test_training_is_deterministic() {
    let examples = synthetic(80, 6, 3);
    let (a, _) = PredictionNetwork::train(&examples, small_config()).unwrap();
    let (b, _) = PredictionNetwork::train(&examples, small_config()).unwrap();
    let row = &examples[5].features;
    assert_eq!(a.predict(row).unwrap(), b.predict(row).unwrap());
}

#[test]
fn test_rejects_bad_input() {
    assert!(PredictionNetwork::train(&[], small_config())
        .unwrap_err()
        .is_insufficient_data());

    let mut examples = synthetic(10, 6, 4);
    examples[3].features.pop();
    assert!(PredictionNetwork::train(&examples, small_config())
        .unwrap_err()
        .is_invalid_parameter());

    let (network, _) = PredictionNetwork::train(&synthetic(10, 6, 4), small_config()).unwrap();
    assert!(network.predict(&[0.0; 5]).unwrap_err().is_invalid_parameter());
}

#[tokio::test]
async fn test_save_and_load() {
    let examples = synthetic(40, FEATURE_COUNT, 5);
    let config = NetworkConfig {
        epochs: 5,
        ..small_config()
    };
    let (network, _) = PredictionNetwork::train(&examples, config).unwrap();

    let dir = std::env::temp_dir().join(format!("network-{}", uuid::Uuid::new_v4()));
    let path = dir.join("network.json");
    assert!(PredictionNetwork::load(&path).await.unwrap().is_none());
    network.save(&path).await.unwrap();
    let loaded = PredictionNetwork::load(&path).await.unwrap().unwrap();

    let row = &examples[0].features;
    let (a, b) = (network.predict(row).unwrap(), loaded.predict(row).unwrap());
    for (x, y) in a.expected_returns.iter().zip(b.expected_returns) {
        assert!((x - y).abs() < 1e-9);
    }
    assert_eq!(loaded.input_dim(), FEATURE_COUNT);
    std::fs::remove_dir_all(&dir).unwrap();
}
