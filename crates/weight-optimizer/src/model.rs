use chrono::NaiveDate;
use composite_scorer::{Dimension, DimensionWeights};
use serde::{Deserialize, Serialize};

use crate::forest::{ForestConfig, RandomForest};

/// One historical observation: the five dimension scores a company had on
/// `score_date` and the return it went on to realise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub company_id: String,
    pub score_date: NaiveDate,
    /// Indexed by [`Dimension::index`].
    pub dimension_scores: [f64; 5],
    pub realized_return: f64,
}

impl TrainingSample {
    pub fn score(&self, dimension: Dimension) -> f64 {
        self.dimension_scores[dimension.index()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub min_samples: usize,
    pub target_samples: usize,
    pub retrain_interval_days: i64,
    pub cv_folds: usize,
    pub forest: ForestConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_samples: 100,
            target_samples: 500,
            retrain_interval_days: 30,
            cv_folds: 5,
            forest: ForestConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// In-sample R² of the fitted ensemble.
    pub r_squared: f64,
    pub cv_r2_mean: f64,
    pub cv_r2_std: f64,
    pub n_samples: usize,
    pub confidence: f64,
}

/// Everything persisted after a successful training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub weights: DimensionWeights,
    pub trained_on: NaiveDate,
    pub metrics: TrainingMetrics,
    pub forest: RandomForest,
}

impl TrainedModel {
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.trained_on).num_days()
    }

    /// Predicted return for a set of dimension scores.
    pub fn predict(&self, dimension_scores: &[f64; 5]) -> f64 {
        self.forest.predict(dimension_scores)
    }
}

const MAX_CV_PENALTY: f64 = 0.20;
const MAX_SAMPLE_PENALTY: f64 = 0.20;

/// Tiered mapping from R² to a base confidence in [0, 1].
pub fn r_squared_confidence(r2: f64) -> f64 {
    let step = |floor: f64, lo: f64| floor + (r2 - lo) / 0.2 * 0.2;
    if r2 >= 0.9 {
        1.0
    } else if r2 >= 0.7 {
        step(0.8, 0.7)
    } else if r2 >= 0.5 {
        step(0.6, 0.5)
    } else if r2 >= 0.3 {
        step(0.4, 0.3)
    } else {
        (r2 * 1.33).max(0.0)
    }
}

/// Base confidence from `r2`, less the CV std (capped at 0.20) and up to 0.20
/// more in proportion to how far `n_samples` falls short of `target_samples`.
pub fn confidence_score(r2: f64, cv_std: f64, n_samples: usize, target_samples: usize) -> f64 {
    let base = r_squared_confidence(r2);
    let cv_penalty = cv_std.abs().min(MAX_CV_PENALTY);
    let shortfall = if target_samples == 0 {
        0.0
    } else {
        (1.0 - n_samples as f64 / target_samples as f64).clamp(0.0, 1.0)
    };
    (base - cv_penalty - shortfall * MAX_SAMPLE_PENALTY).clamp(0.0, 1.0)
}
