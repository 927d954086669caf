//! Bagged regression trees from `aprender`, fed with dimension-score rows.

use aprender::primitives::{Matrix, Vector};
use aprender::tree::RandomForestRegressor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 6,
            seed: 42,
        }
    }
}

fn to_matrix(x: &[Vec<f64>]) -> Option<Matrix<f32>> {
    let n_features = x.first()?.len();
    if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
        return None;
    }
    let data = x.iter().flatten().map(|v| *v as f32).collect();
    Matrix::from_vec(x.len(), n_features, data).ok()
}

fn to_vector(y: &[f64]) -> Vector<f32> {
    Vector::from_slice(&y.iter().map(|v| *v as f32).collect::<Vec<_>>())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub regressor: RandomForestRegressor,
    pub n_features: usize,
}

impl RandomForest {
    /// Returns `None` for empty or ragged input, or when the trees cannot
    /// be grown.
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &ForestConfig) -> Option<Self> {
        if x.len() != y.len() {
            return None;
        }
        let matrix = to_matrix(x)?;
        let mut regressor = RandomForestRegressor::new(config.n_trees.max(1))
            .with_max_depth(config.max_depth.max(1))
            .with_random_state(config.seed);
        regressor.fit(&matrix, &to_vector(y)).ok()?;
        Some(Self {
            regressor,
            n_features: matrix.shape().1,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.predict_rows(&[row.to_vec()]).first().copied().unwrap_or(0.0)
    }

    pub fn predict_rows(&self, x: &[Vec<f64>]) -> Vec<f64> {
        match to_matrix(x) {
            Some(matrix) if matrix.shape().1 == self.n_features => self
                .regressor
                .predict(&matrix)
                .as_slice()
                .iter()
                .map(|v| f64::from(*v))
                .collect(),
            _ => vec![0.0; x.len()],
        }
    }

    /// Mean decrease in variance per feature, normalised to sum to 1;
    /// `None` if no tree made a split.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        let importances: Vec<f64> = self
            .regressor
            .feature_importances()?
            .into_iter()
            .map(f64::from)
            .collect();
        let sum: f64 = importances.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return None;
        }
        Some(importances.into_iter().map(|v| v / sum).collect())
    }

    pub fn r_squared(&self, x: &[Vec<f64>], y: &[f64]) -> f64 {
        r_squared(y, &self.predict_rows(x))
    }
}

/// Coefficient of determination; 0 when `actual` has no variance.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

/// Cross-validated R² (mean, population std) over `k` contiguous folds of a
/// seeded shuffle. Folds are fitted in parallel.
pub fn cross_validate(
    x: &[Vec<f64>],
    y: &[f64],
    k: usize,
    config: &ForestConfig,
) -> Option<(f64, f64)> {
    let n = y.len();
    if k < 2 || n < k {
        return None;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(config.seed));

    let scores = (0..k)
        .into_par_iter()
        .map(|fold| {
            let start = fold * n / k;
            let end = (fold + 1) * n / k;
            let test = &order[start..end];
            let train: Vec<usize> = order[..start].iter().chain(&order[end..]).copied().collect();

            let train_x: Vec<Vec<f64>> = train.iter().map(|i| x[*i].clone()).collect();
            let train_y: Vec<f64> = train.iter().map(|i| y[*i]).collect();
            let forest = RandomForest::fit(&train_x, &train_y, config)?;

            let test_x: Vec<Vec<f64>> = test.iter().map(|i| x[*i].clone()).collect();
            let test_y: Vec<f64> = test.iter().map(|i| y[*i]).collect();
            Some(forest.r_squared(&test_x, &test_y))
        })
        .collect::<Option<Vec<f64>>>()?;

    let mean = scores.iter().sum::<f64>() / k as f64;
    let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / k as f64).sqrt();
    Some((mean, std))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_or_empty_input_is_rejected() {
        let config = ForestConfig::default();
        assert!(RandomForest::fit(&[], &[], &config).is_none());
        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(RandomForest::fit(&ragged, &[1.0, 2.0], &config).is_none());
    }

    #[test]
    fn test_importances_follow_the_signal() {
        let x: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![f64::from(i), f64::from((i * 7) % 11)])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| r[0] * 2.0).collect();
        let config = ForestConfig {
            n_trees: 10,
            max_depth: 4,
            seed: 1,
        };
        let forest = RandomForest::fit(&x, &y, &config).unwrap();
        let importances = forest.feature_importances().unwrap();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(importances[0] > importances[1]);
        assert!(forest.r_squared(&x, &y) > 0.9);
    }

    #[test]
    fn test_r_squared_of_constant_target_is_zero() {
        assert_eq!(r_squared(&[1.0, 1.0, 1.0], &[0.5, 1.0, 2.0]), 0.0);
        assert_eq!(r_squared(&[], &[]), 0.0);
    }
}
