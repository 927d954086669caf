use std::sync::Arc;

use analysis_core::AnalysisError;
use chrono::NaiveDate;
use composite_scorer::DimensionWeights;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::forest::{cross_validate, RandomForest};
use crate::model::{confidence_score, OptimizerConfig, TrainedModel, TrainingMetrics, TrainingSample};
use crate::repository::ModelRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Untrained,
    Trained,
    /// Trained, but older than the retrain interval.
    Stale,
    /// A training run is in flight.
    Retraining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrainingOutcome {
    Trained { metrics: TrainingMetrics },
    /// Current model is younger than the retrain interval.
    Skipped { age_days: i64 },
    InsufficientSamples { available: usize, required: usize },
    Failed { reason: String },
}

/// Fits the ensemble and derives weights and metrics. CPU bound.
pub fn fit_model(
    samples: &[TrainingSample],
    config: &OptimizerConfig,
    trained_on: NaiveDate,
) -> Result<TrainedModel, AnalysisError> {
    let usable: Vec<&TrainingSample> = samples
        .iter()
        .filter(|s| s.realized_return.is_finite() && s.dimension_scores.iter().all(|v| v.is_finite()))
        .collect();
    if usable.len() < config.min_samples {
        return Err(AnalysisError::missing(
            "*",
            format!("{} usable training samples, need {}", usable.len(), config.min_samples),
        ));
    }

    let x: Vec<Vec<f64>> = usable.iter().map(|s| s.dimension_scores.to_vec()).collect();
    let y: Vec<f64> = usable.iter().map(|s| s.realized_return).collect();

    let forest = RandomForest::fit(&x, &y, &config.forest)
        .ok_or_else(|| AnalysisError::Model("training matrix is empty or ragged".into()))?;
    let importances = forest
        .feature_importances()
        .ok_or_else(|| AnalysisError::Model("no informative split in any tree".into()))?;
    let mut raw = [0.0; 5];
    raw.copy_from_slice(&importances);
    let weights = DimensionWeights::from_raw(raw)?;

    let r_squared = forest.r_squared(&x, &y);
    let (cv_r2_mean, cv_r2_std) = cross_validate(&x, &y, config.cv_folds, &config.forest)
        .ok_or_else(|| AnalysisError::Model("cross-validation failed".into()))?;
    let confidence = confidence_score(cv_r2_mean, cv_r2_std, usable.len(), config.target_samples);

    Ok(TrainedModel {
        weights,
        trained_on,
        metrics: TrainingMetrics {
            r_squared,
            cv_r2_mean,
            cv_r2_std,
            n_samples: usable.len(),
            confidence,
        },
        forest,
    })
}

/// Owns the learned dimension weights and their lifecycle.
pub struct WeightOptimizer {
    config: OptimizerConfig,
    repository: Arc<dyn ModelRepository>,
    state: ModelState,
    model: Option<TrainedModel>,
}

impl WeightOptimizer {
    pub fn new(config: OptimizerConfig, repository: Arc<dyn ModelRepository>) -> Self {
        Self {
            config,
            repository,
            state: ModelState::Untrained,
            model: None,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Reads a previously saved model, if any.
    pub async fn load(&mut self, today: NaiveDate) -> Result<ModelState, AnalysisError> {
        if let Some(model) = self.repository.load().await? {
            info!(
                trained_on = %model.trained_on,
                confidence = model.metrics.confidence,
                "Loaded saved weight model"
            );
            self.model = Some(model);
            self.state = ModelState::Trained;
        }
        Ok(self.refresh(today))
    }

    /// Marks a trained model stale once it reaches the retrain interval.
    pub fn refresh(&mut self, today: NaiveDate) -> ModelState {
        if self.state == ModelState::Trained
            && self
                .model
                .as_ref()
                .is_some_and(|m| m.age_days(today) >= self.config.retrain_interval_days)
        {
            self.state = ModelState::Stale;
        }
        self.state
    }

    /// A leftover `Retraining` means a run never finished, so it counts as due.
    pub fn needs_training(&mut self, today: NaiveDate) -> bool {
        matches!(
            self.refresh(today),
            ModelState::Untrained | ModelState::Stale | ModelState::Retraining
        )
    }

    /// Learned weights, or the fixed defaults when nothing is trained.
    pub fn weights(&self) -> DimensionWeights {
        self.model.as_ref().map(|m| m.weights).unwrap_or_default()
    }

    pub fn confidence(&self) -> f64 {
        self.model.as_ref().map(|m| m.metrics.confidence).unwrap_or(0.0)
    }

    pub fn predict_return(&self, dimension_scores: &[f64; 5]) -> Option<f64> {
        self.model.as_ref().map(|m| m.predict(dimension_scores))
    }

    /// Retrains when the model is missing or stale, or when `force` is set.
    /// Failures are logged and leave the current model in place.
    pub async fn train(
        &mut self,
        samples: Vec<TrainingSample>,
        today: NaiveDate,
        force: bool,
    ) -> TrainingOutcome {
        if !force && !self.needs_training(today) {
            let age_days = self.model.as_ref().map(|m| m.age_days(today)).unwrap_or(0);
            return TrainingOutcome::Skipped { age_days };
        }
        if samples.len() < self.config.min_samples {
            warn!(
                available = samples.len(),
                required = self.config.min_samples,
                "Not enough samples to train weights, keeping current weights"
            );
            return TrainingOutcome::InsufficientSamples {
                available: samples.len(),
                required: self.config.min_samples,
            };
        }

        // State and model change only after fit and save complete.
        let config = self.config.clone();
        let fitted = tokio::task::spawn_blocking(move || fit_model(&samples, &config, today)).await;

        let model = match fitted {
            Ok(Ok(model)) => model,
            Ok(Err(e)) => return self.fail(e.to_string()),
            Err(e) => return self.fail(format!("training task aborted: {e}")),
        };
        if let Err(e) = self.repository.save(&model).await {
            return self.fail(e.to_string());
        }

        let metrics = model.metrics;
        info!(
            n_samples = metrics.n_samples,
            cv_r2 = metrics.cv_r2_mean,
            confidence = metrics.confidence,
            weights = ?model.weights.to_array(),
            "Weight model trained"
        );
        self.model = Some(model);
        self.state = ModelState::Trained;
        TrainingOutcome::Trained { metrics }
    }

    fn fail(&self, reason: String) -> TrainingOutcome {
        warn!(%reason, "Weight training failed, keeping current weights");
        TrainingOutcome::Failed { reason }
    }
}
