use std::path::{Path, PathBuf};
use std::sync::Arc;

use analysis_core::AnalysisError;
use chrono::NaiveDate;
use composite_scorer::DimensionWeights;
use prediction_network::PredictionNetwork;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use weight_optimizer::{
    FileModelRepository, InMemoryModelRepository, ModelState, OptimizerConfig, TrainingMetrics,
    TrainingOutcome, TrainingSample, WeightOptimizer,
};

pub const WEIGHTS_FILE: &str = "weights.json";
pub const NETWORK_FILE: &str = "network.json";

/// What request paths see of the weight model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightStatus {
    pub weights: DimensionWeights,
    pub state: ModelState,
    pub confidence: f64,
    pub trained_on: Option<NaiveDate>,
    pub metrics: Option<TrainingMetrics>,
}

impl WeightStatus {
    fn of(optimizer: &WeightOptimizer) -> Self {
        let model = optimizer.model();
        Self {
            weights: optimizer.weights(),
            state: optimizer.state(),
            confidence: optimizer.confidence(),
            trained_on: model.map(|m| m.trained_on),
            metrics: model.map(|m| m.metrics),
        }
    }
}

/// Process-wide home of the learned models.
///
/// The optimizer sits behind a mutex held for the whole of a training run.
/// Readers only touch the published snapshots, so scoring never waits on
/// training.
pub struct ModelRegistry {
    optimizer: Mutex<WeightOptimizer>,
    published: RwLock<WeightStatus>,
    network: RwLock<Option<Arc<PredictionNetwork>>>,
    network_path: Option<PathBuf>,
}

impl ModelRegistry {
    pub fn new(optimizer: WeightOptimizer, network_path: Option<PathBuf>) -> Self {
        let published = WeightStatus::of(&optimizer);
        Self {
            optimizer: Mutex::new(optimizer),
            published: RwLock::new(published),
            network: RwLock::new(None),
            network_path,
        }
    }

    /// Nothing persisted; used by tests and one-off runs.
    pub fn in_memory(config: OptimizerConfig) -> Self {
        let repository = Arc::new(InMemoryModelRepository::default());
        Self::new(WeightOptimizer::new(config, repository), None)
    }

    /// Restores whatever models were saved under `model_dir`. A model file
    /// that cannot be read is logged and skipped so the defaults apply.
    pub async fn load(model_dir: &Path, config: OptimizerConfig, today: NaiveDate) -> Self {
        let repository = Arc::new(FileModelRepository::new(model_dir.join(WEIGHTS_FILE)));
        let mut optimizer = WeightOptimizer::new(config, repository);
        if let Err(e) = optimizer.load(today).await {
            warn!(error = %e, "Could not load weight model, using default weights");
        }

        let network_path = model_dir.join(NETWORK_FILE);
        let network = match PredictionNetwork::load(&network_path).await {
            Ok(network) => network,
            Err(e) => {
                warn!(error = %e, "Could not load prediction network");
                None
            }
        };
        info!(
            weights = ?optimizer.state(),
            network = network.is_some(),
            dir = %model_dir.display(),
            "Model registry ready"
        );

        let registry = Self::new(optimizer, Some(network_path));
        *registry.network.write().await = network.map(Arc::new);
        registry
    }

    pub async fn weights(&self) -> DimensionWeights {
        self.published.read().await.weights
    }

    pub async fn weight_status(&self) -> WeightStatus {
        let status = self.published.read().await.clone();
        if status.state != ModelState::Retraining {
            return status;
        }
        // Retraining with the optimizer unlocked means the run was dropped
        // before it could publish its result.
        match self.optimizer.try_lock() {
            Ok(optimizer) => {
                let status = WeightStatus::of(&optimizer);
                *self.published.write().await = status.clone();
                status
            }
            Err(_) => status,
        }
    }

    pub async fn needs_weight_training(&self, today: NaiveDate) -> bool {
        let mut optimizer = self.optimizer.lock().await;
        let needed = optimizer.needs_training(today);
        *self.published.write().await = WeightStatus::of(&optimizer);
        needed
    }

    /// Never fails: a run that cannot produce a model leaves the published
    /// weights as they were.
    pub async fn train_weights(
        &self,
        samples: Vec<TrainingSample>,
        today: NaiveDate,
        force: bool,
    ) -> TrainingOutcome {
        let mut optimizer = self.optimizer.lock().await;
        self.published.write().await.state = ModelState::Retraining;
        let outcome = optimizer.train(samples, today, force).await;
        *self.published.write().await = WeightStatus::of(&optimizer);
        outcome
    }

    pub async fn network(&self) -> Option<Arc<PredictionNetwork>> {
        self.network.read().await.clone()
    }

    /// Persists `network` (when the registry has a model directory) and
    /// makes it the one used for predictions.
    pub async fn install_network(&self, network: PredictionNetwork) -> Result<(), AnalysisError> {
        if let Some(path) = &self.network_path {
            network.save(path).await?;
        }
        *self.network.write().await = Some(Arc::new(network));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[tokio::test]
    async fn test_untrained_registry_serves_defaults() {
        let registry = ModelRegistry::in_memory(OptimizerConfig::default());
        let status = registry.weight_status().await;
        assert_eq!(status.state, ModelState::Untrained);
        assert_eq!(status.weights, DimensionWeights::default());
        assert_eq!(status.confidence, 0.0);
        assert!(registry.network().await.is_none());
        assert!(registry.needs_weight_training(day()).await);
    }

    #[tokio::test]
    async fn test_failed_training_keeps_published_weights() {
        let registry = ModelRegistry::in_memory(OptimizerConfig::default());
        let outcome = registry.train_weights(Vec::new(), day(), true).await;
        assert!(matches!(outcome, TrainingOutcome::InsufficientSamples { .. }));
        let status = registry.weight_status().await;
        assert_eq!(status.state, ModelState::Untrained);
        assert_eq!(status.weights, DimensionWeights::default());
    }

    #[tokio::test]
    async fn test_dropped_training_run_does_not_stick_in_retraining() {
        let config = OptimizerConfig {
            forest: weight_optimizer::ForestConfig {
                n_trees: 20,
                max_depth: 5,
                ..Default::default()
            },
            ..OptimizerConfig::default()
        };
        let registry = ModelRegistry::in_memory(config);
        let samples: Vec<TrainingSample> = (0..2000)
            .map(|i| {
                let x = f64::from(i % 100);
                TrainingSample {
                    company_id: format!("C{i}"),
                    score_date: day(),
                    dimension_scores: [x, 100.0 - x, x / 2.0, 50.0, (i % 7) as f64],
                    realized_return: x / 200.0,
                }
            })
            .collect();

        let run = registry.train_weights(samples, day(), true);
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(5), run).await;
        assert!(timed_out.is_err());

        let status = registry.weight_status().await;
        assert_eq!(status.state, ModelState::Untrained);
        assert_eq!(status.weights, DimensionWeights::default());
        assert!(registry.needs_weight_training(day()).await);
    }

    #[tokio::test]
    async fn test_load_from_empty_dir() {
        let dir = std::env::temp_dir().join(format!("registry-{}", uuid::Uuid::new_v4()));
        let registry = ModelRegistry::load(&dir, OptimizerConfig::default(), day()).await;
        assert_eq!(registry.weight_status().await.state, ModelState::Untrained);
        assert!(registry.network().await.is_none());
    }
}
