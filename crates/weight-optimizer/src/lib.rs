//! Learns composite-score dimension weights from realised returns.

pub mod forest;
pub mod model;
pub mod optimizer;
pub mod repository;

#[cfg(test)]
mod optimizer_tests;

pub use forest::{cross_validate, r_squared, ForestConfig, RandomForest};
pub use model::{
    confidence_score, r_squared_confidence, OptimizerConfig, TrainedModel, TrainingMetrics,
    TrainingSample,
};
pub use optimizer::{fit_model, ModelState, TrainingOutcome, WeightOptimizer};
pub use repository::{FileModelRepository, InMemoryModelRepository, ModelRepository};
