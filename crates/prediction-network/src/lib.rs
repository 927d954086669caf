//! Multi-task network predicting the best valuation method, scenario
//! probabilities, forward returns and time to fair value from valuation
//! features.

pub mod labels;
pub mod layers;
pub mod network;

#[cfg(test)]
mod network_tests;

pub use labels::{label_outcome, scenario_probabilities, OutcomeLabels, HORIZON_MONTHS};
pub use network::{
    LossWeighting, NetworkConfig, Prediction, PredictionNetwork, TaskLosses, TrainingExample,
    TrainingReport,
};
