//! Probability-weighted scenario outcomes and the resulting recommendation.

pub mod aggregator;
pub mod recommendation;


pub use aggregator::{
    expected_value, risk_reward_ratio, FairValueBasis, ScenarioAggregator, ScenarioAnalysis,
    ScenarioOutcome, ScenarioProbabilities,
};
pub use recommendation::Recommendation;
