//! Company risk assessment: Altman Z-Score, market risk metrics and
//! scenario-scaled component risk scores.

pub mod altman;
pub mod assessment;
pub mod assessor;
pub mod market;
pub mod scores;

#[cfg(test)]
mod tests;

pub use altman::{altman_z_score, AltmanComponents, AltmanZScore, AltmanZone};
pub use assessment::{PriceInputs, RiskAssessment, RiskEngine, RiskMetrics};
pub use assessor::RiskAssessor;
pub use market::ConfidenceLevel;
pub use scores::{ComponentScores, RiskWeights, ScenarioRisk};
