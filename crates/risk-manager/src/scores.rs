//! Component risk scores (0 to 100, higher is riskier).

use analysis_core::{RiskRating, RiskScenario};
use serde::{Deserialize, Serialize};

/// Used when a component has no input data at all.
pub const UNKNOWN_RISK_SCORE: f64 = 50.0;
/// Market risk has no dedicated data source; neutral default.
pub const MARKET_RISK_DEFAULT: f64 = 30.0;
/// ESG risk has no dedicated data source; neutral default.
pub const ESG_RISK_DEFAULT: f64 = 50.0;
pub const NEUTRAL_DEFAULT_SOURCE: &str = "neutral_default";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub financial: f64,
    pub operational: f64,
    pub business: f64,
    pub market: f64,
    pub esg: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            financial: 0.30,
            operational: 0.25,
            business: 0.25,
            market: 0.15,
            esg: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub financial: f64,
    pub operational: f64,
    pub business: f64,
    pub market: f64,
    pub esg: f64,
}

impl ComponentScores {
    pub fn overall(&self, weights: &RiskWeights) -> f64 {
        let values = [
            self.financial,
            self.operational,
            self.business,
            self.market,
            self.esg,
        ];
        let w = [
            weights.financial,
            weights.operational,
            weights.business,
            weights.market,
            weights.esg,
        ];
        values.iter().zip(w.iter()).map(|(v, w)| v * w).sum()
    }

    /// Every component multiplied by the scenario factor, capped at 100.
    pub fn scaled(&self, scenario: RiskScenario) -> Self {
        let m = scenario.risk_multiplier();
        let scale = |v: f64| (v * m).min(100.0);
        Self {
            financial: scale(self.financial),
            operational: scale(self.operational),
            business: scale(self.business),
            market: scale(self.market),
            esg: scale(self.esg),
        }
    }

    pub fn highest(&self) -> (&'static str, f64) {
        [
            ("financial", self.financial),
            ("operational", self.operational),
            ("business", self.business),
            ("market", self.market),
            ("esg", self.esg),
        ]
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(("financial", self.financial))
    }
}

/// Debt/equity tiers with a penalty for thin interest coverage.
pub fn financial_risk_score(debt_to_equity: Option<f64>, interest_coverage: Option<f64>) -> f64 {
    let base = match debt_to_equity {
        // Negative equity reads as maximally levered.
        Some(de) if de < 0.0 || de > 2.0 => 80.0,
        Some(de) if de > 1.0 => 50.0,
        Some(de) if de > 0.5 => 30.0,
        Some(_) => 10.0,
        None => UNKNOWN_RISK_SCORE,
    };
    match interest_coverage {
        Some(cov) if cov < 1.5 => (base + 20.0).min(100.0),
        _ => base,
    }
}

pub fn operational_risk_score(operating_margin: Option<f64>) -> f64 {
    match operating_margin {
        Some(m) if m < 0.0 => 80.0,
        Some(m) if m < 0.05 => 60.0,
        Some(m) if m < 0.15 => 35.0,
        Some(_) => 15.0,
        None => UNKNOWN_RISK_SCORE,
    }
}

pub fn business_risk_score(z_score: Option<f64>) -> f64 {
    match z_score {
        Some(z) if z < 1.81 => 80.0,
        Some(z) if z < 2.99 => 40.0,
        Some(_) => 15.0,
        None => UNKNOWN_RISK_SCORE,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRisk {
    pub scenario: RiskScenario,
    pub components: ComponentScores,
    pub overall_score: f64,
    pub rating: RiskRating,
}

impl ScenarioRisk {
    pub fn from_components(
        scenario: RiskScenario,
        neutral: &ComponentScores,
        weights: &RiskWeights,
    ) -> Self {
        let components = neutral.scaled(scenario);
        let overall_score = components.overall(weights);
        Self {
            scenario,
            components,
            overall_score,
            rating: RiskRating::from_score(overall_score),
        }
    }
}
