use analysis_core::math::safe_divide;
use analysis_core::{AnalysisError, RiskRating, RiskScenario, ValuationMethod};
use chrono::NaiveDate;
use risk_manager::RiskAssessment;
use serde::{Deserialize, Serialize};
use tracing::debug;
use valuation_engine::{upside_pct, MultiMethodValuation};

use crate::recommendation::Recommendation;

const PROBABILITY_TOLERANCE: f64 = 0.01;

/// Weight given to each risk scenario when computing the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioProbabilities {
    pub optimistic: f64,
    pub neutral: f64,
    pub pessimistic: f64,
}

impl Default for ScenarioProbabilities {
    fn default() -> Self {
        Self {
            optimistic: 0.25,
            neutral: 0.55,
            pessimistic: 0.20,
        }
    }
}

impl ScenarioProbabilities {
    /// Rejects negative entries and totals away from 1.
    pub fn new(optimistic: f64, neutral: f64, pessimistic: f64) -> Result<Self, AnalysisError> {
        let probabilities = Self {
            optimistic,
            neutral,
            pessimistic,
        };
        probabilities.validate()?;
        Ok(probabilities)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let all = [self.optimistic, self.neutral, self.pessimistic];
        if all.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(AnalysisError::invalid(
                "scenario probabilities must be non-negative",
            ));
        }
        let total: f64 = all.iter().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(AnalysisError::invalid(format!(
                "scenario probabilities sum to {total:.4}, expected 1.0"
            )));
        }
        Ok(())
    }

    pub fn get(&self, scenario: RiskScenario) -> f64 {
        match scenario {
            RiskScenario::Optimistic => self.optimistic,
            RiskScenario::Neutral => self.neutral,
            RiskScenario::Pessimistic => self.pessimistic,
        }
    }
}

/// Which fair value stands for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairValueBasis {
    /// Mean of the five methods for the matching valuation scenario.
    #[default]
    Consensus,
    Method(ValuationMethod),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: RiskScenario,
    pub probability: f64,
    pub fair_value: f64,
    pub upside_pct: f64,
    pub risk_score: f64,
    pub risk_rating: RiskRating,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub company_id: String,
    pub analysis_date: NaiveDate,
    pub current_price: f64,
    pub basis: FairValueBasis,
    pub outcomes: Vec<ScenarioOutcome>,
    pub expected_value: f64,
    pub expected_upside_pct: f64,
    /// `None` when the pessimistic case shows no downside to measure against.
    pub risk_reward_ratio: Option<f64>,
    pub recommendation: Recommendation,
}

impl ScenarioAnalysis {
    pub fn outcome(&self, scenario: RiskScenario) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }
}

/// `Σ fair_value × probability`.
pub fn expected_value(fair_values: [f64; 3], probabilities: &ScenarioProbabilities) -> f64 {
    RiskScenario::ALL
        .iter()
        .zip(fair_values)
        .map(|(s, v)| v * probabilities.get(*s))
        .sum()
}

/// `|optimistic upside / pessimistic downside|`.
pub fn risk_reward_ratio(optimistic_upside_pct: f64, pessimistic_upside_pct: f64) -> Option<f64> {
    safe_divide(Some(optimistic_upside_pct), Some(pessimistic_upside_pct)).map(f64::abs)
}

/// Combines a multi-method valuation with the matching risk assessment.
#[derive(Debug, Clone, Default)]
pub struct ScenarioAggregator {
    pub probabilities: ScenarioProbabilities,
    pub basis: FairValueBasis,
}

impl ScenarioAggregator {
    pub fn new(probabilities: ScenarioProbabilities) -> Result<Self, AnalysisError> {
        probabilities.validate()?;
        Ok(Self {
            probabilities,
            basis: FairValueBasis::default(),
        })
    }

    pub fn with_basis(mut self, basis: FairValueBasis) -> Self {
        self.basis = basis;
        self
    }

    fn fair_value(&self, valuation: &MultiMethodValuation, scenario: RiskScenario) -> f64 {
        let scenario = scenario.valuation_counterpart();
        match self.basis {
            FairValueBasis::Consensus => {
                let values = valuation.scenario_values(scenario);
                values.iter().sum::<f64>() / values.len() as f64
            }
            FairValueBasis::Method(method) => {
                valuation.method(method).get(scenario).intrinsic_value
            }
        }
    }

    pub fn analyze(
        &self,
        valuation: &MultiMethodValuation,
        risk: &RiskAssessment,
    ) -> Result<ScenarioAnalysis, AnalysisError> {
        let company_id = &valuation.company_id;
        let current_price = valuation
            .current_price
            .filter(|p| *p > 0.0)
            .ok_or_else(|| AnalysisError::missing(company_id, "current price"))?;

        let mut outcomes = Vec::with_capacity(RiskScenario::ALL.len());
        for scenario in RiskScenario::ALL {
            let scenario_risk = risk
                .scenario(scenario)
                .ok_or_else(|| AnalysisError::missing(company_id, format!("{} risk", scenario.as_str())))?;
            let fair_value = self.fair_value(valuation, scenario);
            outcomes.push(ScenarioOutcome {
                scenario,
                probability: self.probabilities.get(scenario),
                fair_value,
                upside_pct: upside_pct(Some(current_price), fair_value).unwrap_or(0.0),
                risk_score: scenario_risk.overall_score,
                risk_rating: scenario_risk.rating,
            });
        }

        let fair_values = [outcomes[0].fair_value, outcomes[1].fair_value, outcomes[2].fair_value];
        let expected = expected_value(fair_values, &self.probabilities);
        let expected_upside_pct = upside_pct(Some(current_price), expected).unwrap_or(0.0);
        let risk_reward = risk_reward_ratio(outcomes[0].upside_pct, outcomes[2].upside_pct);
        let recommendation = Recommendation::from_upside(expected_upside_pct, outcomes[1].risk_rating);

        debug!(
            company_id = %company_id,
            expected,
            expected_upside_pct,
            recommendation = recommendation.as_str(),
            "Scenario analysis complete"
        );

        Ok(ScenarioAnalysis {
            company_id: company_id.clone(),
            analysis_date: valuation.valuation_date,
            current_price,
            basis: self.basis,
            outcomes,
            expected_value: expected,
            expected_upside_pct,
            risk_reward_ratio: risk_reward,
            recommendation,
        })
    }
}
