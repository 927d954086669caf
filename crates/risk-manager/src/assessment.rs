use analysis_core::math::safe_divide;
use analysis_core::{
    AnalysisError, MarketDataPoint, RiskAssessmentRecord, RiskScenario, StatementSet,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::altman::{altman_z_score, AltmanZScore, AltmanZone};
use crate::market::{self, closing_prices, ConfidenceLevel, DEFAULT_BETA_WINDOW};
use crate::scores::{
    business_risk_score, financial_risk_score, operational_risk_score, ComponentScores,
    RiskWeights, ScenarioRisk, ESG_RISK_DEFAULT, MARKET_RISK_DEFAULT, NEUTRAL_DEFAULT_SOURCE,
};

/// Annualized volatility above this is flagged as a risk factor.
const HIGH_VOLATILITY: f64 = 0.40;

/// Metrics shared by all three risk scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub altman: Option<AltmanZScore>,
    pub beta: Option<f64>,
    pub volatility_30d: Option<f64>,
    pub volatility_90d: Option<f64>,
    pub var_95: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub operating_margin: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub company_id: String,
    pub assessment_date: NaiveDate,
    pub metrics: RiskMetrics,
    /// Optimistic, neutral and pessimistic, in that order.
    pub scenarios: Vec<ScenarioRisk>,
    pub risk_factors: Map<String, Value>,
    pub risk_details: Map<String, Value>,
}

impl RiskAssessment {
    pub fn scenario(&self, scenario: RiskScenario) -> Option<&ScenarioRisk> {
        self.scenarios.iter().find(|s| s.scenario == scenario)
    }

    pub fn neutral(&self) -> Option<&ScenarioRisk> {
        self.scenario(RiskScenario::Neutral)
    }

    pub fn to_records(&self) -> Vec<RiskAssessmentRecord> {
        self.scenarios
            .iter()
            .map(|s| RiskAssessmentRecord {
                company_id: self.company_id.clone(),
                assessment_date: self.assessment_date,
                scenario: s.scenario,
                overall_risk_score: s.overall_score,
                risk_rating: s.rating,
                financial_risk: s.components.financial,
                operational_risk: s.components.operational,
                business_risk: s.components.business,
                market_risk: s.components.market,
                esg_risk: s.components.esg,
                altman_z_score: self.metrics.altman.map(|a| a.z_score),
                beta: self.metrics.beta,
                volatility_30d: self.metrics.volatility_30d,
                volatility_90d: self.metrics.volatility_90d,
                var_95: self.metrics.var_95,
                risk_factors: self.risk_factors.clone(),
                risk_details: self.risk_details.clone(),
            })
            .collect()
    }
}

/// Price series feeding the market metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceInputs<'a> {
    pub prices: &'a [MarketDataPoint],
    /// Market index series. Empty when no benchmark is available.
    pub benchmark: &'a [MarketDataPoint],
}

/// Pure risk computation over already fetched inputs.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    pub weights: RiskWeights,
    pub beta_window: usize,
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskEngine {
    pub fn new() -> Self {
        Self {
            weights: RiskWeights::default(),
            beta_window: DEFAULT_BETA_WINDOW,
        }
    }

    /// Full three-scenario assessment. Requires a balance sheet and an income
    /// statement; price inputs only enrich the result.
    pub fn assess(
        &self,
        company_id: &str,
        assessment_date: NaiveDate,
        statements: &StatementSet,
        prices: PriceInputs<'_>,
    ) -> Result<RiskAssessment, AnalysisError> {
        let balance = statements
            .balance
            .as_ref()
            .ok_or_else(|| AnalysisError::missing(company_id, "balance sheet"))?;
        let income = statements
            .income
            .as_ref()
            .ok_or_else(|| AnalysisError::missing(company_id, "income statement"))?;

        let altman = altman_z_score(balance, income, statements.market_cap());
        let debt_to_equity = safe_divide(balance.total_debt(), balance.total_equity);
        let interest_coverage =
            safe_divide(income.ebit_or_operating(), income.interest_expense.map(f64::abs));
        let operating_margin = safe_divide(income.operating_income, income.revenue);

        let closes = closing_prices(prices.prices);
        let beta = if prices.benchmark.is_empty() {
            None
        } else {
            market::beta(prices.prices, prices.benchmark, self.beta_window)
        };

        let metrics = RiskMetrics {
            altman,
            beta,
            volatility_30d: market::volatility(&closes, 30),
            volatility_90d: market::volatility(&closes, 90),
            var_95: market::value_at_risk(&closes, ConfidenceLevel::Pct95),
            debt_to_equity,
            interest_coverage,
            operating_margin,
        };

        let neutral = ComponentScores {
            financial: financial_risk_score(debt_to_equity, interest_coverage),
            operational: operational_risk_score(operating_margin),
            business: business_risk_score(altman.map(|a| a.z_score)),
            market: MARKET_RISK_DEFAULT,
            esg: ESG_RISK_DEFAULT,
        };

        let scenarios = RiskScenario::ALL
            .iter()
            .map(|s| ScenarioRisk::from_components(*s, &neutral, &self.weights))
            .collect();

        Ok(RiskAssessment {
            company_id: company_id.to_string(),
            assessment_date,
            risk_factors: risk_factors(&metrics),
            risk_details: risk_details(&metrics, prices),
            metrics,
            scenarios,
        })
    }
}

fn risk_factors(metrics: &RiskMetrics) -> Map<String, Value> {
    let mut factors = Map::new();
    if let Some(de) = metrics.debt_to_equity {
        if de < 0.0 || de > 2.0 {
            factors.insert("high_leverage".into(), json!(de));
        }
    }
    if let Some(cov) = metrics.interest_coverage {
        if cov < 1.5 {
            factors.insert("weak_interest_coverage".into(), json!(cov));
        }
    }
    if let Some(margin) = metrics.operating_margin {
        if margin < 0.0 {
            factors.insert("negative_operating_margin".into(), json!(margin));
        }
    }
    if let Some(altman) = metrics.altman {
        if altman.zone == AltmanZone::DistressZone {
            factors.insert("altman_distress".into(), json!(altman.z_score));
        }
    }
    if let Some(vol) = metrics.volatility_90d {
        if vol > HIGH_VOLATILITY {
            factors.insert("high_volatility".into(), json!(vol));
        }
    }
    factors
}

fn risk_details(metrics: &RiskMetrics, prices: PriceInputs<'_>) -> Map<String, Value> {
    let mut details = Map::new();
    if let Some(altman) = metrics.altman {
        details.insert(
            "altman".into(),
            json!({
                "z_score": altman.z_score,
                "zone": altman.zone.as_str(),
                "risk_level": altman.zone.risk_level(),
                "components": altman.components,
                "used_book_equity": altman.used_book_equity,
            }),
        );
    }
    if metrics.beta.is_none() {
        let reason = if prices.benchmark.is_empty() {
            "no market index series available"
        } else {
            "fewer than 30 paired daily returns with the market index"
        };
        details.insert("beta_unavailable".into(), json!(reason));
    }
    details.insert(
        "market_risk".into(),
        json!({ "score": MARKET_RISK_DEFAULT, "source": NEUTRAL_DEFAULT_SOURCE }),
    );
    details.insert(
        "esg_risk".into(),
        json!({ "score": ESG_RISK_DEFAULT, "source": NEUTRAL_DEFAULT_SOURCE }),
    );
    details.insert("price_points".into(), json!(prices.prices.len()));
    details
}
