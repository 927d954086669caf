//! Rows written to and read back from the result store.
//!
//! Engines work with typed structures; these records are the schema-less
//! shape they take at the persistence boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{RiskRating, RiskScenario, Scenario, ValuationMethod};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioRecord {
    pub company_id: String,
    pub calculation_date: NaiveDate,
    pub period_end: Option<NaiveDate>,
    /// Ratio name to value. Absent ratios are stored as null.
    pub ratios: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub company_id: String,
    pub valuation_date: NaiveDate,
    pub method: ValuationMethod,
    pub scenario: Scenario,
    pub fair_value_per_share: Decimal,
    pub fair_value_low: Decimal,
    pub fair_value_high: Decimal,
    pub current_price: Option<Decimal>,
    pub upside_pct: Option<f64>,
    pub enterprise_value: Option<Decimal>,
    pub equity_value: Option<Decimal>,
    pub confidence: f64,
    pub parameters: Map<String, Value>,
    pub assumptions: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentRecord {
    pub company_id: String,
    pub assessment_date: NaiveDate,
    pub scenario: RiskScenario,
    pub overall_risk_score: f64,
    pub risk_rating: RiskRating,
    pub financial_risk: f64,
    pub operational_risk: f64,
    pub business_risk: f64,
    pub market_risk: f64,
    pub esg_risk: f64,
    pub altman_z_score: Option<f64>,
    pub beta: Option<f64>,
    pub volatility_30d: Option<f64>,
    pub volatility_90d: Option<f64>,
    pub var_95: Option<f64>,
    pub risk_factors: Map<String, Value>,
    pub risk_details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScoreRecord {
    pub company_id: String,
    pub score_date: NaiveDate,
    pub composite_score: f64,
    pub rating: String,
    pub valuation_score: f64,
    pub profitability_score: f64,
    pub growth_score: f64,
    pub financial_health_score: f64,
    pub risk_score: f64,
    pub weights: Map<String, Value>,
}

/// A previously computed consensus valuation, used for velocity features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub valuation_date: NaiveDate,
    pub consensus_value: f64,
}
