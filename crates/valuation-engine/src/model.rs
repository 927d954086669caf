use analysis_core::math::safe_divide;
use analysis_core::{AnalysisError, Scenario, ValuationMethod, ValuationRecord};
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::MethodParameters;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioValuation {
    pub method: ValuationMethod,
    pub scenario: Scenario,
    pub intrinsic_value: f64,
    pub fair_value_low: f64,
    pub fair_value_high: f64,
    pub confidence: f64,
    pub parameters: MethodParameters,
    pub assumptions: Map<String, Value>,
    pub enterprise_value: Option<f64>,
    pub equity_value: Option<f64>,
}

/// Bull, base and bear results of one method on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTriple {
    pub bull: ScenarioValuation,
    pub base: ScenarioValuation,
    pub bear: ScenarioValuation,
}

impl ScenarioTriple {
    pub fn get(&self, scenario: Scenario) -> &ScenarioValuation {
        match scenario {
            Scenario::Bull => &self.bull,
            Scenario::Base => &self.base,
            Scenario::Bear => &self.bear,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScenarioValuation> {
        [&self.bull, &self.base, &self.bear].into_iter()
    }

    /// `(bull − bear) / bear × 100`.
    pub fn spread_pct(&self) -> Option<f64> {
        safe_divide(
            Some(self.bull.intrinsic_value - self.bear.intrinsic_value),
            Some(self.bear.intrinsic_value),
        )
        .map(|s| s * 100.0)
    }
}

/// All five methods under all three scenarios for one company and date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiMethodValuation {
    pub company_id: String,
    pub symbol: String,
    pub valuation_date: NaiveDate,
    pub current_price: Option<f64>,
    pub dcf: ScenarioTriple,
    pub comparables: ScenarioTriple,
    pub asset_based: ScenarioTriple,
    pub ddm: ScenarioTriple,
    pub rim: ScenarioTriple,
}

impl MultiMethodValuation {
    pub fn method(&self, method: ValuationMethod) -> &ScenarioTriple {
        match method {
            ValuationMethod::Dcf => &self.dcf,
            ValuationMethod::Comparables => &self.comparables,
            ValuationMethod::AssetBased => &self.asset_based,
            ValuationMethod::Ddm => &self.ddm,
            ValuationMethod::Rim => &self.rim,
        }
    }

    pub fn triples(&self) -> impl Iterator<Item = &ScenarioTriple> {
        ValuationMethod::ALL.into_iter().map(move |m| self.method(m))
    }

    /// The 15 scenario valuations, method-major.
    pub fn all_valuations(&self) -> Vec<&ScenarioValuation> {
        self.triples().flat_map(|t| t.iter()).collect()
    }

    pub fn all_values(&self) -> Vec<f64> {
        self.all_valuations()
            .iter()
            .map(|v| v.intrinsic_value)
            .collect()
    }

    pub fn scenario_values(&self, scenario: Scenario) -> Vec<f64> {
        self.triples()
            .map(|t| t.get(scenario).intrinsic_value)
            .collect()
    }

    /// Mean of all 15 intrinsic values.
    pub fn consensus_valuation(&self) -> f64 {
        let values = self.all_values();
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Mean of the 5 base-case intrinsic values.
    pub fn method_consensus_base(&self) -> f64 {
        let values = self.scenario_values(Scenario::Base);
        values.iter().sum::<f64>() / values.len() as f64
    }

    pub fn to_records(&self) -> Result<Vec<ValuationRecord>, AnalysisError> {
        self.all_valuations()
            .into_iter()
            .map(|v| {
                to_record(
                    &self.company_id,
                    self.valuation_date,
                    self.current_price,
                    v,
                )
            })
            .collect()
    }
}

/// A single method's base-case valuation, as returned by per-method requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub company_id: String,
    pub valuation_date: NaiveDate,
    pub current_price: Option<f64>,
    pub upside_pct: Option<f64>,
    #[serde(flatten)]
    pub base: ScenarioValuation,
}

impl Valuation {
    pub fn to_record(&self) -> Result<ValuationRecord, AnalysisError> {
        to_record(
            &self.company_id,
            self.valuation_date,
            self.current_price,
            &self.base,
        )
    }
}

/// `(fair − price) / price × 100`.
pub fn upside_pct(current_price: Option<f64>, fair_value: f64) -> Option<f64> {
    let price = current_price?;
    safe_divide(Some(fair_value - price), Some(price)).map(|u| u * 100.0)
}

fn to_decimal(value: f64) -> Result<Decimal, AnalysisError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4))
        .ok_or_else(|| AnalysisError::invalid(format!("value {value} cannot be stored")))
}

fn to_record(
    company_id: &str,
    valuation_date: NaiveDate,
    current_price: Option<f64>,
    v: &ScenarioValuation,
) -> Result<ValuationRecord, AnalysisError> {
    Ok(ValuationRecord {
        company_id: company_id.to_string(),
        valuation_date,
        method: v.method,
        scenario: v.scenario,
        fair_value_per_share: to_decimal(v.intrinsic_value)?,
        fair_value_low: to_decimal(v.fair_value_low)?,
        fair_value_high: to_decimal(v.fair_value_high)?,
        current_price: current_price.map(to_decimal).transpose()?,
        upside_pct: upside_pct(current_price, v.intrinsic_value),
        enterprise_value: v.enterprise_value.map(to_decimal).transpose()?,
        equity_value: v.equity_value.map(to_decimal).transpose()?,
        confidence: v.confidence,
        parameters: v.parameters.to_map(),
        assumptions: v.assumptions.clone(),
    })
}
