//! Database row types with String dates (compatible with the sqlx Any backend).

use analysis_core::{
    AnalysisError, CompositeScoreRecord, MarketDataPoint, RiskAssessmentRecord, Statement,
    ValuationRecord,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::str::FromStr;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn store_err(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Store(e.to_string())
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, AnalysisError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| store_err(format!("bad date '{value}': {e}")))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_decimal(value: &str) -> Result<Decimal, AnalysisError> {
    Decimal::from_str(value).map_err(|e| store_err(format!("bad decimal '{value}': {e}")))
}

fn parse_map(json: &str) -> Result<Map<String, Value>, AnalysisError> {
    serde_json::from_str(json).map_err(store_err)
}

#[derive(Debug, FromRow)]
pub(crate) struct CompanyRow {
    pub id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct StatementRow {
    pub payload: String,
}

impl StatementRow {
    pub fn into_statement(self) -> Result<Statement, AnalysisError> {
        serde_json::from_str(&self.payload).map_err(store_err)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MarketDataRow {
    pub company_id: String,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: Option<f64>,
    pub volume: f64,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

impl MarketDataRow {
    pub fn into_point(self) -> Result<MarketDataPoint, AnalysisError> {
        Ok(MarketDataPoint {
            date: parse_date(&self.date)?,
            company_id: self.company_id,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            adjusted_close: self.adjusted_close,
            volume: self.volume,
            market_cap: self.market_cap,
            shares_outstanding: self.shares_outstanding,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ValuationRow {
    pub company_id: String,
    pub valuation_date: String,
    pub method: String,
    pub scenario: String,
    pub fair_value_per_share: String,
    pub fair_value_low: String,
    pub fair_value_high: String,
    pub current_price: Option<String>,
    pub upside_pct: Option<f64>,
    pub enterprise_value: Option<String>,
    pub equity_value: Option<String>,
    pub confidence: f64,
    pub parameters_json: String,
    pub assumptions_json: String,
}

impl ValuationRow {
    pub fn into_record(self) -> Result<ValuationRecord, AnalysisError> {
        Ok(ValuationRecord {
            valuation_date: parse_date(&self.valuation_date)?,
            method: self.method.parse()?,
            scenario: self.scenario.parse()?,
            fair_value_per_share: parse_decimal(&self.fair_value_per_share)?,
            fair_value_low: parse_decimal(&self.fair_value_low)?,
            fair_value_high: parse_decimal(&self.fair_value_high)?,
            current_price: self.current_price.as_deref().map(parse_decimal).transpose()?,
            upside_pct: self.upside_pct,
            enterprise_value: self
                .enterprise_value
                .as_deref()
                .map(parse_decimal)
                .transpose()?,
            equity_value: self.equity_value.as_deref().map(parse_decimal).transpose()?,
            confidence: self.confidence,
            parameters: parse_map(&self.parameters_json)?,
            assumptions: parse_map(&self.assumptions_json)?,
            company_id: self.company_id,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RiskAssessmentRow {
    pub company_id: String,
    pub assessment_date: String,
    pub scenario: String,
    pub overall_risk_score: f64,
    pub risk_rating: String,
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
    pub risk_factors_json: String,
    pub risk_details_json: String,
}

impl RiskAssessmentRow {
    pub fn into_record(self) -> Result<RiskAssessmentRecord, AnalysisError> {
        Ok(RiskAssessmentRecord {
            assessment_date: parse_date(&self.assessment_date)?,
            scenario: self.scenario.parse()?,
            overall_risk_score: self.overall_risk_score,
            risk_rating: self.risk_rating.parse()?,
            financial_risk: self.financial_risk,
            operational_risk: self.operational_risk,
            business_risk: self.business_risk,
            market_risk: self.market_risk,
            esg_risk: self.esg_risk,
            altman_z_score: self.altman_z_score,
            beta: self.beta,
            volatility_30d: self.volatility_30d,
            volatility_90d: self.volatility_90d,
            var_95: self.var_95,
            risk_factors: parse_map(&self.risk_factors_json)?,
            risk_details: parse_map(&self.risk_details_json)?,
            company_id: self.company_id,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CompositeScoreRow {
    pub company_id: String,
    pub score_date: String,
    pub composite_score: f64,
    pub rating: String,
    pub valuation_score: f64,
    pub profitability_score: f64,
    pub growth_score: f64,
    pub financial_health_score: f64,
    pub risk_score: f64,
    pub weights_json: String,
}

impl CompositeScoreRow {
    pub fn into_record(self) -> Result<CompositeScoreRecord, AnalysisError> {
        Ok(CompositeScoreRecord {
            score_date: parse_date(&self.score_date)?,
            composite_score: self.composite_score,
            rating: self.rating,
            valuation_score: self.valuation_score,
            profitability_score: self.profitability_score,
            growth_score: self.growth_score,
            financial_health_score: self.financial_health_score,
            risk_score: self.risk_score,
            weights: parse_map(&self.weights_json)?,
            company_id: self.company_id,
        })
    }
}
