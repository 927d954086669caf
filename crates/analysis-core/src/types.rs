use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::AnalysisError;

/// Opaque tenant identifier threaded through every store call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Annual,
    Quarterly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Annual => "annual",
            PeriodType::Quarterly => "quarterly",
        }
    }
}

impl FromStr for PeriodType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "annual" => Ok(PeriodType::Annual),
            "quarterly" => Ok(PeriodType::Quarterly),
            other => Err(AnalysisError::invalid(format!("unknown period type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    Income,
    Balance,
    CashFlow,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Income => "income",
            StatementType::Balance => "balance",
            StatementType::CashFlow => "cash_flow",
        }
    }
}

impl FromStr for StatementType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(StatementType::Income),
            "balance" => Ok(StatementType::Balance),
            "cash_flow" => Ok(StatementType::CashFlow),
            other => Err(AnalysisError::invalid(format!(
                "unknown statement type '{other}'"
            ))),
        }
    }
}

/// Header shared by every booked statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub company_id: String,
    pub fiscal_year: i32,
    pub fiscal_quarter: Option<u8>,
    pub period_end: NaiveDate,
    pub period_type: PeriodType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub period: StatementPeriod,
    pub revenue: Option<f64>,
    pub cost_of_revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub ebit: Option<f64>,
    pub ebitda: Option<f64>,
    pub interest_expense: Option<f64>,
    pub income_tax_expense: Option<f64>,
    pub net_income: Option<f64>,
    pub eps_basic: Option<f64>,
    pub eps_diluted: Option<f64>,
    pub weighted_shares: Option<f64>,
}

impl IncomeStatement {
    pub fn empty(period: StatementPeriod) -> Self {
        Self {
            period,
            revenue: None,
            cost_of_revenue: None,
            gross_profit: None,
            operating_income: None,
            ebit: None,
            ebitda: None,
            interest_expense: None,
            income_tax_expense: None,
            net_income: None,
            eps_basic: None,
            eps_diluted: None,
            weighted_shares: None,
        }
    }

    /// EBIT, falling back to operating income when EBIT is not booked separately.
    pub fn ebit_or_operating(&self) -> Option<f64> {
        self.ebit.or(self.operating_income)
    }

    /// Gross profit, derived from revenue and cost of revenue when not booked.
    pub fn gross_profit_or_derived(&self) -> Option<f64> {
        self.gross_profit.or(match (self.revenue, self.cost_of_revenue) {
            (Some(r), Some(c)) => Some(r - c),
            _ => None,
        })
    }

    pub fn eps(&self) -> Option<f64> {
        self.eps_diluted.or(self.eps_basic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub period: StatementPeriod,
    pub cash_and_equivalents: Option<f64>,
    pub short_term_investments: Option<f64>,
    pub accounts_receivable: Option<f64>,
    pub inventory: Option<f64>,
    pub current_assets: Option<f64>,
    pub fixed_assets: Option<f64>,
    pub total_assets: Option<f64>,
    pub accounts_payable: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub short_term_debt: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub retained_earnings: Option<f64>,
    pub total_equity: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

impl BalanceSheet {
    pub fn empty(period: StatementPeriod) -> Self {
        Self {
            period,
            cash_and_equivalents: None,
            short_term_investments: None,
            accounts_receivable: None,
            inventory: None,
            current_assets: None,
            fixed_assets: None,
            total_assets: None,
            accounts_payable: None,
            current_liabilities: None,
            short_term_debt: None,
            long_term_debt: None,
            total_liabilities: None,
            retained_earnings: None,
            total_equity: None,
            shares_outstanding: None,
        }
    }

    /// Interest-bearing debt. `None` only when neither component is booked.
    pub fn total_debt(&self) -> Option<f64> {
        match (self.short_term_debt, self.long_term_debt) {
            (None, None) => None,
            (s, l) => Some(s.unwrap_or(0.0) + l.unwrap_or(0.0)),
        }
    }

    pub fn working_capital(&self) -> Option<f64> {
        match (self.current_assets, self.current_liabilities) {
            (Some(a), Some(l)) => Some(a - l),
            _ => None,
        }
    }

    /// Cash plus short-term investments.
    pub fn liquid_assets(&self) -> Option<f64> {
        match (self.cash_and_equivalents, self.short_term_investments) {
            (None, None) => None,
            (c, s) => Some(c.unwrap_or(0.0) + s.unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub period: StatementPeriod,
    pub operating_cash_flow: Option<f64>,
    /// Booked as a negative outflow.
    pub capital_expenditures: Option<f64>,
    pub investing_cash_flow: Option<f64>,
    pub financing_cash_flow: Option<f64>,
    /// Booked as a negative outflow.
    pub dividends_paid: Option<f64>,
}

impl CashFlowStatement {
    pub fn empty(period: StatementPeriod) -> Self {
        Self {
            period,
            operating_cash_flow: None,
            capital_expenditures: None,
            investing_cash_flow: None,
            financing_cash_flow: None,
            dividends_paid: None,
        }
    }

    /// Operating cash flow plus (negative) capex.
    pub fn free_cash_flow(&self) -> Option<f64> {
        match (self.operating_cash_flow, self.capital_expenditures) {
            (Some(ocf), Some(capex)) => Some(ocf + capex),
            (Some(ocf), None) => Some(ocf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement_type", rename_all = "snake_case")]
pub enum Statement {
    Income(IncomeStatement),
    Balance(BalanceSheet),
    CashFlow(CashFlowStatement),
}

impl Statement {
    pub fn period(&self) -> &StatementPeriod {
        match self {
            Statement::Income(s) => &s.period,
            Statement::Balance(s) => &s.period,
            Statement::CashFlow(s) => &s.period,
        }
    }

    pub fn statement_type(&self) -> StatementType {
        match self {
            Statement::Income(_) => StatementType::Income,
            Statement::Balance(_) => StatementType::Balance,
            Statement::CashFlow(_) => StatementType::CashFlow,
        }
    }

    pub fn into_income(self) -> Option<IncomeStatement> {
        match self {
            Statement::Income(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_balance(self) -> Option<BalanceSheet> {
        match self {
            Statement::Balance(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_cash_flow(self) -> Option<CashFlowStatement> {
        match self {
            Statement::CashFlow(s) => Some(s),
            _ => None,
        }
    }
}

/// One daily price bar for a company (or a market index series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub company_id: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: Option<f64>,
    pub volume: f64,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

impl MarketDataPoint {
    /// Adjusted close when available, raw close otherwise.
    pub fn price(&self) -> f64 {
        self.adjusted_close.unwrap_or(self.close)
    }

    pub fn market_cap_or_derived(&self) -> Option<f64> {
        self.market_cap
            .or_else(|| self.shares_outstanding.map(|s| s * self.price()))
    }
}

/// The statements and market point that one computation date works from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementSet {
    pub income: Option<IncomeStatement>,
    pub balance: Option<BalanceSheet>,
    pub cash_flow: Option<CashFlowStatement>,
    pub prior_income: Option<IncomeStatement>,
    pub prior_balance: Option<BalanceSheet>,
    pub market: Option<MarketDataPoint>,
}

impl StatementSet {
    /// Shares outstanding, preferring the balance sheet, then market data, then
    /// weighted shares from the income statement.
    pub fn shares_outstanding(&self) -> Option<f64> {
        self.balance
            .as_ref()
            .and_then(|b| b.shares_outstanding)
            .or_else(|| self.market.as_ref().and_then(|m| m.shares_outstanding))
            .or_else(|| self.income.as_ref().and_then(|i| i.weighted_shares))
    }

    pub fn price(&self) -> Option<f64> {
        self.market.as_ref().map(|m| m.price())
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market
            .as_ref()
            .and_then(|m| m.market_cap)
            .or_else(|| match (self.price(), self.shares_outstanding()) {
                (Some(p), Some(s)) => Some(p * s),
                _ => None,
            })
    }

    pub fn period_end(&self) -> Option<NaiveDate> {
        self.balance
            .as_ref()
            .map(|b| b.period.period_end)
            .or_else(|| self.income.as_ref().map(|i| i.period.period_end))
    }
}

/// Valuation scenario tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Bull,
    Base,
    Bear,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Bull, Scenario::Base, Scenario::Bear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Bull => "bull",
            Scenario::Base => "base",
            Scenario::Bear => "bear",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Scenario::Bull => 0,
            Scenario::Base => 1,
            Scenario::Bear => 2,
        }
    }

    pub fn risk_counterpart(&self) -> RiskScenario {
        match self {
            Scenario::Bull => RiskScenario::Optimistic,
            Scenario::Base => RiskScenario::Neutral,
            Scenario::Bear => RiskScenario::Pessimistic,
        }
    }
}

impl FromStr for Scenario {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bull" => Ok(Scenario::Bull),
            "base" => Ok(Scenario::Base),
            "bear" => Ok(Scenario::Bear),
            other => Err(AnalysisError::invalid(format!("unknown scenario '{other}'"))),
        }
    }
}

/// Risk scenario tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskScenario {
    Optimistic,
    Neutral,
    Pessimistic,
}

impl RiskScenario {
    pub const ALL: [RiskScenario; 3] = [
        RiskScenario::Optimistic,
        RiskScenario::Neutral,
        RiskScenario::Pessimistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskScenario::Optimistic => "optimistic",
            RiskScenario::Neutral => "neutral",
            RiskScenario::Pessimistic => "pessimistic",
        }
    }

    /// Multiplier applied to every component risk score.
    pub fn risk_multiplier(&self) -> f64 {
        match self {
            RiskScenario::Optimistic => 0.80,
            RiskScenario::Neutral => 1.00,
            RiskScenario::Pessimistic => 1.30,
        }
    }

    pub fn valuation_counterpart(&self) -> Scenario {
        match self {
            RiskScenario::Optimistic => Scenario::Bull,
            RiskScenario::Neutral => Scenario::Base,
            RiskScenario::Pessimistic => Scenario::Bear,
        }
    }
}

impl FromStr for RiskScenario {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimistic" => Ok(RiskScenario::Optimistic),
            "neutral" => Ok(RiskScenario::Neutral),
            "pessimistic" => Ok(RiskScenario::Pessimistic),
            other => Err(AnalysisError::invalid(format!(
                "unknown risk scenario '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethod {
    Dcf,
    Comparables,
    AssetBased,
    Ddm,
    Rim,
}

impl ValuationMethod {
    pub const ALL: [ValuationMethod; 5] = [
        ValuationMethod::Dcf,
        ValuationMethod::Comparables,
        ValuationMethod::AssetBased,
        ValuationMethod::Ddm,
        ValuationMethod::Rim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationMethod::Dcf => "dcf",
            ValuationMethod::Comparables => "comparables",
            ValuationMethod::AssetBased => "asset_based",
            ValuationMethod::Ddm => "ddm",
            ValuationMethod::Rim => "rim",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ValuationMethod::Dcf => 0,
            ValuationMethod::Comparables => 1,
            ValuationMethod::AssetBased => 2,
            ValuationMethod::Ddm => 3,
            ValuationMethod::Rim => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl FromStr for ValuationMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dcf" => Ok(ValuationMethod::Dcf),
            "comparables" | "comparable" => Ok(ValuationMethod::Comparables),
            "asset_based" | "asset" => Ok(ValuationMethod::AssetBased),
            "ddm" => Ok(ValuationMethod::Ddm),
            "rim" => Ok(ValuationMethod::Rim),
            other => Err(AnalysisError::invalid(format!(
                "unknown valuation method '{other}'"
            ))),
        }
    }
}

/// Risk rating bucket derived from the overall risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskRating {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl RiskRating {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 25.0 => RiskRating::Low,
            s if s < 50.0 => RiskRating::Medium,
            s if s < 75.0 => RiskRating::High,
            _ => RiskRating::VeryHigh,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskRating::Low => "Low",
            RiskRating::Medium => "Medium",
            RiskRating::High => "High",
            RiskRating::VeryHigh => "Very High",
        }
    }
}

impl FromStr for RiskRating {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(RiskRating::Low),
            "Medium" => Ok(RiskRating::Medium),
            "High" => Ok(RiskRating::High),
            "Very High" => Ok(RiskRating::VeryHigh),
            other => Err(AnalysisError::invalid(format!("unknown risk rating '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> StatementPeriod {
        StatementPeriod {
            company_id: "ACME".to_string(),
            fiscal_year: 2024,
            fiscal_quarter: None,
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            period_type: PeriodType::Annual,
        }
    }

    #[test]
    fn unknown_scenario_is_invalid_parameter() {
        assert_eq!("BULL".parse::<Scenario>().unwrap(), Scenario::Bull);
        let err = "sideways".parse::<Scenario>().unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn risk_rating_thresholds() {
        assert_eq!(RiskRating::from_score(24.9), RiskRating::Low);
        assert_eq!(RiskRating::from_score(25.0), RiskRating::Medium);
        assert_eq!(RiskRating::from_score(74.99), RiskRating::High);
        assert_eq!(RiskRating::from_score(75.0), RiskRating::VeryHigh);
    }

    #[test]
    fn free_cash_flow_adds_negative_capex() {
        let mut cf = CashFlowStatement::empty(period());
        cf.operating_cash_flow = Some(150_000.0);
        cf.capital_expenditures = Some(-50_000.0);
        assert_eq!(cf.free_cash_flow(), Some(100_000.0));
    }

    #[test]
    fn statement_round_trips_with_tag() {
        let mut bs = BalanceSheet::empty(period());
        bs.total_assets = Some(1_000.0);
        let json = serde_json::to_string(&Statement::Balance(bs.clone())).unwrap();
        assert!(json.contains("\"statement_type\":\"balance\""));
        let back: Statement = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_balance(), Some(bs));
    }

    #[test]
    fn shares_fall_back_to_market_data() {
        let set = StatementSet {
            balance: Some(BalanceSheet::empty(period())),
            market: Some(MarketDataPoint {
                company_id: "ACME".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                open: 10.0,
                high: 11.0,
                low: 9.5,
                close: 10.5,
                adjusted_close: None,
                volume: 1_000.0,
                market_cap: None,
                shares_outstanding: Some(200.0),
            }),
            ..Default::default()
        };
        assert_eq!(set.shares_outstanding(), Some(200.0));
        assert_eq!(set.market_cap(), Some(2_100.0));
    }
}
