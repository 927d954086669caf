use std::fmt;
use std::str::FromStr;

use analysis_core::{AnalysisError, StatementSet, StatementType};
use fundamental_analysis::{RatioCalculator, RatioName};
use serde::{Deserialize, Serialize};

/// A per-period value that can be tracked over time: a statement line item
/// or any computed ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Revenue,
    GrossProfit,
    OperatingIncome,
    Ebitda,
    NetIncome,
    Eps,
    TotalAssets,
    TotalEquity,
    TotalDebt,
    OperatingCashFlow,
    FreeCashFlow,
    Ratio(RatioName),
}

impl TrendMetric {
    pub const LINE_ITEMS: [TrendMetric; 11] = [
        TrendMetric::Revenue,
        TrendMetric::GrossProfit,
        TrendMetric::OperatingIncome,
        TrendMetric::Ebitda,
        TrendMetric::NetIncome,
        TrendMetric::Eps,
        TrendMetric::TotalAssets,
        TrendMetric::TotalEquity,
        TrendMetric::TotalDebt,
        TrendMetric::OperatingCashFlow,
        TrendMetric::FreeCashFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendMetric::Revenue => "revenue",
            TrendMetric::GrossProfit => "gross_profit",
            TrendMetric::OperatingIncome => "operating_income",
            TrendMetric::Ebitda => "ebitda",
            TrendMetric::NetIncome => "net_income",
            TrendMetric::Eps => "eps",
            TrendMetric::TotalAssets => "total_assets",
            TrendMetric::TotalEquity => "total_equity",
            TrendMetric::TotalDebt => "total_debt",
            TrendMetric::OperatingCashFlow => "operating_cash_flow",
            TrendMetric::FreeCashFlow => "free_cash_flow",
            TrendMetric::Ratio(r) => r.as_str(),
        }
    }

    /// Statement kinds the metric reads from.
    pub fn statement_types(&self) -> &'static [StatementType] {
        match self {
            TrendMetric::Revenue
            | TrendMetric::GrossProfit
            | TrendMetric::OperatingIncome
            | TrendMetric::Ebitda
            | TrendMetric::NetIncome
            | TrendMetric::Eps => &[StatementType::Income],
            TrendMetric::TotalAssets | TrendMetric::TotalEquity | TrendMetric::TotalDebt => {
                &[StatementType::Balance]
            }
            TrendMetric::OperatingCashFlow | TrendMetric::FreeCashFlow => {
                &[StatementType::CashFlow]
            }
            TrendMetric::Ratio(_) => &[
                StatementType::Income,
                StatementType::Balance,
                StatementType::CashFlow,
            ],
        }
    }

    pub fn value(&self, set: &StatementSet, calculator: &RatioCalculator) -> Option<f64> {
        let income = set.income.as_ref();
        let balance = set.balance.as_ref();
        let cash_flow = set.cash_flow.as_ref();
        let value = match self {
            TrendMetric::Revenue => income?.revenue,
            TrendMetric::GrossProfit => income?.gross_profit_or_derived(),
            TrendMetric::OperatingIncome => income?.operating_income,
            TrendMetric::Ebitda => income?.ebitda,
            TrendMetric::NetIncome => income?.net_income,
            TrendMetric::Eps => income?.eps(),
            TrendMetric::TotalAssets => balance?.total_assets,
            TrendMetric::TotalEquity => balance?.total_equity,
            TrendMetric::TotalDebt => balance?.total_debt(),
            TrendMetric::OperatingCashFlow => cash_flow?.operating_cash_flow,
            TrendMetric::FreeCashFlow => cash_flow?.free_cash_flow(),
            TrendMetric::Ratio(name) => calculator.calculate_ratio(*name, set),
        };
        value.filter(|v| v.is_finite())
    }
}

impl fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendMetric {
    type Err = AnalysisError;

    /// Line item names first, then ratio names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some(item) = TrendMetric::LINE_ITEMS
            .iter()
            .find(|m| m.as_str() == wanted)
        {
            return Ok(*item);
        }
        RatioName::from_str(&wanted)
            .map(TrendMetric::Ratio)
            .map_err(|_| AnalysisError::invalid(format!("unknown trend metric '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_items_and_ratios() {
        assert_eq!("Revenue".parse::<TrendMetric>().unwrap(), TrendMetric::Revenue);
        assert_eq!(
            "current_ratio".parse::<TrendMetric>().unwrap(),
            TrendMetric::Ratio(RatioName::CurrentRatio)
        );
        let err = "market_mood".parse::<TrendMetric>().unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn test_display_matches_parse() {
        for metric in TrendMetric::LINE_ITEMS {
            assert_eq!(metric.to_string().parse::<TrendMetric>().unwrap(), metric);
        }
    }
}
