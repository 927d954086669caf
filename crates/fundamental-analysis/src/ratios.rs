use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioCategory {
    Liquidity,
    Profitability,
    Leverage,
    Efficiency,
    MarketValue,
    Growth,
    CashFlow,
}

/// Every ratio the calculator knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioName {
    // Liquidity
    CurrentRatio,
    QuickRatio,
    CashRatio,
    OperatingCashFlowRatio,
    WorkingCapital,
    // Profitability
    GrossMargin,
    OperatingMargin,
    NetMargin,
    EbitdaMargin,
    ReturnOnAssets,
    ReturnOnEquity,
    ReturnOnInvestedCapital,
    ReturnOnCapitalEmployed,
    // Leverage
    DebtToEquity,
    DebtToAssets,
    DebtToCapital,
    EquityMultiplier,
    InterestCoverage,
    NetDebtToEbitda,
    LiabilitiesToAssets,
    // Efficiency
    AssetTurnover,
    ReceivablesTurnover,
    InventoryTurnover,
    PayablesTurnover,
    DaysSalesOutstanding,
    DaysInventoryOutstanding,
    DaysPayablesOutstanding,
    CashConversionCycle,
    WorkingCapitalTurnover,
    // Market value
    BookValuePerShare,
    PriceToEarnings,
    PriceToBook,
    PriceToSales,
    PriceToCashFlow,
    EvToEbitda,
    EvToSales,
    EarningsYield,
    DividendYield,
    PayoutRatio,
    PegRatio,
    GrahamNumber,
    // Growth
    RevenueGrowth,
    NetIncomeGrowth,
    EpsGrowth,
    OperatingIncomeGrowth,
    AssetGrowth,
    EquityGrowth,
    // Cash flow
    FreeCashFlow,
    FcfMargin,
    FcfPerShare,
    OcfToNetIncome,
    CapexToRevenue,
    CapexToOperatingCashFlow,
    CashFlowCoverage,
}

impl RatioName {
    pub const ALL: [RatioName; 54] = [
        RatioName::CurrentRatio,
        RatioName::QuickRatio,
        RatioName::CashRatio,
        RatioName::OperatingCashFlowRatio,
        RatioName::WorkingCapital,
        RatioName::GrossMargin,
        RatioName::OperatingMargin,
        RatioName::NetMargin,
        RatioName::EbitdaMargin,
        RatioName::ReturnOnAssets,
        RatioName::ReturnOnEquity,
        RatioName::ReturnOnInvestedCapital,
        RatioName::ReturnOnCapitalEmployed,
        RatioName::DebtToEquity,
        RatioName::DebtToAssets,
        RatioName::DebtToCapital,
        RatioName::EquityMultiplier,
        RatioName::InterestCoverage,
        RatioName::NetDebtToEbitda,
        RatioName::LiabilitiesToAssets,
        RatioName::AssetTurnover,
        RatioName::ReceivablesTurnover,
        RatioName::InventoryTurnover,
        RatioName::PayablesTurnover,
        RatioName::DaysSalesOutstanding,
        RatioName::DaysInventoryOutstanding,
        RatioName::DaysPayablesOutstanding,
        RatioName::CashConversionCycle,
        RatioName::WorkingCapitalTurnover,
        RatioName::BookValuePerShare,
        RatioName::PriceToEarnings,
        RatioName::PriceToBook,
        RatioName::PriceToSales,
        RatioName::PriceToCashFlow,
        RatioName::EvToEbitda,
        RatioName::EvToSales,
        RatioName::EarningsYield,
        RatioName::DividendYield,
        RatioName::PayoutRatio,
        RatioName::PegRatio,
        RatioName::GrahamNumber,
        RatioName::RevenueGrowth,
        RatioName::NetIncomeGrowth,
        RatioName::EpsGrowth,
        RatioName::OperatingIncomeGrowth,
        RatioName::AssetGrowth,
        RatioName::EquityGrowth,
        RatioName::FreeCashFlow,
        RatioName::FcfMargin,
        RatioName::FcfPerShare,
        RatioName::OcfToNetIncome,
        RatioName::CapexToRevenue,
        RatioName::CapexToOperatingCashFlow,
        RatioName::CashFlowCoverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RatioName::CurrentRatio => "current_ratio",
            RatioName::QuickRatio => "quick_ratio",
            RatioName::CashRatio => "cash_ratio",
            RatioName::OperatingCashFlowRatio => "operating_cash_flow_ratio",
            RatioName::WorkingCapital => "working_capital",
            RatioName::GrossMargin => "gross_margin",
            RatioName::OperatingMargin => "operating_margin",
            RatioName::NetMargin => "net_margin",
            RatioName::EbitdaMargin => "ebitda_margin",
            RatioName::ReturnOnAssets => "return_on_assets",
            RatioName::ReturnOnEquity => "return_on_equity",
            RatioName::ReturnOnInvestedCapital => "return_on_invested_capital",
            RatioName::ReturnOnCapitalEmployed => "return_on_capital_employed",
            RatioName::DebtToEquity => "debt_to_equity",
            RatioName::DebtToAssets => "debt_to_assets",
            RatioName::DebtToCapital => "debt_to_capital",
            RatioName::EquityMultiplier => "equity_multiplier",
            RatioName::InterestCoverage => "interest_coverage",
            RatioName::NetDebtToEbitda => "net_debt_to_ebitda",
            RatioName::LiabilitiesToAssets => "liabilities_to_assets",
            RatioName::AssetTurnover => "asset_turnover",
            RatioName::ReceivablesTurnover => "receivables_turnover",
            RatioName::InventoryTurnover => "inventory_turnover",
            RatioName::PayablesTurnover => "payables_turnover",
            RatioName::DaysSalesOutstanding => "days_sales_outstanding",
            RatioName::DaysInventoryOutstanding => "days_inventory_outstanding",
            RatioName::DaysPayablesOutstanding => "days_payables_outstanding",
            RatioName::CashConversionCycle => "cash_conversion_cycle",
            RatioName::WorkingCapitalTurnover => "working_capital_turnover",
            RatioName::BookValuePerShare => "book_value_per_share",
            RatioName::PriceToEarnings => "price_to_earnings",
            RatioName::PriceToBook => "price_to_book",
            RatioName::PriceToSales => "price_to_sales",
            RatioName::PriceToCashFlow => "price_to_cash_flow",
            RatioName::EvToEbitda => "ev_to_ebitda",
            RatioName::EvToSales => "ev_to_sales",
            RatioName::EarningsYield => "earnings_yield",
            RatioName::DividendYield => "dividend_yield",
            RatioName::PayoutRatio => "payout_ratio",
            RatioName::PegRatio => "peg_ratio",
            RatioName::GrahamNumber => "graham_number",
            RatioName::RevenueGrowth => "revenue_growth",
            RatioName::NetIncomeGrowth => "net_income_growth",
            RatioName::EpsGrowth => "eps_growth",
            RatioName::OperatingIncomeGrowth => "operating_income_growth",
            RatioName::AssetGrowth => "asset_growth",
            RatioName::EquityGrowth => "equity_growth",
            RatioName::FreeCashFlow => "free_cash_flow",
            RatioName::FcfMargin => "fcf_margin",
            RatioName::FcfPerShare => "fcf_per_share",
            RatioName::OcfToNetIncome => "ocf_to_net_income",
            RatioName::CapexToRevenue => "capex_to_revenue",
            RatioName::CapexToOperatingCashFlow => "capex_to_operating_cash_flow",
            RatioName::CashFlowCoverage => "cash_flow_coverage",
        }
    }

    pub fn category(&self) -> RatioCategory {
        use RatioName::*;
        match self {
            CurrentRatio | QuickRatio | CashRatio | OperatingCashFlowRatio | WorkingCapital => {
                RatioCategory::Liquidity
            }
            GrossMargin | OperatingMargin | NetMargin | EbitdaMargin | ReturnOnAssets
            | ReturnOnEquity | ReturnOnInvestedCapital | ReturnOnCapitalEmployed => {
                RatioCategory::Profitability
            }
            DebtToEquity | DebtToAssets | DebtToCapital | EquityMultiplier | InterestCoverage
            | NetDebtToEbitda | LiabilitiesToAssets => RatioCategory::Leverage,
            AssetTurnover | ReceivablesTurnover | InventoryTurnover | PayablesTurnover
            | DaysSalesOutstanding | DaysInventoryOutstanding | DaysPayablesOutstanding
            | CashConversionCycle | WorkingCapitalTurnover => RatioCategory::Efficiency,
            BookValuePerShare | PriceToEarnings | PriceToBook | PriceToSales | PriceToCashFlow
            | EvToEbitda | EvToSales | EarningsYield | DividendYield | PayoutRatio | PegRatio
            | GrahamNumber => RatioCategory::MarketValue,
            RevenueGrowth | NetIncomeGrowth | EpsGrowth | OperatingIncomeGrowth | AssetGrowth
            | EquityGrowth => RatioCategory::Growth,
            FreeCashFlow | FcfMargin | FcfPerShare | OcfToNetIncome | CapexToRevenue
            | CapexToOperatingCashFlow | CashFlowCoverage => RatioCategory::CashFlow,
        }
    }

    /// Whether the ratio needs a market data point (price or market cap).
    pub fn needs_market_data(&self) -> bool {
        use RatioName::*;
        matches!(
            self,
            PriceToEarnings
                | PriceToBook
                | PriceToSales
                | PriceToCashFlow
                | EvToEbitda
                | EvToSales
                | EarningsYield
                | DividendYield
                | PegRatio
        )
    }
}

impl std::fmt::Display for RatioName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatioName {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RatioName::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| AnalysisError::invalid(format!("unknown ratio '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_parse_back() {
        let mut seen = std::collections::HashSet::new();
        for ratio in RatioName::ALL {
            assert!(seen.insert(ratio.as_str()), "duplicate {}", ratio);
            assert_eq!(ratio.as_str().parse::<RatioName>().unwrap(), ratio);
        }
    }

    #[test]
    fn serde_name_matches_as_str() {
        for ratio in RatioName::ALL {
            let json = serde_json::to_string(&ratio).unwrap();
            assert_eq!(json, format!("\"{}\"", ratio.as_str()));
        }
    }

    #[test]
    fn unknown_ratio_is_invalid_parameter() {
        let err = "price_to_vibes".parse::<RatioName>().unwrap_err();
        assert!(err.is_invalid_parameter());
    }
}
