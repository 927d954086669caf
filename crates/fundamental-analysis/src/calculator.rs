use analysis_core::math::{average_of, growth, safe_divide};
use analysis_core::{PeriodType, RatioRecord, StatementSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graham::graham_number;
use crate::ratios::{RatioCategory, RatioName};

/// Statutory rate used for NOPAT when no effective rate can be derived.
const FALLBACK_TAX_RATE: f64 = 0.21;

/// All ratios computed from one statement set. A `None` value means the
/// ratio could not be computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioSet {
    pub company_id: String,
    pub calculation_date: NaiveDate,
    pub period_end: Option<NaiveDate>,
    pub values: BTreeMap<RatioName, Option<f64>>,
}

impl RatioSet {
    pub fn get(&self, name: RatioName) -> Option<f64> {
        self.values.get(&name).copied().flatten()
    }

    pub fn by_category(&self, category: RatioCategory) -> BTreeMap<RatioName, Option<f64>> {
        self.values
            .iter()
            .filter(|(name, _)| name.category() == category)
            .map(|(name, value)| (*name, *value))
            .collect()
    }

    pub fn computed_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }

    pub fn to_record(&self) -> RatioRecord {
        RatioRecord {
            company_id: self.company_id.clone(),
            calculation_date: self.calculation_date,
            period_end: self.period_end,
            ratios: self
                .values
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), *value))
                .collect(),
        }
    }
}

pub struct RatioCalculator;

impl Default for RatioCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl RatioCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(
        &self,
        company_id: &str,
        calculation_date: NaiveDate,
        set: &StatementSet,
    ) -> RatioSet {
        let values = RatioName::ALL
            .iter()
            .map(|name| (*name, self.calculate_ratio(*name, set)))
            .collect();

        RatioSet {
            company_id: company_id.to_string(),
            calculation_date,
            period_end: set.period_end(),
            values,
        }
    }

    /// Computes a single named ratio. Never panics and never returns a
    /// non-finite value.
    pub fn calculate_ratio(&self, name: RatioName, set: &StatementSet) -> Option<f64> {
        let value = match name {
            RatioName::CurrentRatio => self.current_ratio(set),
            RatioName::QuickRatio => self.quick_ratio(set),
            RatioName::CashRatio => {
                let b = set.balance.as_ref()?;
                safe_divide(b.liquid_assets(), b.current_liabilities)
            }
            RatioName::OperatingCashFlowRatio => safe_divide(
                set.cash_flow.as_ref()?.operating_cash_flow,
                set.balance.as_ref()?.current_liabilities,
            ),
            RatioName::WorkingCapital => set.balance.as_ref()?.working_capital(),

            RatioName::GrossMargin => {
                let i = set.income.as_ref()?;
                safe_divide(i.gross_profit_or_derived(), i.revenue)
            }
            RatioName::OperatingMargin => {
                let i = set.income.as_ref()?;
                safe_divide(i.operating_income, i.revenue)
            }
            RatioName::NetMargin => {
                let i = set.income.as_ref()?;
                safe_divide(i.net_income, i.revenue)
            }
            RatioName::EbitdaMargin => {
                let i = set.income.as_ref()?;
                safe_divide(i.ebitda, i.revenue)
            }
            RatioName::ReturnOnAssets => safe_divide(
                set.income.as_ref()?.net_income,
                set.balance.as_ref()?.total_assets,
            ),
            RatioName::ReturnOnEquity => safe_divide(
                set.income.as_ref()?.net_income,
                set.balance.as_ref()?.total_equity,
            ),
            RatioName::ReturnOnInvestedCapital => self.roic(set),
            RatioName::ReturnOnCapitalEmployed => {
                let b = set.balance.as_ref()?;
                let capital_employed = Some(b.total_assets? - b.current_liabilities?);
                safe_divide(set.income.as_ref()?.ebit_or_operating(), capital_employed)
            }

            RatioName::DebtToEquity => {
                let b = set.balance.as_ref()?;
                safe_divide(b.total_debt(), b.total_equity)
            }
            RatioName::DebtToAssets => {
                let b = set.balance.as_ref()?;
                safe_divide(b.total_debt(), b.total_assets)
            }
            RatioName::DebtToCapital => {
                let b = set.balance.as_ref()?;
                let debt = b.total_debt()?;
                safe_divide(Some(debt), Some(debt + b.total_equity?))
            }
            RatioName::EquityMultiplier => {
                let b = set.balance.as_ref()?;
                safe_divide(b.total_assets, b.total_equity)
            }
            RatioName::InterestCoverage => {
                let i = set.income.as_ref()?;
                safe_divide(i.ebit_or_operating(), i.interest_expense.map(f64::abs))
            }
            RatioName::NetDebtToEbitda => {
                let b = set.balance.as_ref()?;
                let net_debt = b.total_debt()? - b.liquid_assets().unwrap_or(0.0);
                safe_divide(Some(net_debt), set.income.as_ref()?.ebitda)
            }
            RatioName::LiabilitiesToAssets => {
                let b = set.balance.as_ref()?;
                safe_divide(b.total_liabilities, b.total_assets)
            }

            RatioName::AssetTurnover => safe_divide(
                set.income.as_ref()?.revenue,
                self.averaged(set, |b| b.total_assets),
            ),
            RatioName::ReceivablesTurnover => self.receivables_turnover(set),
            RatioName::InventoryTurnover => self.inventory_turnover(set),
            RatioName::PayablesTurnover => self.payables_turnover(set),
            RatioName::DaysSalesOutstanding => {
                safe_divide(Some(self.days_in_period(set)), self.receivables_turnover(set))
            }
            RatioName::DaysInventoryOutstanding => {
                safe_divide(Some(self.days_in_period(set)), self.inventory_turnover(set))
            }
            RatioName::DaysPayablesOutstanding => {
                safe_divide(Some(self.days_in_period(set)), self.payables_turnover(set))
            }
            RatioName::CashConversionCycle => {
                let dso = self.calculate_ratio(RatioName::DaysSalesOutstanding, set)?;
                let dio = self.calculate_ratio(RatioName::DaysInventoryOutstanding, set)?;
                let dpo = self.calculate_ratio(RatioName::DaysPayablesOutstanding, set)?;
                Some(dso + dio - dpo)
            }
            RatioName::WorkingCapitalTurnover => safe_divide(
                set.income.as_ref()?.revenue,
                self.averaged(set, |b| b.working_capital()),
            ),

            RatioName::BookValuePerShare => self.book_value_per_share(set),
            RatioName::PriceToEarnings => {
                let eps = self.eps(set)?;
                if eps <= 0.0 {
                    return None;
                }
                safe_divide(set.price(), Some(eps))
            }
            RatioName::PriceToBook => {
                let bvps = self.book_value_per_share(set)?;
                if bvps <= 0.0 {
                    return None;
                }
                safe_divide(set.price(), Some(bvps))
            }
            RatioName::PriceToSales => {
                safe_divide(set.market_cap(), set.income.as_ref()?.revenue)
            }
            RatioName::PriceToCashFlow => safe_divide(
                set.market_cap(),
                set.cash_flow.as_ref()?.operating_cash_flow,
            ),
            RatioName::EvToEbitda => {
                safe_divide(self.enterprise_value(set), set.income.as_ref()?.ebitda)
            }
            RatioName::EvToSales => {
                safe_divide(self.enterprise_value(set), set.income.as_ref()?.revenue)
            }
            RatioName::EarningsYield => safe_divide(self.eps(set), set.price()),
            RatioName::DividendYield => safe_divide(
                set.cash_flow.as_ref()?.dividends_paid.map(f64::abs),
                set.market_cap(),
            ),
            RatioName::PayoutRatio => safe_divide(
                set.cash_flow.as_ref()?.dividends_paid.map(f64::abs),
                set.income.as_ref()?.net_income,
            ),
            RatioName::PegRatio => {
                let pe = self.calculate_ratio(RatioName::PriceToEarnings, set)?;
                let eps_growth = self.calculate_ratio(RatioName::EpsGrowth, set)?;
                if eps_growth <= 0.0 {
                    return None;
                }
                safe_divide(Some(pe), Some(eps_growth * 100.0))
            }
            RatioName::GrahamNumber => {
                graham_number(self.eps(set)?, self.book_value_per_share(set)?)
            }

            RatioName::RevenueGrowth => growth(
                set.income.as_ref()?.revenue,
                set.prior_income.as_ref()?.revenue,
            ),
            RatioName::NetIncomeGrowth => growth(
                set.income.as_ref()?.net_income,
                set.prior_income.as_ref()?.net_income,
            ),
            RatioName::EpsGrowth => {
                growth(set.income.as_ref()?.eps(), set.prior_income.as_ref()?.eps())
            }
            RatioName::OperatingIncomeGrowth => growth(
                set.income.as_ref()?.operating_income,
                set.prior_income.as_ref()?.operating_income,
            ),
            RatioName::AssetGrowth => growth(
                set.balance.as_ref()?.total_assets,
                set.prior_balance.as_ref()?.total_assets,
            ),
            RatioName::EquityGrowth => growth(
                set.balance.as_ref()?.total_equity,
                set.prior_balance.as_ref()?.total_equity,
            ),

            RatioName::FreeCashFlow => set.cash_flow.as_ref()?.free_cash_flow(),
            RatioName::FcfMargin => safe_divide(
                set.cash_flow.as_ref()?.free_cash_flow(),
                set.income.as_ref()?.revenue,
            ),
            RatioName::FcfPerShare => safe_divide(
                set.cash_flow.as_ref()?.free_cash_flow(),
                set.shares_outstanding(),
            ),
            RatioName::OcfToNetIncome => safe_divide(
                set.cash_flow.as_ref()?.operating_cash_flow,
                set.income.as_ref()?.net_income,
            ),
            RatioName::CapexToRevenue => safe_divide(
                set.cash_flow.as_ref()?.capital_expenditures.map(f64::abs),
                set.income.as_ref()?.revenue,
            ),
            RatioName::CapexToOperatingCashFlow => {
                let cf = set.cash_flow.as_ref()?;
                safe_divide(cf.capital_expenditures.map(f64::abs), cf.operating_cash_flow)
            }
            RatioName::CashFlowCoverage => safe_divide(
                set.cash_flow.as_ref()?.operating_cash_flow,
                set.balance.as_ref()?.total_debt(),
            ),
        };
        value.filter(|v| v.is_finite())
    }

    fn current_ratio(&self, set: &StatementSet) -> Option<f64> {
        let b = set.balance.as_ref()?;
        safe_divide(b.current_assets, b.current_liabilities)
    }

    fn quick_ratio(&self, set: &StatementSet) -> Option<f64> {
        let b = set.balance.as_ref()?;
        let quick_assets = b.current_assets? - b.inventory.unwrap_or(0.0);
        safe_divide(Some(quick_assets), b.current_liabilities)
    }

    fn roic(&self, set: &StatementSet) -> Option<f64> {
        let i = set.income.as_ref()?;
        let b = set.balance.as_ref()?;
        let ebit = i.ebit_or_operating()?;
        let tax_rate = match (i.income_tax_expense, i.net_income) {
            (Some(tax), Some(ni)) => safe_divide(Some(tax), Some(ni + tax))
                .filter(|r| (0.0..1.0).contains(r))
                .unwrap_or(FALLBACK_TAX_RATE),
            _ => FALLBACK_TAX_RATE,
        };
        let nopat = ebit * (1.0 - tax_rate);
        let invested = b.total_debt().unwrap_or(0.0) + b.total_equity?;
        safe_divide(Some(nopat), Some(invested))
    }

    fn receivables_turnover(&self, set: &StatementSet) -> Option<f64> {
        safe_divide(
            set.income.as_ref()?.revenue,
            self.averaged(set, |b| b.accounts_receivable),
        )
    }

    fn inventory_turnover(&self, set: &StatementSet) -> Option<f64> {
        safe_divide(
            set.income.as_ref()?.cost_of_revenue,
            self.averaged(set, |b| b.inventory),
        )
    }

    fn payables_turnover(&self, set: &StatementSet) -> Option<f64> {
        safe_divide(
            set.income.as_ref()?.cost_of_revenue,
            self.averaged(set, |b| b.accounts_payable),
        )
    }

    /// Average of current and prior balance-sheet values when a prior period
    /// is available, else the current value alone.
    fn averaged(
        &self,
        set: &StatementSet,
        field: impl Fn(&analysis_core::BalanceSheet) -> Option<f64>,
    ) -> Option<f64> {
        let current = field(set.balance.as_ref()?)?;
        match set.prior_balance.as_ref().and_then(&field) {
            Some(prior) => average_of(Some(current), Some(prior)),
            None => Some(current),
        }
    }

    fn days_in_period(&self, set: &StatementSet) -> f64 {
        match set.income.as_ref().map(|i| i.period.period_type) {
            Some(PeriodType::Quarterly) => 91.25,
            _ => 365.0,
        }
    }

    fn eps(&self, set: &StatementSet) -> Option<f64> {
        let income = set.income.as_ref()?;
        income
            .eps()
            .or_else(|| safe_divide(income.net_income, set.shares_outstanding()))
    }

    fn book_value_per_share(&self, set: &StatementSet) -> Option<f64> {
        safe_divide(set.balance.as_ref()?.total_equity, set.shares_outstanding())
    }

    fn enterprise_value(&self, set: &StatementSet) -> Option<f64> {
        let b = set.balance.as_ref()?;
        Some(
            set.market_cap()? + b.total_debt().unwrap_or(0.0)
                - b.liquid_assets().unwrap_or(0.0),
        )
    }
}
