use analysis_core::{
    BalanceSheet, CashFlowStatement, IncomeStatement, MarketDataPoint, PeriodType,
    StatementPeriod, StatementSet,
};
use chrono::NaiveDate;

use crate::{RatioCalculator, RatioCategory, RatioName};

fn period(year: i32) -> StatementPeriod {
    StatementPeriod {
        company_id: "ACME".to_string(),
        fiscal_year: year,
        fiscal_quarter: None,
        period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
        period_type: PeriodType::Annual,
    }
}

fn sample_set() -> StatementSet {
    let mut income = IncomeStatement::empty(period(2024));
    income.revenue = Some(1_000_000.0);
    income.cost_of_revenue = Some(600_000.0);
    income.operating_income = Some(200_000.0);
    income.ebitda = Some(250_000.0);
    income.interest_expense = Some(20_000.0);
    income.income_tax_expense = Some(30_000.0);
    income.net_income = Some(120_000.0);
    income.eps_diluted = Some(1.2);

    let mut prior_income = IncomeStatement::empty(period(2023));
    prior_income.revenue = Some(800_000.0);
    prior_income.net_income = Some(100_000.0);
    prior_income.eps_diluted = Some(1.0);

    let mut balance = BalanceSheet::empty(period(2024));
    balance.cash_and_equivalents = Some(100_000.0);
    balance.accounts_receivable = Some(120_000.0);
    balance.inventory = Some(80_000.0);
    balance.current_assets = Some(500_000.0);
    balance.total_assets = Some(1_500_000.0);
    balance.accounts_payable = Some(60_000.0);
    balance.current_liabilities = Some(200_000.0);
    balance.long_term_debt = Some(300_000.0);
    balance.total_liabilities = Some(700_000.0);
    balance.retained_earnings = Some(300_000.0);
    balance.total_equity = Some(800_000.0);
    balance.shares_outstanding = Some(100_000.0);

    let mut prior_balance = BalanceSheet::empty(period(2023));
    prior_balance.accounts_receivable = Some(80_000.0);
    prior_balance.inventory = Some(80_000.0);
    prior_balance.accounts_payable = Some(40_000.0);
    prior_balance.total_assets = Some(1_300_000.0);
    prior_balance.total_equity = Some(640_000.0);

    let mut cash_flow = CashFlowStatement::empty(period(2024));
    cash_flow.operating_cash_flow = Some(150_000.0);
    cash_flow.capital_expenditures = Some(-50_000.0);
    cash_flow.dividends_paid = Some(-48_000.0);

    StatementSet {
        income: Some(income),
        balance: Some(balance),
        cash_flow: Some(cash_flow),
        prior_income: Some(prior_income),
        prior_balance: Some(prior_balance),
        market: Some(MarketDataPoint {
            company_id: "ACME".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            open: 17.5,
            high: 18.2,
            low: 17.1,
            close: 18.0,
            adjusted_close: None,
            volume: 250_000.0,
            market_cap: None,
            shares_outstanding: None,
        }),
    }
}

fn approx(a: Option<f64>, b: f64) {
    let a = a.expect("ratio should be computable");
    assert!((a - b).abs() < 0.001, "expected {b}, got {a}");
}

#[test]
fn current_ratio_is_exact() {
    let calc = RatioCalculator::new();
    let set = sample_set();
    assert_eq!(calc.calculate_ratio(RatioName::CurrentRatio, &set), Some(2.5));
}

#[test]
fn zero_denominator_gives_none() {
    let calc = RatioCalculator::new();
    let mut set = sample_set();
    set.balance.as_mut().unwrap().current_liabilities = Some(0.0);
    assert_eq!(calc.calculate_ratio(RatioName::CurrentRatio, &set), None);
    assert_eq!(calc.calculate_ratio(RatioName::QuickRatio, &set), None);
}

#[test]
fn missing_statement_gives_none_not_zero() {
    let calc = RatioCalculator::new();
    let set = StatementSet {
        income: sample_set().income,
        ..Default::default()
    };
    assert_eq!(calc.calculate_ratio(RatioName::ReturnOnEquity, &set), None);
    approx(calc.calculate_ratio(RatioName::NetMargin, &set), 0.12);
}

#[test]
fn efficiency_ratios_average_with_prior_period() {
    let calc = RatioCalculator::new();
    let set = sample_set();
    // Average receivables (120k + 80k) / 2 = 100k
    approx(calc.calculate_ratio(RatioName::ReceivablesTurnover, &set), 10.0);
    approx(calc.calculate_ratio(RatioName::DaysSalesOutstanding, &set), 36.5);
    approx(calc.calculate_ratio(RatioName::AssetTurnover, &set), 1_000_000.0 / 1_400_000.0);

    let mut no_prior = set.clone();
    no_prior.prior_balance = None;
    approx(calc.calculate_ratio(RatioName::ReceivablesTurnover, &no_prior), 1_000_000.0 / 120_000.0);
}

#[test]
fn cash_conversion_cycle_combines_day_counts() {
    let calc = RatioCalculator::new();
    let set = sample_set();
    let dso = calc.calculate_ratio(RatioName::DaysSalesOutstanding, &set).unwrap();
    let dio = calc.calculate_ratio(RatioName::DaysInventoryOutstanding, &set).unwrap();
    let dpo = calc.calculate_ratio(RatioName::DaysPayablesOutstanding, &set).unwrap();
    approx(calc.calculate_ratio(RatioName::CashConversionCycle, &set), dso + dio - dpo);

    let mut no_payables = set.clone();
    no_payables.balance.as_mut().unwrap().accounts_payable = None;
    assert_eq!(calc.calculate_ratio(RatioName::CashConversionCycle, &no_payables), None);
}

#[test]
fn growth_uses_prior_period() {
    let calc = RatioCalculator::new();
    let set = sample_set();
    approx(calc.calculate_ratio(RatioName::RevenueGrowth, &set), 0.25);
    approx(calc.calculate_ratio(RatioName::NetIncomeGrowth, &set), 0.20);
    approx(calc.calculate_ratio(RatioName::EquityGrowth, &set), 0.25);

    let mut zero_prior = set.clone();
    zero_prior.prior_income.as_mut().unwrap().revenue = Some(0.0);
    assert_eq!(calc.calculate_ratio(RatioName::RevenueGrowth, &zero_prior), None);
}

#[test]
fn market_ratios_use_price_and_shares() {
    let calc = RatioCalculator::new();
    let set = sample_set();
    approx(calc.calculate_ratio(RatioName::BookValuePerShare, &set), 8.0);
    approx(calc.calculate_ratio(RatioName::PriceToEarnings, &set), 15.0);
    approx(calc.calculate_ratio(RatioName::PriceToBook, &set), 2.25);
    // 1.8m market cap + 300k debt - 100k cash
    approx(calc.calculate_ratio(RatioName::EvToEbitda, &set), 2_000_000.0 / 250_000.0);
    approx(calc.calculate_ratio(RatioName::GrahamNumber, &set), (22.5_f64 * 1.2 * 8.0).sqrt());
    approx(calc.calculate_ratio(RatioName::PayoutRatio, &set), 0.4);
}

#[test]
fn negative_earnings_leave_pe_undefined() {
    let calc = RatioCalculator::new();
    let mut set = sample_set();
    set.income.as_mut().unwrap().eps_diluted = Some(-0.5);
    assert_eq!(calc.calculate_ratio(RatioName::PriceToEarnings, &set), None);
    assert_eq!(calc.calculate_ratio(RatioName::GrahamNumber, &set), None);
}

#[test]
fn full_set_covers_every_ratio() {
    let calc = RatioCalculator::new();
    let date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
    let ratios = calc.calculate("ACME", date, &sample_set());
    assert_eq!(ratios.values.len(), RatioName::ALL.len());
    assert!(ratios.computed_count() > 45);
    assert_eq!(ratios.by_category(RatioCategory::Liquidity).len(), 5);
    assert!(ratios.values.values().flatten().all(|v| v.is_finite()));

    let record = ratios.to_record();
    assert_eq!(record.ratios.get("current_ratio"), Some(&Some(2.5)));
}

#[test]
fn recomputation_is_bit_identical() {
    let calc = RatioCalculator::new();
    let date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
    let set = sample_set();
    let a = calc.calculate("ACME", date, &set);
    let b = calc.calculate("ACME", date, &set);
    for name in RatioName::ALL {
        assert_eq!(
            a.get(name).map(f64::to_bits),
            b.get(name).map(f64::to_bits),
            "{name}"
        );
    }
}
