use std::sync::Arc;

use analysis_core::{
    BalanceSheet, CashFlowStatement, Company, IncomeStatement, MarketDataPoint, PeriodType,
    Scenario, Statement, StatementPeriod, StatementSet, TenantId, ValuationMethod,
};
use chrono::NaiveDate;
use data_store::SqlStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::{ValuationCalculator, ValuationEngine};
use crate::methods::{terminal_value, ValuationInputs};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
}

fn period() -> StatementPeriod {
    StatementPeriod {
        company_id: "ACME".to_string(),
        fiscal_year: 2024,
        fiscal_quarter: None,
        period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        period_type: PeriodType::Annual,
    }
}

fn sample_inputs() -> ValuationInputs {
    ValuationInputs {
        company_id: "ACME".to_string(),
        shares_outstanding: 1_000.0,
        eps: 5.0,
        net_income: 5_000.0,
        book_equity: 40_000.0,
        base_fcf: 6_000.0,
        net_debt: 10_000.0,
        current_price: Some(50.0),
    }
}

fn sample_statements() -> StatementSet {
    let mut income = IncomeStatement::empty(period());
    income.revenue = Some(80_000.0);
    income.net_income = Some(5_000.0);
    income.eps_diluted = Some(5.0);

    let mut balance = BalanceSheet::empty(period());
    balance.total_equity = Some(40_000.0);
    balance.long_term_debt = Some(12_000.0);
    balance.cash_and_equivalents = Some(2_000.0);
    balance.shares_outstanding = Some(1_000.0);

    let mut cash_flow = CashFlowStatement::empty(period());
    cash_flow.operating_cash_flow = Some(8_000.0);
    cash_flow.capital_expenditures = Some(-2_000.0);

    StatementSet {
        income: Some(income),
        balance: Some(balance),
        cash_flow: Some(cash_flow),
        market: Some(MarketDataPoint {
            company_id: "ACME".into(),
            date: day(),
            open: 50.0,
            high: 50.0,
            low: 50.0,
            close: 50.0,
            adjusted_close: None,
            volume: 1_000.0,
            market_cap: None,
            shares_outstanding: None,
        }),
        ..Default::default()
    }
}

#[test]
fn test_terminal_value() {
    let tv = terminal_value(100_000.0, 0.025, 0.10).unwrap();
    assert!((tv - 1_366_666.666_666_7).abs() < 0.01);

    let err = terminal_value(100_000.0, 0.10, 0.10).unwrap_err();
    assert!(err.is_invalid_parameter());
}

#[test]
fn test_inputs_from_statements() {
    let inputs = ValuationInputs::from_statements("ACME", &sample_statements()).unwrap();
    assert_eq!(inputs, sample_inputs());
}

#[test]
fn test_base_case_values() {
    let calc = ValuationCalculator::default();
    let inputs = sample_inputs();

    let comparables = calc
        .value_scenario(&inputs, ValuationMethod::Comparables, Scenario::Base)
        .unwrap();
    assert!((comparables.intrinsic_value - 75.0).abs() < 1e-9);
    assert!((comparables.fair_value_low - 66.0).abs() < 1e-9);
    assert!((comparables.fair_value_high - 84.0).abs() < 1e-9);
    assert_eq!(comparables.confidence, 0.85);

    let asset = calc
        .value_scenario(&inputs, ValuationMethod::AssetBased, Scenario::Bear)
        .unwrap();
    assert!((asset.intrinsic_value - 34.0).abs() < 1e-9);

    // DPS 2.0 grown 5% over (12% - 5%).
    let ddm = calc
        .value_scenario(&inputs, ValuationMethod::Ddm, Scenario::Base)
        .unwrap();
    assert!((ddm.intrinsic_value - 30.0).abs() < 1e-9);

    let dcf = calc
        .value_scenario(&inputs, ValuationMethod::Dcf, Scenario::Base)
        .unwrap();
    let ev = dcf.enterprise_value.unwrap();
    assert!((dcf.equity_value.unwrap() - (ev - 10_000.0)).abs() < 1e-6);
    assert!(dcf.parameters.to_map().contains_key("wacc"));
}

#[test]
fn test_value_method_reports_upside() {
    let calc = ValuationCalculator::default();
    let valuation = calc
        .value_method("ACME", day(), ValuationMethod::Comparables, &sample_statements())
        .unwrap();
    assert_eq!(valuation.base.scenario, Scenario::Base);
    assert!((valuation.upside_pct.unwrap() - 50.0).abs() < 1e-9);

    let record = valuation.to_record().unwrap();
    assert_eq!(record.method, ValuationMethod::Comparables);
    assert_eq!(record.parameters["pe_multiple"], serde_json::json!(15.0));
}

#[test]
fn test_scenario_ordering_holds_for_valid_inputs() {
    let calc = ValuationCalculator::default();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..500 {
        let shares = rng.gen_range(1_000.0..1_000_000.0);
        let net_income = rng.gen_range(1_000.0..50_000_000.0);
        let inputs = ValuationInputs {
            company_id: "ACME".into(),
            shares_outstanding: shares,
            eps: net_income / shares,
            net_income,
            book_equity: rng.gen_range(10_000.0..500_000_000.0),
            base_fcf: rng.gen_range(1_000.0..80_000_000.0),
            net_debt: rng.gen_range(-10_000_000.0..50_000_000.0),
            current_price: Some(rng.gen_range(1.0..500.0)),
        };
        let valuation = calc.value_inputs(&inputs, "ACME", day()).unwrap();

        for triple in valuation.triples() {
            assert!(
                triple.bull.intrinsic_value >= triple.base.intrinsic_value,
                "{:?} bull below base",
                triple.base.method
            );
            assert!(
                triple.base.intrinsic_value >= triple.bear.intrinsic_value,
                "{:?} base below bear",
                triple.base.method
            );
        }
    }
}

#[test]
fn test_consensus_is_mean_of_fifteen() {
    let calc = ValuationCalculator::default();
    let valuation = calc.value_inputs(&sample_inputs(), "ACME", day()).unwrap();

    let values = valuation.all_values();
    assert_eq!(values.len(), 15);
    assert_eq!(
        valuation.consensus_valuation(),
        values.iter().sum::<f64>() / 15.0
    );

    let base: Vec<f64> = ValuationMethod::ALL
        .iter()
        .map(|m| valuation.method(*m).base.intrinsic_value)
        .collect();
    assert_eq!(valuation.method_consensus_base(), base.iter().sum::<f64>() / 5.0);
    assert_eq!(valuation.to_records().unwrap().len(), 15);
}

#[test]
fn test_recomputation_is_bit_identical() {
    let calc = ValuationCalculator::default();
    let a = calc.value_all("ACME", "ACME", day(), &sample_statements()).unwrap();
    let b = calc.value_all("ACME", "ACME", day(), &sample_statements()).unwrap();
    let bits = |v: &crate::MultiMethodValuation| -> Vec<u64> {
        v.all_values().iter().map(|x| x.to_bits()).collect()
    };
    assert_eq!(bits(&a), bits(&b));
}

#[test]
fn test_missing_cash_flow_fails_whole_valuation() {
    let mut statements = sample_statements();
    statements.cash_flow = None;
    let err = ValuationCalculator::default()
        .value_all("ACME", "ACME", day(), &statements)
        .unwrap_err();
    assert!(err.is_insufficient_data());
}

#[tokio::test]
async fn test_engine_values_stored_company() {
    let tenant = TenantId::new("t1");
    let store = Arc::new(SqlStore::connect("sqlite::memory:").await.unwrap());
    let statements = sample_statements();
    for statement in [
        Statement::Income(statements.income.clone().unwrap()),
        Statement::Balance(statements.balance.clone().unwrap()),
        Statement::CashFlow(statements.cash_flow.clone().unwrap()),
    ] {
        store.insert_statement(&tenant, &statement).await.unwrap();
    }
    store
        .insert_market_data(&tenant, &[statements.market.clone().unwrap()])
        .await
        .unwrap();

    let engine = ValuationEngine::new(store.clone(), store.clone());
    let company = Company {
        id: "ACME".into(),
        symbol: "ACM".into(),
        name: None,
        sector: None,
    };
    let valuation = engine.value_all(&tenant, &company, day()).await.unwrap();
    assert_eq!(valuation.symbol, "ACM");
    assert_eq!(valuation.current_price, Some(50.0));

    let other = TenantId::new("t2");
    let err = engine.value_all(&other, &company, day()).await.unwrap_err();
    assert!(err.is_insufficient_data());
}
