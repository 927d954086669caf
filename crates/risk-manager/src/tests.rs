#[cfg(test)]
mod risk_engine_tests {
    use analysis_core::{
        BalanceSheet, IncomeStatement, MarketDataPoint, PeriodType, RiskRating, RiskScenario,
        StatementPeriod, StatementSet,
    };
    use chrono::{Duration, NaiveDate};

    use crate::altman::{altman_z_score, AltmanZone};
    use crate::assessment::{PriceInputs, RiskEngine};
    use crate::market::{self, parametric_var, ConfidenceLevel};
    use crate::scores::*;

    fn period() -> StatementPeriod {
        StatementPeriod {
            company_id: "ACME".to_string(),
            fiscal_year: 2024,
            fiscal_quarter: None,
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            period_type: PeriodType::Annual,
        }
    }

    fn altman_inputs() -> (BalanceSheet, IncomeStatement) {
        let mut balance = BalanceSheet::empty(period());
        balance.current_assets = Some(500_000.0);
        balance.current_liabilities = Some(200_000.0);
        balance.total_assets = Some(1_500_000.0);
        balance.total_liabilities = Some(700_000.0);
        balance.retained_earnings = Some(300_000.0);
        balance.total_equity = Some(800_000.0);

        let mut income = IncomeStatement::empty(period());
        income.operating_income = Some(200_000.0);
        income.revenue = Some(1_000_000.0);
        (balance, income)
    }

    fn bar(company: &str, date: NaiveDate, close: f64) -> MarketDataPoint {
        MarketDataPoint {
            company_id: company.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            adjusted_close: None,
            volume: 1_000.0,
            market_cap: None,
            shares_outstanding: None,
        }
    }

    /// Deterministic zig-zag series so returns have non-zero variance.
    fn series(company: &str, days: usize, amplitude: f64) -> Vec<MarketDataPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..days)
            .map(|i| {
                let wiggle = if i % 2 == 0 { amplitude } else { -amplitude };
                let drift = if i % 5 == 0 { 0.5 } else { 0.0 };
                bar(company, start + Duration::days(i as i64), 100.0 + wiggle + drift)
            })
            .collect()
    }

    #[test]
    fn altman_components_and_zone() {
        let (balance, income) = altman_inputs();
        let z = altman_z_score(&balance, &income, Some(800_000.0)).unwrap();

        assert!((z.components.x1 - 0.2).abs() < 1e-4);
        assert!((z.components.x2 - 0.2).abs() < 1e-4);
        assert!((z.components.x3 - 0.1333).abs() < 1e-4);
        assert!((z.components.x4 - 1.1429).abs() < 1e-4);
        assert!((z.components.x5 - 0.6667).abs() < 1e-4);

        let expected = 1.2 * 0.2 + 1.4 * 0.2 + 3.3 * (200_000.0 / 1_500_000.0)
            + 0.6 * (800_000.0 / 700_000.0)
            + 1_000_000.0 / 1_500_000.0;
        assert!((z.z_score - expected).abs() < 1e-9);
        assert_eq!(z.zone, AltmanZone::GreyZone);
        assert_eq!(z.zone.risk_level(), "moderate");
        assert!(!z.used_book_equity);
    }

    #[test]
    fn altman_zero_liabilities_zeroes_x4_only() {
        let (mut balance, income) = altman_inputs();
        balance.total_liabilities = Some(0.0);
        let z = altman_z_score(&balance, &income, Some(800_000.0)).unwrap();
        assert_eq!(z.components.x4, 0.0);
        assert!(z.z_score > 0.0);
    }

    #[test]
    fn altman_falls_back_to_book_equity() {
        let (balance, income) = altman_inputs();
        let z = altman_z_score(&balance, &income, None).unwrap();
        assert!(z.used_book_equity);
        assert!((z.components.x4 - 800_000.0 / 700_000.0).abs() < 1e-12);
    }

    #[test]
    fn altman_monotonic_in_ebit() {
        let (balance, mut income) = altman_inputs();
        let mut last = f64::MIN;
        for step in 0..20 {
            income.operating_income = Some(-100_000.0 + step as f64 * 25_000.0);
            let z = altman_z_score(&balance, &income, Some(800_000.0)).unwrap().z_score;
            assert!(z >= last);
            last = z;
        }
    }

    #[test]
    fn var_95_from_moments() {
        let var = parametric_var(0.001, 0.02, ConfidenceLevel::Pct95).unwrap();
        assert!((var - (-0.032)).abs() < 1e-12);
        let var99 = parametric_var(0.001, 0.02, ConfidenceLevel::Pct99).unwrap();
        assert!(var99 < var);
    }

    #[test]
    fn confidence_level_rejects_unsupported_values() {
        assert_eq!(ConfidenceLevel::try_from(0.95).unwrap(), ConfidenceLevel::Pct95);
        assert_eq!(ConfidenceLevel::try_from(0.99).unwrap(), ConfidenceLevel::Pct99);
        let err = ConfidenceLevel::try_from(0.9).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn volatility_requires_minimum_points() {
        let prices: Vec<f64> = (0..9).map(|i| 100.0 + i as f64).collect();
        assert_eq!(market::volatility(&prices, 30), None);

        let prices: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 100.0 } else { 102.0 }).collect();
        let vol = market::volatility(&prices, 30).unwrap();
        assert!(vol > 0.0);
    }

    #[test]
    fn value_at_risk_requires_ten_prices() {
        let prices = [100.0, 101.0, 99.0, 100.5, 98.0, 101.0, 100.0, 99.5, 100.2];
        assert_eq!(market::value_at_risk(&prices, ConfidenceLevel::Pct95), None);
    }

    #[test]
    fn beta_of_amplified_series_against_index() {
        let index = series("SPY", 80, 1.0);
        // Same shape with twice the deviation from 100 gives beta close to 2.
        let stock: Vec<MarketDataPoint> = index
            .iter()
            .map(|p| bar("ACME", p.date, 100.0 + (p.close - 100.0) * 2.0))
            .collect();
        let beta = market::beta(&stock, &index, 252).unwrap();
        assert!((beta - 2.0).abs() < 0.1, "beta {beta}");
    }

    #[test]
    fn beta_needs_thirty_observations() {
        let index = series("SPY", 20, 1.0);
        let stock = series("ACME", 20, 2.0);
        assert_eq!(market::beta(&stock, &index, 252), None);
    }

    #[test]
    fn financial_risk_tiers_and_coverage_penalty() {
        assert_eq!(financial_risk_score(Some(2.5), Some(5.0)), 80.0);
        assert_eq!(financial_risk_score(Some(1.5), Some(5.0)), 50.0);
        assert_eq!(financial_risk_score(Some(0.7), Some(5.0)), 30.0);
        assert_eq!(financial_risk_score(Some(0.2), Some(5.0)), 10.0);
        assert_eq!(financial_risk_score(Some(0.2), Some(1.0)), 30.0);
        assert_eq!(financial_risk_score(Some(2.5), Some(1.0)), 100.0);
    }

    #[test]
    fn business_risk_from_altman_tier() {
        assert_eq!(business_risk_score(Some(1.5)), 80.0);
        assert_eq!(business_risk_score(Some(2.5)), 40.0);
        assert_eq!(business_risk_score(Some(3.5)), 15.0);
    }

    #[test]
    fn scenarios_scale_components_and_cap() {
        let neutral = ComponentScores {
            financial: 80.0,
            operational: 60.0,
            business: 40.0,
            market: MARKET_RISK_DEFAULT,
            esg: ESG_RISK_DEFAULT,
        };
        let weights = RiskWeights::default();
        let pessimistic =
            ScenarioRisk::from_components(RiskScenario::Pessimistic, &neutral, &weights);
        assert_eq!(pessimistic.components.financial, 100.0);
        assert!((pessimistic.components.operational - 78.0).abs() < 1e-9);

        let optimistic =
            ScenarioRisk::from_components(RiskScenario::Optimistic, &neutral, &weights);
        assert!((optimistic.components.financial - 64.0).abs() < 1e-9);

        let base = ScenarioRisk::from_components(RiskScenario::Neutral, &neutral, &weights);
        let expected = 80.0 * 0.30 + 60.0 * 0.25 + 40.0 * 0.25 + 30.0 * 0.15 + 50.0 * 0.05;
        assert!((base.overall_score - expected).abs() < 1e-9);
        assert_eq!(base.rating, RiskRating::High);
    }

    #[test]
    fn assessment_shares_metrics_across_scenarios() {
        let (mut balance, mut income) = altman_inputs();
        balance.long_term_debt = Some(400_000.0);
        income.interest_expense = Some(20_000.0);
        let statements = StatementSet {
            income: Some(income),
            balance: Some(balance),
            ..Default::default()
        };
        let prices = series("ACME", 120, 2.0);
        let engine = RiskEngine::new();
        let assessment = engine
            .assess(
                "ACME",
                NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                &statements,
                PriceInputs {
                    prices: &prices,
                    benchmark: &[],
                },
            )
            .unwrap();

        assert_eq!(assessment.scenarios.len(), 3);
        assert!(assessment.metrics.beta.is_none());
        assert!(assessment.risk_details.contains_key("beta_unavailable"));
        assert_eq!(
            assessment.risk_details["market_risk"]["source"],
            NEUTRAL_DEFAULT_SOURCE
        );
        assert!(assessment.metrics.volatility_30d.is_some());

        let optimistic = assessment.scenario(RiskScenario::Optimistic).unwrap();
        let neutral = assessment.neutral().unwrap();
        let pessimistic = assessment.scenario(RiskScenario::Pessimistic).unwrap();
        assert!(optimistic.overall_score < neutral.overall_score);
        assert!(neutral.overall_score < pessimistic.overall_score);

        let records = assessment.to_records();
        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.altman_z_score == records[0].altman_z_score));
    }

    #[test]
    fn assessment_without_balance_sheet_is_insufficient_data() {
        let statements = StatementSet::default();
        let err = RiskEngine::new()
            .assess(
                "ACME",
                NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                &statements,
                PriceInputs::default(),
            )
            .unwrap_err();
        assert!(err.is_insufficient_data());
    }
}

#[cfg(test)]
mod risk_assessor_tests {
    use std::sync::Arc;

    use analysis_core::{
        BalanceSheet, Company, IncomeStatement, MarketDataPoint, PeriodType, Statement,
        StatementPeriod, TenantId,
    };
    use chrono::{Duration, NaiveDate};
    use data_store::SqlStore;

    use crate::assessor::RiskAssessor;
    use crate::market::ConfidenceLevel;

    fn period(company: &str) -> StatementPeriod {
        StatementPeriod {
            company_id: company.to_string(),
            fiscal_year: 2024,
            fiscal_quarter: None,
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            period_type: PeriodType::Annual,
        }
    }

    async fn seeded_store(tenant: &TenantId) -> Arc<SqlStore> {
        let store = SqlStore::connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");

        store
            .upsert_company(
                tenant,
                &Company {
                    id: "ACME".into(),
                    symbol: "ACME".into(),
                    name: Some("Acme Corp".into()),
                    sector: Some("Industrials".into()),
                },
            )
            .await
            .unwrap();

        let mut balance = BalanceSheet::empty(period("ACME"));
        balance.current_assets = Some(500_000.0);
        balance.current_liabilities = Some(200_000.0);
        balance.total_assets = Some(1_500_000.0);
        balance.total_liabilities = Some(700_000.0);
        balance.retained_earnings = Some(300_000.0);
        balance.total_equity = Some(800_000.0);
        balance.long_term_debt = Some(300_000.0);
        balance.shares_outstanding = Some(100_000.0);
        let mut income = IncomeStatement::empty(period("ACME"));
        income.revenue = Some(1_000_000.0);
        income.operating_income = Some(200_000.0);
        income.interest_expense = Some(10_000.0);
        store
            .insert_statement(tenant, &Statement::Balance(balance))
            .await
            .unwrap();
        store
            .insert_statement(tenant, &Statement::Income(income))
            .await
            .unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let mut stock = Vec::new();
        let mut index = Vec::new();
        for i in 0..120 {
            let date = start + Duration::days(i);
            let swing = if i % 2 == 0 { 1.0 } else { -1.0 };
            let extra = if i % 7 == 0 { 0.3 } else { 0.0 };
            index.push(point("SPY", date, 400.0 + swing * 4.0 + extra));
            stock.push(point("ACME", date, 10.0 + swing * 0.15 + extra * 0.05));
        }
        store.insert_market_data(tenant, &stock).await.unwrap();
        store.insert_market_data(tenant, &index).await.unwrap();
        Arc::new(store)
    }

    fn point(company: &str, date: NaiveDate, close: f64) -> MarketDataPoint {
        MarketDataPoint {
            company_id: company.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            adjusted_close: None,
            volume: 10_000.0,
            market_cap: None,
            shares_outstanding: None,
        }
    }

    #[tokio::test]
    async fn test_assess_from_store() {
        let tenant = TenantId::new("tenant-a");
        let store = seeded_store(&tenant).await;
        let assessor = RiskAssessor::new(store.clone(), store.clone(), "SPY");
        let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let assessment = assessor.assess(&tenant, "ACME", as_of).await.unwrap();
        assert_eq!(assessment.scenarios.len(), 3);
        assert!(assessment.metrics.altman.is_some());
        assert!(assessment.metrics.beta.is_some());
        assert!(assessment.metrics.var_95.is_some());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let tenant = TenantId::new("tenant-a");
        let store = seeded_store(&tenant).await;
        let assessor = RiskAssessor::new(store.clone(), store.clone(), "SPY");
        let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let other = TenantId::new("tenant-b");
        let err = assessor.assess(&other, "ACME", as_of).await.unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[tokio::test]
    async fn test_standalone_metrics() {
        let tenant = TenantId::new("tenant-a");
        let store = seeded_store(&tenant).await;
        let assessor = RiskAssessor::new(store.clone(), store.clone(), "SPY");
        let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let beta = assessor.beta(&tenant, "ACME", as_of, 60).await.unwrap();
        assert!(beta > 0.0);

        let vol = assessor.volatility(&tenant, "ACME", as_of, 30).await.unwrap();
        assert!(vol > 0.0);

        let var = assessor
            .value_at_risk(&tenant, "ACME", as_of, ConfidenceLevel::Pct99, 90)
            .await
            .unwrap();
        assert!(var < 0.0);
    }

    #[tokio::test]
    async fn test_beta_without_index_is_insufficient() {
        let tenant = TenantId::new("tenant-a");
        let store = seeded_store(&tenant).await;
        let assessor = RiskAssessor::new(store.clone(), store.clone(), "QQQ");
        let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let err = assessor.beta(&tenant, "ACME", as_of, 60).await.unwrap_err();
        assert!(err.is_insufficient_data());
    }
}
