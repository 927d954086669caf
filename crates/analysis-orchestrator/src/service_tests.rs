use std::sync::Arc;
use std::time::Duration as StdDuration;

use analysis_core::{
    BalanceSheet, CashFlowStatement, Company, CompositeScoreRecord, IncomeStatement,
    MarketDataPoint, PeriodType, ResultStore, Statement, StatementPeriod, TenantId,
};
use chrono::{Duration, NaiveDate};
use data_store::SqlStore;
use feature_engineering::{FeatureName, FEATURE_COUNT};
use prediction_network::{NetworkConfig, OutcomeLabels, PredictionNetwork, TrainingExample};
use serde_json::Map;
use weight_optimizer::{OptimizerConfig, TrainingOutcome};

use crate::config::OrchestratorConfig;
use crate::dataset::DatasetBuilder;
use crate::jobs::{JobKind, JobOutcome, JobScheduler};
use crate::models::ModelRegistry;
use crate::service::AnalysisService;
use crate::stores::Stores;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn as_of() -> NaiveDate {
    date(2025, 3, 31)
}

fn tenant() -> TenantId {
    TenantId::new("tenant-a")
}

fn period(company: &str, year: i32) -> StatementPeriod {
    StatementPeriod {
        company_id: company.to_string(),
        fiscal_year: year,
        fiscal_quarter: None,
        period_end: date(year, 12, 31),
        period_type: PeriodType::Annual,
    }
}

fn bar(company: &str, day: NaiveDate, close: f64) -> MarketDataPoint {
    MarketDataPoint {
        company_id: company.to_string(),
        date: day,
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

/// A profitable company booked for fiscal 2023 and 2024, every amount
/// multiplied by `scale`.
async fn seed_company(store: &SqlStore, tenant: &TenantId, id: &str, scale: f64) {
    store
        .upsert_company(
            tenant,
            &Company {
                id: id.into(),
                symbol: id.into(),
                name: None,
                sector: Some("Industrials".into()),
            },
        )
        .await
        .unwrap();

    let mut prior = IncomeStatement::empty(period(id, 2023));
    prior.revenue = Some(70_000.0 * scale);
    prior.net_income = Some(4_000.0 * scale);

    let mut income = IncomeStatement::empty(period(id, 2024));
    income.revenue = Some(80_000.0 * scale);
    income.operating_income = Some(8_000.0 * scale);
    income.interest_expense = Some(500.0 * scale);
    income.net_income = Some(5_000.0 * scale);
    income.eps_diluted = Some(5.0);

    let mut balance = BalanceSheet::empty(period(id, 2024));
    balance.current_assets = Some(20_000.0 * scale);
    balance.current_liabilities = Some(10_000.0 * scale);
    balance.total_assets = Some(70_000.0 * scale);
    balance.total_liabilities = Some(30_000.0 * scale);
    balance.retained_earnings = Some(15_000.0 * scale);
    balance.total_equity = Some(40_000.0 * scale);
    balance.long_term_debt = Some(12_000.0 * scale);
    balance.cash_and_equivalents = Some(2_000.0 * scale);
    balance.shares_outstanding = Some(1_000.0 * scale);

    let mut cash_flow = CashFlowStatement::empty(period(id, 2024));
    cash_flow.operating_cash_flow = Some(8_000.0 * scale);
    cash_flow.capital_expenditures = Some(-2_000.0 * scale);

    for statement in [
        Statement::Income(prior),
        Statement::Income(income),
        Statement::Balance(balance),
        Statement::CashFlow(cash_flow),
    ] {
        store.insert_statement(tenant, &statement).await.unwrap();
    }
}

/// 120 alternating daily closes ending on [`as_of`] for `id` and the index.
async fn seed_prices(store: &SqlStore, tenant: &TenantId, id: &str, level: f64) {
    let start = as_of() - Duration::days(119);
    let mut stock = Vec::new();
    let mut index = Vec::new();
    for i in 0..120 {
        let day = start + Duration::days(i);
        let swing = if i % 2 == 0 { 1.0 } else { -1.0 };
        let extra = if i % 7 == 0 { 0.3 } else { 0.0 };
        stock.push(bar(id, day, level + swing * level * 0.01 + extra));
        index.push(bar("SPY", day, 400.0 + swing * 4.0 + extra));
    }
    store.insert_market_data(tenant, &stock).await.unwrap();
    store.insert_market_data(tenant, &index).await.unwrap();
}

async fn seeded_store() -> Arc<SqlStore> {
    let store = SqlStore::connect("sqlite::memory:")
        .await
        .expect("in-memory SQLite");
    let tenant = tenant();
    seed_company(&store, &tenant, "ACME", 1.0).await;
    seed_company(&store, &tenant, "PEER", 2.0).await;
    seed_prices(&store, &tenant, "ACME", 50.0).await;
    seed_prices(&store, &tenant, "PEER", 60.0).await;
    Arc::new(store)
}

fn test_config() -> Arc<OrchestratorConfig> {
    Arc::new(OrchestratorConfig {
        job_tenants: vec![tenant()],
        job_backoff: StdDuration::from_millis(1),
        ..OrchestratorConfig::default()
    })
}

fn service(store: Arc<SqlStore>, tenant: TenantId, models: Arc<ModelRegistry>) -> AnalysisService {
    AnalysisService::new(tenant, Stores::shared(store), test_config(), models)
}

fn registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::in_memory(OptimizerConfig::default()))
}

#[tokio::test]
async fn test_ratios_are_tenant_scoped() {
    let store = seeded_store().await;
    let svc = service(store.clone(), tenant(), registry());
    let ratios = svc.ratios("ACME", as_of()).await.unwrap();
    assert!(ratios.computed_count() > 10);
    assert_eq!(ratios.period_end, Some(date(2024, 12, 31)));

    let other = service(store, TenantId::new("tenant-b"), registry());
    assert!(other.ratios("ACME", as_of()).await.unwrap_err().is_insufficient_data());
}

#[tokio::test]
async fn test_valuation_stores_fifteen_records() {
    let store = seeded_store().await;
    let svc = service(store.clone(), tenant(), registry());
    let valuation = svc.valuation("ACME", as_of()).await.unwrap();
    assert!(valuation.consensus_valuation() > 0.0);

    let stored = store.valuations_on(&tenant(), "ACME", as_of()).await.unwrap();
    assert_eq!(stored.len(), 15);

    let err = svc.valuation("NOPE", as_of()).await.unwrap_err();
    assert!(err.is_insufficient_data());
}

#[tokio::test]
async fn test_risk_metrics_validate_parameters() {
    let store = seeded_store().await;
    let svc = service(store.clone(), tenant(), registry());

    let assessment = svc.risk("ACME", as_of()).await.unwrap();
    assert_eq!(assessment.scenarios.len(), 3);
    let stored = store.risk_assessments_on(&tenant(), "ACME", as_of()).await.unwrap();
    assert_eq!(stored.len(), 3);

    assert!(svc.beta("ACME", as_of(), 60).await.is_ok());
    let err = svc.value_at_risk("ACME", as_of(), 0.90, 30).await.unwrap_err();
    assert!(err.is_invalid_parameter());
    let err = svc.volatility("ACME", as_of(), 0).await.unwrap_err();
    assert!(err.is_invalid_parameter());
}

#[tokio::test]
async fn test_score_and_rank_all_companies() {
    let store = seeded_store().await;
    let svc = service(store, tenant(), registry());

    let score = svc.score("ACME", as_of()).await.unwrap();
    assert!((0.0..=100.0).contains(&score.composite_score));
    assert_eq!(score.dimensions.len(), 5);

    let ranked = svc.rankings(as_of(), None).await.unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].rank, 1);
    assert!(ranked[0].composite_score >= ranked[1].composite_score);

    let none = svc.rankings(as_of(), Some(101.0)).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_rankings_reuse_stored_scores() {
    let store = seeded_store().await;
    let svc = service(store.clone(), tenant(), registry());
    let batch = svc.recompute_scores(as_of()).await.unwrap();
    assert_eq!(batch.scores.len(), 2);
    let valuations = store.valuations_on(&tenant(), "ACME", as_of()).await.unwrap().len();

    let ranked = svc.rankings(as_of(), None).await.unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(
        store.valuations_on(&tenant(), "ACME", as_of()).await.unwrap().len(),
        valuations
    );
    let live = composite_scorer::rank(&batch.scores, None);
    for (stored, live) in ranked.iter().zip(&live) {
        assert_eq!(stored.company_id, live.company_id);
        assert_eq!(stored.rating, live.rating);
    }
}

#[tokio::test]
async fn test_features_include_sector_peers() {
    let store = seeded_store().await;
    let svc = service(store, tenant(), registry());
    let features = svc.features("ACME", as_of()).await.unwrap();
    assert_eq!(features.to_vector().len(), FEATURE_COUNT);
    assert!(features.get(FeatureName::PeerRank).is_some());
    assert!(features.get(FeatureName::ValuationVelocity1m).is_none());
}

#[tokio::test]
async fn test_prediction_requires_trained_network() {
    let store = seeded_store().await;
    let models = registry();
    let svc = service(store, tenant(), models.clone());
    let err = svc.prediction("ACME", as_of()).await.unwrap_err();
    assert!(err.is_insufficient_data());

    let examples: Vec<TrainingExample> = (0..20)
        .map(|i| TrainingExample {
            features: (0..FEATURE_COUNT).map(|j| ((i * j) % 7) as f64 - 3.0).collect(),
            labels: OutcomeLabels {
                best_method: analysis_core::ValuationMethod::ALL[i % 5],
                scenario_probabilities: [0.2, 0.5, 0.3],
                returns: [0.01, 0.02, 0.04, 0.08],
                months_to_fair_value: 6.0,
            },
        })
        .collect();
    let config = NetworkConfig {
        hidden_layers: vec![8],
        epochs: 3,
        ..NetworkConfig::default()
    };
    let (network, _) = PredictionNetwork::train(&examples, config).unwrap();
    models.install_network(network).await.unwrap();

    let prediction = svc.prediction("ACME", as_of()).await.unwrap();
    assert!((prediction.method_probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_daily_job_scores_every_company() {
    let store = seeded_store().await;
    let scheduler = JobScheduler::new(Stores::shared(store), test_config(), registry());

    let due = scheduler.due_jobs(as_of()).await;
    assert_eq!(due[0], JobKind::MonthlyModelRetrain);
    assert_eq!(due.len(), 3);

    let report = scheduler
        .run_job(JobKind::DailyScoreRecompute, as_of())
        .await
        .unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.outcome, JobOutcome::ScoresRecomputed { scored: 2, failed: 0 });

    assert!(!scheduler.due_jobs(as_of()).await.contains(&JobKind::DailyScoreRecompute));
    let tomorrow = as_of() + Duration::days(1);
    assert!(scheduler.due_jobs(tomorrow).await.contains(&JobKind::DailyScoreRecompute));
}

#[tokio::test]
async fn test_weight_job_without_history_keeps_defaults() {
    let store = seeded_store().await;
    let models = registry();
    let scheduler = JobScheduler::new(Stores::shared(store), test_config(), models.clone());

    let report = scheduler
        .run_job(JobKind::WeeklyWeightRetrain, as_of())
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        JobOutcome::WeightsRetrained {
            weights: TrainingOutcome::InsufficientSamples {
                available: 0,
                required: 100
            }
        }
    );
    assert_eq!(models.weight_status().await.weights, Default::default());
}

fn score_record(company: &str, day: NaiveDate) -> CompositeScoreRecord {
    CompositeScoreRecord {
        company_id: company.to_string(),
        score_date: day,
        composite_score: 60.0,
        rating: "B".into(),
        valuation_score: 70.0,
        profitability_score: 60.0,
        growth_score: 50.0,
        financial_health_score: 65.0,
        risk_score: 55.0,
        weights: Map::new(),
    }
}

#[tokio::test]
async fn test_weight_samples_pair_scores_with_forward_returns() {
    let store = SqlStore::connect("sqlite::memory:").await.unwrap();
    let tenant = tenant();
    let start = date(2023, 1, 1);
    let prices: Vec<MarketDataPoint> = (0..460)
        .map(|i| bar("ACME", start + Duration::days(i), 50.0 + 0.05 * i as f64))
        .collect();
    store.insert_market_data(&tenant, &prices).await.unwrap();
    for record in [
        score_record("ACME", date(2023, 1, 2)),
        score_record("ACME", date(2023, 2, 1)),
        score_record("GHOST", date(2023, 1, 2)),
        score_record("ACME", date(2023, 12, 1)),
    ] {
        store.save_composite_score(&tenant, &record).await.unwrap();
    }

    let builder = DatasetBuilder::new(tenant, Stores::shared(Arc::new(store)), test_config());
    let report = builder
        .weight_samples(date(2022, 1, 1), date(2024, 3, 31))
        .await
        .unwrap();

    // The December score is too recent to have a twelve-month return.
    assert_eq!(report.examples.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].company_id, "GHOST");

    let first = &report.examples[0];
    assert_eq!(first.score_date, date(2023, 1, 2));
    assert_eq!(first.dimension_scores, [70.0, 60.0, 50.0, 65.0, 55.0]);
    let expected = (68.3 - 50.05) / 50.05;
    assert!((first.realized_return - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_network_examples_label_past_valuations() {
    let store = SqlStore::connect("sqlite::memory:").await.unwrap();
    let tenant = tenant();
    seed_company(&store, &tenant, "ACME", 1.0).await;
    store
        .upsert_company(
            &tenant,
            &Company {
                id: "EMPTY".into(),
                symbol: "EMPTY".into(),
                name: None,
                sector: None,
            },
        )
        .await
        .unwrap();
    let start = date(2025, 1, 1);
    let prices: Vec<MarketDataPoint> = (0..455)
        .map(|i| bar("ACME", start + Duration::days(i), 50.0 + 0.02 * i as f64))
        .collect();
    store.insert_market_data(&tenant, &prices).await.unwrap();

    let builder = DatasetBuilder::new(tenant, Stores::shared(Arc::new(store)), test_config());
    let report = builder.network_examples(&[date(2025, 1, 31)]).await.unwrap();

    assert_eq!(report.examples.len(), 1);
    assert_eq!(report.examples[0].features.len(), FEATURE_COUNT);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].company_id, "EMPTY");
}
