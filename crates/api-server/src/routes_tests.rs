use std::sync::Arc;
use std::time::Duration;

use analysis_core::{
    BalanceSheet, Company, IncomeStatement, PeriodType, Statement, StatementPeriod, TenantId,
};
use analysis_orchestrator::{ModelRegistry, OrchestratorConfig, Stores};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use data_store::SqlStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use weight_optimizer::OptimizerConfig;

use crate::{build_router, AppState};

const TENANT: &str = "tenant-a";

async fn app() -> Router {
    let store = SqlStore::connect("sqlite::memory:").await.unwrap();
    let tenant = TenantId::new(TENANT);
    store
        .upsert_company(
            &tenant,
            &Company {
                id: "ACME".into(),
                symbol: "ACME".into(),
                name: Some("Acme Corp".into()),
                sector: Some("Industrials".into()),
            },
        )
        .await
        .unwrap();

    let period = StatementPeriod {
        company_id: "ACME".into(),
        fiscal_year: 2024,
        fiscal_quarter: None,
        period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        period_type: PeriodType::Annual,
    };
    let mut income = IncomeStatement::empty(period.clone());
    income.revenue = Some(80_000.0);
    income.operating_income = Some(8_000.0);
    income.net_income = Some(5_000.0);
    let mut balance = BalanceSheet::empty(period);
    balance.current_assets = Some(20_000.0);
    balance.current_liabilities = Some(10_000.0);
    balance.total_assets = Some(70_000.0);
    balance.total_liabilities = Some(30_000.0);
    balance.total_equity = Some(40_000.0);
    store.insert_statement(&tenant, &Statement::Income(income)).await.unwrap();
    store.insert_statement(&tenant, &Statement::Balance(balance)).await.unwrap();

    let state = AppState {
        stores: Stores::shared(Arc::new(store)),
        config: Arc::new(OrchestratorConfig::default()),
        models: Arc::new(ModelRegistry::in_memory(OptimizerConfig::default())),
    };
    build_router(state, Duration::from_secs(30))
}

async fn get(app: Router, uri: &str, tenant: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-ID", tenant);
    }
    let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app().await, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_tenant_header_is_rejected() {
    let (status, body) = get(app().await, "/api/companies/ACME/ratios", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("X-Tenant-ID"));
}

#[tokio::test]
async fn test_ratios_envelope() {
    let (status, body) = get(
        app().await,
        "/api/companies/ACME/ratios?as_of=2025-03-31",
        Some(TENANT),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["company_id"], "ACME");
    assert_eq!(body["data"]["period_end"], "2024-12-31");
}

#[tokio::test]
async fn test_insufficient_data_maps_to_not_found() {
    let app = app().await;
    let (status, body) = get(
        app.clone(),
        "/api/companies/NOPE/ratios?as_of=2025-03-31",
        Some(TENANT),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    // Same company, different tenant.
    let (status, _) = get(app, "/api/companies/ACME/ratios?as_of=2025-03-31", Some("tenant-b")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_parameters_map_to_bad_request() {
    let app = app().await;
    let cases = [
        "/api/companies/ACME/risk/var?confidence_level=0.9",
        "/api/companies/ACME/risk/volatility?period_days=1",
        "/api/companies/ACME/valuation/graham",
        "/api/companies/ACME/trends/not_a_metric",
        "/api/companies/ACME/scenarios?optimistic=0.5",
        "/api/companies/ACME/scenarios?optimistic=0.5&neutral=0.5&pessimistic=0.5",
        "/api/rankings?min_score=120",
    ];
    for uri in cases {
        let (status, body) = get(app.clone(), uri, Some(TENANT)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["status"], "error", "{uri}");
    }
}

#[tokio::test]
async fn test_prediction_without_model_is_not_found() {
    let (status, _) = get(
        app().await,
        "/api/companies/ACME/prediction?as_of=2025-03-31",
        Some(TENANT),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_weights_report_defaults() {
    let (status, body) = get(app().await, "/api/weights", Some(TENANT)).await;
    assert_eq!(status, StatusCode::OK);
    let weights = body["data"]["weights"].as_object().unwrap();
    let total: f64 = weights.values().filter_map(Value::as_f64).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(body["data"]["trained_on"].is_null());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header("X-Request-Id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}
