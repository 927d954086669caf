use std::str::FromStr;

use analysis_core::ValuationMethod;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use risk_manager::RiskAssessment;
use scenario_analysis::{FairValueBasis, ScenarioAnalysis, ScenarioProbabilities};
use serde::{Deserialize, Serialize};

use crate::{as_of_or_today, ApiResponse, AppError, AppState, AsOfQuery, Tenant};

const DEFAULT_BETA_DAYS: usize = 252;
const DEFAULT_VOLATILITY_DAYS: usize = 30;
const DEFAULT_VAR_DAYS: usize = 252;
const DEFAULT_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub period_days: Option<usize>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct VarQuery {
    pub confidence_level: Option<f64>,
    pub period_days: Option<usize>,
    pub as_of: Option<NaiveDate>,
}

/// Probabilities default to 0.25 / 0.55 / 0.20 and must be given together.
#[derive(Debug, Deserialize)]
pub struct ScenarioQuery {
    pub optimistic: Option<f64>,
    pub neutral: Option<f64>,
    pub pessimistic: Option<f64>,
    pub method: Option<String>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct RiskMetricResponse {
    pub company_id: String,
    pub as_of: NaiveDate,
    pub period_days: usize,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct VarResponse {
    pub company_id: String,
    pub as_of: NaiveDate,
    pub confidence_level: f64,
    pub period_days: usize,
    pub value_at_risk: f64,
}

pub fn risk_routes() -> Router<AppState> {
    Router::new()
        .route("/api/companies/:company_id/risk", get(get_risk))
        .route("/api/companies/:company_id/risk/beta", get(get_beta))
        .route("/api/companies/:company_id/risk/volatility", get(get_volatility))
        .route("/api/companies/:company_id/risk/var", get(get_value_at_risk))
        .route("/api/companies/:company_id/scenarios", get(get_scenarios))
}

async fn get_risk(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<RiskAssessment>>, AppError> {
    let assessment = state
        .service(tenant)
        .risk(&company_id, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(assessment)))
}

async fn get_beta(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<RiskMetricResponse>>, AppError> {
    let as_of = as_of_or_today(query.as_of);
    let period_days = query.period_days.unwrap_or(DEFAULT_BETA_DAYS);
    let value = state
        .service(tenant)
        .beta(&company_id, as_of, period_days)
        .await?;
    Ok(Json(ApiResponse::success(RiskMetricResponse {
        company_id,
        as_of,
        period_days,
        value,
    })))
}

async fn get_volatility(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<RiskMetricResponse>>, AppError> {
    let as_of = as_of_or_today(query.as_of);
    let period_days = query.period_days.unwrap_or(DEFAULT_VOLATILITY_DAYS);
    let value = state
        .service(tenant)
        .volatility(&company_id, as_of, period_days)
        .await?;
    Ok(Json(ApiResponse::success(RiskMetricResponse {
        company_id,
        as_of,
        period_days,
        value,
    })))
}

async fn get_value_at_risk(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<VarQuery>,
) -> Result<Json<ApiResponse<VarResponse>>, AppError> {
    let as_of = as_of_or_today(query.as_of);
    let confidence_level = query.confidence_level.unwrap_or(DEFAULT_CONFIDENCE);
    let period_days = query.period_days.unwrap_or(DEFAULT_VAR_DAYS);
    let value_at_risk = state
        .service(tenant)
        .value_at_risk(&company_id, as_of, confidence_level, period_days)
        .await?;
    Ok(Json(ApiResponse::success(VarResponse {
        company_id,
        as_of,
        confidence_level,
        period_days,
        value_at_risk,
    })))
}

async fn get_scenarios(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<ScenarioQuery>,
) -> Result<Json<ApiResponse<ScenarioAnalysis>>, AppError> {
    let probabilities = match (query.optimistic, query.neutral, query.pessimistic) {
        (None, None, None) => ScenarioProbabilities::default(),
        (Some(o), Some(n), Some(p)) => ScenarioProbabilities::new(o, n, p)?,
        _ => {
            return Err(AppError::bad_request(
                "optimistic, neutral and pessimistic must be given together",
            ))
        }
    };
    let basis = match query.method.as_deref() {
        Some(m) => FairValueBasis::Method(ValuationMethod::from_str(m)?),
        None => FairValueBasis::Consensus,
    };
    let analysis = state
        .service(tenant)
        .scenarios(&company_id, as_of_or_today(query.as_of), probabilities, basis)
        .await?;
    Ok(Json(ApiResponse::success(analysis)))
}
