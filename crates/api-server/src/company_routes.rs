use std::str::FromStr;

use analysis_core::{PeriodType, ValuationMethod};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Months, NaiveDate};
use composite_scorer::CompositeScore;
use feature_engineering::ValuationFeatures;
use fundamental_analysis::RatioSet;
use prediction_network::Prediction;
use serde::Deserialize;
use trend_analysis::{TrendMetric, TrendReport};
use valuation_engine::{MultiMethodValuation, Valuation};

use crate::{as_of_or_today, ApiResponse, AppError, AppState, AsOfQuery, Tenant};

const DEFAULT_TREND_YEARS: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub num_years: Option<u32>,
    pub period_type: Option<String>,
    pub as_of: Option<NaiveDate>,
}

pub fn company_routes() -> Router<AppState> {
    Router::new()
        .route("/api/companies/:company_id/ratios", get(get_ratios))
        .route("/api/companies/:company_id/valuation", get(get_valuation))
        .route(
            "/api/companies/:company_id/valuation/:method",
            get(get_method_valuation),
        )
        .route("/api/companies/:company_id/trends/:metric", get(get_trend))
        .route("/api/companies/:company_id/features", get(get_features))
        .route("/api/companies/:company_id/score", get(get_score))
        .route("/api/companies/:company_id/prediction", get(get_prediction))
}

async fn get_ratios(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<RatioSet>>, AppError> {
    let ratios = state
        .service(tenant)
        .ratios(&company_id, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(ratios)))
}

async fn get_valuation(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<MultiMethodValuation>>, AppError> {
    let valuation = state
        .service(tenant)
        .valuation(&company_id, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(valuation)))
}

async fn get_method_valuation(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path((company_id, method)): Path<(String, String)>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<Valuation>>, AppError> {
    let method = ValuationMethod::from_str(&method)?;
    let valuation = state
        .service(tenant)
        .valuation_method(&company_id, method, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(valuation)))
}

async fn get_trend(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path((company_id, metric)): Path<(String, String)>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<ApiResponse<TrendReport>>, AppError> {
    let metric = TrendMetric::from_str(&metric)?;
    let period_type = match query.period_type.as_deref() {
        Some(p) => PeriodType::from_str(p)?,
        None => PeriodType::Annual,
    };
    let num_years = query.num_years.unwrap_or(DEFAULT_TREND_YEARS);
    if num_years == 0 {
        return Err(AppError::bad_request("num_years must be at least 1"));
    }
    let end = as_of_or_today(query.as_of);
    let start = end
        .checked_sub_months(Months::new(12 * num_years))
        .ok_or_else(|| AppError::bad_request("num_years reaches past the calendar"))?;

    let report = state
        .service(tenant)
        .trend(&company_id, metric, period_type, start, end)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn get_features(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<ValuationFeatures>>, AppError> {
    let features = state
        .service(tenant)
        .features(&company_id, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(features)))
}

async fn get_score(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<CompositeScore>>, AppError> {
    let score = state
        .service(tenant)
        .score(&company_id, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(score)))
}

async fn get_prediction(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(company_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ApiResponse<Prediction>>, AppError> {
    let prediction = state
        .service(tenant)
        .prediction(&company_id, as_of_or_today(query.as_of))
        .await?;
    Ok(Json(ApiResponse::success(prediction)))
}
