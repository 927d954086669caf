use analysis_orchestrator::WeightStatus;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use composite_scorer::RankedCompany;
use serde::Deserialize;

use crate::{as_of_or_today, ApiResponse, AppError, AppState, Tenant};

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub min_score: Option<f64>,
    pub as_of: Option<NaiveDate>,
}

pub fn ranking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rankings", get(get_rankings))
        .route("/api/weights", get(get_weights))
}

/// Ranks the composite scores stored for the day, scoring any company
/// that has none yet.
async fn get_rankings(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(query): Query<RankingQuery>,
) -> Result<Json<ApiResponse<Vec<RankedCompany>>>, AppError> {
    if let Some(min) = query.min_score {
        if !(0.0..=100.0).contains(&min) {
            return Err(AppError::bad_request("min_score must be between 0 and 100"));
        }
    }
    let ranked = state
        .service(tenant)
        .rankings(as_of_or_today(query.as_of), query.min_score)
        .await?;
    Ok(Json(ApiResponse::success(ranked)))
}

async fn get_weights(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> Result<Json<ApiResponse<WeightStatus>>, AppError> {
    Ok(Json(ApiResponse::success(state.service(tenant).weights().await)))
}
