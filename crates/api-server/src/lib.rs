//! HTTP surface over the analysis engines: one router, a tenant header on
//! every `/api` request and the `{status, data}` envelope.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{AnalysisError, TenantId};
use analysis_orchestrator::{
    AnalysisService, JobScheduler, ModelRegistry, OrchestratorConfig, Stores,
};
use anyhow::Context;
use axum::{
    async_trait,
    error_handling::HandleErrorLayer,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    BoxError, Json, Router,
};
use chrono::{NaiveDate, Utc};
use data_store::SqlStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weight_optimizer::OptimizerConfig;

mod company_routes;
mod ranking_routes;
mod request_id;
mod risk_routes;

#[cfg(test)]
mod routes_tests;

pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub enable_scheduler: bool,
    pub orchestrator: OrchestratorConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://valuelens.db?mode=rwc".to_string());
        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;
        let request_timeout = match std::env::var("REQUEST_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse().context("REQUEST_TIMEOUT_SECS must be an integer")?),
            Err(_) => Duration::from_secs(30),
        };
        let enable_scheduler = std::env::var("ENABLE_SCHEDULER")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            bind_addr,
            request_timeout,
            enable_scheduler,
            orchestrator: OrchestratorConfig::from_env()?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub config: Arc<OrchestratorConfig>,
    pub models: Arc<ModelRegistry>,
}

impl AppState {
    /// A service scoped to one tenant; built per request.
    pub fn service(&self, tenant: TenantId) -> AnalysisService {
        AnalysisService::new(
            tenant,
            self.stores.clone(),
            self.config.clone(),
            self.models.clone(),
        )
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Error envelope. Internal failures are logged and replaced by a generic
/// message before they reach the client.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InsufficientData(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            AnalysisError::InvalidParameter(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            AnalysisError::Timeout(_) => Self::new(StatusCode::GATEWAY_TIMEOUT, err.to_string()),
            AnalysisError::Store(_) | AnalysisError::Model(_) => {
                error!(error = %err, "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %err, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// Tenant taken from the required `X-Tenant-ID` header.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantId);

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Tenant(TenantId::new(v)))
            .ok_or_else(|| AppError::bad_request("Missing X-Tenant-ID header"))
    }
}

/// `as_of` query value, defaulting to today.
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub as_of: Option<NaiveDate>,
}

pub fn as_of_or_today(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| Utc::now().date_naive())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::new(StatusCode::REQUEST_TIMEOUT, "Request timed out")
    } else {
        error!(error = %err, "Unhandled middleware error");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(company_routes::company_routes())
        .merge(risk_routes::risk_routes())
        .merge(ranking_routes::ranking_routes())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_server=info,analysis_orchestrator=info,tower_http=info".into());

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let store = Arc::new(
        SqlStore::connect(&config.database_url)
            .await
            .with_context(|| format!("connecting to {}", config.database_url))?,
    );
    let today = Utc::now().date_naive();
    let models = Arc::new(
        ModelRegistry::load(&config.orchestrator.model_dir, OptimizerConfig::default(), today).await,
    );
    let state = AppState {
        stores: Stores::shared(store),
        config: Arc::new(config.orchestrator.clone()),
        models,
    };

    if config.enable_scheduler {
        let scheduler = Arc::new(JobScheduler::new(
            state.stores.clone(),
            state.config.clone(),
            state.models.clone(),
        ));
        let _jobs = scheduler.start();
        info!(tenants = state.config.job_tenants.len(), "Job scheduler started");
    } else {
        warn!("Job scheduler disabled");
    }

    let app = build_router(state, config.request_timeout);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
