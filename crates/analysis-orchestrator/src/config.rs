use std::env;
use std::path::PathBuf;
use std::time::Duration;

use analysis_core::TenantId;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Company id of the market index series used for beta.
    pub benchmark_company_id: String,
    pub fetch_timeout: Duration,
    pub training_timeout: Duration,
    pub job_max_retries: u32,
    pub job_backoff: Duration,
    pub job_poll_interval: Duration,
    pub dataset_concurrency: usize,
    /// Tenants the scheduled jobs run for.
    pub job_tenants: Vec<TenantId>,
    pub model_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            benchmark_company_id: "SPY".to_string(),
            fetch_timeout: Duration::from_secs(10),
            training_timeout: Duration::from_secs(600),
            job_max_retries: 3,
            job_backoff: Duration::from_secs(5),
            job_poll_interval: Duration::from_secs(3600),
            dataset_concurrency: 4,
            job_tenants: vec![TenantId::new("default")],
            model_dir: PathBuf::from("./models"),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let secs = |name: &str, default: &str| -> Result<Duration> {
            let value: u64 = var_or(name, default)
                .parse()
                .with_context(|| format!("{name} must be a whole number of seconds"))?;
            Ok(Duration::from_secs(value))
        };

        let job_tenants = var_or("JOB_TENANTS", "default")
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(TenantId::new)
            .collect();

        Ok(Self {
            benchmark_company_id: var_or("BENCHMARK_COMPANY_ID", "SPY"),
            fetch_timeout: secs("FETCH_TIMEOUT_SECS", "10")?,
            training_timeout: secs("TRAINING_TIMEOUT_SECS", "600")?,
            job_max_retries: var_or("JOB_MAX_RETRIES", "3")
                .parse()
                .context("JOB_MAX_RETRIES must be a whole number")?,
            job_backoff: secs("JOB_BACKOFF_SECS", "5")?,
            job_poll_interval: secs("JOB_POLL_INTERVAL_SECS", "3600")?,
            dataset_concurrency: var_or("DATASET_CONCURRENCY", "4")
                .parse::<usize>()
                .context("DATASET_CONCURRENCY must be a whole number")?
                .max(1),
            job_tenants,
            model_dir: PathBuf::from(var_or("MODEL_DIR", "./models")),
        })
    }
}
