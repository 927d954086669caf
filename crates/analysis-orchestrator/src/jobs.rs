//! Scheduled score recompute and model retraining.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{AnalysisError, TenantId};
use chrono::{Months, NaiveDate, Utc};
use prediction_network::{NetworkConfig, PredictionNetwork};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use weight_optimizer::{TrainingOutcome, TrainingSample};

use crate::config::OrchestratorConfig;
use crate::dataset::{training_dates, DatasetBuilder, DatasetReport};
use crate::models::ModelRegistry;
use crate::service::{with_timeout, AnalysisService};
use crate::stores::Stores;

/// How far back stored scores are used as weight training samples.
const SAMPLE_LOOKBACK_MONTHS: u32 = 36;
/// Number of monthly valuation dates in a network training set.
const NETWORK_DATE_COUNT: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    DailyScoreRecompute,
    WeeklyWeightRetrain,
    MonthlyModelRetrain,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::DailyScoreRecompute,
        JobKind::WeeklyWeightRetrain,
        JobKind::MonthlyModelRetrain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DailyScoreRecompute => "daily_score_recompute",
            JobKind::WeeklyWeightRetrain => "weekly_weight_retrain",
            JobKind::MonthlyModelRetrain => "monthly_model_retrain",
        }
    }

    pub fn interval_days(&self) -> i64 {
        match self {
            JobKind::DailyScoreRecompute => 1,
            JobKind::WeeklyWeightRetrain => 7,
            JobKind::MonthlyModelRetrain => 30,
        }
    }

    /// Higher runs first when several jobs are due together.
    pub fn priority(&self) -> u8 {
        match self {
            JobKind::MonthlyModelRetrain => 10,
            JobKind::DailyScoreRecompute | JobKind::WeeklyWeightRetrain => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NetworkOutcome {
    Trained { examples: usize, final_loss: f64 },
    /// Kept whatever network was installed before.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobOutcome {
    ScoresRecomputed { scored: usize, failed: usize },
    WeightsRetrained { weights: TrainingOutcome },
    ModelsRetrained { weights: TrainingOutcome, network: NetworkOutcome },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job: JobKind,
    pub run_date: NaiveDate,
    pub attempts: u32,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Limit for each attempt.
    pub timeout: Duration,
    /// Delay before the first retry; doubles each time.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            max_retries: config.job_max_retries,
            timeout: config.training_timeout,
            backoff: config.job_backoff,
        }
    }
}

/// Timeouts and store failures are worth another attempt. Bad parameters
/// and missing data will fail the same way again.
fn is_retryable(err: &AnalysisError) -> bool {
    matches!(err, AnalysisError::Timeout(_) | AnalysisError::Store(_))
}

/// Runs `attempt` until it succeeds, fails permanently, or retries run out.
/// Returns the number of attempts made alongside the final result.
pub async fn run_with_retry<T, F, Fut>(
    job: JobKind,
    policy: &RetryPolicy,
    mut attempt: F,
) -> (u32, Result<T, AnalysisError>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match with_timeout(policy.timeout, job.as_str(), attempt()).await {
            Ok(value) => return (attempts, Ok(value)),
            Err(e) if is_retryable(&e) && attempts <= policy.max_retries => {
                let delay = policy.backoff.saturating_mul(1u32 << (attempts - 1).min(16));
                warn!(
                    job = job.as_str(),
                    attempt = attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Job attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (attempts, Err(e)),
        }
    }
}

pub struct JobScheduler {
    stores: Stores,
    config: Arc<OrchestratorConfig>,
    models: Arc<ModelRegistry>,
    network_config: NetworkConfig,
    last_success: Mutex<HashMap<JobKind, NaiveDate>>,
}

impl JobScheduler {
    pub fn new(stores: Stores, config: Arc<OrchestratorConfig>, models: Arc<ModelRegistry>) -> Self {
        Self {
            stores,
            config,
            models,
            network_config: NetworkConfig::default(),
            last_success: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_network_config(mut self, network_config: NetworkConfig) -> Self {
        self.network_config = network_config;
        self
    }

    /// Jobs whose interval has elapsed since their last success, highest
    /// priority first.
    pub async fn due_jobs(&self, today: NaiveDate) -> Vec<JobKind> {
        let last = self.last_success.lock().await;
        let mut due: Vec<JobKind> = JobKind::ALL
            .into_iter()
            .filter(|job| {
                last.get(job)
                    .map_or(true, |ran| (today - *ran).num_days() >= job.interval_days())
            })
            .collect();
        due.sort_by_key(|job| std::cmp::Reverse(job.priority()));
        due
    }

    /// Runs `job` with the configured timeout and retries. Safe to repeat
    /// for the same day.
    pub async fn run_job(&self, job: JobKind, today: NaiveDate) -> Result<JobReport, AnalysisError> {
        info!(job = job.as_str(), %today, "Job started");
        let policy = RetryPolicy::from_config(&self.config);
        let (attempts, result) = run_with_retry(job, &policy, || self.execute(job, today)).await;

        match result {
            Ok(outcome) => {
                self.last_success.lock().await.insert(job, today);
                info!(job = job.as_str(), attempts, ?outcome, "Job finished");
                Ok(JobReport {
                    job,
                    run_date: today,
                    attempts,
                    outcome,
                })
            }
            Err(e) => {
                error!(job = job.as_str(), attempts, error = %e, "Job failed");
                Err(e)
            }
        }
    }

    /// Runs every due job in priority order.
    pub async fn run_due(&self, today: NaiveDate) -> Vec<JobReport> {
        let mut reports = Vec::new();
        for job in self.due_jobs(today).await {
            if let Ok(report) = self.run_job(job, today).await {
                reports.push(report);
            }
        }
        reports
    }

    /// Checks for due jobs on every poll interval until the task is aborted.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.job_poll_interval);
            info!(
                tenants = self.config.job_tenants.len(),
                poll_secs = self.config.job_poll_interval.as_secs(),
                "Job scheduler started"
            );
            loop {
                interval.tick().await;
                self.run_due(Utc::now().date_naive()).await;
            }
        })
    }

    async fn execute(&self, job: JobKind, today: NaiveDate) -> Result<JobOutcome, AnalysisError> {
        match job {
            JobKind::DailyScoreRecompute => self.recompute_scores(today).await,
            JobKind::WeeklyWeightRetrain => {
                let weights = self.retrain_weights(today, false).await?;
                Ok(JobOutcome::WeightsRetrained { weights })
            }
            JobKind::MonthlyModelRetrain => {
                let weights = self.retrain_weights(today, true).await?;
                let network = self.retrain_network(today).await?;
                Ok(JobOutcome::ModelsRetrained { weights, network })
            }
        }
    }

    async fn recompute_scores(&self, today: NaiveDate) -> Result<JobOutcome, AnalysisError> {
        let mut scored = 0;
        let mut failed = 0;
        for tenant in &self.config.job_tenants {
            let service = AnalysisService::new(
                tenant.clone(),
                self.stores.clone(),
                self.config.clone(),
                self.models.clone(),
            );
            let batch = service.recompute_scores(today).await?;
            scored += batch.scores.len();
            failed += batch.failures.len();
        }
        Ok(JobOutcome::ScoresRecomputed { scored, failed })
    }

    fn builder(&self, tenant: &TenantId) -> DatasetBuilder {
        DatasetBuilder::new(tenant.clone(), self.stores.clone(), self.config.clone())
    }

    async fn retrain_weights(&self, today: NaiveDate, force: bool) -> Result<TrainingOutcome, AnalysisError> {
        let mut samples: Vec<TrainingSample> = Vec::new();
        if force || self.models.needs_weight_training(today).await {
            let start = today
                .checked_sub_months(Months::new(SAMPLE_LOOKBACK_MONTHS))
                .unwrap_or(today);
            for tenant in &self.config.job_tenants {
                let report = self.builder(tenant).weight_samples(start, today).await?;
                samples.extend(report.examples);
            }
        }
        Ok(self.models.train_weights(samples, today, force).await)
    }

    async fn retrain_network(&self, today: NaiveDate) -> Result<NetworkOutcome, AnalysisError> {
        let dates = training_dates(today, NETWORK_DATE_COUNT);
        let mut dataset = DatasetReport::default();
        for tenant in &self.config.job_tenants {
            dataset.extend(self.builder(tenant).network_examples(&dates).await?);
        }
        let examples = dataset.examples;
        if examples.is_empty() {
            warn!("No labelled examples, keeping current prediction network");
            return Ok(NetworkOutcome::Skipped {
                reason: "no labelled examples".to_string(),
            });
        }

        let n_examples = examples.len();
        let config = self.network_config.clone();
        let trained =
            tokio::task::spawn_blocking(move || PredictionNetwork::train(&examples, config)).await;
        let (network, report) = match trained {
            Ok(Ok(trained)) => trained,
            Ok(Err(e)) => return Ok(skip_network(e.to_string())),
            Err(e) => return Ok(skip_network(format!("training task aborted: {e}"))),
        };
        if let Err(e) = self.models.install_network(network).await {
            return Ok(skip_network(e.to_string()));
        }
        info!(
            examples = n_examples,
            initial_loss = report.initial_loss,
            final_loss = report.final_loss,
            "Prediction network retrained"
        );
        Ok(NetworkOutcome::Trained {
            examples: n_examples,
            final_loss: report.final_loss,
        })
    }
}

fn skip_network(reason: String) -> NetworkOutcome {
    warn!(%reason, "Network training failed, keeping current prediction network");
    NetworkOutcome::Skipped { reason }
}
