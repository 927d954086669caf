//! Training data assembled from stored scores, valuations and the prices
//! that followed them.

use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{
    AnalysisError, Company, CompositeScoreRecord, MarketDataPoint, TenantId, ValuationSnapshot,
};
use chrono::{Duration, Months, NaiveDate};
use feature_engineering::{engineer_features, FeatureContext};
use futures_util::{stream, StreamExt};
use prediction_network::{label_outcome, TrainingExample};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use valuation_engine::{MultiMethodValuation, ValuationEngine};
use weight_optimizer::TrainingSample;

use crate::config::OrchestratorConfig;
use crate::context::{monthly_history, peer_discount, HISTORY_MONTHS};
use crate::service::with_timeout;
use crate::stores::Stores;

/// Forward horizon realised returns are measured over.
pub const RETURN_HORIZON_MONTHS: u32 = 12;
/// Window of prices fetched after a valuation date for outcome labels.
const LABEL_WINDOW_MONTHS: u32 = 24;
/// A price lookup may fall back to a bar this many days before the target.
const PRICE_TOLERANCE_DAYS: i64 = 7;

/// One company (and date) left out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub company_id: String,
    pub date: Option<NaiveDate>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct DatasetReport<T> {
    pub examples: Vec<T>,
    pub failures: Vec<BatchFailure>,
}

impl<T> Default for DatasetReport<T> {
    fn default() -> Self {
        Self {
            examples: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> DatasetReport<T> {
    pub fn extend(&mut self, other: DatasetReport<T>) {
        self.examples.extend(other.examples);
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, company_id: &str, date: Option<NaiveDate>, reason: impl Into<String>) {
        self.failures.push(BatchFailure {
            company_id: company_id.to_string(),
            date,
            reason: reason.into(),
        });
    }
}

/// Month-spaced valuation dates old enough to have a full return horizon:
/// from `lookback_months` before the newest one up to the newest, ascending.
pub fn training_dates(today: NaiveDate, lookback_months: u32) -> Vec<NaiveDate> {
    (0..lookback_months)
        .rev()
        .filter_map(|k| today.checked_sub_months(Months::new(RETURN_HORIZON_MONTHS + k)))
        .collect()
}

/// Last price on or shortly before `target`, from bars ascending by date.
fn price_at(prices: &[MarketDataPoint], target: NaiveDate) -> Option<f64> {
    prices
        .iter()
        .rev()
        .find(|p| p.date <= target)
        .filter(|p| (target - p.date).num_days() <= PRICE_TOLERANCE_DAYS)
        .map(|p| p.price())
        .filter(|p| *p > 0.0)
}

fn dimension_scores(record: &CompositeScoreRecord) -> [f64; 5] {
    [
        record.valuation_score,
        record.profitability_score,
        record.growth_score,
        record.financial_health_score,
        record.risk_score,
    ]
}

/// Per company and date inputs gathered before features are derived.
struct Gathered {
    company: Company,
    valuation: MultiMethodValuation,
    history: Vec<ValuationSnapshot>,
    prices: Vec<MarketDataPoint>,
}

pub struct DatasetBuilder {
    tenant: TenantId,
    stores: Stores,
    config: Arc<OrchestratorConfig>,
    valuation_engine: ValuationEngine,
}

impl DatasetBuilder {
    pub fn new(tenant: TenantId, stores: Stores, config: Arc<OrchestratorConfig>) -> Self {
        let valuation_engine =
            ValuationEngine::new(stores.statements.clone(), stores.market.clone());
        Self {
            tenant,
            stores,
            config,
            valuation_engine,
        }
    }

    /// Pairs each composite score stored in `[start, today - 12 months]`
    /// with the return realised over the following twelve months.
    pub async fn weight_samples(
        &self,
        start: NaiveDate,
        today: NaiveDate,
    ) -> Result<DatasetReport<TrainingSample>, AnalysisError> {
        let Some(end) = today.checked_sub_months(Months::new(RETURN_HORIZON_MONTHS)) else {
            return Ok(DatasetReport::default());
        };
        let records = with_timeout(
            self.config.fetch_timeout,
            "score history",
            self.stores.results.composite_score_history(&self.tenant, start, end),
        )
        .await?;

        let mut by_company: BTreeMap<String, Vec<CompositeScoreRecord>> = BTreeMap::new();
        for record in records {
            by_company.entry(record.company_id.clone()).or_default().push(record);
        }

        let jobs: Vec<_> = by_company
            .iter()
            .map(|(company_id, records)| self.company_samples(company_id, records))
            .collect();
        let reports: Vec<DatasetReport<TrainingSample>> = stream::iter(jobs)
            .buffer_unordered(self.config.dataset_concurrency)
            .collect()
            .await;

        let mut report = DatasetReport::default();
        for part in reports {
            report.extend(part);
        }
        report
            .examples
            .sort_by(|a, b| (a.score_date, &a.company_id).cmp(&(b.score_date, &b.company_id)));
        info!(
            tenant = %self.tenant,
            samples = report.examples.len(),
            failures = report.failures.len(),
            "Weight training samples built"
        );
        Ok(report)
    }

    async fn company_samples(
        &self,
        company_id: &str,
        records: &[CompositeScoreRecord],
    ) -> DatasetReport<TrainingSample> {
        let mut report = DatasetReport::default();
        let (Some(first), Some(last)) = (
            records.iter().map(|r| r.score_date).min(),
            records.iter().map(|r| r.score_date).max(),
        ) else {
            return report;
        };
        let from = first - Duration::days(PRICE_TOLERANCE_DAYS);
        let to = last
            .checked_add_months(Months::new(RETURN_HORIZON_MONTHS))
            .unwrap_or(last);

        let prices = match with_timeout(
            self.config.fetch_timeout,
            "price history",
            self.stores.market.get_history(&self.tenant, company_id, from, to),
        )
        .await
        {
            Ok(prices) => prices,
            Err(e) => {
                report.fail(company_id, None, e.to_string());
                return report;
            }
        };

        for record in records {
            let horizon = record
                .score_date
                .checked_add_months(Months::new(RETURN_HORIZON_MONTHS));
            let start_price = price_at(&prices, record.score_date);
            let end_price = horizon.and_then(|h| price_at(&prices, h));
            match (start_price, end_price) {
                (Some(p0), Some(p1)) => report.examples.push(TrainingSample {
                    company_id: company_id.to_string(),
                    score_date: record.score_date,
                    dimension_scores: dimension_scores(record),
                    realized_return: (p1 - p0) / p0,
                }),
                _ => report.fail(
                    company_id,
                    Some(record.score_date),
                    "no price at score date or twelve months later",
                ),
            }
        }
        report
    }

    /// Features and outcome labels for every company at each of `dates`.
    /// Peer context comes from the other companies valued on the same date.
    pub async fn network_examples(
        &self,
        dates: &[NaiveDate],
    ) -> Result<DatasetReport<TrainingExample>, AnalysisError> {
        let companies: Vec<Company> = with_timeout(
            self.config.fetch_timeout,
            "company list",
            self.stores.companies.list_companies(&self.tenant),
        )
        .await?
        .into_iter()
        .filter(|c| c.id != self.config.benchmark_company_id)
        .collect();

        let mut report = DatasetReport::default();
        for &date in dates {
            report.extend(self.examples_on(&companies, date).await);
        }
        info!(
            tenant = %self.tenant,
            dates = dates.len(),
            examples = report.examples.len(),
            failures = report.failures.len(),
            "Network training examples built"
        );
        Ok(report)
    }

    async fn examples_on(
        &self,
        companies: &[Company],
        date: NaiveDate,
    ) -> DatasetReport<TrainingExample> {
        let jobs: Vec<_> = companies
            .iter()
            .map(|company| async move { (company.id.clone(), self.gather(company, date).await) })
            .collect();
        let gathered: Vec<(String, Result<Gathered, AnalysisError>)> = stream::iter(jobs)
            .buffer_unordered(self.config.dataset_concurrency)
            .collect()
            .await;

        let mut report = DatasetReport::default();
        let mut valued = Vec::new();
        for (company_id, result) in gathered {
            match result {
                Ok(g) => valued.push(g),
                Err(e) => {
                    debug!(company_id = %company_id, %date, error = %e, "Skipping company");
                    report.fail(&company_id, Some(date), e.to_string());
                }
            }
        }
        valued.sort_by(|a, b| a.company.id.cmp(&b.company.id));

        for g in &valued {
            let Some(labels) = label_outcome(&g.valuation, &g.prices) else {
                report.fail(
                    &g.company.id,
                    Some(date),
                    "price history does not cover the return horizon",
                );
                continue;
            };
            let peers: Vec<_> = match g.company.sector.as_deref() {
                Some(sector) => valued
                    .iter()
                    .filter(|p| p.company.id != g.company.id && p.company.sector.as_deref() == Some(sector))
                    .filter_map(|p| peer_discount(&p.valuation))
                    .collect(),
                None => Vec::new(),
            };
            let monthly = monthly_history(&g.history, date, HISTORY_MONTHS);
            let features = engineer_features(
                &g.valuation,
                FeatureContext {
                    history: &monthly,
                    peers: &peers,
                },
            );
            report.examples.push(TrainingExample {
                features: features.to_vector(),
                labels,
            });
        }
        report
    }

    async fn gather(&self, company: &Company, date: NaiveDate) -> Result<Gathered, AnalysisError> {
        let from = date - Duration::days(PRICE_TOLERANCE_DAYS);
        let to = date
            .checked_add_months(Months::new(LABEL_WINDOW_MONTHS))
            .unwrap_or(date);
        let (valuation, history, prices) = with_timeout(self.config.fetch_timeout, "training inputs", async {
            tokio::try_join!(
                self.valuation_engine.value_all(&self.tenant, company, date),
                self.stores.results.valuation_history(&self.tenant, &company.id, date),
                self.stores.market.get_history(&self.tenant, &company.id, from, to),
            )
        })
        .await?;
        Ok(Gathered {
            company: company.clone(),
            valuation,
            history,
            prices,
        })
    }
}
