use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{
    AnalysisError, Company, PeriodType, StatementSet, TenantId, ValuationMethod,
};
use chrono::NaiveDate;
use composite_scorer::{rank_records, CompositeScore, CompositeScorer, RankedCompany, ScoringInputs};
use feature_engineering::{
    discount_pct, engineer_features, FeatureContext, PeerDiscount, ValuationFeatures,
};
use fundamental_analysis::{RatioCalculator, RatioSet};
use futures_util::{stream, StreamExt};
use prediction_network::Prediction;
use risk_manager::{ConfidenceLevel, RiskAssessment, RiskAssessor};
use scenario_analysis::{FairValueBasis, ScenarioAggregator, ScenarioAnalysis, ScenarioProbabilities};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trend_analysis::{TrendAnalyzer, TrendMetric, TrendReport};
use valuation_engine::{MultiMethodValuation, Valuation, ValuationEngine};

use crate::config::OrchestratorConfig;
use crate::context::{monthly_history, peer_discount, sector_peers, HISTORY_MONTHS};
use crate::dataset::BatchFailure;
use crate::models::{ModelRegistry, WeightStatus};
use crate::stores::Stores;

/// Runs `fut`, turning an overrun of `limit` into [`AnalysisError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, AnalysisError>
where
    F: Future<Output = Result<T, AnalysisError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::Timeout(format!("{what} took longer than {limit:?}"))),
    }
}

/// Outcome of scoring every company of a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBatch {
    pub score_date: NaiveDate,
    pub scores: Vec<CompositeScore>,
    pub failures: Vec<BatchFailure>,
}

/// Every analysis for one tenant, wired to the shared stores and models.
/// Cheap to build; construct one per request.
pub struct AnalysisService {
    tenant: TenantId,
    stores: Stores,
    config: Arc<OrchestratorConfig>,
    models: Arc<ModelRegistry>,
    ratio_calculator: RatioCalculator,
    risk_assessor: RiskAssessor,
    valuation_engine: ValuationEngine,
    trend_analyzer: TrendAnalyzer,
}

impl AnalysisService {
    pub fn new(
        tenant: TenantId,
        stores: Stores,
        config: Arc<OrchestratorConfig>,
        models: Arc<ModelRegistry>,
    ) -> Self {
        let risk_assessor = RiskAssessor::new(
            stores.statements.clone(),
            stores.market.clone(),
            config.benchmark_company_id.clone(),
        );
        let valuation_engine =
            ValuationEngine::new(stores.statements.clone(), stores.market.clone());
        let trend_analyzer = TrendAnalyzer::new(stores.statements.clone());
        Self {
            tenant,
            stores,
            config,
            models,
            ratio_calculator: RatioCalculator::new(),
            risk_assessor,
            valuation_engine,
            trend_analyzer,
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    async fn fetch<T, F>(&self, what: &str, fut: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        with_timeout(self.config.fetch_timeout, what, fut).await
    }

    pub async fn company(&self, company_id: &str) -> Result<Company, AnalysisError> {
        self.fetch("company lookup", self.stores.companies.get_company(&self.tenant, company_id))
            .await?
            .ok_or_else(|| AnalysisError::missing(company_id, "company"))
    }

    async fn load_statements(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<StatementSet, AnalysisError> {
        let statements = &self.stores.statements;
        let tenant = &self.tenant;
        let (income, balance, cash_flow, market) = tokio::try_join!(
            statements.latest_income(tenant, company_id, as_of),
            statements.latest_balance(tenant, company_id, as_of),
            statements.latest_cash_flow(tenant, company_id, as_of),
            self.stores.market.get_latest(tenant, company_id, as_of),
        )?;
        let (prior_income, prior_balance) = tokio::try_join!(
            async {
                match &income {
                    Some(current) => statements.prior_income(tenant, current).await,
                    None => Ok(None),
                }
            },
            async {
                match &balance {
                    Some(current) => statements.prior_balance(tenant, current).await,
                    None => Ok(None),
                }
            },
        )?;
        Ok(StatementSet {
            income,
            balance,
            cash_flow,
            prior_income,
            prior_balance,
            market,
        })
    }

    pub async fn ratios(&self, company_id: &str, as_of: NaiveDate) -> Result<RatioSet, AnalysisError> {
        let set = self
            .fetch("statement fetch", self.load_statements(company_id, as_of))
            .await?;
        if set.income.is_none() && set.balance.is_none() && set.cash_flow.is_none() {
            return Err(AnalysisError::missing(company_id, "financial statements"));
        }

        let ratios = self.ratio_calculator.calculate(company_id, as_of, &set);
        self.stores
            .results
            .save_ratios(&self.tenant, &ratios.to_record())
            .await?;
        info!(
            tenant = %self.tenant,
            company_id,
            computed = ratios.computed_count(),
            "Ratios calculated"
        );
        Ok(ratios)
    }

    /// All five methods under all three scenarios; the fifteen results are stored.
    pub async fn valuation(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<MultiMethodValuation, AnalysisError> {
        let company = self.company(company_id).await?;
        let valuation = self
            .fetch("valuation", self.valuation_engine.value_all(&self.tenant, &company, as_of))
            .await?;
        for record in valuation.to_records()? {
            self.stores.results.save_valuation(&self.tenant, &record).await?;
        }
        Ok(valuation)
    }

    pub async fn valuation_method(
        &self,
        company_id: &str,
        method: ValuationMethod,
        as_of: NaiveDate,
    ) -> Result<Valuation, AnalysisError> {
        let valuation = self
            .fetch(
                "valuation",
                self.valuation_engine.value_method(&self.tenant, company_id, method, as_of),
            )
            .await?;
        self.stores
            .results
            .save_valuation(&self.tenant, &valuation.to_record()?)
            .await?;
        Ok(valuation)
    }

    pub async fn risk(&self, company_id: &str, as_of: NaiveDate) -> Result<RiskAssessment, AnalysisError> {
        let assessment = self
            .fetch("risk assessment", self.risk_assessor.assess(&self.tenant, company_id, as_of))
            .await?;
        for record in assessment.to_records() {
            self.stores
                .results
                .save_risk_assessment(&self.tenant, &record)
                .await?;
        }
        Ok(assessment)
    }

    pub async fn beta(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        period_days: usize,
    ) -> Result<f64, AnalysisError> {
        check_period(period_days)?;
        self.fetch("beta", self.risk_assessor.beta(&self.tenant, company_id, as_of, period_days))
            .await
    }

    pub async fn volatility(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        period_days: usize,
    ) -> Result<f64, AnalysisError> {
        check_period(period_days)?;
        self.fetch(
            "volatility",
            self.risk_assessor.volatility(&self.tenant, company_id, as_of, period_days),
        )
        .await
    }

    /// `confidence_level` must be 0.95 or 0.99.
    pub async fn value_at_risk(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        confidence_level: f64,
        period_days: usize,
    ) -> Result<f64, AnalysisError> {
        let confidence = ConfidenceLevel::try_from(confidence_level)?;
        check_period(period_days)?;
        self.fetch(
            "value at risk",
            self.risk_assessor
                .value_at_risk(&self.tenant, company_id, as_of, confidence, period_days),
        )
        .await
    }

    pub async fn scenarios(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        probabilities: ScenarioProbabilities,
        basis: FairValueBasis,
    ) -> Result<ScenarioAnalysis, AnalysisError> {
        let aggregator = ScenarioAggregator::new(probabilities)?.with_basis(basis);
        let company = self.company(company_id).await?;
        let (valuation, risk) = tokio::try_join!(
            self.fetch("valuation", self.valuation_engine.value_all(&self.tenant, &company, as_of)),
            self.fetch("risk assessment", self.risk_assessor.assess(&self.tenant, company_id, as_of)),
        )?;
        aggregator.analyze(&valuation, &risk)
    }

    pub async fn trend(
        &self,
        company_id: &str,
        metric: TrendMetric,
        period_type: PeriodType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TrendReport, AnalysisError> {
        self.fetch(
            "trend history",
            self.trend_analyzer
                .analyze_metric(&self.tenant, company_id, metric, period_type, start, end),
        )
        .await
    }

    pub async fn features(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<ValuationFeatures, AnalysisError> {
        let company = self.company(company_id).await?;
        let (valuation, history, universe) = tokio::try_join!(
            self.fetch("valuation", self.valuation_engine.value_all(&self.tenant, &company, as_of)),
            self.fetch(
                "valuation history",
                self.stores.results.valuation_history(&self.tenant, company_id, as_of),
            ),
            self.fetch("company list", self.stores.companies.list_companies(&self.tenant)),
        )?;

        let peers = self.peer_discounts(&company, &universe, as_of).await;
        let monthly = monthly_history(&history, as_of, HISTORY_MONTHS);
        let features = engineer_features(
            &valuation,
            FeatureContext {
                history: &monthly,
                peers: &peers,
            },
        );
        debug!(
            tenant = %self.tenant,
            company_id,
            peers = peers.len(),
            history = monthly.len(),
            computed = features.computed_count(),
            "Features engineered"
        );
        Ok(features)
    }

    /// Same-sector discounts as of `as_of`. Peers that cannot be valued are left out.
    async fn peer_discounts(
        &self,
        company: &Company,
        universe: &[Company],
        as_of: NaiveDate,
    ) -> Vec<PeerDiscount> {
        let lookups: Vec<_> = sector_peers(company, universe)
            .into_iter()
            .map(|peer| async move {
                let valued = self
                    .fetch("peer valuation", self.valuation_engine.value_all(&self.tenant, peer, as_of))
                    .await;
                match valued {
                    Ok(valuation) => peer_discount(&valuation),
                    Err(e) => {
                        debug!(peer = %peer.id, error = %e, "Skipping peer");
                        None
                    }
                }
            })
            .collect();
        let discounts: Vec<Option<PeerDiscount>> = stream::iter(lookups)
            .buffer_unordered(self.config.dataset_concurrency)
            .collect()
            .await;
        discounts.into_iter().flatten().collect()
    }

    /// Scores one company with the current weights and stores the result.
    /// Ratios are required; risk and valuation are used when available.
    pub async fn score(&self, company_id: &str, as_of: NaiveDate) -> Result<CompositeScore, AnalysisError> {
        let ratios = self.ratios(company_id, as_of).await?;
        let (risk, valuation) = tokio::join!(
            self.risk(company_id, as_of),
            self.valuation(company_id, as_of),
        );
        let risk = optional(company_id, "risk", risk)?;
        let consensus_discount = optional(company_id, "valuation", valuation)?
            .and_then(|v| discount_pct(v.current_price, v.consensus_valuation()));

        let scorer = CompositeScorer::new(self.models.weights().await)?;
        let score = scorer.score(
            company_id,
            as_of,
            ScoringInputs {
                ratios: &ratios,
                risk: risk.as_ref(),
                consensus_discount,
            },
        )?;
        self.stores
            .results
            .save_composite_score(&self.tenant, &score.to_record())
            .await?;
        info!(
            tenant = %self.tenant,
            company_id,
            score = score.composite_score,
            rating = score.rating.as_str(),
            "Composite score stored"
        );
        Ok(score)
    }

    /// Rescores every company of the tenant, skipping those that fail.
    pub async fn recompute_scores(&self, as_of: NaiveDate) -> Result<ScoreBatch, AnalysisError> {
        let companies = self
            .fetch("company list", self.stores.companies.list_companies(&self.tenant))
            .await?;
        let benchmark = &self.config.benchmark_company_id;
        let rankable: Vec<&Company> = companies.iter().filter(|c| &c.id != benchmark).collect();
        Ok(self.score_companies(&rankable, as_of).await)
    }

    async fn score_companies(&self, companies: &[&Company], as_of: NaiveDate) -> ScoreBatch {
        let jobs: Vec<_> = companies
            .iter()
            .map(|company| async move { (company.id.clone(), self.score(&company.id, as_of).await) })
            .collect();
        let results: Vec<(String, Result<CompositeScore, AnalysisError>)> = stream::iter(jobs)
            .buffer_unordered(self.config.dataset_concurrency)
            .collect()
            .await;

        let mut scores = Vec::new();
        let mut failures = Vec::new();
        for (company_id, result) in results {
            match result {
                Ok(score) => scores.push(score),
                Err(e) => {
                    warn!(tenant = %self.tenant, company_id = %company_id, error = %e, "Scoring failed");
                    failures.push(BatchFailure {
                        company_id,
                        date: Some(as_of),
                        reason: e.to_string(),
                    });
                }
            }
        }
        scores.sort_by(|a, b| a.company_id.cmp(&b.company_id));
        info!(
            tenant = %self.tenant,
            scored = scores.len(),
            failed = failures.len(),
            "Score recompute finished"
        );
        ScoreBatch {
            score_date: as_of,
            scores,
            failures,
        }
    }

    /// Ranks the scores already stored for `as_of`. Only companies without
    /// a stored score for that day are scored now.
    pub async fn rankings(
        &self,
        as_of: NaiveDate,
        min_score: Option<f64>,
    ) -> Result<Vec<RankedCompany>, AnalysisError> {
        let (companies, mut records) = tokio::try_join!(
            self.fetch("company list", self.stores.companies.list_companies(&self.tenant)),
            self.fetch(
                "stored scores",
                self.stores.results.composite_score_history(&self.tenant, as_of, as_of),
            ),
        )?;
        let benchmark = &self.config.benchmark_company_id;
        let missing: Vec<&Company> = companies
            .iter()
            .filter(|c| &c.id != benchmark && !records.iter().any(|r| r.company_id == c.id))
            .collect();
        debug!(
            tenant = %self.tenant,
            %as_of,
            stored = records.len(),
            missing = missing.len(),
            "Ranking companies"
        );
        if !missing.is_empty() {
            let batch = self.score_companies(&missing, as_of).await;
            records.extend(batch.scores.iter().map(CompositeScore::to_record));
        }
        Ok(rank_records(&records, min_score))
    }

    pub async fn prediction(&self, company_id: &str, as_of: NaiveDate) -> Result<Prediction, AnalysisError> {
        let network = self
            .models
            .network()
            .await
            .ok_or_else(|| AnalysisError::missing(company_id, "trained prediction model"))?;
        let features = self.features(company_id, as_of).await?;
        network.predict_features(&features)
    }

    pub async fn weights(&self) -> WeightStatus {
        self.models.weight_status().await
    }
}

fn check_period(period_days: usize) -> Result<(), AnalysisError> {
    if period_days < 2 {
        return Err(AnalysisError::invalid(format!(
            "period_days must be at least 2, got {period_days}"
        )));
    }
    Ok(())
}

/// Missing data downgrades to `None`; any other failure still propagates.
fn optional<T>(
    company_id: &str,
    what: &str,
    result: Result<T, AnalysisError>,
) -> Result<Option<T>, AnalysisError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_insufficient_data() => {
            debug!(company_id, what, error = %e, "Scoring without this input");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
