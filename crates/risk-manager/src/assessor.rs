use std::sync::Arc;

use analysis_core::{
    AnalysisError, MarketDataPoint, MarketDataStore, StatementSet, StatementStore, TenantId,
};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::assessment::{PriceInputs, RiskAssessment, RiskEngine};
use crate::market::{self, closing_prices, ConfidenceLevel};

/// Calendar days of history fetched to cover `trading_days` bars.
fn lookback_days(trading_days: usize) -> i64 {
    (trading_days as f64 * 365.0 / 252.0).ceil() as i64 + 10
}

/// Store-backed risk assessment for one tenant's companies.
pub struct RiskAssessor {
    statements: Arc<dyn StatementStore>,
    market: Arc<dyn MarketDataStore>,
    benchmark_id: String,
    engine: RiskEngine,
}

impl RiskAssessor {
    pub fn new(
        statements: Arc<dyn StatementStore>,
        market: Arc<dyn MarketDataStore>,
        benchmark_id: impl Into<String>,
    ) -> Self {
        Self {
            statements,
            market,
            benchmark_id: benchmark_id.into(),
            engine: RiskEngine::new(),
        }
    }

    pub fn with_engine(mut self, engine: RiskEngine) -> Self {
        self.engine = engine;
        self
    }

    pub async fn assess(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<RiskAssessment, AnalysisError> {
        let (income, balance, latest_price) = tokio::try_join!(
            self.statements.latest_income(tenant, company_id, as_of),
            self.statements.latest_balance(tenant, company_id, as_of),
            self.market.get_latest(tenant, company_id, as_of),
        )?;

        let statements = StatementSet {
            income,
            balance,
            market: latest_price,
            ..Default::default()
        };

        let window = self.engine.beta_window.max(90);
        let (prices, benchmark) = tokio::try_join!(
            self.price_history(tenant, company_id, as_of, window),
            self.benchmark_history(tenant, as_of, window),
        )?;

        debug!(
            tenant = %tenant,
            company_id,
            prices = prices.len(),
            benchmark = benchmark.len(),
            "Assessing risk"
        );

        let assessment = self.engine.assess(
            company_id,
            as_of,
            &statements,
            PriceInputs {
                prices: &prices,
                benchmark: &benchmark,
            },
        )?;

        if let Some(neutral) = assessment.neutral() {
            info!(
                tenant = %tenant,
                company_id,
                overall = neutral.overall_score,
                rating = neutral.rating.as_str(),
                "Risk assessment complete"
            );
        }
        Ok(assessment)
    }

    /// Beta against the configured market index over `period_days` trading days.
    pub async fn beta(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
        period_days: usize,
    ) -> Result<f64, AnalysisError> {
        let (prices, benchmark) = tokio::try_join!(
            self.price_history(tenant, company_id, as_of, period_days),
            self.benchmark_history(tenant, as_of, period_days),
        )?;
        if benchmark.is_empty() {
            return Err(AnalysisError::missing(
                company_id,
                format!("market index series '{}'", self.benchmark_id),
            ));
        }
        market::beta(&prices, &benchmark, period_days).ok_or_else(|| {
            AnalysisError::missing(company_id, "at least 30 paired daily returns for beta")
        })
    }

    pub async fn volatility(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
        period_days: usize,
    ) -> Result<f64, AnalysisError> {
        let prices = self
            .price_history(tenant, company_id, as_of, period_days)
            .await?;
        market::volatility(&closing_prices(&prices), period_days).ok_or_else(|| {
            AnalysisError::missing(company_id, "at least 10 daily prices for volatility")
        })
    }

    pub async fn value_at_risk(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
        confidence: ConfidenceLevel,
        period_days: usize,
    ) -> Result<f64, AnalysisError> {
        let prices = self
            .price_history(tenant, company_id, as_of, period_days)
            .await?;
        let closes = closing_prices(&prices);
        let start = closes.len().saturating_sub(period_days);
        market::value_at_risk(&closes[start..], confidence).ok_or_else(|| {
            AnalysisError::missing(company_id, "at least 10 daily prices for value at risk")
        })
    }

    async fn price_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
        trading_days: usize,
    ) -> Result<Vec<MarketDataPoint>, AnalysisError> {
        let start = as_of - Duration::days(lookback_days(trading_days));
        self.market.get_history(tenant, company_id, start, as_of).await
    }

    async fn benchmark_history(
        &self,
        tenant: &TenantId,
        as_of: NaiveDate,
        trading_days: usize,
    ) -> Result<Vec<MarketDataPoint>, AnalysisError> {
        let start = as_of - Duration::days(lookback_days(trading_days));
        self.market
            .get_history(tenant, &self.benchmark_id, start, as_of)
            .await
    }
}
