use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{
    AnalysisError, PeriodType, Statement, StatementSet, StatementStore, StatementType, TenantId,
};
use chrono::{Duration, NaiveDate};
use fundamental_analysis::RatioCalculator;
use tracing::debug;

use crate::metric::TrendMetric;
use crate::report::{analyze_series, TrendOptions, TrendPoint, TrendReport};

/// Statements of one period end, keyed by kind.
#[derive(Default)]
struct PeriodStatements {
    income: Option<Statement>,
    balance: Option<Statement>,
    cash_flow: Option<Statement>,
}

/// Reads statement history and turns one metric into a trend report.
pub struct TrendAnalyzer {
    statements: Arc<dyn StatementStore>,
    calculator: RatioCalculator,
    options: TrendOptions,
}

impl TrendAnalyzer {
    pub fn new(statements: Arc<dyn StatementStore>) -> Self {
        Self {
            statements,
            calculator: RatioCalculator::new(),
            options: TrendOptions::default(),
        }
    }

    pub fn with_anomaly_threshold(mut self, threshold: f64) -> Self {
        self.options.anomaly_threshold = threshold;
        self
    }

    async fn history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        metric: TrendMetric,
        statement_type: StatementType,
        period_type: PeriodType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Statement>, AnalysisError> {
        if !metric.statement_types().contains(&statement_type) {
            return Ok(vec![]);
        }
        self.statements
            .history_of_period(tenant, company_id, statement_type, period_type, start, end)
            .await
    }

    /// Trend of `metric` over periods ending in `[start, end]`. Fewer than three
    /// usable periods yields an insufficient-data report rather than an error.
    pub async fn analyze_metric(
        &self,
        tenant: &TenantId,
        company_id: &str,
        metric: TrendMetric,
        period_type: PeriodType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TrendReport, AnalysisError> {
        if start > end {
            return Err(AnalysisError::invalid(format!(
                "start date {start} is after end date {end}"
            )));
        }

        // Reach back one extra period so the first point has a prior for averages.
        let lookback = match period_type {
            PeriodType::Annual => Duration::days(400),
            PeriodType::Quarterly => Duration::days(100),
        };
        let from = start - lookback;

        let (income, balance, cash_flow) = tokio::try_join!(
            self.history(tenant, company_id, metric, StatementType::Income, period_type, from, end),
            self.history(tenant, company_id, metric, StatementType::Balance, period_type, from, end),
            self.history(tenant, company_id, metric, StatementType::CashFlow, period_type, from, end),
        )?;

        let mut periods: BTreeMap<NaiveDate, PeriodStatements> = BTreeMap::new();
        for statement in income {
            let period_end = statement.period().period_end;
            periods.entry(period_end).or_default().income = Some(statement);
        }
        for statement in balance {
            let period_end = statement.period().period_end;
            periods.entry(period_end).or_default().balance = Some(statement);
        }
        for statement in cash_flow {
            let period_end = statement.period().period_end;
            periods.entry(period_end).or_default().cash_flow = Some(statement);
        }

        let mut points = Vec::new();
        let mut prior: Option<StatementSet> = None;
        for (period_end, statements) in periods {
            let set = StatementSet {
                income: statements.income.and_then(Statement::into_income),
                balance: statements.balance.and_then(Statement::into_balance),
                cash_flow: statements.cash_flow.and_then(Statement::into_cash_flow),
                prior_income: prior.as_ref().and_then(|p| p.income.clone()),
                prior_balance: prior.as_ref().and_then(|p| p.balance.clone()),
                market: None,
            };
            if period_end >= start {
                if let Some(value) = metric.value(&set, &self.calculator) {
                    points.push(TrendPoint {
                        date: period_end,
                        value,
                    });
                }
            }
            prior = Some(set);
        }

        debug!(
            tenant = %tenant,
            company_id,
            metric = metric.as_str(),
            points = points.len(),
            "Analyzing trend"
        );

        let options = TrendOptions {
            quarterly: period_type == PeriodType::Quarterly,
            ..self.options
        };
        Ok(analyze_series(metric.as_str(), points, options))
    }
}
