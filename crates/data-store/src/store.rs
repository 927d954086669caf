use std::collections::BTreeMap;

use analysis_core::{
    AnalysisError, Company, CompanyDirectory, CompositeScoreRecord, MarketDataPoint,
    MarketDataStore, RatioRecord, ResultStore, RiskAssessmentRecord, Statement, StatementStore,
    StatementType, TenantId, ValuationRecord, ValuationSnapshot,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, info};

use crate::rows::*;

/// Valuation rows one multi-method run writes for a single date.
const FULL_RUN_ROWS: usize = 15;

/// SQL-backed implementation of every store trait. All queries filter on
/// `tenant_id`.
#[derive(Clone)]
pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Connects and applies pending migrations. In-memory SQLite URLs get a
    /// single connection so every query sees the same database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        info!(max_connections, "Database ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn upsert_company(&self, tenant: &TenantId, company: &Company) -> Result<()> {
        sqlx::query(
            "INSERT INTO companies (tenant_id, id, symbol, name, sector)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, id) DO UPDATE SET
                symbol = excluded.symbol,
                name = excluded.name,
                sector = excluded.sector",
        )
        .bind(tenant.as_str())
        .bind(&company.id)
        .bind(&company.symbol)
        .bind(company.name.as_deref())
        .bind(company.sector.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Books a statement. Returns `false` when a statement for the same
    /// company, type, period end and period type already exists; booked
    /// periods are never overwritten.
    pub async fn insert_statement(&self, tenant: &TenantId, statement: &Statement) -> Result<bool> {
        let period = statement.period();
        let payload = serde_json::to_string(statement)?;
        let result = sqlx::query(
            "INSERT INTO statements
                (tenant_id, company_id, statement_type, period_end, period_type, fiscal_year, payload)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, company_id, statement_type, period_end, period_type) DO NOTHING",
        )
        .bind(tenant.as_str())
        .bind(&period.company_id)
        .bind(statement.statement_type().as_str())
        .bind(format_date(period.period_end))
        .bind(period.period_type.as_str())
        .bind(period.fiscal_year as i64)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_market_data(
        &self,
        tenant: &TenantId,
        points: &[MarketDataPoint],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for p in points {
            let result = sqlx::query(
                "INSERT INTO market_data
                    (tenant_id, company_id, date, open, high, low, close,
                     adjusted_close, volume, market_cap, shares_outstanding)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (tenant_id, company_id, date) DO NOTHING",
            )
            .bind(tenant.as_str())
            .bind(&p.company_id)
            .bind(format_date(p.date))
            .bind(p.open)
            .bind(p.high)
            .bind(p.low)
            .bind(p.close)
            .bind(p.adjusted_close)
            .bind(p.volume)
            .bind(p.market_cap)
            .bind(p.shares_outstanding)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        debug!(tenant = %tenant, inserted, "Market data inserted");
        Ok(inserted)
    }

    /// Valuation rows stored for one company and date.
    pub async fn valuations_on(
        &self,
        tenant: &TenantId,
        company_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ValuationRecord>, AnalysisError> {
        let rows: Vec<ValuationRow> = sqlx::query_as(
            "SELECT company_id, valuation_date, method, scenario, fair_value_per_share,
                    fair_value_low, fair_value_high, current_price, upside_pct,
                    enterprise_value, equity_value, confidence, parameters_json,
                    assumptions_json
             FROM valuations
             WHERE tenant_id = ? AND company_id = ? AND valuation_date = ?
             ORDER BY id",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(ValuationRow::into_record).collect()
    }

    /// Risk assessment rows stored for one company and date.
    pub async fn risk_assessments_on(
        &self,
        tenant: &TenantId,
        company_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<RiskAssessmentRecord>, AnalysisError> {
        let rows: Vec<RiskAssessmentRow> = sqlx::query_as(
            "SELECT company_id, assessment_date, scenario, overall_risk_score, risk_rating,
                    financial_risk, operational_risk, business_risk, market_risk, esg_risk,
                    altman_z_score, beta, volatility_30d, volatility_90d, var_95,
                    risk_factors_json, risk_details_json
             FROM risk_assessments
             WHERE tenant_id = ? AND company_id = ? AND assessment_date = ?
             ORDER BY id",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(RiskAssessmentRow::into_record).collect()
    }
}

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

#[async_trait]
impl StatementStore for SqlStore {
    async fn get_latest(
        &self,
        tenant: &TenantId,
        company_id: &str,
        statement_type: StatementType,
        as_of: NaiveDate,
    ) -> Result<Option<Statement>, AnalysisError> {
        let row: Option<StatementRow> = sqlx::query_as(
            "SELECT payload FROM statements
             WHERE tenant_id = ? AND company_id = ? AND statement_type = ? AND period_end <= ?
             ORDER BY period_end DESC,
                      CASE period_type WHEN 'annual' THEN 0 ELSE 1 END
             LIMIT 1",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(statement_type.as_str())
        .bind(format_date(as_of))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(StatementRow::into_statement).transpose()
    }

    async fn get_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        statement_type: StatementType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Statement>, AnalysisError> {
        let rows: Vec<StatementRow> = sqlx::query_as(
            "SELECT payload FROM statements
             WHERE tenant_id = ? AND company_id = ? AND statement_type = ?
               AND period_end >= ? AND period_end <= ?
             ORDER BY period_end ASC",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(statement_type.as_str())
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(StatementRow::into_statement).collect()
    }
}

#[async_trait]
impl MarketDataStore for SqlStore {
    async fn get_latest(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<Option<MarketDataPoint>, AnalysisError> {
        let row: Option<MarketDataRow> = sqlx::query_as(
            "SELECT company_id, date, open, high, low, close, adjusted_close, volume,
                    market_cap, shares_outstanding
             FROM market_data
             WHERE tenant_id = ? AND company_id = ? AND date <= ?
             ORDER BY date DESC
             LIMIT 1",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(format_date(as_of))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(MarketDataRow::into_point).transpose()
    }

    async fn get_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketDataPoint>, AnalysisError> {
        let rows: Vec<MarketDataRow> = sqlx::query_as(
            "SELECT company_id, date, open, high, low, close, adjusted_close, volume,
                    market_cap, shares_outstanding
             FROM market_data
             WHERE tenant_id = ? AND company_id = ? AND date >= ? AND date <= ?
             ORDER BY date ASC",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(MarketDataRow::into_point).collect()
    }
}

#[async_trait]
impl CompanyDirectory for SqlStore {
    async fn list_companies(&self, tenant: &TenantId) -> Result<Vec<Company>, AnalysisError> {
        let rows: Vec<CompanyRow> = sqlx::query_as(
            "SELECT id, symbol, name, sector FROM companies WHERE tenant_id = ? ORDER BY symbol",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|r| Company {
                id: r.id,
                symbol: r.symbol,
                name: r.name,
                sector: r.sector,
            })
            .collect())
    }

    async fn get_company(
        &self,
        tenant: &TenantId,
        company_id: &str,
    ) -> Result<Option<Company>, AnalysisError> {
        let row: Option<CompanyRow> = sqlx::query_as(
            "SELECT id, symbol, name, sector FROM companies WHERE tenant_id = ? AND id = ?",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(|r| Company {
            id: r.id,
            symbol: r.symbol,
            name: r.name,
            sector: r.sector,
        }))
    }
}

#[async_trait]
impl ResultStore for SqlStore {
    async fn save_ratios(
        &self,
        tenant: &TenantId,
        record: &RatioRecord,
    ) -> Result<(), AnalysisError> {
        let ratios_json = serde_json::to_string(&record.ratios).map_err(store_err)?;
        sqlx::query(
            "INSERT INTO ratio_sets (tenant_id, company_id, calculation_date, period_end, ratios_json)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, company_id, calculation_date) DO UPDATE SET
                period_end = excluded.period_end,
                ratios_json = excluded.ratios_json",
        )
        .bind(tenant.as_str())
        .bind(&record.company_id)
        .bind(format_date(record.calculation_date))
        .bind(record.period_end.map(format_date))
        .bind(ratios_json)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn save_valuation(
        &self,
        tenant: &TenantId,
        record: &ValuationRecord,
    ) -> Result<(), AnalysisError> {
        let parameters_json = serde_json::to_string(&record.parameters).map_err(store_err)?;
        let assumptions_json = serde_json::to_string(&record.assumptions).map_err(store_err)?;
        sqlx::query(
            "INSERT INTO valuations (
                tenant_id, company_id, valuation_date, method, scenario,
                fair_value_per_share, fair_value_low, fair_value_high, current_price,
                upside_pct, enterprise_value, equity_value, confidence,
                parameters_json, assumptions_json
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tenant.as_str())
        .bind(&record.company_id)
        .bind(format_date(record.valuation_date))
        .bind(record.method.as_str())
        .bind(record.scenario.as_str())
        .bind(decimal_text(record.fair_value_per_share))
        .bind(decimal_text(record.fair_value_low))
        .bind(decimal_text(record.fair_value_high))
        .bind(record.current_price.map(decimal_text))
        .bind(record.upside_pct)
        .bind(record.enterprise_value.map(decimal_text))
        .bind(record.equity_value.map(decimal_text))
        .bind(record.confidence)
        .bind(parameters_json)
        .bind(assumptions_json)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn save_risk_assessment(
        &self,
        tenant: &TenantId,
        record: &RiskAssessmentRecord,
    ) -> Result<(), AnalysisError> {
        let factors_json = serde_json::to_string(&record.risk_factors).map_err(store_err)?;
        let details_json = serde_json::to_string(&record.risk_details).map_err(store_err)?;
        sqlx::query(
            "INSERT INTO risk_assessments (
                tenant_id, company_id, assessment_date, scenario, overall_risk_score,
                risk_rating, financial_risk, operational_risk, business_risk, market_risk,
                esg_risk, altman_z_score, beta, volatility_30d, volatility_90d, var_95,
                risk_factors_json, risk_details_json
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tenant.as_str())
        .bind(&record.company_id)
        .bind(format_date(record.assessment_date))
        .bind(record.scenario.as_str())
        .bind(record.overall_risk_score)
        .bind(record.risk_rating.as_str())
        .bind(record.financial_risk)
        .bind(record.operational_risk)
        .bind(record.business_risk)
        .bind(record.market_risk)
        .bind(record.esg_risk)
        .bind(record.altman_z_score)
        .bind(record.beta)
        .bind(record.volatility_30d)
        .bind(record.volatility_90d)
        .bind(record.var_95)
        .bind(factors_json)
        .bind(details_json)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn save_composite_score(
        &self,
        tenant: &TenantId,
        record: &CompositeScoreRecord,
    ) -> Result<(), AnalysisError> {
        let weights_json = serde_json::to_string(&record.weights).map_err(store_err)?;
        sqlx::query(
            "INSERT INTO composite_scores (
                tenant_id, company_id, score_date, composite_score, rating,
                valuation_score, profitability_score, growth_score,
                financial_health_score, risk_score, weights_json
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, company_id, score_date) DO UPDATE SET
                composite_score = excluded.composite_score,
                rating = excluded.rating,
                valuation_score = excluded.valuation_score,
                profitability_score = excluded.profitability_score,
                growth_score = excluded.growth_score,
                financial_health_score = excluded.financial_health_score,
                risk_score = excluded.risk_score,
                weights_json = excluded.weights_json,
                updated_at = datetime('now')",
        )
        .bind(tenant.as_str())
        .bind(&record.company_id)
        .bind(format_date(record.score_date))
        .bind(record.composite_score)
        .bind(&record.rating)
        .bind(record.valuation_score)
        .bind(record.profitability_score)
        .bind(record.growth_score)
        .bind(record.financial_health_score)
        .bind(record.risk_score)
        .bind(weights_json)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn composite_score_history(
        &self,
        tenant: &TenantId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositeScoreRecord>, AnalysisError> {
        let rows: Vec<CompositeScoreRow> = sqlx::query_as(
            "SELECT company_id, score_date, composite_score, rating, valuation_score,
                    profitability_score, growth_score, financial_health_score, risk_score,
                    weights_json
             FROM composite_scores
             WHERE tenant_id = ? AND score_date >= ? AND score_date <= ?
             ORDER BY score_date ASC, company_id ASC",
        )
        .bind(tenant.as_str())
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(CompositeScoreRow::into_record).collect()
    }

    async fn valuation_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        before: NaiveDate,
    ) -> Result<Vec<ValuationSnapshot>, AnalysisError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT valuation_date, method, scenario, fair_value_per_share
             FROM valuations
             WHERE tenant_id = ? AND company_id = ? AND valuation_date < ?
             ORDER BY id ASC",
        )
        .bind(tenant.as_str())
        .bind(company_id)
        .bind(format_date(before))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        // Later rows for the same method and scenario replace earlier ones.
        let mut by_date: BTreeMap<String, BTreeMap<(String, String), f64>> = BTreeMap::new();
        for (date, method, scenario, value) in rows {
            let value = value
                .parse::<Decimal>()
                .map_err(store_err)?
                .to_f64()
                .ok_or_else(|| store_err("fair value out of range"))?;
            by_date
                .entry(date)
                .or_default()
                .insert((method, scenario), value);
        }

        // Only dates carrying a full multi-method run count as snapshots.
        let mut snapshots = Vec::new();
        for (date, values) in by_date.into_iter().rev() {
            if values.len() < FULL_RUN_ROWS {
                continue;
            }
            snapshots.push(ValuationSnapshot {
                valuation_date: parse_date(&date)?,
                consensus_value: values.values().sum::<f64>() / values.len() as f64,
            });
        }
        Ok(snapshots)
    }
}
