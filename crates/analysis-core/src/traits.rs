use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    AnalysisError, BalanceSheet, CashFlowStatement, Company, CompositeScoreRecord,
    IncomeStatement, MarketDataPoint, PeriodType, RatioRecord, RiskAssessmentRecord, Statement,
    StatementType, TenantId, ValuationRecord, ValuationSnapshot,
};

/// Read access to booked financial statements.
#[async_trait]
pub trait StatementStore: Send + Sync {
    /// Most recent statement of `statement_type` with `period_end <= as_of`.
    async fn get_latest(
        &self,
        tenant: &TenantId,
        company_id: &str,
        statement_type: StatementType,
        as_of: NaiveDate,
    ) -> Result<Option<Statement>, AnalysisError>;

    /// Statements with `start <= period_end <= end`, ordered by period end ascending.
    async fn get_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        statement_type: StatementType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Statement>, AnalysisError>;

    async fn latest_income(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<Option<IncomeStatement>, AnalysisError> {
        Ok(self
            .get_latest(tenant, company_id, StatementType::Income, as_of)
            .await?
            .and_then(Statement::into_income))
    }

    async fn latest_balance(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<Option<BalanceSheet>, AnalysisError> {
        Ok(self
            .get_latest(tenant, company_id, StatementType::Balance, as_of)
            .await?
            .and_then(Statement::into_balance))
    }

    async fn latest_cash_flow(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<Option<CashFlowStatement>, AnalysisError> {
        Ok(self
            .get_latest(tenant, company_id, StatementType::CashFlow, as_of)
            .await?
            .and_then(Statement::into_cash_flow))
    }

    /// Income statement of the same period type immediately before `current`.
    async fn prior_income(
        &self,
        tenant: &TenantId,
        current: &IncomeStatement,
    ) -> Result<Option<IncomeStatement>, AnalysisError> {
        let before = current.period.period_end.pred_opt().unwrap_or(current.period.period_end);
        let statement = self
            .get_latest(tenant, &current.period.company_id, StatementType::Income, before)
            .await?;
        Ok(statement
            .and_then(Statement::into_income)
            .filter(|s| s.period.period_type == current.period.period_type))
    }

    async fn prior_balance(
        &self,
        tenant: &TenantId,
        current: &BalanceSheet,
    ) -> Result<Option<BalanceSheet>, AnalysisError> {
        let before = current.period.period_end.pred_opt().unwrap_or(current.period.period_end);
        let statement = self
            .get_latest(tenant, &current.period.company_id, StatementType::Balance, before)
            .await?;
        Ok(statement
            .and_then(Statement::into_balance)
            .filter(|s| s.period.period_type == current.period.period_type))
    }

    /// History narrowed to one period type.
    async fn history_of_period(
        &self,
        tenant: &TenantId,
        company_id: &str,
        statement_type: StatementType,
        period_type: PeriodType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Statement>, AnalysisError> {
        let all = self
            .get_history(tenant, company_id, statement_type, start, end)
            .await?;
        Ok(all
            .into_iter()
            .filter(|s| s.period().period_type == period_type)
            .collect())
    }
}

/// Read access to daily price bars.
#[async_trait]
pub trait MarketDataStore: Send + Sync {
    async fn get_latest(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<Option<MarketDataPoint>, AnalysisError>;

    /// Bars with `start <= date <= end`, ordered by date ascending.
    async fn get_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketDataPoint>, AnalysisError>;
}

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn list_companies(&self, tenant: &TenantId) -> Result<Vec<Company>, AnalysisError>;

    async fn get_company(
        &self,
        tenant: &TenantId,
        company_id: &str,
    ) -> Result<Option<Company>, AnalysisError>;
}

/// Append-only sink for derived results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save_ratios(&self, tenant: &TenantId, record: &RatioRecord)
        -> Result<(), AnalysisError>;

    async fn save_valuation(
        &self,
        tenant: &TenantId,
        record: &ValuationRecord,
    ) -> Result<(), AnalysisError>;

    async fn save_risk_assessment(
        &self,
        tenant: &TenantId,
        record: &RiskAssessmentRecord,
    ) -> Result<(), AnalysisError>;

    /// Replaces any score already stored for the same company and day.
    async fn save_composite_score(
        &self,
        tenant: &TenantId,
        record: &CompositeScoreRecord,
    ) -> Result<(), AnalysisError>;

    /// Stored composite scores for all companies with `start <= score_date <= end`.
    async fn composite_score_history(
        &self,
        tenant: &TenantId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositeScoreRecord>, AnalysisError>;

    /// Consensus values of earlier multi-method runs strictly before `before`,
    /// newest first.
    async fn valuation_history(
        &self,
        tenant: &TenantId,
        company_id: &str,
        before: NaiveDate,
    ) -> Result<Vec<ValuationSnapshot>, AnalysisError>;
}
