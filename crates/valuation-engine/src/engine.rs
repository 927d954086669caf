use std::sync::Arc;

use analysis_core::{
    AnalysisError, Company, MarketDataStore, Scenario, StatementSet, StatementStore, TenantId,
    ValuationMethod,
};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::methods::{self, MethodOutcome, ValuationInputs};
use crate::model::{upside_pct, MultiMethodValuation, ScenarioTriple, ScenarioValuation, Valuation};
use crate::params::{self, MethodParameters, ValuationConfig};

/// Pure valuation over already-fetched inputs.
#[derive(Debug, Clone, Default)]
pub struct ValuationCalculator {
    pub config: ValuationConfig,
}

impl ValuationCalculator {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    pub fn value_scenario(
        &self,
        inputs: &ValuationInputs,
        method: ValuationMethod,
        scenario: Scenario,
    ) -> Result<ScenarioValuation, AnalysisError> {
        let parameters = self.config.parameters(method, scenario);
        let outcome: MethodOutcome = match &parameters {
            MethodParameters::Dcf(p) => methods::discounted_cash_flow(inputs, p)?,
            MethodParameters::Comparables(p) => methods::comparables(inputs, p)?,
            MethodParameters::AssetBased(p) => methods::asset_based(inputs, p)?,
            MethodParameters::Ddm(p) => methods::dividend_discount(inputs, p)?,
            MethodParameters::Rim(p) => methods::residual_income(inputs, p)?,
        };

        let value = outcome.fair_value_per_share;
        let band = value.abs() * params::range_pct(method);
        Ok(ScenarioValuation {
            method,
            scenario,
            intrinsic_value: value,
            fair_value_low: value - band,
            fair_value_high: value + band,
            confidence: params::confidence(method, scenario),
            parameters,
            assumptions: outcome.assumptions,
            enterprise_value: outcome.enterprise_value,
            equity_value: outcome.equity_value,
        })
    }

    pub fn value_triple(
        &self,
        inputs: &ValuationInputs,
        method: ValuationMethod,
    ) -> Result<ScenarioTriple, AnalysisError> {
        Ok(ScenarioTriple {
            bull: self.value_scenario(inputs, method, Scenario::Bull)?,
            base: self.value_scenario(inputs, method, Scenario::Base)?,
            bear: self.value_scenario(inputs, method, Scenario::Bear)?,
        })
    }

    pub fn value_inputs(
        &self,
        inputs: &ValuationInputs,
        symbol: &str,
        valuation_date: NaiveDate,
    ) -> Result<MultiMethodValuation, AnalysisError> {
        Ok(MultiMethodValuation {
            company_id: inputs.company_id.clone(),
            symbol: symbol.to_string(),
            valuation_date,
            current_price: inputs.current_price,
            dcf: self.value_triple(inputs, ValuationMethod::Dcf)?,
            comparables: self.value_triple(inputs, ValuationMethod::Comparables)?,
            asset_based: self.value_triple(inputs, ValuationMethod::AssetBased)?,
            ddm: self.value_triple(inputs, ValuationMethod::Ddm)?,
            rim: self.value_triple(inputs, ValuationMethod::Rim)?,
        })
    }

    /// All five methods under all three scenarios.
    pub fn value_all(
        &self,
        company_id: &str,
        symbol: &str,
        valuation_date: NaiveDate,
        statements: &StatementSet,
    ) -> Result<MultiMethodValuation, AnalysisError> {
        let inputs = ValuationInputs::from_statements(company_id, statements)?;
        self.value_inputs(&inputs, symbol, valuation_date)
    }

    /// Base case of a single method.
    pub fn value_method(
        &self,
        company_id: &str,
        valuation_date: NaiveDate,
        method: ValuationMethod,
        statements: &StatementSet,
    ) -> Result<Valuation, AnalysisError> {
        let inputs = ValuationInputs::from_statements(company_id, statements)?;
        let base = self.value_scenario(&inputs, method, Scenario::Base)?;
        Ok(Valuation {
            company_id: company_id.to_string(),
            valuation_date,
            current_price: inputs.current_price,
            upside_pct: upside_pct(inputs.current_price, base.intrinsic_value),
            base,
        })
    }
}

/// Store-backed valuation. Inputs are fetched once per request and shared
/// by every method and scenario.
pub struct ValuationEngine {
    statements: Arc<dyn StatementStore>,
    market: Arc<dyn MarketDataStore>,
    calculator: ValuationCalculator,
}

impl ValuationEngine {
    pub fn new(statements: Arc<dyn StatementStore>, market: Arc<dyn MarketDataStore>) -> Self {
        Self {
            statements,
            market,
            calculator: ValuationCalculator::default(),
        }
    }

    pub fn with_config(mut self, config: ValuationConfig) -> Self {
        self.calculator = ValuationCalculator::new(config);
        self
    }

    pub fn calculator(&self) -> &ValuationCalculator {
        &self.calculator
    }

    /// Latest income, balance, cash flow and price as of `as_of`.
    pub async fn load_inputs(
        &self,
        tenant: &TenantId,
        company_id: &str,
        as_of: NaiveDate,
    ) -> Result<StatementSet, AnalysisError> {
        let (income, balance, cash_flow, market) = tokio::try_join!(
            self.statements.latest_income(tenant, company_id, as_of),
            self.statements.latest_balance(tenant, company_id, as_of),
            self.statements.latest_cash_flow(tenant, company_id, as_of),
            self.market.get_latest(tenant, company_id, as_of),
        )?;
        debug!(
            tenant = %tenant,
            company_id,
            income = income.is_some(),
            balance = balance.is_some(),
            cash_flow = cash_flow.is_some(),
            price = market.is_some(),
            "Loaded valuation inputs"
        );
        Ok(StatementSet {
            income,
            balance,
            cash_flow,
            market,
            ..Default::default()
        })
    }

    pub async fn value_all(
        &self,
        tenant: &TenantId,
        company: &Company,
        as_of: NaiveDate,
    ) -> Result<MultiMethodValuation, AnalysisError> {
        let statements = self.load_inputs(tenant, &company.id, as_of).await?;
        let valuation = self
            .calculator
            .value_all(&company.id, &company.symbol, as_of, &statements)?;
        info!(
            tenant = %tenant,
            company_id = %company.id,
            consensus = valuation.consensus_valuation(),
            "Multi-method valuation complete"
        );
        Ok(valuation)
    }

    pub async fn value_method(
        &self,
        tenant: &TenantId,
        company_id: &str,
        method: ValuationMethod,
        as_of: NaiveDate,
    ) -> Result<Valuation, AnalysisError> {
        let statements = self.load_inputs(tenant, company_id, as_of).await?;
        let valuation = self
            .calculator
            .value_method(company_id, as_of, method, &statements)?;
        info!(
            tenant = %tenant,
            company_id,
            method = method.as_str(),
            fair_value = valuation.base.intrinsic_value,
            "Valuation complete"
        );
        Ok(valuation)
    }
}
