//! The five valuation models. Each one turns shared inputs plus one
//! scenario's parameters into a per-share fair value.

use analysis_core::{AnalysisError, StatementSet};
use serde_json::{json, Map, Value};

use crate::params::{AssetBasedParams, ComparablesParams, DcfParams, DdmParams, RimParams};

/// Inputs fetched once and shared by every method and scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationInputs {
    pub company_id: String,
    pub shares_outstanding: f64,
    pub eps: f64,
    pub net_income: f64,
    pub book_equity: f64,
    /// Operating cash flow plus (negative) capex.
    pub base_fcf: f64,
    /// Total debt minus cash and short-term investments.
    pub net_debt: f64,
    pub current_price: Option<f64>,
}

impl ValuationInputs {
    /// Extracts the shared inputs. Any missing statement or line item that
    /// a method cannot do without fails the whole extraction.
    pub fn from_statements(company_id: &str, set: &StatementSet) -> Result<Self, AnalysisError> {
        let missing = |kind: &str| AnalysisError::missing(company_id, kind);

        let income = set.income.as_ref().ok_or_else(|| missing("income statement"))?;
        let balance = set.balance.as_ref().ok_or_else(|| missing("balance sheet"))?;
        let cash_flow = set
            .cash_flow
            .as_ref()
            .ok_or_else(|| missing("cash flow statement"))?;

        let shares_outstanding = set
            .shares_outstanding()
            .filter(|s| *s > 0.0)
            .ok_or_else(|| missing("shares outstanding"))?;
        let net_income = income.net_income.ok_or_else(|| missing("net income"))?;
        let eps = income.eps().unwrap_or(net_income / shares_outstanding);
        let book_equity = balance
            .total_equity
            .ok_or_else(|| missing("total equity"))?;
        let base_fcf = cash_flow
            .free_cash_flow()
            .ok_or_else(|| missing("operating cash flow"))?;
        let net_debt =
            balance.total_debt().unwrap_or(0.0) - balance.liquid_assets().unwrap_or(0.0);

        Ok(Self {
            company_id: company_id.to_string(),
            shares_outstanding,
            eps,
            net_income,
            book_equity,
            base_fcf,
            net_debt,
            current_price: set.price(),
        })
    }
}

/// Raw output of one method for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutcome {
    pub fair_value_per_share: f64,
    pub enterprise_value: Option<f64>,
    pub equity_value: Option<f64>,
    pub assumptions: Map<String, Value>,
}

fn finite(value: f64, what: &str) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::invalid(format!("{what} is not finite")))
    }
}

/// Gordon growth terminal value: `FCF · (1 + g) / (WACC − g)`.
pub fn terminal_value(final_fcf: f64, growth: f64, wacc: f64) -> Result<f64, AnalysisError> {
    if wacc <= growth {
        return Err(AnalysisError::invalid(format!(
            "WACC {wacc} must exceed terminal growth {growth}"
        )));
    }
    finite(final_fcf * (1.0 + growth) / (wacc - growth), "terminal value")
}

pub fn discounted_cash_flow(
    inputs: &ValuationInputs,
    p: &DcfParams,
) -> Result<MethodOutcome, AnalysisError> {
    let mut projected = Vec::with_capacity(p.projection_years as usize);
    let mut pv_fcf = 0.0;
    let mut fcf = inputs.base_fcf;
    for year in 1..=p.projection_years {
        fcf *= 1.0 + p.growth_rate;
        pv_fcf += fcf / (1.0 + p.wacc).powi(year as i32);
        projected.push(fcf);
    }

    let terminal = terminal_value(fcf, p.terminal_growth, p.wacc)?;
    let pv_terminal = terminal / (1.0 + p.wacc).powi(p.projection_years as i32);
    let enterprise_value = pv_fcf + pv_terminal;
    let equity_value = enterprise_value - inputs.net_debt;
    let per_share = finite(equity_value / inputs.shares_outstanding, "DCF fair value")?;

    let mut assumptions = Map::new();
    assumptions.insert("base_fcf".into(), json!(inputs.base_fcf));
    assumptions.insert("projected_fcf".into(), json!(projected));
    assumptions.insert("pv_projected_fcf".into(), json!(pv_fcf));
    assumptions.insert("terminal_value".into(), json!(terminal));
    assumptions.insert("pv_terminal_value".into(), json!(pv_terminal));
    assumptions.insert("net_debt".into(), json!(inputs.net_debt));

    Ok(MethodOutcome {
        fair_value_per_share: per_share,
        enterprise_value: Some(enterprise_value),
        equity_value: Some(equity_value),
        assumptions,
    })
}

pub fn comparables(
    inputs: &ValuationInputs,
    p: &ComparablesParams,
) -> Result<MethodOutcome, AnalysisError> {
    let per_share = finite(inputs.eps * p.pe_multiple, "comparables fair value")?;
    let mut assumptions = Map::new();
    assumptions.insert("eps".into(), json!(inputs.eps));
    Ok(MethodOutcome {
        fair_value_per_share: per_share,
        enterprise_value: None,
        equity_value: Some(per_share * inputs.shares_outstanding),
        assumptions,
    })
}

pub fn asset_based(
    inputs: &ValuationInputs,
    p: &AssetBasedParams,
) -> Result<MethodOutcome, AnalysisError> {
    let equity_value = inputs.book_equity * p.adjustment_factor;
    let per_share = finite(equity_value / inputs.shares_outstanding, "asset-based fair value")?;
    let mut assumptions = Map::new();
    assumptions.insert("book_equity".into(), json!(inputs.book_equity));
    Ok(MethodOutcome {
        fair_value_per_share: per_share,
        enterprise_value: None,
        equity_value: Some(equity_value),
        assumptions,
    })
}

/// Gordon growth on an estimated dividend: `D1 / (r − g)`.
pub fn dividend_discount(
    inputs: &ValuationInputs,
    p: &DdmParams,
) -> Result<MethodOutcome, AnalysisError> {
    if p.required_return <= p.dividend_growth {
        return Err(AnalysisError::invalid(format!(
            "required return {} must exceed dividend growth {}",
            p.required_return, p.dividend_growth
        )));
    }
    let dps = inputs.net_income * p.payout_ratio / inputs.shares_outstanding;
    let d1 = dps * (1.0 + p.dividend_growth);
    let per_share = finite(d1 / (p.required_return - p.dividend_growth), "DDM fair value")?;

    let mut assumptions = Map::new();
    assumptions.insert("dividend_per_share".into(), json!(dps));
    assumptions.insert("next_dividend".into(), json!(d1));
    Ok(MethodOutcome {
        fair_value_per_share: per_share,
        enterprise_value: None,
        equity_value: Some(per_share * inputs.shares_outstanding),
        assumptions,
    })
}

/// Book value plus the discounted residual income earned over the horizon.
pub fn residual_income(
    inputs: &ValuationInputs,
    p: &RimParams,
) -> Result<MethodOutcome, AnalysisError> {
    if inputs.book_equity == 0.0 {
        return Err(AnalysisError::missing(
            &inputs.company_id,
            "non-zero book equity for residual income",
        ));
    }
    let current_roe = inputs.net_income / inputs.book_equity;
    let adjusted_roe = current_roe + p.roe_premium;
    let annual_residual = (adjusted_roe - p.cost_of_equity) * inputs.book_equity;
    let pv_residual: f64 = (1..=p.horizon_years)
        .map(|year| annual_residual / (1.0 + p.cost_of_equity).powi(year as i32))
        .sum();
    let equity_value = inputs.book_equity + pv_residual;
    let per_share = finite(equity_value / inputs.shares_outstanding, "RIM fair value")?;

    let mut assumptions = Map::new();
    assumptions.insert("current_roe".into(), json!(current_roe));
    assumptions.insert("adjusted_roe".into(), json!(adjusted_roe));
    assumptions.insert("annual_residual_income".into(), json!(annual_residual));
    assumptions.insert("pv_residual_income".into(), json!(pv_residual));
    Ok(MethodOutcome {
        fair_value_per_share: per_share,
        enterprise_value: None,
        equity_value: Some(equity_value),
        assumptions,
    })
}
