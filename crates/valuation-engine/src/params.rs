//! Per-method, per-scenario parameter tables.
//!
//! Every method's parameters are a typed struct. They only become a
//! schema-less map when written to the result store.

use analysis_core::{Scenario, ValuationMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Base rates the scenario tables are built around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    pub base_wacc: f64,
    pub projection_years: u32,
    pub ddm_required_return: f64,
    pub ddm_payout_ratio: f64,
    pub rim_cost_of_equity: f64,
    pub rim_horizon_years: u32,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            base_wacc: 0.10,
            projection_years: 5,
            ddm_required_return: 0.12,
            ddm_payout_ratio: 0.40,
            rim_cost_of_equity: 0.12,
            rim_horizon_years: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcfParams {
    pub growth_rate: f64,
    pub terminal_growth: f64,
    pub wacc: f64,
    pub projection_years: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparablesParams {
    pub pe_multiple: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetBasedParams {
    pub adjustment_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DdmParams {
    pub dividend_growth: f64,
    pub required_return: f64,
    pub payout_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RimParams {
    pub roe_premium: f64,
    pub cost_of_equity: f64,
    pub horizon_years: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodParameters {
    Dcf(DcfParams),
    Comparables(ComparablesParams),
    AssetBased(AssetBasedParams),
    Ddm(DdmParams),
    Rim(RimParams),
}

impl MethodParameters {
    pub fn method(&self) -> ValuationMethod {
        match self {
            MethodParameters::Dcf(_) => ValuationMethod::Dcf,
            MethodParameters::Comparables(_) => ValuationMethod::Comparables,
            MethodParameters::AssetBased(_) => ValuationMethod::AssetBased,
            MethodParameters::Ddm(_) => ValuationMethod::Ddm,
            MethodParameters::Rim(_) => ValuationMethod::Rim,
        }
    }

    /// Flattened form stored alongside a valuation record.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

impl ValuationConfig {
    pub fn dcf(&self, scenario: Scenario) -> DcfParams {
        let (growth_rate, terminal_growth, wacc_adjustment) = match scenario {
            Scenario::Bull => (0.15, 0.04, -0.01),
            Scenario::Base => (0.10, 0.025, 0.0),
            Scenario::Bear => (0.05, 0.015, 0.02),
        };
        DcfParams {
            growth_rate,
            terminal_growth,
            wacc: self.base_wacc + wacc_adjustment,
            projection_years: self.projection_years,
        }
    }

    pub fn comparables(&self, scenario: Scenario) -> ComparablesParams {
        let pe_multiple = match scenario {
            Scenario::Bull => 18.0,
            Scenario::Base => 15.0,
            Scenario::Bear => 12.0,
        };
        ComparablesParams { pe_multiple }
    }

    pub fn asset_based(&self, scenario: Scenario) -> AssetBasedParams {
        let adjustment_factor = match scenario {
            Scenario::Bull => 1.15,
            Scenario::Base => 1.00,
            Scenario::Bear => 0.85,
        };
        AssetBasedParams { adjustment_factor }
    }

    pub fn ddm(&self, scenario: Scenario) -> DdmParams {
        let dividend_growth = match scenario {
            Scenario::Bull => 0.08,
            Scenario::Base => 0.05,
            Scenario::Bear => 0.02,
        };
        DdmParams {
            dividend_growth,
            required_return: self.ddm_required_return,
            payout_ratio: self.ddm_payout_ratio,
        }
    }

    pub fn rim(&self, scenario: Scenario) -> RimParams {
        let roe_premium = match scenario {
            Scenario::Bull => 0.05,
            Scenario::Base => 0.0,
            Scenario::Bear => -0.03,
        };
        RimParams {
            roe_premium,
            cost_of_equity: self.rim_cost_of_equity,
            horizon_years: self.rim_horizon_years,
        }
    }

    pub fn parameters(&self, method: ValuationMethod, scenario: Scenario) -> MethodParameters {
        match method {
            ValuationMethod::Dcf => MethodParameters::Dcf(self.dcf(scenario)),
            ValuationMethod::Comparables => {
                MethodParameters::Comparables(self.comparables(scenario))
            }
            ValuationMethod::AssetBased => MethodParameters::AssetBased(self.asset_based(scenario)),
            ValuationMethod::Ddm => MethodParameters::Ddm(self.ddm(scenario)),
            ValuationMethod::Rim => MethodParameters::Rim(self.rim(scenario)),
        }
    }
}

/// Confidence attached to each scenario of a method.
pub fn confidence(method: ValuationMethod, scenario: Scenario) -> f64 {
    let (bull, base, bear) = match method {
        ValuationMethod::Dcf => (0.65, 0.80, 0.60),
        ValuationMethod::Comparables => (0.70, 0.85, 0.65),
        ValuationMethod::AssetBased => (0.60, 0.75, 0.55),
        ValuationMethod::Ddm => (0.65, 0.80, 0.60),
        ValuationMethod::Rim => (0.70, 0.85, 0.65),
    };
    match scenario {
        Scenario::Bull => bull,
        Scenario::Base => base,
        Scenario::Bear => bear,
    }
}

/// Half-width of the fair-value band around a point estimate, as a fraction.
pub fn range_pct(method: ValuationMethod) -> f64 {
    match method {
        ValuationMethod::Dcf => 0.10,
        ValuationMethod::Comparables => 0.12,
        ValuationMethod::AssetBased => 0.08,
        ValuationMethod::Ddm => 0.10,
        ValuationMethod::Rim => 0.12,
    }
}
