//! Intrinsic value under five methods (DCF, comparables, asset-based,
//! dividend discount, residual income), each run for bull, base and bear
//! scenarios.

pub mod engine;
pub mod methods;
pub mod model;
pub mod params;

#[cfg(test)]
mod engine_tests;

pub use engine::{ValuationCalculator, ValuationEngine};
pub use methods::{terminal_value, MethodOutcome, ValuationInputs};
pub use model::{upside_pct, MultiMethodValuation, ScenarioTriple, ScenarioValuation, Valuation};
pub use params::{MethodParameters, ValuationConfig};
