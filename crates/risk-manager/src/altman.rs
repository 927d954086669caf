//! Altman Z-Score bankruptcy predictor.

use analysis_core::{BalanceSheet, IncomeStatement};
use serde::{Deserialize, Serialize};

pub const SAFE_ZONE_THRESHOLD: f64 = 2.99;
pub const DISTRESS_ZONE_THRESHOLD: f64 = 1.81;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltmanZone {
    SafeZone,
    GreyZone,
    DistressZone,
}

impl AltmanZone {
    pub fn from_score(z: f64) -> Self {
        if z > SAFE_ZONE_THRESHOLD {
            AltmanZone::SafeZone
        } else if z > DISTRESS_ZONE_THRESHOLD {
            AltmanZone::GreyZone
        } else {
            AltmanZone::DistressZone
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AltmanZone::SafeZone => "safe_zone",
            AltmanZone::GreyZone => "grey_zone",
            AltmanZone::DistressZone => "distress_zone",
        }
    }

    pub fn risk_level(&self) -> &'static str {
        match self {
            AltmanZone::SafeZone => "low",
            AltmanZone::GreyZone => "moderate",
            AltmanZone::DistressZone => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltmanComponents {
    /// Working capital / total assets
    pub x1: f64,
    /// Retained earnings / total assets
    pub x2: f64,
    /// EBIT / total assets
    pub x3: f64,
    /// Market value of equity / total liabilities
    pub x4: f64,
    /// Revenue / total assets
    pub x5: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltmanZScore {
    pub z_score: f64,
    pub components: AltmanComponents,
    pub zone: AltmanZone,
    /// True when X4 used book equity because no market cap was available.
    pub used_book_equity: bool,
}

/// Component ratio where a zero or missing denominator contributes 0.
fn component(numerator: Option<f64>, denominator: Option<f64>) -> f64 {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => n / d,
        _ => 0.0,
    }
}

/// `Z = 1.2·X1 + 1.4·X2 + 3.3·X3 + 0.6·X4 + 1.0·X5`.
///
/// Missing line items and zero denominators make the affected component 0
/// instead of voiding the score. Returns `None` only when total assets were
/// never booked.
pub fn altman_z_score(
    balance: &BalanceSheet,
    income: &IncomeStatement,
    market_cap: Option<f64>,
) -> Option<AltmanZScore> {
    let total_assets = balance.total_assets?;
    let assets = Some(total_assets);

    let (equity_value, used_book_equity) = match market_cap {
        Some(cap) => (Some(cap), false),
        None => (balance.total_equity, true),
    };

    let components = AltmanComponents {
        x1: component(balance.working_capital(), assets),
        x2: component(balance.retained_earnings, assets),
        x3: component(income.ebit_or_operating(), assets),
        x4: component(equity_value, balance.total_liabilities),
        x5: component(income.revenue, assets),
    };

    let z_score = 1.2 * components.x1
        + 1.4 * components.x2
        + 3.3 * components.x3
        + 0.6 * components.x4
        + 1.0 * components.x5;

    Some(AltmanZScore {
        z_score,
        components,
        zone: AltmanZone::from_score(z_score),
        used_book_equity,
    })
}
