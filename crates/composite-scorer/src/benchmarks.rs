//! Piecewise-linear maps from a raw metric to a 0-100 sub-score.

use fundamental_analysis::RatioName;
use serde::{Deserialize, Serialize};

use crate::weights::Dimension;

/// Where a sub-score reads its raw value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Ratio(RatioName),
    /// Consensus valuation discount, percent.
    ConsensusDiscount,
    /// `100 − overall risk` of the neutral scenario.
    InverseRisk,
    AltmanZ,
    Beta,
    Volatility90d,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Ratio(r) => r.as_str(),
            Metric::ConsensusDiscount => "consensus_discount",
            Metric::InverseRisk => "inverse_risk",
            Metric::AltmanZ => "altman_z_score",
            Metric::Beta => "beta",
            Metric::Volatility90d => "volatility_90d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// 0 at or below `zero_at`, 100 at or above `full_at`.
    HigherIsBetter { zero_at: f64, full_at: f64 },
    /// 100 at or below `full_at`, 0 at or above `zero_at`.
    LowerIsBetter { full_at: f64, zero_at: f64 },
}

impl Curve {
    pub fn score(&self, value: f64) -> f64 {
        let (from, to, rising) = match *self {
            Curve::HigherIsBetter { zero_at, full_at } => (zero_at, full_at, true),
            Curve::LowerIsBetter { full_at, zero_at } => (full_at, zero_at, false),
        };
        let t = ((value - from) / (to - from)).clamp(0.0, 1.0);
        if rising {
            t * 100.0
        } else {
            (1.0 - t) * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub metric: Metric,
    pub curve: Curve,
}

const fn higher(metric: Metric, zero_at: f64, full_at: f64) -> Benchmark {
    Benchmark {
        metric,
        curve: Curve::HigherIsBetter { zero_at, full_at },
    }
}

const fn lower(metric: Metric, full_at: f64, zero_at: f64) -> Benchmark {
    Benchmark {
        metric,
        curve: Curve::LowerIsBetter { full_at, zero_at },
    }
}

const VALUATION: [Benchmark; 5] = [
    lower(Metric::Ratio(RatioName::PriceToEarnings), 15.0, 45.0),
    lower(Metric::Ratio(RatioName::PriceToBook), 1.0, 5.0),
    lower(Metric::Ratio(RatioName::EvToEbitda), 8.0, 25.0),
    lower(Metric::Ratio(RatioName::PegRatio), 1.0, 3.0),
    lower(Metric::ConsensusDiscount, -30.0, 30.0),
];

const PROFITABILITY: [Benchmark; 4] = [
    higher(Metric::Ratio(RatioName::ReturnOnEquity), 0.05, 0.20),
    higher(Metric::Ratio(RatioName::ReturnOnAssets), 0.01, 0.10),
    higher(Metric::Ratio(RatioName::NetMargin), 0.0, 0.20),
    higher(Metric::Ratio(RatioName::OperatingMargin), 0.0, 0.25),
];

const GROWTH: [Benchmark; 4] = [
    higher(Metric::Ratio(RatioName::RevenueGrowth), -0.05, 0.20),
    higher(Metric::Ratio(RatioName::EpsGrowth), -0.10, 0.25),
    higher(Metric::Ratio(RatioName::NetIncomeGrowth), -0.10, 0.25),
    higher(Metric::Ratio(RatioName::EquityGrowth), 0.0, 0.15),
];

const FINANCIAL_HEALTH: [Benchmark; 4] = [
    higher(Metric::Ratio(RatioName::CurrentRatio), 0.5, 2.0),
    lower(Metric::Ratio(RatioName::DebtToEquity), 0.3, 2.5),
    higher(Metric::Ratio(RatioName::InterestCoverage), 1.0, 8.0),
    higher(Metric::Ratio(RatioName::OcfToNetIncome), 0.5, 1.2),
];

const RISK: [Benchmark; 4] = [
    higher(Metric::InverseRisk, 0.0, 100.0),
    higher(Metric::AltmanZ, 1.81, 2.99),
    lower(Metric::Beta, 0.8, 2.0),
    lower(Metric::Volatility90d, 0.15, 0.60),
];

pub fn benchmarks(dimension: Dimension) -> &'static [Benchmark] {
    match dimension {
        Dimension::Valuation => &VALUATION,
        Dimension::Profitability => &PROFITABILITY,
        Dimension::Growth => &GROWTH,
        Dimension::FinancialHealth => &FINANCIAL_HEALTH,
        Dimension::Risk => &RISK,
    }
}
