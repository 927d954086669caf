//! Price-series risk metrics: beta, volatility, parametric VaR.

use analysis_core::math::daily_returns;
use analysis_core::{AnalysisError, MarketDataPoint};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_BETA_WINDOW: usize = 252;
pub const MIN_BETA_OBSERVATIONS: usize = 30;
pub const MIN_VOLATILITY_PRICES: usize = 10;
pub const MIN_VOLATILITY_RETURNS: usize = 5;
pub const MIN_VAR_PRICES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "0.95")]
    Pct95,
    #[serde(rename = "0.99")]
    Pct99,
}

impl ConfidenceLevel {
    pub fn z_score(&self) -> f64 {
        match self {
            ConfidenceLevel::Pct95 => 1.65,
            ConfidenceLevel::Pct99 => 2.33,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ConfidenceLevel::Pct95 => 0.95,
            ConfidenceLevel::Pct99 => 0.99,
        }
    }
}

impl TryFrom<f64> for ConfidenceLevel {
    type Error = AnalysisError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (value - 0.95).abs() < 1e-9 {
            Ok(ConfidenceLevel::Pct95)
        } else if (value - 0.99).abs() < 1e-9 {
            Ok(ConfidenceLevel::Pct99)
        } else {
            Err(AnalysisError::invalid(format!(
                "confidence level {value} not supported, use 0.95 or 0.99"
            )))
        }
    }
}

/// Covariance of stock and market returns over the variance of market
/// returns. Series are aligned on date and trimmed to the trailing `window`
/// returns. Needs at least 30 paired returns.
pub fn beta(
    stock: &[MarketDataPoint],
    market: &[MarketDataPoint],
    window: usize,
) -> Option<f64> {
    let market_by_date: HashMap<_, f64> = market.iter().map(|p| (p.date, p.price())).collect();

    let mut paired: Vec<(chrono::NaiveDate, f64, f64)> = stock
        .iter()
        .filter_map(|p| market_by_date.get(&p.date).map(|m| (p.date, p.price(), *m)))
        .collect();
    paired.sort_by_key(|(date, _, _)| *date);

    let start = paired.len().saturating_sub(window + 1);
    let paired = &paired[start..];

    let mut stock_returns = Vec::with_capacity(paired.len());
    let mut market_returns = Vec::with_capacity(paired.len());
    for pair in paired.windows(2) {
        let (_, s0, m0) = pair[0];
        let (_, s1, m1) = pair[1];
        if s0 > 0.0 && m0 > 0.0 {
            stock_returns.push(s1 / s0 - 1.0);
            market_returns.push(m1 / m0 - 1.0);
        }
    }

    beta_from_returns(&stock_returns, &market_returns)
}

pub fn beta_from_returns(stock_returns: &[f64], market_returns: &[f64]) -> Option<f64> {
    let n = stock_returns.len().min(market_returns.len());
    if n < MIN_BETA_OBSERVATIONS {
        return None;
    }
    let stock = &stock_returns[stock_returns.len() - n..];
    let bench = &market_returns[market_returns.len() - n..];

    let stock_mean = stock.mean();
    let bench_mean = bench.mean();

    let mut covariance = 0.0;
    let mut bench_variance = 0.0;
    for i in 0..n {
        let stock_diff = stock[i] - stock_mean;
        let bench_diff = bench[i] - bench_mean;
        covariance += stock_diff * bench_diff;
        bench_variance += bench_diff * bench_diff;
    }

    if bench_variance == 0.0 {
        return None;
    }
    let beta = covariance / bench_variance;
    beta.is_finite().then_some(beta)
}

/// Annualized standard deviation of daily returns over the trailing
/// `window_days` prices.
pub fn volatility(prices: &[f64], window_days: usize) -> Option<f64> {
    let start = prices.len().saturating_sub(window_days);
    let window = &prices[start..];
    if window.len() < MIN_VOLATILITY_PRICES {
        return None;
    }
    let returns = daily_returns(window);
    if returns.len() < MIN_VOLATILITY_RETURNS {
        return None;
    }
    let vol = returns.std_dev() * TRADING_DAYS_PER_YEAR.sqrt();
    vol.is_finite().then_some(vol)
}

/// One-day parametric VaR as a return: `mean − z·stddev`.
pub fn value_at_risk(prices: &[f64], confidence: ConfidenceLevel) -> Option<f64> {
    if prices.len() < MIN_VAR_PRICES {
        return None;
    }
    let returns = daily_returns(prices);
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().mean();
    let std_dev = returns.iter().std_dev();
    parametric_var(mean, std_dev, confidence)
}

pub fn parametric_var(mean: f64, std_dev: f64, confidence: ConfidenceLevel) -> Option<f64> {
    let var = mean - confidence.z_score() * std_dev;
    var.is_finite().then_some(var)
}

/// Adjusted closes in date order.
pub fn closing_prices(points: &[MarketDataPoint]) -> Vec<f64> {
    let mut sorted: Vec<&MarketDataPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.date);
    sorted.iter().map(|p| p.price()).collect()
}
