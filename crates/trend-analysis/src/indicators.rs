use analysis_core::math::{mean, population_std};
use serde::{Deserialize, Serialize};

pub const SHORT_WINDOW: usize = 50;
pub const LONG_WINDOW: usize = 200;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len() - period + 1);
    result.push(data[..period].iter().sum::<f64>() / period as f64);

    for value in &data[period..] {
        let prev = result[result.len() - 1];
        result.push((value - prev) * multiplier + prev);
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossSignal {
    GoldenCross,
    DeathCross,
}

/// Latest 50/200-period averages. Each is `None` until enough points exist.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_50: Option<f64>,
    pub ema_200: Option<f64>,
    pub cross: Option<CrossSignal>,
}

pub fn moving_averages(data: &[f64]) -> MovingAverages {
    let sma_50 = sma(data, SHORT_WINDOW).last().copied();
    let sma_200 = sma(data, LONG_WINDOW).last().copied();
    let cross = match (sma_50, sma_200) {
        (Some(short), Some(long)) if short > long => Some(CrossSignal::GoldenCross),
        (Some(short), Some(long)) if short < long => Some(CrossSignal::DeathCross),
        _ => None,
    };
    MovingAverages {
        sma_50,
        sma_200,
        ema_50: ema(data, SHORT_WINDOW).last().copied(),
        ema_200: ema(data, LONG_WINDOW).last().copied(),
        cross,
    }
}

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
}

/// Points whose z-score (population std) against the series exceeds
/// `threshold` in magnitude.
pub fn anomalies(data: &[f64], threshold: f64) -> Vec<Anomaly> {
    if data.len() < 3 {
        return vec![];
    }
    let (Some(m), Some(sd)) = (mean(data), population_std(data)) else {
        return vec![];
    };
    if sd == 0.0 {
        return vec![];
    }

    data.iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let z_score = (value - m) / sd;
            (z_score.abs() > threshold).then_some(Anomaly {
                index,
                value: *value,
                z_score,
            })
        })
        .collect()
}

const SEASONAL_LAG: usize = 4;
const SEASONALITY_MIN_POINTS: usize = 8;
const SEASONALITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub autocorrelation: f64,
    pub present: bool,
    pub strength: f64,
}

/// Autocorrelation of `data` at `lag`.
pub fn autocorrelation(data: &[f64], lag: usize) -> Option<f64> {
    if lag == 0 || data.len() <= lag {
        return None;
    }
    let m = mean(data)?;
    let denominator: f64 = data.iter().map(|v| (v - m).powi(2)).sum();
    if denominator == 0.0 {
        return None;
    }
    let numerator: f64 = data
        .windows(lag + 1)
        .map(|w| (w[0] - m) * (w[lag] - m))
        .sum();
    Some(numerator / denominator)
}

/// Lag-4 seasonality for quarterly series.
pub fn seasonality(data: &[f64]) -> Option<Seasonality> {
    if data.len() < SEASONALITY_MIN_POINTS {
        return None;
    }
    let ac = autocorrelation(data, SEASONAL_LAG)?;
    Some(Seasonality {
        autocorrelation: ac,
        present: ac.abs() > SEASONALITY_THRESHOLD,
        strength: ac.abs(),
    })
}
