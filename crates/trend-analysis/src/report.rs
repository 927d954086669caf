use analysis_core::math::mean;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::{
    anomalies, moving_averages, seasonality, Anomaly, MovingAverages, Seasonality,
    DEFAULT_ANOMALY_THRESHOLD,
};
use crate::regression::{
    annualized_growth_pct, cagr, linear_regression, DirectionTier, Regression, TrendDirection,
    TrendQuality, MIN_TREND_POINTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStatus {
    Ok,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub metric: String,
    pub status: TrendStatus,
    pub points: Vec<TrendPoint>,
    pub regression: Option<Regression>,
    pub trend: Option<TrendDirection>,
    pub annualized_growth_pct: Option<f64>,
    pub quality: Option<TrendQuality>,
    pub direction: Option<DirectionTier>,
    pub cagr: Option<f64>,
    pub moving_averages: MovingAverages,
    pub anomalies: Vec<Anomaly>,
    pub seasonality: Option<Seasonality>,
}

impl TrendReport {
    /// Placeholder report for series too short to fit.
    pub fn insufficient(metric: impl Into<String>, points: Vec<TrendPoint>) -> Self {
        Self {
            metric: metric.into(),
            status: TrendStatus::InsufficientData,
            points,
            regression: None,
            trend: None,
            annualized_growth_pct: None,
            quality: None,
            direction: None,
            cagr: None,
            moving_averages: MovingAverages::default(),
            anomalies: vec![],
            seasonality: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrendOptions {
    pub anomaly_threshold: f64,
    /// Run the lag-4 seasonality check (quarterly series only).
    pub quarterly: bool,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            quarterly: false,
        }
    }
}

/// Full trend report over dated points. `x` is the day offset from the first point.
pub fn analyze_series(
    metric: impl Into<String>,
    mut points: Vec<TrendPoint>,
    options: TrendOptions,
) -> TrendReport {
    let metric = metric.into();
    points.sort_by_key(|p| p.date);
    if points.len() < MIN_TREND_POINTS {
        return TrendReport::insufficient(metric, points);
    }

    let first = points[0].date;
    let x: Vec<f64> = points
        .iter()
        .map(|p| (p.date - first).num_days() as f64)
        .collect();
    let y: Vec<f64> = points.iter().map(|p| p.value).collect();

    let Some(regression) = linear_regression(&x, &y) else {
        return TrendReport::insufficient(metric, points);
    };

    let growth = mean(&y).and_then(|m| annualized_growth_pct(regression.slope, m));
    let span_years = x[x.len() - 1] / 365.25;
    let compound = cagr(y[0], y[y.len() - 1], span_years);

    TrendReport {
        metric,
        status: TrendStatus::Ok,
        regression: Some(regression),
        trend: Some(TrendDirection::classify(&regression)),
        annualized_growth_pct: growth,
        quality: Some(TrendQuality::from_r_squared(regression.r_squared)),
        direction: growth.map(DirectionTier::from_growth_pct),
        cagr: compound,
        moving_averages: moving_averages(&y),
        anomalies: anomalies(&y, options.anomaly_threshold),
        seasonality: if options.quarterly { seasonality(&y) } else { None },
        points,
    }
}
