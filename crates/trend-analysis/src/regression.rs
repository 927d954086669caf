use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

pub const MIN_TREND_POINTS: usize = 3;
const SIGNIFICANCE: f64 = 0.05;
const DAYS_PER_YEAR: f64 = 365.25;

/// Ordinary least squares fit of `y` on `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope under a t-test with `n - 2` degrees of freedom.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_error: f64,
    pub n: usize,
}

pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<Regression> {
    let n = x.len();
    if n != y.len() || n < MIN_TREND_POINTS {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    let syy: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - (intercept + slope * a)).powi(2))
        .sum();
    let r_squared = if syy == 0.0 { 0.0 } else { (1.0 - sse / syy).max(0.0) };

    let dof = nf - 2.0;
    let std_error = (sse / dof / sxx).sqrt();
    let p_value = if std_error == 0.0 {
        if slope == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        let t = slope / std_error;
        match StudentsT::new(0.0, 1.0, dof) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
            Err(_) => 1.0,
        }
    };

    Some(Regression {
        slope,
        intercept,
        r_squared,
        p_value,
        std_error,
        n,
    })
}

/// Regression over `0..n`.
pub fn indexed_regression(y: &[f64]) -> Option<Regression> {
    let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    linear_regression(&x, y)
}

/// Compound annual growth rate; `None` unless start, end and years are all positive.
pub fn cagr(start: f64, end: f64, years: f64) -> Option<f64> {
    if start <= 0.0 || end <= 0.0 || years <= 0.0 {
        return None;
    }
    let rate = (end / start).powf(1.0 / years) - 1.0;
    rate.is_finite().then_some(rate)
}

/// `slope × 365.25 / mean(y) × 100` for a slope measured per day.
pub fn annualized_growth_pct(slope_per_day: f64, mean_y: f64) -> Option<f64> {
    if mean_y == 0.0 {
        return None;
    }
    Some(slope_per_day * DAYS_PER_YEAR / mean_y * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn classify(regression: &Regression) -> Self {
        if regression.p_value < SIGNIFICANCE && regression.slope > 0.0 {
            TrendDirection::Improving
        } else if regression.p_value < SIGNIFICANCE && regression.slope < 0.0 {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendQuality {
    Excellent,
    Good,
    Moderate,
    Poor,
    Unreliable,
}

impl TrendQuality {
    pub fn from_r_squared(r2: f64) -> Self {
        match r2 {
            r if r > 0.9 => TrendQuality::Excellent,
            r if r > 0.7 => TrendQuality::Good,
            r if r > 0.5 => TrendQuality::Moderate,
            r if r > 0.3 => TrendQuality::Poor,
            _ => TrendQuality::Unreliable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionTier {
    StrongImproving,
    ModerateImproving,
    Stable,
    ModerateDeclining,
    StrongDeclining,
}

impl DirectionTier {
    pub fn from_growth_pct(growth: f64) -> Self {
        match growth {
            g if g > 10.0 => DirectionTier::StrongImproving,
            g if g > 5.0 => DirectionTier::ModerateImproving,
            g if g > -5.0 => DirectionTier::Stable,
            g if g > -10.0 => DirectionTier::ModerateDeclining,
            _ => DirectionTier::StrongDeclining,
        }
    }
}
