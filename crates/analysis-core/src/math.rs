//! Small numeric helpers shared by the analysis crates.
//!
//! Functions return `None` on insufficient or degenerate input rather than
//! producing NaN or infinity.

/// `numerator / denominator`, or `None` when either side is missing, the
/// denominator is zero, or the result is not finite.
pub fn safe_divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let n = numerator?;
    let d = denominator?;
    if d == 0.0 {
        return None;
    }
    let r = n / d;
    r.is_finite().then_some(r)
}

/// Average of two optional values. Falls back to whichever side is present.
pub fn average_of(current: Option<f64>, prior: Option<f64>) -> Option<f64> {
    match (current, prior) {
        (Some(c), Some(p)) => Some((c + p) / 2.0),
        (Some(c), None) => Some(c),
        (None, Some(p)) => Some(p),
        (None, None) => None,
    }
}

/// Relative change `(current - prior) / prior`.
pub fn growth(current: Option<f64>, prior: Option<f64>) -> Option<f64> {
    let c = current?;
    let p = prior?;
    safe_divide(Some(c - p), Some(p))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divisor n).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Simple daily returns `p[i] / p[i-1] - 1`, skipping non-positive bases.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Share of `values` strictly below `target`, as a 0..=100 percentile.
pub fn percentile_rank(values: &[f64], target: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let below = values.iter().filter(|v| **v < target).count();
    Some(below as f64 / values.len() as f64 * 100.0)
}

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_divide_rejects_zero_and_missing() {
        assert_eq!(safe_divide(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(safe_divide(Some(10.0), Some(0.0)), None);
        assert_eq!(safe_divide(None, Some(4.0)), None);
        assert_eq!(safe_divide(Some(1.0), None), None);
    }

    #[test]
    fn growth_from_prior() {
        let g = growth(Some(1_100.0), Some(1_000.0)).unwrap();
        assert!((g - 0.10).abs() < 1e-12);
        assert_eq!(growth(Some(5.0), Some(0.0)), None);
    }

    #[test]
    fn population_std_divides_by_n() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std(&v).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(population_std(&[]), None);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn returns_skip_zero_prices() {
        let r = daily_returns(&[100.0, 110.0, 0.0, 5.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
    }
}
