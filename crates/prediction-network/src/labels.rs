//! Turns a past valuation plus the prices that followed it into training targets.

use analysis_core::{MarketDataPoint, Scenario, ValuationMethod};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use valuation_engine::MultiMethodValuation;

pub const HORIZON_MONTHS: [u32; 4] = [1, 3, 6, 12];
pub const MAX_MONTHS_TO_FAIR_VALUE: f64 = 24.0;
/// A horizon price may come from a bar up to this many days before the target date.
pub const HORIZON_TOLERANCE_DAYS: i64 = 7;
/// Softmax temperature for scenario probabilities.
pub const SCENARIO_TEMPERATURE: f64 = 0.1;
const DAYS_PER_MONTH: f64 = 30.4375;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeLabels {
    pub best_method: ValuationMethod,
    /// Bull, base, bear. Sums to 1.
    pub scenario_probabilities: [f64; 3],
    /// Fractional returns at [`HORIZON_MONTHS`].
    pub returns: [f64; 4],
    pub months_to_fair_value: f64,
}

/// Last price on or shortly before `target`.
fn price_at(prices: &[MarketDataPoint], target: NaiveDate) -> Option<f64> {
    prices
        .iter()
        .rev()
        .find(|p| p.date <= target)
        .filter(|p| (target - p.date).num_days() <= HORIZON_TOLERANCE_DAYS)
        .map(|p| p.price())
}

/// Labels for `valuation` given the daily `prices` that followed it (ascending
/// by date). `None` when the price series does not cover the 12-month horizon
/// or the start price is unknown.
pub fn label_outcome(valuation: &MultiMethodValuation, prices: &[MarketDataPoint]) -> Option<OutcomeLabels> {
    let start_date = valuation.valuation_date;
    let later: Vec<&MarketDataPoint> = prices.iter().filter(|p| p.date > start_date).collect();
    let start = valuation
        .current_price
        .or_else(|| price_at(prices, start_date))
        .filter(|p| *p > 0.0)?;

    let mut returns = [0.0; 4];
    for (slot, months) in returns.iter_mut().zip(HORIZON_MONTHS) {
        let target = start_date.checked_add_months(Months::new(months))?;
        *slot = (price_at(prices, target)? - start) / start;
    }
    let realized = start * (1.0 + returns[3]);

    let best_method = ValuationMethod::ALL
        .into_iter()
        .min_by(|a, b| {
            let da = (valuation.method(*a).base.intrinsic_value - realized).abs();
            let db = (valuation.method(*b).base.intrinsic_value - realized).abs();
            da.total_cmp(&db)
        })?;

    let scenario_probabilities = scenario_probabilities(valuation, realized);

    let fair_value = valuation.method_consensus_base();
    let reached = later.iter().find(|p| {
        if fair_value >= start {
            p.price() >= fair_value
        } else {
            p.price() <= fair_value
        }
    });
    let months_to_fair_value = reached
        .map(|p| (p.date - start_date).num_days() as f64 / DAYS_PER_MONTH)
        .unwrap_or(MAX_MONTHS_TO_FAIR_VALUE)
        .min(MAX_MONTHS_TO_FAIR_VALUE);

    Some(OutcomeLabels {
        best_method,
        scenario_probabilities,
        returns,
        months_to_fair_value,
    })
}

/// Softmax over negative distances from `realized` to each scenario's
/// consensus, with distances expressed as a fraction of `realized`.
pub fn scenario_probabilities(valuation: &MultiMethodValuation, realized: f64) -> [f64; 3] {
    let scale = realized.abs().max(f64::EPSILON);
    let scores = Scenario::ALL.map(|s| {
        let values = valuation.scenario_values(s);
        let consensus = values.iter().sum::<f64>() / values.len() as f64;
        -((consensus - realized).abs() / scale) / SCENARIO_TEMPERATURE
    });
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = scores.map(|s| (s - max).exp());
    let sum: f64 = exp.iter().sum();
    exp.map(|e| e / sum)
}
