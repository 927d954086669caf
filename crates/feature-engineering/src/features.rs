use std::collections::BTreeMap;

use analysis_core::math::{mean, median, percentile_rank, population_std, safe_divide};
use analysis_core::{Scenario, ValuationMethod, ValuationSnapshot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use valuation_engine::MultiMethodValuation;

use crate::names::{FeatureName, FEATURE_COUNT};

/// Another company's consensus discount on the same date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDiscount {
    pub company_id: String,
    pub discount: f64,
}

/// Optional context beyond the valuation itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureContext<'a> {
    /// Earlier monthly snapshots, newest first.
    pub history: &'a [ValuationSnapshot],
    pub peers: &'a [PeerDiscount],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationFeatures {
    pub company_id: String,
    pub valuation_date: NaiveDate,
    pub values: BTreeMap<FeatureName, Option<f64>>,
}

impl ValuationFeatures {
    pub fn get(&self, name: FeatureName) -> Option<f64> {
        self.values.get(&name).copied().flatten()
    }

    pub fn computed_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }

    /// Model input row in [`FeatureName::ALL`] order. Missing features are 0.
    pub fn to_vector(&self) -> Vec<f64> {
        FeatureName::ALL
            .iter()
            .map(|name| self.get(*name).unwrap_or(0.0))
            .collect()
    }
}

/// `(price − value) / value × 100`; negative means the stock trades below value.
pub fn discount_pct(current_price: Option<f64>, intrinsic_value: f64) -> Option<f64> {
    safe_divide(current_price.map(|p| p - intrinsic_value), Some(intrinsic_value))
        .map(|d| d * 100.0)
}

/// Cushion between a value and the price, relative to the value.
fn margin_of_safety(value: Option<f64>, price: Option<f64>) -> Option<f64> {
    let value = value?;
    safe_divide(Some(value - price?), Some(value)).map(|m| m * 100.0)
}

fn pct_vs_price(value: Option<f64>, price: Option<f64>) -> Option<f64> {
    let price = price?;
    safe_divide(Some(value? - price), Some(price)).map(|m| m * 100.0)
}

fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Change of consensus against the snapshot `months` back, given monthly history.
fn velocity(consensus: f64, history: &[ValuationSnapshot], months: usize) -> Option<f64> {
    let past = history.get(months - 1)?.consensus_value;
    safe_divide(Some(consensus - past), Some(past)).map(|v| v * 100.0)
}

/// Derives the full feature row for one valuation.
pub fn engineer_features(
    valuation: &MultiMethodValuation,
    context: FeatureContext<'_>,
) -> ValuationFeatures {
    let mut values: BTreeMap<FeatureName, Option<f64>> = BTreeMap::new();
    let price = valuation.current_price;

    for method in ValuationMethod::ALL {
        let triple = valuation.method(method);
        for scenario in Scenario::ALL {
            values.insert(
                FeatureName::discount(method, scenario),
                discount_pct(price, triple.get(scenario).intrinsic_value),
            );
        }
    }

    let spreads: Vec<f64> = ValuationMethod::ALL
        .iter()
        .filter_map(|m| {
            let spread = valuation.method(*m).spread_pct();
            values.insert(FeatureName::spread(*m), spread);
            spread
        })
        .collect();
    let avg_spread = mean(&spreads);
    values.insert(FeatureName::AvgScenarioSpread, avg_spread);
    values.insert(FeatureName::MaxScenarioSpread, max_of(&spreads));
    values.insert(FeatureName::MinScenarioSpread, min_of(&spreads));

    let all = valuation.all_values();
    let bulls = valuation.scenario_values(Scenario::Bull);
    let bases = valuation.scenario_values(Scenario::Base);
    let bears = valuation.scenario_values(Scenario::Bear);

    let consensus = valuation.consensus_valuation();
    let consensus_base = valuation.method_consensus_base();
    let dispersion = population_std(&all);
    let cv = safe_divide(dispersion, Some(consensus_base));
    let outliers = match (mean(&all), dispersion) {
        (Some(m), Some(sd)) => Some(all.iter().filter(|v| (*v - m).abs() > 2.0 * sd).count() as f64),
        _ => None,
    };

    values.insert(FeatureName::ConsensusValuation, Some(consensus));
    values.insert(FeatureName::ConsensusBase, Some(consensus_base));
    values.insert(FeatureName::ConsensusDiscount, discount_pct(price, consensus));
    values.insert(FeatureName::ValuationDispersion, dispersion);
    values.insert(
        FeatureName::ValuationRange,
        max_of(&all).zip(min_of(&all)).map(|(hi, lo)| hi - lo),
    );
    values.insert(FeatureName::CoefficientOfVariation, cv);
    values.insert(FeatureName::OutlierCount, outliers);
    values.insert(
        FeatureName::ConsensusConfidence,
        cv.map(|c| (1.0 / (1.0 + c.abs())).min(1.0)),
    );
    values.insert(FeatureName::BaseCaseDispersion, population_std(&bases));
    values.insert(
        FeatureName::BullBearRatio,
        safe_divide(mean(&bulls), mean(&bears)),
    );

    let lowest_bear = min_of(&bears);
    let lowest_bull = min_of(&bulls);
    values.insert(
        FeatureName::ConservativeMarginOfSafety,
        margin_of_safety(lowest_bear, price),
    );
    values.insert(
        FeatureName::ConsensusMarginOfSafety,
        margin_of_safety(Some(consensus_base), price),
    );
    values.insert(
        FeatureName::OptimisticMarginOfSafety,
        margin_of_safety(lowest_bull, price),
    );
    values.insert(FeatureName::DownsideProtection, pct_vs_price(lowest_bear, price));
    values.insert(FeatureName::UpsidePotential, pct_vs_price(max_of(&bulls), price));

    values.insert(
        FeatureName::ValuationVelocity1m,
        velocity(consensus, context.history, 1),
    );
    values.insert(
        FeatureName::ValuationVelocity3m,
        velocity(consensus, context.history, 3),
    );
    values.insert(
        FeatureName::ValuationVelocity6m,
        velocity(consensus, context.history, 6),
    );

    let own_discount = discount_pct(price, consensus);
    let peer_discounts: Vec<f64> = context.peers.iter().map(|p| p.discount).collect();
    let sector_median = median(&peer_discounts);
    values.insert(
        FeatureName::PeerDiscountPercentile,
        own_discount.and_then(|d| percentile_rank(&peer_discounts, d)),
    );
    values.insert(
        FeatureName::PremiumVsPeerAvg,
        own_discount.zip(mean(&peer_discounts)).map(|(d, avg)| d - avg),
    );
    values.insert(FeatureName::SectorMedianDiscount, sector_median);
    values.insert(
        FeatureName::RelativeUndervaluation,
        own_discount.zip(sector_median).map(|(d, m)| d - m),
    );
    values.insert(
        FeatureName::PeerRank,
        own_discount
            .filter(|_| !peer_discounts.is_empty())
            .map(|d| 1.0 + peer_discounts.iter().filter(|p| **p < d).count() as f64),
    );

    let base_confidence: Vec<f64> = valuation
        .triples()
        .map(|t| t.base.confidence)
        .collect();
    values.insert(FeatureName::DataQualityScore, mean(&base_confidence));
    values.insert(
        FeatureName::AssumptionSensitivity,
        avg_spread.map(|s| 1.0 / (1.0 + s.abs() / 100.0)),
    );
    // No realised outcomes tracked yet.
    values.insert(FeatureName::ModelAccuracy, None);
    values.insert(FeatureName::Freshness, None);
    values.insert(FeatureName::CurrentPrice, price);

    debug_assert_eq!(values.len(), FEATURE_COUNT);
    let values = values
        .into_iter()
        .map(|(k, v)| (k, v.filter(|x| x.is_finite())))
        .collect();

    ValuationFeatures {
        company_id: valuation.company_id.clone(),
        valuation_date: valuation.valuation_date,
        values,
    }
}
