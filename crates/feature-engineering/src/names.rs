use std::fmt;
use std::str::FromStr;

use analysis_core::{AnalysisError, Scenario, ValuationMethod};
use serde::{Deserialize, Serialize};

/// Every feature derived from one multi-method valuation. The order of
/// [`FeatureName::ALL`] is the column order of model inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    // Per-scenario discounts
    DcfBullDiscount,
    DcfBaseDiscount,
    DcfBearDiscount,
    ComparablesBullDiscount,
    ComparablesBaseDiscount,
    ComparablesBearDiscount,
    AssetBasedBullDiscount,
    AssetBasedBaseDiscount,
    AssetBasedBearDiscount,
    DdmBullDiscount,
    DdmBaseDiscount,
    DdmBearDiscount,
    RimBullDiscount,
    RimBaseDiscount,
    RimBearDiscount,

    // Scenario spreads
    DcfScenarioSpread,
    ComparablesScenarioSpread,
    AssetBasedScenarioSpread,
    DdmScenarioSpread,
    RimScenarioSpread,
    AvgScenarioSpread,
    MaxScenarioSpread,
    MinScenarioSpread,

    // Method agreement
    ConsensusValuation,
    ConsensusBase,
    ConsensusDiscount,
    ValuationDispersion,
    ValuationRange,
    CoefficientOfVariation,
    OutlierCount,
    ConsensusConfidence,
    BaseCaseDispersion,
    BullBearRatio,

    // Margin of safety
    ConservativeMarginOfSafety,
    ConsensusMarginOfSafety,
    OptimisticMarginOfSafety,
    DownsideProtection,
    UpsidePotential,

    // Historical velocity
    ValuationVelocity1m,
    ValuationVelocity3m,
    ValuationVelocity6m,

    // Peer-relative
    PeerDiscountPercentile,
    PremiumVsPeerAvg,
    SectorMedianDiscount,
    RelativeUndervaluation,
    PeerRank,

    // Quality
    DataQualityScore,
    AssumptionSensitivity,
    ModelAccuracy,
    Freshness,

    CurrentPrice,
}

pub const FEATURE_COUNT: usize = 51;

impl FeatureName {
    pub const ALL: [FeatureName; FEATURE_COUNT] = [
        FeatureName::DcfBullDiscount,
        FeatureName::DcfBaseDiscount,
        FeatureName::DcfBearDiscount,
        FeatureName::ComparablesBullDiscount,
        FeatureName::ComparablesBaseDiscount,
        FeatureName::ComparablesBearDiscount,
        FeatureName::AssetBasedBullDiscount,
        FeatureName::AssetBasedBaseDiscount,
        FeatureName::AssetBasedBearDiscount,
        FeatureName::DdmBullDiscount,
        FeatureName::DdmBaseDiscount,
        FeatureName::DdmBearDiscount,
        FeatureName::RimBullDiscount,
        FeatureName::RimBaseDiscount,
        FeatureName::RimBearDiscount,
        FeatureName::DcfScenarioSpread,
        FeatureName::ComparablesScenarioSpread,
        FeatureName::AssetBasedScenarioSpread,
        FeatureName::DdmScenarioSpread,
        FeatureName::RimScenarioSpread,
        FeatureName::AvgScenarioSpread,
        FeatureName::MaxScenarioSpread,
        FeatureName::MinScenarioSpread,
        FeatureName::ConsensusValuation,
        FeatureName::ConsensusBase,
        FeatureName::ConsensusDiscount,
        FeatureName::ValuationDispersion,
        FeatureName::ValuationRange,
        FeatureName::CoefficientOfVariation,
        FeatureName::OutlierCount,
        FeatureName::ConsensusConfidence,
        FeatureName::BaseCaseDispersion,
        FeatureName::BullBearRatio,
        FeatureName::ConservativeMarginOfSafety,
        FeatureName::ConsensusMarginOfSafety,
        FeatureName::OptimisticMarginOfSafety,
        FeatureName::DownsideProtection,
        FeatureName::UpsidePotential,
        FeatureName::ValuationVelocity1m,
        FeatureName::ValuationVelocity3m,
        FeatureName::ValuationVelocity6m,
        FeatureName::PeerDiscountPercentile,
        FeatureName::PremiumVsPeerAvg,
        FeatureName::SectorMedianDiscount,
        FeatureName::RelativeUndervaluation,
        FeatureName::PeerRank,
        FeatureName::DataQualityScore,
        FeatureName::AssumptionSensitivity,
        FeatureName::ModelAccuracy,
        FeatureName::Freshness,
        FeatureName::CurrentPrice,
    ];

    /// Discount feature of one method and scenario.
    pub fn discount(method: ValuationMethod, scenario: Scenario) -> FeatureName {
        FeatureName::ALL[method.index() * 3 + scenario.index()]
    }

    /// Scenario spread feature of one method.
    pub fn spread(method: ValuationMethod) -> FeatureName {
        FeatureName::ALL[15 + method.index()]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::DcfBullDiscount => "dcf_bull_discount",
            FeatureName::DcfBaseDiscount => "dcf_base_discount",
            FeatureName::DcfBearDiscount => "dcf_bear_discount",
            FeatureName::ComparablesBullDiscount => "comparables_bull_discount",
            FeatureName::ComparablesBaseDiscount => "comparables_base_discount",
            FeatureName::ComparablesBearDiscount => "comparables_bear_discount",
            FeatureName::AssetBasedBullDiscount => "asset_based_bull_discount",
            FeatureName::AssetBasedBaseDiscount => "asset_based_base_discount",
            FeatureName::AssetBasedBearDiscount => "asset_based_bear_discount",
            FeatureName::DdmBullDiscount => "ddm_bull_discount",
            FeatureName::DdmBaseDiscount => "ddm_base_discount",
            FeatureName::DdmBearDiscount => "ddm_bear_discount",
            FeatureName::RimBullDiscount => "rim_bull_discount",
            FeatureName::RimBaseDiscount => "rim_base_discount",
            FeatureName::RimBearDiscount => "rim_bear_discount",
            FeatureName::DcfScenarioSpread => "dcf_scenario_spread",
            FeatureName::ComparablesScenarioSpread => "comparables_scenario_spread",
            FeatureName::AssetBasedScenarioSpread => "asset_based_scenario_spread",
            FeatureName::DdmScenarioSpread => "ddm_scenario_spread",
            FeatureName::RimScenarioSpread => "rim_scenario_spread",
            FeatureName::AvgScenarioSpread => "avg_scenario_spread",
            FeatureName::MaxScenarioSpread => "max_scenario_spread",
            FeatureName::MinScenarioSpread => "min_scenario_spread",
            FeatureName::ConsensusValuation => "consensus_valuation",
            FeatureName::ConsensusBase => "consensus_base",
            FeatureName::ConsensusDiscount => "consensus_discount",
            FeatureName::ValuationDispersion => "valuation_dispersion",
            FeatureName::ValuationRange => "valuation_range",
            FeatureName::CoefficientOfVariation => "coefficient_of_variation",
            FeatureName::OutlierCount => "outlier_count",
            FeatureName::ConsensusConfidence => "consensus_confidence",
            FeatureName::BaseCaseDispersion => "base_case_dispersion",
            FeatureName::BullBearRatio => "bull_bear_ratio",
            FeatureName::ConservativeMarginOfSafety => "conservative_margin_of_safety",
            FeatureName::ConsensusMarginOfSafety => "consensus_margin_of_safety",
            FeatureName::OptimisticMarginOfSafety => "optimistic_margin_of_safety",
            FeatureName::DownsideProtection => "downside_protection",
            FeatureName::UpsidePotential => "upside_potential",
            FeatureName::ValuationVelocity1m => "valuation_velocity_1m",
            FeatureName::ValuationVelocity3m => "valuation_velocity_3m",
            FeatureName::ValuationVelocity6m => "valuation_velocity_6m",
            FeatureName::PeerDiscountPercentile => "peer_discount_percentile",
            FeatureName::PremiumVsPeerAvg => "premium_vs_peer_avg",
            FeatureName::SectorMedianDiscount => "sector_median_discount",
            FeatureName::RelativeUndervaluation => "relative_undervaluation",
            FeatureName::PeerRank => "peer_rank",
            FeatureName::DataQualityScore => "data_quality_score",
            FeatureName::AssumptionSensitivity => "assumption_sensitivity",
            FeatureName::ModelAccuracy => "model_accuracy",
            FeatureName::Freshness => "freshness",
            FeatureName::CurrentPrice => "current_price",
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FeatureName::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| AnalysisError::invalid(format!("unknown feature '{s}'")))
    }
}
