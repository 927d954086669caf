use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use analysis_core::{AnalysisError, CompositeScoreRecord};
use chrono::NaiveDate;
use fundamental_analysis::RatioSet;
use risk_manager::RiskAssessment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::benchmarks::{benchmarks, Metric};
use crate::weights::{Dimension, DimensionWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterRating {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
}

impl LetterRating {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => LetterRating::APlus,
            s if s >= 80.0 => LetterRating::A,
            s if s >= 70.0 => LetterRating::BPlus,
            s if s >= 60.0 => LetterRating::B,
            s if s >= 50.0 => LetterRating::CPlus,
            s if s >= 40.0 => LetterRating::C,
            s if s >= 30.0 => LetterRating::D,
            _ => LetterRating::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterRating::APlus => "A+",
            LetterRating::A => "A",
            LetterRating::BPlus => "B+",
            LetterRating::B => "B",
            LetterRating::CPlus => "C+",
            LetterRating::C => "C",
            LetterRating::D => "D",
            LetterRating::F => "F",
        }
    }
}

impl fmt::Display for LetterRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one company's score is computed from.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    pub ratios: &'a RatioSet,
    pub risk: Option<&'a RiskAssessment>,
    pub consensus_discount: Option<f64>,
}

impl ScoringInputs<'_> {
    fn metric(&self, metric: Metric) -> Option<f64> {
        let neutral = self.risk.and_then(|r| r.neutral());
        let metrics = self.risk.map(|r| &r.metrics);
        let value = match metric {
            Metric::Ratio(name) => self.ratios.get(name),
            Metric::ConsensusDiscount => self.consensus_discount,
            Metric::InverseRisk => neutral.map(|n| 100.0 - n.overall_score),
            Metric::AltmanZ => metrics.and_then(|m| m.altman).map(|a| a.z_score),
            Metric::Beta => metrics.and_then(|m| m.beta),
            Metric::Volatility90d => metrics.and_then(|m| m.volatility_90d),
        };
        value.filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: f64,
    pub weight: f64,
    /// Sub-scores that could be computed, by metric.
    pub breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub company_id: String,
    pub score_date: NaiveDate,
    pub composite_score: f64,
    pub rating: LetterRating,
    pub dimensions: Vec<DimensionScore>,
}

impl CompositeScore {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }

    pub fn dimension_scores(&self) -> [f64; 5] {
        Dimension::ALL.map(|d| self.dimension(d).map(|s| s.score).unwrap_or(0.0))
    }

    pub fn to_record(&self) -> CompositeScoreRecord {
        let [valuation, profitability, growth, financial_health, risk] = self.dimension_scores();
        let weights = DimensionWeights::from_array(
            Dimension::ALL.map(|d| self.dimension(d).map(|s| s.weight).unwrap_or(0.0)),
        );
        CompositeScoreRecord {
            company_id: self.company_id.clone(),
            score_date: self.score_date,
            composite_score: self.composite_score,
            rating: self.rating.as_str().to_string(),
            valuation_score: valuation,
            profitability_score: profitability,
            growth_score: growth,
            financial_health_score: financial_health,
            risk_score: risk,
            weights: weights.to_map(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCompany {
    pub rank: usize,
    pub company_id: String,
    pub composite_score: f64,
    pub rating: LetterRating,
}

#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    weights: DimensionWeights,
}

impl CompositeScorer {
    /// Accepts weights summing to 1 within tolerance and rescales them to
    /// sum to exactly 1.
    pub fn new(weights: DimensionWeights) -> Result<Self, AnalysisError> {
        weights.validate()?;
        let weights = DimensionWeights::from_raw(weights.to_array())?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &DimensionWeights {
        &self.weights
    }

    /// Mean of the available sub-scores, or 0 if none are available.
    pub fn dimension_score(&self, dimension: Dimension, inputs: &ScoringInputs<'_>) -> DimensionScore {
        let breakdown: BTreeMap<String, f64> = benchmarks(dimension)
            .iter()
            .filter_map(|b| {
                inputs
                    .metric(b.metric)
                    .map(|v| (b.metric.label().to_string(), b.curve.score(v)))
            })
            .collect();
        let score = if breakdown.is_empty() {
            0.0
        } else {
            breakdown.values().sum::<f64>() / breakdown.len() as f64
        };
        DimensionScore {
            dimension,
            score,
            weight: self.weights.get(dimension),
            breakdown,
        }
    }

    pub fn score(
        &self,
        company_id: &str,
        score_date: NaiveDate,
        inputs: ScoringInputs<'_>,
    ) -> Result<CompositeScore, AnalysisError> {
        let dimensions: Vec<DimensionScore> = Dimension::ALL
            .iter()
            .map(|d| self.dimension_score(*d, &inputs))
            .collect();
        if dimensions.iter().all(|d| d.breakdown.is_empty()) {
            return Err(AnalysisError::missing(company_id, "ratios or risk metrics to score"));
        }

        let composite_score: f64 = dimensions.iter().map(|d| d.score * d.weight).sum();
        let rating = LetterRating::from_score(composite_score);
        debug!(
            company_id,
            composite = composite_score,
            rating = rating.as_str(),
            "Composite score computed"
        );
        Ok(CompositeScore {
            company_id: company_id.to_string(),
            score_date,
            composite_score,
            rating,
            dimensions,
        })
    }
}

/// Sorts by score descending and assigns ranks from 1. Scores below
/// `min_score` are dropped first.
pub fn rank(scores: &[CompositeScore], min_score: Option<f64>) -> Vec<RankedCompany> {
    rank_entries(
        scores
            .iter()
            .map(|s| (s.company_id.clone(), s.composite_score, s.rating)),
        min_score,
    )
}

/// Ranks persisted scores. The rating is derived from the stored score.
pub fn rank_records(records: &[CompositeScoreRecord], min_score: Option<f64>) -> Vec<RankedCompany> {
    rank_entries(
        records.iter().map(|r| {
            (
                r.company_id.clone(),
                r.composite_score,
                LetterRating::from_score(r.composite_score),
            )
        }),
        min_score,
    )
}

/// Descending by score, ties by company id; rank starts at 1.
fn rank_entries(
    entries: impl Iterator<Item = (String, f64, LetterRating)>,
    min_score: Option<f64>,
) -> Vec<RankedCompany> {
    let mut kept: Vec<(String, f64, LetterRating)> = entries
        .filter(|(_, score, _)| min_score.map_or(true, |m| *score >= m))
        .collect();
    kept.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    kept.into_iter()
        .enumerate()
        .map(|(i, (company_id, composite_score, rating))| RankedCompany {
            rank: i + 1,
            company_id,
            composite_score,
            rating,
        })
        .collect()
}
