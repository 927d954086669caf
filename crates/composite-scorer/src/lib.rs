//! Weighted 0-100 company score across valuation, profitability, growth,
//! financial health and risk.

pub mod benchmarks;
pub mod scorer;
pub mod weights;


pub use benchmarks::{Benchmark, Curve, Metric};
pub use scorer::{
    rank, rank_records, CompositeScore, CompositeScorer, DimensionScore, LetterRating, RankedCompany,
    ScoringInputs,
};
pub use weights::{Dimension, DimensionWeights, WEIGHT_TOLERANCE};
