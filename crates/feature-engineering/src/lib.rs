//! ML-ready features derived from the fifteen scenario valuations of one
//! company and date.

pub mod features;
pub mod names;


pub use features::{
    discount_pct, engineer_features, FeatureContext, PeerDiscount, ValuationFeatures,
};
pub use names::{FeatureName, FEATURE_COUNT};
