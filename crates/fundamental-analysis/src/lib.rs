//! Financial ratio calculation from booked statements.

pub mod calculator;
pub mod graham;
pub mod ratios;

#[cfg(test)]
mod calculator_tests;

pub use calculator::{RatioCalculator, RatioSet};
pub use graham::graham_number;
pub use ratios::{RatioCategory, RatioName};
