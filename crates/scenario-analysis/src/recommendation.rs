use std::fmt;

use analysis_core::RiskRating;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    Buy,
    Hold,
    Sell,
    #[serde(rename = "Strong Sell")]
    StrongSell,
}

impl Recommendation {
    /// Maps expected upside (%) and the neutral-scenario risk rating to an action.
    /// Buy signals require Low or Medium risk.
    pub fn from_upside(expected_upside_pct: f64, risk: RiskRating) -> Self {
        let acceptable_risk = matches!(risk, RiskRating::Low | RiskRating::Medium);
        if expected_upside_pct > 20.0 && acceptable_risk {
            Recommendation::StrongBuy
        } else if expected_upside_pct > 10.0 && acceptable_risk {
            Recommendation::Buy
        } else if expected_upside_pct > 0.0 {
            Recommendation::Hold
        } else if expected_upside_pct > -10.0 {
            Recommendation::Sell
        } else {
            Recommendation::StrongSell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Hold => "Hold",
            Recommendation::Sell => "Sell",
            Recommendation::StrongSell => "Strong Sell",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(
            Recommendation::from_upside(25.0, RiskRating::Low),
            Recommendation::StrongBuy
        );
        assert_eq!(
            Recommendation::from_upside(15.0, RiskRating::Medium),
            Recommendation::Buy
        );
        assert_eq!(
            Recommendation::from_upside(20.0, RiskRating::Medium),
            Recommendation::Buy
        );
        assert_eq!(
            Recommendation::from_upside(5.0, RiskRating::Low),
            Recommendation::Hold
        );
        assert_eq!(
            Recommendation::from_upside(0.0, RiskRating::Low),
            Recommendation::Sell
        );
        assert_eq!(
            Recommendation::from_upside(-10.0, RiskRating::Low),
            Recommendation::StrongSell
        );
    }

    #[test]
    fn test_high_risk_caps_at_hold() {
        assert_eq!(
            Recommendation::from_upside(40.0, RiskRating::High),
            Recommendation::Hold
        );
        assert_eq!(
            Recommendation::from_upside(40.0, RiskRating::VeryHigh),
            Recommendation::Hold
        );
    }

    #[test]
    fn test_serialized_label() {
        assert_eq!(
            serde_json::to_string(&Recommendation::StrongBuy).unwrap(),
            "\"Strong Buy\""
        );
    }
}
