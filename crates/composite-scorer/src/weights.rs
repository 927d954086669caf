use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const WEIGHT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Valuation,
    Profitability,
    Growth,
    FinancialHealth,
    Risk,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Valuation,
        Dimension::Profitability,
        Dimension::Growth,
        Dimension::FinancialHealth,
        Dimension::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Valuation => "valuation",
            Dimension::Profitability => "profitability",
            Dimension::Growth => "growth",
            Dimension::FinancialHealth => "financial_health",
            Dimension::Risk => "risk",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Weight of each dimension in the composite. Always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub valuation: f64,
    pub profitability: f64,
    pub growth: f64,
    pub financial_health: f64,
    pub risk: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            valuation: 0.25,
            profitability: 0.20,
            growth: 0.20,
            financial_health: 0.20,
            risk: 0.15,
        }
    }
}

impl DimensionWeights {
    /// Builds weights from raw non-negative values, rescaled to sum to 1.
    pub fn from_raw(raw: [f64; 5]) -> Result<Self, AnalysisError> {
        if raw.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::invalid("weights must be finite and non-negative"));
        }
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return Err(AnalysisError::invalid("weights must not all be zero"));
        }
        let weights = Self::from_array(raw.map(|w| w / total));
        weights.validate()?;
        Ok(weights)
    }

    pub fn from_array(w: [f64; 5]) -> Self {
        Self {
            valuation: w[0],
            profitability: w[1],
            growth: w[2],
            financial_health: w[3],
            risk: w[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [
            self.valuation,
            self.profitability,
            self.growth,
            self.financial_health,
            self.risk,
        ]
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        self.to_array()[dimension.index()]
    }

    pub fn sum(&self) -> f64 {
        self.to_array().iter().sum()
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AnalysisError::invalid(format!(
                "dimension weights sum to {sum:.4}, expected 1.0"
            )));
        }
        Ok(())
    }

    pub fn to_map(&self) -> Map<String, Value> {
        Dimension::ALL
            .iter()
            .map(|d| (d.as_str().to_string(), json!(self.get(*d))))
            .collect()
    }
}
