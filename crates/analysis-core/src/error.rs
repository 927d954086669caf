use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies what was missing when a whole operation could not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingData {
    pub company_id: String,
    pub kind: String,
}

impl std::fmt::Display for MissingData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "company {}: {}", self.company_id, self.kind)
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(MissingData),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Model error: {0}")]
    Model(String),
}

impl AnalysisError {
    pub fn missing(company_id: impl Into<String>, kind: impl Into<String>) -> Self {
        AnalysisError::InsufficientData(MissingData {
            company_id: company_id.into(),
            kind: kind.into(),
        })
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter(message.into())
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, AnalysisError::InsufficientData(_))
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, AnalysisError::InvalidParameter(_))
    }
}

pub type CoreResult<T> = Result<T, AnalysisError>;
