//! Per-tenant composition of every engine, training data assembly and the
//! scheduled jobs that keep scores and models current.

pub mod config;
pub mod context;
pub mod dataset;
pub mod jobs;
pub mod models;
pub mod service;
pub mod stores;

#[cfg(test)]
mod service_tests;

pub use config::OrchestratorConfig;
pub use dataset::{training_dates, BatchFailure, DatasetBuilder, DatasetReport};
pub use jobs::{JobKind, JobOutcome, JobReport, JobScheduler, NetworkOutcome, RetryPolicy};
pub use models::{ModelRegistry, WeightStatus};
pub use service::{with_timeout, AnalysisService, ScoreBatch};
pub use stores::Stores;
