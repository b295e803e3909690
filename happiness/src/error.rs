//! Error types.

#[derive(thiserror::Error, Debug)]
pub enum HappinessError {
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Dataset is empty after normalisation: {0}")]
    EmptyDataset(String),
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
    #[error("Aggregate over zero records: {0}")]
    EmptyInput(String),
    #[error("Invalid search syntax: {0}")]
    InvalidSearchQuery(String),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Wrapped serde JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type HappinessResult<T> = Result<T, HappinessError>;
