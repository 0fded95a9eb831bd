use ophooks_core::SubscriberError;
use thiserror::Error;

/// Errors raised by the metrics aggregator itself.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid metrics configuration: {0}")]
    InvalidConfig(String),

    #[error("Counter overflow for metric key {0}")]
    CounterOverflow(String),

    #[error("Metrics aggregator requires a running tokio runtime when enabled")]
    NoRuntime,
}

impl MetricsError {
    /// Create a new InvalidConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<MetricsError> for SubscriberError {
    fn from(err: MetricsError) -> Self {
        SubscriberError::execution(err.to_string())
    }
}

/// Failure of a single metrics sink request.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Metrics request failed: {0}")]
    Request(String),

    #[error("Metrics sink rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err.to_string())
    }
}
