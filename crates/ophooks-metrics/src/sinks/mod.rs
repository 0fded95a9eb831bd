pub mod http;
pub mod logging;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::SinkError;

/// Largest number of data points a sink accepts in one request.
pub const MAX_DATA_POINTS_PER_REQUEST: usize = 20;

/// Name shared by every data point the aggregator emits.
pub const METRIC_NAME: &str = "CallCount";

/// A named dimension attached to a data point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StandardUnit {
    Count,
}

/// One timestamped numeric sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDatum {
    pub metric_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub unit: StandardUnit,
    pub value: u64,
    pub dimensions: Vec<Dimension>,
}

/// One sink request: at most [`MAX_DATA_POINTS_PER_REQUEST`] data points
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutMetricData {
    pub namespace: String,
    pub metric_data: Vec<MetricDatum>,
}

/// Destination for flushed metrics.
///
/// Delivery is best-effort: the aggregator logs a failed request and moves
/// on, it never retries.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Submit one batch of data points
    async fn put_metric_data(&self, request: PutMetricData) -> Result<(), SinkError>;
}

pub use http::HttpSink;
pub use logging::TracingSink;
