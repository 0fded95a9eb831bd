use async_trait::async_trait;
use tracing::info;

use super::{MetricsSink, PutMetricData};
use crate::error::SinkError;

/// Sink that writes every data point to the log instead of a backend.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn put_metric_data(&self, request: PutMetricData) -> Result<(), SinkError> {
        for datum in &request.metric_data {
            let dimensions = datum
                .dimensions
                .iter()
                .map(|d| format!("{}={}", d.name, d.value))
                .collect::<Vec<_>>()
                .join(",");
            info!(
                namespace = %request.namespace,
                metric = %datum.metric_name,
                value = datum.value,
                dimensions = %dimensions,
                timestamp = %datum.timestamp,
                "Metric data point"
            );
        }
        Ok(())
    }
}
