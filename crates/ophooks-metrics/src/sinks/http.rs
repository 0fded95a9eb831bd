use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;

use super::{MetricsSink, PutMetricData};
use crate::error::SinkError;

/// Sink that POSTs each request as JSON to a collector endpoint.
///
/// Any non-2xx status is reported as [`SinkError::Rejected`].
pub struct HttpSink {
    http_client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header sent with every request (e.g. an API key).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetricsSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn put_metric_data(&self, request: PutMetricData) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&request)?;

        let mut http_request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");

        for (key, value) in &self.headers {
            http_request = http_request.header(key, value);
        }

        let response = http_request.body(payload).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(SinkError::Rejected { status, body })
        }
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}
