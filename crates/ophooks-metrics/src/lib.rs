//! Operation call-count metrics.
//!
//! [`MetricsAggregator`] is an [`ophooks_core`] subscriber that counts every
//! operation event per operation, tenant and resource type, and flushes the
//! counts to a [`MetricsSink`] on a fixed interval in chunked,
//! concurrency-capped requests.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod key;
pub mod sinks;

pub use aggregator::{FlushReport, MetricsAggregator, SkipReason};
pub use config::MetricsConfig;
pub use error::{MetricsError, SinkError};
pub use sinks::{
    Dimension, HttpSink, MAX_DATA_POINTS_PER_REQUEST, METRIC_NAME, MetricDatum, MetricsSink,
    PutMetricData, StandardUnit, TracingSink,
};
