//! Timer-driven flushing through a real broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ophooks_core::{Broker, OperationEvent, OperationKind, RequestScope};
use ophooks_metrics::{MetricsAggregator, MetricsConfig, MetricsSink, PutMetricData, SinkError};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingSink {
    requests: Mutex<Vec<PutMetricData>>,
}

impl RecordingSink {
    fn requests(&self) -> Vec<PutMetricData> {
        self.requests.lock().clone()
    }

    /// Sum of values for data points whose dimensions are exactly `dims`.
    fn total(&self, dims: &[(&str, &str)]) -> u64 {
        self.requests()
            .iter()
            .flat_map(|r| r.metric_data.clone())
            .filter(|d| {
                d.dimensions.len() == dims.len()
                    && d
                        .dimensions
                        .iter()
                        .zip(dims)
                        .all(|(have, (name, value))| have.name == *name && have.value == *value)
            })
            .map(|d| d.value)
            .sum()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn put_metric_data(&self, request: PutMetricData) -> Result<(), SinkError> {
        self.requests.lock().push(request);
        Ok(())
    }
}

fn fast_config() -> MetricsConfig {
    MetricsConfig::default()
        .enabled()
        .with_push_interval(Duration::from_millis(40))
}

#[tokio::test]
async fn published_events_reach_the_sink() {
    let broker = Broker::new();
    let sink = Arc::new(RecordingSink::default());
    let aggregator = MetricsAggregator::new(&broker, sink.clone(), fast_config()).unwrap();

    let tenant = uuid::Uuid::new_v4().to_string();
    let event = OperationEvent::new(OperationKind::PreCreate).with_scope(
        RequestScope::TenantResource {
            tenant_id: tenant.clone(),
            resource_type: "Patient".into(),
        },
    );
    for _ in 0..4 {
        let outcome = broker.publish(&event).await;
        assert!(outcome.success);
    }
    broker
        .publish(&OperationEvent::new(OperationKind::PostCreate))
        .await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    aggregator.destroy();

    assert_eq!(sink.total(&[("Operation", "pre-create")]), 4);
    assert_eq!(
        sink.total(&[("Operation", "pre-create"), ("TenantId", tenant.as_str())]),
        4
    );
    assert_eq!(
        sink.total(&[
            ("Operation", "pre-create"),
            ("TenantId", tenant.as_str()),
            ("ResourceType", "Patient")
        ]),
        4
    );
    assert_eq!(sink.total(&[("Operation", "post-create")]), 1);
    assert!(aggregator.snapshot().is_empty());
}

#[tokio::test]
async fn first_flush_waits_one_interval() {
    let broker = Broker::new();
    let sink = Arc::new(RecordingSink::default());
    let config = MetricsConfig::default()
        .enabled()
        .with_push_interval(Duration::from_millis(200));
    let aggregator = MetricsAggregator::new(&broker, sink.clone(), config).unwrap();

    broker
        .publish(&OperationEvent::new(OperationKind::PreRead))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(sink.requests().is_empty());
    assert_eq!(aggregator.snapshot().get("pre-read"), Some(&1));
    aggregator.destroy();
}

#[tokio::test]
async fn destroy_stops_future_flushes() {
    let broker = Broker::new();
    let sink = Arc::new(RecordingSink::default());
    let aggregator = MetricsAggregator::new(&broker, sink.clone(), fast_config()).unwrap();

    aggregator.destroy();
    aggregator.destroy();

    broker
        .publish(&OperationEvent::new(OperationKind::PreBatch))
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(sink.requests().is_empty());
    assert_eq!(aggregator.snapshot().get("pre-batch"), Some(&1));
}

#[tokio::test]
async fn unsubscribing_stops_counting() {
    let broker = Broker::new();
    let aggregator = MetricsAggregator::new(
        &broker,
        Arc::new(RecordingSink::default()),
        MetricsConfig::default().enabled(),
    )
    .unwrap();

    let handle = aggregator.subscription().unwrap().clone();
    broker.unsubscribe(OperationKind::ALL, &handle);
    broker
        .publish(&OperationEvent::new(OperationKind::PreDelete))
        .await;

    assert!(aggregator.snapshot().is_empty());
    aggregator.destroy();
}
