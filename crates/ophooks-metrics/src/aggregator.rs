//! Per-operation call count aggregation.
//!
//! The [`MetricsAggregator`] subscribes to every operation kind, counts
//! events under composite keys (see [`crate::key`]) and on a fixed interval
//! flushes the counts to a [`MetricsSink`].
//!
//! # Accuracy vs. loss
//!
//! A flush holds the flush lock while it sends. A tick that fires while a
//! previous flush is still sending does not queue up behind it: it discards
//! what accumulated since the last flush. Every interval that does get sent
//! is therefore exact, but a slow sink loses whole intervals.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::join_all;
use ophooks_core::{
    Broker, OperationEvent, OperationEventResponse, OperationKind, OperationSubscriber,
    SubscriberError, SubscriberHandle,
};
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::key;
use crate::sinks::{
    MAX_DATA_POINTS_PER_REQUEST, METRIC_NAME, MetricDatum, MetricsSink, PutMetricData,
    StandardUnit,
};

/// Why a flush did not send anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another flush was still sending
    Locked,
    /// Nothing was recorded since the last flush
    Empty,
}

/// Outcome of one flush cycle.
///
/// Flushing is best-effort, so this is a report rather than a `Result`:
/// failed requests are counted and logged, never returned as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushReport {
    Skipped {
        reason: SkipReason,
        /// Keys dropped because the cycle was skipped
        discarded: usize,
    },
    Sent {
        data_points: usize,
        requests: usize,
        failed: usize,
    },
}

impl FlushReport {
    /// Number of sink requests attempted.
    pub fn requests(&self) -> usize {
        match self {
            FlushReport::Skipped { .. } => 0,
            FlushReport::Sent { requests, .. } => *requests,
        }
    }

    /// True when every attempted request succeeded.
    pub fn is_clean(&self) -> bool {
        match self {
            FlushReport::Skipped { discarded, .. } => *discarded == 0,
            FlushReport::Sent { failed, .. } => *failed == 0,
        }
    }
}

/// Releases the flush lock when dropped, on every exit path.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn try_acquire(lock: &'a AtomicBool) -> Option<Self> {
        lock.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard(lock))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Counts operation events and periodically flushes them to a sink.
///
/// # Example
///
/// ```ignore
/// let broker = Broker::new_shared();
/// let config = MetricsConfig::from_env()?;
/// let aggregator = MetricsAggregator::new(&broker, Arc::new(TracingSink::new()), config)?;
///
/// // ... publish events through the broker ...
///
/// aggregator.destroy();
/// ```
pub struct MetricsAggregator {
    sink: Arc<dyn MetricsSink>,
    config: MetricsConfig,
    /// Composite key -> count since the last flush
    metrics: Mutex<HashMap<String, u64>>,
    flush_lock: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    subscription: OnceLock<SubscriberHandle>,
}

impl MetricsAggregator {
    /// Create an aggregator with an unlocked flush lock and an empty map.
    ///
    /// When `config.enabled` is set this subscribes to every operation kind
    /// and starts the flush timer, which requires a tokio runtime. Otherwise
    /// the aggregator is inert.
    pub fn new(
        broker: &Broker,
        sink: Arc<dyn MetricsSink>,
        config: MetricsConfig,
    ) -> Result<Arc<Self>, MetricsError> {
        Self::with_state(broker, sink, config, false, HashMap::new())
    }

    /// Create an aggregator with an explicit initial lock state and map.
    pub fn with_state(
        broker: &Broker,
        sink: Arc<dyn MetricsSink>,
        config: MetricsConfig,
        flush_locked: bool,
        metrics: HashMap<String, u64>,
    ) -> Result<Arc<Self>, MetricsError> {
        config.validate()?;

        let aggregator = Arc::new(Self {
            sink,
            config,
            metrics: Mutex::new(metrics),
            flush_lock: AtomicBool::new(flush_locked),
            timer: Mutex::new(None),
            subscription: OnceLock::new(),
        });

        if !aggregator.config.enabled {
            debug!("Metrics aggregator disabled");
            return Ok(aggregator);
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;

        let handle = SubscriberHandle::new(Arc::new(AggregatorSubscriber {
            aggregator: Arc::downgrade(&aggregator),
        }));
        broker.subscribe(OperationKind::ALL, &handle);
        let _ = aggregator.subscription.set(handle);

        let period = aggregator.config.push_interval();
        let timer = runtime.spawn(run_timer(Arc::downgrade(&aggregator), period));
        *aggregator.timer.lock() = Some(timer);

        info!(
            sink = %aggregator.sink.name(),
            interval_ms = aggregator.config.push_interval_ms,
            concurrency = aggregator.config.concurrent_send_count,
            "Metrics aggregator started"
        );
        Ok(aggregator)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Handle registered with the broker, if enabled.
    pub fn subscription(&self) -> Option<&SubscriberHandle> {
        self.subscription.get()
    }

    /// Copy of the counts accumulated since the last flush.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.metrics.lock().clone()
    }

    pub fn is_flush_locked(&self) -> bool {
        self.flush_lock.load(Ordering::Acquire)
    }

    /// Count one event. Never fails outward.
    pub fn record(&self, event: &OperationEvent) -> OperationEventResponse {
        match self.increment(event) {
            Ok(()) => OperationEventResponse::ok(),
            Err(e) => {
                warn!(operation = %event.operation, error = %e, "Failed to record metric");
                OperationEventResponse::failed(vec![e.into()])
            }
        }
    }

    fn increment(&self, event: &OperationEvent) -> Result<(), MetricsError> {
        let keys = key::keys_for(event);
        let mut metrics = self.metrics.lock();
        for key in keys {
            match metrics.get_mut(&key) {
                Some(count) => {
                    *count = count
                        .checked_add(1)
                        .ok_or_else(|| MetricsError::CounterOverflow(key.clone()))?;
                }
                None => {
                    metrics.insert(key, 1);
                }
            }
        }
        Ok(())
    }

    /// Take and clear the accumulated counts in one critical section.
    fn drain(&self) -> HashMap<String, u64> {
        std::mem::take(&mut *self.metrics.lock())
    }

    /// Send everything accumulated since the last flush.
    ///
    /// Called by the timer; public so hosts and tests can drive a cycle
    /// directly. The map is always empty afterwards.
    pub async fn flush(&self) -> FlushReport {
        let Some(guard) = FlushGuard::try_acquire(&self.flush_lock) else {
            let discarded = self.drain().len();
            if discarded > 0 {
                warn!(discarded, "Previous metrics flush still running, dropping interval");
            }
            return FlushReport::Skipped {
                reason: SkipReason::Locked,
                discarded,
            };
        };

        let snapshot = self.drain();
        if snapshot.is_empty() {
            return FlushReport::Skipped {
                reason: SkipReason::Empty,
                discarded: 0,
            };
        }

        let report = self.send(snapshot).await;
        drop(guard);
        report
    }

    async fn send(&self, snapshot: HashMap<String, u64>) -> FlushReport {
        let timestamp = OffsetDateTime::now_utc();

        let mut entries: Vec<(String, u64)> = snapshot.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let data_points = entries.len();

        let requests: Vec<PutMetricData> = entries
            .chunks(MAX_DATA_POINTS_PER_REQUEST)
            .map(|chunk| PutMetricData {
                namespace: self.config.namespace.clone(),
                metric_data: chunk
                    .iter()
                    .map(|(key, count)| MetricDatum {
                        metric_name: METRIC_NAME.to_string(),
                        timestamp,
                        unit: StandardUnit::Count,
                        value: *count,
                        dimensions: key::dimensions(key),
                    })
                    .collect(),
            })
            .collect();
        let total_requests = requests.len();

        let mut failed = 0;
        let mut pending = requests.into_iter();
        loop {
            let batch: Vec<PutMetricData> = pending
                .by_ref()
                .take(self.config.concurrent_send_count)
                .collect();
            if batch.is_empty() {
                break;
            }

            // The sink call itself runs inside the guard so a sink that
            // panics before returning its future is caught too.
            let results = join_all(batch.into_iter().map(|request| {
                AssertUnwindSafe(async move { self.sink.put_metric_data(request).await })
                    .catch_unwind()
            }))
            .await;

            for result in results {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        failed += 1;
                        error!(sink = %self.sink.name(), error = %e, "Metric send failed");
                    }
                    Err(_) => {
                        failed += 1;
                        error!(sink = %self.sink.name(), "Metric sink panicked during send");
                    }
                }
            }
        }

        debug!(
            data_points,
            requests = total_requests,
            failed,
            "Metrics flushed"
        );
        FlushReport::Sent {
            data_points,
            requests: total_requests,
            failed,
        }
    }

    /// Stop the flush timer. Safe to call repeatedly or when disabled.
    pub fn destroy(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
            info!("Metrics aggregator stopped");
        }
    }
}

/// Fire a flush every `period`, starting one period from now.
///
/// Each flush runs in its own task so an overrunning send meets the flush
/// lock instead of delaying the schedule.
async fn run_timer(aggregator: Weak<MetricsAggregator>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(aggregator) = aggregator.upgrade() else {
            break;
        };
        tokio::spawn(async move {
            let report = aggregator.flush().await;
            debug!(?report, "Metrics flush cycle finished");
        });
    }
}

/// Broker-facing subscriber. Holds the aggregator weakly so the broker's
/// subscription table does not keep it (and its timer) alive.
struct AggregatorSubscriber {
    aggregator: Weak<MetricsAggregator>,
}

#[async_trait]
impl OperationSubscriber for AggregatorSubscriber {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn handle(
        &self,
        event: &OperationEvent,
    ) -> Result<OperationEventResponse, SubscriberError> {
        match self.aggregator.upgrade() {
            Some(aggregator) => Ok(aggregator.record(event)),
            // Aggregator dropped while still subscribed
            None => Ok(OperationEventResponse::ok()),
        }
    }
}

impl Drop for MetricsAggregator {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .field("keys", &self.metrics.lock().len())
            .field("flush_locked", &self.is_flush_locked())
            .finish_non_exhaustive()
    }
}
