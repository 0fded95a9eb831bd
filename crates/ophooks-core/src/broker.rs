//! Operation broker: subscription table and fan-out.
//!
//! The broker maps each [`OperationKind`] to the subscribers registered for
//! it. Publishing runs every matching subscriber concurrently, waits for all
//! of them to settle and folds the outcomes into an
//! [`AggregateOperationEventResponse`] the host uses to continue or abort
//! the operation.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::error::SubscriberError;
use crate::subscriber::SubscriberHandle;
use crate::types::{
    AggregateOperationEventResponse, OperationEvent, OperationEventResponse, OperationKind,
};

/// In-process publish/subscribe bus for operation lifecycle events.
///
/// # Example
///
/// ```ignore
/// use ophooks_core::{Broker, OperationEvent, OperationKind, SubscriberHandle};
///
/// let broker = Broker::new_shared();
/// broker.subscribe([OperationKind::PreCreate], &handle);
///
/// let outcome = broker.publish(&OperationEvent::new(OperationKind::PreCreate)).await;
/// if !outcome.success {
///     // abort the operation
/// }
/// ```
pub struct Broker {
    /// Subscribers per operation kind, without identity duplicates.
    table: RwLock<HashMap<OperationKind, Vec<SubscriberHandle>>>,
    /// Optional per-subscriber execution timeout.
    timeout: Option<Duration>,
}

impl Broker {
    /// Create a broker with an empty table and no timeout.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            timeout: None,
        }
    }

    /// Create a broker that treats subscribers exceeding `timeout` as faulted.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            timeout: Some(timeout),
        }
    }

    /// Create a new broker wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `handle` for each of `kinds`.
    ///
    /// A handle already registered for a kind is left as is.
    pub fn subscribe(
        &self,
        kinds: impl IntoIterator<Item = OperationKind>,
        handle: &SubscriberHandle,
    ) {
        let mut table = self.table.write();
        for kind in kinds {
            let subscribers = table.entry(kind).or_default();
            if !subscribers.contains(handle) {
                subscribers.push(handle.clone());
                debug!(subscriber = %handle.name(), operation = %kind, "Registered subscriber");
            }
        }
    }

    /// Remove `handle` from each of `kinds`. Missing registrations are ignored.
    pub fn unsubscribe(
        &self,
        kinds: impl IntoIterator<Item = OperationKind>,
        handle: &SubscriberHandle,
    ) {
        let mut table = self.table.write();
        for kind in kinds {
            if let Some(subscribers) = table.get_mut(&kind)
                && let Some(index) = subscribers.iter().position(|s| s == handle)
            {
                subscribers.remove(index);
                debug!(subscriber = %handle.name(), operation = %kind, "Unregistered subscriber");
            }
        }
    }

    /// Number of subscribers registered for `kind`.
    pub fn subscriber_count(&self, kind: OperationKind) -> usize {
        self.table.read().get(&kind).map_or(0, Vec::len)
    }

    /// Check whether `handle` is registered for `kind`.
    pub fn is_subscribed(&self, kind: OperationKind, handle: &SubscriberHandle) -> bool {
        self.table
            .read()
            .get(&kind)
            .is_some_and(|subscribers| subscribers.contains(handle))
    }

    /// Publish an event to every subscriber of its operation kind.
    ///
    /// All subscribers run concurrently and are always awaited to completion.
    /// Faults (errors, panics, timeouts) are folded into the result; this
    /// method itself never fails.
    pub async fn publish(&self, event: &OperationEvent) -> AggregateOperationEventResponse {
        // Snapshot so the lock is not held across subscriber awaits
        let subscribers = {
            let table = self.table.read();
            match table.get(&event.operation) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => {
                    debug!(operation = %event.operation, "No subscribers for event");
                    return AggregateOperationEventResponse::empty();
                }
            }
        };

        let mut pending: FuturesUnordered<_> = subscribers
            .iter()
            .map(|handle| self.invoke(handle, event))
            .collect();

        let mut aggregate = AggregateOperationEventResponse::empty();
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(response) => {
                    aggregate.success &= response.success;
                    aggregate.errors.extend(response.errors.iter().cloned());
                    aggregate.responses.push(response);
                }
                Err(err) => {
                    aggregate.success = false;
                    aggregate.errors.push(err);
                }
            }
        }

        debug!(
            operation = %event.operation,
            subscribers = subscribers.len(),
            success = aggregate.success,
            "Published event"
        );
        aggregate
    }

    /// Run one subscriber with panic and optional timeout protection.
    async fn invoke(
        &self,
        handle: &SubscriberHandle,
        event: &OperationEvent,
    ) -> Result<OperationEventResponse, SubscriberError> {
        let name = handle.name();
        // Call inside the guard: a subscriber may panic before it returns a future
        let guarded =
            AssertUnwindSafe(async { handle.subscriber().handle(event).await }).catch_unwind();

        let settled = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
                Ok(settled) => settled,
                Err(_) => {
                    error!(
                        subscriber = %name,
                        operation = %event.operation,
                        timeout_ms = timeout.as_millis() as u64,
                        "Subscriber timed out"
                    );
                    return Err(SubscriberError::timed_out(name, timeout));
                }
            },
            None => guarded.await,
        };

        match settled {
            Ok(Ok(response)) => {
                if !response.success {
                    warn!(
                        subscriber = %name,
                        operation = %event.operation,
                        errors = response.errors.len(),
                        "Subscriber reported failure"
                    );
                }
                Ok(response)
            }
            Ok(Err(err)) => {
                warn!(
                    subscriber = %name,
                    operation = %event.operation,
                    error = %err,
                    "Subscriber execution failed"
                );
                Err(err)
            }
            Err(panic) => {
                let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!(
                    subscriber = %name,
                    operation = %event.operation,
                    panic = %panic_msg,
                    "Subscriber panicked!"
                );
                Err(SubscriberError::panicked(name, panic_msg))
            }
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("kinds", &self.table.read().len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
