//! Console subscriber.
//!
//! Logs every operation event it sees. Useful as a smoke test of the hook
//! wiring and as a template for custom subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::broker::Broker;
use crate::error::SubscriberError;
use crate::subscriber::{OperationSubscriber, SubscriberHandle};
use crate::types::{OperationEvent, OperationEventResponse, OperationKind};

/// Subscriber that writes each event to the log at `info` level.
#[derive(Debug, Default)]
pub struct ConsoleSubscriber;

impl ConsoleSubscriber {
    /// Subscribe a console logger to every operation kind.
    ///
    /// Returns the handle so the caller can unsubscribe later.
    pub fn register(broker: &Broker) -> SubscriberHandle {
        let handle = SubscriberHandle::new(Arc::new(ConsoleSubscriber));
        broker.subscribe(OperationKind::ALL, &handle);
        handle
    }
}

#[async_trait]
impl OperationSubscriber for ConsoleSubscriber {
    fn name(&self) -> &str {
        "console"
    }

    async fn handle(
        &self,
        event: &OperationEvent,
    ) -> Result<OperationEventResponse, SubscriberError> {
        // Let the publisher's other subscribers start before we log
        tokio::task::yield_now().await;

        let scope = event.scope();
        info!(
            operation = %event.operation,
            tenant_id = scope.tenant_id(),
            resource_type = scope.resource_type(),
            timestamp = %event.timestamp,
            has_response = event.response.is_some(),
            "Operation event"
        );
        Ok(OperationEventResponse::ok())
    }
}
