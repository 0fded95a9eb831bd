//! Subscriber trait and identity handles.
//!
//! Subscribers are asynchronous handlers invoked by the [`Broker`](crate::Broker)
//! for every published event of the kinds they registered for. They are:
//! - **Async**: the broker awaits all of them concurrently
//! - **Isolated**: an error or panic in one never affects the others
//! - **Identity-keyed**: a [`SubscriberHandle`] compares by pointer, not by value

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SubscriberError;
use crate::types::{OperationEvent, OperationEventResponse};

/// Trait for operation event subscribers.
///
/// # Implementation Notes
///
/// - Returning `Ok` with `success: false` reports a handled failure; its
///   errors are copied into the aggregate response.
/// - Returning `Err` (or panicking) is treated as a fault: the broker
///   synthesizes one error and records no response for this subscriber.
/// - The broker imposes no timeout unless built with
///   [`Broker::with_timeout`](crate::Broker::with_timeout).
///
/// # Example
///
/// ```ignore
/// struct AuditTrail;
///
/// #[async_trait]
/// impl OperationSubscriber for AuditTrail {
///     fn name(&self) -> &str { "audit_trail" }
///
///     async fn handle(&self, event: &OperationEvent) -> Result<OperationEventResponse, SubscriberError> {
///         record(event).await?;
///         Ok(OperationEventResponse::ok())
///     }
/// }
/// ```
#[async_trait]
pub trait OperationSubscriber: Send + Sync {
    /// Name used in logs and synthesized errors.
    fn name(&self) -> &str;

    /// Handle one published event.
    async fn handle(
        &self,
        event: &OperationEvent,
    ) -> Result<OperationEventResponse, SubscriberError>;
}

/// Registration capability for a subscriber.
///
/// Two handles are equal only if they point at the same subscriber
/// allocation; cloning a handle keeps its identity.
#[derive(Clone)]
pub struct SubscriberHandle(Arc<dyn OperationSubscriber>);

impl SubscriberHandle {
    /// Wrap a concrete subscriber.
    pub fn new<S: OperationSubscriber + 'static>(subscriber: Arc<S>) -> Self {
        Self(subscriber)
    }

    /// Wrap an already type-erased subscriber.
    pub fn from_dyn(subscriber: Arc<dyn OperationSubscriber>) -> Self {
        Self(subscriber)
    }

    /// Build a subscriber from an async closure.
    ///
    /// The closure receives its own copy of the event.
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(OperationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationEventResponse, SubscriberError>> + Send + 'static,
    {
        Self(Arc::new(FnSubscriber {
            name: name.into(),
            f,
        }))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub(crate) fn subscriber(&self) -> &Arc<dyn OperationSubscriber> {
        &self.0
    }
}

impl PartialEq for SubscriberHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for SubscriberHandle {}

impl<S: OperationSubscriber + 'static> From<Arc<S>> for SubscriberHandle {
    fn from(subscriber: Arc<S>) -> Self {
        Self::new(subscriber)
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("name", &self.name())
            .field("ptr", &Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

struct FnSubscriber<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> OperationSubscriber for FnSubscriber<F>
where
    F: Fn(OperationEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<OperationEventResponse, SubscriberError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        event: &OperationEvent,
    ) -> Result<OperationEventResponse, SubscriberError> {
        (self.f)(event.clone()).await
    }
}
