//! Operation hook system for FHIR resource operations.
//!
//! The host publishes an [`OperationEvent`] before and after every resource
//! operation. The [`Broker`] fans each event out to the subscribers registered
//! for its [`OperationKind`] and returns an aggregate outcome the host can use
//! to abort or report the operation.
//!
//! ```text
//!        host ── publish(event) ──▶ Broker ──┬──▶ subscriber 1 (async)
//!          ▲                                  ├──▶ subscriber 2 (async)
//!          └──── AggregateOperationEventResponse ◀┘
//! ```
//!
//! # Module Structure
//!
//! - [`types`]: operation kinds, events and responses
//! - [`subscriber`]: subscriber trait and identity handles
//! - [`broker`]: subscription table and fan-out
//! - [`console`]: a subscriber that logs every event

pub mod broker;
pub mod console;
pub mod error;
pub mod subscriber;
pub mod types;

pub use broker::Broker;
pub use console::ConsoleSubscriber;
pub use error::{SubscriberError, UnknownOperationKind};
pub use subscriber::{OperationSubscriber, SubscriberHandle};
pub use types::{
    AggregateOperationEventResponse, OperationEvent, OperationEventResponse, OperationKind,
    RequestContext, RequestScope,
};
