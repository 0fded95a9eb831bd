use std::time::Duration;

use thiserror::Error;

/// Error reported by, or synthesized for, an operation subscriber.
///
/// Errors are cloneable so that a subscriber response can keep its own
/// error list while the broker also lists them in the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberError {
    /// Subscriber execution failed with a message.
    #[error("Subscriber execution failed: {0}")]
    Execution(String),

    /// Subscriber panicked while handling the event.
    #[error("Subscriber {subscriber} panicked: {message}")]
    Panicked { subscriber: String, message: String },

    /// Subscriber did not settle within the broker timeout.
    #[error("Subscriber {subscriber} timed out after {timeout:?}")]
    TimedOut {
        subscriber: String,
        timeout: Duration,
    },

    /// Any other failure, flattened to its message chain.
    #[error("{0}")]
    Other(String),
}

impl SubscriberError {
    /// Create an execution error from a string.
    pub fn execution(msg: impl Into<String>) -> Self {
        SubscriberError::Execution(msg.into())
    }

    /// Create a panic error for the named subscriber.
    pub fn panicked(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriberError::Panicked {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error for the named subscriber.
    pub fn timed_out(subscriber: impl Into<String>, timeout: Duration) -> Self {
        SubscriberError::TimedOut {
            subscriber: subscriber.into(),
            timeout,
        }
    }
}

impl From<anyhow::Error> for SubscriberError {
    fn from(err: anyhow::Error) -> Self {
        SubscriberError::Other(format!("{err:#}"))
    }
}

/// Returned when parsing a string that is not one of the 26 operation kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown operation kind: {0}")]
pub struct UnknownOperationKind(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_error_display() {
        let err = SubscriberError::execution("something went wrong");
        assert_eq!(
            err.to_string(),
            "Subscriber execution failed: something went wrong"
        );

        let err = SubscriberError::panicked("metrics", "boom");
        assert_eq!(err.to_string(), "Subscriber metrics panicked: boom");
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err = anyhow::anyhow!("disk full").context("writing audit record");
        let err: SubscriberError = err.into();
        assert_eq!(err.to_string(), "writing audit record: disk full");
    }
}
