//! Error types for broker operations.

use thiserror::Error;

/// Errors raised while talking to the NATS server.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Initial connection could not be established
    #[error("NATS connection error: {0}")]
    Connection(#[from] async_nats::ConnectError),

    /// JetStream context, stream, or consumer operation failed
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Subscription registration failed
    #[error("Subscribe error on '{subject}': {details}")]
    Subscribe { subject: String, details: String },

    /// Reply publish failed
    #[error("Publish error on '{subject}': {details}")]
    Publish { subject: String, details: String },

    /// Acknowledgement could not be sent
    #[error("Ack error: {0}")]
    Ack(String),

    /// Flushing pending messages on close failed
    #[error("Flush error: {0}")]
    Flush(String),

    /// A subscription's message stream ended while the process was running
    #[error("Subscription on '{0}' closed unexpectedly")]
    SubscriptionClosed(String),
}

impl BrokerError {
    /// Create a JetStream error from any async_nats error.
    pub fn from_jetstream_error(error: impl std::fmt::Display) -> Self {
        Self::JetStream(error.to_string())
    }

    /// Create a subscribe error.
    pub fn subscribe_error(subject: &str, error: impl std::fmt::Display) -> Self {
        Self::Subscribe {
            subject: subject.to_string(),
            details: error.to_string(),
        }
    }

    /// Create a publish error.
    pub fn publish_error(subject: &str, error: impl std::fmt::Display) -> Self {
        Self::Publish {
            subject: subject.to_string(),
            details: error.to_string(),
        }
    }
}
