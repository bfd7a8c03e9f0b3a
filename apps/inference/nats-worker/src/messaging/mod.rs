//! Messaging abstraction layer
//!
//! Handlers only see [`InboundMessage`], [`ReplyPublisher`] and [`Acknowledge`],
//! so the reply/ack lifecycle can be exercised without a running server.

mod nats_broker;

pub use nats_broker::{CorePublisher, NatsBroker, StreamPublisher};

use crate::error::BrokerError;
use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;

/// Header carrying the reply address for messages delivered from a stream.
///
/// JetStream swaps a stored message's reply subject for its own ack subject,
/// so stream publishers put the reply address here instead.
pub const REPLY_TO_HEADER: &str = "Reply-To";

/// Delivery guarantee of the subscription a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryTier {
    /// Core NATS, at-most-once
    Standard,
    /// JetStream durable consumer, at-least-once
    Stream,
}

impl DeliveryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryTier::Standard => "standard",
            DeliveryTier::Stream => "stream",
        }
    }
}

impl fmt::Display for DeliveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Received message with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Subject the message was received on
    pub subject: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Reply subject for request-reply patterns
    pub reply: Option<String>,
}

impl InboundMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            reply: None,
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Reply address, or `None` when the sender expects no reply.
    pub fn reply_to(&self) -> Option<&str> {
        self.reply.as_deref().filter(|reply| !reply.trim().is_empty())
    }

    /// Payload as text for logging.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl From<async_nats::Message> for InboundMessage {
    fn from(message: async_nats::Message) -> Self {
        Self {
            subject: message.subject.to_string(),
            payload: message.payload.to_vec(),
            reply: message.reply.map(|reply| reply.to_string()),
        }
    }
}

impl From<&async_nats::jetstream::Message> for InboundMessage {
    fn from(message: &async_nats::jetstream::Message) -> Self {
        let reply = message
            .headers
            .as_ref()
            .and_then(|headers| headers.get(REPLY_TO_HEADER))
            .map(|value| value.as_str().to_string());

        Self {
            subject: message.subject.to_string(),
            payload: message.payload.to_vec(),
            reply,
        }
    }
}

/// Publishes replies on one delivery tier.
#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    /// Tier this publisher sends on
    fn tier(&self) -> DeliveryTier;

    /// Publish `payload` to `subject`
    async fn publish_reply(&self, subject: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// Marks a stream delivery as fully processed.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
}

#[async_trait]
impl Acknowledge for async_nats::jetstream::Message {
    async fn ack(&self) -> Result<(), BrokerError> {
        async_nats::jetstream::Message::ack(self)
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}
