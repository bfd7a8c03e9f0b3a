//! Simulated task: wait, then reply with the payload echoed back.

use super::{HandlerOutcome, MessageHandler};
use crate::config::RuntimeTunables;
use crate::messaging::{InboundMessage, ReplyPublisher};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const REPLY_PREFIX: &str = "Processed: ";

/// Reply payload: [`REPLY_PREFIX`] followed by the inbound payload bytes.
pub fn build_reply(payload: &[u8]) -> Vec<u8> {
    let mut reply = Vec::with_capacity(REPLY_PREFIX.len() + payload.len());
    reply.extend_from_slice(REPLY_PREFIX.as_bytes());
    reply.extend_from_slice(payload);
    reply
}

/// Handler for task messages on either tier.
///
/// Holds no mutable state, so one instance is shared by every in-flight
/// invocation.
#[derive(Debug, Clone)]
pub struct TaskHandler {
    processing_time: Duration,
}

impl TaskHandler {
    pub fn new(tunables: &RuntimeTunables) -> Self {
        Self {
            processing_time: tunables.processing_time,
        }
    }

    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// Stand-in for real work.
    async fn process(&self) {
        if self.processing_time.is_zero() {
            return;
        }
        tokio::time::sleep(self.processing_time).await;
    }
}

#[async_trait]
impl MessageHandler for TaskHandler {
    #[instrument(
        skip(self, message, publisher),
        fields(tier = %publisher.tier(), subject = %message.subject)
    )]
    async fn handle(
        &self,
        message: &InboundMessage,
        publisher: &dyn ReplyPublisher,
    ) -> HandlerOutcome {
        info!(payload = %message.payload_text(), "Received task message");

        self.process().await;

        let Some(reply_to) = message.reply_to() else {
            debug!("No reply address, skipping reply");
            return HandlerOutcome::NoReplyExpected;
        };

        let reply = build_reply(&message.payload);
        match publisher.publish_reply(reply_to, reply).await {
            Ok(()) => {
                debug!(reply_to = %reply_to, "Reply published");
                HandlerOutcome::Replied {
                    reply_to: reply_to.to_string(),
                }
            }
            Err(error) => {
                warn!(reply_to = %reply_to, error = %error, "Failed to publish reply");
                HandlerOutcome::ReplyFailed {
                    reply_to: reply_to.to_string(),
                    error,
                }
            }
        }
    }
}
