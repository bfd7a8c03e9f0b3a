//! Message handlers invoked once per delivery

mod task;

pub use task::{REPLY_PREFIX, TaskHandler, build_reply};

use crate::error::BrokerError;
use crate::messaging::{InboundMessage, ReplyPublisher};
use async_trait::async_trait;

/// Trait for message handlers
///
/// Handlers publish their reply through the given publisher and report what
/// happened; whether to acknowledge is decided by the subscriber.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message
    async fn handle(&self, message: &InboundMessage, publisher: &dyn ReplyPublisher)
        -> HandlerOutcome;
}

/// Result of one handler invocation.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// Reply published to the message's reply address
    Replied { reply_to: String },
    /// Message carried no reply address; nothing was published
    NoReplyExpected,
    /// Reply publish failed
    ReplyFailed { reply_to: String, error: BrokerError },
}

impl HandlerOutcome {
    /// Whether a stream delivery may be acknowledged after this outcome.
    pub fn should_ack(&self) -> bool {
        !matches!(self, HandlerOutcome::ReplyFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_ack() {
        assert!(HandlerOutcome::Replied {
            reply_to: "r".to_string()
        }
        .should_ack());
        assert!(HandlerOutcome::NoReplyExpected.should_ack());
        assert!(!HandlerOutcome::ReplyFailed {
            reply_to: "r".to_string(),
            error: BrokerError::publish_error("r", "timeout"),
        }
        .should_ack());
    }
}
