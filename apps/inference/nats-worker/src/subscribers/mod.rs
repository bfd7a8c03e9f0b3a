//! Subscriptions for the two delivery tiers.
//!
//! Each subscription owns a dispatch task that hands every delivery to its
//! own Tokio task, bounded by a semaphore.

pub mod durable;
pub mod standard;

pub use durable::{AckDecision, StreamDelivery, process_durable, subscribe_durable};
pub use standard::{process_standard, subscribe_standard};

use crate::error::BrokerError;
use crate::messaging::DeliveryTier;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a live subscription.
pub struct Subscription {
    tier: DeliveryTier,
    subject: String,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(tier: DeliveryTier, subject: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            tier,
            subject: subject.into(),
            task,
        }
    }

    pub fn tier(&self) -> DeliveryTier {
        self.tier
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Resolves when the dispatch loop ends. While the process is running
    /// that only happens if the server side of the subscription went away.
    pub async fn closed(&mut self) -> BrokerError {
        if let Err(e) = (&mut self.task).await {
            debug!(tier = %self.tier, error = %e, "Dispatch task ended abnormally");
        }
        BrokerError::SubscriptionClosed(self.subject.clone())
    }

    /// Stop dispatching new messages.
    pub fn abort(&self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_reports_subject() {
        let task = tokio::spawn(async {});
        let mut subscription = Subscription::new(DeliveryTier::Standard, "tasks.standard", task);

        assert_eq!(subscription.tier(), DeliveryTier::Standard);
        assert_eq!(subscription.subject(), "tasks.standard");

        let err = subscription.closed().await;
        assert!(matches!(err, BrokerError::SubscriptionClosed(ref s) if s == "tasks.standard"));
    }

    #[tokio::test]
    async fn test_abort_ends_dispatch() {
        let task = tokio::spawn(std::future::pending::<()>());
        let mut subscription = Subscription::new(DeliveryTier::Stream, "tasks.stream", task);

        subscription.abort();
        let err = subscription.closed().await;
        assert!(matches!(err, BrokerError::SubscriptionClosed(_)));
    }
}
