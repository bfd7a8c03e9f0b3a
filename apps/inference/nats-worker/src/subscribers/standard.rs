//! Core NATS subscription (at-most-once).
//!
//! The server considers a message delivered as soon as it reaches this
//! process. A failed reply is logged and the message is gone.

use super::Subscription;
use crate::error::BrokerError;
use crate::handlers::{HandlerOutcome, MessageHandler};
use crate::messaging::{DeliveryTier, InboundMessage, NatsBroker, ReplyPublisher};
use crate::metrics::WorkerMetrics;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Subscribe `handler` to `subject` on core NATS.
///
/// Registration errors are returned; once registered, messages are handled
/// in the background until the connection goes away.
pub async fn subscribe_standard<H>(
    broker: &NatsBroker,
    subject: &str,
    handler: Arc<H>,
    max_concurrent: usize,
) -> Result<Subscription, BrokerError>
where
    H: MessageHandler + 'static,
{
    let subscriber = broker
        .client()
        .subscribe(subject.to_string())
        .await
        .map_err(|e| BrokerError::subscribe_error(subject, e))?;

    info!(subject = %subject, "Listening for standard messages");

    let messages = Box::pin(subscriber.map(InboundMessage::from));
    let publisher = Arc::new(broker.core_publisher());
    let limiter = Arc::new(Semaphore::new(max_concurrent));

    let task = tokio::spawn(dispatch(messages, handler, publisher, limiter));
    Ok(Subscription::new(DeliveryTier::Standard, subject, task))
}

/// Hand each message to its own task, waiting for a permit first.
pub(crate) async fn dispatch<S, H, P>(
    mut messages: S,
    handler: Arc<H>,
    publisher: Arc<P>,
    limiter: Arc<Semaphore>,
) where
    S: Stream<Item = InboundMessage> + Unpin,
    H: MessageHandler + 'static,
    P: ReplyPublisher + 'static,
{
    let metrics = WorkerMetrics::new(DeliveryTier::Standard);

    while let Some(message) = messages.next().await {
        let Ok(permit) = limiter.clone().acquire_owned().await else {
            error!("Handler limiter closed, stopping standard dispatch");
            break;
        };
        let handler = handler.clone();
        let publisher = publisher.clone();

        tokio::spawn(async move {
            process_standard(handler.as_ref(), publisher.as_ref(), message, metrics).await;
            drop(permit);
        });
    }

    warn!("Standard subscription stream ended");
}

/// Run the handler once. There is no ack and no retry on this tier.
pub async fn process_standard<H>(
    handler: &H,
    publisher: &dyn ReplyPublisher,
    message: InboundMessage,
    metrics: WorkerMetrics,
) -> HandlerOutcome
where
    H: MessageHandler + ?Sized,
{
    metrics.message_received();
    let start = Instant::now();

    let outcome = handler.handle(&message, publisher).await;
    metrics.handler_finished(start.elapsed());

    match &outcome {
        HandlerOutcome::Replied { .. } => metrics.reply_published(),
        HandlerOutcome::NoReplyExpected => metrics.reply_skipped(),
        HandlerOutcome::ReplyFailed { reply_to, error } => {
            metrics.reply_failed();
            metrics.message_dropped();
            warn!(
                subject = %message.subject,
                reply_to = %reply_to,
                error = %error,
                "Failed to publish standard reply, dropping message"
            );
        }
    }

    outcome
}
