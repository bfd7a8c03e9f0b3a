//! JetStream durable consumer (at-least-once).
//!
//! The reply is published before the ack. If the reply fails the ack is
//! withheld and the server redelivers once `ack_wait` expires; there is no
//! local retry, backoff, or delivery counter. A lost ack after a successful
//! reply produces a duplicate reply with identical content.

use super::Subscription;
use crate::config::SubscriptionConfig;
use crate::error::BrokerError;
use crate::handlers::{HandlerOutcome, MessageHandler};
use crate::messaging::{Acknowledge, DeliveryTier, InboundMessage, NatsBroker, ReplyPublisher};
use crate::metrics::WorkerMetrics;
use async_nats::jetstream::consumer::{AckPolicy, pull};
use async_nats::jetstream::{self, Context};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// What happened to the ack for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Acked; the consumer's cursor moves past this message
    Acked,
    /// Reply failed, ack withheld; the server will redeliver
    Withheld,
    /// Ack was attempted but failed; the server will redeliver
    AckFailed,
}

/// A message pulled from the durable consumer plus its ack handle.
pub struct StreamDelivery<A> {
    pub message: InboundMessage,
    /// How many times the server has delivered this message
    pub delivered: i64,
    pub acker: A,
}

impl<A> StreamDelivery<A> {
    pub fn is_redelivery(&self) -> bool {
        self.delivered > 1
    }
}

impl From<jetstream::Message> for StreamDelivery<jetstream::Message> {
    fn from(message: jetstream::Message) -> Self {
        let delivered = match message.info() {
            Ok(info) => info.delivered,
            Err(e) => {
                warn!(error = %e, "Failed to read delivery info, assuming first delivery");
                1
            }
        };

        Self {
            message: InboundMessage::from(&message),
            delivered,
            acker: message,
        }
    }
}

/// Bind `handler` to the durable consumer named in `config`.
///
/// The consumer is created on first use and reused on restart, so the same
/// durable name resumes from the same position.
pub async fn subscribe_durable<H>(
    broker: &NatsBroker,
    config: &SubscriptionConfig,
    handler: Arc<H>,
    max_concurrent: usize,
) -> Result<Subscription, BrokerError>
where
    H: MessageHandler + 'static,
{
    let stream = resolve_stream(broker.jetstream(), config).await?;

    let consumer = stream
        .get_or_create_consumer(
            &config.durable_name,
            consumer_config(config, max_concurrent),
        )
        .await
        .map_err(|e| BrokerError::subscribe_error(&config.stream_subject, e))?;

    let messages = consumer
        .stream()
        .max_messages_per_batch(pull_batch_size(max_concurrent))
        .messages()
        .await
        .map_err(|e| BrokerError::subscribe_error(&config.stream_subject, e))?;

    info!(
        subject = %config.stream_subject,
        consumer = %config.durable_name,
        ack_wait_secs = config.ack_wait.as_secs(),
        "Listening for JetStream messages"
    );

    let deliveries = Box::pin(
        messages.map(|item| item.map(StreamDelivery::<jetstream::Message>::from)),
    );
    let publisher = Arc::new(broker.stream_publisher());
    let limiter = Arc::new(Semaphore::new(max_concurrent));

    let task = tokio::spawn(dispatch(deliveries, handler, publisher, limiter));
    Ok(Subscription::new(
        DeliveryTier::Stream,
        config.stream_subject.as_str(),
        task,
    ))
}

/// Durable consumer settings.
///
/// `max_ack_pending` caps unacked deliveries at the handler limit, so no
/// message waits for a permit while its `ack_wait` runs out.
fn consumer_config(config: &SubscriptionConfig, max_concurrent: usize) -> pull::Config {
    pull::Config {
        durable_name: Some(config.durable_name.clone()),
        ack_policy: AckPolicy::Explicit,
        ack_wait: config.ack_wait,
        filter_subject: config.stream_subject.clone(),
        max_ack_pending: pull_batch_size(max_concurrent) as i64,
        ..Default::default()
    }
}

/// Messages requested per pull; never more than can be handled at once.
fn pull_batch_size(max_concurrent: usize) -> usize {
    max_concurrent.max(1)
}

/// Find the stream capturing the durable subject, creating it when a stream
/// name is configured.
async fn resolve_stream(
    jetstream: &Context,
    config: &SubscriptionConfig,
) -> Result<jetstream::stream::Stream, BrokerError> {
    match &config.stream_name {
        Some(name) => {
            let stream = jetstream
                .get_or_create_stream(jetstream::stream::Config {
                    name: name.clone(),
                    subjects: vec![config.stream_subject.clone()],
                    ..Default::default()
                })
                .await
                .map_err(BrokerError::from_jetstream_error)?;
            debug!(stream = %name, "Stream ready");
            Ok(stream)
        }
        None => {
            let name = jetstream
                .stream_by_subject(config.stream_subject.clone())
                .await
                .map_err(|e| {
                    BrokerError::JetStream(format!(
                        "no stream captures subject '{}': {}",
                        config.stream_subject, e
                    ))
                })?;
            debug!(stream = %name, "Found stream for subject");
            jetstream
                .get_stream(&name)
                .await
                .map_err(BrokerError::from_jetstream_error)
        }
    }
}

/// Hand each delivery to its own task, waiting for a permit first.
pub(crate) async fn dispatch<S, E, A, H, P>(
    mut deliveries: S,
    handler: Arc<H>,
    publisher: Arc<P>,
    limiter: Arc<Semaphore>,
) where
    S: Stream<Item = Result<StreamDelivery<A>, E>> + Unpin,
    E: Display,
    A: Acknowledge + 'static,
    H: MessageHandler + 'static,
    P: ReplyPublisher + 'static,
{
    let metrics = WorkerMetrics::new(DeliveryTier::Stream);

    while let Some(item) = deliveries.next().await {
        let delivery = match item {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(error = %e, "Error receiving JetStream message");
                continue;
            }
        };

        let Ok(permit) = limiter.clone().acquire_owned().await else {
            error!("Handler limiter closed, stopping JetStream dispatch");
            break;
        };
        let handler = handler.clone();
        let publisher = publisher.clone();

        tokio::spawn(async move {
            if delivery.is_redelivery() {
                metrics.redelivery();
                debug!(
                    subject = %delivery.message.subject,
                    delivered = delivery.delivered,
                    "Processing redelivered message"
                );
            }
            process_durable(
                handler.as_ref(),
                publisher.as_ref(),
                &delivery.message,
                &delivery.acker,
                metrics,
            )
            .await;
            drop(permit);
        });
    }

    warn!("JetStream subscription stream ended");
}

/// Run the handler, then ack only if the outcome allows it.
pub async fn process_durable<H, A>(
    handler: &H,
    publisher: &dyn ReplyPublisher,
    message: &InboundMessage,
    acker: &A,
    metrics: WorkerMetrics,
) -> AckDecision
where
    H: MessageHandler + ?Sized,
    A: Acknowledge + ?Sized,
{
    metrics.message_received();
    let start = Instant::now();

    let outcome = handler.handle(message, publisher).await;
    metrics.handler_finished(start.elapsed());

    match &outcome {
        HandlerOutcome::Replied { .. } => metrics.reply_published(),
        HandlerOutcome::NoReplyExpected => metrics.reply_skipped(),
        HandlerOutcome::ReplyFailed { reply_to, error } => {
            metrics.reply_failed();
            metrics.ack_withheld();
            warn!(
                subject = %message.subject,
                reply_to = %reply_to,
                error = %error,
                "Failed to publish JetStream reply, withholding ack for redelivery"
            );
        }
    }

    if !outcome.should_ack() {
        return AckDecision::Withheld;
    }

    match acker.ack().await {
        Ok(()) => {
            metrics.message_acked();
            AckDecision::Acked
        }
        Err(e) => {
            metrics.ack_failed();
            warn!(
                subject = %message.subject,
                error = %e,
                "Failed to ack JetStream message, it will be redelivered"
            );
            AckDecision::AckFailed
        }
    }
}
