//! Prometheus metrics for the task worker.
//!
//! The `metrics` macros are lock-free, so handlers on both tiers record into
//! the same series concurrently. Without an installed recorder every call is
//! a no-op.

use crate::messaging::DeliveryTier;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Metrics for one delivery tier.
#[derive(Debug, Clone, Copy)]
pub struct WorkerMetrics {
    tier: DeliveryTier,
}

impl WorkerMetrics {
    pub fn new(tier: DeliveryTier) -> Self {
        Self { tier }
    }

    fn label(&self) -> &'static str {
        self.tier.as_str()
    }

    /// Record a message received.
    pub fn message_received(&self) {
        counter!("task_worker_messages_received_total", "tier" => self.label()).increment(1);
    }

    /// Record a handler invocation finishing.
    pub fn handler_finished(&self, duration: Duration) {
        histogram!("task_worker_handler_duration_seconds", "tier" => self.label())
            .record(duration.as_secs_f64());
    }

    pub fn reply_published(&self) {
        counter!("task_worker_replies_published_total", "tier" => self.label()).increment(1);
    }

    pub fn reply_failed(&self) {
        counter!("task_worker_replies_failed_total", "tier" => self.label()).increment(1);
    }

    pub fn reply_skipped(&self) {
        counter!("task_worker_replies_skipped_total", "tier" => self.label()).increment(1);
    }

    /// Standard-tier message whose reply was lost.
    pub fn message_dropped(&self) {
        counter!("task_worker_messages_dropped_total", "tier" => self.label()).increment(1);
    }

    pub fn message_acked(&self) {
        counter!("task_worker_messages_acked_total", "tier" => self.label()).increment(1);
    }

    /// Ack deliberately withheld so the server redelivers.
    pub fn ack_withheld(&self) {
        counter!("task_worker_acks_withheld_total", "tier" => self.label()).increment(1);
    }

    pub fn ack_failed(&self) {
        counter!("task_worker_acks_failed_total", "tier" => self.label()).increment(1);
    }

    /// Record a stream message delivered more than once.
    pub fn redelivery(&self) {
        counter!("task_worker_redeliveries_total", "tier" => self.label()).increment(1);
    }
}

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(%addr, "Prometheus metrics endpoint listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = WorkerMetrics::new(DeliveryTier::Stream);
        metrics.message_received();
        metrics.reply_failed();
        metrics.ack_withheld();
        metrics.handler_finished(Duration::from_millis(5));
    }

    #[test]
    fn test_metrics_are_labelled_by_tier() {
        assert_eq!(WorkerMetrics::new(DeliveryTier::Standard).label(), "standard");
        assert_eq!(WorkerMetrics::new(DeliveryTier::Stream).label(), "stream");
    }
}
