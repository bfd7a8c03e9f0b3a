//! Runs both subscriptions over one broker connection.

use crate::config::Config;
use crate::error::BrokerError;
use crate::handlers::{MessageHandler, TaskHandler};
use crate::messaging::NatsBroker;
use crate::subscribers::{subscribe_durable, subscribe_standard};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// The task worker: one handler shared by the standard and stream tiers.
pub struct TaskWorker<H: MessageHandler> {
    handler: Arc<H>,
    config: Config,
}

impl TaskWorker<TaskHandler> {
    /// Worker running the simulated [`TaskHandler`].
    pub fn from_config(config: Config) -> Self {
        let handler = Arc::new(TaskHandler::new(&config.tunables));
        Self::new(handler, config)
    }
}

impl<H: MessageHandler + 'static> TaskWorker<H> {
    pub fn new(handler: Arc<H>, config: Config) -> Self {
        Self { handler, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe on both tiers and process messages until `shutdown`
    /// resolves or a subscription ends.
    ///
    /// Failing to register either subscription is returned immediately.
    /// The caller owns `broker` and closes it afterwards.
    pub async fn run(
        &self,
        broker: &NatsBroker,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), BrokerError> {
        let subscriptions = &self.config.subscriptions;
        let limit = self.config.worker.max_concurrent_handlers;

        info!(subject = %subscriptions.standard_subject, "Starting standard subscription");
        let mut standard = subscribe_standard(
            broker,
            &subscriptions.standard_subject,
            self.handler.clone(),
            limit,
        )
        .await?;

        info!(
            subject = %subscriptions.stream_subject,
            consumer = %subscriptions.durable_name,
            "Starting JetStream subscription"
        );
        let mut durable =
            match subscribe_durable(broker, subscriptions, self.handler.clone(), limit).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    standard.abort();
                    return Err(e);
                }
            };

        info!(
            processing_time_ms = self.config.tunables.processing_time.as_millis() as u64,
            max_concurrent_handlers = limit,
            "Task worker running"
        );

        let result = tokio::select! {
            _ = shutdown => {
                info!("Shutdown requested, stopping subscriptions");
                Ok(())
            }
            err = standard.closed() => Err(err),
            err = durable.closed() => Err(err),
        };

        standard.abort();
        durable.abort();
        result
    }
}
