//! NATS connection and the two reply publishers built on it

use super::{DeliveryTier, ReplyPublisher};
use crate::config::ConnectionParams;
use crate::error::BrokerError;
use async_nats::jetstream::{self, Context};
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

/// One NATS connection exposing a core client and a JetStream context.
///
/// The JetStream context shares the client's connection; no second socket
/// is opened.
pub struct NatsBroker {
    client: Client,
    jetstream: Context,
}

impl NatsBroker {
    /// Connect to NATS and verify JetStream is available on the account.
    #[instrument(skip(params), fields(server_url = %params.server_url))]
    pub async fn connect(params: &ConnectionParams) -> Result<Self, BrokerError> {
        let mut options = ConnectOptions::new().name(params.client_name.as_str());

        if let Some((user, password)) = params.credentials() {
            debug!(user = %user, "Connecting with user credentials");
            options = options.user_and_password(user.to_string(), password.to_string());
        }

        let client = options.connect(params.server_url.as_str()).await?;
        info!("Connected to NATS");

        let jetstream = jetstream::new(client.clone());
        jetstream
            .query_account()
            .await
            .map_err(BrokerError::from_jetstream_error)?;
        debug!("JetStream context ready");

        Ok(Self { client, jetstream })
    }

    /// Get the underlying NATS client for advanced operations
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the JetStream context sharing this connection
    pub fn jetstream(&self) -> &Context {
        &self.jetstream
    }

    /// Publisher for standard-tier replies
    pub fn core_publisher(&self) -> CorePublisher {
        CorePublisher::new(self.client.clone())
    }

    /// Publisher for stream-tier replies
    pub fn stream_publisher(&self) -> StreamPublisher {
        StreamPublisher::new(self.jetstream.clone())
    }

    /// Flush buffered publishes and release the connection.
    pub async fn close(self) -> Result<(), BrokerError> {
        self.client
            .flush()
            .await
            .map_err(|e| BrokerError::Flush(e.to_string()))?;
        drop(self.jetstream);
        drop(self.client);
        info!("NATS connection closed");
        Ok(())
    }
}

/// Fire-and-forget publisher on core NATS.
#[derive(Clone)]
pub struct CorePublisher {
    client: Client,
}

impl CorePublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReplyPublisher for CorePublisher {
    fn tier(&self) -> DeliveryTier {
        DeliveryTier::Standard
    }

    async fn publish_reply(&self, subject: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BrokerError::publish_error(subject, e))
    }
}

/// JetStream publisher; a publish only succeeds once the stream acks it.
#[derive(Clone)]
pub struct StreamPublisher {
    jetstream: Context,
}

impl StreamPublisher {
    pub fn new(jetstream: Context) -> Self {
        Self { jetstream }
    }
}

#[async_trait]
impl ReplyPublisher for StreamPublisher {
    fn tier(&self) -> DeliveryTier {
        DeliveryTier::Stream
    }

    async fn publish_reply(&self, subject: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let ack = self
            .jetstream
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BrokerError::publish_error(subject, e))?
            .await
            .map_err(|e| BrokerError::publish_error(subject, e))?;

        debug!(
            subject = %subject,
            stream = %ack.stream,
            sequence = ack.sequence,
            "Reply stored in stream"
        );
        Ok(())
    }
}
