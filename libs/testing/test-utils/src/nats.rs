//! NATS test infrastructure
//!
//! Provides a `TestNats` helper that creates a NATS container with JetStream for testing.

use async_nats::Client;
use async_nats::jetstream::stream::{Config as StreamConfig, Stream};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

// Re-export for test convenience
pub use futures::StreamExt;

/// Test NATS wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
/// JetStream is always enabled.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::new().await;
/// let client = nats.client();
/// let stream = nats.create_stream("TASKS", "tasks.>").await;
/// # }
/// ```
pub struct TestNats {
    #[allow(dead_code)]
    container: ContainerAsync<Nats>,
    client: Client,
    pub connection_string: String,
    credentials: Option<(String, String)>,
}

impl TestNats {
    /// Create a new test NATS instance with JetStream enabled
    pub async fn new() -> Self {
        Self::start(None).await
    }

    /// Same as [`TestNats::new`] but the server requires `user`/`password`.
    pub async fn with_credentials(user: &str, password: &str) -> Self {
        Self::start(Some((user.to_string(), password.to_string()))).await
    }

    async fn start(credentials: Option<(String, String)>) -> Self {
        let mut args = vec!["-js".to_string()];
        if let Some((user, password)) = &credentials {
            args.extend(["--user".to_string(), user.clone()]);
            args.extend(["--pass".to_string(), password.clone()]);
        }

        let container = Nats::default()
            .with_tag("latest")
            .with_cmd(args)
            .start()
            .await
            .expect("Failed to start NATS container");

        let host_port = container
            .get_host_port_ipv4(4222)
            .await
            .expect("Failed to get NATS port");

        let connection_string = format!("nats://127.0.0.1:{}", host_port);

        let mut options = async_nats::ConnectOptions::new().name("test-utils");
        if let Some((user, password)) = &credentials {
            options = options.user_and_password(user.clone(), password.clone());
        }
        let client = options
            .connect(&connection_string)
            .await
            .expect("Failed to connect to NATS");

        tracing::info!(
            port = host_port,
            auth = credentials.is_some(),
            "Test NATS ready with JetStream"
        );

        Self {
            container,
            client,
            connection_string,
            credentials,
        }
    }

    /// Get a cloned client
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        async_nats::jetstream::new(self.client.clone())
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// User and password the server was started with, if any
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(user, password)| (user.as_str(), password.as_str()))
    }

    /// Create a stream capturing `subject` (wildcards allowed)
    pub async fn create_stream(&self, name: &str, subject: &str) -> Stream {
        self.jetstream()
            .create_stream(StreamConfig {
                name: name.to_string(),
                subjects: vec![subject.to_string()],
                ..Default::default()
            })
            .await
            .expect("Failed to create stream")
    }
}

// Container is automatically cleaned up when TestNats is dropped
impl Drop for TestNats {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test NATS container");
    }
}
