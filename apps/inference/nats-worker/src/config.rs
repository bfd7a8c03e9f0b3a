//! Configuration for the NATS task worker
//!
//! Loaded once at startup and shared read-only by every component.

use core_config::{
    ConfigError, FromEnv, env_optional_parse, env_or_default, env_parse_or_default, env_required,
};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "nats://localhost:4222";
pub const DEFAULT_CLIENT_NAME: &str = "NATS Inference Manager Client";
pub const DEFAULT_EXECUTING_TIME_SECS: i64 = 1;
pub const DEFAULT_DURABLE_NAME: &str = "myDurableConsumer";
pub const DEFAULT_ACK_WAIT_SECS: u64 = 30;
/// The server reads an ack wait of zero as "use the server default".
pub const MIN_ACK_WAIT_SECS: u64 = 1;
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 10;

/// Where and how to connect to the NATS server.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub server_url: String,
    pub user: String,
    pub password: String,
    pub client_name: String,
}

impl ConnectionParams {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user: String::new(),
            password: String::new(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Credentials are only used when both user and password are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.user.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((&self.user, &self.password))
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server_url", &self.server_url)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("client_name", &self.client_name)
            .finish()
    }
}

impl FromEnv for ConnectionParams {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_url: env_or_default("NATS_SERVER_URL", DEFAULT_SERVER_URL),
            user: env_or_default("NATS_USER", ""),
            password: env_or_default("NATS_PASS", ""),
            client_name: env_or_default("NATS_CLIENT_NAME", DEFAULT_CLIENT_NAME),
        })
    }
}

/// Values that shape per-message work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeTunables {
    /// Simulated processing time per message
    pub processing_time: Duration,
}

impl RuntimeTunables {
    /// Negative second counts mean "no delay".
    pub fn from_secs(secs: i64) -> Self {
        Self {
            processing_time: Duration::from_secs(secs.max(0) as u64),
        }
    }
}

impl Default for RuntimeTunables {
    fn default() -> Self {
        Self::from_secs(DEFAULT_EXECUTING_TIME_SECS)
    }
}

impl FromEnv for RuntimeTunables {
    /// EXECUTING_TIME never fails: bad input logs a warning and keeps the default.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::from_secs(env_parse_or_default(
            "EXECUTING_TIME",
            DEFAULT_EXECUTING_TIME_SECS,
        )))
    }
}

/// Subjects and durable consumer settings for both delivery tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Standard (at-most-once) subject
    pub standard_subject: String,
    /// JetStream (at-least-once) subject
    pub stream_subject: String,
    /// Durable consumer name; must stay stable across restarts
    pub durable_name: String,
    /// Stream to create if missing; `None` means look up the stream by subject
    pub stream_name: Option<String>,
    /// How long the server waits for an ack before redelivering
    pub ack_wait: Duration,
}

impl SubscriptionConfig {
    pub fn new(standard_subject: impl Into<String>, stream_subject: impl Into<String>) -> Self {
        Self {
            standard_subject: standard_subject.into(),
            stream_subject: stream_subject.into(),
            durable_name: DEFAULT_DURABLE_NAME.to_string(),
            stream_name: None,
            ack_wait: Duration::from_secs(DEFAULT_ACK_WAIT_SECS),
        }
    }
}

impl FromEnv for SubscriptionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let stream_name = env_or_default("NATS_JS_STREAM", "");

        Ok(Self {
            standard_subject: non_empty_required("NATS_TOPIC")?,
            stream_subject: non_empty_required("NATS_JS_TOPIC")?,
            durable_name: env_or_default("NATS_JS_DURABLE", DEFAULT_DURABLE_NAME),
            stream_name: (!stream_name.is_empty()).then_some(stream_name),
            ack_wait: Duration::from_secs(
                env_parse_or_default("NATS_JS_ACK_WAIT", DEFAULT_ACK_WAIT_SECS)
                    .max(MIN_ACK_WAIT_SECS),
            ),
        })
    }
}

/// Process-level worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_concurrent_handlers: usize,
    pub metrics_port: Option<u16>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            metrics_port: None,
        }
    }
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_concurrent_handlers: env_parse_or_default(
                "MAX_CONCURRENT_HANDLERS",
                DEFAULT_MAX_CONCURRENT_HANDLERS,
            )
            .max(1),
            metrics_port: env_optional_parse("METRICS_PORT")?,
        })
    }
}

/// Complete worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub connection: ConnectionParams,
    pub tunables: RuntimeTunables,
    pub subscriptions: SubscriptionConfig,
    pub worker: WorkerSettings,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            connection: ConnectionParams::from_env()?,
            tunables: RuntimeTunables::from_env()?,
            subscriptions: SubscriptionConfig::from_env()?,
            worker: WorkerSettings::from_env()?,
        })
    }
}

fn non_empty_required(key: &str) -> Result<String, ConfigError> {
    let value = env_required(key)?;
    if value.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar(key.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KEYS: [&str; 12] = [
        "NATS_SERVER_URL",
        "NATS_USER",
        "NATS_PASS",
        "NATS_CLIENT_NAME",
        "NATS_TOPIC",
        "NATS_JS_TOPIC",
        "NATS_JS_DURABLE",
        "NATS_JS_STREAM",
        "NATS_JS_ACK_WAIT",
        "EXECUTING_TIME",
        "MAX_CONCURRENT_HANDLERS",
        "METRICS_PORT",
    ];

    /// Run `f` with every worker variable unset except the given overrides.
    fn with_env<R>(overrides: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let vars: Vec<(&str, Option<&str>)> = ALL_KEYS
            .iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| *v);
                (*key, value)
            })
            .collect();
        temp_env::with_vars(vars, f)
    }

    const SUBJECTS: [(&str, &str); 2] = [("NATS_TOPIC", "tasks.standard"), ("NATS_JS_TOPIC", "tasks.stream")];

    #[test]
    fn test_config_defaults() {
        with_env(&SUBJECTS, || {
            let config = Config::from_env().unwrap();

            assert_eq!(config.connection.server_url, "nats://localhost:4222");
            assert_eq!(config.connection.client_name, DEFAULT_CLIENT_NAME);
            assert!(config.connection.credentials().is_none());
            assert_eq!(config.tunables.processing_time, Duration::from_secs(1));
            assert_eq!(config.subscriptions.standard_subject, "tasks.standard");
            assert_eq!(config.subscriptions.stream_subject, "tasks.stream");
            assert_eq!(config.subscriptions.durable_name, "myDurableConsumer");
            assert_eq!(config.subscriptions.stream_name, None);
            assert_eq!(config.subscriptions.ack_wait, Duration::from_secs(30));
            assert_eq!(config.worker, WorkerSettings::default());
        });
    }

    #[test]
    fn test_config_custom_values() {
        with_env(
            &[
                ("NATS_SERVER_URL", "nats://broker:4222"),
                ("NATS_USER", "worker"),
                ("NATS_PASS", "secret"),
                ("NATS_TOPIC", "jobs.fast"),
                ("NATS_JS_TOPIC", "jobs.durable"),
                ("NATS_JS_DURABLE", "worker-a"),
                ("NATS_JS_STREAM", "JOBS"),
                ("NATS_JS_ACK_WAIT", "5"),
                ("EXECUTING_TIME", "3"),
                ("MAX_CONCURRENT_HANDLERS", "2"),
                ("METRICS_PORT", "9100"),
            ],
            || {
                let config = Config::from_env().unwrap();

                assert_eq!(config.connection.server_url, "nats://broker:4222");
                assert_eq!(config.connection.credentials(), Some(("worker", "secret")));
                assert_eq!(config.tunables.processing_time, Duration::from_secs(3));
                assert_eq!(config.subscriptions.durable_name, "worker-a");
                assert_eq!(config.subscriptions.stream_name.as_deref(), Some("JOBS"));
                assert_eq!(config.subscriptions.ack_wait, Duration::from_secs(5));
                assert_eq!(config.worker.max_concurrent_handlers, 2);
                assert_eq!(config.worker.metrics_port, Some(9100));
            },
        );
    }

    #[test]
    fn test_ack_wait_zero_clamps_to_one_second() {
        with_env(&[SUBJECTS[0], SUBJECTS[1], ("NATS_JS_ACK_WAIT", "0")], || {
            let subscriptions = SubscriptionConfig::from_env().unwrap();
            assert_eq!(subscriptions.ack_wait, Duration::from_secs(1));
        });
    }

    #[test]
    fn test_executing_time_zero_means_no_delay() {
        with_env(&[("EXECUTING_TIME", "0")], || {
            let tunables = RuntimeTunables::from_env().unwrap();
            assert_eq!(tunables.processing_time, Duration::ZERO);
        });
    }

    #[test]
    fn test_executing_time_non_numeric_falls_back_to_default() {
        with_env(&[("EXECUTING_TIME", "abc")], || {
            let tunables = RuntimeTunables::from_env().unwrap();
            assert_eq!(tunables.processing_time, Duration::from_secs(1));
        });
    }

    #[test]
    fn test_executing_time_negative_clamps_to_zero() {
        with_env(&[("EXECUTING_TIME", "-5")], || {
            let tunables = RuntimeTunables::from_env().unwrap();
            assert_eq!(tunables.processing_time, Duration::ZERO);
        });
    }

    #[test]
    fn test_credentials_require_both_user_and_password() {
        with_env(&[("NATS_USER", "worker")], || {
            let params = ConnectionParams::from_env().unwrap();
            assert!(params.credentials().is_none());
        });

        with_env(&[("NATS_PASS", "secret")], || {
            let params = ConnectionParams::from_env().unwrap();
            assert!(params.credentials().is_none());
        });

        let params = ConnectionParams::new("nats://localhost:4222").with_credentials("u", "p");
        assert_eq!(params.credentials(), Some(("u", "p")));
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectionParams::new("nats://localhost:4222").with_credentials("u", "hunter2");
        let rendered = format!("{:?}", params);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_missing_subjects_are_fatal() {
        with_env(&[("NATS_JS_TOPIC", "tasks.stream")], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("NATS_TOPIC"));
        });

        with_env(&[("NATS_TOPIC", "tasks.standard"), ("NATS_JS_TOPIC", " ")], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("NATS_JS_TOPIC"));
        });
    }

    #[test]
    fn test_invalid_metrics_port_is_an_error() {
        let mut vars = SUBJECTS.to_vec();
        vars.push(("METRICS_PORT", "not-a-port"));
        with_env(&vars, || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("METRICS_PORT"));
        });
    }

    #[test]
    fn test_max_concurrent_handlers_is_at_least_one() {
        with_env(&[("MAX_CONCURRENT_HANDLERS", "0")], || {
            let settings = WorkerSettings::from_env().unwrap();
            assert_eq!(settings.max_concurrent_handlers, 1);
        });
    }
}
