//! Inference NATS Worker
//!
//! Consumes task messages on two delivery tiers over a single NATS
//! connection and replies to each one:
//!
//! - **standard** (core NATS, at-most-once): reply is fire-and-forget; a
//!   failed reply drops the message.
//! - **stream** (JetStream durable consumer, at-least-once): reply first,
//!   ack second; a failed reply withholds the ack so the server redelivers.

pub mod config;
pub mod error;
pub mod handlers;
pub mod messaging;
pub mod metrics;
pub mod shutdown;
pub mod subscribers;
pub mod worker;

pub use config::Config;
pub use error::BrokerError;
pub use handlers::{HandlerOutcome, MessageHandler, TaskHandler};
pub use messaging::{InboundMessage, NatsBroker, ReplyPublisher};
pub use shutdown::ShutdownSignal;
pub use worker::TaskWorker;
