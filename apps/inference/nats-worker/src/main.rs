//! Inference NATS Worker binary

use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv, load_dotenv};
use eyre::{Result, WrapErr};
use inference_nats_worker::metrics::init_metrics;
use inference_nats_worker::{Config, NatsBroker, ShutdownSignal, TaskWorker};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let dotenv_loaded = load_dotenv();
    init_tracing(&Environment::from_env());
    if !dotenv_loaded {
        info!("No .env file found, using process environment");
    }

    info!("Starting inference NATS worker");
    let shutdown = ShutdownSignal::install();

    let config = Config::from_env().wrap_err("Invalid worker configuration")?;
    debug!(config = ?config, "Configuration loaded");

    if let Some(port) = config.worker.metrics_port {
        init_metrics(port).wrap_err("Failed to start metrics endpoint")?;
    }

    let broker = NatsBroker::connect(&config.connection)
        .await
        .wrap_err_with(|| format!("Error creating NATS client for {}", config.connection.server_url))?;

    let worker = TaskWorker::from_config(config);
    let result = worker.run(&broker, shutdown.recv()).await;

    // Close on every path once connected, including failed subscriptions.
    let closed = broker.close().await;

    result.wrap_err("Task worker stopped")?;
    closed.wrap_err("Failed to close NATS connection")?;

    info!("Inference NATS worker shut down");
    Ok(())
}
