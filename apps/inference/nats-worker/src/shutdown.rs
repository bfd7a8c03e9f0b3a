//! Process shutdown on SIGINT (Ctrl+C) or SIGTERM.

use std::future::pending;
use tokio::signal;
use tracing::{error, info};

/// Shutdown signal listener.
///
/// SIGTERM is registered by [`ShutdownSignal::install`], so a SIGTERM sent
/// any time after that is observed instead of killing the process.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: Option<signal::unix::Signal>,
}

impl ShutdownSignal {
    pub fn install() -> Self {
        #[cfg(unix)]
        let terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(terminate) => Some(terminate),
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                None
            }
        };

        Self {
            #[cfg(unix)]
            terminate,
        }
    }

    /// Resolves on the first Ctrl+C or SIGTERM.
    pub async fn recv(self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match self.terminate {
                Some(mut terminate) => {
                    terminate.recv().await;
                }
                None => pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, shutting down");
            },
            _ = terminate => {
                info!("Received SIGTERM, shutting down");
            },
        }
    }
}
