//! Server lifecycle: bind, serve, and shut down gracefully.

use std::future::{Future, IntoFuture};
use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use glue_core::ConfigError;
use glue_core::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    /// How long in-flight requests get to finish once shutdown starts.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Reads `SERVER_ADDRESS` and `SERVER_SHUTDOWN_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            address: env::string_or("SERVER_ADDRESS", &defaults.address),
            shutdown_timeout: env::secs_or("SERVER_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout)?,
        })
    }
}

/// Serve `app` until `shutdown` resolves, then drain in-flight requests.
///
/// Draining is bounded by `timeout`; exceeding it yields
/// `io::ErrorKind::TimedOut`.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    timeout: Duration,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let graceful = async move {
        shutdown.await;
        tracing::info!("stopping server");
        let _ = started_tx.send(());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        res = &mut server => return res,
        Ok(()) = started_rx => {}
    }

    match tokio::time::timeout(timeout, server).await {
        Ok(res) => {
            tracing::info!("stopped server");
            res
        }
        Err(_) => {
            tracing::error!(?timeout, "timed out waiting for in-flight requests");
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "graceful shutdown timed out",
            ))
        }
    }
}

/// Bind `config.address` and serve until Ctrl-C or SIGTERM.
pub async fn run(config: &ServerConfig, app: Router) -> io::Result<()> {
    let listener = TcpListener::bind(&config.address).await?;
    tracing::info!(address = %listener.local_addr()?, "starting server");

    serve(listener, app, shutdown_signal(), config.shutdown_timeout).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
