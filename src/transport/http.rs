//! HTTP server for the generated REST routes.
//!
//! Binds a TCP listener, serves the router built by `RouteGenerator` and
//! shuts down gracefully on SIGINT/SIGTERM: the shutdown token is cancelled
//! (aborting in-flight statements), open requests get a grace period, and the
//! connection pools are closed last.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::transport::routes::RouteGenerator;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long open requests may run after the first shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpServer {
    manager: Arc<ConnectionManager>,
    host: String,
    port: u16,
    max_page_size: u32,
    shutdown: CancellationToken,
}

impl HttpServer {
    pub fn new(
        manager: Arc<ConnectionManager>,
        host: impl Into<String>,
        port: u16,
        max_page_size: u32,
    ) -> Self {
        Self {
            manager,
            host: host.into(),
            port,
            max_page_size,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Token cancelled when the server begins shutting down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> DbResult<()> {
        let routes = RouteGenerator::new(
            self.manager.clone(),
            self.max_page_size,
            self.shutdown.clone(),
        );
        let app = routes.build_router().await?;

        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;
        info!(addr = %bind_addr, "Serving REST endpoints");

        let shutdown = self.shutdown.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown.cancel();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Race between: server completing normally vs forced timeout/second signal after shutdown
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                self.shutdown.cancelled().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for requests to finish (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database connections");
        self.manager.close_all().await;

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
