//! HTTP front end for local replicas.
//!
//! One server hosts many isolated instances; each instance is a
//! `replica_engine::Replica` behind its own async mutex.

pub mod config;
pub mod error;
mod http;
pub mod instances;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use replica_api::ProgramCatalog;

pub use config::ServerConfig;
pub use error::ServerError;

use crate::http::AppState;
use crate::instances::InstancePool;

/// A running replica server. Dropping it without `stop` leaves the listener
/// running until the runtime shuts down.
#[derive(Debug)]
pub struct ReplicaServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl ReplicaServer {
    /// Bind the listener and start serving in a background task.
    pub async fn start(config: ServerConfig, catalog: ProgramCatalog) -> Result<Self, ServerError> {
        let bind = format!("{}:{}", config.bind, config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| ServerError::Bind { addr: bind.clone(), message: e.to_string() })?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind { addr: bind, message: e.to_string() })?;

        let pool = InstancePool::new(config.replica, Arc::new(catalog));
        let app = http::router(AppState { pool: Arc::new(pool) });

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .map_err(|e| ServerError::Serve(e.to_string()))
        });

        tracing::info!(%addr, "replica server listening");
        Ok(Self { addr, shutdown, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL clients connect to.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting connections, finish in-flight requests, drop all instances.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.cancel();
        let result = self
            .handle
            .await
            .map_err(|e| ServerError::Serve(format!("server task: {e}")))?;
        tracing::info!(addr = %self.addr, "replica server stopped");
        result
    }

    /// Serve until the shutdown token is cancelled.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.shutdown.cancelled().await;
        self.stop().await
    }
}
