use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::handler::RequestHandler;
use crate::http::connection::{Connection, ConnectionSettings};
use crate::sandbox::PathResolver;
use crate::server::admission::{Admission, AdmissionController, Worker};

/// An accepted connection that has not been served yet.
#[derive(Debug)]
pub struct PendingConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

/// Serves one connection for its whole keep-alive lifetime.
pub struct ConnectionWorker {
    handler: Arc<RequestHandler>,
    settings: ConnectionSettings,
}

impl ConnectionWorker {
    pub fn new(handler: Arc<RequestHandler>, settings: ConnectionSettings) -> Self {
        Self { handler, settings }
    }
}

impl Worker for ConnectionWorker {
    type Job = PendingConnection;

    async fn run(&self, job: PendingConnection) {
        let PendingConnection { stream, peer } = job;
        debug!(%peer, "Serving connection");

        let mut conn = Connection::new(stream, Arc::clone(&self.handler), self.settings.clone());
        match conn.run().await {
            Ok(()) => debug!(%peer, served = conn.served(), "Connection closed"),
            Err(e) => debug!(%peer, served = conn.served(), error = %e, "Connection ended"),
        }
    }
}

pub struct Server {
    listener: TcpListener,
    controller: Arc<AdmissionController<ConnectionWorker>>,
}

impl Server {
    /// Binds the configured address. Failing to bind is fatal.
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let addr = cfg.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        Self::from_listener(listener, cfg)
    }

    /// Builds a server around an already bound listener.
    pub fn from_listener(listener: TcpListener, cfg: &Config) -> anyhow::Result<Self> {
        let root = &cfg.resources.root;
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create resource directory {}", root.display()))?;
        let resolver = PathResolver::new(root)
            .with_context(|| format!("Invalid resource directory {}", root.display()))?;

        let worker = ConnectionWorker::new(
            Arc::new(RequestHandler::new(resolver)),
            ConnectionSettings::from_config(cfg),
        );

        Ok(Self {
            listener,
            controller: AdmissionController::new(worker, cfg.server.pool_size),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn controller(&self) -> &Arc<AdmissionController<ConnectionWorker>> {
        &self.controller
    }

    /// Accept loop. Only accepts and admits; request I/O happens in workers.
    ///
    /// Accept errors are logged and the loop keeps going.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            addr = %self.local_addr()?,
            pool_size = self.controller.max_pool_size(),
            "Listening"
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    // Usually fd exhaustion; give in-flight connections a moment
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            info!(%peer, "Accepted connection");

            match self.controller.admit(PendingConnection { stream, peer }) {
                Admission::Dispatched => debug!(
                    %peer,
                    active = self.controller.active(),
                    "Connection dispatched"
                ),
                Admission::Queued => info!(
                    %peer,
                    queued = self.controller.queued(),
                    "Worker pool saturated, queueing connection"
                ),
            }
        }
    }

    /// Closes every queued connection that was never served.
    pub fn shutdown(&self) -> usize {
        let dropped = self.controller.drain_queue();
        if dropped > 0 {
            info!(dropped, "Closed queued connections");
        }
        dropped
    }
}
