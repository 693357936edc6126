use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionSettings};
use crate::routing::Router;
use crate::server::lifecycle::{Lifecycle, ServerHandle};

/// Accept loop with a bounded number of live connections.
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    settings: Arc<ConnectionSettings>,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    shutdown_grace: Duration,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    /// Binds the listening socket. Routes are fixed from here on.
    pub async fn bind(cfg: &Config, router: Router) -> anyhow::Result<Self> {
        if router.is_empty() {
            tracing::warn!("No routes registered; every request will get a 404");
        }

        let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
        info!(
            address = %listener.local_addr()?,
            max_connections = cfg.server.max_connections,
            "Listener bound"
        );

        Ok(Self {
            listener,
            router: Arc::new(router),
            settings: Arc::new(ConnectionSettings {
                cache_dir: cfg.cache_dir.clone(),
                framing: cfg.server.framing(),
            }),
            connection_limit: Arc::new(Semaphore::new(cfg.server.max_connections)),
            max_connections: cfg.server.max_connections,
            shutdown_grace: cfg.server.shutdown_grace(),
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(Arc::clone(&self.lifecycle))
    }

    /// Accepts connections until stopped through a [`ServerHandle`].
    ///
    /// Each connection runs in its own task holding a permit from the
    /// connection limit. After a stop the listening socket is closed and
    /// `run` waits up to the configured grace period for in-flight
    /// connections before returning; stragglers are left running.
    pub async fn run(self) -> anyhow::Result<()> {
        let Server {
            listener,
            router,
            settings,
            connection_limit,
            max_connections,
            shutdown_grace,
            lifecycle,
        } = self;

        let mut shutdown = lifecycle.subscribe();
        if !lifecycle.start() {
            anyhow::bail!("server is already running");
        }
        info!("Listening on {}", listener.local_addr()?);

        loop {
            // Acquire permit first (backpressure)
            let permit = tokio::select! {
                _ = shutdown.recv() => break,
                permit = Arc::clone(&connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (socket, peer) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };
            info!("Accepted connection from {}", peer);

            let router = Arc::clone(&router);
            let settings = Arc::clone(&settings);
            tokio::spawn(async move {
                let _permit = permit;
                let mut conn = Connection::new(socket, router, settings);
                if let Err(e) = conn.run().await {
                    tracing::error!("Connection error from {}: {}", peer, e);
                }
            });
        }

        drop(listener);
        drain(&connection_limit, max_connections, shutdown_grace).await;
        lifecycle.finish();
        info!("Server stopped");

        Ok(())
    }
}

/// Waits for every connection permit to come back, up to `grace`.
async fn drain(limit: &Semaphore, max_connections: usize, grace: Duration) {
    let in_flight = max_connections - limit.available_permits();
    if in_flight == 0 {
        return;
    }
    info!(in_flight, "Waiting for in-flight connections");

    let all = u32::try_from(max_connections).unwrap_or(u32::MAX);
    match tokio::time::timeout(grace, limit.acquire_many(all)).await {
        Ok(_) => info!("In-flight connections finished"),
        Err(_) => tracing::warn!(
            remaining = max_connections - limit.available_permits(),
            "Grace period elapsed with connections still open"
        ),
    }
}
