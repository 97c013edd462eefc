//! Viewer listener
//!
//! Handles the TCP accept loop and spawns one WebSocket session per viewer.
//! Only one viewer may be attached at a time; further connections are
//! dropped while the slot is taken.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::relay::{Outbound, RelayContext, SinkHandle};
use crate::server::handoff::HandoffController;
use crate::server::viewer::serve_viewer;
use crate::stats::StatsSnapshot;

/// Viewer-facing server
pub struct RelayServer {
    ctx: Arc<RelayContext>,
    handoff: HandoffController,
    viewer_slot: Arc<Semaphore>,
    next_viewer_id: AtomicU64,
}

impl RelayServer {
    /// Create a server that hands frames over from the given sink
    pub fn new(ctx: Arc<RelayContext>, sink: SinkHandle) -> Self {
        Self {
            handoff: HandoffController::new(Arc::clone(&ctx), sink),
            ctx,
            viewer_slot: Arc::new(Semaphore::new(1)),
            next_viewer_id: AtomicU64::new(1),
        }
    }

    /// Current relay counters
    pub fn status(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.ctx.config.bind_addr).await?;
        tracing::info!(addr = %self.ctx.config.bind_addr, "Viewer listener started");
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.ctx.config.bind_addr).await?;
        tracing::info!(addr = %self.ctx.config.bind_addr, "Viewer listener started");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept viewers on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let permit = match Arc::clone(&self.viewer_slot).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(peer = %peer_addr, "Viewer rejected: another viewer is attached");
                return;
            }
        };

        let viewer_id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(viewer_id, peer = %peer_addr, "Viewer connected");

        if self.ctx.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let ctx = Arc::clone(&self.ctx);
        let handoff = self.handoff.clone();

        tokio::spawn(async move {
            // Held until the session has handed the frame queue back
            let _permit = permit;

            let stream = match tokio_tungstenite::accept_async(socket).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!(viewer_id, error = %e, "WebSocket handshake failed");
                    return;
                }
            };

            let (write, read) = stream.split();
            if let Err(e) = serve_viewer(ctx, &handoff, Outbound::new(write), read).await {
                tracing::debug!(viewer_id, error = %e, "Viewer session error");
            }

            tracing::info!(viewer_id, "Viewer disconnected");
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.ctx.config.bind_addr
    }
}
