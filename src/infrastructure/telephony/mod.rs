//! Telephony transport layer
//!
//! Accepts one persistent TCP connection per phone call from the trunk
//! and hands each connection to the registered handler. Frame-level
//! decoding happens inside the handler's session loop.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Per-connection call handler
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Drive one call connection to completion
    async fn handle(&self, stream: TcpStream, peer: SocketAddr);
}

/// TCP listener for trunk connections
pub struct TelephonyServer {
    bind_addr: SocketAddr,
    handler: Arc<dyn ConnectionHandler>,
}

impl TelephonyServer {
    pub fn new(bind_addr: SocketAddr, handler: Arc<dyn ConnectionHandler>) -> Self {
        Self { bind_addr, handler }
    }

    /// Accept connections until the shutdown signal flips
    ///
    /// Each connection gets its own task; a failed call never takes the
    /// listener down.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!("Telephony listener bound to {}", self.bind_addr);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("Trunk connection from {}", peer);
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                handler.handle(stream, peer).await;
                            });
                        }
                        Err(e) => {
                            // Transient accept errors (EMFILE etc.) should not
                            // kill the listener
                            warn!("Accept failed: {}", e);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Telephony listener shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Bind on an ephemeral loopback port and serve in a background task
///
/// Used by tests and single-shot tooling; returns the bound address.
pub async fn bind_ephemeral(
    handler: Arc<dyn ConnectionHandler>,
) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move { handler.handle(stream, peer).await });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                    return;
                }
            }
        }
    });
    Ok(addr)
}
