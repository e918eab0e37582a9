//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Accept incoming switch-agent connections
//! - Enforce max_switches limit via semaphore
//! - Graceful handling of accept errors

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;
use crate::controller::Controller;
use crate::net::connection::{serve_connection, ConnectionTracker};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection limiter closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent switch connections.
///
/// When the limit is reached, new connections wait until a slot frees up.
pub struct SwitchListener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_switches: usize,
    tracker: ConnectionTracker,
}

impl SwitchListener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_switches = config.max_switches,
            "Listening for switch connections"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_switches)),
            max_switches: config.max_switches,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Switch connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Accept and serve connections until `shutdown` fires, then wait for
    /// open connections to finish (bounded by `drain_timeout`).
    pub async fn serve(
        self,
        controller: Arc<Controller>,
        mut shutdown: broadcast::Receiver<()>,
        drain_timeout: Duration,
    ) -> Result<(), ListenerError> {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = self.tracker.track();
                    let controller = Arc::clone(&controller);
                    let shutdown = shutdown.resubscribe();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let id = guard.id();
                        if let Err(e) = serve_connection(stream, peer, controller, shutdown).await {
                            tracing::warn!(connection_id = %id, peer_addr = %peer, error = %e, "Connection failed");
                        }
                        drop(guard);
                    });
                }
                Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        tracing::info!(
            open_connections = self.tracker.active_count(),
            "Listener stopped, draining connections"
        );
        if tokio::time::timeout(drain_timeout, self.tracker.wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                open_connections = self.tracker.active_count(),
                "Drain timeout elapsed"
            );
        }
        Ok(())
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_switches(&self) -> usize {
        self.max_switches
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the slot is released back to the pool, even if the
/// connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
