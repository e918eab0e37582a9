//! Per-connection event pump and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Read switch events in arrival order and hand them to the controller
//! - Write controller messages back to the switch agent
//! - Tear down the switch session when the connection closes

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};

use crate::controller::{Controller, EventOutcome};
use crate::error::ControllerError;
use crate::protocol::codec::{decode_event, encode_message, CodecError};
use crate::protocol::ControllerMessage;
use crate::session::{SessionHandle, SharedChannel};

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Time the writer gets to flush queued messages after the reader stops.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for a single switch connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks open connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new open connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_for_shutdown(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Serve one switch-agent connection until EOF, a rejected handshake or
/// shutdown.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    controller: Arc<Controller>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<ControllerMessage>();
    let channel: SharedChannel = Arc::new(tx);
    let writer = tokio::spawn(write_messages(write_half, rx));

    let mut lines = BufReader::new(read_half).lines();
    // One agent connection may front several datapaths.
    let mut sessions: Vec<SessionHandle> = Vec::new();

    let result = loop {
        let line = tokio::select! {
            _ = shutdown.recv() => break Ok(()),
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(ConnectionError::Io(e)),
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match decode_event(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Dropping undecodable event");
                continue;
            }
        };

        match controller.dispatch(&channel, event) {
            Ok(EventOutcome::Bootstrapped { session: handle, .. }) => {
                sessions.retain(|s| s.datapath_id != handle.datapath_id);
                sessions.push(handle);
            }
            Ok(_) => {}
            Err(err @ ControllerError::UnsupportedProtocol { .. }) => {
                tracing::warn!(peer_addr = %peer, error = %err, "Closing connection");
                break Ok(());
            }
            Err(ControllerError::StaleEvent { .. }) => {}
            Err(err) => {
                tracing::debug!(peer_addr = %peer, error = %err, "Event not handled");
            }
        }
    };

    for handle in &sessions {
        controller.on_connection_closed(handle);
    }

    // The registry released its clone on teardown; dropping ours ends the writer.
    drop(channel);
    match tokio::time::timeout(WRITER_FLUSH_TIMEOUT, writer).await {
        Ok(Ok(Err(e))) => tracing::debug!(peer_addr = %peer, error = %e, "Writer stopped"),
        Ok(_) => {}
        Err(_) => tracing::warn!(peer_addr = %peer, "Writer did not finish in time"),
    }

    result
}

async fn write_messages(
    write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<ControllerMessage>,
) -> Result<(), ConnectionError> {
    let mut writer = BufWriter::new(write_half);
    while let Some(message) = rx.recv().await {
        let line = encode_message(&message)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
