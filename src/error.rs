//! Controller error taxonomy.
//!
//! Only configuration errors (`EmptyBackendPool`, `ZeroWeight`,
//! `UnknownProtocolVersion`) are fatal, and
//! only at startup. Everything else is handled at the event-loop boundary:
//! parse errors fall back to flooding, install failures drop the triggering
//! packet, stale events are discarded.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::classifier::ParseError;
use crate::flow::FlowRule;
use crate::protocol::{DatapathId, EventKind, ProtocolVersion};

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors raised while handling switch events.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Handshake rejected; the connection should be closed.
    #[error("switch {datapath_id} speaks unsupported protocol version {version}")]
    UnsupportedProtocol {
        datapath_id: DatapathId,
        version: ProtocolVersion,
    },

    /// Inbound frame could not be parsed.
    #[error("malformed frame: {0}")]
    Parse(#[from] ParseError),

    /// A rule push failed (switch unreachable or rule refused).
    #[error("rule installation failed on switch {datapath_id}: {reason}")]
    InstallationFailed {
        datapath_id: DatapathId,
        rule: Box<FlowRule>,
        reason: String,
    },

    /// A packet-out could not be delivered.
    #[error("switch {datapath_id} is unreachable")]
    SwitchUnreachable { datapath_id: DatapathId },

    /// Backend pool has no members.
    #[error("backend pool is empty")]
    EmptyBackendPool,

    /// Backend configured with a weight below one.
    #[error("backend {address} has zero weight")]
    ZeroWeight { address: Ipv4Addr },

    /// Configured protocol version name is not recognised.
    #[error("unknown protocol version '{version}'")]
    UnknownProtocolVersion { version: String },

    /// No handler registered for an event kind.
    #[error("no handler registered for {} events", .kind.as_str())]
    UnhandledEvent { kind: EventKind },

    /// Event for a switch with no active session.
    #[error("stale event for switch {datapath_id}")]
    StaleEvent { datapath_id: DatapathId },
}

impl ControllerError {
    /// Whether this error should abort controller startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControllerError::EmptyBackendPool
                | ControllerError::ZeroWeight { .. }
                | ControllerError::UnknownProtocolVersion { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerError::UnsupportedProtocol { .. } => "unsupported_protocol",
            ControllerError::Parse(_) => "parse_error",
            ControllerError::InstallationFailed { .. } => "installation_failed",
            ControllerError::SwitchUnreachable { .. } => "switch_unreachable",
            ControllerError::EmptyBackendPool => "empty_backend_pool",
            ControllerError::ZeroWeight { .. } => "zero_weight",
            ControllerError::UnknownProtocolVersion { .. } => "unknown_protocol_version",
            ControllerError::UnhandledEvent { .. } => "unhandled_event",
            ControllerError::StaleEvent { .. } => "stale_event",
        }
    }
}
