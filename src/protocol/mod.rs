//! Switch control protocol shapes.
//!
//! # Data Flow
//! ```text
//! transport adapter (net/, or any embedding)
//!     → codec.rs (newline-delimited JSON framing)
//!     → messages.rs::SwitchEvent (inbound)
//!     → controller event loop
//!     → messages.rs::ControllerMessage (outbound)
//!     → switch channel
//! ```
//!
//! # Design Decisions
//! - Messages describe shape, not wire bytes; the binary protocol is owned by
//!   whatever transport sits in front of the controller
//! - Identifiers are newtypes so a port can never be passed as a datapath
//! - Version negotiation is a lookup table, see version.rs

pub mod codec;
pub mod messages;
pub mod version;

pub use messages::{
    BufferId, ControllerMessage, DatapathId, EventKind, FlowAction, FlowMatch, FlowTimeouts,
    OutputPort, PortNo, SwitchEvent, ETH_TYPE_IPV4,
};
pub use version::{ProtocolVersion, SupportedVersions};
