//! Packet classification.
//!
//! # Data Flow
//! ```text
//! PacketIn raw frame
//!     → frame.rs (Ethernet header, optional VLAN tags, IPv4 header)
//!     → packet.rs::PacketClassifier
//!         - discovery/control ether-types → Ignored(Discovery)   (dropped silently)
//!         - non-IPv4 payload             → Ignored(NonIpv4)     (fallback forwarder)
//!         - IPv4                         → ClassifiedPacket     (steering decision)
//!         - truncated / bogus headers    → ParseError           (fallback forwarder)
//! ```
//!
//! # Design Decisions
//! - Pure functions over byte slices, no allocation
//! - Discovery traffic never reaches backend selection whatever its payload

pub mod frame;
pub mod packet;

pub use frame::ParseError;
pub use packet::{Classification, ClassifiedPacket, IgnoreReason, PacketClassifier};
