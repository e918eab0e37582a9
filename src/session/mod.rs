//! Switch session tracking.
//!
//! # Data Flow
//! ```text
//! SwitchConnected
//!     → registry.rs::register (version check, HANDSHAKING)
//!     → registry.rs::activate (ACTIVE, bootstrap follows)
//! PacketIn / FlowRemoved / FlowRejected
//!     → registry.rs::with_active (StaleEvent unless ACTIVE)
//! SwitchDisconnected / connection closed
//!     → registry.rs::unregister (DISCONNECTED, installed rules discarded)
//! ```
//!
//! # Design Decisions
//! - The registry owns every session; other components only see a
//!   `&mut SwitchSession` for the duration of one event
//! - Outbound messages go through the `SwitchChannel` trait so any transport
//!   (or a test recorder) can sit behind a session
//! - Disconnected sessions stay as tombstones so late events are recognisably stale

pub mod channel;
pub mod registry;

pub use channel::{ChannelClosed, SharedChannel, SwitchChannel};
pub use registry::{ConnectionState, SessionHandle, SessionSummary, SwitchRegistry, SwitchSession};
