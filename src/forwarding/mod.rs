//! Forwarding for traffic the load balancer does not steer.
//!
//! # Data Flow
//! ```text
//! non-IPv4 frame / destination outside pool / parse error
//!     → fallback.rs::FallbackForwarder::handle_unmatched
//!     → PacketOut(FLOOD) referencing the switch buffer or carrying the frame
//! ```

pub mod fallback;

pub use fallback::FallbackForwarder;
