//! Reference transport adapter.
//!
//! # Data Flow
//! ```text
//! Switch agent TCP connection
//!     → listener.rs (accept loop, max_switches limit)
//!     → connection.rs
//!         reader: line → codec::decode_event → Controller::dispatch (in order)
//!         writer: switch channel → codec::encode_message → line
//!     → on EOF: Controller::on_connection_closed(session)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - One reader per connection gives per-switch event ordering for free
//! - Outbound messages never block the reader (unbounded channel)
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{serve_connection, ConnectionError, ConnectionId, ConnectionTracker};
pub use listener::{ListenerError, SwitchListener};
