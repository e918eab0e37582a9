//! Controller core.
//!
//! # Data Flow
//! ```text
//! transport adapter (net, tests, embedding code)
//!     → Controller::dispatch(channel, SwitchEvent)
//!     → dispatch.rs (EventKind → handler lookup)
//!     → event_loop.rs handler:
//!
//!   SwitchConnected     registry.register → activate → bootstrap rules
//!   PacketIn            stale check → classify
//!                         ├─ discovery frame      → ignored
//!                         ├─ non-IPv4 / malformed → fallback flood
//!                         ├─ dst not a target     → fallback flood
//!                         └─ dst is a target      → reuse or select backend
//!                                                 → install steering pair
//!                                                 → packet-out (forward actions)
//!   SwitchDisconnected  registry.unregister (discard installed pairs)
//!   FlowRemoved/Rejected release the affected steering pair
//! ```
//!
//! # Design Decisions
//! - The controller is a plain library value with explicit `on_*` entry
//!   points; no transport or runtime is required to drive it
//! - Handlers are looked up in a table built once at construction
//! - Events for one switch are serialized by the registry's per-session lock;
//!   different switches proceed in parallel

pub mod dispatch;
pub mod event_loop;

pub use dispatch::{DispatchTable, EventHandler};
pub use event_loop::{Controller, EventOutcome, FloodReason};
