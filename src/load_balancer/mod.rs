//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Packet to a steering target (pool member or virtual address)
//!     → pool.rs::LoadBalancingPolicy (load current pool snapshot)
//!     → weighted.rs (advance shared rotation, walk cumulative weights)
//!     → backend.rs::Backend (address handed to the flow rule builder)
//! ```
//!
//! # Design Decisions
//! - Pool is immutable once built; reconfiguration swaps the whole pool
//! - Rotation is one atomic counter per policy, advanced with a CAS loop
//! - Client address is accepted but does not bias selection (no stickiness)

use std::net::Ipv4Addr;

pub mod backend;
pub mod pool;
pub mod weighted;

pub use backend::Backend;
pub use pool::{BackendPool, LoadBalancingPolicy};
pub use weighted::WeightedRoundRobin;

/// Backend selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick a backend from a non-empty pool.
    fn next_backend(&self, pool: &BackendPool, client: Ipv4Addr) -> Backend;

    /// Forget any rotation state (called when the pool is replaced).
    fn reset(&self);
}
