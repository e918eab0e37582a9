//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server by address
//! - Carry its weight and its position in the pool ordering

use std::fmt;
use std::net::Ipv4Addr;

/// A single backend server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Backend {
    /// The address clients are rewritten to.
    pub address: Ipv4Addr,
    /// Relative share of selections (at least 1).
    pub weight: u32,
    /// Index within the pool ordering.
    pub position: usize,
}

impl Backend {
    /// Create a new backend.
    pub fn new(address: Ipv4Addr, weight: u32, position: usize) -> Self {
        Self {
            address,
            weight,
            position,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}
