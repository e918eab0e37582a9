//! Weighted round-robin load balancer for OpenFlow-style switches.

pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod forwarding;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod session;

pub use config::schema::ControllerConfig;
pub use controller::{Controller, EventOutcome};
pub use error::{ControllerError, Result};
pub use lifecycle::Shutdown;
