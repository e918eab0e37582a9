//! Flow rule construction and installation.
//!
//! # Data Flow
//! ```text
//! Switch becomes ACTIVE
//!     → builder.rs::build_bootstrap (table-miss, proactive, default)
//!     → installer.rs::bootstrap
//!
//! Steering decision (client, target, backend, ingress port)
//!     → builder.rs::build_steering_pair (forward + reverse rewrite rules)
//!     → installer.rs::install_steering_pair
//!         - already in installed.rs? skip
//!         - forward, then reverse; reverse failure withdraws forward
//!         - success registers both keys at once
//! ```
//!
//! # Design Decisions
//! - A steering pair is one unit everywhere: built, installed, tracked and
//!   released together
//! - Priorities, not push order, resolve overlapping rules

pub mod builder;
pub mod installed;
pub mod installer;
pub mod rule;

pub use builder::{FlowRuleBuilder, Priorities};
pub use installed::{InstalledPair, InstalledRuleSet};
pub use installer::{PairInstall, ReleaseCause, RuleInstaller};
pub use rule::{Direction, FlowKey, FlowRule, SteeringDecision, SteeringPair};
