//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the backend pool (non-empty, weights ≥ 1, no duplicates)
//! - Check rule priorities are strictly ordered
//! - Validate protocol versions and listener addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControllerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

use crate::config::schema::ControllerConfig;
use crate::protocol::SupportedVersions;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend pool is empty")]
    EmptyBackendPool,

    #[error("backend {0} has weight 0")]
    ZeroWeight(Ipv4Addr),

    #[error("backend {0} listed more than once")]
    DuplicateBackend(Ipv4Addr),

    #[error("virtual address {0} is also a backend")]
    VirtualAddressIsBackend(Ipv4Addr),

    #[error("{field} ({value}) must be greater than {bound_field} ({bound})")]
    PriorityOrder {
        field: &'static str,
        value: u16,
        bound_field: &'static str,
        bound: u16,
    },

    #[error("unknown protocol version '{0}'")]
    UnknownProtocolVersion(String),

    #[error("no supported protocol versions configured")]
    NoProtocolVersions,

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.max_switches must be at least 1")]
    ZeroMaxSwitches,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let balancer = &config.balancer;

    if balancer.backends.is_empty() {
        errors.push(ValidationError::EmptyBackendPool);
    }

    let mut seen = HashSet::new();
    for backend in &balancer.backends {
        if backend.weight == 0 {
            errors.push(ValidationError::ZeroWeight(backend.address));
        }
        if !seen.insert(backend.address) {
            errors.push(ValidationError::DuplicateBackend(backend.address));
        }
    }

    if let Some(vip) = balancer.virtual_address {
        if seen.contains(&vip) {
            errors.push(ValidationError::VirtualAddressIsBackend(vip));
        }
    }

    if balancer.steering_priority <= balancer.proactive_priority {
        errors.push(ValidationError::PriorityOrder {
            field: "steering_priority",
            value: balancer.steering_priority,
            bound_field: "proactive_priority",
            bound: balancer.proactive_priority,
        });
    }
    if balancer.proactive_priority <= balancer.table_miss_priority {
        errors.push(ValidationError::PriorityOrder {
            field: "proactive_priority",
            value: balancer.proactive_priority,
            bound_field: "table_miss_priority",
            bound: balancer.table_miss_priority,
        });
    }

    if balancer.supported_versions.is_empty() {
        errors.push(ValidationError::NoProtocolVersions);
    } else if let Err(unknown) = SupportedVersions::parse(&balancer.supported_versions) {
        errors.extend(
            unknown
                .into_iter()
                .map(|e| ValidationError::UnknownProtocolVersion(e.0)),
        );
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_switches == 0 {
        errors.push(ValidationError::ZeroMaxSwitches);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
