//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the controller.
//! All types derive Serde traits for deserialization from config files.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Root configuration for the controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Switch listener configuration.
    pub listener: ListenerConfig,

    /// Backend pool and rule settings.
    pub balancer: BalancerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener for switch-agent connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:6653").
    pub bind_address: String,

    /// Maximum concurrently connected switches (backpressure).
    pub max_switches: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6653".to_string(),
            max_switches: 1024,
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Address clients target. Pool member addresses are always steering
    /// targets too.
    pub virtual_address: Option<Ipv4Addr>,

    /// Ordered backend pool.
    pub backends: Vec<BackendConfig>,

    /// Priority of the table-miss and catch-all rules.
    pub table_miss_priority: u16,

    /// Priority of the proactive per-backend rules.
    pub proactive_priority: u16,

    /// Priority of the reactive steering pairs.
    pub steering_priority: u16,

    /// Idle timeout of steering pairs in seconds (0 = never).
    pub steering_idle_timeout_secs: u16,

    /// Hard timeout of steering pairs in seconds (0 = never).
    pub steering_hard_timeout_secs: u16,

    /// Protocol versions accepted during the handshake (e.g., "1.3").
    pub supported_versions: Vec<String>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            virtual_address: None,
            backends: vec![
                BackendConfig {
                    address: Ipv4Addr::new(10, 0, 0, 2),
                    weight: 3,
                },
                BackendConfig {
                    address: Ipv4Addr::new(10, 0, 0, 3),
                    weight: 2,
                },
                BackendConfig {
                    address: Ipv4Addr::new(10, 0, 0, 4),
                    weight: 1,
                },
            ],
            table_miss_priority: 0,
            proactive_priority: 10,
            steering_priority: 20,
            steering_idle_timeout_secs: 0,
            steering_hard_timeout_secs: 0,
            supported_versions: vec!["1.3".to_string()],
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend address (e.g., "10.0.0.2").
    pub address: Ipv4Addr,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
