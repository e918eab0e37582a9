//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Datapath ID flows through every switch-scoped log line
//! - Metrics are cheap (atomic increments); recording without an
//!   installed exporter is a no-op, so tests need no setup

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
