//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, access lines)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (trace context, sampling overrides)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Backend tracers (via propagated headers)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)
//! - Health-check probes are never sampled for tracing

pub mod logging;
pub mod metrics;
pub mod tracing;
