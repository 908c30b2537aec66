//! Health-check interception subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers
//!     → filter.rs (match header rules, decide interception)
//!     → wait for end of request (body dropped)
//!     → outcome: local.rs gate → cache.rs → cluster thresholds → healthy
//!     → local reply (200 / 503, optional degraded marker)
//!
//! Response headers (local reply or forwarded probe):
//!     → filter.rs (refresh stale cache, add healthchecked-cluster header)
//!
//! Cache window (cache.rs):
//!     Timer tick → stale
//!     Stored outcome → fresh until next tick
//! ```
//!
//! # Design Decisions
//! - No active probing; cluster health is read from the registry
//! - Collaborators (local gate, cluster registry) are traits injected at
//!   construction so the filter can be tested with fakes
//! - The cache is shared by every request of one filter configuration

pub mod cache;
pub mod context;
pub mod filter;
pub mod local;
pub mod outcome;

pub use cache::HealthCheckCacheManager;
pub use context::{ClusterRegistry, LocalHealth, MembershipStats};
pub use filter::{HealthCheckFilter, HealthCheckFilterConfig};
pub use local::LocalHealthState;
pub use outcome::{HealthCheckOutcome, HealthStatus};
