//! Health-checking HTTP proxy.
//!
//! Answers load balancer health-check probes on behalf of the node, either
//! locally or by passing them through to the upstream service with a cached
//! verdict, and forwards every other request to the upstream cluster.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client / LB probe
//!     ──────────────▶ http::server ──▶ http::middleware::health_check
//!                                          │
//!                      ┌───────────────────┼────────────────────┐
//!                      ▼                   ▼                    ▼
//!                 http::matcher      health::filter        health::cache
//!                                          │
//!                      ┌───────────────────┼────────────────────┐
//!                      ▼                   ▼                    ▼
//!                 health::local     upstream (clusters)     observability
//!
//!     admin ── toggles local health, overrides host health
//!     config ── TOML load, validation, hot reload
//!     lifecycle ── signals, graceful shutdown
//! ```

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
