//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (add request ID)
//!     → middleware/health_check.rs (drives the filter)
//!         → matcher.rs (is this a probe?)
//!         → health::filter (answer locally or pass through)
//!     → server.rs proxy_handler (forward to upstream cluster)
//!     → health::filter encode path (annotate response)
//!     → Send to client
//! ```

pub mod filter;
pub mod matcher;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
