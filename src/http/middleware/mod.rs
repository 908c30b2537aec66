//! Request pipeline middleware.

pub mod health_check;

pub use health_check::{health_check_middleware, HealthCheckState};
