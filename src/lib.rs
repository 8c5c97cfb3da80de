//! delayed-fetch library
//!
//! Coordinates download preparation whose latency (10-200s) exceeds common
//! proxy and client timeouts. The server side simulates a slow start operation
//! and probes object availability; the client side bounds every start call,
//! falls back to availability polling and allows a fixed number of retries.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
