//! Application constants for delayed_fetch
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for configuration overrides
pub mod env {
    /// Base URL of the object store; unset means mock mode
    pub const STORE_URL: &str = "DELAYED_FETCH_STORE_URL";

    /// Enable or disable the simulated processing delay ("true"/"false")
    pub const DELAY_ENABLED: &str = "DELAYED_FETCH_DELAY_ENABLED";

    /// Lower bound of the simulated delay in milliseconds
    pub const DELAY_MIN_MS: &str = "DELAYED_FETCH_DELAY_MIN_MS";

    /// Upper bound of the simulated delay in milliseconds
    pub const DELAY_MAX_MS: &str = "DELAYED_FETCH_DELAY_MAX_MS";

    /// Server-side request rate limit (requests per second, 0 disables)
    pub const RATE_LIMIT_RPS: &str = "DELAYED_FETCH_RATE_LIMIT_RPS";

    /// Default log level
    pub const LOG_LEVEL: &str = "DELAYED_FETCH_LOG_LEVEL";
}

/// Resource identifier bounds and batch limits
pub mod resources {
    /// Smallest accepted resource id (inclusive)
    pub const MIN_RESOURCE_ID: i64 = 10_000;

    /// Largest accepted resource id (inclusive)
    pub const MAX_RESOURCE_ID: i64 = 100_000_000;

    /// Maximum number of ids accepted by a single initiate call
    pub const MAX_BATCH_SIZE: usize = 100;
}

/// Simulated processing delay defaults
pub mod delay {
    /// Delay simulation is on unless configured otherwise
    pub const DEFAULT_ENABLED: bool = true;

    /// Shortest simulated processing time (10 seconds)
    pub const DEFAULT_MIN_MS: u64 = 10_000;

    /// Longest simulated processing time (200 seconds)
    pub const DEFAULT_MAX_MS: u64 = 200_000;
}

/// Object store key layout and probe settings
pub mod storage {
    use super::Duration;

    /// Prefix shared by every derived storage key
    pub const KEY_PREFIX: &str = "downloads/";

    /// Extension appended to every derived storage key
    pub const KEY_SUFFIX: &str = ".zip";

    /// User agent for existence probes
    pub const USER_AGENT: &str = "delayed-fetch/0.1.0 (availability probe)";

    /// Timeout for a single HEAD probe
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection establishment timeout for probes
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Mock availability policy
pub mod mock {
    /// Ids divisible by this value are reported as present
    pub const AVAILABILITY_MODULUS: i64 = 7;

    /// Smallest generated object size (1 MiB)
    pub const MIN_SIZE_BYTES: u64 = 1024 * 1024;

    /// Largest generated object size (100 MiB)
    pub const MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;
}

/// Server-side request limiting
pub mod limits {
    /// Default request rate limit across all orchestrator operations
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 50;
}

/// Client resilience defaults
pub mod client {
    use super::Duration;

    /// Hard abort timeout for a direct start call
    pub const ABORT_TIMEOUT: Duration = Duration::from_secs(190);

    /// Interval between availability checks while polling
    pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Maximum availability checks per polling phase (~180s at 5s)
    pub const MAX_POLL_ATTEMPTS: u32 = 36;

    /// Maximum manual retries per tracked item
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Capacity of the item event broadcast channel
    pub const EVENT_BUFFER_SIZE: usize = 256;
}

/// Progress values reported for tracked items
pub mod progress {
    /// Progress shown while the direct start call is in flight
    pub const STARTING: u8 = 10;

    /// Share of the bar covered by the polling phase
    pub const POLLING_SPAN: u8 = 80;

    /// Terminal success
    pub const DONE: u8 = 100;
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

/// Configuration file locations
pub mod config {
    /// Project-local config file name
    pub const LOCAL_FILE_NAME: &str = "delayed-fetch.toml";

    /// Directory name under the user config directory
    pub const APP_DIR_NAME: &str = "delayed-fetch";

    /// Config file name under the user config directory
    pub const USER_FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use client::{ABORT_TIMEOUT, MAX_ATTEMPTS, MAX_POLL_ATTEMPTS, POLL_INTERVAL};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use resources::{MAX_BATCH_SIZE, MAX_RESOURCE_ID, MIN_RESOURCE_ID};
