//! Command-line argument parsing for delayed-fetch
//!
//! This module defines the CLI structure using clap derive macros: the three
//! orchestrator operations, the resilient `track` client and config management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// delayed-fetch - slow downloads that stay usable behind impatient proxies
#[derive(Parser, Debug)]
#[command(
    name = "delayed_fetch",
    version,
    about = "Simulate slow download preparation and drive it with a resilient client",
    long_about = "Runs a download orchestrator whose start operation takes 10-200s, and a client that
aborts slow starts, falls back to polling availability, and allows bounded retries."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe whether a resource is available right now
    Check(CheckArgs),

    /// Run a single start operation to its verdict
    Start(StartArgs),

    /// Validate a batch of ids and issue a job id
    Initiate(InitiateArgs),

    /// Start ids through the resilient client and follow them to a terminal state
    Track(TrackArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the check command
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Resource id
    #[arg(value_name = "ID")]
    pub id: i64,

    /// Fail deliberately to exercise error reporting
    #[arg(long)]
    pub test_error: bool,
}

/// Arguments for the start command
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Resource id
    #[arg(value_name = "ID")]
    pub id: i64,

    /// Skip the simulated processing delay
    #[arg(long)]
    pub no_delay: bool,
}

/// Arguments for the initiate command
#[derive(Args, Debug, Clone)]
pub struct InitiateArgs {
    /// Resource ids
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

/// Arguments for the track command
#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    /// Resource ids
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<i64>,

    /// Retry failed items automatically until the retry budget is spent
    #[arg(long)]
    pub auto_retry: bool,

    /// Disable progress bars and print one line per state change
    #[arg(long)]
    pub no_progress: bool,
}

impl TrackArgs {
    /// Duplicate ids would share one tracked item
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = self.ids.iter().find(|id| !seen.insert(**id)) {
            return Err(format!("Resource id {} given more than once", duplicate));
        }
        Ok(())
    }
}

/// Arguments for config management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Destination (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Flag-selected level, or `configured` when no verbosity flag is given
    pub fn log_level_or(&self, configured: Option<&str>) -> tracing::Level {
        if self.global.quiet || self.global.verbose || self.global.very_verbose {
            return self.log_level();
        }
        configured
            .and_then(|level| level.parse().ok())
            .unwrap_or(tracing::Level::WARN)
    }
}
