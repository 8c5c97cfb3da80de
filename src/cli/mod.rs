//! Command-line interface components
//!
//! This module contains CLI-specific code for the delayed-fetch application,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    CheckArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, InitiateArgs, StartArgs,
    TrackArgs,
};
pub use commands::{
    build_orchestrator, handle_check, handle_config, handle_initiate, handle_start, handle_track,
};
pub use progress::TrackProgress;
