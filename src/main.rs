//! delayed-fetch CLI application
//!
//! Command-line interface for the download orchestrator and the resilient
//! client that drives it.

use std::process;

use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

use delayed_fetch::cli::{
    handle_check, handle_config, handle_initiate, handle_start, handle_track, Cli, Commands,
};
use delayed_fetch::config::AppConfig;
use delayed_fetch::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Config management must work even when the current file is invalid
    let config = match cli.command {
        Commands::Config(_) => None,
        _ => Some(AppConfig::load(cli.global.config.clone()).await?),
    };
    init_logging(&cli, config.as_ref().map(|c| c.logging.level.as_str()));

    info!("delayed-fetch v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config.unwrap_or_default();
    match cli.command {
        Commands::Check(args) => handle_check(args, &config).await,
        Commands::Start(args) => handle_start(args, &config).await,
        Commands::Initiate(args) => handle_initiate(args, &config).await,
        Commands::Track(args) => handle_track(args, &config, cli.global.quiet).await,
        Commands::Config(args) => handle_config(args.action, cli.global.config).await,
    }
}

/// Initialize logging from CLI verbosity flags, falling back to the config file
fn init_logging(cli: &Cli, configured: Option<&str>) {
    let log_level = cli.log_level_or(configured);

    let filter = EnvFilter::from_default_env().add_directive(
        format!("delayed_fetch={}", log_level)
            .parse()
            .unwrap_or_else(|_| LevelFilter::WARN.into()),
    );

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
