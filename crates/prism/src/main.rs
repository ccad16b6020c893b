//! Prism - bounded-concurrency image transformation service.
//!
//! Prism accepts `POST /process` requests naming an image in object storage,
//! queues them in a fixed-size queue, and transforms them on a fixed pool of
//! workers using ImageMagick. Requests beyond the queue's capacity are
//! rejected with `503` instead of waiting.
//!
//! # Usage
//!
//! ```bash
//! # Run the service
//! prism serve --bind 0.0.0.0:8080 --workers 4
//!
//! # View configuration
//! prism config show
//!
//! # List transformation profiles
//! prism profiles
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Prism - bounded-concurrency image transformation service.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "PRISM_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the admission server and worker pool
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// List transformation profiles and their arguments
    Profiles,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_none() => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            prism_core::Config::default()
        }
        Err(e) => return Err(e),
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(config, args).await,
        Commands::Config(args) => cli::config::execute(config, cli.config.as_deref(), args),
        Commands::Profiles => cli::profiles::execute(),
    }
}
