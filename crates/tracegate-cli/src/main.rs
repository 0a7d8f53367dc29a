//! Tracegate CLI - run and inspect the trust-boundary gateway.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracegate_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "tracegate")]
#[command(about = "Tracegate - API key, network and token gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to TRACEGATE_CONFIG or ~/.tracegate/tracegate.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Check whether a local gateway answers
    Status {
        /// Port to probe (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration with secrets redacted
    Show,

    /// Validate the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Validation reports its own errors; everything else needs a config to log with.
    if let Commands::Config {
        action: Some(ConfigCommands::Validate),
    } = cli.command
    {
        init_logging(&LoggingConfig::default(), cli.verbose);
        return commands::config::validate(cli.config.as_deref());
    }

    let config = commands::load_config(cli.config.as_deref())?;
    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Serve { port, bind } => {
            let args = commands::serve::ServeArgs { port, bind };
            commands::run_serve(config, args).await?;
        }
        Commands::Status { port } => {
            commands::run_status(port.unwrap_or(config.gateway.port)).await?;
        }
        Commands::Config { .. } => {
            commands::config::show(&config)?;
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
