//! sysopt - host resource optimizer CLI
//!
//! Shows live usage, plans and applies cleanups, and forecasts disk
//! exhaustion. Runs the core library in-process; no daemon required.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{forecast, monitor, optimize};
use std::path::PathBuf;
use sysopt_core::{CoreConfig, CoreContext};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Host resource optimizer CLI
#[derive(Parser)]
#[command(name = "sysopt")]
#[command(author, version, about = "Host resource telemetry, cleanup and disk forecasting", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.sysopt/config.json)
    #[arg(long, env = "SYSOPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show host facts and current resource usage
    Status,

    /// Sample for a while and show the rolling history
    History {
        /// Number of samples to collect
        #[arg(long, short, default_value_t = 5)]
        samples: usize,
    },

    /// Show what a cleanup would do, without changing anything
    Analyze {
        /// List every planned action, not just the category totals
        #[arg(long)]
        detailed: bool,
    },

    /// Apply the cleanup plan
    Clean {
        /// Only apply these categories (repeatable); all when omitted
        #[arg(long, short)]
        category: Vec<String>,

        /// Actually delete; without this the plan is only shown
        #[arg(long, short)]
        yes: bool,
    },

    /// Analyze and apply everything in one step, without review
    Boost {
        /// Confirm applying the unreviewed plan
        #[arg(long, short)]
        yes: bool,
    },

    /// Predict when a volume runs out of space
    Forecast {
        /// Volume to forecast (defaults to the first monitored volume)
        #[arg(long)]
        volume: Option<PathBuf>,
    },

    /// Show the recorded disk usage series
    Trend,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    let config = CoreConfig::load_from(cli.config.as_deref());
    let ctx = CoreContext::new(config);

    match cli.command {
        Commands::Status => monitor::show_status(&ctx, cli.format).await?,
        Commands::History { samples } => monitor::show_history(&ctx, samples, cli.format).await?,
        Commands::Analyze { detailed } => optimize::analyze(&ctx, detailed, cli.format)?,
        Commands::Clean { category, yes } => optimize::clean(&ctx, category, yes, cli.format).await?,
        Commands::Boost { yes } => optimize::boost(&ctx, yes, cli.format).await?,
        Commands::Forecast { volume } => forecast::show_forecast(&ctx, volume, cli.format)?,
        Commands::Trend => forecast::show_trend(&ctx, cli.format)?,
    }

    Ok(())
}
