mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "campwatch",
    version,
    about = "Live campsite availability for Korean public campground reservation sites",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); falls back to CAMPWATCH_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the availability API
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Poll one source until its result is ready and print it as JSON
    Poll {
        /// Source id (samnak, daejeo, hwamyeong, yeongdo, gudeok, busan_port)
        source: String,

        /// Date to check (YYYY-MM-DD), today in Korea when omitted
        #[arg(short, long)]
        date: Option<String>,

        /// Delay between polls in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// List the known sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("campwatch starting");

    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!(bind = ?bind, "Starting serve command");
            commands::serve(config, bind).await?;
        }

        Commands::Poll {
            source,
            date,
            interval_ms,
        } => {
            tracing::info!(
                source = %source,
                date = ?date,
                interval_ms = %interval_ms,
                "Starting poll command"
            );
            commands::poll(config, source, date, interval_ms).await?;
        }

        Commands::Sources => {
            commands::sources().await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("campwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("campwatch={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
