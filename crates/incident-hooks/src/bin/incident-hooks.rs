//! Incident webhook service binary.
//!
//! Standalone HTTP service receiving `PagerDuty` v2 incident webhooks.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use incident_hooks::{server, Config};

/// Receive `PagerDuty` incident webhooks and act on lifecycle events.
#[derive(Parser)]
#[command(name = "incident-hooks")]
#[command(version)]
struct Cli {
    /// Listening port (overrides `INCIDENT_HOOKS_PORT`)
    #[arg(long, short)]
    port: Option<u16>,

    /// Log output format
    #[arg(long, env = "INCIDENT_HOOKS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("incident_hooks=info")
            .add_directive("tower_http=info".parse().context("Invalid log directive")?),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    info!("Starting incident webhook service...");

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        port = config.port,
        api_base_url = %config.api_base_url,
        from = %config.from_email,
        "Configuration loaded"
    );

    server::run_server(&config).await
}
