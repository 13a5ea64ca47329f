//! adcsync Daemon - keeps an ADC converged on the computed declaration
//!
//! The daemon provides:
//! - Version negotiation with the appliance at start-up
//! - The config deployer loop with retry and failure isolation
//! - REST API for work request intake and status

use adcsync_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// adcsync Daemon CLI
#[derive(Parser)]
#[command(name = "adcsyncd")]
#[command(about = "adcsync Daemon - declarative ADC configuration sync", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ADCSYNC_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "ADCSYNC_LISTEN_ADDR")]
    listen: Option<String>,

    /// Appliance management URL
    #[arg(long, env = "ADCSYNC_APPLIANCE_URL")]
    appliance_url: Option<String>,

    /// Post one declaration per tenant
    #[arg(long, env = "ADCSYNC_FILTER_TENANTS")]
    filter_tenants: bool,

    /// Log level
    #[arg(long, env = "ADCSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ADCSYNC_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(url) = cli.appliance_url {
        config.appliance.base_url = url;
    }
    if cli.filter_tenants {
        config.deployer.filter_tenants = true;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        appliance = %config.appliance.base_url,
        filter_tenants = config.deployer.filter_tenants,
        listen = %config.server.listen_addr,
        "Starting adcsync daemon"
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
