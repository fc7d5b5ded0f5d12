//! Haven daemon - SOS case coordination service
//!
//! `havend` serves the action interface over REST and runs the escalation
//! scheduler against the same core a human caller reaches.

use clap::Parser;
use haven_service::config::HavenConfig;
use haven_service::error::DaemonError;
use haven_service::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Haven daemon CLI.
#[derive(Parser)]
#[command(name = "havend")]
#[command(about = "Haven daemon - SOS case coordination service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HAVEN_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "HAVEN_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "HAVEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "HAVEN_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
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

    let mut config = HavenConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }

    println!(
        r#"
  _   _    ___     _______ _   _
 | | | |  / \ \   / / ____| \ | |
 | |_| | / _ \ \ / /|  _| |  \| |
 |  _  |/ ___ \ V / | |___| |\  |
 |_| |_/_/   \_\_/  |_____|_| \_|

  SOS Case Coordination Daemon
  Version: {}
  Listening: {}
  Escalation threshold: {} min
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr,
        config.scheduler.escalate_after_minutes
    );

    Server::new(config).run().await?;
    Ok(())
}
