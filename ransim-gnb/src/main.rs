//! gNB node binary

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ransim_common::{init_logging, GnbConfig, LogLevel};
use ransim_gnb::GnbNode;

#[derive(Parser)]
#[command(name = "ransim-gnb", about = "ransim 5G gNodeB simulator node", version)]
struct Args {
    /// Path to the gNB YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: LogLevel,

    /// Disable the CLI command server
    #[arg(long)]
    no_cli: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    let config = GnbConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    info!("Starting gNB node: {}", config.name);
    let node = GnbNode::start(config, None, !args.no_cli)
        .await
        .context("failed to start gNB tasks")?;

    if node.cli_port > 0 {
        info!("CLI available on port {}", node.cli_port);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    node.shutdown().await;

    Ok(())
}
