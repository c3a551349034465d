//! UE node binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ransim_common::{init_logging, LogLevel, UeConfig};
use ransim_ue::app::UeController;
use ransim_ue::UeNode;

#[derive(Parser)]
#[command(name = "ransim-ue", about = "ransim 5G UE simulator node", version)]
struct Args {
    /// Path to the UE YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: LogLevel,

    /// Disable the CLI command server
    #[arg(long)]
    no_cli: bool,
}

/// Ends the process when the UE switches off.
struct ProcessController;

impl UeController for ProcessController {
    fn perform_switch_off(&self) {
        info!("Switch-off complete, exiting");
        std::process::exit(0);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    let config = UeConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    info!("Starting UE node: {}", config.node_name());
    let node = UeNode::start(config, None, Some(Arc::new(ProcessController)), !args.no_cli)
        .await
        .context("failed to start UE tasks")?;

    if node.cli_port > 0 {
        info!("CLI available on port {}", node.cli_port);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    node.shutdown().await;

    Ok(())
}
