//! Operator CLI for ransim nodes
//!
//! Discovers running instances through the process table, sends one
//! command over the UDP wire protocol and prints the response. The exit
//! code reflects the response type.

use std::fs;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::net::UdpSocket;

use ransim_common::cli_wire::{CliMessage, CliMessageType, ProcTableEntry, PROC_TABLE_DIR};

#[derive(Parser)]
#[command(name = "ransim-cli", about = "ransim node command line interface", version)]
struct Args {
    /// Node name to address (e.g. "ransim-gnb-1" or "imsi-...")
    node: Option<String>,

    /// Command tokens to execute on the node
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,

    /// List running nodes and exit
    #[arg(short = 'd', long)]
    dump: bool,

    /// Response timeout in seconds
    #[arg(short, long, default_value_t = 3)]
    timeout: u64,
}

fn load_proc_table() -> Vec<ProcTableEntry> {
    let mut entries = Vec::new();
    let Ok(dir) = fs::read_dir(PROC_TABLE_DIR) else {
        return entries;
    };
    for file in dir.flatten() {
        if let Ok(text) = fs::read_to_string(file.path()) {
            if let Some(entry) = ProcTableEntry::decode(&text) {
                // skip stale entries of dead processes
                if fs::metadata(format!("/proc/{}", entry.pid)).is_ok() {
                    entries.push(entry);
                }
            }
        }
    }
    entries
}

fn find_node(entries: &[ProcTableEntry], node: &str) -> Option<u16> {
    entries
        .iter()
        .find(|entry| entry.nodes.iter().any(|n| n == node))
        .map(|entry| entry.port)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let entries = load_proc_table();

    if args.dump {
        for entry in &entries {
            for node in &entry.nodes {
                println!("{node}");
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let node = match args.node {
        Some(node) => node,
        None => bail!("no node name given; use --dump to list running nodes"),
    };
    if args.command.is_empty() {
        bail!("no command given; try '{node} help'");
    }

    let port = find_node(&entries, &node)
        .with_context(|| format!("node '{node}' is not running"))?;

    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse()?;
    let socket = UdpSocket::bind("127.0.0.1:0").await?;

    let request = CliMessage::command(server_addr, node, args.command.join(" "));
    socket.send_to(&request.encode(), server_addr).await?;

    let mut buffer = [0u8; 8192];
    let received = tokio::time::timeout(
        Duration::from_secs(args.timeout),
        socket.recv_from(&mut buffer),
    )
    .await
    .context("timed out waiting for a response")??;

    let (size, from) = received;
    let response = CliMessage::decode(&buffer[..size], from)
        .context("malformed response from node")?;

    match response.msg_type {
        CliMessageType::Error => {
            eprintln!("ERROR: {}", response.value);
            Ok(ExitCode::FAILURE)
        }
        _ => {
            println!("{}", response.value);
            Ok(ExitCode::SUCCESS)
        }
    }
}
