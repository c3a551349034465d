//! CLI wire protocol and server
//!
//! Running gNB and UE instances accept operator commands over a small UDP
//! datagram protocol. The server side lives in each node's App task; the
//! `ransim-cli` binary is the client. Instances advertise themselves
//! through per-process files in a process table directory.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::UdpSocket;

/// Directory where process table entries are stored
pub const PROC_TABLE_DIR: &str = "/tmp/ransim.proc-table/";

/// Command server bind address (localhost only)
pub const CMD_SERVER_IP: &str = "127.0.0.1";

/// Wire protocol version - major
pub const VERSION_MAJOR: u8 = 1;
/// Wire protocol version - minor
pub const VERSION_MINOR: u8 = 0;
/// Wire protocol version - patch
pub const VERSION_PATCH: u8 = 0;

const CMD_BUFFER_SIZE: usize = 8192;

/// CLI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CliMessageType {
    /// Empty/invalid message
    Empty = 0,
    /// Echo message (informational output)
    Echo = 1,
    /// Error message
    Error = 2,
    /// Result message (command output)
    Result = 3,
    /// Command message (from CLI to instance)
    Command = 4,
}

impl TryFrom<u8> for CliMessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(CliMessageType::Empty),
            1 => Ok(CliMessageType::Echo),
            2 => Ok(CliMessageType::Error),
            3 => Ok(CliMessageType::Result),
            4 => Ok(CliMessageType::Command),
            _ => Err(()),
        }
    }
}

/// A CLI protocol message.
#[derive(Debug, Clone)]
pub struct CliMessage {
    /// Message type
    pub msg_type: CliMessageType,
    /// Node name (target for commands, source for responses)
    pub node_name: String,
    /// Message value (command tokens or response text)
    pub value: String,
    /// Peer address
    pub client_addr: SocketAddr,
}

impl CliMessage {
    /// Creates an error response.
    pub fn error(addr: SocketAddr, node_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            msg_type: CliMessageType::Error,
            node_name: node_name.into(),
            value: message.into(),
            client_addr: addr,
        }
    }

    /// Creates a result response.
    pub fn result(addr: SocketAddr, node_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            msg_type: CliMessageType::Result,
            node_name: node_name.into(),
            value: message.into(),
            client_addr: addr,
        }
    }

    /// Creates a command message.
    pub fn command(addr: SocketAddr, node_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            msg_type: CliMessageType::Command,
            node_name: node_name.into(),
            value: command.into(),
            client_addr: addr,
        }
    }

    /// Encodes the message into its datagram form.
    pub fn encode(&self) -> Vec<u8> {
        let node_bytes = self.node_name.as_bytes();
        let value_bytes = self.value.as_bytes();
        let mut buf = Vec::with_capacity(12 + node_bytes.len() + value_bytes.len());

        buf.push(VERSION_MAJOR);
        buf.push(VERSION_MINOR);
        buf.push(VERSION_PATCH);
        buf.push(self.msg_type as u8);

        buf.extend_from_slice(&(node_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(node_bytes);
        buf.extend_from_slice(&(value_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(value_bytes);

        buf
    }

    /// Decodes a datagram into a message. Returns `None` on framing or
    /// version mismatch.
    pub fn decode(data: &[u8], client_addr: SocketAddr) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }
        if data[0] != VERSION_MAJOR || data[1] != VERSION_MINOR || data[2] != VERSION_PATCH {
            return None;
        }

        let msg_type = CliMessageType::try_from(data[3]).ok()?;

        let node_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let node_end = 8usize.checked_add(node_len)?;
        if data.len() < node_end + 4 {
            return None;
        }
        let node_name = String::from_utf8(data[8..node_end].to_vec()).ok()?;

        let value_len = u32::from_be_bytes([
            data[node_end],
            data[node_end + 1],
            data[node_end + 2],
            data[node_end + 3],
        ]) as usize;
        let value_start = node_end + 4;
        let value_end = value_start.checked_add(value_len)?;
        if data.len() < value_end {
            return None;
        }
        let value = String::from_utf8(data[value_start..value_end].to_vec()).ok()?;

        Some(Self {
            msg_type,
            node_name,
            value,
            client_addr,
        })
    }
}

/// Process table entry advertising a running instance.
#[derive(Debug, Clone)]
pub struct ProcTableEntry {
    /// Protocol version - major
    pub major: u8,
    /// Protocol version - minor
    pub minor: u8,
    /// Protocol version - patch
    pub patch: u8,
    /// Process ID
    pub pid: u32,
    /// Command port for CLI communication
    pub port: u16,
    /// Node names served by this process
    pub nodes: Vec<String>,
}

impl ProcTableEntry {
    /// Encodes the entry to its file form.
    pub fn encode(&self) -> String {
        let mut s = format!(
            "{} {} {} {} {} {}",
            self.major,
            self.minor,
            self.patch,
            self.pid,
            self.port,
            self.nodes.len()
        );
        for node in &self.nodes {
            s.push(' ');
            s.push_str(node);
        }
        s
    }

    /// Decodes an entry from its file form.
    pub fn decode(text: &str) -> Option<Self> {
        let mut it = text.split_whitespace();
        let major = it.next()?.parse().ok()?;
        let minor = it.next()?.parse().ok()?;
        let patch = it.next()?.parse().ok()?;
        let pid = it.next()?.parse().ok()?;
        let port = it.next()?.parse().ok()?;
        let count: usize = it.next()?.parse().ok()?;
        let nodes: Vec<String> = it.map(str::to_string).collect();
        if nodes.len() != count {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch,
            pid,
            port,
            nodes,
        })
    }
}

/// CLI server accepting commands for one or more nodes.
pub struct CliServer {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    proc_table_path: Option<PathBuf>,
    node_names: Vec<String>,
}

impl CliServer {
    /// Creates a server bound to localhost on a random port.
    pub async fn new() -> std::io::Result<Self> {
        let socket = UdpSocket::bind(format!("{CMD_SERVER_IP}:0")).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            proc_table_path: None,
            node_names: Vec::new(),
        })
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Registers the served node names in the process table so the CLI
    /// client can discover this instance.
    pub fn register_nodes(&mut self, nodes: Vec<String>) -> std::io::Result<()> {
        self.node_names = nodes.clone();

        fs::create_dir_all(PROC_TABLE_DIR)?;

        let pid = std::process::id();
        let filename = format!("{:016x}", {
            let mut hasher = DefaultHasher::new();
            self.node_names.hash(&mut hasher);
            self.port().hash(&mut hasher);
            pid.hash(&mut hasher);
            hasher.finish()
        });

        let file_path = Path::new(PROC_TABLE_DIR).join(filename);
        let entry = ProcTableEntry {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            patch: VERSION_PATCH,
            pid,
            port: self.port(),
            nodes,
        };
        fs::write(&file_path, entry.encode())?;
        self.proc_table_path = Some(file_path);
        Ok(())
    }

    /// Receives the next command addressed to one of the served nodes.
    ///
    /// Malformed datagrams, non-command messages and commands for other
    /// nodes yield `None`.
    pub async fn receive_command(&self) -> std::io::Result<Option<CliMessage>> {
        let mut buffer = [0u8; CMD_BUFFER_SIZE];
        let (size, addr) = self.socket.recv_from(&mut buffer).await?;
        if size == 0 {
            return Ok(None);
        }

        let msg = match CliMessage::decode(&buffer[..size], addr) {
            Some(m) => m,
            None => return Ok(None),
        };
        if msg.msg_type != CliMessageType::Command {
            return Ok(None);
        }
        if !self.node_names.is_empty() && !self.node_names.contains(&msg.node_name) {
            return Ok(None);
        }
        Ok(Some(msg))
    }

    /// Sends a result response.
    pub async fn send_result(&self, addr: SocketAddr, message: impl Into<String>) -> std::io::Result<()> {
        let msg = CliMessage::result(addr, "", message);
        self.socket.send_to(&msg.encode(), addr).await?;
        Ok(())
    }

    /// Sends an error response.
    pub async fn send_error(&self, addr: SocketAddr, message: impl Into<String>) -> std::io::Result<()> {
        let msg = CliMessage::error(addr, "", message);
        self.socket.send_to(&msg.encode(), addr).await?;
        Ok(())
    }
}

impl Drop for CliServer {
    fn drop(&mut self) {
        if let Some(path) = &self.proc_table_path {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_message_encode_decode() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let msg = CliMessage::command(addr, "gnb-1", "ue-count");
        let decoded = CliMessage::decode(&msg.encode(), addr).unwrap();

        assert_eq!(decoded.msg_type, CliMessageType::Command);
        assert_eq!(decoded.node_name, "gnb-1");
        assert_eq!(decoded.value, "ue-count");
    }

    #[test]
    fn test_cli_message_rejects_truncated() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let msg = CliMessage::result(addr, "n", "abcdef");
        let encoded = msg.encode();
        assert!(CliMessage::decode(&encoded[..encoded.len() - 2], addr).is_none());
        assert!(CliMessage::decode(&[1, 0], addr).is_none());
    }

    #[test]
    fn test_proc_table_entry_round_trip() {
        let entry = ProcTableEntry {
            major: 1,
            minor: 0,
            patch: 0,
            pid: 4242,
            port: 5999,
            nodes: vec!["gnb-1".to_string(), "imsi-1".to_string()],
        };
        let decoded = ProcTableEntry::decode(&entry.encode()).unwrap();
        assert_eq!(decoded.pid, 4242);
        assert_eq!(decoded.nodes, entry.nodes);
    }

    #[tokio::test]
    async fn test_cli_server_bind() {
        let server = CliServer::new().await.unwrap();
        assert!(server.port() > 0);
    }
}
