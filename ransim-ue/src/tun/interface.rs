//! TUN interface management
//!
//! Allocates the kernel tun device for one PDU session, assigns the
//! allocated PDU address and optionally installs a default route. The
//! device itself comes from the `tun` crate; addressing and routing go
//! through `ip(8)` because the crate does not expose them.

use std::net::Ipv4Addr;
use std::os::unix::fs::MetadataExt;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

/// Receive buffer size; larger than any MTU the simulator uses.
const TUN_RECV_BUFFER_SIZE: usize = 8000;

/// TUN interface errors.
#[derive(Debug, Error)]
pub enum TunError {
    /// Device allocation failed (typically a permission problem)
    #[error("TUN allocation failure: {0}")]
    CreateFailed(String),
    /// Address or route configuration failed
    #[error("TUN configuration failure: {0}")]
    ConfigureFailed(String),
    /// Read/write on the device failed
    #[error("TUN I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// True when the process runs with root privileges.
///
/// `/proc/self` is owned by the effective UID of the process.
pub fn is_root() -> bool {
    std::fs::metadata("/proc/self")
        .map(|meta| meta.uid() == 0)
        .unwrap_or(false)
}

/// A configured tun device bound to one PDU session.
pub struct TunInterface {
    device: tun::AsyncDevice,
    name: String,
    address: Ipv4Addr,
}

impl TunInterface {
    /// Allocates and configures the tun device `<prefix><psi>` with the
    /// allocated PDU address, optionally installing a default route.
    pub async fn create(
        name_prefix: &str,
        psi: u8,
        address: Ipv4Addr,
        configure_routing: bool,
    ) -> Result<Self, TunError> {
        let name = format!("{name_prefix}{psi}");

        let mut config = tun::Configuration::default();
        config
            .name(&name)
            .address(address)
            .netmask(Ipv4Addr::new(255, 255, 255, 0))
            .mtu(1400)
            .up();
        #[cfg(target_os = "linux")]
        config.platform(|platform| {
            platform.packet_information(false);
        });

        let device = tun::create_as_async(&config)
            .map_err(|e| TunError::CreateFailed(e.to_string()))?;

        info!("TUN interface[{}, {}] is up", name, address);

        let interface = Self {
            device,
            name,
            address,
        };

        if configure_routing {
            interface.install_default_route().await?;
        }

        Ok(interface)
    }

    /// Installs a default route through this interface.
    async fn install_default_route(&self) -> Result<(), TunError> {
        let output = tokio::process::Command::new("ip")
            .args(["route", "add", "default", "dev", &self.name])
            .output()
            .await
            .map_err(|e| TunError::ConfigureFailed(format!("failed to run ip command: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("File exists") {
                return Err(TunError::ConfigureFailed(format!(
                    "ip route add failed: {stderr}"
                )));
            }
            warn!("Default route already present, keeping it");
        }
        Ok(())
    }

    /// The allocated interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The session's PDU address.
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Reads one IP packet from the device.
    pub async fn read(&mut self) -> Result<Vec<u8>, TunError> {
        let mut buf = vec![0u8; TUN_RECV_BUFFER_SIZE];
        let n = self.device.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes one IP packet to the device.
    pub async fn write(&mut self, packet: &[u8]) -> Result<usize, TunError> {
        Ok(self.device.write(packet).await?)
    }
}
