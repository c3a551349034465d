//! TUN task implementation
//!
//! One task per established PDU session, exclusive owner of the session's
//! tun device. Uplink packets read from the device go to the App task;
//! downlink packets arrive as messages and are written to the device.
//! Shutdown closes the device with the task.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use ransim_common::OctetString;

use crate::tasks::{AppMessage, Task, TaskHandle, TaskMessage, TunMessage};
use crate::tun::interface::TunInterface;

/// TUN task bound to one PDU session.
pub struct TunTask {
    psi: u8,
    interface: TunInterface,
    app_tx: TaskHandle<AppMessage>,
}

impl TunTask {
    /// Creates the task around an allocated device.
    pub fn new(psi: u8, interface: TunInterface, app_tx: TaskHandle<AppMessage>) -> Self {
        Self {
            psi,
            interface,
            app_tx,
        }
    }

    async fn handle_downlink(&mut self, data: OctetString) {
        if let Err(e) = self.interface.write(data.data()).await {
            let _ = self
                .app_tx
                .send(AppMessage::TunError {
                    psi: i32::from(self.psi),
                    error: e.to_string(),
                })
                .await;
        }
    }

    async fn handle_uplink(&mut self, packet: Vec<u8>) {
        if packet.is_empty() {
            return;
        }
        debug!("Uplink packet from {}: {} bytes", self.interface.name(), packet.len());
        let msg = AppMessage::TunDataDelivery {
            psi: i32::from(self.psi),
            data: OctetString::from(packet),
        };
        if let Err(e) = self.app_tx.send(msg).await {
            error!("Failed to deliver uplink packet to App: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl Task for TunTask {
    type Message = TunMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("TUN task started for PDU session[{}]", self.psi);

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(TunMessage::DownlinkData { data })) => {
                        self.handle_downlink(data).await;
                    }
                    Some(TaskMessage::Shutdown) | None => break,
                },
                packet = self.interface.read() => match packet {
                    Ok(packet) => self.handle_uplink(packet).await,
                    Err(e) => {
                        let _ = self
                            .app_tx
                            .send(AppMessage::TunError {
                                psi: i32::from(self.psi),
                                error: e.to_string(),
                            })
                            .await;
                        break;
                    }
                },
            }
        }

        info!("TUN task stopped for PDU session[{}]", self.psi);
    }
}
