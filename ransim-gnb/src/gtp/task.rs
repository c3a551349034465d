//! GTP task implementation
//!
//! Owns the per-UE/per-session tunnel table. Uplink IP packets from the
//! MR task are encapsulated and emitted toward the UPF; downlink GTP-U
//! datagrams are decapsulated and handed to the MR task. The UDP socket
//! toward the UPF sits outside this task, behind the datagram channel.

use bytes::Bytes;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ransim_common::OctetString;
use ransim_gtp::TunnelManager;

use crate::tasks::{GnbTaskBase, GtpMessage, MrMessage, Task, TaskMessage};

/// An encapsulated datagram leaving the node toward the UPF.
#[derive(Debug, Clone)]
pub struct UpfDatagram {
    /// Destination UPF endpoint
    pub destination: SocketAddr,
    /// Encoded GTP-U datagram
    pub payload: Bytes,
}

/// GTP task for the gNB user plane.
pub struct GtpTask {
    task_base: GnbTaskBase,
    tunnels: TunnelManager,
    upf_tx: mpsc::Sender<UpfDatagram>,
}

impl GtpTask {
    /// Creates the GTP task; `upf_tx` carries encapsulated datagrams to
    /// the socket layer.
    pub fn new(task_base: GnbTaskBase, upf_tx: mpsc::Sender<UpfDatagram>) -> Self {
        Self {
            task_base,
            tunnels: TunnelManager::new(),
            upf_tx,
        }
    }

    async fn handle_session_create(&mut self, session: ransim_gtp::PduSession) {
        let (ue_id, psi) = (session.ue_id, session.psi);
        match self.tunnels.create_session(session) {
            Ok(()) => info!("GTP session created: ue_id={}, psi={}", ue_id, psi),
            Err(e) => error!("Failed to create GTP session: {}", e),
        }
    }

    async fn handle_session_release(&mut self, ue_id: i32, psi: u8) {
        match self.tunnels.release_session(ue_id, psi) {
            Ok(_) => info!("GTP session released: ue_id={}, psi={}", ue_id, psi),
            Err(e) => warn!("GTP session release failed: {}", e),
        }
    }

    async fn handle_ue_context_release(&mut self, ue_id: i32) {
        let released = self.tunnels.release_ue(ue_id);
        if released > 0 {
            info!("Released {} GTP sessions for UE[{}]", released, ue_id);
        }
    }

    async fn handle_uplink_data(&mut self, ue_id: i32, psi: i32, pdu: OctetString) {
        let psi = match u8::try_from(psi) {
            Ok(psi) => psi,
            Err(_) => {
                warn!("Uplink data with invalid PSI {} dropped", psi);
                return;
            }
        };

        match self
            .tunnels
            .encapsulate_uplink(ue_id, psi, Bytes::copy_from_slice(pdu.data()))
        {
            Ok((destination, payload)) => {
                let datagram = UpfDatagram {
                    destination,
                    payload,
                };
                if self.upf_tx.send(datagram).await.is_err() {
                    error!("UPF datagram channel closed");
                }
            }
            Err(e) => debug!("Uplink data dropped: {}", e),
        }
    }

    async fn handle_downlink_datagram(&mut self, datagram: OctetString) {
        match self.tunnels.decapsulate_downlink(datagram.data()) {
            Ok((ue_id, psi, payload)) => {
                let msg = MrMessage::DownlinkData {
                    ue_id,
                    psi: i32::from(psi),
                    pdu: OctetString::from_slice(&payload),
                };
                if let Err(e) = self.task_base.mr_tx.send(msg).await {
                    error!("Failed to forward downlink data to MR: {}", e);
                }
            }
            Err(e) => debug!("Downlink datagram dropped: {}", e),
        }
    }

    async fn dispatch(&mut self, msg: GtpMessage) {
        match msg {
            GtpMessage::SessionCreate { session } => self.handle_session_create(session).await,
            GtpMessage::SessionRelease { ue_id, psi } => {
                self.handle_session_release(ue_id, psi).await;
            }
            GtpMessage::UeContextRelease { ue_id } => {
                self.handle_ue_context_release(ue_id).await;
            }
            GtpMessage::UplinkData { ue_id, psi, pdu } => {
                self.handle_uplink_data(ue_id, psi, pdu).await;
            }
            GtpMessage::DownlinkDatagram { datagram } => {
                self.handle_downlink_datagram(datagram).await;
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for GtpTask {
    type Message = GtpMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("GTP task started");
        let pause = self.task_base.gtp_tx.pause();

        loop {
            pause.pause_point().await;
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(msg)) => self.dispatch(msg).await,
                    Some(TaskMessage::Shutdown) | None => break,
                },
                _ = pause.wait_requested() => continue,
            }
        }

        info!("GTP task stopped with {} sessions", self.tunnels.session_count());
    }
}
