//! MR task implementation
//!
//! Routes uplink air frames to RRC (signalling) and GTP (user plane) and
//! delivers downlink frames to the owning UE's link. The UE name table
//! is shared for CLI sampling.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use ransim_common::{AirFrame, AirPdu, GnbAirPeer, OctetString, RrcChannel};

use crate::tasks::{GnbTaskBase, GtpMessage, MrMessage, RrcMessage, Task, TaskMessage};

/// MR state sampled by the CLI (UE names for UE_LIST).
#[derive(Debug, Default)]
pub struct MrState {
    /// UE names keyed by UE id
    pub ue_names: HashMap<i32, String>,
}

/// MR task: the air interface endpoint of the gNB.
pub struct MrTask {
    task_base: GnbTaskBase,
    peers: HashMap<i32, GnbAirPeer>,
    uplink_rx: mpsc::Receiver<AirFrame>,
    state: Arc<Mutex<MrState>>,
}

impl MrTask {
    /// Creates the MR task around the shared uplink inbox.
    pub fn new(task_base: GnbTaskBase, uplink_rx: mpsc::Receiver<AirFrame>) -> Self {
        Self {
            task_base,
            peers: HashMap::new(),
            uplink_rx,
            state: Arc::new(Mutex::new(MrState::default())),
        }
    }

    /// Shared state handle for CLI sampling.
    pub fn state(&self) -> Arc<Mutex<MrState>> {
        Arc::clone(&self.state)
    }

    async fn handle_ue_connected(&mut self, peer: GnbAirPeer) {
        info!("UE[{}] connected over the air link: {}", peer.ue_id, peer.ue_name);
        self.state
            .lock()
            .await
            .ue_names
            .insert(peer.ue_id, peer.ue_name.clone());
        self.peers.insert(peer.ue_id, peer);
    }

    async fn handle_ue_disconnected(&mut self, ue_id: i32) {
        info!("UE[{}] air link lost", ue_id);
        self.peers.remove(&ue_id);
        self.state.lock().await.ue_names.remove(&ue_id);

        let msg = RrcMessage::RadioLinkFailure { ue_id };
        if let Err(e) = self.task_base.rrc_tx.send(msg).await {
            error!("Failed to report radio link failure to RRC: {}", e);
        }
    }

    async fn handle_uplink_frame(&mut self, frame: AirFrame) {
        match frame.pdu {
            AirPdu::Rrc { channel, pdu } => {
                let msg = RrcMessage::UplinkRrc {
                    ue_id: frame.ue_id,
                    channel,
                    pdu,
                };
                if let Err(e) = self.task_base.rrc_tx.send(msg).await {
                    error!("Failed to forward uplink RRC: {}", e);
                }
            }
            AirPdu::Data { psi, pdu } => {
                let msg = GtpMessage::UplinkData {
                    ue_id: frame.ue_id,
                    psi,
                    pdu,
                };
                if let Err(e) = self.task_base.gtp_tx.send(msg).await {
                    error!("Failed to forward uplink data: {}", e);
                }
            }
        }
    }

    async fn send_to_ue(&mut self, ue_id: i32, pdu: AirPdu) {
        match self.peers.get(&ue_id) {
            Some(peer) => {
                let frame = AirFrame { ue_id, pdu };
                if peer.downlink.send(frame).await.is_err() {
                    warn!("Downlink to UE[{}] failed, dropping link", ue_id);
                    self.handle_ue_disconnected(ue_id).await;
                }
            }
            None => debug!("Downlink for unknown UE[{}] dropped", ue_id),
        }
    }

    async fn dispatch(&mut self, msg: MrMessage) {
        match msg {
            MrMessage::UeConnected { peer } => self.handle_ue_connected(peer).await,
            MrMessage::UeDisconnected { ue_id } => self.handle_ue_disconnected(ue_id).await,
            MrMessage::DownlinkRrc { ue_id, channel, pdu } => {
                self.send_to_ue(ue_id, AirPdu::Rrc { channel, pdu }).await;
            }
            MrMessage::DownlinkPcch { pdu } => {
                let ue_ids: Vec<i32> = self.peers.keys().copied().collect();
                for ue_id in ue_ids {
                    self.send_to_ue(
                        ue_id,
                        AirPdu::Rrc {
                            channel: RrcChannel::Pcch,
                            pdu: OctetString::from_slice(pdu.data()),
                        },
                    )
                    .await;
                }
            }
            MrMessage::DownlinkData { ue_id, psi, pdu } => {
                self.send_to_ue(ue_id, AirPdu::Data { psi, pdu }).await;
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for MrTask {
    type Message = MrMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("MR task started");
        let pause = self.task_base.mr_tx.pause();

        loop {
            pause.pause_point().await;
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(msg)) => self.dispatch(msg).await,
                    Some(TaskMessage::Shutdown) | None => break,
                },
                frame = self.uplink_rx.recv() => match frame {
                    Some(frame) => self.handle_uplink_frame(frame).await,
                    None => debug!("Uplink inbox closed"),
                },
                _ = pause.wait_requested() => continue,
            }
        }

        info!("MR task stopped with {} UE links", self.peers.len());
    }
}
