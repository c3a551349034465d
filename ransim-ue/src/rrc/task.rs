//! UE RRC task implementation
//!
//! Carries NAS over ulInformationTransfer / dlInformationTransfer,
//! handles RRC release and paging, and answers NAS PLMN search requests
//! by probing the air interface.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ransim_common::{OctetString, RrcChannel};
use ransim_rrc::codec::{decode_dl_dcch, decode_pcch, encode_ul_dcch};
use ransim_rrc::messages::{DlDcchMessage, UlDcchMessage, UlInformationTransfer};

use crate::tasks::{MrMessage, NasMessage, RrcMessage, Task, TaskMessage, UeTaskBase};

/// UE RRC task.
pub struct RrcTask {
    task_base: UeTaskBase,
    connected: bool,
}

impl RrcTask {
    /// Creates the RRC task.
    pub fn new(task_base: UeTaskBase) -> Self {
        Self {
            task_base,
            connected: false,
        }
    }

    async fn handle_plmn_search_request(&mut self) {
        debug!("PLMN search requested");
        let _ = self.task_base.mr_tx.send(MrMessage::PlmnSearch).await;
    }

    async fn handle_cell_found(&mut self) {
        if self.connected {
            return;
        }
        info!("Serving cell found, RRC connection established");
        self.connected = true;
        let _ = self.task_base.nas_tx.send(NasMessage::RrcConnectionSetup).await;
    }

    async fn handle_uplink_nas(&mut self, pdu: OctetString) {
        if !self.connected {
            warn!("Uplink NAS while not connected, dropped");
            return;
        }

        let message = UlDcchMessage::UlInformationTransfer(UlInformationTransfer {
            dedicated_nas_message: pdu.data().to_vec(),
        });
        let bytes = match encode_ul_dcch(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode UL-DCCH message: {}", e);
                return;
            }
        };

        let msg = MrMessage::UplinkRrc {
            channel: RrcChannel::UlDcch,
            pdu: OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.task_base.mr_tx.send(msg).await {
            error!("Failed to send uplink RRC to MR: {}", e);
        }
    }

    async fn handle_local_release(&mut self) {
        if self.connected {
            info!("Releasing RRC connection locally");
            self.connected = false;
            let _ = self
                .task_base
                .nas_tx
                .send(NasMessage::RrcConnectionRelease)
                .await;
        }
    }

    async fn handle_downlink_rrc(&mut self, channel: RrcChannel, pdu: OctetString) {
        match channel {
            RrcChannel::DlDcch => self.handle_dl_dcch(pdu).await,
            RrcChannel::Pcch => self.handle_pcch(pdu).await,
            other => warn!("Unexpected downlink channel: {:?}", other),
        }
    }

    async fn handle_dl_dcch(&mut self, pdu: OctetString) {
        let message = match decode_dl_dcch(pdu.data()) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to decode DL-DCCH message: {}", e);
                return;
            }
        };

        match message {
            DlDcchMessage::DlInformationTransfer(transfer) => {
                let msg = NasMessage::NasDelivery {
                    pdu: OctetString::from_slice(&transfer.dedicated_nas_message),
                };
                if let Err(e) = self.task_base.nas_tx.send(msg).await {
                    error!("Failed to deliver downlink NAS: {}", e);
                }
            }
            DlDcchMessage::RrcRelease(release) => {
                info!("RRC Release received (tid={})", release.transaction_id);
                self.connected = false;
                let _ = self
                    .task_base
                    .nas_tx
                    .send(NasMessage::RrcConnectionRelease)
                    .await;
            }
            DlDcchMessage::RrcReconfiguration(reconfig) => {
                // no reconfiguration IEs are modelled; accept silently
                debug!("RRC Reconfiguration received (tid={})", reconfig.transaction_id);
            }
        }
    }

    async fn handle_pcch(&mut self, pdu: OctetString) {
        match decode_pcch(pdu.data()) {
            Ok(_paging) => {
                debug!("Paging received");
                let _ = self.task_base.nas_tx.send(NasMessage::Paging).await;
            }
            Err(e) => error!("Failed to decode PCCH message: {}", e),
        }
    }

    async fn handle_radio_link_failure(&mut self) {
        warn!("Radio link failure");
        self.connected = false;
        let _ = self.task_base.nas_tx.send(NasMessage::RadioLinkFailure).await;
    }

    async fn dispatch(&mut self, msg: RrcMessage) {
        match msg {
            RrcMessage::PlmnSearchRequest => self.handle_plmn_search_request().await,
            RrcMessage::UplinkNasDelivery { pdu } => self.handle_uplink_nas(pdu).await,
            RrcMessage::LocalReleaseConnection => self.handle_local_release().await,
            RrcMessage::CellFound => self.handle_cell_found().await,
            RrcMessage::DownlinkRrcDelivery { channel, pdu } => {
                self.handle_downlink_rrc(channel, pdu).await;
            }
            RrcMessage::RadioLinkFailure => self.handle_radio_link_failure().await,
        }
    }
}

#[async_trait::async_trait]
impl Task for RrcTask {
    type Message = RrcMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("RRC task started");
        let pause = self.task_base.rrc_tx.pause();

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

        info!("RRC task stopped");
    }
}
