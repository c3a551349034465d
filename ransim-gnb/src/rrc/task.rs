//! RRC task implementation
//!
//! Bridges NAS between NGAP and the air interface: wraps downlink NAS in
//! dlInformationTransfer, extracts uplink NAS from ulInformationTransfer,
//! builds paging records and releases connections.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ransim_common::{OctetString, RrcChannel};
use ransim_rrc::codec::{decode_ul_dcch, encode_dl_dcch, encode_pcch};
use ransim_rrc::messages::{
    DlDcchMessage, DlInformationTransfer, Paging, PagingRecord, PcchMessage, RrcReconfiguration,
    RrcRelease, UlDcchMessage,
};

use crate::tasks::{GnbTaskBase, MrMessage, NgapMessage, RrcMessage, Task, TaskMessage};

use super::ue_context::RrcUeContext;

/// RRC task for per-UE connection state and NAS carriage.
pub struct RrcTask {
    task_base: GnbTaskBase,
    ue_contexts: HashMap<i32, RrcUeContext>,
    /// Set once NGAP reports every AMF connected
    radio_enabled: bool,
}

impl RrcTask {
    /// Creates the RRC task.
    pub fn new(task_base: GnbTaskBase) -> Self {
        Self {
            task_base,
            ue_contexts: HashMap::new(),
            radio_enabled: false,
        }
    }

    fn handle_ngap_layer_initialized(&mut self) {
        info!("NGAP layer initialized, radio interface enabled");
        self.radio_enabled = true;
    }

    /// Wraps a NAS PDU in dlInformationTransfer and hands it to the air
    /// interface.
    async fn handle_nas_delivery(&mut self, ue_id: i32, nas_pdu: OctetString) {
        debug!("Downlink NAS delivery: ue_id={}, len={}", ue_id, nas_pdu.len());

        let tid = match self.allocate_tid(ue_id) {
            Some(tid) => tid,
            None => return,
        };

        let message = DlDcchMessage::DlInformationTransfer(DlInformationTransfer {
            transaction_id: tid,
            dedicated_nas_message: nas_pdu.data().to_vec(),
        });
        self.send_dl_dcch(ue_id, &message).await;
        // NAS carriage has no response at RRC level
        if let Some(ctx) = self.ue_contexts.get_mut(&ue_id) {
            ctx.complete_transaction(tid);
        }
    }

    /// Sends a standalone RRC Reconfiguration in its minimal legal form.
    async fn handle_perform_reconfiguration(&mut self, ue_id: i32) {
        info!("RRC Reconfiguration for UE[{}]", ue_id);

        let tid = match self.allocate_tid(ue_id) {
            Some(tid) => tid,
            None => return,
        };

        let message = DlDcchMessage::RrcReconfiguration(RrcReconfiguration { transaction_id: tid });
        self.send_dl_dcch(ue_id, &message).await;
    }

    /// Releases the RRC connection and removes the UE context.
    async fn handle_an_release(&mut self, ue_id: i32) {
        info!("Releasing RRC connection for UE[{}]", ue_id);

        if let Some(tid) = self.allocate_tid(ue_id) {
            let message = DlDcchMessage::RrcRelease(RrcRelease { transaction_id: tid });
            self.send_dl_dcch(ue_id, &message).await;
        }

        self.ue_contexts.remove(&ue_id);
    }

    /// Uplink RRC reception: extracts the dedicated NAS octet string and
    /// forwards it to NGAP.
    async fn handle_uplink_rrc(&mut self, ue_id: i32, channel: RrcChannel, pdu: OctetString) {
        if !self.radio_enabled {
            warn!("Uplink RRC from UE[{}] before NGAP initialization, dropped", ue_id);
            return;
        }
        if channel != RrcChannel::UlDcch {
            warn!("Unexpected uplink channel: {:?}", channel);
            return;
        }

        self.ue_contexts
            .entry(ue_id)
            .or_insert_with(|| RrcUeContext::new(ue_id));

        let message = match decode_ul_dcch(pdu.data()) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to decode UL-DCCH message from UE[{}]: {}", ue_id, e);
                return;
            }
        };

        match message {
            UlDcchMessage::UlInformationTransfer(transfer) => {
                let msg = NgapMessage::UplinkNasDelivery {
                    ue_id,
                    pdu: OctetString::from_slice(&transfer.dedicated_nas_message),
                };
                if let Err(e) = self.task_base.ngap_tx.send(msg).await {
                    error!("Failed to forward uplink NAS to NGAP: {}", e);
                }
            }
        }
    }

    /// Radio link failure: notify NGAP and drop the context.
    async fn handle_radio_link_failure(&mut self, ue_id: i32) {
        warn!("Radio link failure for UE[{}]", ue_id);

        let msg = NgapMessage::RadioLinkFailure { ue_id };
        if let Err(e) = self.task_base.ngap_tx.send(msg).await {
            error!("Failed to notify NGAP of radio link failure: {}", e);
        }

        self.ue_contexts.remove(&ue_id);
    }

    /// Builds a PCCH paging record and broadcasts it.
    async fn handle_paging(&mut self, five_g_s_tmsi: ransim_ngap::ies::FiveGSTmsi) {
        debug!("Paging request: tmsi=0x{:08x}", five_g_s_tmsi.tmsi);

        let message = PcchMessage::Paging(Paging {
            paging_records: vec![PagingRecord::from_s_tmsi(
                five_g_s_tmsi.amf_set_id,
                five_g_s_tmsi.amf_pointer,
                five_g_s_tmsi.tmsi,
            )],
        });

        let bytes = match encode_pcch(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode paging message: {}", e);
                return;
            }
        };

        let msg = MrMessage::DownlinkPcch {
            pdu: OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.task_base.mr_tx.send(msg).await {
            error!("Failed to broadcast paging: {}", e);
        }
    }

    fn allocate_tid(&mut self, ue_id: i32) -> Option<u8> {
        let ctx = self
            .ue_contexts
            .entry(ue_id)
            .or_insert_with(|| RrcUeContext::new(ue_id));
        let tid = ctx.allocate_transaction_id();
        if tid.is_none() {
            warn!("No RRC transaction identifier available for UE[{}]", ue_id);
        }
        tid
    }

    async fn send_dl_dcch(&mut self, ue_id: i32, message: &DlDcchMessage) {
        let bytes = match encode_dl_dcch(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode DL-DCCH message: {}", e);
                return;
            }
        };

        let msg = MrMessage::DownlinkRrc {
            ue_id,
            channel: RrcChannel::DlDcch,
            pdu: OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.task_base.mr_tx.send(msg).await {
            error!("Failed to send DL-DCCH to MR: {}", e);
        }
    }

    async fn dispatch(&mut self, msg: RrcMessage) {
        match msg {
            RrcMessage::NgapLayerInitialized => self.handle_ngap_layer_initialized(),
            RrcMessage::NasDelivery { ue_id, pdu } => self.handle_nas_delivery(ue_id, pdu).await,
            RrcMessage::PerformReconfiguration { ue_id } => {
                self.handle_perform_reconfiguration(ue_id).await;
            }
            RrcMessage::AnRelease { ue_id } => self.handle_an_release(ue_id).await,
            RrcMessage::UplinkRrc { ue_id, channel, pdu } => {
                self.handle_uplink_rrc(ue_id, channel, pdu).await;
            }
            RrcMessage::RadioLinkFailure { ue_id } => {
                self.handle_radio_link_failure(ue_id).await;
            }
            RrcMessage::Paging { five_g_s_tmsi } => self.handle_paging(five_g_s_tmsi).await,
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

        info!("RRC task stopped with {} UE contexts", self.ue_contexts.len());
    }
}
