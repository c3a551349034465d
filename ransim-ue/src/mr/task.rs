//! UE MR task implementation
//!
//! Holds the air link toward the serving gNB. A pump forwards downlink
//! frames into the mailbox so the task keeps its single-loop shape.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ransim_common::{AirFrame, AirPdu, RrcChannel, UeAirEndpoint};

use crate::tasks::{AppMessage, MrMessage, RrcMessage, Task, TaskMessage, UeTaskBase};

/// UE MR task.
pub struct MrTask {
    task_base: UeTaskBase,
    ue_id: Option<i32>,
    uplink: Option<mpsc::Sender<AirFrame>>,
}

impl MrTask {
    /// Creates the MR task, not yet attached to any cell.
    pub fn new(task_base: UeTaskBase) -> Self {
        Self {
            task_base,
            ue_id: None,
            uplink: None,
        }
    }

    /// True while an air link is attached.
    pub fn is_attached(&self) -> bool {
        self.uplink.is_some()
    }

    async fn handle_connect_cell(&mut self, endpoint: UeAirEndpoint) {
        info!("Attaching to cell air link as UE[{}]", endpoint.ue_id);
        let UeAirEndpoint {
            ue_id,
            uplink,
            mut downlink,
        } = endpoint;

        self.ue_id = Some(ue_id);
        self.uplink = Some(uplink);

        // pump downlink frames into our own mailbox
        let mr_tx = self.task_base.mr_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = downlink.recv().await {
                if mr_tx.send(MrMessage::DownlinkFrame { frame }).await.is_err() {
                    return;
                }
            }
            let _ = mr_tx.send(MrMessage::LinkLost).await;
        });
    }

    async fn handle_plmn_search(&mut self) {
        if self.uplink.is_some() {
            debug!("PLMN search: serving cell available");
            let _ = self.task_base.rrc_tx.send(RrcMessage::CellFound).await;
        } else {
            debug!("PLMN search: no cell available");
        }
    }

    async fn send_uplink(&mut self, pdu: AirPdu) {
        let (ue_id, uplink) = match (self.ue_id, self.uplink.as_ref()) {
            (Some(ue_id), Some(uplink)) => (ue_id, uplink),
            _ => {
                warn!("Uplink frame dropped: not attached to a cell");
                return;
            }
        };

        if uplink.send(AirFrame { ue_id, pdu }).await.is_err() {
            error!("Uplink to cell failed, link lost");
            self.handle_link_lost().await;
        }
    }

    async fn handle_downlink_frame(&mut self, frame: AirFrame) {
        match frame.pdu {
            AirPdu::Rrc { channel, pdu } => {
                let msg = RrcMessage::DownlinkRrcDelivery { channel, pdu };
                if let Err(e) = self.task_base.rrc_tx.send(msg).await {
                    error!("Failed to deliver downlink RRC: {}", e);
                }
            }
            AirPdu::Data { psi, pdu } => {
                let msg = AppMessage::MrDataDelivery { psi, data: pdu };
                if let Err(e) = self.task_base.app_tx.send(msg).await {
                    error!("Failed to deliver downlink data: {}", e);
                }
            }
        }
    }

    async fn handle_link_lost(&mut self) {
        if self.uplink.take().is_some() {
            warn!("Air link lost");
            self.ue_id = None;
            let _ = self.task_base.rrc_tx.send(RrcMessage::RadioLinkFailure).await;
        }
    }

    async fn dispatch(&mut self, msg: MrMessage) {
        match msg {
            MrMessage::ConnectCell { endpoint } => self.handle_connect_cell(endpoint).await,
            MrMessage::PlmnSearch => self.handle_plmn_search().await,
            MrMessage::UplinkRrc { channel, pdu } => {
                self.send_uplink(AirPdu::Rrc { channel, pdu }).await;
            }
            MrMessage::UplinkData { psi, data } => {
                self.send_uplink(AirPdu::Data { psi, pdu: data }).await;
            }
            MrMessage::DownlinkFrame { frame } => self.handle_downlink_frame(frame).await,
            MrMessage::LinkLost => self.handle_link_lost().await,
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
                _ = pause.wait_requested() => continue,
            }
        }

        info!("MR task stopped");
    }
}
