//! gNB node library for the ransim 5G RAN edge simulator
//!
//! Assembles the gNB from its cooperating tasks and exposes the handles
//! an embedder (the binary, or a test harness standing in for the AMF
//! and UE sides) needs to drive it.

pub mod app;
pub mod gtp;
pub mod mr;
pub mod ngap;
pub mod rrc;
pub mod sctp;
pub mod tasks;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use ransim_common::{AirFrame, GnbConfig, NodeListener};

use crate::app::AppTask;
use crate::gtp::{GtpTask, UpfDatagram};
use crate::mr::{MrState, MrTask};
use crate::ngap::{NgapState, NgapTask};
use crate::rrc::RrcTask;
use crate::sctp::{SctpTask, SctpWireTx};
use crate::tasks::{GnbTaskBase, Task, DEFAULT_CHANNEL_CAPACITY};

/// A running gNB node and the handles to drive its externals.
pub struct GnbNode {
    /// Task base (send handles, config, pause controls)
    pub base: GnbTaskBase,
    /// NGAP state for sampling in embedder tests
    pub ngap_state: Arc<Mutex<NgapState>>,
    /// MR state for sampling in embedder tests
    pub mr_state: Arc<Mutex<MrState>>,
    /// Sender UEs use to reach this gNB's air interface
    pub air_uplink: mpsc::Sender<AirFrame>,
    /// Payloads leaving the node toward AMFs (the SCTP socket side)
    pub sctp_wire_rx: mpsc::Receiver<SctpWireTx>,
    /// Datagrams leaving the node toward the UPF
    pub upf_rx: mpsc::Receiver<UpfDatagram>,
    /// CLI port, 0 when the CLI is disabled
    pub cli_port: u16,
}

impl GnbNode {
    /// Builds and spawns all gNB tasks.
    pub async fn start(
        config: GnbConfig,
        listener: Option<Arc<dyn NodeListener>>,
        enable_cli: bool,
    ) -> std::io::Result<Self> {
        let (base, receivers) = GnbTaskBase::new(config, listener, DEFAULT_CHANNEL_CAPACITY);

        let (air_uplink, air_uplink_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (sctp_wire_tx, sctp_wire_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (upf_tx, upf_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let mut ngap_task = NgapTask::new(base.clone());
        let ngap_state = ngap_task.state();
        let mut rrc_task = RrcTask::new(base.clone());
        let mut gtp_task = GtpTask::new(base.clone(), upf_tx);
        let mut mr_task = MrTask::new(base.clone(), air_uplink_rx);
        let mr_state = mr_task.state();
        let mut sctp_task = SctpTask::new(base.clone(), sctp_wire_tx);
        let mut app_task = AppTask::new(base.clone(), Arc::clone(&ngap_state), Arc::clone(&mr_state));

        let cli_port = if enable_cli {
            app_task.init_cli_server().await?
        } else {
            0
        };

        tokio::spawn(async move { ngap_task.run(receivers.ngap_rx).await });
        tokio::spawn(async move { rrc_task.run(receivers.rrc_rx).await });
        tokio::spawn(async move { gtp_task.run(receivers.gtp_rx).await });
        tokio::spawn(async move { mr_task.run(receivers.mr_rx).await });
        tokio::spawn(async move { sctp_task.run(receivers.sctp_rx).await });
        tokio::spawn(async move { app_task.run(receivers.app_rx).await });

        Ok(Self {
            base,
            ngap_state,
            mr_state,
            air_uplink,
            sctp_wire_rx,
            upf_rx,
            cli_port,
        })
    }

    /// Gracefully shuts down all tasks.
    pub async fn shutdown(&self) {
        self.base.shutdown_all().await;
    }
}
