//! UE node library for the ransim 5G RAN edge simulator
//!
//! Assembles the UE from its cooperating tasks and exposes the handles
//! an embedder (the binary, or a test harness standing in for the gNB
//! side) needs to drive it.

pub mod app;
pub mod mr;
pub mod nas;
pub mod rrc;
pub mod tasks;
pub mod timer;
pub mod tun;

use std::sync::Arc;

use tokio::sync::Mutex;

use ransim_common::{NodeListener, UeAirEndpoint, UeConfig};

use crate::app::{AppTask, UeController};
use crate::mr::MrTask;
use crate::nas::{NasContext, NasTask};
use crate::rrc::RrcTask;
use crate::tasks::{MrMessage, Task, UeTaskBase, DEFAULT_CHANNEL_CAPACITY};

/// A running UE node.
pub struct UeNode {
    /// Task base (send handles, config, pause controls)
    pub base: UeTaskBase,
    /// NAS context for sampling in embedder tests
    pub nas_context: Arc<Mutex<NasContext>>,
    /// CLI port, 0 when the CLI is disabled
    pub cli_port: u16,
}

impl UeNode {
    /// Builds and spawns all UE tasks.
    pub async fn start(
        config: UeConfig,
        listener: Option<Arc<dyn NodeListener>>,
        controller: Option<Arc<dyn UeController>>,
        enable_cli: bool,
    ) -> std::io::Result<Self> {
        let (base, receivers) = UeTaskBase::new(config, listener, DEFAULT_CHANNEL_CAPACITY);

        let mut nas_task = NasTask::new(base.clone());
        let nas_context = nas_task.context();
        let mut rrc_task = RrcTask::new(base.clone());
        let mut mr_task = MrTask::new(base.clone());
        let mut app_task = AppTask::new(base.clone(), Arc::clone(&nas_context), controller);

        let cli_port = if enable_cli {
            app_task.init_cli_server().await?
        } else {
            0
        };

        tokio::spawn(async move { nas_task.run(receivers.nas_rx).await });
        tokio::spawn(async move { rrc_task.run(receivers.rrc_rx).await });
        tokio::spawn(async move { mr_task.run(receivers.mr_rx).await });
        tokio::spawn(async move { app_task.run(receivers.app_rx).await });

        Ok(Self {
            base,
            nas_context,
            cli_port,
        })
    }

    /// Attaches the UE to a cell's air link.
    pub async fn connect_to_cell(&self, endpoint: UeAirEndpoint) {
        let _ = self.base.mr_tx.send(MrMessage::ConnectCell { endpoint }).await;
    }

    /// Gracefully shuts down all tasks.
    pub async fn shutdown(&self) {
        self.base.shutdown_all().await;
    }
}
