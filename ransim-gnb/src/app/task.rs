//! gNB application task
//!
//! Owns the CLI server and the command handler, aggregates node status
//! and coordinates pause/unpause across the worker tasks.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use ransim_common::cli_wire::CliServer;

use crate::mr::MrState;
use crate::ngap::NgapState;
use crate::tasks::{AppMessage, GnbStatusUpdate, GnbTaskBase, Task, TaskMessage};

use super::cli_server::{parse_gnb_cli_command, ParseOutcome};
use super::cmd_handler::{CmdResponse, GnbCmdHandler};
use super::status::GnbStatusInfo;

/// gNB application task.
pub struct AppTask {
    task_base: GnbTaskBase,
    status: GnbStatusInfo,
    ngap_state: Arc<Mutex<NgapState>>,
    mr_state: Arc<Mutex<MrState>>,
    cli_server: Option<Arc<CliServer>>,
}

impl AppTask {
    /// Creates the App task bound to the worker state it samples.
    pub fn new(
        task_base: GnbTaskBase,
        ngap_state: Arc<Mutex<NgapState>>,
        mr_state: Arc<Mutex<MrState>>,
    ) -> Self {
        Self {
            task_base,
            status: GnbStatusInfo::default(),
            ngap_state,
            mr_state,
            cli_server: None,
        }
    }

    /// Starts the CLI server and its receive loop. Returns the bound
    /// port. A failure here disables the CLI but the node keeps running.
    pub async fn init_cli_server(&mut self) -> std::io::Result<u16> {
        let mut server = CliServer::new().await?;
        server.register_nodes(vec![self.task_base.config.name.clone()])?;
        let port = server.port();

        let server = Arc::new(server);
        self.cli_server = Some(Arc::clone(&server));

        // The CLI server task: parses wire requests into typed commands
        // and forwards them to the App task.
        let app_tx = self.task_base.app_tx.clone();
        tokio::spawn(async move {
            loop {
                let msg = match server.receive_command().await {
                    Ok(Some(msg)) => msg,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("CLI server receive failed: {}", e);
                        break;
                    }
                };

                let tokens: Vec<&str> = msg.value.split_whitespace().collect();
                match parse_gnb_cli_command(&tokens) {
                    Ok(ParseOutcome::Command(command)) => {
                        let _ = app_tx
                            .send(AppMessage::CliCommand {
                                command,
                                client_addr: msg.client_addr,
                            })
                            .await;
                    }
                    Ok(ParseOutcome::Output(text)) => {
                        let _ = server.send_result(msg.client_addr, text).await;
                    }
                    Err(error) => {
                        let _ = server.send_error(msg.client_addr, error).await;
                    }
                }
            }
        });

        info!("CLI server listening on port {}", port);
        Ok(port)
    }

    fn handle_status_update(&mut self, update: GnbStatusUpdate) {
        match update {
            GnbStatusUpdate::NgapIsUp(value) => {
                info!("NGAP is {}", if value { "up" } else { "down" });
                self.status.is_ngap_up = value;
            }
        }
    }

    async fn handle_cli_command(&mut self, command: crate::tasks::GnbCliCommand, client_addr: std::net::SocketAddr) {
        let handler = GnbCmdHandler::new(
            self.task_base.clone(),
            Arc::clone(&self.ngap_state),
            Arc::clone(&self.mr_state),
            self.status,
        );

        let response = handler.handle(command).await;

        if let Some(ref server) = self.cli_server {
            let result = match response {
                CmdResponse::Result(text) => server.send_result(client_addr, text).await,
                CmdResponse::Error(text) => server.send_error(client_addr, text).await,
            };
            if let Err(e) = result {
                warn!("Failed to send CLI response: {}", e);
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for AppTask {
    type Message = AppMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("App task started");

        loop {
            match rx.recv().await {
                Some(TaskMessage::Message(msg)) => match msg {
                    AppMessage::StatusUpdate(update) => self.handle_status_update(update),
                    AppMessage::CliCommand { command, client_addr } => {
                        self.handle_cli_command(command, client_addr).await;
                    }
                },
                Some(TaskMessage::Shutdown) | None => break,
            }
        }

        info!("App task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mr::MrTask;
    use crate::ngap::NgapTask;
    use crate::tasks::DEFAULT_CHANNEL_CAPACITY;
    use ransim_common::{AmfConfig, GnbConfig, PagingDrx, Plmn};

    fn test_config() -> GnbConfig {
        GnbConfig {
            gnb_id: 1,
            gnb_id_length: 32,
            name: "test-gnb".to_string(),
            plmn: Plmn::new(901, 70, false),
            tac: 1,
            nci: 0x10,
            nssais: vec![],
            paging_drx: PagingDrx::V128,
            amf_configs: vec![AmfConfig::new("127.0.0.1".parse().unwrap(), 38412)],
            ignore_stream_ids: false,
            debug_stubs: false,
        }
    }

    #[tokio::test]
    async fn test_status_update_applied() {
        let (base, _receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        let ngap = NgapTask::new(base.clone());
        let (_tx, uplink_rx) = mpsc::channel(4);
        let mr = MrTask::new(base.clone(), uplink_rx);
        let mut app = AppTask::new(base, ngap.state(), mr.state());

        assert!(!app.status.is_ngap_up);
        app.handle_status_update(GnbStatusUpdate::NgapIsUp(true));
        assert!(app.status.is_ngap_up);
    }

    #[tokio::test]
    async fn test_cli_server_binds() {
        let (base, _receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        let ngap = NgapTask::new(base.clone());
        let (_tx, uplink_rx) = mpsc::channel(4);
        let mr = MrTask::new(base.clone(), uplink_rx);
        let mut app = AppTask::new(base, ngap.state(), mr.state());

        let port = app.init_cli_server().await.unwrap();
        assert!(port > 0);
    }
}
