//! UE CLI command handler
//!
//! Commands quiesce the NAS, RRC and MR tasks through the pause protocol
//! before sampling, and unpause on all exits.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::nas::NasContext;
use crate::tasks::{await_pause_confirmations, NasMessage, UeCliCommand, UeTaskBase};

/// Response to a CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdResponse {
    /// Successful output (YAML or plain text)
    Result(String),
    /// Operator-visible error
    Error(String),
}

#[derive(Serialize)]
struct UeStatusEntry {
    #[serde(rename = "mm-state")]
    mm_state: String,
    #[serde(rename = "rm-state")]
    rm_state: String,
    #[serde(rename = "cm-state")]
    cm_state: String,
    #[serde(rename = "5u-state")]
    u_state: String,
    #[serde(rename = "pdu-sessions")]
    pdu_sessions: Vec<UeSessionEntry>,
}

#[derive(Serialize)]
struct UeSessionEntry {
    psi: u8,
    #[serde(rename = "type")]
    session_type: String,
    address: String,
}

/// Command handler operating on the sampled NAS context.
pub struct UeCmdHandler {
    task_base: UeTaskBase,
    nas_context: Arc<Mutex<NasContext>>,
}

impl UeCmdHandler {
    /// Creates a handler bound to the NAS context it samples.
    pub fn new(task_base: UeTaskBase, nas_context: Arc<Mutex<NasContext>>) -> Self {
        Self {
            task_base,
            nas_context,
        }
    }

    /// Handles one command under the pause protocol.
    pub async fn handle(&self, command: UeCliCommand) -> CmdResponse {
        let controls = self.task_base.worker_pause_controls();
        for control in &controls {
            control.request_pause();
        }

        let response = if await_pause_confirmations(&controls).await {
            self.handle_impl(command).await
        } else {
            CmdResponse::Error("UE is unable to process command due to pausing timeout".to_string())
        };

        for control in &controls {
            control.request_unpause();
        }

        response
    }

    async fn handle_impl(&self, command: UeCliCommand) -> CmdResponse {
        match command {
            UeCliCommand::Info => match serde_yaml::to_string(self.task_base.config.as_ref()) {
                Ok(yaml) => CmdResponse::Result(yaml),
                Err(e) => CmdResponse::Error(format!("Failed to serialize config: {e}")),
            },
            UeCliCommand::Status => {
                let ctx = self.nas_context.lock().await;
                let regs = ctx.mm.registers();
                let entry = UeStatusEntry {
                    mm_state: regs.mm_sub_state().to_string(),
                    rm_state: regs.rm_state().to_string(),
                    cm_state: regs.cm_state().to_string(),
                    u_state: regs.u_state().to_string(),
                    pdu_sessions: ctx
                        .sm
                        .established_sessions()
                        .iter()
                        .map(|s| UeSessionEntry {
                            psi: s.id,
                            session_type: s.session_type.to_string(),
                            address: s
                                .pdu_address
                                .map(|a| a.to_string())
                                .unwrap_or_default(),
                        })
                        .collect(),
                };
                match serde_yaml::to_string(&entry) {
                    Ok(yaml) => CmdResponse::Result(yaml),
                    Err(e) => CmdResponse::Error(format!("Failed to serialize status: {e}")),
                }
            }
            UeCliCommand::Timers => {
                let ctx = self.nas_context.lock().await;
                let timers = ctx.mm.timers();
                CmdResponse::Result(format!(
                    "{}\n{}\n{}",
                    timers.t3346, timers.t3512, timers.t3521
                ))
            }
            UeCliCommand::DeRegister {
                is_switch_off,
                due_to_disable_5g,
            } => match self.task_base.nas_tx.try_send(NasMessage::DeRegister {
                is_switch_off,
                due_to_disable_5g,
            }) {
                Ok(()) => CmdResponse::Result("De-registration procedure triggered".to_string()),
                Err(e) => CmdResponse::Error(format!("Failed to reach NAS task: {e}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nas::NasTask;
    use crate::tasks::{TaskMessage, UeTaskBase, DEFAULT_CHANNEL_CAPACITY};
    use ransim_common::{Plmn, UeConfig};

    fn config() -> UeConfig {
        UeConfig {
            supi: Some("imsi-901700000000001".to_string()),
            imei: None,
            imeisv: None,
            plmn: Plmn::new(901, 70, false),
            nssais: vec![],
            configure_routing: false,
            auto_behaviour: true,
            sessions: vec![],
            tun_name_prefix: "ransimtun".to_string(),
        }
    }

    fn spawn_pause_confirmers(base: &UeTaskBase) {
        for control in base.worker_pause_controls() {
            tokio::spawn(async move {
                loop {
                    control.pause_point().await;
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            });
        }
    }

    #[tokio::test]
    async fn test_status_reports_registers() {
        let (base, _receivers) = UeTaskBase::new(config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let nas = NasTask::new(base.clone());
        let handler = UeCmdHandler::new(base, nas.context());

        match handler.handle(UeCliCommand::Status).await {
            CmdResponse::Result(yaml) => {
                assert!(yaml.contains("mm-state: 5GMM-DEREGISTERED"));
                assert!(yaml.contains("cm-state: CM-IDLE"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timers_dump() {
        let (base, _receivers) = UeTaskBase::new(config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let nas = NasTask::new(base.clone());
        let handler = UeCmdHandler::new(base, nas.context());

        match handler.handle(UeCliCommand::Timers).await {
            CmdResponse::Result(text) => {
                assert!(text.contains("T3346"));
                assert!(text.contains("T3512"));
                assert!(text.contains("T3521"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deregister_forwarded_to_nas() {
        let (base, mut receivers) = UeTaskBase::new(config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let nas = NasTask::new(base.clone());
        let handler = UeCmdHandler::new(base, nas.context());

        let response = handler
            .handle(UeCliCommand::DeRegister {
                is_switch_off: true,
                due_to_disable_5g: true,
            })
            .await;
        assert!(matches!(response, CmdResponse::Result(_)));

        match receivers.nas_rx.recv().await {
            Some(TaskMessage::Message(NasMessage::DeRegister {
                is_switch_off,
                due_to_disable_5g,
            })) => {
                assert!(is_switch_off);
                assert!(due_to_disable_5g);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pausing_timeout_error() {
        let (base, _receivers) = UeTaskBase::new(config(), None, DEFAULT_CHANNEL_CAPACITY);
        let nas = NasTask::new(base.clone());
        let handler = UeCmdHandler::new(base, nas.context());

        tokio::time::pause();
        let response = handler.handle(UeCliCommand::Timers).await;
        assert_eq!(
            response,
            CmdResponse::Error("UE is unable to process command due to pausing timeout".to_string())
        );
    }
}
