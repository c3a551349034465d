//! gNB CLI command handler
//!
//! Every command first quiesces the five worker tasks (SCTP, GTP, MR,
//! NGAP, RRC) through the pause protocol, samples their state, then
//! unpauses on all exits. No sample reads state from a task that has
//! not confirmed its pause.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::mr::MrState;
use crate::ngap::NgapState;
use crate::tasks::{await_pause_confirmations, GnbCliCommand, GnbTaskBase, NgapMessage};

use super::status::GnbStatusInfo;

/// Response to a CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdResponse {
    /// Successful output (YAML or plain text)
    Result(String),
    /// Operator-visible error
    Error(String),
}

#[derive(Serialize)]
struct AmfListEntry {
    id: i32,
}

#[derive(Serialize)]
struct UeListEntry {
    #[serde(rename = "ue-name")]
    ue_name: String,
    #[serde(rename = "ran-ngap-id")]
    ran_ngap_id: i64,
    #[serde(rename = "amf-ngap-id")]
    amf_ngap_id: i64,
}

/// Command handler operating on sampled worker state.
pub struct GnbCmdHandler {
    task_base: GnbTaskBase,
    ngap_state: Arc<Mutex<NgapState>>,
    mr_state: Arc<Mutex<MrState>>,
    status: GnbStatusInfo,
}

impl GnbCmdHandler {
    /// Creates a handler bound to the worker state it samples.
    pub fn new(
        task_base: GnbTaskBase,
        ngap_state: Arc<Mutex<NgapState>>,
        mr_state: Arc<Mutex<MrState>>,
        status: GnbStatusInfo,
    ) -> Self {
        Self {
            task_base,
            ngap_state,
            mr_state,
            status,
        }
    }

    /// Handles one command under the pause protocol.
    pub async fn handle(&self, command: GnbCliCommand) -> CmdResponse {
        let controls = self.task_base.worker_pause_controls();
        for control in &controls {
            control.request_pause();
        }

        let response = if await_pause_confirmations(&controls).await {
            self.handle_impl(command).await
        } else {
            CmdResponse::Error(
                "gNB is unable to process command due to pausing timeout".to_string(),
            )
        };

        for control in &controls {
            control.request_unpause();
        }

        response
    }

    async fn handle_impl(&self, command: GnbCliCommand) -> CmdResponse {
        match command {
            GnbCliCommand::Status => match serde_yaml::to_string(&self.status) {
                Ok(yaml) => CmdResponse::Result(yaml),
                Err(e) => CmdResponse::Error(format!("Failed to serialize status: {e}")),
            },
            GnbCliCommand::Info => match serde_yaml::to_string(self.task_base.config.as_ref()) {
                Ok(yaml) => CmdResponse::Result(yaml),
                Err(e) => CmdResponse::Error(format!("Failed to serialize config: {e}")),
            },
            GnbCliCommand::AmfList => {
                let state = self.ngap_state.lock().await;
                let mut entries: Vec<AmfListEntry> = state
                    .amf_contexts
                    .keys()
                    .map(|&id| AmfListEntry { id })
                    .collect();
                entries.sort_by_key(|e| e.id);
                match serde_yaml::to_string(&entries) {
                    Ok(yaml) => CmdResponse::Result(yaml),
                    Err(e) => CmdResponse::Error(format!("Failed to serialize AMF list: {e}")),
                }
            }
            GnbCliCommand::AmfInfo { amf_id } => {
                let state = self.ngap_state.lock().await;
                match state.amf_contexts.get(&amf_id) {
                    Some(ctx) => match serde_yaml::to_string(&ctx.snapshot()) {
                        Ok(yaml) => CmdResponse::Result(yaml),
                        Err(e) => CmdResponse::Error(format!("Failed to serialize AMF: {e}")),
                    },
                    None => CmdResponse::Error("AMF not found with given ID".to_string()),
                }
            }
            GnbCliCommand::UeList => {
                let ngap = self.ngap_state.lock().await;
                let mr = self.mr_state.lock().await;
                let mut entries: Vec<UeListEntry> = ngap
                    .ue_contexts
                    .values()
                    .map(|ctx| UeListEntry {
                        ue_name: mr
                            .ue_names
                            .get(&ctx.ue_id)
                            .cloned()
                            .unwrap_or_default(),
                        ran_ngap_id: ctx.ran_ue_ngap_id,
                        amf_ngap_id: ctx.amf_ue_ngap_id.unwrap_or(0),
                    })
                    .collect();
                entries.sort_by_key(|e| e.ran_ngap_id);
                match serde_yaml::to_string(&entries) {
                    Ok(yaml) => CmdResponse::Result(yaml),
                    Err(e) => CmdResponse::Error(format!("Failed to serialize UE list: {e}")),
                }
            }
            GnbCliCommand::UeCount => {
                let state = self.ngap_state.lock().await;
                CmdResponse::Result(state.ue_contexts.len().to_string())
            }
            GnbCliCommand::HandoverPrepare { ue_id } => {
                info!("CLI handover preparation for UE[{}]", ue_id);
                match self
                    .task_base
                    .ngap_tx
                    .try_send(NgapMessage::HandoverPreparation { ue_id })
                {
                    Ok(()) => CmdResponse::Result(format!(
                        "Handover preparation triggered for UE[{ue_id}]"
                    )),
                    Err(e) => CmdResponse::Error(format!("Failed to reach NGAP task: {e}")),
                }
            }
            GnbCliCommand::Handover {
                as_amf_id,
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                ctxt_id,
                uplink_stream,
                amf_name,
            } => {
                info!("CLI Xn handover toward AMF[{}] ({})", as_amf_id, amf_name);
                match self.task_base.ngap_tx.try_send(NgapMessage::XnHandover {
                    as_amf_id,
                    amf_ue_ngap_id,
                    ran_ue_ngap_id,
                    ctxt_id,
                    uplink_stream,
                    amf_name,
                }) {
                    Ok(()) => CmdResponse::Result("Path switch requested".to_string()),
                    Err(e) => CmdResponse::Error(format!("Failed to reach NGAP task: {e}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mr::MrTask;
    use crate::ngap::NgapTask;
    use crate::tasks::{GnbTaskBase, TaskMessage, DEFAULT_CHANNEL_CAPACITY};
    use ransim_common::{AmfConfig, GnbConfig, PagingDrx, Plmn};
    use tokio::sync::mpsc;

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

    /// Spawns lightweight pause-confirming loops so the pause protocol
    /// completes without the full task set.
    fn spawn_pause_confirmers(base: &GnbTaskBase) {
        for control in base.worker_pause_controls() {
            tokio::spawn(async move {
                loop {
                    control.pause_point().await;
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            });
        }
    }

    fn build_handler(base: &GnbTaskBase) -> GnbCmdHandler {
        let ngap = NgapTask::new(base.clone());
        let (_uplink_tx, uplink_rx) = mpsc::channel(4);
        let mr = MrTask::new(base.clone(), uplink_rx);
        GnbCmdHandler::new(
            base.clone(),
            ngap.state(),
            mr.state(),
            GnbStatusInfo { is_ngap_up: false },
        )
    }

    #[tokio::test]
    async fn test_pausing_timeout_yields_operator_error() {
        let (base, _receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        // no tasks running: nothing ever confirms
        let handler = build_handler(&base);

        tokio::time::pause();
        let response = handler.handle(GnbCliCommand::UeCount).await;
        assert_eq!(
            response,
            CmdResponse::Error("gNB is unable to process command due to pausing timeout".to_string())
        );
        // unpause was issued on exit
        for control in base.worker_pause_controls() {
            assert!(!control.is_pause_requested());
        }
    }

    #[tokio::test]
    async fn test_ue_count_on_empty_tables() {
        let (base, _receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let handler = build_handler(&base);

        let response = handler.handle(GnbCliCommand::UeCount).await;
        assert_eq!(response, CmdResponse::Result("0".to_string()));
    }

    #[tokio::test]
    async fn test_amf_info_unknown_id() {
        let (base, _receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let handler = build_handler(&base);

        let response = handler.handle(GnbCliCommand::AmfInfo { amf_id: 99 }).await;
        assert_eq!(
            response,
            CmdResponse::Error("AMF not found with given ID".to_string())
        );
    }

    #[tokio::test]
    async fn test_handover_forwarded_to_ngap() {
        let (base, mut receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let handler = build_handler(&base);

        let response = handler
            .handle(GnbCliCommand::Handover {
                as_amf_id: 1,
                amf_ue_ngap_id: 77,
                ran_ue_ngap_id: 3,
                ctxt_id: 5,
                uplink_stream: 1,
                amf_name: "AMF1".to_string(),
            })
            .await;
        assert_eq!(response, CmdResponse::Result("Path switch requested".to_string()));

        match receivers.ngap_rx.recv().await {
            Some(TaskMessage::Message(NgapMessage::XnHandover { as_amf_id, .. })) => {
                assert_eq!(as_amf_id, 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_and_info_serialize_to_yaml() {
        let (base, _receivers) = GnbTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        spawn_pause_confirmers(&base);
        let handler = build_handler(&base);

        match handler.handle(GnbCliCommand::Status).await {
            CmdResponse::Result(yaml) => assert!(yaml.contains("is-ngap-up: false")),
            other => panic!("unexpected response: {other:?}"),
        }
        match handler.handle(GnbCliCommand::Info).await {
            CmdResponse::Result(yaml) => assert!(yaml.contains("name: test-gnb")),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
