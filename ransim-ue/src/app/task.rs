//! UE application task
//!
//! Owns the per-session TUN task array (16 slots, slot 0 reserved),
//! routes user-plane data between MR and the TUN tasks, handles the
//! switch-off path and the CLI.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use ransim_common::cli_wire::CliServer;
use ransim_common::{OctetString, PduSessionType};

use crate::nas::NasContext;
use crate::tasks::{
    schedule_timer, AppMessage, MrMessage, PduSessionSummary, Task, TaskHandle, TaskMessage,
    TunMessage, UeStatusUpdate, UeTaskBase, DEFAULT_CHANNEL_CAPACITY,
};
use crate::tun::{is_root, TunInterface, TunTask};

use super::cli_server::{parse_ue_cli_command, ParseOutcome};
use super::cmd_handler::{CmdResponse, UeCmdHandler};

/// Timer id for the delayed switch-off.
const SWITCH_OFF_TIMER_ID: i32 = 1;

/// Delay before the switch-off is executed.
const SWITCH_OFF_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

/// Number of TUN slots (index 0 reserved).
const TUN_TASK_SLOTS: usize = 16;

/// External controller of the UE's lifecycle.
pub trait UeController: Send + Sync {
    /// Called when the UE completes its switch-off.
    fn perform_switch_off(&self);
}

/// UE application task.
pub struct AppTask {
    task_base: UeTaskBase,
    nas_context: Arc<Mutex<NasContext>>,
    controller: Option<Arc<dyn UeController>>,
    tun_tasks: [Option<TaskHandle<TunMessage>>; TUN_TASK_SLOTS],
    sessions: [Option<PduSessionSummary>; TUN_TASK_SLOTS],
    cli_server: Option<Arc<CliServer>>,
}

impl AppTask {
    /// Creates the App task.
    pub fn new(
        task_base: UeTaskBase,
        nas_context: Arc<Mutex<NasContext>>,
        controller: Option<Arc<dyn UeController>>,
    ) -> Self {
        Self {
            task_base,
            nas_context,
            controller,
            tun_tasks: std::array::from_fn(|_| None),
            sessions: std::array::from_fn(|_| None),
            cli_server: None,
        }
    }

    /// Starts the CLI server and its receive loop. Returns the bound
    /// port. A failure disables the CLI but the node keeps running.
    pub async fn init_cli_server(&mut self) -> std::io::Result<u16> {
        let mut server = CliServer::new().await?;
        server.register_nodes(vec![self.task_base.config.node_name()])?;
        let port = server.port();

        let server = Arc::new(server);
        self.cli_server = Some(Arc::clone(&server));

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
                match parse_ue_cli_command(&tokens) {
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

    async fn handle_mr_data(&mut self, psi: i32, data: OctetString) {
        let slot = usize::try_from(psi).ok().filter(|&p| p < TUN_TASK_SLOTS);
        match slot.and_then(|p| self.tun_tasks[p].as_ref()) {
            Some(tun) => {
                let _ = tun.send(TunMessage::DownlinkData { data }).await;
            }
            None => warn!("Downlink data for PDU session[{}] without TUN task", psi),
        }
    }

    async fn handle_tun_data(&mut self, psi: i32, data: OctetString) {
        let msg = MrMessage::UplinkData { psi, data };
        if let Err(e) = self.task_base.mr_tx.send(msg).await {
            error!("Failed to forward uplink data to MR: {}", e);
        }
    }

    fn handle_perform_switch_off(&mut self) {
        schedule_timer(
            self.task_base.app_tx.clone(),
            SWITCH_OFF_TIMER_ID,
            SWITCH_OFF_DELAY,
            |timer_id| AppMessage::TimerExpired { timer_id },
        );
    }

    fn handle_timer_expired(&mut self, timer_id: i32) {
        if timer_id == SWITCH_OFF_TIMER_ID {
            info!("UE device is switching off");
            if let Some(ref controller) = self.controller {
                controller.perform_switch_off();
            }
        }
    }

    async fn handle_status_update(&mut self, update: UeStatusUpdate) {
        match update {
            UeStatusUpdate::SessionEstablishment { session } => {
                let psi = session.psi;
                self.sessions[psi as usize] = Some(session.clone());
                self.setup_tun_interface(&session).await;
            }
            UeStatusUpdate::SessionRelease { psi } => {
                let slot = psi as usize;
                if let Some(tun) = self.tun_tasks[slot].take() {
                    let _ = tun.shutdown().await;
                }
                if self.sessions[slot].take().is_some() {
                    info!("PDU session[{}] released", psi);
                }
            }
        }
    }

    /// Materializes the tun interface for an established session. Any
    /// precondition failure logs an error and aborts the setup; the rest
    /// of the node keeps running.
    async fn setup_tun_interface(&mut self, session: &PduSessionSummary) {
        if !is_root() {
            error!("TUN interface could not be setup. Permission denied. Please run the UE with 'sudo'");
            return;
        }

        if session.session_type != PduSessionType::Ipv4 {
            error!("Connection could not setup. PDU session type is not supported.");
            return;
        }

        let psi = session.psi;
        if psi == 0 || psi > 15 {
            error!("Connection could not setup. Invalid PSI.");
            return;
        }

        if self.tun_tasks[psi as usize].is_some() {
            error!("Connection could not setup. TUN task for specified PSI is non-null.");
            return;
        }

        let interface = match TunInterface::create(
            &self.task_base.config.tun_name_prefix,
            psi,
            session.address,
            self.task_base.config.configure_routing,
        )
        .await
        {
            Ok(interface) => interface,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };

        info!(
            "Connection setup for PDU session[{}] is successful, TUN interface[{}, {}] is up",
            psi,
            interface.name(),
            session.address
        );

        let (tun_tx, tun_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let handle = TaskHandle::new(tun_tx);
        let mut task = TunTask::new(psi, interface, self.task_base.app_tx.clone());
        tokio::spawn(async move { task.run(tun_rx).await });
        self.tun_tasks[psi as usize] = Some(handle);
    }

    async fn handle_cli_command(
        &mut self,
        command: crate::tasks::UeCliCommand,
        client_addr: std::net::SocketAddr,
    ) {
        let handler = UeCmdHandler::new(self.task_base.clone(), Arc::clone(&self.nas_context));
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

    async fn dispatch(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::MrDataDelivery { psi, data } => self.handle_mr_data(psi, data).await,
            AppMessage::TunDataDelivery { psi, data } => self.handle_tun_data(psi, data).await,
            AppMessage::TunError { psi, error } => {
                error!("TUN failure on PDU session[{}]: {}", psi, error);
            }
            AppMessage::PerformSwitchOff => self.handle_perform_switch_off(),
            AppMessage::StatusUpdate(update) => self.handle_status_update(update).await,
            AppMessage::CliCommand { command, client_addr } => {
                self.handle_cli_command(command, client_addr).await;
            }
            AppMessage::TimerExpired { timer_id } => self.handle_timer_expired(timer_id),
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
                Some(TaskMessage::Message(msg)) => self.dispatch(msg).await,
                Some(TaskMessage::Shutdown) | None => break,
            }
        }

        // reclaim all TUN tasks on the way out
        for tun in self.tun_tasks.iter_mut().filter_map(Option::take) {
            let _ = tun.shutdown().await;
        }

        info!("App task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nas::NasTask;
    use crate::tasks::UeTaskReceivers;
    use ransim_common::{Plmn, UeConfig};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};

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

    fn setup(controller: Option<Arc<dyn UeController>>) -> (AppTask, UeTaskReceivers) {
        let (base, receivers) = UeTaskBase::new(config(), None, DEFAULT_CHANNEL_CAPACITY);
        let nas = NasTask::new(base.clone());
        (AppTask::new(base, nas.context(), controller), receivers)
    }

    struct FlagController(AtomicBool);

    impl UeController for FlagController {
        fn perform_switch_off(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_tun_data_forwarded_to_mr() {
        let (mut app, mut receivers) = setup(None);
        app.handle_tun_data(1, OctetString::from_slice(&[0x45])).await;

        match receivers.mr_rx.recv().await {
            Some(TaskMessage::Message(MrMessage::UplinkData { psi, .. })) => {
                assert_eq!(psi, 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mr_data_without_tun_task_dropped() {
        let (mut app, _receivers) = setup(None);
        // no TUN task in slot 1: the packet is logged and dropped
        app.handle_mr_data(1, OctetString::from_slice(&[0x45])).await;
        app.handle_mr_data(99, OctetString::from_slice(&[0x45])).await;
    }

    #[tokio::test]
    async fn test_switch_off_timer_invokes_controller() {
        let controller = Arc::new(FlagController(AtomicBool::new(false)));
        let (mut app, mut receivers) = setup(Some(controller.clone() as Arc<dyn UeController>));

        app.handle_perform_switch_off();

        // the 500 ms one-shot lands in the App mailbox
        match receivers.app_rx.recv().await {
            Some(TaskMessage::Message(AppMessage::TimerExpired { timer_id })) => {
                assert_eq!(timer_id, SWITCH_OFF_TIMER_ID);
                app.handle_timer_expired(timer_id);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        assert!(controller.0.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_session_establishment_without_root_aborts_setup() {
        if is_root() {
            return;
        }
        let (mut app, _receivers) = setup(None);
        app.handle_status_update(UeStatusUpdate::SessionEstablishment {
            session: PduSessionSummary {
                psi: 1,
                session_type: PduSessionType::Ipv4,
                address: Ipv4Addr::new(10, 45, 0, 2),
            },
        })
        .await;

        // setup aborted: the summary is recorded, no TUN task exists
        assert!(app.sessions[1].is_some());
        assert!(app.tun_tasks[1].is_none());
    }

    #[tokio::test]
    async fn test_session_establishment_rejects_non_ipv4() {
        let (mut app, _receivers) = setup(None);
        app.setup_tun_interface(&PduSessionSummary {
            psi: 1,
            session_type: PduSessionType::Ipv6,
            address: Ipv4Addr::new(10, 45, 0, 2),
        })
        .await;
        assert!(app.tun_tasks[1].is_none());
    }

    #[tokio::test]
    async fn test_session_release_clears_summary() {
        let (mut app, _receivers) = setup(None);
        app.sessions[2] = Some(PduSessionSummary {
            psi: 2,
            session_type: PduSessionType::Ipv4,
            address: Ipv4Addr::new(10, 45, 0, 3),
        });

        app.handle_status_update(UeStatusUpdate::SessionRelease { psi: 2 }).await;

        assert!(app.sessions[2].is_none());
        assert!(app.tun_tasks[2].is_none());
    }

    #[tokio::test]
    async fn test_cli_server_binds() {
        let (mut app, _receivers) = setup(None);
        let port = app.init_cli_server().await.unwrap();
        assert!(port > 0);
    }
}
