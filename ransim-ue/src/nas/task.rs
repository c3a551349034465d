//! NAS task implementation
//!
//! One task drives both NAS sub-machines: downlink NAS PDUs are decoded
//! and dispatched to MM or SM by protocol discriminator, RRC connection
//! events feed the CM register, and a periodic tick drives the NAS
//! timers. The context is shared behind a mutex so the CLI handler can
//! sample it under the pause protocol.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use ransim_common::OctetString;
use ransim_nas::{
    decode_nas_message, encode_nas_message, DeregistrationAcceptUeTerminated,
    DeregistrationRequestUeTerminated, NasMessage as NasPdu,
};

use crate::tasks::{NasMessage, RrcMessage, Task, TaskMessage, UeTaskBase};

use super::mm::{MmSubState, NasMm, RmState};
use super::sm::NasSm;

/// NAS timer tick cadence.
const TIMER_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// The NAS machines, shared for CLI sampling.
pub struct NasContext {
    /// Mobility management machine
    pub mm: NasMm,
    /// Session management machine
    pub sm: NasSm,
}

/// NAS task driving the MM and SM machines.
pub struct NasTask {
    task_base: UeTaskBase,
    context: Arc<Mutex<NasContext>>,
}

impl NasTask {
    /// Creates the NAS task.
    pub fn new(task_base: UeTaskBase) -> Self {
        let context = Arc::new(Mutex::new(NasContext {
            mm: NasMm::new(task_base.clone()),
            sm: NasSm::new(task_base.clone()),
        }));
        Self { task_base, context }
    }

    /// Shared context handle for CLI sampling.
    pub fn context(&self) -> Arc<Mutex<NasContext>> {
        Arc::clone(&self.context)
    }

    async fn handle_nas_delivery(&mut self, pdu: OctetString) {
        let decoded = match decode_nas_message(pdu.data()) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Failed to decode downlink NAS message: {}", e);
                return;
            }
        };

        let mut ctx = self.context.lock().await;
        match decoded {
            NasPdu::RegistrationAccept(accept) => {
                ctx.mm.receive_registration_accept(accept).await;
            }
            NasPdu::RegistrationReject(reject) => {
                ctx.mm.receive_registration_reject(reject).await;
            }
            NasPdu::DeregistrationAcceptUeOriginating(accept) => {
                ctx.mm.receive_deregistration_accept(accept).await;
                ctx.sm.local_release_all_sessions().await;
            }
            NasPdu::DeregistrationRequestUeTerminated(request) => {
                drop(ctx);
                self.handle_network_deregistration(request).await;
            }
            NasPdu::PduSessionEstablishmentAccept(accept) => {
                if let Err(e) = ctx.sm.receive_establishment_accept(accept).await {
                    warn!("Dropped PDU Session Establishment Accept: {}", e);
                }
            }
            NasPdu::PduSessionEstablishmentReject(reject) => {
                if let Err(e) = ctx.sm.receive_establishment_reject(reject).await {
                    warn!("Dropped PDU Session Establishment Reject: {}", e);
                }
            }
            other => warn!("Unhandled downlink NAS message: {:?}", other),
        }
    }

    /// Network-initiated de-registration: answer with an accept, release
    /// every session locally and fall back to DEREGISTERED.
    async fn handle_network_deregistration(&mut self, request: DeregistrationRequestUeTerminated) {
        info!(
            "Network-initiated de-registration received (cause: {:?})",
            request.mm_cause
        );

        let accept = encode_nas_message(&NasPdu::DeregistrationAcceptUeTerminated(
            DeregistrationAcceptUeTerminated,
        ));
        let _ = self
            .task_base
            .rrc_tx
            .send(RrcMessage::UplinkNasDelivery {
                pdu: OctetString::from_slice(&accept),
            })
            .await;

        let mut ctx = self.context.lock().await;
        ctx.sm.local_release_all_sessions().await;
        ctx.mm.switch_rm_state(RmState::Deregistered);
        ctx.mm.switch_mm_state(MmSubState::DeregisteredNa);
    }

    async fn handle_deregister(&mut self, is_switch_off: bool, due_to_disable_5g: bool) {
        let mut ctx = self.context.lock().await;
        let switched_off = ctx
            .mm
            .initiate_deregistration(is_switch_off, due_to_disable_5g)
            .await;
        if switched_off {
            ctx.sm.local_release_all_sessions().await;
        }
    }

    async fn establish_initial_sessions(&mut self) {
        let sessions = self.task_base.config.sessions.clone();
        let mut ctx = self.context.lock().await;
        for session in &sessions {
            if let Err(e) = ctx.sm.send_establishment_request(session).await {
                error!("Failed to initiate PDU session establishment: {}", e);
            }
        }
    }

    async fn dispatch(&mut self, msg: NasMessage) {
        match msg {
            NasMessage::NasDelivery { pdu } => self.handle_nas_delivery(pdu).await,
            NasMessage::RrcConnectionSetup => {
                self.context.lock().await.mm.handle_rrc_connection_setup();
            }
            NasMessage::RrcConnectionRelease => {
                self.context.lock().await.mm.handle_rrc_connection_release();
            }
            NasMessage::RadioLinkFailure => {
                self.context.lock().await.mm.handle_radio_link_failure();
            }
            NasMessage::Paging => {
                debug!("Paging indication received");
                self.context.lock().await.mm.trigger_mm_cycle();
            }
            NasMessage::PerformMmCycle => {
                self.context.lock().await.mm.perform_mm_cycle().await;
            }
            NasMessage::TimerTick => {
                self.context.lock().await.mm.handle_timer_tick().await;
            }
            NasMessage::DeRegister {
                is_switch_off,
                due_to_disable_5g,
            } => {
                self.handle_deregister(is_switch_off, due_to_disable_5g).await;
            }
            NasMessage::EstablishInitialSessions => self.establish_initial_sessions().await,
        }
    }
}

#[async_trait::async_trait]
impl Task for NasTask {
    type Message = NasMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("NAS task started");
        let pause = self.task_base.nas_tx.pause();

        // boot the state machine
        self.context.lock().await.mm.trigger_mm_cycle();

        let mut tick = tokio::time::interval(TIMER_TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            pause.pause_point().await;
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(msg)) => self.dispatch(msg).await,
                    Some(TaskMessage::Shutdown) | None => break,
                },
                _ = tick.tick() => {
                    let mut ctx = self.context.lock().await;
                    ctx.mm.handle_timer_tick().await;
                    // keep searching states alive between explicit triggers
                    if ctx.mm.registers().mm_sub_state().is_searching() {
                        ctx.mm.perform_mm_cycle().await;
                    }
                }
                _ = pause.wait_requested() => continue,
            }
        }

        info!("NAS task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{UeTaskReceivers, DEFAULT_CHANNEL_CAPACITY};
    use ransim_common::{Plmn, SessionConfig, UeConfig};
    use ransim_nas::{
        DeRegistrationAccessType, DeRegistrationType, ReRegistrationRequired, SwitchOff,
    };

    fn config() -> UeConfig {
        UeConfig {
            supi: Some("imsi-901700000000001".to_string()),
            imei: None,
            imeisv: None,
            plmn: Plmn::new(901, 70, false),
            nssais: vec![],
            configure_routing: false,
            auto_behaviour: true,
            sessions: vec![SessionConfig::default()],
            tun_name_prefix: "ransimtun".to_string(),
        }
    }

    fn setup() -> (NasTask, UeTaskReceivers) {
        let (base, receivers) = UeTaskBase::new(config(), None, DEFAULT_CHANNEL_CAPACITY);
        (NasTask::new(base), receivers)
    }

    #[tokio::test]
    async fn test_establish_initial_sessions_uses_configuration() {
        let (mut task, mut receivers) = setup();
        task.establish_initial_sessions().await;

        let ctx = task.context.lock().await;
        assert_eq!(ctx.sm.session_count(), 1);
        drop(ctx);

        match receivers.rrc_rx.recv().await {
            Some(TaskMessage::Message(RrcMessage::UplinkNasDelivery { pdu })) => {
                match decode_nas_message(pdu.data()).unwrap() {
                    NasPdu::PduSessionEstablishmentRequest(_) => {}
                    other => panic!("unexpected NAS message: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_deregistration_answers_with_accept() {
        let (mut task, mut receivers) = setup();

        let request = DeregistrationRequestUeTerminated::new(DeRegistrationType::new(
            DeRegistrationAccessType::ThreeGppAccess,
            ReRegistrationRequired::NotRequired,
            SwitchOff::NormalDeRegistration,
        ));
        let pdu = encode_nas_message(&NasPdu::DeregistrationRequestUeTerminated(request));
        task.handle_nas_delivery(OctetString::from_slice(&pdu)).await;

        match receivers.rrc_rx.recv().await {
            Some(TaskMessage::Message(RrcMessage::UplinkNasDelivery { pdu })) => {
                match decode_nas_message(pdu.data()).unwrap() {
                    NasPdu::DeregistrationAcceptUeTerminated(_) => {}
                    other => panic!("unexpected NAS message: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let ctx = task.context.lock().await;
        assert_eq!(ctx.mm.registers().rm_state(), RmState::Deregistered);
    }

    #[tokio::test]
    async fn test_malformed_nas_pdu_is_dropped() {
        let (mut task, mut receivers) = setup();
        task.handle_nas_delivery(OctetString::from_slice(&[0xff, 0xff])).await;
        assert!(receivers.rrc_rx.try_recv().is_err());
    }
}
