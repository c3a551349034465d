//! 5GMM state machine
//!
//! Registration cycle, de-registration procedure and the register switch
//! machinery per 3GPP TS 24.501 Section 5. Every register switch runs
//! its hook, emits the listener event, logs on change and schedules a
//! fresh MM cycle, in that order.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use ransim_common::{Guti, NodeType, StateType, Tai};
use ransim_nas::{
    encode_nas_message, DeRegistrationAccessType, DeRegistrationType,
    DeregistrationAcceptUeOriginating, DeregistrationRequestUeOriginating, FollowOnRequest,
    MobileIdentity, NasKeySetIdentifier, NasMessage as NasPdu, NasSecurityContext,
    ReRegistrationRequired, RegistrationAccept, RegistrationReject, RegistrationRequest,
    RegistrationType, SwitchOff,
};

use crate::tasks::{AppMessage, NasMessage, RrcMessage, UeTaskBase};
use crate::timer::{UeTimers, MAX_T3521_RETRANSMISSION, TIMER_T3346, TIMER_T3512, TIMER_T3521};

use super::registers::{CmState, MmRegisters, MmState, MmSubState, RmState, UState};

/// Minimum spacing between PLMN search requests toward RRC.
const PLMN_SEARCH_THROTTLE_MS: u128 = 50;

/// The UE-side 5GMM state machine.
pub struct NasMm {
    base: UeTaskBase,
    /// The packaged state registers
    pub(crate) regs: MmRegisters,
    /// NAS timer set
    pub(crate) timers: UeTimers,
    valid_sim: bool,
    auto_behaviour: bool,
    pub(crate) stored_guti: Option<Guti>,
    pub(crate) last_visited_tai: Option<Tai>,
    pub(crate) tai_list: Vec<Tai>,
    pub(crate) current_ns_ctx: Option<NasSecurityContext>,
    pub(crate) non_current_ns_ctx: Option<NasSecurityContext>,
    pub(crate) last_dereg_request: Option<DeregistrationRequestUeOriginating>,
    pub(crate) last_dereg_due_to_disable_5g: bool,
    last_plmn_search_trigger: Option<Instant>,
}

impl NasMm {
    /// Creates the MM machine from the node configuration.
    pub fn new(base: UeTaskBase) -> Self {
        let valid_sim = base.config.supi.is_some();
        let auto_behaviour = base.config.auto_behaviour;
        Self {
            base,
            regs: MmRegisters::default(),
            timers: UeTimers::new(),
            valid_sim,
            auto_behaviour,
            stored_guti: None,
            last_visited_tai: None,
            tai_list: Vec::new(),
            current_ns_ctx: None,
            non_current_ns_ctx: None,
            last_dereg_request: None,
            last_dereg_due_to_disable_5g: false,
            last_plmn_search_trigger: None,
        }
    }

    /// Read access to the registers.
    pub fn registers(&self) -> &MmRegisters {
        &self.regs
    }

    /// Read access to the timers.
    pub fn timers(&self) -> &UeTimers {
        &self.timers
    }

    /// True while the SIM is valid.
    pub fn has_valid_sim(&self) -> bool {
        self.valid_sim
    }

    /// True while a de-registration request is outstanding.
    pub fn deregistration_in_flight(&self) -> bool {
        self.last_dereg_request.is_some()
    }

    // ========================================================================
    // MM cycle
    // ========================================================================

    /// Enqueues a `PerformMmCycle` message. Called from every state
    /// switch so the machine re-evaluates after each transition.
    pub fn trigger_mm_cycle(&self) {
        let _ = self.base.nas_tx.try_send(NasMessage::PerformMmCycle);
    }

    /// Runs one MM cycle.
    pub async fn perform_mm_cycle(&mut self) {
        if self.regs.mm_state == MmState::Null {
            return;
        }

        if self.regs.mm_sub_state == MmSubState::DeregisteredNa {
            if self.valid_sim {
                if self.regs.cm_state == CmState::Idle {
                    self.switch_mm_state(MmSubState::DeregisteredPlmnSearch);
                } else {
                    self.switch_mm_state(MmSubState::DeregisteredNormalService);
                }
            } else {
                self.switch_mm_state(MmSubState::DeregisteredNoSupi);
            }
        }

        if self.regs.mm_sub_state.is_searching() {
            let elapsed = self
                .last_plmn_search_trigger
                .map(|t| t.elapsed().as_millis())
                .unwrap_or(u128::MAX);
            if elapsed > PLMN_SEARCH_THROTTLE_MS {
                let _ = self.base.rrc_tx.send(RrcMessage::PlmnSearchRequest).await;
                self.last_plmn_search_trigger = Some(Instant::now());
            }
            return;
        }

        if self.regs.mm_sub_state == MmSubState::DeregisteredNormalService {
            if self.auto_behaviour && !self.timers.t3346.is_running() {
                self.send_registration(
                    RegistrationType::InitialRegistration,
                    FollowOnRequest::ForPending,
                )
                .await;
            }
            return;
        }

        if self.regs.mm_state == MmState::RegisteredInitiated {
            return;
        }
        if self.regs.mm_sub_state == MmSubState::RegisteredNormalService {
            return;
        }
        if self.regs.mm_state == MmState::DeregisteredInitiated {
            return;
        }
        if self.regs.mm_sub_state == MmSubState::DeregisteredNoSupi {
            return;
        }

        if self.auto_behaviour {
            error!("unhandled UE MM state: {}", self.regs);
        }
    }

    // ========================================================================
    // State switches
    // ========================================================================

    /// Switches the MM state pair. The main state is derived from the
    /// sub-state, so the pair can never disagree.
    pub fn switch_mm_state(&mut self, sub_state: MmSubState) {
        let old_state = self.regs.mm_state;
        let old_sub_state = self.regs.mm_sub_state;
        let new_state = sub_state.main_state();

        self.regs.mm_state = new_state;
        self.regs.mm_sub_state = sub_state;

        self.on_switch_mm_state(old_state, new_state);

        if let Some(ref listener) = self.base.listener {
            let name = self.base.config.node_name();
            listener.on_switch(
                NodeType::Ue,
                &name,
                StateType::Mm,
                &old_state.to_string(),
                &new_state.to_string(),
            );
            listener.on_switch(
                NodeType::Ue,
                &name,
                StateType::MmSub,
                &old_sub_state.to_string(),
                &sub_state.to_string(),
            );
        }

        if old_state != new_state || old_sub_state != sub_state {
            info!("UE switches to state: {}", sub_state);
        }

        self.trigger_mm_cycle();
    }

    /// Switches the RM register.
    pub fn switch_rm_state(&mut self, state: RmState) {
        let old_state = self.regs.rm_state;
        self.regs.rm_state = state;

        if let Some(ref listener) = self.base.listener {
            listener.on_switch(
                NodeType::Ue,
                &self.base.config.node_name(),
                StateType::Rm,
                &old_state.to_string(),
                &state.to_string(),
            );
        }

        self.trigger_mm_cycle();
    }

    /// Switches the CM register.
    pub fn switch_cm_state(&mut self, state: CmState) {
        let old_state = self.regs.cm_state;
        self.regs.cm_state = state;

        self.on_switch_cm_state(old_state, state);

        if let Some(ref listener) = self.base.listener {
            listener.on_switch(
                NodeType::Ue,
                &self.base.config.node_name(),
                StateType::Cm,
                &old_state.to_string(),
                &state.to_string(),
            );
        }

        if old_state != state {
            info!("UE switches to state: {}", state);
        }

        self.trigger_mm_cycle();
    }

    /// Switches the 5GS update status register.
    pub fn switch_u_state(&mut self, state: UState) {
        let old_state = self.regs.u_state;
        self.regs.u_state = state;

        if let Some(ref listener) = self.base.listener {
            listener.on_switch(
                NodeType::Ue,
                &self.base.config.node_name(),
                StateType::U5,
                &old_state.to_string(),
                &state.to_string(),
            );
        }

        if old_state != state {
            info!("UE switches to state: {}", state);
        }

        self.trigger_mm_cycle();
    }

    /// The NAS security context is marked invalid when the UE leaves
    /// 5GMM-DEREGISTERED for any state other than 5GMM-NULL
    /// (TS 24.501 Section 4.4.2).
    fn on_switch_mm_state(&mut self, old_state: MmState, new_state: MmState) {
        if old_state == MmState::Deregistered
            && new_state != MmState::Deregistered
            && new_state != MmState::Null
        {
            if self.current_ns_ctx.is_some() || self.non_current_ns_ctx.is_some() {
                debug!("Deleting NAS security context");
                self.current_ns_ctx = None;
                self.non_current_ns_ctx = None;
            }
        }
    }

    /// Abnormal case 5.5.2.2.6: losing the NAS signalling connection
    /// while a de-registration is in flight aborts the procedure.
    fn on_switch_cm_state(&mut self, old_state: CmState, new_state: CmState) {
        if old_state == CmState::Connected && new_state == CmState::Idle {
            if self.regs.mm_state == MmState::DeregisteredInitiated {
                if self.last_dereg_due_to_disable_5g {
                    self.switch_mm_state(MmSubState::NullNa);
                } else if let Some(ref request) = self.last_dereg_request {
                    if request.deregistration_type.switch_off == SwitchOff::NormalDeRegistration {
                        self.switch_mm_state(MmSubState::DeregisteredNa);
                    }
                }

                self.last_dereg_request = None;
                self.last_dereg_due_to_disable_5g = false;
            }
        }
    }

    // ========================================================================
    // Connection events from RRC
    // ========================================================================

    /// RRC found a cell and established the connection.
    pub fn handle_rrc_connection_setup(&mut self) {
        self.switch_cm_state(CmState::Connected);
        if self.regs.mm_sub_state.is_searching() {
            self.switch_mm_state(MmSubState::DeregisteredNormalService);
        }
    }

    /// RRC connection released by the network or locally.
    pub fn handle_rrc_connection_release(&mut self) {
        self.switch_cm_state(CmState::Idle);
    }

    /// The radio link failed.
    pub fn handle_radio_link_failure(&mut self) {
        self.switch_cm_state(CmState::Idle);
        if self.regs.mm_state == MmState::Registered {
            self.switch_mm_state(MmSubState::RegisteredNoCellAvailable);
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Sends a Registration Request of the given type.
    pub async fn send_registration(
        &mut self,
        registration_type: RegistrationType,
        follow_on_request: FollowOnRequest,
    ) {
        debug!("Sending registration request: {}", registration_type);

        let request = RegistrationRequest {
            registration_type,
            follow_on_request,
            ng_ksi: self
                .current_ns_ctx
                .as_ref()
                .map(|ctx| ctx.ng_ksi)
                .unwrap_or_else(NasKeySetIdentifier::no_key),
            mobile_identity: self.mobile_identity(),
        };

        if registration_type == RegistrationType::InitialRegistration {
            self.switch_mm_state(MmSubState::RegisteredInitiatedNa);
        }

        self.send_nas_message(NasPdu::RegistrationRequest(request)).await;
    }

    /// Registration Accept: binds the assigned GUTI and TAI list, arms
    /// T3512 and lands in REGISTERED.NORMAL-SERVICE.
    pub async fn receive_registration_accept(&mut self, accept: RegistrationAccept) {
        if self.regs.mm_state != MmState::RegisteredInitiated {
            warn!("Registration Accept in unexpected state: {}", self.regs.mm_state);
            return;
        }

        info!("Registration is successful");

        if let Some(guti) = accept.guti {
            self.stored_guti = Some(guti);
        }
        if !accept.tai_list.is_empty() {
            self.tai_list = accept.tai_list.clone();
            self.last_visited_tai = accept.tai_list.first().copied();
        }
        if let Some(secs) = accept.t3512_secs {
            self.timers.t3512.start_with_interval(secs, true);
        }

        self.switch_rm_state(RmState::Registered);
        self.switch_u_state(UState::U1Updated);
        self.switch_mm_state(MmSubState::RegisteredNormalService);

        let _ = self.base.nas_tx.try_send(NasMessage::EstablishInitialSessions);
    }

    /// Registration Reject: surface the cause and fall back to the
    /// DEREGISTERED placeholder sub-state.
    pub async fn receive_registration_reject(&mut self, reject: RegistrationReject) {
        error!("Registration rejected: {:?}", reject.mm_cause);
        self.switch_rm_state(RmState::Deregistered);
        self.switch_mm_state(MmSubState::DeregisteredNa);
    }

    // ========================================================================
    // De-registration
    // ========================================================================

    /// Initiates a UE-originating de-registration.
    ///
    /// Returns `true` when the request carried the switch-off bit (the
    /// caller then releases sessions and arms the switch-off path). At
    /// most one de-registration request is in flight per UE.
    pub async fn initiate_deregistration(
        &mut self,
        is_switch_off: bool,
        due_to_disable_5g: bool,
    ) -> bool {
        if self.regs.rm_state != RmState::Registered {
            warn!("De-registration requested while not registered");
            return false;
        }
        if self.regs.mm_state == MmState::DeregisteredInitiated || self.last_dereg_request.is_some()
        {
            warn!("De-registration already in progress");
            return false;
        }

        let switch_off = if is_switch_off {
            SwitchOff::SwitchOff
        } else {
            SwitchOff::NormalDeRegistration
        };

        let request = DeregistrationRequestUeOriginating::new(
            DeRegistrationType::new(
                DeRegistrationAccessType::ThreeGppAccess,
                ReRegistrationRequired::NotRequired,
                switch_off,
            ),
            self.current_ns_ctx
                .as_ref()
                .map(|ctx| ctx.ng_ksi)
                .unwrap_or_else(NasKeySetIdentifier::no_key),
            self.mobile_identity(),
        );

        self.last_dereg_request = Some(request.clone());
        self.last_dereg_due_to_disable_5g = due_to_disable_5g;

        if switch_off == SwitchOff::NormalDeRegistration {
            self.timers.t3521.start(true);
        }

        self.switch_mm_state(MmSubState::DeregisteredInitiatedNa);
        self.send_nas_message(NasPdu::DeregistrationRequestUeOriginating(request))
            .await;

        if is_switch_off {
            let _ = self.base.app_tx.send(AppMessage::PerformSwitchOff).await;
        }

        is_switch_off
    }

    /// De-registration Accept for a UE-originating request.
    pub async fn receive_deregistration_accept(&mut self, _accept: DeregistrationAcceptUeOriginating) {
        if self.regs.mm_state != MmState::DeregisteredInitiated {
            warn!(
                "De-registration Accept in unexpected state: {}",
                self.regs.mm_state
            );
            return;
        }

        info!("De-registration is successful");
        self.timers.t3521.stop(true);

        let due_to_disable_5g = self.last_dereg_due_to_disable_5g;
        self.last_dereg_request = None;
        self.last_dereg_due_to_disable_5g = false;

        self.switch_rm_state(RmState::Deregistered);
        if due_to_disable_5g {
            self.switch_mm_state(MmSubState::NullNa);
        } else {
            self.switch_mm_state(MmSubState::DeregisteredNa);
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Ticks the NAS timer set and handles any expiries.
    pub async fn handle_timer_tick(&mut self) {
        for code in self.timers.perform_tick() {
            self.on_timer_expire(code).await;
        }
    }

    async fn on_timer_expire(&mut self, code: u16) {
        debug!("NAS timer T{} expired", code);
        match code {
            TIMER_T3346 => {
                if self.auto_behaviour
                    && self.regs.mm_sub_state == MmSubState::DeregisteredNormalService
                {
                    self.send_registration(
                        RegistrationType::InitialRegistration,
                        FollowOnRequest::ForPending,
                    )
                    .await;
                }
            }
            TIMER_T3512 => {
                if self.auto_behaviour
                    && self.regs.mm_state == MmState::Registered
                    && self.regs.cm_state == CmState::Connected
                {
                    self.send_registration(
                        RegistrationType::PeriodicRegistrationUpdating,
                        FollowOnRequest::ForPending,
                    )
                    .await;
                }
            }
            TIMER_T3521 => self.on_t3521_expire().await,
            _ => {}
        }
    }

    /// T3521: retransmit the cached de-registration request; on the
    /// fifth expiry abort the procedure and reset the counter.
    async fn on_t3521_expire(&mut self) {
        if self.timers.t3521.expiry_count() >= MAX_T3521_RETRANSMISSION {
            self.timers.t3521.reset_expiry_count();
            if self.regs.mm_state == MmState::DeregisteredInitiated {
                if let Some(request) = self.last_dereg_request.take() {
                    debug!("De-registration aborted");
                    if self.last_dereg_due_to_disable_5g {
                        self.switch_mm_state(MmSubState::NullNa);
                    } else if request.deregistration_type.switch_off
                        == SwitchOff::NormalDeRegistration
                    {
                        self.switch_mm_state(MmSubState::DeregisteredNa);
                    }
                    self.last_dereg_due_to_disable_5g = false;
                }
            }
        } else if self.regs.mm_state == MmState::DeregisteredInitiated {
            if let Some(request) = self.last_dereg_request.clone() {
                debug!("Retrying de-registration request");
                self.send_nas_message(NasPdu::DeregistrationRequestUeOriginating(request))
                    .await;
                self.timers.t3521.start(false);
            }
        }
    }

    // ========================================================================
    // SIM handling
    // ========================================================================

    /// Wipes everything acquired from the network.
    pub fn invalidate_acquired_params(&mut self) {
        self.stored_guti = None;
        self.last_visited_tai = None;
        self.tai_list.clear();
        self.current_ns_ctx = None;
        self.non_current_ns_ctx = None;
    }

    /// Marks the SIM invalid and wipes acquired parameters.
    pub fn invalidate_sim(&mut self) {
        warn!("USIM is removed or invalidated");
        self.valid_sim = false;
        self.invalidate_acquired_params();
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn mobile_identity(&self) -> MobileIdentity {
        if let Some(guti) = self.stored_guti {
            return MobileIdentity::Guti(guti);
        }
        match self.base.config.supi {
            Some(ref supi) => MobileIdentity::Suci { supi: supi.clone() },
            None => MobileIdentity::NoIdentity,
        }
    }

    async fn send_nas_message(&mut self, pdu: NasPdu) {
        let bytes = encode_nas_message(&pdu);
        let msg = RrcMessage::UplinkNasDelivery {
            pdu: ransim_common::OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.base.rrc_tx.send(msg).await {
            error!("Failed to send NAS message to RRC: {}", e);
        }
    }
}
