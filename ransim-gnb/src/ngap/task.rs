//! NGAP task implementation
//!
//! Owns the AMF and UE context tables and drives the NGAP procedures:
//! NG Setup, NAS transport bridging, AMF configuration update, overload
//! handling, error indications and the Xn handover path switch.
//!
//! The context tables live behind a mutex so the CLI command handler can
//! sample them; the handler only takes the lock after this task has
//! confirmed a pause, so no sample observes a mutation in progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use ransim_common::{ConnectionType, NodeType, OctetString, Tai};
use ransim_ngap::cause::{NgapCause, ProtocolCause};
use ransim_ngap::codec::{decode_ngap_pdu, encode_ngap_pdu, render_ngap_pdu, NgapPdu};
use ransim_ngap::ies::{
    BroadcastPlmnItem, GlobalGnbId, NrCgi, SupportedTaItem, UeSecurityCapabilities,
    UserLocationInfoNr,
};
use ransim_ngap::procedures::{
    AmfConfigurationUpdate, AmfConfigurationUpdateAcknowledge, AmfConfigurationUpdateFailure,
    ErrorIndication, InitialUeMessage, NgSetupRequest, OverloadStart, PagingDrx,
    PathSwitchRequest, RrcEstablishmentCause, UeContextReleaseCommand, UeContextReleaseComplete,
    UeNgapIds, UplinkNasTransport,
};
use ransim_ngap::TransportCause;

use crate::tasks::{
    AppMessage, GnbStatusUpdate, GnbTaskBase, GtpMessage, NgapMessage, RrcMessage, SctpMessage,
    Task, TaskMessage,
};

use super::amf_context::{AmfState, NgapAmfContext};
use super::ue_context::NgapUeContext;

/// UE id used by the parameterless Xn handover debug entry.
const XN_HANDOVER_DEBUG_UE_ID: i32 = 3;

/// NGAP context tables, sampled by the CLI under the pause protocol.
#[derive(Debug)]
pub struct NgapState {
    /// AMF contexts keyed by context id
    pub amf_contexts: HashMap<i32, NgapAmfContext>,
    /// UE contexts keyed by UE id
    pub ue_contexts: HashMap<i32, NgapUeContext>,
    ran_ue_ngap_id_counter: i64,
    is_initialized: bool,
}

impl NgapState {
    fn new(base: &GnbTaskBase) -> Self {
        // One AMF context per configured AMF, created at configuration load.
        let mut amf_contexts = HashMap::new();
        for (index, amf) in base.config.amf_configs.iter().enumerate() {
            let ctx_id = index as i32 + 1;
            amf_contexts.insert(ctx_id, NgapAmfContext::new(ctx_id, amf.address, amf.port));
        }
        Self {
            amf_contexts,
            ue_contexts: HashMap::new(),
            ran_ue_ngap_id_counter: 0,
            is_initialized: false,
        }
    }

    fn next_ran_ue_ngap_id(&mut self) -> i64 {
        self.ran_ue_ngap_id_counter += 1;
        self.ran_ue_ngap_id_counter
    }

    /// Picks the serving AMF for a new UE: highest relative capacity
    /// among the connected ones.
    fn select_amf(&self) -> Option<i32> {
        self.amf_contexts
            .values()
            .filter(|ctx| ctx.is_connected())
            .max_by_key(|ctx| ctx.relative_capacity)
            .map(|ctx| ctx.ctx_id)
    }

    fn find_ue_by_ran_id(&mut self, ran_ue_ngap_id: i64) -> Option<&mut NgapUeContext> {
        self.ue_contexts
            .values_mut()
            .find(|ctx| ctx.ran_ue_ngap_id == ran_ue_ngap_id)
    }
}

/// NGAP task for AMF communication and UE context management.
pub struct NgapTask {
    task_base: GnbTaskBase,
    state: Arc<Mutex<NgapState>>,
}

impl NgapTask {
    /// Creates the NGAP task; AMF contexts come from the configuration.
    pub fn new(task_base: GnbTaskBase) -> Self {
        let state = Arc::new(Mutex::new(NgapState::new(&task_base)));
        Self { task_base, state }
    }

    /// Shared state handle for CLI sampling.
    pub fn state(&self) -> Arc<Mutex<NgapState>> {
        Arc::clone(&self.state)
    }

    // ========================================================================
    // Association events
    // ========================================================================

    async fn handle_association_up(&mut self, amf_id: i32, in_streams: u16, out_streams: u16) {
        info!(
            "SCTP association up: amf_id={}, in={}, out={}",
            amf_id, in_streams, out_streams
        );

        {
            let mut state = self.state.lock().await;
            match state.amf_contexts.get_mut(&amf_id) {
                Some(ctx) => {
                    ctx.on_association_up(amf_id, in_streams, out_streams);
                    ctx.state = AmfState::WaitingNgSetup;
                }
                None => {
                    warn!("Association up for unknown AMF[{}]", amf_id);
                    return;
                }
            }
        }

        self.send_ng_setup_request(amf_id).await;
    }

    async fn handle_association_down(&mut self, amf_id: i32) {
        error!("Association terminated for AMF[{}]", amf_id);

        let released_ues: Vec<i32> = {
            let mut state = self.state.lock().await;
            debug!("Removing AMF context[{}]", amf_id);
            state.amf_contexts.remove(&amf_id);
            let ues: Vec<i32> = state
                .ue_contexts
                .values()
                .filter(|ctx| ctx.amf_id == amf_id)
                .map(|ctx| ctx.ue_id)
                .collect();
            for ue_id in &ues {
                state.ue_contexts.remove(ue_id);
            }
            ues
        };

        let _ = self
            .task_base
            .sctp_tx
            .send(SctpMessage::ConnectionClose { amf_id })
            .await;

        for ue_id in released_ues {
            let _ = self.task_base.rrc_tx.send(RrcMessage::AnRelease { ue_id }).await;
            let _ = self
                .task_base
                .gtp_tx
                .send(GtpMessage::UeContextRelease { ue_id })
                .await;
        }
    }

    // ========================================================================
    // NG Setup procedure
    // ========================================================================

    async fn send_ng_setup_request(&mut self, amf_id: i32) {
        debug!("Sending NG Setup Request: amf_id={}", amf_id);

        let config = &self.task_base.config;
        let slice_support = if config.nssais.is_empty() {
            vec![ransim_common::SNssai::new(1)]
        } else {
            config.nssais.clone()
        };

        let request = NgSetupRequest {
            global_gnb_id: GlobalGnbId {
                plmn: config.plmn,
                gnb_id: config.gnb_id,
                gnb_id_length: config.gnb_id_length,
            },
            ran_node_name: Some(config.name.clone()),
            supported_ta_list: vec![SupportedTaItem {
                tac: config.tac,
                broadcast_plmn_list: vec![BroadcastPlmnItem {
                    plmn: config.plmn,
                    slice_support_list: slice_support,
                }],
            }],
            default_paging_drx: match config.paging_drx {
                ransim_common::PagingDrx::V32 => PagingDrx::V32,
                ransim_common::PagingDrx::V64 => PagingDrx::V64,
                ransim_common::PagingDrx::V128 => PagingDrx::V128,
                ransim_common::PagingDrx::V256 => PagingDrx::V256,
            },
        };

        self.send_ngap_non_ue(amf_id, NgapPdu::NgSetupRequest(request))
            .await;
    }

    async fn receive_ng_setup_response(&mut self, amf_id: i32, response: ransim_ngap::procedures::NgSetupResponse) {
        debug!("NG Setup Response received");

        let became_initialized = {
            let mut state = self.state.lock().await;
            let ctx = match state.amf_contexts.get_mut(&amf_id) {
                Some(ctx) => ctx,
                None => return,
            };
            ctx.apply_setup_response(response);
            ctx.state = AmfState::Connected;
            info!("NG Setup procedure is successful");

            let configured = self.task_base.config.amf_configs.len();
            let all_connected = state.amf_contexts.len() == configured
                && state.amf_contexts.values().all(NgapAmfContext::is_connected);
            if !state.is_initialized && all_connected {
                state.is_initialized = true;
                true
            } else {
                false
            }
        };

        if became_initialized {
            let _ = self
                .task_base
                .app_tx
                .send(AppMessage::StatusUpdate(GnbStatusUpdate::NgapIsUp(true)))
                .await;
            let _ = self
                .task_base
                .rrc_tx
                .send(RrcMessage::NgapLayerInitialized)
                .await;
        }
    }

    async fn receive_ng_setup_failure(&mut self, amf_id: i32, failure: ransim_ngap::procedures::NgSetupFailure) {
        let mut state = self.state.lock().await;
        if let Some(ctx) = state.amf_contexts.get_mut(&amf_id) {
            ctx.state = AmfState::WaitingNgSetup;
        }
        error!("NG Setup procedure is failed. Cause: {}", failure.cause);
        if let Some(ttw) = failure.time_to_wait {
            info!("AMF[{}] requested wait time before retry: {:?}", amf_id, ttw);
        }
    }

    // ========================================================================
    // AMF Configuration Update
    // ========================================================================

    async fn receive_amf_configuration_update(&mut self, amf_id: i32, update: AmfConfigurationUpdate) {
        debug!("AMF configuration update received");

        if update.modifies_tnl() {
            error!("TNL modification is not supported, rejecting AMF configuration update");
            let failure = AmfConfigurationUpdateFailure {
                cause: NgapCause::Transport(TransportCause::Unspecified),
            };
            self.send_ngap_non_ue(amf_id, NgapPdu::AmfConfigurationUpdateFailure(failure))
                .await;
            return;
        }

        {
            let mut state = self.state.lock().await;
            if let Some(ctx) = state.amf_contexts.get_mut(&amf_id) {
                if let Some(name) = update.amf_name {
                    ctx.amf_name = Some(name);
                }
                if let Some(capacity) = update.relative_amf_capacity {
                    ctx.relative_capacity = capacity;
                }
                if !update.served_guami_list.is_empty() {
                    ctx.served_guami_list = update.served_guami_list;
                }
                if !update.plmn_support_list.is_empty() {
                    ctx.plmn_support_list = update.plmn_support_list;
                }
            }
        }

        self.send_ngap_non_ue(
            amf_id,
            NgapPdu::AmfConfigurationUpdateAcknowledge(AmfConfigurationUpdateAcknowledge::default()),
        )
        .await;
    }

    // ========================================================================
    // Overload handling
    // ========================================================================

    async fn receive_overload_start(&mut self, amf_id: i32, overload: OverloadStart) {
        debug!("AMF overload start received");
        let mut state = self.state.lock().await;
        if let Some(ctx) = state.amf_contexts.get_mut(&amf_id) {
            ctx.overload_info.overloaded = true;
            ctx.overload_info.action = overload.action;
            ctx.overload_info.load_reduction_perc = overload.load_reduction_perc;
            ctx.overload_info.slice_overload_list = overload.slice_overload_list;
        }
    }

    async fn receive_overload_stop(&mut self, amf_id: i32) {
        debug!("AMF overload stop received");
        let mut state = self.state.lock().await;
        if let Some(ctx) = state.amf_contexts.get_mut(&amf_id) {
            ctx.overload_info = Default::default();
        }
    }

    // ========================================================================
    // NAS transport bridge
    // ========================================================================

    async fn receive_downlink_nas_transport(
        &mut self,
        _amf_id: i32,
        stream: u16,
        dl_nas: ransim_ngap::procedures::DownlinkNasTransport,
    ) {
        let ue_id = {
            let mut state = self.state.lock().await;
            match state.find_ue_by_ran_id(dl_nas.ran_ue_ngap_id) {
                Some(ctx) => {
                    ctx.bind_amf_ue_ngap_id(dl_nas.amf_ue_ngap_id);
                    ctx.downlink_stream = stream;
                    ctx.ue_id
                }
                None => {
                    warn!(
                        "No UE context for RAN-UE-NGAP-ID {} in Downlink NAS Transport",
                        dl_nas.ran_ue_ngap_id
                    );
                    return;
                }
            }
        };

        let msg = RrcMessage::NasDelivery {
            ue_id,
            pdu: OctetString::from_slice(&dl_nas.nas_pdu),
        };
        if let Err(e) = self.task_base.rrc_tx.send(msg).await {
            error!("Failed to deliver downlink NAS to RRC: {}", e);
        }
    }

    async fn handle_uplink_nas_delivery(&mut self, ue_id: i32, pdu: OctetString) {
        debug!("Uplink NAS delivery: ue_id={}, len={}", ue_id, pdu.len());

        enum Uplink {
            Initial(i32, u16, InitialUeMessage),
            Transport(i32, u16, UplinkNasTransport),
        }

        let action = {
            let mut state = self.state.lock().await;
            match state.ue_contexts.get(&ue_id) {
                Some(ctx) => {
                    let amf_ue_ngap_id = match ctx.amf_ue_ngap_id {
                        Some(id) => id,
                        None => {
                            warn!("AMF UE NGAP ID not yet assigned for UE[{}]", ue_id);
                            return;
                        }
                    };
                    Uplink::Transport(
                        ctx.amf_id,
                        ctx.uplink_stream,
                        UplinkNasTransport {
                            amf_ue_ngap_id,
                            ran_ue_ngap_id: ctx.ran_ue_ngap_id,
                            nas_pdu: pdu.data().to_vec(),
                            user_location: self.user_location(),
                        },
                    )
                }
                None => {
                    let amf_id = match state.select_amf() {
                        Some(id) => id,
                        None => {
                            warn!("No connected AMF available for UE[{}]", ue_id);
                            return;
                        }
                    };
                    let ran_ue_ngap_id = state.next_ran_ue_ngap_id();
                    let stream = state
                        .amf_contexts
                        .get_mut(&amf_id)
                        .map(|ctx| ctx.allocate_stream())
                        .unwrap_or(0);

                    let mut ctx = NgapUeContext::new(
                        ue_id,
                        ran_ue_ngap_id,
                        amf_id,
                        stream,
                        self.task_base.config.nci,
                    );
                    ctx.last_tai = Some(Tai::new(
                        self.task_base.config.plmn,
                        self.task_base.config.tac,
                    ));
                    state.ue_contexts.insert(ue_id, ctx);
                    debug!(
                        "Created UE context: ue_id={}, ran_ue_ngap_id={}, amf_id={}, stream={}",
                        ue_id, ran_ue_ngap_id, amf_id, stream
                    );

                    Uplink::Initial(
                        amf_id,
                        stream,
                        InitialUeMessage {
                            ran_ue_ngap_id,
                            nas_pdu: pdu.data().to_vec(),
                            user_location: self.user_location(),
                            rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
                            five_g_s_tmsi: None,
                        },
                    )
                }
            }
        };

        match action {
            Uplink::Initial(amf_id, stream, message) => {
                self.send_ngap_pdu(amf_id, stream, NgapPdu::InitialUeMessage(message))
                    .await;
            }
            Uplink::Transport(amf_id, stream, message) => {
                self.send_ngap_pdu(amf_id, stream, NgapPdu::UplinkNasTransport(message))
                    .await;
            }
        }
    }

    // ========================================================================
    // UE context release and radio link failure
    // ========================================================================

    async fn receive_ue_context_release_command(
        &mut self,
        amf_id: i32,
        stream: u16,
        command: UeContextReleaseCommand,
    ) {
        info!("UE Context Release Command: cause={}", command.cause);

        let released = {
            let mut state = self.state.lock().await;
            let ue_id = match command.ue_ngap_ids {
                UeNgapIds::Pair {
                    amf_ue_ngap_id,
                    ran_ue_ngap_id,
                } => state
                    .ue_contexts
                    .values()
                    .find(|ctx| {
                        ctx.ran_ue_ngap_id == ran_ue_ngap_id
                            || ctx.amf_ue_ngap_id == Some(amf_ue_ngap_id)
                    })
                    .map(|ctx| ctx.ue_id),
                UeNgapIds::AmfOnly(amf_ue_ngap_id) => state
                    .ue_contexts
                    .values()
                    .find(|ctx| ctx.amf_ue_ngap_id == Some(amf_ue_ngap_id))
                    .map(|ctx| ctx.ue_id),
            };
            ue_id.and_then(|id| state.ue_contexts.remove(&id))
        };

        let ctx = match released {
            Some(ctx) => ctx,
            None => {
                warn!("No UE context found for UE Context Release Command");
                return;
            }
        };

        let _ = self
            .task_base
            .rrc_tx
            .send(RrcMessage::AnRelease { ue_id: ctx.ue_id })
            .await;
        let _ = self
            .task_base
            .gtp_tx
            .send(GtpMessage::UeContextRelease { ue_id: ctx.ue_id })
            .await;

        let complete = UeContextReleaseComplete {
            amf_ue_ngap_id: ctx.amf_ue_ngap_id.unwrap_or(0),
            ran_ue_ngap_id: ctx.ran_ue_ngap_id,
        };
        self.send_ngap_pdu(amf_id, stream, NgapPdu::UeContextReleaseComplete(complete))
            .await;
    }

    async fn handle_radio_link_failure(&mut self, ue_id: i32) {
        info!("Radio link failure: ue_id={}", ue_id);
        let removed = {
            let mut state = self.state.lock().await;
            state.ue_contexts.remove(&ue_id)
        };
        if removed.is_none() {
            warn!("Radio link failure for unknown UE[{}]", ue_id);
            return;
        }
        let _ = self
            .task_base
            .gtp_tx
            .send(GtpMessage::UeContextRelease { ue_id })
            .await;
    }

    // ========================================================================
    // Handover
    // ========================================================================

    /// Handover preparation hook: the procedure construction point for a
    /// future Handover Required. Emits no PDU.
    async fn handover_preparation(&mut self, ue_id: i32) {
        let state = self.state.lock().await;
        if state.ue_contexts.contains_key(&ue_id) {
            info!("Handover preparation requested for UE[{}]", ue_id);
        } else {
            warn!("Handover preparation for unknown UE[{}]", ue_id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_xn_handover(
        &mut self,
        as_amf_id: i32,
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: i64,
        ctxt_id: i32,
        uplink_stream: u16,
        amf_name: String,
    ) {
        debug!(
            "Xn handover path switch: as_amf_id={}, ran_ue_ngap_id={}, ctxt_id={}",
            as_amf_id, ran_ue_ngap_id, ctxt_id
        );

        let request = PathSwitchRequest {
            amf_ue_ngap_id: (amf_ue_ngap_id > 0).then_some(amf_ue_ngap_id),
            ran_ue_ngap_id,
            user_location: self.user_location_with_timestamp(),
            ue_security_capabilities: UeSecurityCapabilities::all_enabled(),
        };

        let pdu = NgapPdu::PathSwitchRequest(request);
        let bytes = match encode_ngap_pdu(&pdu) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("NGAP PDU ASN constraint validation failed: {}", e);
                return;
            }
        };

        let msg = SctpMessage::SendMessage {
            amf_id: as_amf_id,
            stream: uplink_stream,
            buffer: OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.task_base.sctp_tx.send(msg).await {
            error!("Failed to send Path Switch Request to SCTP: {}", e);
            return;
        }

        if let Some(ref listener) = self.task_base.listener {
            listener.on_send(
                NodeType::Gnb,
                &self.task_base.config.name,
                NodeType::Amf,
                &amf_name,
                ConnectionType::Ngap,
                &render_ngap_pdu(&pdu),
            );
        }
    }

    /// Parameterless debug entry; requires the `debug_stubs` flag.
    async fn handle_xn_handover_debug(&mut self) {
        if !self.task_base.config.debug_stubs {
            warn!("Xn handover debug entry invoked without debug_stubs enabled");
            return;
        }

        let ue_id = XN_HANDOVER_DEBUG_UE_ID;
        debug!("handle Xn handover ueId: {}", ue_id);

        let params = {
            let state = self.state.lock().await;
            let ue = match state.ue_contexts.get(&ue_id) {
                Some(ue) => ue,
                None => return,
            };
            let amf = match state.amf_contexts.get(&ue.amf_id) {
                Some(amf) => amf,
                None => return,
            };
            (
                amf.ctx_id,
                ue.amf_ue_ngap_id.unwrap_or(0),
                ue.ran_ue_ngap_id,
                ue.ue_id,
                ue.uplink_stream,
                amf.amf_name.clone().unwrap_or_default(),
            )
        };

        self.handle_xn_handover(params.0, params.1, params.2, params.3, params.4, params.5)
            .await;
    }

    // ========================================================================
    // Error Indication
    // ========================================================================

    async fn send_error_indication(&mut self, amf_id: i32, cause: NgapCause, ue_id: i32) {
        debug!("Sending an error indication with cause: {}", cause);

        if ue_id > 0 {
            let resolved = {
                let state = self.state.lock().await;
                state.ue_contexts.get(&ue_id).map(|ctx| {
                    (
                        ctx.amf_id,
                        ctx.uplink_stream,
                        ctx.amf_ue_ngap_id,
                        ctx.ran_ue_ngap_id,
                    )
                })
            };
            match resolved {
                Some((amf_id, stream, amf_ue_ngap_id, ran_ue_ngap_id)) => {
                    let indication = ErrorIndication {
                        cause: Some(cause),
                        amf_ue_ngap_id,
                        ran_ue_ngap_id: Some(ran_ue_ngap_id),
                    };
                    self.send_ngap_pdu(amf_id, stream, NgapPdu::ErrorIndication(indication))
                        .await;
                }
                None => warn!("Error indication requested for unknown UE[{}]", ue_id),
            }
        } else {
            self.send_ngap_non_ue(amf_id, NgapPdu::ErrorIndication(ErrorIndication::with_cause(cause)))
                .await;
        }
    }

    // ========================================================================
    // PDU reception and dispatch
    // ========================================================================

    async fn handle_receive_pdu(&mut self, amf_id: i32, stream: u16, pdu: OctetString) {
        let decoded = match decode_ngap_pdu(pdu.data()) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Failed to decode NGAP PDU from AMF[{}]: {}", amf_id, e);
                self.send_error_indication(
                    amf_id,
                    NgapCause::Protocol(ProtocolCause::TransferSyntaxError),
                    0,
                )
                .await;
                return;
            }
        };

        match decoded {
            NgapPdu::NgSetupResponse(response) => {
                self.receive_ng_setup_response(amf_id, response).await;
            }
            NgapPdu::NgSetupFailure(failure) => {
                self.receive_ng_setup_failure(amf_id, failure).await;
            }
            NgapPdu::DownlinkNasTransport(dl_nas) => {
                self.receive_downlink_nas_transport(amf_id, stream, dl_nas).await;
            }
            NgapPdu::AmfConfigurationUpdate(update) => {
                self.receive_amf_configuration_update(amf_id, update).await;
            }
            NgapPdu::OverloadStart(overload) => {
                self.receive_overload_start(amf_id, overload).await;
            }
            NgapPdu::OverloadStop(_) => {
                self.receive_overload_stop(amf_id).await;
            }
            NgapPdu::ErrorIndication(indication) => match indication.cause {
                Some(cause) => error!("Error indication received. Cause: {}", cause),
                None => error!("Error indication received."),
            },
            NgapPdu::UeContextReleaseCommand(command) => {
                self.receive_ue_context_release_command(amf_id, stream, command).await;
            }
            NgapPdu::Paging(paging) => {
                let _ = self
                    .task_base
                    .rrc_tx
                    .send(RrcMessage::Paging {
                        five_g_s_tmsi: paging.five_g_s_tmsi,
                    })
                    .await;
            }
            other => {
                warn!("Unhandled NGAP PDU from AMF[{}]: {:?}", amf_id, other);
            }
        }
    }

    // ========================================================================
    // Send helpers
    // ========================================================================

    fn user_location(&self) -> UserLocationInfoNr {
        let config = &self.task_base.config;
        UserLocationInfoNr {
            nr_cgi: NrCgi {
                plmn: config.plmn,
                nci: config.nci,
            },
            tai: Tai::new(config.plmn, config.tac),
            timestamp: None,
        }
    }

    fn user_location_with_timestamp(&self) -> UserLocationInfoNr {
        let mut location = self.user_location();
        location.timestamp = Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0),
        );
        location
    }

    /// Non-UE-associated signalling goes on stream 0.
    async fn send_ngap_non_ue(&mut self, amf_id: i32, pdu: NgapPdu) {
        self.send_ngap_pdu(amf_id, 0, pdu).await;
    }

    /// Encodes (constraint check included) and forwards to SCTP. A PDU
    /// failing validation is dropped without emitting bytes.
    async fn send_ngap_pdu(&mut self, amf_id: i32, stream: u16, pdu: NgapPdu) {
        let bytes = match encode_ngap_pdu(&pdu) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("NGAP PDU ASN constraint validation failed: {}", e);
                return;
            }
        };

        let msg = SctpMessage::SendMessage {
            amf_id,
            stream,
            buffer: OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.task_base.sctp_tx.send(msg).await {
            error!("Failed to send NGAP PDU to SCTP: {}", e);
            return;
        }

        if let Some(ref listener) = self.task_base.listener {
            let amf_name = {
                let state = self.state.lock().await;
                state
                    .amf_contexts
                    .get(&amf_id)
                    .and_then(|ctx| ctx.amf_name.clone())
                    .unwrap_or_default()
            };
            listener.on_send(
                NodeType::Gnb,
                &self.task_base.config.name,
                NodeType::Amf,
                &amf_name,
                ConnectionType::Ngap,
                &render_ngap_pdu(&pdu),
            );
        }
    }

    async fn dispatch(&mut self, msg: NgapMessage) {
        match msg {
            NgapMessage::AssociationUp {
                amf_id,
                in_streams,
                out_streams,
            } => self.handle_association_up(amf_id, in_streams, out_streams).await,
            NgapMessage::AssociationDown { amf_id } => self.handle_association_down(amf_id).await,
            NgapMessage::ReceivePdu { amf_id, stream, pdu } => {
                self.handle_receive_pdu(amf_id, stream, pdu).await;
            }
            NgapMessage::UplinkNasDelivery { ue_id, pdu } => {
                self.handle_uplink_nas_delivery(ue_id, pdu).await;
            }
            NgapMessage::RadioLinkFailure { ue_id } => {
                self.handle_radio_link_failure(ue_id).await;
            }
            NgapMessage::HandoverPreparation { ue_id } => {
                self.handover_preparation(ue_id).await;
            }
            NgapMessage::XnHandover {
                as_amf_id,
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                ctxt_id,
                uplink_stream,
                amf_name,
            } => {
                self.handle_xn_handover(
                    as_amf_id,
                    amf_ue_ngap_id,
                    ran_ue_ngap_id,
                    ctxt_id,
                    uplink_stream,
                    amf_name,
                )
                .await;
            }
            NgapMessage::XnHandoverDebug => self.handle_xn_handover_debug().await,
            NgapMessage::SendErrorIndication { amf_id, cause, ue_id } => {
                self.send_error_indication(amf_id, cause, ue_id).await;
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for NgapTask {
    type Message = NgapMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("NGAP task started");
        let pause = self.task_base.ngap_tx.pause();

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

        let state = self.state.lock().await;
        info!(
            "NGAP task stopped, {} AMF contexts, {} UE contexts",
            state.amf_contexts.len(),
            state.ue_contexts.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{GnbTaskReceivers, DEFAULT_CHANNEL_CAPACITY};
    use ransim_common::{AmfConfig, GnbConfig, PagingDrx as ConfigPagingDrx, Plmn, SNssai};
    use ransim_ngap::ies::{PlmnSupportItem, ServedGuamiItem};
    use ransim_ngap::procedures::NgSetupResponse;
    use ransim_common::Guami;

    fn test_config(amf_count: usize) -> GnbConfig {
        GnbConfig {
            gnb_id: 1,
            gnb_id_length: 32,
            name: "test-gnb".to_string(),
            plmn: Plmn::new(901, 70, false),
            tac: 1,
            nci: 0x10,
            nssais: vec![SNssai::new(1)],
            paging_drx: ConfigPagingDrx::V128,
            amf_configs: (0..amf_count)
                .map(|_| AmfConfig::new("127.0.0.1".parse().unwrap(), 38412))
                .collect(),
            ignore_stream_ids: false,
            debug_stubs: false,
        }
    }

    fn setup(amf_count: usize) -> (NgapTask, GnbTaskReceivers) {
        let (base, receivers) = GnbTaskBase::new(test_config(amf_count), None, DEFAULT_CHANNEL_CAPACITY);
        (NgapTask::new(base), receivers)
    }

    fn setup_response(name: &str, capacity: u8) -> NgSetupResponse {
        NgSetupResponse {
            amf_name: name.to_string(),
            served_guami_list: vec![ServedGuamiItem {
                guami: Guami {
                    plmn: Plmn::new(901, 70, false),
                    amf_region_id: 1,
                    amf_set_id: 1,
                    amf_pointer: 0,
                },
                backup_amf_name: None,
            }],
            relative_amf_capacity: capacity,
            plmn_support_list: vec![PlmnSupportItem {
                plmn: Plmn::new(901, 70, false),
                slice_support_list: vec![SNssai::new(1)],
            }],
        }
    }

    #[tokio::test]
    async fn test_contexts_created_from_configuration() {
        let (task, _receivers) = setup(2);
        let state = task.state.lock().await;
        assert_eq!(state.amf_contexts.len(), 2);
        assert!(state.amf_contexts.values().all(|c| c.state == AmfState::NotConnected));
    }

    #[tokio::test]
    async fn test_association_up_sends_ng_setup_request() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 2, 2).await;

        {
            let state = task.state.lock().await;
            assert_eq!(state.amf_contexts[&1].state, AmfState::WaitingNgSetup);
        }

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { amf_id, stream, buffer })) => {
                assert_eq!(amf_id, 1);
                assert_eq!(stream, 0);
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::NgSetupRequest(request) => {
                        assert_eq!(request.ran_node_name.as_deref(), Some("test-gnb"));
                        assert_eq!(request.supported_ta_list[0].tac, 1);
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ng_setup_response_marks_connected_and_fires_once() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 2, 2).await;
        let _ = receivers.sctp_rx.recv().await;

        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;

        {
            let state = task.state.lock().await;
            assert_eq!(state.amf_contexts[&1].state, AmfState::Connected);
            assert_eq!(state.amf_contexts[&1].amf_name.as_deref(), Some("AMF1"));
        }

        match receivers.app_rx.try_recv() {
            Ok(TaskMessage::Message(AppMessage::StatusUpdate(GnbStatusUpdate::NgapIsUp(true)))) => {}
            other => panic!("unexpected message: {other:?}"),
        }
        match receivers.rrc_rx.try_recv() {
            Ok(TaskMessage::Message(RrcMessage::NgapLayerInitialized)) => {}
            other => panic!("unexpected message: {other:?}"),
        }

        // a second response must not fire NGAP_IS_UP again
        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;
        assert!(receivers.app_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_partial_boot_does_not_fire_ngap_is_up() {
        let (mut task, mut receivers) = setup(2);
        task.handle_association_up(1, 2, 2).await;
        let _ = receivers.sctp_rx.recv().await;

        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;

        assert!(receivers.app_rx.try_recv().is_err());
        assert!(receivers.rrc_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tnl_modification_rejected() {
        let (mut task, mut receivers) = setup(1);
        let update = AmfConfigurationUpdate {
            amf_name: None,
            relative_amf_capacity: None,
            served_guami_list: vec![],
            plmn_support_list: vec![],
            tnl_to_add: vec![ransim_ngap::procedures::TnlAssociationItem {
                address: "10.0.0.1".to_string(),
            }],
            tnl_to_remove: vec![],
            tnl_to_update: vec![],
        };
        task.receive_amf_configuration_update(1, update).await;

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { buffer, .. })) => {
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::AmfConfigurationUpdateFailure(failure) => {
                        assert_eq!(failure.cause, NgapCause::Transport(TransportCause::Unspecified));
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configuration_update_without_tnl_acknowledged() {
        let (mut task, mut receivers) = setup(1);
        let update = AmfConfigurationUpdate {
            amf_name: Some("AMF-renamed".to_string()),
            relative_amf_capacity: Some(10),
            served_guami_list: vec![],
            plmn_support_list: vec![],
            tnl_to_add: vec![],
            tnl_to_remove: vec![],
            tnl_to_update: vec![],
        };
        task.receive_amf_configuration_update(1, update).await;

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { buffer, .. })) => {
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::AmfConfigurationUpdateAcknowledge(ack) => {
                        assert!(ack.tnl_association_setup_list.is_empty());
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let state = task.state.lock().await;
        assert_eq!(state.amf_contexts[&1].amf_name.as_deref(), Some("AMF-renamed"));
        assert_eq!(state.amf_contexts[&1].relative_capacity, 10);
    }

    #[tokio::test]
    async fn test_uplink_nas_creates_ue_context_and_initial_message() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 4, 4).await;
        let _ = receivers.sctp_rx.recv().await;
        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;

        task.handle_uplink_nas_delivery(5, OctetString::from_slice(&[0x7e, 0x00, 0x41]))
            .await;

        {
            let state = task.state.lock().await;
            let ctx = &state.ue_contexts[&5];
            assert_eq!(ctx.ran_ue_ngap_id, 1);
            assert_eq!(ctx.amf_id, 1);
            assert!(ctx.amf_ue_ngap_id.is_none());
        }

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { buffer, .. })) => {
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::InitialUeMessage(msg) => {
                        assert_eq!(msg.ran_ue_ngap_id, 1);
                        assert_eq!(msg.nas_pdu, vec![0x7e, 0x00, 0x41]);
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ran_ue_ngap_ids_are_unique() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 4, 4).await;
        let _ = receivers.sctp_rx.recv().await;
        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;

        for ue_id in 1..=3 {
            task.handle_uplink_nas_delivery(ue_id, OctetString::from_slice(&[0x7e, 0x00]))
                .await;
        }

        let state = task.state.lock().await;
        let mut ids: Vec<i64> = state.ue_contexts.values().map(|c| c.ran_ue_ngap_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_downlink_nas_binds_amf_id_and_forwards() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 4, 4).await;
        let _ = receivers.sctp_rx.recv().await;
        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;
        task.handle_uplink_nas_delivery(5, OctetString::from_slice(&[0x7e, 0x00])).await;
        let _ = receivers.sctp_rx.recv().await;
        let _ = receivers.rrc_rx.recv().await; // NgapLayerInitialized

        task.receive_downlink_nas_transport(
            1,
            1,
            ransim_ngap::procedures::DownlinkNasTransport {
                amf_ue_ngap_id: 42,
                ran_ue_ngap_id: 1,
                nas_pdu: vec![0x7e, 0x00, 0x42],
            },
        )
        .await;

        {
            let state = task.state.lock().await;
            assert_eq!(state.ue_contexts[&5].amf_ue_ngap_id, Some(42));
        }

        match receivers.rrc_rx.recv().await {
            Some(TaskMessage::Message(RrcMessage::NasDelivery { ue_id, pdu })) => {
                assert_eq!(ue_id, 5);
                assert_eq!(pdu.data(), &[0x7e, 0x00, 0x42]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_xn_handover_emits_path_switch_request() {
        let (mut task, mut receivers) = setup(1);

        task.handle_xn_handover(1, 77, 3, 5, 1, "AMF1".to_string()).await;

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { amf_id, stream, buffer })) => {
                assert_eq!(amf_id, 1);
                assert_eq!(stream, 1);
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::PathSwitchRequest(request) => {
                        assert_eq!(request.amf_ue_ngap_id, Some(77));
                        assert_eq!(request.ran_ue_ngap_id, 3);
                        assert!(request.user_location.timestamp.is_some());
                        assert_eq!(
                            request.ue_security_capabilities.nr_encryption_algorithms,
                            vec![0xff]
                        );
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_xn_handover_omits_nonpositive_amf_id() {
        let (mut task, mut receivers) = setup(1);
        task.handle_xn_handover(1, 0, 3, 5, 1, "AMF1".to_string()).await;

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { buffer, .. })) => {
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::PathSwitchRequest(request) => {
                        assert!(request.amf_ue_ngap_id.is_none());
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_path_switch_produces_no_bytes() {
        let (mut task, mut receivers) = setup(1);
        // RAN-UE-NGAP-ID above 2^32-1 fails the constraint check
        task.handle_xn_handover(1, 1, i64::MAX, 5, 1, "AMF1".to_string()).await;
        assert!(receivers.sctp_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_xn_handover_debug_gated_by_config() {
        let (mut task, mut receivers) = setup(1);
        task.handle_xn_handover_debug().await;
        assert!(receivers.sctp_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_overload_start_and_stop() {
        let (mut task, _receivers) = setup(1);
        task.receive_overload_start(
            1,
            OverloadStart {
                action: Some(ransim_ngap::procedures::OverloadAction::RejectSignalling),
                load_reduction_perc: Some(25),
                slice_overload_list: vec![],
            },
        )
        .await;

        {
            let state = task.state.lock().await;
            let info = &state.amf_contexts[&1].overload_info;
            assert!(info.overloaded);
            assert_eq!(info.load_reduction_perc, Some(25));
        }

        task.receive_overload_stop(1).await;
        let state = task.state.lock().await;
        assert!(!state.amf_contexts[&1].overload_info.overloaded);
    }

    #[tokio::test]
    async fn test_association_down_wipes_context_and_releases_ues() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 4, 4).await;
        let _ = receivers.sctp_rx.recv().await;
        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;
        let _ = receivers.rrc_rx.recv().await; // NgapLayerInitialized
        task.handle_uplink_nas_delivery(5, OctetString::from_slice(&[0x7e, 0x00])).await;
        let _ = receivers.sctp_rx.recv().await;

        task.handle_association_down(1).await;

        {
            let state = task.state.lock().await;
            assert!(state.amf_contexts.is_empty());
            assert!(state.ue_contexts.is_empty());
        }

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::ConnectionClose { amf_id })) => {
                assert_eq!(amf_id, 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        match receivers.rrc_rx.recv().await {
            Some(TaskMessage::Message(RrcMessage::AnRelease { ue_id })) => assert_eq!(ue_id, 5),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_indication_ue_associated_routing() {
        let (mut task, mut receivers) = setup(1);
        task.handle_association_up(1, 4, 4).await;
        let _ = receivers.sctp_rx.recv().await;
        task.receive_ng_setup_response(1, setup_response("AMF1", 255)).await;
        task.handle_uplink_nas_delivery(5, OctetString::from_slice(&[0x7e, 0x00])).await;
        let _ = receivers.sctp_rx.recv().await;

        task.send_error_indication(
            1,
            NgapCause::Protocol(ProtocolCause::SemanticError),
            5,
        )
        .await;

        match receivers.sctp_rx.recv().await {
            Some(TaskMessage::Message(SctpMessage::SendMessage { stream, buffer, .. })) => {
                assert!(stream > 0);
                match decode_ngap_pdu(buffer.data()).unwrap() {
                    NgapPdu::ErrorIndication(indication) => {
                        assert_eq!(indication.ran_ue_ngap_id, Some(1));
                    }
                    other => panic!("unexpected PDU: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
