//! 5GSM session machine
//!
//! The fixed 16-slot PDU session table (slot 0 reserved) and the
//! establishment/release procedures. A slot is free iff its `id` is 0;
//! an occupied slot's id equals its index.

use std::net::Ipv4Addr;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use ransim_common::{OctetString, PduSessionType, SessionConfig, PSI_MAX, PSI_MIN};
use ransim_nas::{
    encode_nas_message, NasMessage as NasPdu, PduSessionEstablishmentAccept,
    PduSessionEstablishmentReject, PduSessionEstablishmentRequest,
};

use crate::tasks::{AppMessage, PduSessionSummary, RrcMessage, UeStatusUpdate, UeTaskBase};

use super::procedure::{ProcedureTransactionManager, SmProcedureType};

/// Number of slots in the PDU session table (index 0 reserved).
pub const PDU_SESSION_TABLE_SIZE: usize = 16;

/// Errors raised by the session machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmError {
    /// The PSI is outside 1..=15
    #[error("invalid PSI {0}")]
    InvalidPsi(u8),
    /// All 15 session slots are occupied
    #[error("PDU session table is full")]
    TableFull,
    /// All 254 procedure transactions are outstanding
    #[error("no procedure transaction identity available")]
    PtiExhausted,
    /// No outstanding procedure matches the received PTI/PSI pair
    #[error("no matching procedure transaction: PTI {pti}, PSI {psi}")]
    UnknownTransaction {
        /// Received PTI
        pti: u8,
        /// Received PSI
        psi: u8,
    },
}

/// One PDU session slot.
#[derive(Debug, Clone, Default)]
pub struct PduSession {
    /// Session id; 0 iff the slot is free, otherwise equal to the index
    pub id: u8,
    /// True once the establishment accept arrived
    pub is_established: bool,
    /// Session type (only IPv4 supported)
    pub session_type: PduSessionType,
    /// Allocated PDU address
    pub pdu_address: Option<Ipv4Addr>,
    /// Authorized QoS rules digest
    pub qos_rules: Vec<u8>,
    /// Requested DNN/APN
    pub apn: Option<String>,
}

/// The UE-side 5GSM machine.
pub struct NasSm {
    base: UeTaskBase,
    sessions: [PduSession; PDU_SESSION_TABLE_SIZE],
    transactions: ProcedureTransactionManager,
}

impl NasSm {
    /// Creates the session machine with an empty table.
    pub fn new(base: UeTaskBase) -> Self {
        Self {
            base,
            sessions: std::array::from_fn(|_| PduSession::default()),
            transactions: ProcedureTransactionManager::new(),
        }
    }

    /// Read access to one session slot.
    pub fn session(&self, psi: u8) -> Option<&PduSession> {
        self.sessions.get(psi as usize)
    }

    /// The established sessions, for status displays.
    pub fn established_sessions(&self) -> Vec<&PduSession> {
        self.sessions
            .iter()
            .filter(|s| s.id != 0 && s.is_established)
            .collect()
    }

    /// Number of occupied slots.
    pub fn session_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.id != 0).count()
    }

    /// Number of outstanding SM procedures.
    pub fn pending_procedure_count(&self) -> usize {
        self.transactions.pending_count()
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocates the lowest free PSI in 1..=15.
    pub fn allocate_pdu_session_id(&mut self) -> Result<u8, SmError> {
        for psi in PSI_MIN..=PSI_MAX {
            if self.sessions[psi as usize].id == 0 {
                self.sessions[psi as usize].id = psi;
                return Ok(psi);
            }
        }
        Err(SmError::TableFull)
    }

    /// Frees a PSI. Slot 0 is reserved and can never be freed.
    pub fn free_pdu_session_id(&mut self, psi: u8) -> Result<(), SmError> {
        if !(PSI_MIN..=PSI_MAX).contains(&psi) {
            return Err(SmError::InvalidPsi(psi));
        }
        self.sessions[psi as usize] = PduSession::default();
        Ok(())
    }

    // ========================================================================
    // Local release
    // ========================================================================

    /// Locally releases one session: frees the slot and, if it was
    /// established, tells the App task to reclaim its TUN interface.
    pub async fn local_release_session(&mut self, psi: u8) -> Result<(), SmError> {
        debug!("Performing local release of PDU session[{}]", psi);

        if !(PSI_MIN..=PSI_MAX).contains(&psi) {
            return Err(SmError::InvalidPsi(psi));
        }

        let was_established = self.sessions[psi as usize].is_established;
        self.free_pdu_session_id(psi)?;

        if was_established {
            let _ = self
                .base
                .app_tx
                .send(AppMessage::StatusUpdate(UeStatusUpdate::SessionRelease { psi }))
                .await;
        }
        Ok(())
    }

    /// Locally releases every occupied session.
    pub async fn local_release_all_sessions(&mut self) {
        for psi in PSI_MIN..=PSI_MAX {
            if self.sessions[psi as usize].id != 0 {
                let _ = self.local_release_session(psi).await;
            }
        }
    }

    // ========================================================================
    // Establishment procedure
    // ========================================================================

    /// Builds and sends a PDU Session Establishment Request for the
    /// given session configuration.
    pub async fn send_establishment_request(
        &mut self,
        config: &SessionConfig,
    ) -> Result<u8, SmError> {
        if config.session_type != PduSessionType::Ipv4 {
            warn!("Only IPv4 PDU sessions are supported");
            return Err(SmError::InvalidPsi(0));
        }

        let psi = self.allocate_pdu_session_id()?;
        let pti = match self
            .transactions
            .allocate(psi, SmProcedureType::PduSessionEstablishment)
        {
            Some(pti) => pti,
            None => {
                self.free_pdu_session_id(psi)?;
                return Err(SmError::PtiExhausted);
            }
        };

        {
            let slot = &mut self.sessions[psi as usize];
            slot.session_type = config.session_type;
            slot.apn = config.apn.clone();
        }

        info!("Sending PDU Session Establishment Request: psi={}, pti={}", psi, pti);

        let request = PduSessionEstablishmentRequest {
            psi,
            pti,
            session_type: config.session_type,
            apn: config.apn.clone(),
        };
        self.send_nas_message(NasPdu::PduSessionEstablishmentRequest(request))
            .await;

        Ok(psi)
    }

    /// PDU Session Establishment Accept: binds the PDU address, marks
    /// the slot established and materializes the TUN interface via App.
    pub async fn receive_establishment_accept(
        &mut self,
        accept: PduSessionEstablishmentAccept,
    ) -> Result<(), SmError> {
        if !self.transactions.matches(accept.pti, accept.psi) {
            return Err(SmError::UnknownTransaction {
                pti: accept.pti,
                psi: accept.psi,
            });
        }
        self.transactions.free(accept.pti);

        let psi = accept.psi;
        {
            let slot = &mut self.sessions[psi as usize];
            slot.is_established = true;
            slot.session_type = accept.session_type;
            slot.pdu_address = Some(accept.pdu_address);
            slot.qos_rules = accept.qos_rules.clone();
        }

        info!(
            "PDU session[{}] established with address {}",
            psi, accept.pdu_address
        );

        let summary = PduSessionSummary {
            psi,
            session_type: accept.session_type,
            address: accept.pdu_address,
        };
        let _ = self
            .base
            .app_tx
            .send(AppMessage::StatusUpdate(UeStatusUpdate::SessionEstablishment {
                session: summary,
            }))
            .await;
        Ok(())
    }

    /// PDU Session Establishment Reject: frees the PTI and the PSI and
    /// surfaces the SM cause.
    pub async fn receive_establishment_reject(
        &mut self,
        reject: PduSessionEstablishmentReject,
    ) -> Result<(), SmError> {
        if !self.transactions.matches(reject.pti, reject.psi) {
            return Err(SmError::UnknownTransaction {
                pti: reject.pti,
                psi: reject.psi,
            });
        }
        self.transactions.free(reject.pti);
        self.free_pdu_session_id(reject.psi)?;

        error!(
            "PDU Session Establishment Reject: psi={}, cause={}",
            reject.psi, reject.sm_cause
        );
        Ok(())
    }

    async fn send_nas_message(&mut self, pdu: NasPdu) {
        let bytes = encode_nas_message(&pdu);
        let msg = RrcMessage::UplinkNasDelivery {
            pdu: OctetString::from_slice(&bytes),
        };
        if let Err(e) = self.base.rrc_tx.send(msg).await {
            error!("Failed to send NAS message to RRC: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskMessage, UeTaskBase, UeTaskReceivers, DEFAULT_CHANNEL_CAPACITY};
    use ransim_common::{Plmn, UeConfig};
    use ransim_nas::SmCause;

    fn setup() -> (NasSm, UeTaskReceivers) {
        let config = UeConfig {
            supi: Some("imsi-901700000000001".to_string()),
            imei: None,
            imeisv: None,
            plmn: Plmn::new(901, 70, false),
            nssais: vec![],
            configure_routing: false,
            auto_behaviour: true,
            sessions: vec![SessionConfig::default()],
            tun_name_prefix: "ransimtun".to_string(),
        };
        let (base, receivers) = UeTaskBase::new(config, None, DEFAULT_CHANNEL_CAPACITY);
        (NasSm::new(base), receivers)
    }

    fn accept(psi: u8, pti: u8) -> PduSessionEstablishmentAccept {
        PduSessionEstablishmentAccept {
            psi,
            pti,
            session_type: PduSessionType::Ipv4,
            pdu_address: Ipv4Addr::new(10, 45, 0, 2),
            qos_rules: vec![0x01],
        }
    }

    #[test]
    fn test_psi_allocation_lowest_free() {
        let (mut sm, _receivers) = setup();
        assert_eq!(sm.allocate_pdu_session_id(), Ok(1));
        assert_eq!(sm.allocate_pdu_session_id(), Ok(2));
        sm.free_pdu_session_id(1).unwrap();
        assert_eq!(sm.allocate_pdu_session_id(), Ok(1));
    }

    #[test]
    fn test_psi_allocation_fails_when_full() {
        let (mut sm, _receivers) = setup();
        for expected in 1..=15u8 {
            assert_eq!(sm.allocate_pdu_session_id(), Ok(expected));
        }
        assert_eq!(sm.allocate_pdu_session_id(), Err(SmError::TableFull));
    }

    #[test]
    fn test_free_psi_zero_rejected() {
        let (mut sm, _receivers) = setup();
        assert_eq!(sm.free_pdu_session_id(0), Err(SmError::InvalidPsi(0)));
        assert_eq!(sm.free_pdu_session_id(16), Err(SmError::InvalidPsi(16)));
    }

    #[test]
    fn test_slot_id_equals_index() {
        let (mut sm, _receivers) = setup();
        let psi = sm.allocate_pdu_session_id().unwrap();
        assert_eq!(sm.session(psi).unwrap().id, psi);
        // every other slot is free
        for i in (PSI_MIN..=PSI_MAX).filter(|&i| i != psi) {
            assert_eq!(sm.session(i).unwrap().id, 0);
        }
    }

    #[tokio::test]
    async fn test_establishment_request_allocates_pti_and_psi() {
        let (mut sm, mut receivers) = setup();
        let psi = sm
            .send_establishment_request(&SessionConfig::default())
            .await
            .unwrap();
        assert_eq!(psi, 1);
        assert_eq!(sm.pending_procedure_count(), 1);
        assert!(!sm.session(psi).unwrap().is_established);

        match receivers.rrc_rx.recv().await {
            Some(TaskMessage::Message(RrcMessage::UplinkNasDelivery { pdu })) => {
                match ransim_nas::decode_nas_message(pdu.data()).unwrap() {
                    NasPdu::PduSessionEstablishmentRequest(request) => {
                        assert_eq!(request.psi, 1);
                        assert_eq!(request.pti, 1);
                    }
                    other => panic!("unexpected NAS message: {other:?}"),
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_establishment_accept_marks_established_and_notifies_app() {
        let (mut sm, mut receivers) = setup();
        let psi = sm
            .send_establishment_request(&SessionConfig::default())
            .await
            .unwrap();

        sm.receive_establishment_accept(accept(psi, 1)).await.unwrap();

        let slot = sm.session(psi).unwrap();
        assert!(slot.is_established);
        assert_eq!(slot.pdu_address, Some(Ipv4Addr::new(10, 45, 0, 2)));
        assert_eq!(sm.pending_procedure_count(), 0);

        match receivers.app_rx.recv().await {
            Some(TaskMessage::Message(AppMessage::StatusUpdate(
                UeStatusUpdate::SessionEstablishment { session },
            ))) => {
                assert_eq!(session.psi, psi);
                assert_eq!(session.address, Ipv4Addr::new(10, 45, 0, 2));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_establishment_reject_frees_pti_and_psi() {
        let (mut sm, _receivers) = setup();
        let psi = sm
            .send_establishment_request(&SessionConfig::default())
            .await
            .unwrap();

        sm.receive_establishment_reject(PduSessionEstablishmentReject {
            psi,
            pti: 1,
            sm_cause: SmCause::InsufficientResources,
        })
        .await
        .unwrap();

        assert_eq!(sm.session(psi).unwrap().id, 0);
        assert_eq!(sm.pending_procedure_count(), 0);
    }

    #[tokio::test]
    async fn test_accept_with_unknown_transaction_rejected() {
        let (mut sm, _receivers) = setup();
        let result = sm.receive_establishment_accept(accept(1, 9)).await;
        assert_eq!(
            result,
            Err(SmError::UnknownTransaction { pti: 9, psi: 1 })
        );
    }

    #[tokio::test]
    async fn test_local_release_session_notifies_app_only_if_established() {
        let (mut sm, mut receivers) = setup();
        let psi = sm
            .send_establishment_request(&SessionConfig::default())
            .await
            .unwrap();
        let _ = receivers.rrc_rx.recv().await;

        // not yet established: slot freed silently
        sm.local_release_session(psi).await.unwrap();
        assert!(receivers.app_rx.try_recv().is_err());

        // establish a fresh one and release it
        let psi = sm
            .send_establishment_request(&SessionConfig::default())
            .await
            .unwrap();
        sm.receive_establishment_accept(accept(psi, 1)).await.unwrap();
        let _ = receivers.app_rx.recv().await; // SessionEstablishment

        sm.local_release_session(psi).await.unwrap();
        match receivers.app_rx.recv().await {
            Some(TaskMessage::Message(AppMessage::StatusUpdate(
                UeStatusUpdate::SessionRelease { psi: released },
            ))) => assert_eq!(released, psi),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_release_all_sessions_empties_table() {
        let (mut sm, mut receivers) = setup();
        for _ in 0..3 {
            let psi = sm
                .send_establishment_request(&SessionConfig::default())
                .await
                .unwrap();
            // each accept frees its PTI, so the lowest free PTI is always 1
            sm.receive_establishment_accept(accept(psi, 1)).await.unwrap();
        }
        assert_eq!(sm.session_count(), 3);

        sm.local_release_all_sessions().await;

        // every slot has id == 0
        for psi in PSI_MIN..=PSI_MAX {
            assert_eq!(sm.session(psi).unwrap().id, 0);
        }

        // three establishment updates followed by three release updates
        let mut releases = 0;
        while let Ok(TaskMessage::Message(msg)) = receivers.app_rx.try_recv() {
            if matches!(
                msg,
                AppMessage::StatusUpdate(UeStatusUpdate::SessionRelease { .. })
            ) {
                releases += 1;
            }
        }
        assert_eq!(releases, 3);
    }

    #[tokio::test]
    async fn test_non_ipv4_request_rejected() {
        let (mut sm, _receivers) = setup();
        let config = SessionConfig {
            session_type: PduSessionType::Ipv6,
            apn: None,
            s_nssai: None,
        };
        assert!(sm.send_establishment_request(&config).await.is_err());
        assert_eq!(sm.session_count(), 0);
    }
}
