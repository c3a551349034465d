//! 5GSM messages
//!
//! PDU session establishment message subset (3GPP TS 24.501 Section
//! 8.3.1-8.3.3). Every 5GSM message carries its PSI and PTI in the
//! header.

use std::net::Ipv4Addr;

use ransim_common::PduSessionType;

use crate::enums::SmCause;

/// PDU Session Establishment Request (UE -> network).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentRequest {
    /// PDU session identity (1..=15)
    pub psi: u8,
    /// Procedure transaction identity (1..=254)
    pub pti: u8,
    /// Requested session type
    pub session_type: PduSessionType,
    /// Requested DNN/APN
    pub apn: Option<String>,
}

/// PDU Session Establishment Accept (network -> UE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentAccept {
    /// PDU session identity (1..=15)
    pub psi: u8,
    /// Procedure transaction identity (1..=254)
    pub pti: u8,
    /// Selected session type
    pub session_type: PduSessionType,
    /// Allocated PDU address
    pub pdu_address: Ipv4Addr,
    /// Authorized QoS rules, opaque digest
    pub qos_rules: Vec<u8>,
}

/// PDU Session Establishment Reject (network -> UE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentReject {
    /// PDU session identity (1..=15)
    pub psi: u8,
    /// Procedure transaction identity (1..=254)
    pub pti: u8,
    /// Reject cause
    pub sm_cause: SmCause,
}
