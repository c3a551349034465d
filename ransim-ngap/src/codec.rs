//! NGAP PDU codec
//!
//! Encoding always runs the constraint check first: a PDU that fails
//! validation produces no bytes. The byte layout is the simulator's
//! deterministic wire profile; the call surface mirrors what an APER
//! codec would expose.

use ransim_common::{OctetString, OctetView, OutOfData};
use thiserror::Error;

use crate::procedures::configuration_update::{
    AmfConfigurationUpdate, AmfConfigurationUpdateAcknowledge, AmfConfigurationUpdateFailure,
};
use crate::procedures::error_indication::ErrorIndication;
use crate::procedures::nas_transport::{
    DownlinkNasTransport, InitialUeMessage, UplinkNasTransport,
};
use crate::procedures::ng_setup::{NgSetupFailure, NgSetupRequest, NgSetupResponse};
use crate::procedures::overload::{OverloadStart, OverloadStop};
use crate::procedures::paging::Paging;
use crate::procedures::path_switch::PathSwitchRequest;
use crate::procedures::ue_context_release::{UeContextReleaseCommand, UeContextReleaseComplete};

/// Error type for the NGAP codec.
#[derive(Debug, Error)]
pub enum NgapCodecError {
    /// The PDU failed ASN constraint validation; nothing was encoded.
    #[error("constraint check failed: {0}")]
    Constraint(#[from] ConstraintViolation),

    /// The buffer ended before the PDU was complete.
    #[error("truncated PDU")]
    Truncated,

    /// Unknown message tag or malformed field content.
    #[error("malformed PDU: {0}")]
    Malformed(String),
}

impl From<OutOfData> for NgapCodecError {
    fn from(_: OutOfData) -> Self {
        NgapCodecError::Truncated
    }
}

/// A single constraint violation found during PDU validation.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConstraintViolation(String);

impl ConstraintViolation {
    pub(crate) fn new(message: String) -> Self {
        Self(message)
    }
}

/// An NGAP PDU as an owned message tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NgapPdu {
    /// NG Setup Request (gNB -> AMF)
    NgSetupRequest(NgSetupRequest),
    /// NG Setup Response (AMF -> gNB)
    NgSetupResponse(NgSetupResponse),
    /// NG Setup Failure (AMF -> gNB)
    NgSetupFailure(NgSetupFailure),
    /// Initial UE Message (gNB -> AMF)
    InitialUeMessage(InitialUeMessage),
    /// Uplink NAS Transport (gNB -> AMF)
    UplinkNasTransport(UplinkNasTransport),
    /// Downlink NAS Transport (AMF -> gNB)
    DownlinkNasTransport(DownlinkNasTransport),
    /// AMF Configuration Update (AMF -> gNB)
    AmfConfigurationUpdate(AmfConfigurationUpdate),
    /// AMF Configuration Update Acknowledge (gNB -> AMF)
    AmfConfigurationUpdateAcknowledge(AmfConfigurationUpdateAcknowledge),
    /// AMF Configuration Update Failure (gNB -> AMF)
    AmfConfigurationUpdateFailure(AmfConfigurationUpdateFailure),
    /// Overload Start (AMF -> gNB)
    OverloadStart(OverloadStart),
    /// Overload Stop (AMF -> gNB)
    OverloadStop(OverloadStop),
    /// Error Indication (both directions)
    ErrorIndication(ErrorIndication),
    /// Path Switch Request (gNB -> AMF)
    PathSwitchRequest(PathSwitchRequest),
    /// UE Context Release Command (AMF -> gNB)
    UeContextReleaseCommand(UeContextReleaseCommand),
    /// UE Context Release Complete (gNB -> AMF)
    UeContextReleaseComplete(UeContextReleaseComplete),
    /// Paging (AMF -> gNB)
    Paging(Paging),
}

// Message type tags on the wire.
const TAG_NG_SETUP_REQUEST: u8 = 0x01;
const TAG_NG_SETUP_RESPONSE: u8 = 0x02;
const TAG_NG_SETUP_FAILURE: u8 = 0x03;
const TAG_INITIAL_UE_MESSAGE: u8 = 0x04;
const TAG_UPLINK_NAS_TRANSPORT: u8 = 0x05;
const TAG_DOWNLINK_NAS_TRANSPORT: u8 = 0x06;
const TAG_AMF_CONFIGURATION_UPDATE: u8 = 0x07;
const TAG_AMF_CONFIGURATION_UPDATE_ACK: u8 = 0x08;
const TAG_AMF_CONFIGURATION_UPDATE_FAILURE: u8 = 0x09;
const TAG_OVERLOAD_START: u8 = 0x0a;
const TAG_OVERLOAD_STOP: u8 = 0x0b;
const TAG_ERROR_INDICATION: u8 = 0x0c;
const TAG_PATH_SWITCH_REQUEST: u8 = 0x0d;
const TAG_UE_CONTEXT_RELEASE_COMMAND: u8 = 0x0e;
const TAG_UE_CONTEXT_RELEASE_COMPLETE: u8 = 0x0f;
const TAG_PAGING: u8 = 0x10;

/// Validates a PDU against its field constraints.
///
/// Mirrors `asn_check_constraints`: every outgoing PDU must pass this
/// before any bytes are produced.
pub fn check_constraints(pdu: &NgapPdu) -> Result<(), ConstraintViolation> {
    match pdu {
        NgapPdu::NgSetupRequest(m) => m.validate(),
        NgapPdu::NgSetupResponse(m) => m.validate(),
        NgapPdu::NgSetupFailure(m) => m.validate(),
        NgapPdu::InitialUeMessage(m) => m.validate(),
        NgapPdu::UplinkNasTransport(m) => m.validate(),
        NgapPdu::DownlinkNasTransport(m) => m.validate(),
        NgapPdu::AmfConfigurationUpdate(m) => m.validate(),
        NgapPdu::AmfConfigurationUpdateAcknowledge(m) => m.validate(),
        NgapPdu::AmfConfigurationUpdateFailure(m) => m.validate(),
        NgapPdu::OverloadStart(m) => m.validate(),
        NgapPdu::OverloadStop(m) => m.validate(),
        NgapPdu::ErrorIndication(m) => m.validate(),
        NgapPdu::PathSwitchRequest(m) => m.validate(),
        NgapPdu::UeContextReleaseCommand(m) => m.validate(),
        NgapPdu::UeContextReleaseComplete(m) => m.validate(),
        NgapPdu::Paging(m) => m.validate(),
    }
}

/// Encodes a PDU to its wire form.
///
/// Runs [`check_constraints`] first; a failing PDU yields an error and no
/// bytes.
pub fn encode_ngap_pdu(pdu: &NgapPdu) -> Result<Vec<u8>, NgapCodecError> {
    check_constraints(pdu)?;

    let mut out = OctetString::new();
    match pdu {
        NgapPdu::NgSetupRequest(m) => {
            out.append_octet(TAG_NG_SETUP_REQUEST);
            m.write(&mut out);
        }
        NgapPdu::NgSetupResponse(m) => {
            out.append_octet(TAG_NG_SETUP_RESPONSE);
            m.write(&mut out);
        }
        NgapPdu::NgSetupFailure(m) => {
            out.append_octet(TAG_NG_SETUP_FAILURE);
            m.write(&mut out);
        }
        NgapPdu::InitialUeMessage(m) => {
            out.append_octet(TAG_INITIAL_UE_MESSAGE);
            m.write(&mut out);
        }
        NgapPdu::UplinkNasTransport(m) => {
            out.append_octet(TAG_UPLINK_NAS_TRANSPORT);
            m.write(&mut out);
        }
        NgapPdu::DownlinkNasTransport(m) => {
            out.append_octet(TAG_DOWNLINK_NAS_TRANSPORT);
            m.write(&mut out);
        }
        NgapPdu::AmfConfigurationUpdate(m) => {
            out.append_octet(TAG_AMF_CONFIGURATION_UPDATE);
            m.write(&mut out);
        }
        NgapPdu::AmfConfigurationUpdateAcknowledge(m) => {
            out.append_octet(TAG_AMF_CONFIGURATION_UPDATE_ACK);
            m.write(&mut out);
        }
        NgapPdu::AmfConfigurationUpdateFailure(m) => {
            out.append_octet(TAG_AMF_CONFIGURATION_UPDATE_FAILURE);
            m.write(&mut out);
        }
        NgapPdu::OverloadStart(m) => {
            out.append_octet(TAG_OVERLOAD_START);
            m.write(&mut out);
        }
        NgapPdu::OverloadStop(m) => {
            out.append_octet(TAG_OVERLOAD_STOP);
            m.write(&mut out);
        }
        NgapPdu::ErrorIndication(m) => {
            out.append_octet(TAG_ERROR_INDICATION);
            m.write(&mut out);
        }
        NgapPdu::PathSwitchRequest(m) => {
            out.append_octet(TAG_PATH_SWITCH_REQUEST);
            m.write(&mut out);
        }
        NgapPdu::UeContextReleaseCommand(m) => {
            out.append_octet(TAG_UE_CONTEXT_RELEASE_COMMAND);
            m.write(&mut out);
        }
        NgapPdu::UeContextReleaseComplete(m) => {
            out.append_octet(TAG_UE_CONTEXT_RELEASE_COMPLETE);
            m.write(&mut out);
        }
        NgapPdu::Paging(m) => {
            out.append_octet(TAG_PAGING);
            m.write(&mut out);
        }
    }
    Ok(out.into_vec())
}

/// Decodes a PDU from its wire form.
pub fn decode_ngap_pdu(bytes: &[u8]) -> Result<NgapPdu, NgapCodecError> {
    let mut view = OctetView::new(bytes);
    let tag = view.read_u8()?;

    let pdu = match tag {
        TAG_NG_SETUP_REQUEST => NgapPdu::NgSetupRequest(NgSetupRequest::read(&mut view)?),
        TAG_NG_SETUP_RESPONSE => NgapPdu::NgSetupResponse(NgSetupResponse::read(&mut view)?),
        TAG_NG_SETUP_FAILURE => NgapPdu::NgSetupFailure(NgSetupFailure::read(&mut view)?),
        TAG_INITIAL_UE_MESSAGE => NgapPdu::InitialUeMessage(InitialUeMessage::read(&mut view)?),
        TAG_UPLINK_NAS_TRANSPORT => {
            NgapPdu::UplinkNasTransport(UplinkNasTransport::read(&mut view)?)
        }
        TAG_DOWNLINK_NAS_TRANSPORT => {
            NgapPdu::DownlinkNasTransport(DownlinkNasTransport::read(&mut view)?)
        }
        TAG_AMF_CONFIGURATION_UPDATE => {
            NgapPdu::AmfConfigurationUpdate(AmfConfigurationUpdate::read(&mut view)?)
        }
        TAG_AMF_CONFIGURATION_UPDATE_ACK => NgapPdu::AmfConfigurationUpdateAcknowledge(
            AmfConfigurationUpdateAcknowledge::read(&mut view)?,
        ),
        TAG_AMF_CONFIGURATION_UPDATE_FAILURE => NgapPdu::AmfConfigurationUpdateFailure(
            AmfConfigurationUpdateFailure::read(&mut view)?,
        ),
        TAG_OVERLOAD_START => NgapPdu::OverloadStart(OverloadStart::read(&mut view)?),
        TAG_OVERLOAD_STOP => NgapPdu::OverloadStop(OverloadStop::read(&mut view)?),
        TAG_ERROR_INDICATION => NgapPdu::ErrorIndication(ErrorIndication::read(&mut view)?),
        TAG_PATH_SWITCH_REQUEST => NgapPdu::PathSwitchRequest(PathSwitchRequest::read(&mut view)?),
        TAG_UE_CONTEXT_RELEASE_COMMAND => {
            NgapPdu::UeContextReleaseCommand(UeContextReleaseCommand::read(&mut view)?)
        }
        TAG_UE_CONTEXT_RELEASE_COMPLETE => {
            NgapPdu::UeContextReleaseComplete(UeContextReleaseComplete::read(&mut view)?)
        }
        TAG_PAGING => NgapPdu::Paging(Paging::read(&mut view)?),
        other => {
            return Err(NgapCodecError::Malformed(format!(
                "unknown NGAP message tag 0x{other:02x}"
            )))
        }
    };

    Ok(pdu)
}

/// Renders a PDU as indented text for node listeners.
pub fn render_ngap_pdu(pdu: &NgapPdu) -> String {
    format!("{pdu:#?}")
}
