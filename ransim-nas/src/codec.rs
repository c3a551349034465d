//! NAS message codec
//!
//! Deterministic byte encoding for the modelled 5GMM/5GSM messages.
//! Round trips are exact: a PDU decoded and re-encoded reproduces the
//! original bytes, which the NAS transport chain relies on.

use std::net::Ipv4Addr;

use ransim_common::{Guami, Guti, OctetString, OctetView, OutOfData, PduSessionType, Plmn, Tai};
use thiserror::Error;

use crate::enums::wire::{mm_cause_from_wire, mm_cause_to_wire, sm_cause_from_wire, sm_cause_to_wire};
use crate::enums::{
    DeRegistrationAccessType, FollowOnRequest, ReRegistrationRequired, RegistrationType, SwitchOff,
};
use crate::messages::mm::{
    DeRegistrationType, DeregistrationAcceptUeOriginating, DeregistrationAcceptUeTerminated,
    DeregistrationRequestUeOriginating, DeregistrationRequestUeTerminated, MobileIdentity,
    RegistrationAccept, RegistrationReject, RegistrationRequest,
};
use crate::messages::sm::{
    PduSessionEstablishmentAccept, PduSessionEstablishmentReject, PduSessionEstablishmentRequest,
};
use crate::security::NasKeySetIdentifier;

/// Extended protocol discriminator for 5GMM messages.
pub const EPD_5GMM: u8 = 0x7e;
/// Extended protocol discriminator for 5GSM messages.
pub const EPD_5GSM: u8 = 0x2e;

// 5GMM message types (TS 24.501 Table 9.7.1)
const MT_REGISTRATION_REQUEST: u8 = 0x41;
const MT_REGISTRATION_ACCEPT: u8 = 0x42;
const MT_REGISTRATION_REJECT: u8 = 0x44;
const MT_DEREG_REQUEST_UE_ORIG: u8 = 0x45;
const MT_DEREG_ACCEPT_UE_ORIG: u8 = 0x46;
const MT_DEREG_REQUEST_UE_TERM: u8 = 0x47;
const MT_DEREG_ACCEPT_UE_TERM: u8 = 0x48;

// 5GSM message types (TS 24.501 Table 9.7.2)
const MT_PDU_SESSION_ESTABLISHMENT_REQUEST: u8 = 0xc1;
const MT_PDU_SESSION_ESTABLISHMENT_ACCEPT: u8 = 0xc2;
const MT_PDU_SESSION_ESTABLISHMENT_REJECT: u8 = 0xc3;

/// Error type for the NAS codec.
#[derive(Debug, Error)]
pub enum NasCodecError {
    /// The buffer ended before the message was complete.
    #[error("truncated NAS message")]
    Truncated,

    /// Unknown discriminator, message type or malformed field.
    #[error("malformed NAS message: {0}")]
    Malformed(String),
}

impl From<OutOfData> for NasCodecError {
    fn from(_: OutOfData) -> Self {
        NasCodecError::Truncated
    }
}

/// A decoded NAS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasMessage {
    /// Registration Request
    RegistrationRequest(RegistrationRequest),
    /// Registration Accept
    RegistrationAccept(RegistrationAccept),
    /// Registration Reject
    RegistrationReject(RegistrationReject),
    /// De-registration Request (UE originating)
    DeregistrationRequestUeOriginating(DeregistrationRequestUeOriginating),
    /// De-registration Accept (UE originating)
    DeregistrationAcceptUeOriginating(DeregistrationAcceptUeOriginating),
    /// De-registration Request (UE terminated)
    DeregistrationRequestUeTerminated(DeregistrationRequestUeTerminated),
    /// De-registration Accept (UE terminated)
    DeregistrationAcceptUeTerminated(DeregistrationAcceptUeTerminated),
    /// PDU Session Establishment Request
    PduSessionEstablishmentRequest(PduSessionEstablishmentRequest),
    /// PDU Session Establishment Accept
    PduSessionEstablishmentAccept(PduSessionEstablishmentAccept),
    /// PDU Session Establishment Reject
    PduSessionEstablishmentReject(PduSessionEstablishmentReject),
}

// ---------------------------------------------------------------------------
// field helpers
// ---------------------------------------------------------------------------

fn write_ksi(out: &mut OctetString, ksi: &NasKeySetIdentifier) {
    out.append_octet((u8::from(ksi.is_mapped) << 3) | (ksi.ksi & 0x07));
}

fn read_ksi(view: &mut OctetView) -> Result<NasKeySetIdentifier, NasCodecError> {
    let b = view.read_u8()?;
    Ok(NasKeySetIdentifier {
        ksi: b & 0x07,
        is_mapped: b & 0x08 != 0,
    })
}

fn write_identity(out: &mut OctetString, identity: &MobileIdentity) {
    match identity {
        MobileIdentity::NoIdentity => out.append_octet(0),
        MobileIdentity::Suci { supi } => {
            out.append_octet(1);
            out.append_octet2(supi.len() as u16);
            out.append_slice(supi.as_bytes());
        }
        MobileIdentity::Guti(guti) => {
            out.append_octet(2);
            write_guti(out, guti);
        }
    }
}

fn read_identity(view: &mut OctetView) -> Result<MobileIdentity, NasCodecError> {
    match view.read_u8()? {
        0 => Ok(MobileIdentity::NoIdentity),
        1 => Ok(MobileIdentity::Suci {
            supi: view.read_var_string()?,
        }),
        2 => Ok(MobileIdentity::Guti(read_guti(view)?)),
        other => Err(NasCodecError::Malformed(format!(
            "unknown mobile identity tag {other}"
        ))),
    }
}

fn write_guti(out: &mut OctetString, guti: &Guti) {
    out.append_slice(&guti.guami.plmn.encode());
    out.append_octet(guti.guami.amf_region_id);
    out.append_octet2(guti.guami.amf_set_id);
    out.append_octet(guti.guami.amf_pointer);
    out.append_octet4(guti.tmsi);
}

fn read_guti(view: &mut OctetView) -> Result<Guti, NasCodecError> {
    let plmn_bytes = view.read_bytes(3)?;
    let plmn = Plmn::decode([plmn_bytes[0], plmn_bytes[1], plmn_bytes[2]]);
    let amf_region_id = view.read_u8()?;
    let amf_set_id = view.read_u16()?;
    let amf_pointer = view.read_u8()?;
    let tmsi = view.read_u32()?;
    Ok(Guti {
        guami: Guami {
            plmn,
            amf_region_id,
            amf_set_id,
            amf_pointer,
        },
        tmsi,
    })
}

fn write_dereg_type(out: &mut OctetString, dereg: &DeRegistrationType) {
    let access = match dereg.access_type {
        DeRegistrationAccessType::ThreeGppAccess => 1u8,
        DeRegistrationAccessType::NonThreeGppAccess => 2,
        DeRegistrationAccessType::ThreeGppAndNonThreeGppAccess => 3,
    };
    let rereg = u8::from(dereg.re_registration_required == ReRegistrationRequired::Required);
    let switch_off = u8::from(dereg.switch_off == SwitchOff::SwitchOff);
    out.append_octet((switch_off << 3) | (rereg << 2) | access);
}

fn read_dereg_type(view: &mut OctetView) -> Result<DeRegistrationType, NasCodecError> {
    let b = view.read_u8()?;
    let access_type = match b & 0x03 {
        1 => DeRegistrationAccessType::ThreeGppAccess,
        2 => DeRegistrationAccessType::NonThreeGppAccess,
        3 => DeRegistrationAccessType::ThreeGppAndNonThreeGppAccess,
        other => {
            return Err(NasCodecError::Malformed(format!(
                "invalid de-registration access type {other}"
            )))
        }
    };
    let re_registration_required = if b & 0x04 != 0 {
        ReRegistrationRequired::Required
    } else {
        ReRegistrationRequired::NotRequired
    };
    let switch_off = if b & 0x08 != 0 {
        SwitchOff::SwitchOff
    } else {
        SwitchOff::NormalDeRegistration
    };
    Ok(DeRegistrationType {
        access_type,
        re_registration_required,
        switch_off,
    })
}

fn session_type_to_wire(st: PduSessionType) -> u8 {
    match st {
        PduSessionType::Ipv4 => 1,
        PduSessionType::Ipv6 => 2,
        PduSessionType::Ipv4v6 => 3,
    }
}

fn session_type_from_wire(value: u8) -> Result<PduSessionType, NasCodecError> {
    match value {
        1 => Ok(PduSessionType::Ipv4),
        2 => Ok(PduSessionType::Ipv6),
        3 => Ok(PduSessionType::Ipv4v6),
        other => Err(NasCodecError::Malformed(format!(
            "invalid PDU session type {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// entry points
// ---------------------------------------------------------------------------

/// Encodes a NAS message to its wire form.
pub fn encode_nas_message(message: &NasMessage) -> Vec<u8> {
    let mut out = OctetString::new();
    match message {
        NasMessage::RegistrationRequest(m) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_REGISTRATION_REQUEST);
            let reg_type = match m.registration_type {
                RegistrationType::InitialRegistration => 1u8,
                RegistrationType::MobilityRegistrationUpdating => 2,
                RegistrationType::PeriodicRegistrationUpdating => 3,
                RegistrationType::EmergencyRegistration => 4,
            };
            let for_bit = u8::from(m.follow_on_request == FollowOnRequest::ForPending);
            out.append_octet((for_bit << 3) | reg_type);
            write_ksi(&mut out, &m.ng_ksi);
            write_identity(&mut out, &m.mobile_identity);
        }
        NasMessage::RegistrationAccept(m) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_REGISTRATION_ACCEPT);
            match &m.guti {
                Some(guti) => {
                    out.append_octet(1);
                    write_guti(&mut out, guti);
                }
                None => out.append_octet(0),
            }
            out.append_octet(m.tai_list.len() as u8);
            for tai in &m.tai_list {
                out.append_slice(&tai.plmn.encode());
                out.append_octet4(tai.tac);
            }
            match m.t3512_secs {
                Some(secs) => {
                    out.append_octet(1);
                    out.append_octet4(secs);
                }
                None => out.append_octet(0),
            }
        }
        NasMessage::RegistrationReject(m) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_REGISTRATION_REJECT);
            out.append_octet(mm_cause_to_wire(m.mm_cause));
        }
        NasMessage::DeregistrationRequestUeOriginating(m) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_DEREG_REQUEST_UE_ORIG);
            write_dereg_type(&mut out, &m.deregistration_type);
            write_ksi(&mut out, &m.ng_ksi);
            write_identity(&mut out, &m.mobile_identity);
        }
        NasMessage::DeregistrationAcceptUeOriginating(_) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_DEREG_ACCEPT_UE_ORIG);
        }
        NasMessage::DeregistrationRequestUeTerminated(m) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_DEREG_REQUEST_UE_TERM);
            write_dereg_type(&mut out, &m.deregistration_type);
            match m.mm_cause {
                Some(cause) => {
                    out.append_octet(1);
                    out.append_octet(mm_cause_to_wire(cause));
                }
                None => out.append_octet(0),
            }
        }
        NasMessage::DeregistrationAcceptUeTerminated(_) => {
            out.append_octet(EPD_5GMM);
            out.append_octet(MT_DEREG_ACCEPT_UE_TERM);
        }
        NasMessage::PduSessionEstablishmentRequest(m) => {
            out.append_octet(EPD_5GSM);
            out.append_octet(m.psi);
            out.append_octet(m.pti);
            out.append_octet(MT_PDU_SESSION_ESTABLISHMENT_REQUEST);
            out.append_octet(session_type_to_wire(m.session_type));
            match &m.apn {
                Some(apn) => {
                    out.append_octet(1);
                    out.append_octet2(apn.len() as u16);
                    out.append_slice(apn.as_bytes());
                }
                None => out.append_octet(0),
            }
        }
        NasMessage::PduSessionEstablishmentAccept(m) => {
            out.append_octet(EPD_5GSM);
            out.append_octet(m.psi);
            out.append_octet(m.pti);
            out.append_octet(MT_PDU_SESSION_ESTABLISHMENT_ACCEPT);
            out.append_octet(session_type_to_wire(m.session_type));
            out.append_slice(&m.pdu_address.octets());
            out.append_octet2(m.qos_rules.len() as u16);
            out.append_slice(&m.qos_rules);
        }
        NasMessage::PduSessionEstablishmentReject(m) => {
            out.append_octet(EPD_5GSM);
            out.append_octet(m.psi);
            out.append_octet(m.pti);
            out.append_octet(MT_PDU_SESSION_ESTABLISHMENT_REJECT);
            out.append_octet(sm_cause_to_wire(m.sm_cause));
        }
    }
    out.into_vec()
}

/// Decodes a NAS message from its wire form.
pub fn decode_nas_message(bytes: &[u8]) -> Result<NasMessage, NasCodecError> {
    let mut view = OctetView::new(bytes);
    match view.read_u8()? {
        EPD_5GMM => decode_mm(&mut view),
        EPD_5GSM => decode_sm(&mut view),
        other => Err(NasCodecError::Malformed(format!(
            "unknown extended protocol discriminator 0x{other:02x}"
        ))),
    }
}

fn decode_mm(view: &mut OctetView) -> Result<NasMessage, NasCodecError> {
    match view.read_u8()? {
        MT_REGISTRATION_REQUEST => {
            let b = view.read_u8()?;
            let registration_type = match b & 0x07 {
                1 => RegistrationType::InitialRegistration,
                2 => RegistrationType::MobilityRegistrationUpdating,
                3 => RegistrationType::PeriodicRegistrationUpdating,
                4 => RegistrationType::EmergencyRegistration,
                other => {
                    return Err(NasCodecError::Malformed(format!(
                        "invalid registration type {other}"
                    )))
                }
            };
            let follow_on_request = if b & 0x08 != 0 {
                FollowOnRequest::ForPending
            } else {
                FollowOnRequest::NoForPending
            };
            let ng_ksi = read_ksi(view)?;
            let mobile_identity = read_identity(view)?;
            Ok(NasMessage::RegistrationRequest(RegistrationRequest {
                registration_type,
                follow_on_request,
                ng_ksi,
                mobile_identity,
            }))
        }
        MT_REGISTRATION_ACCEPT => {
            let guti = if view.read_u8()? != 0 {
                Some(read_guti(view)?)
            } else {
                None
            };
            let count = view.read_u8()?;
            let mut tai_list = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let plmn_bytes = view.read_bytes(3)?;
                let plmn = Plmn::decode([plmn_bytes[0], plmn_bytes[1], plmn_bytes[2]]);
                let tac = view.read_u32()?;
                tai_list.push(Tai { plmn, tac });
            }
            let t3512_secs = if view.read_u8()? != 0 {
                Some(view.read_u32()?)
            } else {
                None
            };
            Ok(NasMessage::RegistrationAccept(RegistrationAccept {
                guti,
                tai_list,
                t3512_secs,
            }))
        }
        MT_REGISTRATION_REJECT => Ok(NasMessage::RegistrationReject(RegistrationReject {
            mm_cause: mm_cause_from_wire(view.read_u8()?)?,
        })),
        MT_DEREG_REQUEST_UE_ORIG => {
            let deregistration_type = read_dereg_type(view)?;
            let ng_ksi = read_ksi(view)?;
            let mobile_identity = read_identity(view)?;
            Ok(NasMessage::DeregistrationRequestUeOriginating(
                DeregistrationRequestUeOriginating {
                    deregistration_type,
                    ng_ksi,
                    mobile_identity,
                },
            ))
        }
        MT_DEREG_ACCEPT_UE_ORIG => Ok(NasMessage::DeregistrationAcceptUeOriginating(
            DeregistrationAcceptUeOriginating,
        )),
        MT_DEREG_REQUEST_UE_TERM => {
            let deregistration_type = read_dereg_type(view)?;
            let mm_cause = if view.read_u8()? != 0 {
                Some(mm_cause_from_wire(view.read_u8()?)?)
            } else {
                None
            };
            Ok(NasMessage::DeregistrationRequestUeTerminated(
                DeregistrationRequestUeTerminated {
                    deregistration_type,
                    mm_cause,
                },
            ))
        }
        MT_DEREG_ACCEPT_UE_TERM => Ok(NasMessage::DeregistrationAcceptUeTerminated(
            DeregistrationAcceptUeTerminated,
        )),
        other => Err(NasCodecError::Malformed(format!(
            "unknown 5GMM message type 0x{other:02x}"
        ))),
    }
}

fn decode_sm(view: &mut OctetView) -> Result<NasMessage, NasCodecError> {
    let psi = view.read_u8()?;
    let pti = view.read_u8()?;
    match view.read_u8()? {
        MT_PDU_SESSION_ESTABLISHMENT_REQUEST => {
            let session_type = session_type_from_wire(view.read_u8()?)?;
            let apn = if view.read_u8()? != 0 {
                Some(view.read_var_string()?)
            } else {
                None
            };
            Ok(NasMessage::PduSessionEstablishmentRequest(
                PduSessionEstablishmentRequest {
                    psi,
                    pti,
                    session_type,
                    apn,
                },
            ))
        }
        MT_PDU_SESSION_ESTABLISHMENT_ACCEPT => {
            let session_type = session_type_from_wire(view.read_u8()?)?;
            let addr = view.read_bytes(4)?;
            let pdu_address = Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]);
            let qos_rules = view.read_var_bytes()?;
            Ok(NasMessage::PduSessionEstablishmentAccept(
                PduSessionEstablishmentAccept {
                    psi,
                    pti,
                    session_type,
                    pdu_address,
                    qos_rules,
                },
            ))
        }
        MT_PDU_SESSION_ESTABLISHMENT_REJECT => Ok(NasMessage::PduSessionEstablishmentReject(
            PduSessionEstablishmentReject {
                psi,
                pti,
                sm_cause: sm_cause_from_wire(view.read_u8()?)?,
            },
        )),
        other => Err(NasCodecError::Malformed(format!(
            "unknown 5GSM message type 0x{other:02x}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::SmCause;

    fn round_trip(message: NasMessage) {
        let bytes = encode_nas_message(&message);
        let decoded = decode_nas_message(&bytes).unwrap();
        assert_eq!(decoded, message);
        // byte-identical re-encode
        assert_eq!(encode_nas_message(&decoded), bytes);
    }

    #[test]
    fn test_registration_request_round_trip() {
        round_trip(NasMessage::RegistrationRequest(RegistrationRequest {
            registration_type: RegistrationType::InitialRegistration,
            follow_on_request: FollowOnRequest::ForPending,
            ng_ksi: NasKeySetIdentifier::no_key(),
            mobile_identity: MobileIdentity::Suci {
                supi: "imsi-901700000000001".to_string(),
            },
        }));
    }

    #[test]
    fn test_registration_accept_round_trip() {
        round_trip(NasMessage::RegistrationAccept(RegistrationAccept {
            guti: Some(Guti {
                guami: Guami {
                    plmn: Plmn::new(901, 70, false),
                    amf_region_id: 1,
                    amf_set_id: 1,
                    amf_pointer: 0,
                },
                tmsi: 0x1234_5678,
            }),
            tai_list: vec![Tai::new(Plmn::new(901, 70, false), 1)],
            t3512_secs: Some(54 * 60),
        }));
    }

    #[test]
    fn test_deregistration_request_round_trip() {
        round_trip(NasMessage::DeregistrationRequestUeOriginating(
            DeregistrationRequestUeOriginating::new(
                DeRegistrationType::new(
                    DeRegistrationAccessType::ThreeGppAccess,
                    ReRegistrationRequired::NotRequired,
                    SwitchOff::SwitchOff,
                ),
                NasKeySetIdentifier::no_key(),
                MobileIdentity::no_identity(),
            ),
        ));
    }

    #[test]
    fn test_sm_messages_round_trip() {
        round_trip(NasMessage::PduSessionEstablishmentRequest(
            PduSessionEstablishmentRequest {
                psi: 1,
                pti: 1,
                session_type: PduSessionType::Ipv4,
                apn: Some("internet".to_string()),
            },
        ));
        round_trip(NasMessage::PduSessionEstablishmentAccept(
            PduSessionEstablishmentAccept {
                psi: 1,
                pti: 1,
                session_type: PduSessionType::Ipv4,
                pdu_address: Ipv4Addr::new(10, 45, 0, 2),
                qos_rules: vec![0x01, 0x02],
            },
        ));
        round_trip(NasMessage::PduSessionEstablishmentReject(
            PduSessionEstablishmentReject {
                psi: 2,
                pti: 3,
                sm_cause: SmCause::InsufficientResources,
            },
        ));
    }

    #[test]
    fn test_unknown_epd_rejected() {
        assert!(decode_nas_message(&[0x55, 0x41]).is_err());
    }

    #[test]
    fn test_truncated_message_rejected() {
        let bytes = encode_nas_message(&NasMessage::RegistrationReject(RegistrationReject {
            mm_cause: crate::enums::MmCause::PlmnNotAllowed,
        }));
        assert!(matches!(
            decode_nas_message(&bytes[..bytes.len() - 1]),
            Err(NasCodecError::Truncated)
        ));
    }
}
