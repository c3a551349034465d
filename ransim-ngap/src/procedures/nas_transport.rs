//! NAS transport procedures
//!
//! Initial UE Message, Uplink NAS Transport and Downlink NAS Transport
//! (3GPP TS 38.413 Section 8.6). These carry NAS PDUs opaquely between
//! the UE's NAS layer and the AMF.

use ransim_common::{OctetString, OctetView};

use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::ies::{write_bytes, FiveGSTmsi, UserLocationInfoNr};

/// Maximum AMF UE NGAP ID value (40-bit).
pub const AMF_UE_NGAP_ID_MAX: i64 = (1 << 40) - 1;
/// Maximum RAN UE NGAP ID value (32-bit).
pub const RAN_UE_NGAP_ID_MAX: i64 = u32::MAX as i64;

pub(crate) fn validate_amf_ue_ngap_id(id: i64) -> Result<(), ConstraintViolation> {
    if !(0..=AMF_UE_NGAP_ID_MAX).contains(&id) {
        return Err(ConstraintViolation::new(format!(
            "AMF-UE-NGAP-ID {id} outside 0..=2^40-1"
        )));
    }
    Ok(())
}

pub(crate) fn validate_ran_ue_ngap_id(id: i64) -> Result<(), ConstraintViolation> {
    if !(0..=RAN_UE_NGAP_ID_MAX).contains(&id) {
        return Err(ConstraintViolation::new(format!(
            "RAN-UE-NGAP-ID {id} outside 0..=2^32-1"
        )));
    }
    Ok(())
}

/// RRC establishment cause carried in Initial UE Message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcEstablishmentCause {
    /// Emergency call
    Emergency,
    /// High priority access
    HighPriorityAccess,
    /// Mobile-terminated access
    MtAccess,
    /// Mobile-originated signalling
    MoSignalling,
    /// Mobile-originated data
    MoData,
    /// Mobile-originated voice call
    MoVoiceCall,
}

impl RrcEstablishmentCause {
    fn to_wire(self) -> u8 {
        self as u8
    }

    fn from_wire(value: u8) -> Result<Self, NgapCodecError> {
        match value {
            0 => Ok(RrcEstablishmentCause::Emergency),
            1 => Ok(RrcEstablishmentCause::HighPriorityAccess),
            2 => Ok(RrcEstablishmentCause::MtAccess),
            3 => Ok(RrcEstablishmentCause::MoSignalling),
            4 => Ok(RrcEstablishmentCause::MoData),
            5 => Ok(RrcEstablishmentCause::MoVoiceCall),
            other => Err(NgapCodecError::Malformed(format!(
                "invalid RRCEstablishmentCause {other}"
            ))),
        }
    }
}

/// Initial UE Message: the first uplink NAS PDU for a UE.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialUeMessage {
    /// RAN UE NGAP ID allocated by the gNB
    pub ran_ue_ngap_id: i64,
    /// Encoded NAS PDU
    pub nas_pdu: Vec<u8>,
    /// User location information
    pub user_location: UserLocationInfoNr,
    /// RRC establishment cause
    pub rrc_establishment_cause: RrcEstablishmentCause,
    /// 5G-S-TMSI, when the UE provided one
    pub five_g_s_tmsi: Option<FiveGSTmsi>,
}

impl InitialUeMessage {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        validate_ran_ue_ngap_id(self.ran_ue_ngap_id)?;
        if self.nas_pdu.is_empty() {
            return Err(ConstraintViolation::new(
                "InitialUEMessage: empty NAS-PDU".to_string(),
            ));
        }
        self.user_location.validate()?;
        if let Some(ref tmsi) = self.five_g_s_tmsi {
            tmsi.validate()?;
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_octet8(self.ran_ue_ngap_id as u64);
        write_bytes(out, &self.nas_pdu);
        self.user_location.write(out);
        out.append_octet(self.rrc_establishment_cause.to_wire());
        match self.five_g_s_tmsi {
            Some(tmsi) => {
                out.append_octet(1);
                out.append_octet2(tmsi.amf_set_id);
                out.append_octet(tmsi.amf_pointer);
                out.append_octet4(tmsi.tmsi);
            }
            None => out.append_octet(0),
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let ran_ue_ngap_id = view.read_u64()? as i64;
        let nas_pdu = view.read_var_bytes()?;
        let user_location = UserLocationInfoNr::read(view)?;
        let rrc_establishment_cause = RrcEstablishmentCause::from_wire(view.read_u8()?)?;
        let five_g_s_tmsi = if view.read_u8()? != 0 {
            Some(FiveGSTmsi {
                amf_set_id: view.read_u16()?,
                amf_pointer: view.read_u8()?,
                tmsi: view.read_u32()?,
            })
        } else {
            None
        };
        Ok(Self {
            ran_ue_ngap_id,
            nas_pdu,
            user_location,
            rrc_establishment_cause,
            five_g_s_tmsi,
        })
    }
}

/// Uplink NAS Transport (gNB -> AMF).
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkNasTransport {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: i64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: i64,
    /// Encoded NAS PDU
    pub nas_pdu: Vec<u8>,
    /// User location information
    pub user_location: UserLocationInfoNr,
}

impl UplinkNasTransport {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        validate_amf_ue_ngap_id(self.amf_ue_ngap_id)?;
        validate_ran_ue_ngap_id(self.ran_ue_ngap_id)?;
        if self.nas_pdu.is_empty() {
            return Err(ConstraintViolation::new(
                "UplinkNASTransport: empty NAS-PDU".to_string(),
            ));
        }
        self.user_location.validate()
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_octet8(self.amf_ue_ngap_id as u64);
        out.append_octet8(self.ran_ue_ngap_id as u64);
        write_bytes(out, &self.nas_pdu);
        self.user_location.write(out);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        Ok(Self {
            amf_ue_ngap_id: view.read_u64()? as i64,
            ran_ue_ngap_id: view.read_u64()? as i64,
            nas_pdu: view.read_var_bytes()?,
            user_location: UserLocationInfoNr::read(view)?,
        })
    }
}

/// Downlink NAS Transport (AMF -> gNB).
#[derive(Debug, Clone, PartialEq)]
pub struct DownlinkNasTransport {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: i64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: i64,
    /// Encoded NAS PDU
    pub nas_pdu: Vec<u8>,
}

impl DownlinkNasTransport {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        validate_amf_ue_ngap_id(self.amf_ue_ngap_id)?;
        validate_ran_ue_ngap_id(self.ran_ue_ngap_id)?;
        if self.nas_pdu.is_empty() {
            return Err(ConstraintViolation::new(
                "DownlinkNASTransport: empty NAS-PDU".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_octet8(self.amf_ue_ngap_id as u64);
        out.append_octet8(self.ran_ue_ngap_id as u64);
        write_bytes(out, &self.nas_pdu);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        Ok(Self {
            amf_ue_ngap_id: view.read_u64()? as i64,
            ran_ue_ngap_id: view.read_u64()? as i64,
            nas_pdu: view.read_var_bytes()?,
        })
    }
}
