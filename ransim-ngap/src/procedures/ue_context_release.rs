//! UE Context Release procedure
//!
//! 3GPP TS 38.413 Section 8.3.3. AMF-initiated release of a UE context;
//! the gNB answers with a Release Complete after tearing down the local
//! context and the RRC connection.

use ransim_common::{OctetString, OctetView};

use crate::cause::NgapCause;
use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::procedures::nas_transport::{validate_amf_ue_ngap_id, validate_ran_ue_ngap_id};

/// UE identification in a release command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeNgapIds {
    /// Both NGAP IDs are known
    Pair {
        /// AMF UE NGAP ID
        amf_ue_ngap_id: i64,
        /// RAN UE NGAP ID
        ran_ue_ngap_id: i64,
    },
    /// Only the AMF-side ID is known
    AmfOnly(i64),
}

/// UE Context Release Command (AMF -> gNB).
#[derive(Debug, Clone, PartialEq)]
pub struct UeContextReleaseCommand {
    /// UE identification
    pub ue_ngap_ids: UeNgapIds,
    /// Release cause
    pub cause: NgapCause,
}

impl UeContextReleaseCommand {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        match self.ue_ngap_ids {
            UeNgapIds::Pair {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
            } => {
                validate_amf_ue_ngap_id(amf_ue_ngap_id)?;
                validate_ran_ue_ngap_id(ran_ue_ngap_id)
            }
            UeNgapIds::AmfOnly(id) => validate_amf_ue_ngap_id(id),
        }
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        match self.ue_ngap_ids {
            UeNgapIds::Pair {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
            } => {
                out.append_octet(0);
                out.append_octet8(amf_ue_ngap_id as u64);
                out.append_octet8(ran_ue_ngap_id as u64);
            }
            UeNgapIds::AmfOnly(id) => {
                out.append_octet(1);
                out.append_octet8(id as u64);
            }
        }
        let (group, value) = self.cause.to_wire();
        out.append_octet(group);
        out.append_octet(value);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let ue_ngap_ids = match view.read_u8()? {
            0 => UeNgapIds::Pair {
                amf_ue_ngap_id: view.read_u64()? as i64,
                ran_ue_ngap_id: view.read_u64()? as i64,
            },
            1 => UeNgapIds::AmfOnly(view.read_u64()? as i64),
            other => {
                return Err(NgapCodecError::Malformed(format!(
                    "invalid UE-NGAP-IDs choice {other}"
                )))
            }
        };
        let group = view.read_u8()?;
        let value = view.read_u8()?;
        let cause = NgapCause::from_wire(group, value).ok_or_else(|| {
            NgapCodecError::Malformed(format!("unknown cause ({group}, {value})"))
        })?;
        Ok(Self { ue_ngap_ids, cause })
    }
}

/// UE Context Release Complete (gNB -> AMF).
#[derive(Debug, Clone, PartialEq)]
pub struct UeContextReleaseComplete {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: i64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: i64,
}

impl UeContextReleaseComplete {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        validate_amf_ue_ngap_id(self.amf_ue_ngap_id)?;
        validate_ran_ue_ngap_id(self.ran_ue_ngap_id)
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_octet8(self.amf_ue_ngap_id as u64);
        out.append_octet8(self.ran_ue_ngap_id as u64);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        Ok(Self {
            amf_ue_ngap_id: view.read_u64()? as i64,
            ran_ue_ngap_id: view.read_u64()? as i64,
        })
    }
}
