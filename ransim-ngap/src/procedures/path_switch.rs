//! Path Switch Request procedure
//!
//! 3GPP TS 38.413 Section 8.4.4. Sent by the target gNB after an
//! Xn-based handover to switch the downlink path toward itself.

use ransim_common::{OctetString, OctetView};

use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::ies::{UeSecurityCapabilities, UserLocationInfoNr};
use crate::procedures::nas_transport::{validate_amf_ue_ngap_id, validate_ran_ue_ngap_id};

/// Path Switch Request.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSwitchRequest {
    /// AMF UE NGAP ID. Omitted when the source context never learned it.
    pub amf_ue_ngap_id: Option<i64>,
    /// RAN UE NGAP ID allocated by the target gNB
    pub ran_ue_ngap_id: i64,
    /// User location at the target cell
    pub user_location: UserLocationInfoNr,
    /// UE security capabilities
    pub ue_security_capabilities: UeSecurityCapabilities,
}

impl PathSwitchRequest {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if let Some(id) = self.amf_ue_ngap_id {
            validate_amf_ue_ngap_id(id)?;
        }
        validate_ran_ue_ngap_id(self.ran_ue_ngap_id)?;
        self.user_location.validate()?;
        self.ue_security_capabilities.validate()
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        match self.amf_ue_ngap_id {
            Some(id) => {
                out.append_octet(1);
                out.append_octet8(id as u64);
            }
            None => out.append_octet(0),
        }
        out.append_octet8(self.ran_ue_ngap_id as u64);
        self.user_location.write(out);
        self.ue_security_capabilities.write(out);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let amf_ue_ngap_id = if view.read_u8()? != 0 {
            Some(view.read_u64()? as i64)
        } else {
            None
        };
        let ran_ue_ngap_id = view.read_u64()? as i64;
        let user_location = UserLocationInfoNr::read(view)?;
        let ue_security_capabilities = UeSecurityCapabilities::read(view)?;
        Ok(Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            user_location,
            ue_security_capabilities,
        })
    }
}
