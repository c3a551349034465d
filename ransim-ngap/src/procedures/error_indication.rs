//! Error Indication procedure
//!
//! 3GPP TS 38.413 Section 8.7.3. Non-fatal in both directions: received
//! indications are logged, sent ones report a cause and are UE-associated
//! when the NGAP ID pair is present.

use ransim_common::{OctetString, OctetView};

use crate::cause::NgapCause;
use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::procedures::nas_transport::{validate_amf_ue_ngap_id, validate_ran_ue_ngap_id};

/// Error Indication.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorIndication {
    /// Cause of the error, when known
    pub cause: Option<NgapCause>,
    /// AMF UE NGAP ID for UE-associated indications
    pub amf_ue_ngap_id: Option<i64>,
    /// RAN UE NGAP ID for UE-associated indications
    pub ran_ue_ngap_id: Option<i64>,
}

impl ErrorIndication {
    /// Non-UE-associated indication with just a cause.
    pub fn with_cause(cause: NgapCause) -> Self {
        Self {
            cause: Some(cause),
            amf_ue_ngap_id: None,
            ran_ue_ngap_id: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if let Some(id) = self.amf_ue_ngap_id {
            validate_amf_ue_ngap_id(id)?;
        }
        if let Some(id) = self.ran_ue_ngap_id {
            validate_ran_ue_ngap_id(id)?;
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        match self.cause {
            Some(cause) => {
                let (group, value) = cause.to_wire();
                out.append_octet(1);
                out.append_octet(group);
                out.append_octet(value);
            }
            None => out.append_octet(0),
        }
        for id in [self.amf_ue_ngap_id, self.ran_ue_ngap_id] {
            match id {
                Some(v) => {
                    out.append_octet(1);
                    out.append_octet8(v as u64);
                }
                None => out.append_octet(0),
            }
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let cause = if view.read_u8()? != 0 {
            let group = view.read_u8()?;
            let value = view.read_u8()?;
            Some(NgapCause::from_wire(group, value).ok_or_else(|| {
                NgapCodecError::Malformed(format!("unknown cause ({group}, {value})"))
            })?)
        } else {
            None
        };
        let amf_ue_ngap_id = if view.read_u8()? != 0 {
            Some(view.read_u64()? as i64)
        } else {
            None
        };
        let ran_ue_ngap_id = if view.read_u8()? != 0 {
            Some(view.read_u64()? as i64)
        } else {
            None
        };
        Ok(Self {
            cause,
            amf_ue_ngap_id,
            ran_ue_ngap_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::{ProtocolCause, RadioNetworkCause};
    use crate::codec::{decode_ngap_pdu, encode_ngap_pdu, NgapPdu};

    #[test]
    fn test_non_ue_associated_round_trip() {
        let pdu = NgapPdu::ErrorIndication(ErrorIndication::with_cause(NgapCause::Protocol(
            ProtocolCause::SemanticError,
        )));
        let bytes = encode_ngap_pdu(&pdu).unwrap();
        assert_eq!(decode_ngap_pdu(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_ue_associated_round_trip() {
        let pdu = NgapPdu::ErrorIndication(ErrorIndication {
            cause: Some(NgapCause::RadioNetwork(
                RadioNetworkCause::UnknownLocalUeNgapId,
            )),
            amf_ue_ngap_id: Some(10),
            ran_ue_ngap_id: Some(20),
        });
        let bytes = encode_ngap_pdu(&pdu).unwrap();
        assert_eq!(decode_ngap_pdu(&bytes).unwrap(), pdu);
    }
}
