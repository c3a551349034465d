//! Paging procedure
//!
//! 3GPP TS 38.413 Section 8.5.1. The AMF pages an idle UE by 5G-S-TMSI
//! within a TAI list; the gNB maps this onto a PCCH paging record.

use ransim_common::{OctetString, OctetView, Tai};

use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::ies::{read_plmn, FiveGSTmsi};

/// Paging (AMF -> gNB).
#[derive(Debug, Clone, PartialEq)]
pub struct Paging {
    /// Paged UE identity
    pub five_g_s_tmsi: FiveGSTmsi,
    /// TAIs in which to page
    pub tai_list_for_paging: Vec<Tai>,
}

impl Paging {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        self.five_g_s_tmsi.validate()?;
        if self.tai_list_for_paging.is_empty() {
            return Err(ConstraintViolation::new(
                "Paging: empty TAIListForPaging".to_string(),
            ));
        }
        for tai in &self.tai_list_for_paging {
            if tai.tac > 0xff_ffff {
                return Err(ConstraintViolation::new(format!(
                    "Paging: TAC {} exceeds 24 bits",
                    tai.tac
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_octet2(self.five_g_s_tmsi.amf_set_id);
        out.append_octet(self.five_g_s_tmsi.amf_pointer);
        out.append_octet4(self.five_g_s_tmsi.tmsi);
        out.append_octet2(self.tai_list_for_paging.len() as u16);
        for tai in &self.tai_list_for_paging {
            out.append_slice(&tai.plmn.encode());
            out.append_octet4(tai.tac);
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let five_g_s_tmsi = FiveGSTmsi {
            amf_set_id: view.read_u16()?,
            amf_pointer: view.read_u8()?,
            tmsi: view.read_u32()?,
        };
        let count = view.read_u16()?;
        let mut tai_list_for_paging = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let plmn = read_plmn(view)?;
            let tac = view.read_u32()?;
            tai_list_for_paging.push(Tai { plmn, tac });
        }
        Ok(Self {
            five_g_s_tmsi,
            tai_list_for_paging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_ngap_pdu, encode_ngap_pdu, NgapPdu};
    use ransim_common::Plmn;

    #[test]
    fn test_paging_round_trip() {
        let pdu = NgapPdu::Paging(Paging {
            five_g_s_tmsi: FiveGSTmsi {
                amf_set_id: 1,
                amf_pointer: 0,
                tmsi: 0xdead_beef,
            },
            tai_list_for_paging: vec![Tai::new(Plmn::new(901, 70, false), 1)],
        });
        let bytes = encode_ngap_pdu(&pdu).unwrap();
        assert_eq!(decode_ngap_pdu(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_paging_oversized_set_id_rejected() {
        let pdu = NgapPdu::Paging(Paging {
            five_g_s_tmsi: FiveGSTmsi {
                amf_set_id: 1 << 10,
                amf_pointer: 0,
                tmsi: 1,
            },
            tai_list_for_paging: vec![Tai::new(Plmn::new(901, 70, false), 1)],
        });
        assert!(encode_ngap_pdu(&pdu).is_err());
    }
}
