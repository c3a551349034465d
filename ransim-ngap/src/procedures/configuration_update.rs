//! AMF Configuration Update procedure
//!
//! 3GPP TS 38.413 Section 8.7.5. The AMF may push updated defaults
//! (name, capacity, served GUAMIs, PLMN support) mid-association. TNL
//! association modification is not supported by the gNB and is rejected
//! with a transport cause.

use ransim_common::{OctetString, OctetView};

use crate::cause::NgapCause;
use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::ies::{
    read_guami, read_opt_string, read_plmn, read_snssai, write_guami, write_opt_string,
    write_snssai, write_string, PlmnSupportItem, ServedGuamiItem,
};

/// A TNL association endpoint named in an update list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TnlAssociationItem {
    /// Transport layer address (textual form)
    pub address: String,
}

/// AMF Configuration Update.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfConfigurationUpdate {
    /// Updated AMF name
    pub amf_name: Option<String>,
    /// Updated relative capacity
    pub relative_amf_capacity: Option<u8>,
    /// Updated served GUAMI list
    pub served_guami_list: Vec<ServedGuamiItem>,
    /// Updated PLMN support list
    pub plmn_support_list: Vec<PlmnSupportItem>,
    /// TNL associations to add (unsupported when non-empty)
    pub tnl_to_add: Vec<TnlAssociationItem>,
    /// TNL associations to remove (unsupported when non-empty)
    pub tnl_to_remove: Vec<TnlAssociationItem>,
    /// TNL associations to update (unsupported when non-empty)
    pub tnl_to_update: Vec<TnlAssociationItem>,
}

impl AmfConfigurationUpdate {
    /// True if any TNL modification list is non-empty.
    pub fn modifies_tnl(&self) -> bool {
        !self.tnl_to_add.is_empty() || !self.tnl_to_remove.is_empty() || !self.tnl_to_update.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if let Some(ref name) = self.amf_name {
            if name.is_empty() || name.len() > 150 {
                return Err(ConstraintViolation::new(format!(
                    "AMFConfigurationUpdate: AMFName length {} outside 1..=150",
                    name.len()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        write_opt_string(out, &self.amf_name);
        match self.relative_amf_capacity {
            Some(cap) => {
                out.append_octet(1);
                out.append_octet(cap);
            }
            None => out.append_octet(0),
        }
        out.append_octet2(self.served_guami_list.len() as u16);
        for item in &self.served_guami_list {
            write_guami(out, &item.guami);
            write_opt_string(out, &item.backup_amf_name);
        }
        out.append_octet2(self.plmn_support_list.len() as u16);
        for item in &self.plmn_support_list {
            out.append_slice(&item.plmn.encode());
            out.append_octet2(item.slice_support_list.len() as u16);
            for s in &item.slice_support_list {
                write_snssai(out, s);
            }
        }
        for list in [&self.tnl_to_add, &self.tnl_to_remove, &self.tnl_to_update] {
            out.append_octet2(list.len() as u16);
            for item in list {
                write_string(out, &item.address);
            }
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let amf_name = read_opt_string(view)?;
        let relative_amf_capacity = if view.read_u8()? != 0 {
            Some(view.read_u8()?)
        } else {
            None
        };

        let guami_count = view.read_u16()?;
        let mut served_guami_list = Vec::with_capacity(guami_count as usize);
        for _ in 0..guami_count {
            let guami = read_guami(view)?;
            let backup_amf_name = read_opt_string(view)?;
            served_guami_list.push(ServedGuamiItem {
                guami,
                backup_amf_name,
            });
        }

        let plmn_count = view.read_u16()?;
        let mut plmn_support_list = Vec::with_capacity(plmn_count as usize);
        for _ in 0..plmn_count {
            let plmn = read_plmn(view)?;
            let slice_count = view.read_u16()?;
            let mut slice_support_list = Vec::with_capacity(slice_count as usize);
            for _ in 0..slice_count {
                slice_support_list.push(read_snssai(view)?);
            }
            plmn_support_list.push(PlmnSupportItem {
                plmn,
                slice_support_list,
            });
        }

        let mut lists: [Vec<TnlAssociationItem>; 3] = Default::default();
        for list in &mut lists {
            let count = view.read_u16()?;
            for _ in 0..count {
                list.push(TnlAssociationItem {
                    address: view.read_var_string()?,
                });
            }
        }
        let [tnl_to_add, tnl_to_remove, tnl_to_update] = lists;

        Ok(Self {
            amf_name,
            relative_amf_capacity,
            served_guami_list,
            plmn_support_list,
            tnl_to_add,
            tnl_to_remove,
            tnl_to_update,
        })
    }
}

/// AMF Configuration Update Acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AmfConfigurationUpdateAcknowledge {
    /// TNL associations actually set up (always empty: TNL modification
    /// is unsupported)
    pub tnl_association_setup_list: Vec<TnlAssociationItem>,
}

impl AmfConfigurationUpdateAcknowledge {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_octet2(self.tnl_association_setup_list.len() as u16);
        for item in &self.tnl_association_setup_list {
            write_string(out, &item.address);
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let count = view.read_u16()?;
        let mut tnl_association_setup_list = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tnl_association_setup_list.push(TnlAssociationItem {
                address: view.read_var_string()?,
            });
        }
        Ok(Self {
            tnl_association_setup_list,
        })
    }
}

/// AMF Configuration Update Failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfConfigurationUpdateFailure {
    /// Failure cause
    pub cause: NgapCause,
}

impl AmfConfigurationUpdateFailure {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        let (group, value) = self.cause.to_wire();
        out.append_octet(group);
        out.append_octet(value);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let group = view.read_u8()?;
        let value = view.read_u8()?;
        let cause = NgapCause::from_wire(group, value).ok_or_else(|| {
            NgapCodecError::Malformed(format!("unknown cause ({group}, {value})"))
        })?;
        Ok(Self { cause })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::TransportCause;
    use crate::codec::{decode_ngap_pdu, encode_ngap_pdu, NgapPdu};

    fn empty_update() -> AmfConfigurationUpdate {
        AmfConfigurationUpdate {
            amf_name: Some("AMF2".to_string()),
            relative_amf_capacity: Some(100),
            served_guami_list: vec![],
            plmn_support_list: vec![],
            tnl_to_add: vec![],
            tnl_to_remove: vec![],
            tnl_to_update: vec![],
        }
    }

    #[test]
    fn test_modifies_tnl_detection() {
        let mut update = empty_update();
        assert!(!update.modifies_tnl());
        update.tnl_to_add.push(TnlAssociationItem {
            address: "10.0.0.1".to_string(),
        });
        assert!(update.modifies_tnl());
    }

    #[test]
    fn test_configuration_update_round_trip() {
        let mut update = empty_update();
        update.tnl_to_remove.push(TnlAssociationItem {
            address: "10.0.0.9".to_string(),
        });
        let pdu = NgapPdu::AmfConfigurationUpdate(update);
        let bytes = encode_ngap_pdu(&pdu).unwrap();
        assert_eq!(decode_ngap_pdu(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_update_failure_round_trip() {
        let pdu = NgapPdu::AmfConfigurationUpdateFailure(AmfConfigurationUpdateFailure {
            cause: NgapCause::Transport(TransportCause::Unspecified),
        });
        let bytes = encode_ngap_pdu(&pdu).unwrap();
        assert_eq!(decode_ngap_pdu(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_acknowledge_is_empty_by_default() {
        let ack = AmfConfigurationUpdateAcknowledge::default();
        assert!(ack.tnl_association_setup_list.is_empty());
    }
}
