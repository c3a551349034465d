//! Information elements shared between NGAP procedures

use ransim_common::{Guami, OctetString, OctetView, Plmn, SNssai, Tai};

use crate::codec::{ConstraintViolation, NgapCodecError};

/// Global gNB identity (PLMN + gNB ID bit string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalGnbId {
    /// PLMN identity
    pub plmn: Plmn,
    /// gNB ID value
    pub gnb_id: u32,
    /// gNB ID length in bits (22-32)
    pub gnb_id_length: u8,
}

impl GlobalGnbId {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if !(22..=32).contains(&self.gnb_id_length) {
            return Err(ConstraintViolation::new(format!(
                "GlobalGNB-ID: gNB-ID length {} outside 22..=32",
                self.gnb_id_length
            )));
        }
        if self.gnb_id_length < 32 && u64::from(self.gnb_id) >= (1u64 << self.gnb_id_length) {
            return Err(ConstraintViolation::new(format!(
                "GlobalGNB-ID: value {} exceeds {} bits",
                self.gnb_id, self.gnb_id_length
            )));
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_slice(&self.plmn.encode());
        out.append_octet4(self.gnb_id);
        out.append_octet(self.gnb_id_length);
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let plmn = read_plmn(view)?;
        let gnb_id = view.read_u32()?;
        let gnb_id_length = view.read_u8()?;
        Ok(Self {
            plmn,
            gnb_id,
            gnb_id_length,
        })
    }
}

/// One broadcast PLMN of a supported TA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlmnItem {
    /// PLMN identity
    pub plmn: Plmn,
    /// TAI slice support list
    pub slice_support_list: Vec<SNssai>,
}

/// One supported tracking area advertised in NG Setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTaItem {
    /// Tracking Area Code (24-bit)
    pub tac: u32,
    /// Broadcast PLMNs of this TA
    pub broadcast_plmn_list: Vec<BroadcastPlmnItem>,
}

impl SupportedTaItem {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if self.tac > 0xff_ffff {
            return Err(ConstraintViolation::new(format!(
                "SupportedTAItem: TAC {} exceeds 24 bits",
                self.tac
            )));
        }
        if self.broadcast_plmn_list.is_empty() {
            return Err(ConstraintViolation::new(
                "SupportedTAItem: empty BroadcastPLMNList".to_string(),
            ));
        }
        Ok(())
    }
}

/// One served GUAMI reported by the AMF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedGuamiItem {
    /// The GUAMI
    pub guami: Guami,
    /// Backup AMF name, if any
    pub backup_amf_name: Option<String>,
}

/// One supported PLMN with its slices, reported by the AMF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlmnSupportItem {
    /// PLMN identity
    pub plmn: Plmn,
    /// Slice support list
    pub slice_support_list: Vec<SNssai>,
}

/// NR Cell Global Identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NrCgi {
    /// PLMN identity
    pub plmn: Plmn,
    /// NR Cell Identity (36-bit)
    pub nci: u64,
}

impl NrCgi {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if self.nci > 0xf_ffff_ffff {
            return Err(ConstraintViolation::new(format!(
                "NR-CGI: NCI {} exceeds 36 bits",
                self.nci
            )));
        }
        Ok(())
    }
}

/// User Location Information for NR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLocationInfoNr {
    /// NR Cell Global Identity
    pub nr_cgi: NrCgi,
    /// Tracking Area Identity
    pub tai: Tai,
    /// Timestamp in seconds since the epoch, if reported
    pub timestamp: Option<u32>,
}

impl UserLocationInfoNr {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        self.nr_cgi.validate()?;
        if self.tai.tac > 0xff_ffff {
            return Err(ConstraintViolation::new(format!(
                "UserLocationInformationNR: TAC {} exceeds 24 bits",
                self.tai.tac
            )));
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        out.append_slice(&self.nr_cgi.plmn.encode());
        out.append_octet8(self.nr_cgi.nci);
        out.append_slice(&self.tai.plmn.encode());
        out.append_octet4(self.tai.tac);
        match self.timestamp {
            Some(ts) => {
                out.append_octet(1);
                out.append_octet4(ts);
            }
            None => out.append_octet(0),
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let cgi_plmn = read_plmn(view)?;
        let nci = view.read_u64()?;
        let tai_plmn = read_plmn(view)?;
        let tac = view.read_u32()?;
        let timestamp = if view.read_u8()? != 0 {
            Some(view.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            nr_cgi: NrCgi {
                plmn: cgi_plmn,
                nci,
            },
            tai: Tai {
                plmn: tai_plmn,
                tac,
            },
            timestamp,
        })
    }
}

/// UE security capabilities as algorithm bit strings.
///
/// The air interface being simulated, every algorithm is reported as
/// enabled (0xff) when a gNB constructs this IE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeSecurityCapabilities {
    /// NR encryption algorithms bit string
    pub nr_encryption_algorithms: Vec<u8>,
    /// NR integrity protection algorithms bit string
    pub nr_integrity_algorithms: Vec<u8>,
    /// E-UTRA encryption algorithms bit string
    pub eutra_encryption_algorithms: Vec<u8>,
    /// E-UTRA integrity protection algorithms bit string
    pub eutra_integrity_algorithms: Vec<u8>,
}

impl UeSecurityCapabilities {
    /// All algorithms enabled.
    pub fn all_enabled() -> Self {
        Self {
            nr_encryption_algorithms: vec![0xff],
            nr_integrity_algorithms: vec![0xff],
            eutra_encryption_algorithms: vec![0xff],
            eutra_integrity_algorithms: vec![0xff],
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        for (name, bits) in [
            ("nRencryptionAlgorithms", &self.nr_encryption_algorithms),
            ("nRintegrityProtectionAlgorithms", &self.nr_integrity_algorithms),
            ("eUTRAencryptionAlgorithms", &self.eutra_encryption_algorithms),
            ("eUTRAintegrityProtectionAlgorithms", &self.eutra_integrity_algorithms),
        ] {
            if bits.is_empty() || bits.len() > 2 {
                return Err(ConstraintViolation::new(format!(
                    "UESecurityCapabilities: {name} bit string length {} outside 1..=2",
                    bits.len()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        for bits in [
            &self.nr_encryption_algorithms,
            &self.nr_integrity_algorithms,
            &self.eutra_encryption_algorithms,
            &self.eutra_integrity_algorithms,
        ] {
            out.append_octet(bits.len() as u8);
            out.append_slice(bits);
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let mut fields: [Vec<u8>; 4] = Default::default();
        for field in &mut fields {
            let len = view.read_u8()? as usize;
            *field = view.read_bytes(len)?.to_vec();
        }
        let [nr_enc, nr_int, eutra_enc, eutra_int] = fields;
        Ok(Self {
            nr_encryption_algorithms: nr_enc,
            nr_integrity_algorithms: nr_int,
            eutra_encryption_algorithms: eutra_enc,
            eutra_integrity_algorithms: eutra_int,
        })
    }
}

/// 5G-S-TMSI (AMF Set ID, AMF Pointer, 5G-TMSI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiveGSTmsi {
    /// AMF Set ID (10-bit)
    pub amf_set_id: u16,
    /// AMF Pointer (6-bit)
    pub amf_pointer: u8,
    /// 5G-TMSI
    pub tmsi: u32,
}

impl FiveGSTmsi {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if self.amf_set_id >= 1 << 10 {
            return Err(ConstraintViolation::new(format!(
                "FiveG-S-TMSI: AMFSetID {} exceeds 10 bits",
                self.amf_set_id
            )));
        }
        if self.amf_pointer >= 1 << 6 {
            return Err(ConstraintViolation::new(format!(
                "FiveG-S-TMSI: AMFPointer {} exceeds 6 bits",
                self.amf_pointer
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// wire helpers shared by procedure codecs
// ---------------------------------------------------------------------------

pub(crate) fn read_plmn(view: &mut OctetView) -> Result<Plmn, NgapCodecError> {
    let bytes = view.read_bytes(3)?;
    Ok(Plmn::decode([bytes[0], bytes[1], bytes[2]]))
}

pub(crate) fn write_snssai(out: &mut OctetString, snssai: &SNssai) {
    out.append_octet(snssai.sst);
    match snssai.sd {
        Some(sd) => {
            out.append_octet(1);
            out.append_octet4(sd);
        }
        None => out.append_octet(0),
    }
}

pub(crate) fn read_snssai(view: &mut OctetView) -> Result<SNssai, NgapCodecError> {
    let sst = view.read_u8()?;
    let sd = if view.read_u8()? != 0 {
        Some(view.read_u32()?)
    } else {
        None
    };
    Ok(SNssai { sst, sd })
}

pub(crate) fn write_opt_string(out: &mut OctetString, value: &Option<String>) {
    match value {
        Some(s) => {
            out.append_octet(1);
            out.append_octet2(s.len() as u16);
            out.append_slice(s.as_bytes());
        }
        None => out.append_octet(0),
    }
}

pub(crate) fn read_opt_string(view: &mut OctetView) -> Result<Option<String>, NgapCodecError> {
    if view.read_u8()? == 0 {
        return Ok(None);
    }
    Ok(Some(view.read_var_string()?))
}

pub(crate) fn write_string(out: &mut OctetString, value: &str) {
    out.append_octet2(value.len() as u16);
    out.append_slice(value.as_bytes());
}

pub(crate) fn write_bytes(out: &mut OctetString, value: &[u8]) {
    out.append_octet2(value.len() as u16);
    out.append_slice(value);
}

pub(crate) fn write_guami(out: &mut OctetString, guami: &Guami) {
    out.append_slice(&guami.plmn.encode());
    out.append_octet(guami.amf_region_id);
    out.append_octet2(guami.amf_set_id);
    out.append_octet(guami.amf_pointer);
}

pub(crate) fn read_guami(view: &mut OctetView) -> Result<Guami, NgapCodecError> {
    let plmn = read_plmn(view)?;
    let amf_region_id = view.read_u8()?;
    let amf_set_id = view.read_u16()?;
    let amf_pointer = view.read_u8()?;
    Ok(Guami {
        plmn,
        amf_region_id,
        amf_set_id,
        amf_pointer,
    })
}
