//! Core 5G domain types shared across the workspace
//!
//! PLMN identities, slice identifiers, tracking area identities and the
//! other small value types that appear in both configuration and PDUs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public Land Mobile Network identity.
///
/// 3GPP TS 23.003 Section 12.1. The MNC is either 2 or 3 digits; the
/// `long_mnc` flag distinguishes `01` from `001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits)
    pub mcc: u16,
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: u16,
    /// True if the MNC is 3 digits
    #[serde(default)]
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN identity.
    pub fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Encodes the PLMN into its 3-octet BCD wire form.
    pub fn encode(&self) -> [u8; 3] {
        let mcc = self.mcc;
        let mnc = self.mnc;
        let mcc1 = (mcc / 100 % 10) as u8;
        let mcc2 = (mcc / 10 % 10) as u8;
        let mcc3 = (mcc % 10) as u8;
        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            ((mnc / 100 % 10) as u8, (mnc / 10 % 10) as u8, (mnc % 10) as u8)
        } else {
            (0x0f, (mnc / 10 % 10) as u8, (mnc % 10) as u8)
        };
        [mcc2 << 4 | mcc1, mnc1 << 4 | mcc3, mnc3 << 4 | mnc2]
    }

    /// Decodes a PLMN from its 3-octet BCD wire form.
    pub fn decode(octets: [u8; 3]) -> Self {
        let mcc1 = (octets[0] & 0x0f) as u16;
        let mcc2 = (octets[0] >> 4) as u16;
        let mcc3 = (octets[1] & 0x0f) as u16;
        let mnc1 = (octets[1] >> 4) as u16;
        let mnc2 = (octets[2] & 0x0f) as u16;
        let mnc3 = (octets[2] >> 4) as u16;
        let long_mnc = mnc1 != 0x0f;
        let mnc = if long_mnc {
            mnc1 * 100 + mnc2 * 10 + mnc3
        } else {
            mnc2 * 10 + mnc3
        };
        Self {
            mcc: mcc1 * 100 + mcc2 * 10 + mcc3,
            mnc,
            long_mnc,
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}/{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}/{:02}", self.mcc, self.mnc)
        }
    }
}

/// Single Network Slice Selection Assistance Information.
///
/// 3GPP TS 23.003 Section 28.4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (24-bit, optional)
    #[serde(default)]
    pub sd: Option<u32>,
}

impl SNssai {
    /// Creates an S-NSSAI with SST only.
    pub fn new(sst: u8) -> Self {
        Self { sst, sd: None }
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "{}:0x{:06x}", self.sst, sd),
            None => write!(f, "{}", self.sst),
        }
    }
}

/// Tracking Area Identity (PLMN + 24-bit TAC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tai {
    /// PLMN identity
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
}

impl Tai {
    /// Creates a new TAI.
    pub fn new(plmn: Plmn, tac: u32) -> Self {
        Self { plmn, tac }
    }

    /// Encodes the TAC into its 3-octet wire form.
    pub fn tac_octets(&self) -> [u8; 3] {
        [
            ((self.tac >> 16) & 0xff) as u8,
            ((self.tac >> 8) & 0xff) as u8,
            (self.tac & 0xff) as u8,
        ]
    }
}

impl fmt::Display for Tai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.plmn, self.tac)
    }
}

/// Globally Unique AMF Identifier.
///
/// 3GPP TS 23.003 Section 2.10.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guami {
    /// PLMN identity
    pub plmn: Plmn,
    /// AMF Region ID (8-bit)
    pub amf_region_id: u8,
    /// AMF Set ID (10-bit)
    pub amf_set_id: u16,
    /// AMF Pointer (6-bit)
    pub amf_pointer: u8,
}

/// 5G Globally Unique Temporary Identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guti {
    /// GUAMI of the assigning AMF
    pub guami: Guami,
    /// 5G-TMSI (32-bit)
    pub tmsi: u32,
}

/// PDU session type. Only IPv4 is supported by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PduSessionType {
    /// IPv4 session
    #[default]
    Ipv4,
    /// IPv6 session (not supported)
    Ipv6,
    /// Dual-stack session (not supported)
    Ipv4v6,
}

impl fmt::Display for PduSessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PduSessionType::Ipv4 => write!(f, "IPv4"),
            PduSessionType::Ipv6 => write!(f, "IPv6"),
            PduSessionType::Ipv4v6 => write!(f, "IPv4v6"),
        }
    }
}

/// Minimum valid PDU Session Identity.
pub const PSI_MIN: u8 = 1;
/// Maximum valid PDU Session Identity.
pub const PSI_MAX: u8 = 15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plmn_encode_decode_short_mnc() {
        let plmn = Plmn::new(310, 41, false);
        let octets = plmn.encode();
        assert_eq!(Plmn::decode(octets), plmn);
    }

    #[test]
    fn test_plmn_encode_decode_long_mnc() {
        let plmn = Plmn::new(1, 1, true);
        let octets = plmn.encode();
        let decoded = Plmn::decode(octets);
        assert_eq!(decoded, plmn);
        assert!(decoded.long_mnc);
    }

    #[test]
    fn test_tac_octets() {
        let tai = Tai::new(Plmn::new(1, 1, false), 0x0102a3);
        assert_eq!(tai.tac_octets(), [0x01, 0x02, 0xa3]);
    }

    #[test]
    fn test_snssai_display() {
        assert_eq!(format!("{}", SNssai::new(1)), "1");
        assert_eq!(
            format!("{}", SNssai { sst: 1, sd: Some(0x10) }),
            "1:0x000010"
        );
    }
}
