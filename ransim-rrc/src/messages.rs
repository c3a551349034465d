//! RRC message trees
//!
//! The DL-DCCH, UL-DCCH and PCCH message subsets the simulator uses.
//! Critical extensions the simulator never populates are represented by
//! empty structs so the encoded form stays the minimal legal one.

/// RRC transaction identifier field width: values are 0..=3.
pub const RRC_TRANSACTION_ID_MOD: u8 = 4;

/// Downlink DCCH message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlDcchMessage {
    /// dlInformationTransfer carrying a dedicated NAS message
    DlInformationTransfer(DlInformationTransfer),
    /// rrcReconfiguration (minimal form, no reconfiguration IEs)
    RrcReconfiguration(RrcReconfiguration),
    /// rrcRelease
    RrcRelease(RrcRelease),
}

/// dlInformationTransfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlInformationTransfer {
    /// RRC transaction identifier (0..=3)
    pub transaction_id: u8,
    /// Dedicated NAS message
    pub dedicated_nas_message: Vec<u8>,
}

/// rrcReconfiguration with no populated extension IEs.
///
/// The simulator sends the minimal legal form; measurement and radio
/// bearer reconfiguration are not modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcReconfiguration {
    /// RRC transaction identifier (0..=3)
    pub transaction_id: u8,
}

/// rrcRelease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcRelease {
    /// RRC transaction identifier (0..=3)
    pub transaction_id: u8,
}

/// Uplink DCCH message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlDcchMessage {
    /// ulInformationTransfer carrying a dedicated NAS message
    UlInformationTransfer(UlInformationTransfer),
}

/// ulInformationTransfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlInformationTransfer {
    /// Dedicated NAS message
    pub dedicated_nas_message: Vec<u8>,
}

/// PCCH message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcchMessage {
    /// paging
    Paging(Paging),
}

/// Paging with its record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paging {
    /// Paging records
    pub paging_records: Vec<PagingRecord>,
}

/// One paging record identifying a UE by ng-5G-S-TMSI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingRecord {
    /// ng-5G-S-TMSI as raw bits:
    /// `[AMFSetID(10) | AMFPointer(6)] ++ 5G-TMSI(32)`
    pub ng_5g_s_tmsi: Vec<u8>,
}

impl PagingRecord {
    /// Builds the ng-5G-S-TMSI bit layout from its components.
    pub fn from_s_tmsi(amf_set_id: u16, amf_pointer: u8, tmsi: u32) -> Self {
        let head = ((amf_set_id & 0x3ff) << 6) | u16::from(amf_pointer & 0x3f);
        let mut bits = Vec::with_capacity(6);
        bits.extend_from_slice(&head.to_be_bytes());
        bits.extend_from_slice(&tmsi.to_be_bytes());
        Self { ng_5g_s_tmsi: bits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_record_bit_layout() {
        // AMFSetID=1 (10 bits), AMFPointer=2 (6 bits) -> 0b0000000001_000010
        let record = PagingRecord::from_s_tmsi(1, 2, 0xdead_beef);
        assert_eq!(record.ng_5g_s_tmsi.len(), 6);
        assert_eq!(&record.ng_5g_s_tmsi[..2], &[0x00, 0x42]);
        assert_eq!(&record.ng_5g_s_tmsi[2..], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_paging_record_masks_overwide_fields() {
        let record = PagingRecord::from_s_tmsi(0xffff, 0xff, 0);
        // 10+6 bits fully set
        assert_eq!(&record.ng_5g_s_tmsi[..2], &[0xff, 0xff]);
    }
}
