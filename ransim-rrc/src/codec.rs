//! RRC message codec
//!
//! Deterministic byte encoding for the DL-DCCH, UL-DCCH and PCCH message
//! subsets, one entry point per logical channel.

use ransim_common::{OctetString, OctetView, OutOfData};
use thiserror::Error;

use crate::messages::{
    DlDcchMessage, DlInformationTransfer, Paging, PagingRecord, PcchMessage, RrcReconfiguration,
    RrcRelease, UlDcchMessage, UlInformationTransfer, RRC_TRANSACTION_ID_MOD,
};

/// Error type for the RRC codec.
#[derive(Debug, Error)]
pub enum RrcCodecError {
    /// A field value violates its constraints.
    #[error("constraint check failed: {0}")]
    Constraint(String),

    /// The buffer ended before the message was complete.
    #[error("truncated message")]
    Truncated,

    /// Unknown message tag or malformed field content.
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl From<OutOfData> for RrcCodecError {
    fn from(_: OutOfData) -> Self {
        RrcCodecError::Truncated
    }
}

const TAG_DL_INFORMATION_TRANSFER: u8 = 0x01;
const TAG_RRC_RECONFIGURATION: u8 = 0x02;
const TAG_RRC_RELEASE: u8 = 0x03;
const TAG_UL_INFORMATION_TRANSFER: u8 = 0x11;
const TAG_PAGING: u8 = 0x21;

fn check_transaction_id(tid: u8) -> Result<(), RrcCodecError> {
    if tid >= RRC_TRANSACTION_ID_MOD {
        return Err(RrcCodecError::Constraint(format!(
            "rrc-TransactionIdentifier {tid} outside 0..=3"
        )));
    }
    Ok(())
}

/// Encodes a DL-DCCH message.
pub fn encode_dl_dcch(message: &DlDcchMessage) -> Result<Vec<u8>, RrcCodecError> {
    let mut out = OctetString::new();
    match message {
        DlDcchMessage::DlInformationTransfer(m) => {
            check_transaction_id(m.transaction_id)?;
            out.append_octet(TAG_DL_INFORMATION_TRANSFER);
            out.append_octet(m.transaction_id);
            out.append_octet2(m.dedicated_nas_message.len() as u16);
            out.append_slice(&m.dedicated_nas_message);
        }
        DlDcchMessage::RrcReconfiguration(m) => {
            check_transaction_id(m.transaction_id)?;
            out.append_octet(TAG_RRC_RECONFIGURATION);
            out.append_octet(m.transaction_id);
        }
        DlDcchMessage::RrcRelease(m) => {
            check_transaction_id(m.transaction_id)?;
            out.append_octet(TAG_RRC_RELEASE);
            out.append_octet(m.transaction_id);
        }
    }
    Ok(out.into_vec())
}

/// Decodes a DL-DCCH message.
pub fn decode_dl_dcch(bytes: &[u8]) -> Result<DlDcchMessage, RrcCodecError> {
    let mut view = OctetView::new(bytes);
    let tag = view.read_u8()?;
    match tag {
        TAG_DL_INFORMATION_TRANSFER => {
            let transaction_id = view.read_u8()?;
            let dedicated_nas_message = view.read_var_bytes()?;
            Ok(DlDcchMessage::DlInformationTransfer(DlInformationTransfer {
                transaction_id,
                dedicated_nas_message,
            }))
        }
        TAG_RRC_RECONFIGURATION => Ok(DlDcchMessage::RrcReconfiguration(RrcReconfiguration {
            transaction_id: view.read_u8()?,
        })),
        TAG_RRC_RELEASE => Ok(DlDcchMessage::RrcRelease(RrcRelease {
            transaction_id: view.read_u8()?,
        })),
        other => Err(RrcCodecError::Malformed(format!(
            "unknown DL-DCCH message tag 0x{other:02x}"
        ))),
    }
}

/// Encodes a UL-DCCH message.
pub fn encode_ul_dcch(message: &UlDcchMessage) -> Result<Vec<u8>, RrcCodecError> {
    let mut out = OctetString::new();
    match message {
        UlDcchMessage::UlInformationTransfer(m) => {
            out.append_octet(TAG_UL_INFORMATION_TRANSFER);
            out.append_octet2(m.dedicated_nas_message.len() as u16);
            out.append_slice(&m.dedicated_nas_message);
        }
    }
    Ok(out.into_vec())
}

/// Decodes a UL-DCCH message.
pub fn decode_ul_dcch(bytes: &[u8]) -> Result<UlDcchMessage, RrcCodecError> {
    let mut view = OctetView::new(bytes);
    let tag = view.read_u8()?;
    match tag {
        TAG_UL_INFORMATION_TRANSFER => {
            let dedicated_nas_message = view.read_var_bytes()?;
            Ok(UlDcchMessage::UlInformationTransfer(UlInformationTransfer {
                dedicated_nas_message,
            }))
        }
        other => Err(RrcCodecError::Malformed(format!(
            "unknown UL-DCCH message tag 0x{other:02x}"
        ))),
    }
}

/// Encodes a PCCH message.
pub fn encode_pcch(message: &PcchMessage) -> Result<Vec<u8>, RrcCodecError> {
    let mut out = OctetString::new();
    match message {
        PcchMessage::Paging(paging) => {
            if paging.paging_records.is_empty() {
                return Err(RrcCodecError::Constraint(
                    "Paging: empty pagingRecordList".to_string(),
                ));
            }
            out.append_octet(TAG_PAGING);
            out.append_octet(paging.paging_records.len() as u8);
            for record in &paging.paging_records {
                out.append_octet(record.ng_5g_s_tmsi.len() as u8);
                out.append_slice(&record.ng_5g_s_tmsi);
            }
        }
    }
    Ok(out.into_vec())
}

/// Decodes a PCCH message.
pub fn decode_pcch(bytes: &[u8]) -> Result<PcchMessage, RrcCodecError> {
    let mut view = OctetView::new(bytes);
    let tag = view.read_u8()?;
    match tag {
        TAG_PAGING => {
            let count = view.read_u8()?;
            let mut paging_records = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let len = view.read_u8()? as usize;
                paging_records.push(PagingRecord {
                    ng_5g_s_tmsi: view.read_bytes(len)?.to_vec(),
                });
            }
            Ok(PcchMessage::Paging(Paging { paging_records }))
        }
        other => Err(RrcCodecError::Malformed(format!(
            "unknown PCCH message tag 0x{other:02x}"
        ))),
    }
}
