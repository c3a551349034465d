//! NG Setup procedure
//!
//! 3GPP TS 38.413 Section 8.7.1. The gNB initiates NG Setup after the
//! SCTP association comes up; the AMF answers with a Response carrying
//! its identity and capacity, or a Failure with a cause.

use ransim_common::{OctetString, OctetView};

use crate::cause::NgapCause;
use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::ies::{
    read_guami, read_opt_string, read_plmn, read_snssai, write_guami, write_opt_string,
    write_snssai, write_string, BroadcastPlmnItem, GlobalGnbId, PlmnSupportItem, ServedGuamiItem,
    SupportedTaItem,
};

/// Default paging DRX cycle values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingDrx {
    /// 32 radio frames
    V32,
    /// 64 radio frames
    V64,
    /// 128 radio frames
    V128,
    /// 256 radio frames
    V256,
}

impl PagingDrx {
    fn to_wire(self) -> u8 {
        match self {
            PagingDrx::V32 => 0,
            PagingDrx::V64 => 1,
            PagingDrx::V128 => 2,
            PagingDrx::V256 => 3,
        }
    }

    fn from_wire(value: u8) -> Result<Self, NgapCodecError> {
        match value {
            0 => Ok(PagingDrx::V32),
            1 => Ok(PagingDrx::V64),
            2 => Ok(PagingDrx::V128),
            3 => Ok(PagingDrx::V256),
            other => Err(NgapCodecError::Malformed(format!(
                "invalid PagingDRX value {other}"
            ))),
        }
    }
}

/// Time the gNB should wait before retrying NG Setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeToWait {
    /// 1 second
    V1s,
    /// 2 seconds
    V2s,
    /// 5 seconds
    V5s,
    /// 10 seconds
    V10s,
    /// 20 seconds
    V20s,
    /// 60 seconds
    V60s,
}

impl TimeToWait {
    fn to_wire(self) -> u8 {
        self as u8
    }

    fn from_wire(value: u8) -> Result<Self, NgapCodecError> {
        match value {
            0 => Ok(TimeToWait::V1s),
            1 => Ok(TimeToWait::V2s),
            2 => Ok(TimeToWait::V5s),
            3 => Ok(TimeToWait::V10s),
            4 => Ok(TimeToWait::V20s),
            5 => Ok(TimeToWait::V60s),
            other => Err(NgapCodecError::Malformed(format!(
                "invalid TimeToWait value {other}"
            ))),
        }
    }
}

/// NG Setup Request.
#[derive(Debug, Clone, PartialEq)]
pub struct NgSetupRequest {
    /// Global RAN node identity
    pub global_gnb_id: GlobalGnbId,
    /// RAN node name
    pub ran_node_name: Option<String>,
    /// Supported tracking areas
    pub supported_ta_list: Vec<SupportedTaItem>,
    /// Default paging DRX
    pub default_paging_drx: PagingDrx,
}

impl NgSetupRequest {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        self.global_gnb_id.validate()?;
        if self.supported_ta_list.is_empty() {
            return Err(ConstraintViolation::new(
                "NGSetupRequest: empty SupportedTAList".to_string(),
            ));
        }
        for ta in &self.supported_ta_list {
            ta.validate()?;
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        self.global_gnb_id.write(out);
        write_opt_string(out, &self.ran_node_name);
        out.append_octet2(self.supported_ta_list.len() as u16);
        for ta in &self.supported_ta_list {
            out.append_octet4(ta.tac);
            out.append_octet2(ta.broadcast_plmn_list.len() as u16);
            for bp in &ta.broadcast_plmn_list {
                out.append_slice(&bp.plmn.encode());
                out.append_octet2(bp.slice_support_list.len() as u16);
                for s in &bp.slice_support_list {
                    write_snssai(out, s);
                }
            }
        }
        out.append_octet(self.default_paging_drx.to_wire());
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let global_gnb_id = GlobalGnbId::read(view)?;
        let ran_node_name = read_opt_string(view)?;

        let ta_count = view.read_u16()?;
        let mut supported_ta_list = Vec::with_capacity(ta_count as usize);
        for _ in 0..ta_count {
            let tac = view.read_u32()?;
            let bp_count = view.read_u16()?;
            let mut broadcast_plmn_list = Vec::with_capacity(bp_count as usize);
            for _ in 0..bp_count {
                let plmn = read_plmn(view)?;
                let slice_count = view.read_u16()?;
                let mut slice_support_list = Vec::with_capacity(slice_count as usize);
                for _ in 0..slice_count {
                    slice_support_list.push(read_snssai(view)?);
                }
                broadcast_plmn_list.push(BroadcastPlmnItem {
                    plmn,
                    slice_support_list,
                });
            }
            supported_ta_list.push(SupportedTaItem {
                tac,
                broadcast_plmn_list,
            });
        }

        let default_paging_drx = PagingDrx::from_wire(view.read_u8()?)?;
        Ok(Self {
            global_gnb_id,
            ran_node_name,
            supported_ta_list,
            default_paging_drx,
        })
    }
}

/// NG Setup Response.
#[derive(Debug, Clone, PartialEq)]
pub struct NgSetupResponse {
    /// Human-readable AMF name
    pub amf_name: String,
    /// GUAMIs served by this AMF
    pub served_guami_list: Vec<ServedGuamiItem>,
    /// Relative AMF capacity (0-255)
    pub relative_amf_capacity: u8,
    /// PLMNs supported by this AMF
    pub plmn_support_list: Vec<PlmnSupportItem>,
}

impl NgSetupResponse {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if self.amf_name.is_empty() || self.amf_name.len() > 150 {
            return Err(ConstraintViolation::new(format!(
                "NGSetupResponse: AMFName length {} outside 1..=150",
                self.amf_name.len()
            )));
        }
        if self.served_guami_list.is_empty() {
            return Err(ConstraintViolation::new(
                "NGSetupResponse: empty ServedGUAMIList".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        write_string(out, &self.amf_name);
        out.append_octet2(self.served_guami_list.len() as u16);
        for item in &self.served_guami_list {
            write_guami(out, &item.guami);
            write_opt_string(out, &item.backup_amf_name);
        }
        out.append_octet(self.relative_amf_capacity);
        out.append_octet2(self.plmn_support_list.len() as u16);
        for item in &self.plmn_support_list {
            out.append_slice(&item.plmn.encode());
            out.append_octet2(item.slice_support_list.len() as u16);
            for s in &item.slice_support_list {
                write_snssai(out, s);
            }
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let amf_name = view.read_var_string()?;

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

        let relative_amf_capacity = view.read_u8()?;

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

        Ok(Self {
            amf_name,
            served_guami_list,
            relative_amf_capacity,
            plmn_support_list,
        })
    }
}

/// NG Setup Failure.
#[derive(Debug, Clone, PartialEq)]
pub struct NgSetupFailure {
    /// Failure cause
    pub cause: NgapCause,
    /// Minimum time to wait before re-initiating NG Setup
    pub time_to_wait: Option<TimeToWait>,
}

impl NgSetupFailure {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        let (group, value) = self.cause.to_wire();
        out.append_octet(group);
        out.append_octet(value);
        match self.time_to_wait {
            Some(ttw) => {
                out.append_octet(1);
                out.append_octet(ttw.to_wire());
            }
            None => out.append_octet(0),
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let group = view.read_u8()?;
        let value = view.read_u8()?;
        let cause = NgapCause::from_wire(group, value).ok_or_else(|| {
            NgapCodecError::Malformed(format!("unknown cause ({group}, {value})"))
        })?;
        let time_to_wait = if view.read_u8()? != 0 {
            Some(TimeToWait::from_wire(view.read_u8()?)?)
        } else {
            None
        };
        Ok(Self {
            cause,
            time_to_wait,
        })
    }
}
