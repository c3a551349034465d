//! Overload Start / Overload Stop procedures
//!
//! 3GPP TS 38.413 Section 8.7.7. The AMF signals overload with an action
//! the gNB applies to new signalling, an optional traffic load reduction
//! percentage, and an optional per-slice list.

use ransim_common::{OctetString, OctetView, SNssai};

use crate::codec::{ConstraintViolation, NgapCodecError};
use crate::ies::{read_snssai, write_snssai};

/// Overload action requested by the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadAction {
    /// Reject non-emergency mobile-originated data
    RejectNonEmergencyMoData,
    /// Reject RRC connection establishments for signalling
    RejectSignalling,
    /// Permit emergency sessions and mobile-terminated services only
    OnlyEmergencyAndMt,
    /// Permit high-priority sessions and mobile-terminated services only
    OnlyHighPriAndMt,
}

impl OverloadAction {
    fn to_wire(self) -> u8 {
        self as u8
    }

    fn from_wire(value: u8) -> Result<Self, NgapCodecError> {
        match value {
            0 => Ok(OverloadAction::RejectNonEmergencyMoData),
            1 => Ok(OverloadAction::RejectSignalling),
            2 => Ok(OverloadAction::OnlyEmergencyAndMt),
            3 => Ok(OverloadAction::OnlyHighPriAndMt),
            other => Err(NgapCodecError::Malformed(format!(
                "invalid OverloadAction {other}"
            ))),
        }
    }
}

/// Per-slice overload entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceOverloadItem {
    /// The overloaded slice
    pub snssai: SNssai,
}

/// Overload Start.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadStart {
    /// Overload response action
    pub action: Option<OverloadAction>,
    /// Traffic load reduction indication (1-99 percent)
    pub load_reduction_perc: Option<u8>,
    /// Per-slice overload list
    pub slice_overload_list: Vec<SliceOverloadItem>,
}

impl OverloadStart {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if let Some(perc) = self.load_reduction_perc {
            if !(1..=99).contains(&perc) {
                return Err(ConstraintViolation::new(format!(
                    "OverloadStart: TrafficLoadReductionIndication {perc} outside 1..=99"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut OctetString) {
        match self.action {
            Some(action) => {
                out.append_octet(1);
                out.append_octet(action.to_wire());
            }
            None => out.append_octet(0),
        }
        match self.load_reduction_perc {
            Some(perc) => {
                out.append_octet(1);
                out.append_octet(perc);
            }
            None => out.append_octet(0),
        }
        out.append_octet2(self.slice_overload_list.len() as u16);
        for item in &self.slice_overload_list {
            write_snssai(out, &item.snssai);
        }
    }

    pub(crate) fn read(view: &mut OctetView) -> Result<Self, NgapCodecError> {
        let action = if view.read_u8()? != 0 {
            Some(OverloadAction::from_wire(view.read_u8()?)?)
        } else {
            None
        };
        let load_reduction_perc = if view.read_u8()? != 0 {
            Some(view.read_u8()?)
        } else {
            None
        };
        let count = view.read_u16()?;
        let mut slice_overload_list = Vec::with_capacity(count as usize);
        for _ in 0..count {
            slice_overload_list.push(SliceOverloadItem {
                snssai: read_snssai(view)?,
            });
        }
        Ok(Self {
            action,
            load_reduction_perc,
            slice_overload_list,
        })
    }
}

/// Overload Stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverloadStop;

impl OverloadStop {
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        Ok(())
    }

    pub(crate) fn write(&self, _out: &mut OctetString) {}

    pub(crate) fn read(_view: &mut OctetView) -> Result<Self, NgapCodecError> {
        Ok(OverloadStop)
    }
}
