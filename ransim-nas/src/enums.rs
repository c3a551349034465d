//! NAS IE enumerations
//!
//! 3GPP TS 24.501 Section 9.11. Only the values the simulator raises or
//! interprets are modelled.

use std::fmt;

/// 5GS registration type (TS 24.501 Section 9.11.3.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationType {
    /// Initial registration
    InitialRegistration,
    /// Mobility registration updating
    MobilityRegistrationUpdating,
    /// Periodic registration updating
    PeriodicRegistrationUpdating,
    /// Emergency registration
    EmergencyRegistration,
}

impl fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationType::InitialRegistration => write!(f, "initial-registration"),
            RegistrationType::MobilityRegistrationUpdating => {
                write!(f, "mobility-registration-updating")
            }
            RegistrationType::PeriodicRegistrationUpdating => {
                write!(f, "periodic-registration-updating")
            }
            RegistrationType::EmergencyRegistration => write!(f, "emergency-registration"),
        }
    }
}

/// Follow-on request bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOnRequest {
    /// No follow-on request pending
    NoForPending,
    /// Follow-on request pending
    ForPending,
}

/// Switch-off bit of the de-registration type IE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOff {
    /// Normal de-registration
    NormalDeRegistration,
    /// Switch off
    SwitchOff,
}

/// Access type of the de-registration type IE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeRegistrationAccessType {
    /// 3GPP access
    ThreeGppAccess,
    /// Non-3GPP access
    NonThreeGppAccess,
    /// Both accesses
    ThreeGppAndNonThreeGppAccess,
}

/// Re-registration required bit (network-initiated de-registration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReRegistrationRequired {
    /// Re-registration not required
    NotRequired,
    /// Re-registration required
    Required,
}

/// 5GMM cause values (TS 24.501 Section 9.11.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmCause {
    /// Illegal UE
    IllegalUe,
    /// Illegal ME
    IllegalMe,
    /// 5GS services not allowed
    FiveGsServicesNotAllowed,
    /// PLMN not allowed
    PlmnNotAllowed,
    /// Tracking area not allowed
    TrackingAreaNotAllowed,
    /// Roaming not allowed in this tracking area
    RoamingNotAllowedInTa,
    /// No suitable cells in tracking area
    NoSuitableCellsInTa,
    /// Congestion
    Congestion,
    /// Implicitly de-registered
    ImplicitlyDeregistered,
    /// Protocol error, unspecified
    ProtocolErrorUnspecified,
}

/// 5GSM cause values (TS 24.501 Section 9.11.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmCause {
    /// Insufficient resources
    InsufficientResources,
    /// Missing or unknown DNN
    MissingOrUnknownDnn,
    /// Unknown PDU session type
    UnknownPduSessionType,
    /// Request rejected, unspecified
    RequestRejectedUnspecified,
    /// Invalid PDU session identity
    InvalidPduSessionIdentity,
    /// Protocol error, unspecified
    ProtocolErrorUnspecified,
}

impl fmt::Display for SmCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmCause::InsufficientResources => write!(f, "insufficient-resources"),
            SmCause::MissingOrUnknownDnn => write!(f, "missing-or-unknown-dnn"),
            SmCause::UnknownPduSessionType => write!(f, "unknown-pdu-session-type"),
            SmCause::RequestRejectedUnspecified => write!(f, "request-rejected-unspecified"),
            SmCause::InvalidPduSessionIdentity => write!(f, "invalid-pdu-session-identity"),
            SmCause::ProtocolErrorUnspecified => write!(f, "protocol-error-unspecified"),
        }
    }
}

pub(crate) mod wire {
    use super::*;
    use crate::codec::NasCodecError;

    pub fn mm_cause_to_wire(cause: MmCause) -> u8 {
        match cause {
            MmCause::IllegalUe => 0x03,
            MmCause::IllegalMe => 0x06,
            MmCause::FiveGsServicesNotAllowed => 0x07,
            MmCause::PlmnNotAllowed => 0x0b,
            MmCause::TrackingAreaNotAllowed => 0x0c,
            MmCause::RoamingNotAllowedInTa => 0x0d,
            MmCause::NoSuitableCellsInTa => 0x0f,
            MmCause::Congestion => 0x16,
            MmCause::ImplicitlyDeregistered => 0x0a,
            MmCause::ProtocolErrorUnspecified => 0x6f,
        }
    }

    pub fn mm_cause_from_wire(value: u8) -> Result<MmCause, NasCodecError> {
        Ok(match value {
            0x03 => MmCause::IllegalUe,
            0x06 => MmCause::IllegalMe,
            0x07 => MmCause::FiveGsServicesNotAllowed,
            0x0b => MmCause::PlmnNotAllowed,
            0x0c => MmCause::TrackingAreaNotAllowed,
            0x0d => MmCause::RoamingNotAllowedInTa,
            0x0f => MmCause::NoSuitableCellsInTa,
            0x16 => MmCause::Congestion,
            0x0a => MmCause::ImplicitlyDeregistered,
            0x6f => MmCause::ProtocolErrorUnspecified,
            other => {
                return Err(NasCodecError::Malformed(format!(
                    "unknown 5GMM cause 0x{other:02x}"
                )))
            }
        })
    }

    pub fn sm_cause_to_wire(cause: SmCause) -> u8 {
        match cause {
            SmCause::InsufficientResources => 0x1a,
            SmCause::MissingOrUnknownDnn => 0x1b,
            SmCause::UnknownPduSessionType => 0x1c,
            SmCause::RequestRejectedUnspecified => 0x1f,
            SmCause::InvalidPduSessionIdentity => 0x2b,
            SmCause::ProtocolErrorUnspecified => 0x6f,
        }
    }

    pub fn sm_cause_from_wire(value: u8) -> Result<SmCause, NasCodecError> {
        Ok(match value {
            0x1a => SmCause::InsufficientResources,
            0x1b => SmCause::MissingOrUnknownDnn,
            0x1c => SmCause::UnknownPduSessionType,
            0x1f => SmCause::RequestRejectedUnspecified,
            0x2b => SmCause::InvalidPduSessionIdentity,
            0x6f => SmCause::ProtocolErrorUnspecified,
            other => {
                return Err(NasCodecError::Malformed(format!(
                    "unknown 5GSM cause 0x{other:02x}"
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::wire::*;
    use super::*;

    #[test]
    fn test_mm_cause_wire_round_trip() {
        for cause in [
            MmCause::IllegalUe,
            MmCause::PlmnNotAllowed,
            MmCause::Congestion,
            MmCause::ImplicitlyDeregistered,
        ] {
            assert_eq!(mm_cause_from_wire(mm_cause_to_wire(cause)).unwrap(), cause);
        }
    }

    #[test]
    fn test_sm_cause_wire_round_trip() {
        for cause in [
            SmCause::InsufficientResources,
            SmCause::UnknownPduSessionType,
            SmCause::ProtocolErrorUnspecified,
        ] {
            assert_eq!(sm_cause_from_wire(sm_cause_to_wire(cause)).unwrap(), cause);
        }
    }
}
