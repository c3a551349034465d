//! NGAP cause values
//!
//! 3GPP TS 38.413 Section 9.3.1.2. Only the cause values the simulator
//! actually raises or interprets are modelled.

use std::fmt;

/// Radio network layer causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioNetworkCause {
    /// Unspecified radio network failure
    Unspecified,
    /// Handover desirable for radio reasons
    HandoverDesirableForRadioReason,
    /// Release due to NG-RAN generated reason
    ReleaseDueToNgranGeneratedReason,
    /// Radio connection with UE lost
    RadioConnectionWithUeLost,
    /// Unknown local UE NGAP ID
    UnknownLocalUeNgapId,
    /// Inconsistent remote UE NGAP ID
    InconsistentRemoteUeNgapId,
}

/// Transport layer causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCause {
    /// Transport resource unavailable
    TransportResourceUnavailable,
    /// Unspecified transport failure
    Unspecified,
}

/// NAS causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasCause {
    /// Normal release
    NormalRelease,
    /// De-registration
    Deregister,
    /// Unspecified NAS failure
    Unspecified,
}

/// Protocol causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolCause {
    /// Transfer syntax error
    TransferSyntaxError,
    /// Semantic error
    SemanticError,
    /// Message not compatible with receiver state
    MessageNotCompatibleWithReceiverState,
    /// Unspecified protocol failure
    Unspecified,
}

/// Miscellaneous causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscCause {
    /// Control processing overload
    ControlProcessingOverload,
    /// Unknown PLMN
    UnknownPlmn,
    /// Unspecified failure
    Unspecified,
}

/// An NGAP cause: a cause group with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgapCause {
    /// Radio network layer cause
    RadioNetwork(RadioNetworkCause),
    /// Transport layer cause
    Transport(TransportCause),
    /// NAS cause
    Nas(NasCause),
    /// Protocol cause
    Protocol(ProtocolCause),
    /// Miscellaneous cause
    Misc(MiscCause),
}

impl NgapCause {
    /// Wire form: group tag + value ordinal.
    pub(crate) fn to_wire(self) -> (u8, u8) {
        match self {
            NgapCause::RadioNetwork(v) => (0, v as u8),
            NgapCause::Transport(v) => (1, v as u8),
            NgapCause::Nas(v) => (2, v as u8),
            NgapCause::Protocol(v) => (3, v as u8),
            NgapCause::Misc(v) => (4, v as u8),
        }
    }

    /// Decodes the wire form back to a cause; `None` for unknown values.
    pub(crate) fn from_wire(group: u8, value: u8) -> Option<Self> {
        Some(match group {
            0 => NgapCause::RadioNetwork(match value {
                0 => RadioNetworkCause::Unspecified,
                1 => RadioNetworkCause::HandoverDesirableForRadioReason,
                2 => RadioNetworkCause::ReleaseDueToNgranGeneratedReason,
                3 => RadioNetworkCause::RadioConnectionWithUeLost,
                4 => RadioNetworkCause::UnknownLocalUeNgapId,
                5 => RadioNetworkCause::InconsistentRemoteUeNgapId,
                _ => return None,
            }),
            1 => NgapCause::Transport(match value {
                0 => TransportCause::TransportResourceUnavailable,
                1 => TransportCause::Unspecified,
                _ => return None,
            }),
            2 => NgapCause::Nas(match value {
                0 => NasCause::NormalRelease,
                1 => NasCause::Deregister,
                2 => NasCause::Unspecified,
                _ => return None,
            }),
            3 => NgapCause::Protocol(match value {
                0 => ProtocolCause::TransferSyntaxError,
                1 => ProtocolCause::SemanticError,
                2 => ProtocolCause::MessageNotCompatibleWithReceiverState,
                3 => ProtocolCause::Unspecified,
                _ => return None,
            }),
            4 => NgapCause::Misc(match value {
                0 => MiscCause::ControlProcessingOverload,
                1 => MiscCause::UnknownPlmn,
                2 => MiscCause::Unspecified,
                _ => return None,
            }),
            _ => return None,
        })
    }
}

impl fmt::Display for NgapCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NgapCause::RadioNetwork(v) => write!(f, "radio-network/{v:?}"),
            NgapCause::Transport(v) => write!(f, "transport/{v:?}"),
            NgapCause::Nas(v) => write!(f, "nas/{v:?}"),
            NgapCause::Protocol(v) => write!(f, "protocol/{v:?}"),
            NgapCause::Misc(v) => write!(f, "misc/{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_wire_round_trip() {
        let causes = [
            NgapCause::Transport(TransportCause::Unspecified),
            NgapCause::RadioNetwork(RadioNetworkCause::RadioConnectionWithUeLost),
            NgapCause::Protocol(ProtocolCause::SemanticError),
            NgapCause::Misc(MiscCause::UnknownPlmn),
        ];
        for cause in causes {
            let (group, value) = cause.to_wire();
            assert_eq!(NgapCause::from_wire(group, value), Some(cause));
        }
    }

    #[test]
    fn test_cause_unknown_wire_value() {
        assert_eq!(NgapCause::from_wire(9, 0), None);
        assert_eq!(NgapCause::from_wire(1, 99), None);
    }
}
