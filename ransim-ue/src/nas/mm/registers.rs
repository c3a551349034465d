//! MM state registers
//!
//! 3GPP TS 24.501 Section 5.1.3. The four registers (MM state with its
//! sub-state, RM, CM, 5GS update status) are packaged in one value whose
//! only mutators live on `NasMm`, so switch hooks and listener events
//! always fire in lock-step with the register write.

use std::fmt;

/// Registration Management state (Section 5.1.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RmState {
    /// RM-DEREGISTERED
    #[default]
    Deregistered,
    /// RM-REGISTERED
    Registered,
}

impl fmt::Display for RmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RmState::Deregistered => write!(f, "RM-DEREGISTERED"),
            RmState::Registered => write!(f, "RM-REGISTERED"),
        }
    }
}

/// Connection Management state (Section 5.1.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmState {
    /// CM-IDLE
    #[default]
    Idle,
    /// CM-CONNECTED
    Connected,
}

impl fmt::Display for CmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmState::Idle => write!(f, "CM-IDLE"),
            CmState::Connected => write!(f, "CM-CONNECTED"),
        }
    }
}

/// Main MM state (Section 5.1.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MmState {
    /// 5GMM-NULL
    Null,
    /// 5GMM-DEREGISTERED
    #[default]
    Deregistered,
    /// 5GMM-REGISTERED-INITIATED
    RegisteredInitiated,
    /// 5GMM-REGISTERED
    Registered,
    /// 5GMM-DEREGISTERED-INITIATED
    DeregisteredInitiated,
    /// 5GMM-SERVICE-REQUEST-INITIATED
    ServiceRequestInitiated,
}

impl fmt::Display for MmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmState::Null => write!(f, "5GMM-NULL"),
            MmState::Deregistered => write!(f, "5GMM-DEREGISTERED"),
            MmState::RegisteredInitiated => write!(f, "5GMM-REGISTERED-INITIATED"),
            MmState::Registered => write!(f, "5GMM-REGISTERED"),
            MmState::DeregisteredInitiated => write!(f, "5GMM-DEREGISTERED-INITIATED"),
            MmState::ServiceRequestInitiated => write!(f, "5GMM-SERVICE-REQUEST-INITIATED"),
        }
    }
}

/// MM sub-state (Section 5.1.3.2). `..Na` marks the "not assigned"
/// placeholder sub-state of each main state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MmSubState {
    /// 5GMM-NULL, no sub-state
    NullNa,
    /// 5GMM-DEREGISTERED, sub-state not yet selected
    #[default]
    DeregisteredNa,
    /// 5GMM-DEREGISTERED.NORMAL-SERVICE
    DeregisteredNormalService,
    /// 5GMM-DEREGISTERED.LIMITED-SERVICE
    DeregisteredLimitedService,
    /// 5GMM-DEREGISTERED.ATTEMPTING-REGISTRATION
    DeregisteredAttemptingRegistration,
    /// 5GMM-DEREGISTERED.PLMN-SEARCH
    DeregisteredPlmnSearch,
    /// 5GMM-DEREGISTERED.NO-SUPI
    DeregisteredNoSupi,
    /// 5GMM-DEREGISTERED.NO-CELL-AVAILABLE
    DeregisteredNoCellAvailable,
    /// 5GMM-REGISTERED-INITIATED, no sub-state
    RegisteredInitiatedNa,
    /// 5GMM-REGISTERED.NORMAL-SERVICE
    RegisteredNormalService,
    /// 5GMM-REGISTERED.PLMN-SEARCH
    RegisteredPlmnSearch,
    /// 5GMM-REGISTERED.NO-CELL-AVAILABLE
    RegisteredNoCellAvailable,
    /// 5GMM-REGISTERED.LIMITED-SERVICE
    RegisteredLimitedService,
    /// 5GMM-DEREGISTERED-INITIATED, no sub-state
    DeregisteredInitiatedNa,
    /// 5GMM-SERVICE-REQUEST-INITIATED, no sub-state
    ServiceRequestInitiatedNa,
}

impl MmSubState {
    /// The main MM state this sub-state belongs to.
    pub fn main_state(&self) -> MmState {
        match self {
            MmSubState::NullNa => MmState::Null,
            MmSubState::DeregisteredNa
            | MmSubState::DeregisteredNormalService
            | MmSubState::DeregisteredLimitedService
            | MmSubState::DeregisteredAttemptingRegistration
            | MmSubState::DeregisteredPlmnSearch
            | MmSubState::DeregisteredNoSupi
            | MmSubState::DeregisteredNoCellAvailable => MmState::Deregistered,
            MmSubState::RegisteredInitiatedNa => MmState::RegisteredInitiated,
            MmSubState::RegisteredNormalService
            | MmSubState::RegisteredPlmnSearch
            | MmSubState::RegisteredNoCellAvailable
            | MmSubState::RegisteredLimitedService => MmState::Registered,
            MmSubState::DeregisteredInitiatedNa => MmState::DeregisteredInitiated,
            MmSubState::ServiceRequestInitiatedNa => MmState::ServiceRequestInitiated,
        }
    }

    /// True for the sub-states in which the UE keeps searching a PLMN.
    pub fn is_searching(&self) -> bool {
        matches!(
            self,
            MmSubState::DeregisteredPlmnSearch
                | MmSubState::DeregisteredNoCellAvailable
                | MmSubState::RegisteredNoCellAvailable
        )
    }
}

impl fmt::Display for MmSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmSubState::NullNa => write!(f, "5GMM-NULL"),
            MmSubState::DeregisteredNa => write!(f, "5GMM-DEREGISTERED"),
            MmSubState::DeregisteredNormalService => {
                write!(f, "5GMM-DEREGISTERED.NORMAL-SERVICE")
            }
            MmSubState::DeregisteredLimitedService => {
                write!(f, "5GMM-DEREGISTERED.LIMITED-SERVICE")
            }
            MmSubState::DeregisteredAttemptingRegistration => {
                write!(f, "5GMM-DEREGISTERED.ATTEMPTING-REGISTRATION")
            }
            MmSubState::DeregisteredPlmnSearch => write!(f, "5GMM-DEREGISTERED.PLMN-SEARCH"),
            MmSubState::DeregisteredNoSupi => write!(f, "5GMM-DEREGISTERED.NO-SUPI"),
            MmSubState::DeregisteredNoCellAvailable => {
                write!(f, "5GMM-DEREGISTERED.NO-CELL-AVAILABLE")
            }
            MmSubState::RegisteredInitiatedNa => write!(f, "5GMM-REGISTERED-INITIATED"),
            MmSubState::RegisteredNormalService => write!(f, "5GMM-REGISTERED.NORMAL-SERVICE"),
            MmSubState::RegisteredPlmnSearch => write!(f, "5GMM-REGISTERED.PLMN-SEARCH"),
            MmSubState::RegisteredNoCellAvailable => {
                write!(f, "5GMM-REGISTERED.NO-CELL-AVAILABLE")
            }
            MmSubState::RegisteredLimitedService => write!(f, "5GMM-REGISTERED.LIMITED-SERVICE"),
            MmSubState::DeregisteredInitiatedNa => write!(f, "5GMM-DEREGISTERED-INITIATED"),
            MmSubState::ServiceRequestInitiatedNa => {
                write!(f, "5GMM-SERVICE-REQUEST-INITIATED")
            }
        }
    }
}

/// 5GS update status (Section 5.1.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UState {
    /// U1 UPDATED
    #[default]
    U1Updated,
    /// U2 NOT UPDATED
    U2NotUpdated,
    /// U3 ROAMING NOT ALLOWED
    U3RoamingNotAllowed,
}

impl fmt::Display for UState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UState::U1Updated => write!(f, "U1-UPDATED"),
            UState::U2NotUpdated => write!(f, "U2-NOT-UPDATED"),
            UState::U3RoamingNotAllowed => write!(f, "U3-ROAMING-NOT-ALLOWED"),
        }
    }
}

/// The packaged MM registers. Read access is free; every write goes
/// through the `NasMm` switch methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmRegisters {
    pub(crate) mm_state: MmState,
    pub(crate) mm_sub_state: MmSubState,
    pub(crate) rm_state: RmState,
    pub(crate) cm_state: CmState,
    pub(crate) u_state: UState,
}

impl MmRegisters {
    /// Current main MM state.
    pub fn mm_state(&self) -> MmState {
        self.mm_state
    }

    /// Current MM sub-state.
    pub fn mm_sub_state(&self) -> MmSubState {
        self.mm_sub_state
    }

    /// Current RM state.
    pub fn rm_state(&self) -> RmState {
        self.rm_state
    }

    /// Current CM state.
    pub fn cm_state(&self) -> CmState {
        self.cm_state
    }

    /// Current 5GS update status.
    pub fn u_state(&self) -> UState {
        self.u_state
    }
}

impl fmt::Display for MmRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.mm_sub_state, self.rm_state, self.cm_state, self.u_state
        )
    }
}
