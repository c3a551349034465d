//! 5GMM messages
//!
//! Registration and de-registration message subsets (3GPP TS 24.501
//! Sections 8.2.6, 8.2.12-8.2.15).

use ransim_common::{Guti, Tai};

use crate::enums::{
    DeRegistrationAccessType, FollowOnRequest, MmCause, ReRegistrationRequired, RegistrationType,
    SwitchOff,
};
use crate::security::NasKeySetIdentifier;

/// 5GS mobile identity (TS 24.501 Section 9.11.3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileIdentity {
    /// No identity available
    NoIdentity,
    /// SUCI carrying the SUPI in plain form (null protection scheme)
    Suci {
        /// The SUPI string, e.g. "imsi-901700000000001"
        supi: String,
    },
    /// 5G-GUTI
    Guti(Guti),
}

impl MobileIdentity {
    /// The "no identity" value.
    pub fn no_identity() -> Self {
        MobileIdentity::NoIdentity
    }
}

/// De-registration type IE (TS 24.501 Section 9.11.3.20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeRegistrationType {
    /// Access type being de-registered
    pub access_type: DeRegistrationAccessType,
    /// Re-registration required (UE-terminated only)
    pub re_registration_required: ReRegistrationRequired,
    /// Switch-off bit
    pub switch_off: SwitchOff,
}

impl DeRegistrationType {
    /// Creates a de-registration type IE.
    pub fn new(
        access_type: DeRegistrationAccessType,
        re_registration_required: ReRegistrationRequired,
        switch_off: SwitchOff,
    ) -> Self {
        Self {
            access_type,
            re_registration_required,
            switch_off,
        }
    }
}

/// Registration Request (UE -> network).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    /// 5GS registration type
    pub registration_type: RegistrationType,
    /// Follow-on request bit
    pub follow_on_request: FollowOnRequest,
    /// NAS key set identifier
    pub ng_ksi: NasKeySetIdentifier,
    /// Mobile identity
    pub mobile_identity: MobileIdentity,
}

/// Registration Accept (network -> UE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationAccept {
    /// Assigned 5G-GUTI, if any
    pub guti: Option<Guti>,
    /// TAI list the registration is valid in
    pub tai_list: Vec<Tai>,
    /// T3512 value in seconds, if provided
    pub t3512_secs: Option<u32>,
}

/// Registration Reject (network -> UE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReject {
    /// Reject cause
    pub mm_cause: MmCause,
}

/// De-registration Request (UE originating).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregistrationRequestUeOriginating {
    /// De-registration type
    pub deregistration_type: DeRegistrationType,
    /// NAS key set identifier
    pub ng_ksi: NasKeySetIdentifier,
    /// Mobile identity
    pub mobile_identity: MobileIdentity,
}

impl DeregistrationRequestUeOriginating {
    /// Creates a UE-originating de-registration request.
    pub fn new(
        deregistration_type: DeRegistrationType,
        ng_ksi: NasKeySetIdentifier,
        mobile_identity: MobileIdentity,
    ) -> Self {
        Self {
            deregistration_type,
            ng_ksi,
            mobile_identity,
        }
    }
}

/// De-registration Accept (UE originating, network -> UE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeregistrationAcceptUeOriginating;

/// De-registration Request (UE terminated, network -> UE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregistrationRequestUeTerminated {
    /// De-registration type
    pub deregistration_type: DeRegistrationType,
    /// 5GMM cause, if provided
    pub mm_cause: Option<MmCause>,
}

impl DeregistrationRequestUeTerminated {
    /// Creates a network-initiated de-registration request.
    pub fn new(deregistration_type: DeRegistrationType) -> Self {
        Self {
            deregistration_type,
            mm_cause: None,
        }
    }
}

/// De-registration Accept (UE terminated, UE -> network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeregistrationAcceptUeTerminated;
