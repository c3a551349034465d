//! NAS security context value types
//!
//! The simulator does not cipher or integrity-protect NAS traffic; the
//! security context is carried as opaque state so the MM state machine
//! can create, replace and wipe it at the points TS 24.501 requires.

/// NAS key set identifier (ngKSI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NasKeySetIdentifier {
    /// Key set identifier value (0..=6), 7 means "no key available"
    pub ksi: u8,
    /// True for a mapped (EPS-derived) context
    pub is_mapped: bool,
}

/// ngKSI value meaning "no key is available".
pub const KSI_NO_KEY: u8 = 7;

impl NasKeySetIdentifier {
    /// The "no key available" identifier.
    pub fn no_key() -> Self {
        Self {
            ksi: KSI_NO_KEY,
            is_mapped: false,
        }
    }

    /// True if this identifier denotes an actual key set.
    pub fn has_key(&self) -> bool {
        self.ksi != KSI_NO_KEY
    }
}

impl Default for NasKeySetIdentifier {
    fn default() -> Self {
        Self::no_key()
    }
}

/// A 5G NAS security context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasSecurityContext {
    /// Key set identifier
    pub ng_ksi: NasKeySetIdentifier,
    /// Uplink NAS count
    pub uplink_count: u32,
    /// Downlink NAS count
    pub downlink_count: u32,
}

impl NasSecurityContext {
    /// Creates a fresh context for the given key set.
    pub fn new(ng_ksi: NasKeySetIdentifier) -> Self {
        Self {
            ng_ksi,
            uplink_count: 0,
            downlink_count: 0,
        }
    }
}
