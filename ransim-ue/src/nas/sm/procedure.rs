//! Procedure transaction handling
//!
//! Procedure Transaction Identity (PTI) bookkeeping for UE-initiated SM
//! procedures. PTI 0 is reserved for network-initiated procedures; the
//! valid UE range is 1..=254.

use std::fmt;

/// Minimum valid PTI value.
pub const PTI_MIN: u8 = 1;
/// Maximum valid PTI value.
pub const PTI_MAX: u8 = 254;

/// Procedure transaction state (TS 24.501 Section 6.1.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PtState {
    /// No procedure in progress for this PTI
    #[default]
    Inactive,
    /// Procedure initiated, waiting for the network response
    Pending,
}

/// SM message type an outstanding transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmProcedureType {
    /// PDU Session Establishment Request
    PduSessionEstablishment,
}

/// One procedure transaction.
#[derive(Debug, Default)]
pub struct ProcedureTransaction {
    state: PtState,
    psi: u8,
    procedure: Option<SmProcedureType>,
}

impl ProcedureTransaction {
    /// True if no procedure uses this PTI.
    pub fn is_inactive(&self) -> bool {
        self.state == PtState::Inactive
    }

    /// True while a procedure is outstanding.
    pub fn is_pending(&self) -> bool {
        self.state == PtState::Pending
    }

    /// The PSI the outstanding procedure belongs to.
    pub fn psi(&self) -> u8 {
        self.psi
    }

    /// The procedure type.
    pub fn procedure(&self) -> Option<SmProcedureType> {
        self.procedure
    }
}

/// The UE's 255-entry procedure transaction table.
pub struct ProcedureTransactionManager {
    // index 0 is the reserved network-initiated PTI and stays inactive
    transactions: [ProcedureTransaction; 255],
}

impl Default for ProcedureTransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcedureTransactionManager {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            transactions: std::array::from_fn(|_| ProcedureTransaction::default()),
        }
    }

    /// Allocates the lowest free PTI and marks it pending for `psi`.
    pub fn allocate(&mut self, psi: u8, procedure: SmProcedureType) -> Option<u8> {
        for pti in PTI_MIN..=PTI_MAX {
            let entry = &mut self.transactions[pti as usize];
            if entry.is_inactive() {
                entry.state = PtState::Pending;
                entry.psi = psi;
                entry.procedure = Some(procedure);
                return Some(pti);
            }
        }
        None
    }

    /// Frees a PTI, returning it to the pool.
    pub fn free(&mut self, pti: u8) {
        if (PTI_MIN..=PTI_MAX).contains(&pti) {
            self.transactions[pti as usize] = ProcedureTransaction::default();
        }
    }

    /// Looks up a transaction.
    pub fn get(&self, pti: u8) -> Option<&ProcedureTransaction> {
        self.transactions.get(pti as usize)
    }

    /// Checks a received PTI/PSI pair against the outstanding procedure.
    pub fn matches(&self, pti: u8, psi: u8) -> bool {
        if !(PTI_MIN..=PTI_MAX).contains(&pti) {
            return false;
        }
        let entry = &self.transactions[pti as usize];
        entry.is_pending() && entry.psi == psi
    }

    /// Number of outstanding procedures.
    pub fn pending_count(&self) -> usize {
        (PTI_MIN..=PTI_MAX)
            .filter(|&pti| self.transactions[pti as usize].is_pending())
            .count()
    }
}

impl fmt::Debug for ProcedureTransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending: Vec<String> = (PTI_MIN..=PTI_MAX)
            .filter(|&pti| self.transactions[pti as usize].is_pending())
            .map(|pti| format!("PTI[{}]->PSI[{}]", pti, self.transactions[pti as usize].psi))
            .collect();
        write!(f, "ProcedureTransactionManager {{ {pending:?} }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_lowest_free() {
        let mut manager = ProcedureTransactionManager::new();
        assert_eq!(manager.allocate(1, SmProcedureType::PduSessionEstablishment), Some(1));
        assert_eq!(manager.allocate(2, SmProcedureType::PduSessionEstablishment), Some(2));
        manager.free(1);
        assert_eq!(manager.allocate(3, SmProcedureType::PduSessionEstablishment), Some(1));
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut manager = ProcedureTransactionManager::new();
        for _ in PTI_MIN..=PTI_MAX {
            assert!(manager
                .allocate(1, SmProcedureType::PduSessionEstablishment)
                .is_some());
        }
        assert!(manager
            .allocate(1, SmProcedureType::PduSessionEstablishment)
            .is_none());
    }

    #[test]
    fn test_pti_psi_matching() {
        let mut manager = ProcedureTransactionManager::new();
        let pti = manager
            .allocate(5, SmProcedureType::PduSessionEstablishment)
            .unwrap();
        assert!(manager.matches(pti, 5));
        assert!(!manager.matches(pti, 3));
        assert!(!manager.matches(0, 5));
        manager.free(pti);
        assert!(!manager.matches(pti, 5));
    }

    #[test]
    fn test_pending_count() {
        let mut manager = ProcedureTransactionManager::new();
        assert_eq!(manager.pending_count(), 0);
        manager.allocate(1, SmProcedureType::PduSessionEstablishment);
        manager.allocate(2, SmProcedureType::PduSessionEstablishment);
        assert_eq!(manager.pending_count(), 2);
    }
}
