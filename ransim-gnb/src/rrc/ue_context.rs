//! Per-UE RRC context
//!
//! Tracks the RRC connection and allocates transaction identifiers:
//! monotonically increasing modulo the field width, skipping identifiers
//! still outstanding for this UE.

use std::collections::HashSet;

use ransim_rrc::messages::RRC_TRANSACTION_ID_MOD;

/// RRC context of one connected UE.
#[derive(Debug)]
pub struct RrcUeContext {
    /// UE id
    pub ue_id: i32,
    next_transaction_id: u8,
    outstanding: HashSet<u8>,
}

impl RrcUeContext {
    /// Creates a context for a newly connected UE.
    pub fn new(ue_id: i32) -> Self {
        Self {
            ue_id,
            next_transaction_id: 0,
            outstanding: HashSet::new(),
        }
    }

    /// Allocates the next transaction identifier, unique over the
    /// currently outstanding procedures of this UE.
    pub fn allocate_transaction_id(&mut self) -> Option<u8> {
        if self.outstanding.len() as u8 >= RRC_TRANSACTION_ID_MOD {
            return None;
        }
        loop {
            let tid = self.next_transaction_id;
            self.next_transaction_id = (self.next_transaction_id + 1) % RRC_TRANSACTION_ID_MOD;
            if self.outstanding.insert(tid) {
                return Some(tid);
            }
        }
    }

    /// Completes an outstanding procedure, freeing its identifier.
    pub fn complete_transaction(&mut self, tid: u8) {
        self.outstanding.remove(&tid);
    }

    /// Number of outstanding procedures.
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_monotonic_mod_width() {
        let mut ctx = RrcUeContext::new(1);
        let t0 = ctx.allocate_transaction_id().unwrap();
        ctx.complete_transaction(t0);
        let t1 = ctx.allocate_transaction_id().unwrap();
        ctx.complete_transaction(t1);
        assert_eq!((t0, t1), (0, 1));

        // wrap after the field width
        for expected in [2, 3, 0, 1] {
            let t = ctx.allocate_transaction_id().unwrap();
            assert_eq!(t, expected);
            ctx.complete_transaction(t);
        }
    }

    #[test]
    fn test_transaction_ids_unique_over_outstanding() {
        let mut ctx = RrcUeContext::new(1);
        let mut allocated = Vec::new();
        for _ in 0..4 {
            allocated.push(ctx.allocate_transaction_id().unwrap());
        }
        allocated.sort_unstable();
        assert_eq!(allocated, vec![0, 1, 2, 3]);

        // all four outstanding: no identifier available
        assert!(ctx.allocate_transaction_id().is_none());

        ctx.complete_transaction(2);
        assert_eq!(ctx.allocate_transaction_id(), Some(2));
    }
}
