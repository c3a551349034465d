//! 5GSM (5G Session Management)
//!
//! PDU session table, procedure transactions and the establishment /
//! release procedures per 3GPP TS 24.501 Section 6.

mod procedure;
mod sm;

pub use procedure::*;
pub use sm::*;
