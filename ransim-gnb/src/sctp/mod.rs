//! gNB SCTP layer
//!
//! One association per configured AMF. Socket I/O lives outside this
//! task; the task owns association bookkeeping and payload routing.

pub mod task;

pub use task::{SctpTask, SctpWireTx};
