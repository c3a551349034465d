//! gNB RRC layer
//!
//! Per-UE RRC contexts, downlink/uplink NAS carriage over DCCH, paging
//! over PCCH and connection release.

pub mod task;
pub mod ue_context;

pub use task::RrcTask;
pub use ue_context::RrcUeContext;
