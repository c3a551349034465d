//! UE MR layer
//!
//! Air-interface stub toward the serving gNB: carries RRC-channel PDUs
//! uplink/downlink and PSI-tagged user-plane frames.

pub mod task;

pub use task::MrTask;
