//! gNB MR layer
//!
//! Air-interface stub carrying RRC signalling and PSI-tagged user-plane
//! frames between the gNB and in-process UE peers.

pub mod task;

pub use task::{MrState, MrTask};
