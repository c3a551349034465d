//! Cross-crate integration scenarios for ransim
//!
//! These tests drive whole nodes through their external seams: the SCTP
//! wire channel stands in for the AMF, the air link connects in-process
//! UE and gNB nodes, and the CLI is exercised over its real UDP wire.

pub mod test_utils;

#[cfg(test)]
mod cli_pause;
#[cfg(test)]
mod gnb_boot;
#[cfg(test)]
mod ue_attach;
