//! UE RRC layer
//!
//! Cell attachment and NAS carriage between the NAS task and the air
//! interface.

pub mod task;

pub use task::RrcTask;
