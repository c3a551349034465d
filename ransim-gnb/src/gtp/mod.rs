//! gNB GTP layer
//!
//! User-plane tunnel table: downlink decapsulation toward the air
//! interface, uplink encapsulation toward the UPF.

pub mod task;

pub use task::{GtpTask, UpfDatagram};
