//! UE TUN layer
//!
//! One kernel tun interface per established PDU session, owned by a
//! dynamically created task for the lifetime of the session.

pub mod interface;
pub mod task;

pub use interface::{is_root, TunError, TunInterface};
pub use task::TunTask;
