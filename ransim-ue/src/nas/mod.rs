//! UE NAS layer
//!
//! 5GMM (mobility management) and 5GSM (session management) state
//! machines, both driven by the single NAS task.

pub mod mm;
pub mod sm;
pub mod task;

pub use task::{NasContext, NasTask};
