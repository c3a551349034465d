//! gNB NGAP layer
//!
//! AMF context lifecycle, UE-associated signalling, NG Setup, overload
//! handling and the NAS transport bridge toward RRC.

pub mod amf_context;
pub mod task;
pub mod ue_context;

pub use amf_context::{AmfContextSnapshot, AmfOverloadInfo, AmfState, NgapAmfContext};
pub use task::{NgapState, NgapTask};
pub use ue_context::NgapUeContext;
