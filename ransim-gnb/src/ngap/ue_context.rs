//! NGAP UE context management
//!
//! One context per UE with an active RRC connection or an outstanding
//! UE-associated NGAP procedure. Created on the first uplink NAS toward
//! an AMF, destroyed on RRC release, radio link failure or NGAP-initiated
//! release.

use ransim_common::Tai;
use ransim_ngap::ies::UeSecurityCapabilities;

/// NGAP UE context.
#[derive(Debug, Clone)]
pub struct NgapUeContext {
    /// UE id (process-unique, shared with RRC and MR)
    pub ue_id: i32,
    /// Associated AMF context id
    pub amf_id: i32,
    /// RAN UE NGAP ID, allocated locally, unique within the gNB
    pub ran_ue_ngap_id: i64,
    /// AMF UE NGAP ID, assigned by the AMF on its first downlink reply
    pub amf_ue_ngap_id: Option<i64>,
    /// Uplink SCTP stream for UE-associated signalling
    pub uplink_stream: u16,
    /// Downlink SCTP stream observed for this UE
    pub downlink_stream: u16,
    /// Security capabilities snapshot
    pub security_capabilities: UeSecurityCapabilities,
    /// Serving cell identity (NCI)
    pub cell_identity: u64,
    /// Last known tracking area
    pub last_tai: Option<Tai>,
}

impl NgapUeContext {
    /// Creates a context for a UE's first uplink NAS message.
    pub fn new(ue_id: i32, ran_ue_ngap_id: i64, amf_id: i32, uplink_stream: u16, cell_identity: u64) -> Self {
        Self {
            ue_id,
            amf_id,
            ran_ue_ngap_id,
            amf_ue_ngap_id: None,
            uplink_stream,
            downlink_stream: uplink_stream,
            security_capabilities: UeSecurityCapabilities::all_enabled(),
            cell_identity,
            last_tai: None,
        }
    }

    /// Binds the AMF-assigned id after the initial downlink reply.
    pub fn bind_amf_ue_ngap_id(&mut self, id: i64) {
        if self.amf_ue_ngap_id.is_none() {
            self.amf_ue_ngap_id = Some(id);
        }
    }

    /// True once the AMF completed the initial downlink reply.
    pub fn has_id_pair(&self) -> bool {
        matches!(self.amf_ue_ngap_id, Some(id) if id > 0)
    }
}
