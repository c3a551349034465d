//! AMF context management
//!
//! One context per configured AMF, keyed by a process-unique id. The
//! context tracks the association state, the AMF's advertised identity
//! and capacity, and any overload condition.

use std::net::IpAddr;

use serde::Serialize;

use ransim_common::Plmn;
use ransim_ngap::ies::{PlmnSupportItem, ServedGuamiItem};
use ransim_ngap::procedures::{NgSetupResponse, OverloadAction, SliceOverloadItem};

/// AMF association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AmfState {
    /// No SCTP association
    #[default]
    NotConnected,
    /// NG Setup Request sent, waiting for the response
    WaitingNgSetup,
    /// NG Setup complete
    Connected,
}

impl std::fmt::Display for AmfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmfState::NotConnected => write!(f, "NOT_CONNECTED"),
            AmfState::WaitingNgSetup => write!(f, "WAITING_NG_SETUP"),
            AmfState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// Overload condition reported by an AMF.
#[derive(Debug, Clone, Default)]
pub struct AmfOverloadInfo {
    /// True while an Overload Start is in effect
    pub overloaded: bool,
    /// Requested overload action
    pub action: Option<OverloadAction>,
    /// Traffic load reduction percentage
    pub load_reduction_perc: Option<u8>,
    /// Per-slice overload list
    pub slice_overload_list: Vec<SliceOverloadItem>,
}

/// SCTP association descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SctpAssociation {
    /// Association id
    pub association_id: i32,
    /// Inbound stream count
    pub in_streams: u16,
    /// Outbound stream count
    pub out_streams: u16,
}

/// Context of one configured AMF.
#[derive(Debug, Clone)]
pub struct NgapAmfContext {
    /// Context id (process-unique, same as the SCTP client id)
    pub ctx_id: i32,
    /// Network address
    pub address: IpAddr,
    /// SCTP port
    pub port: u16,
    /// Association state
    pub state: AmfState,
    /// SCTP association descriptor
    pub association: SctpAssociation,
    /// AMF name from NG Setup Response
    pub amf_name: Option<String>,
    /// Relative AMF capacity (0-255)
    pub relative_capacity: u8,
    /// Served GUAMI list
    pub served_guami_list: Vec<ServedGuamiItem>,
    /// PLMN/slice support list
    pub plmn_support_list: Vec<PlmnSupportItem>,
    /// Overload condition
    pub overload_info: AmfOverloadInfo,
    /// Next stream to hand out for UE-associated signalling
    next_stream: u16,
}

impl NgapAmfContext {
    /// Creates a context for one configured AMF.
    pub fn new(ctx_id: i32, address: IpAddr, port: u16) -> Self {
        Self {
            ctx_id,
            address,
            port,
            state: AmfState::NotConnected,
            association: SctpAssociation::default(),
            amf_name: None,
            relative_capacity: 0,
            served_guami_list: Vec::new(),
            plmn_support_list: Vec::new(),
            overload_info: AmfOverloadInfo::default(),
            next_stream: 1,
        }
    }

    /// Records the association descriptor when SCTP comes up.
    pub fn on_association_up(&mut self, association_id: i32, in_streams: u16, out_streams: u16) {
        self.association = SctpAssociation {
            association_id,
            in_streams,
            out_streams,
        };
    }

    /// Applies the defaults an AMF advertises in NG Setup Response or
    /// AMF Configuration Update.
    pub fn apply_setup_response(&mut self, response: NgSetupResponse) {
        self.amf_name = Some(response.amf_name);
        self.relative_capacity = response.relative_amf_capacity;
        self.served_guami_list = response.served_guami_list;
        self.plmn_support_list = response.plmn_support_list;
    }

    /// True once NG Setup completed.
    pub fn is_connected(&self) -> bool {
        self.state == AmfState::Connected
    }

    /// Allocates a stream for UE-associated signalling. Stream 0 is
    /// reserved for non-UE-associated traffic; with a single outbound
    /// stream everything shares stream 0.
    pub fn allocate_stream(&mut self) -> u16 {
        if self.association.out_streams <= 1 {
            return 0;
        }
        let stream = self.next_stream;
        self.next_stream += 1;
        if self.next_stream >= self.association.out_streams {
            self.next_stream = 1;
        }
        stream
    }

    /// Checks whether a PLMN is in the AMF's support list.
    pub fn supports_plmn(&self, plmn: &Plmn) -> bool {
        self.plmn_support_list.iter().any(|item| item.plmn == *plmn)
    }

    /// Snapshot for CLI display.
    pub fn snapshot(&self) -> AmfContextSnapshot {
        AmfContextSnapshot {
            id: self.ctx_id,
            address: format!("{}:{}", self.address, self.port),
            state: self.state,
            amf_name: self.amf_name.clone(),
            relative_capacity: self.relative_capacity,
            served_guami_count: self.served_guami_list.len(),
            overloaded: self.overload_info.overloaded,
        }
    }
}

/// Serializable view of an AMF context for the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct AmfContextSnapshot {
    /// Context id
    pub id: i32,
    /// "address:port"
    pub address: String,
    /// Association state
    pub state: AmfState,
    /// AMF name, when known
    #[serde(rename = "amf-name")]
    pub amf_name: Option<String>,
    /// Relative capacity
    #[serde(rename = "relative-capacity")]
    pub relative_capacity: u8,
    /// Number of served GUAMIs
    #[serde(rename = "served-guami-count")]
    pub served_guami_count: usize,
    /// True while overloaded
    pub overloaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransim_common::{Guami, SNssai};

    fn response() -> NgSetupResponse {
        NgSetupResponse {
            amf_name: "AMF1".to_string(),
            served_guami_list: vec![ServedGuamiItem {
                guami: Guami {
                    plmn: Plmn::new(901, 70, false),
                    amf_region_id: 1,
                    amf_set_id: 1,
                    amf_pointer: 0,
                },
                backup_amf_name: None,
            }],
            relative_amf_capacity: 255,
            plmn_support_list: vec![PlmnSupportItem {
                plmn: Plmn::new(901, 70, false),
                slice_support_list: vec![SNssai::new(1)],
            }],
        }
    }

    #[test]
    fn test_context_lifecycle() {
        let mut ctx = NgapAmfContext::new(1, "127.0.0.1".parse().unwrap(), 38412);
        assert_eq!(ctx.state, AmfState::NotConnected);

        ctx.on_association_up(100, 2, 2);
        ctx.state = AmfState::WaitingNgSetup;

        ctx.apply_setup_response(response());
        ctx.state = AmfState::Connected;
        assert!(ctx.is_connected());
        assert_eq!(ctx.amf_name.as_deref(), Some("AMF1"));
        assert_eq!(ctx.relative_capacity, 255);
        assert!(ctx.supports_plmn(&Plmn::new(901, 70, false)));
        assert!(!ctx.supports_plmn(&Plmn::new(1, 1, false)));
    }

    #[test]
    fn test_stream_allocation_wraps() {
        let mut ctx = NgapAmfContext::new(1, "127.0.0.1".parse().unwrap(), 38412);
        ctx.on_association_up(100, 4, 4);
        assert_eq!(ctx.allocate_stream(), 1);
        assert_eq!(ctx.allocate_stream(), 2);
        assert_eq!(ctx.allocate_stream(), 3);
        assert_eq!(ctx.allocate_stream(), 1);
    }

    #[test]
    fn test_single_stream_association_uses_stream_zero() {
        let mut ctx = NgapAmfContext::new(1, "127.0.0.1".parse().unwrap(), 38412);
        ctx.on_association_up(100, 1, 1);
        assert_eq!(ctx.allocate_stream(), 0);
        assert_eq!(ctx.allocate_stream(), 0);
    }

    #[test]
    fn test_snapshot_serializes_to_yaml() {
        let mut ctx = NgapAmfContext::new(2, "10.0.0.5".parse().unwrap(), 38412);
        ctx.apply_setup_response(response());
        let yaml = serde_yaml::to_string(&ctx.snapshot()).unwrap();
        assert!(yaml.contains("amf-name: AMF1"));
        assert!(yaml.contains("id: 2"));
    }
}
