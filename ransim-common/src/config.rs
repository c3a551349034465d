//! Node configuration
//!
//! YAML-backed configuration structures for the gNB and UE nodes, loaded
//! once at boot and shared read-only between tasks.

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{PduSessionType, Plmn, SNssai};

/// Configuration for one AMF endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmfConfig {
    /// IP address of the AMF
    pub address: IpAddr,
    /// SCTP port of the AMF (typically 38412)
    pub port: u16,
}

impl AmfConfig {
    /// Creates a new AMF configuration.
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }
}

/// Default paging DRX cycle advertised in NG Setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagingDrx {
    /// 32 radio frames
    V32,
    /// 64 radio frames
    V64,
    /// 128 radio frames
    #[default]
    V128,
    /// 256 radio frames
    V256,
}

/// gNB (gNodeB) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnbConfig {
    /// gNB identity value (within `gnb_id_length` bits)
    pub gnb_id: u32,
    /// gNB ID length in bits (22-32)
    #[serde(default = "default_gnb_id_length")]
    pub gnb_id_length: u8,
    /// Node name, used for logging and CLI addressing
    pub name: String,
    /// Public Land Mobile Network identifier
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
    /// NR Cell Identity (36-bit)
    pub nci: u64,
    /// Supported network slices
    #[serde(default)]
    pub nssais: Vec<SNssai>,
    /// Default paging DRX advertised to the AMF
    #[serde(default)]
    pub paging_drx: PagingDrx,
    /// Configured AMF endpoints
    pub amf_configs: Vec<AmfConfig>,
    /// Whether to ignore SCTP stream IDs on receive
    #[serde(default)]
    pub ignore_stream_ids: bool,
    /// Enables debug-only stub entry points (e.g. the parameterless
    /// Xn handover trigger)
    #[serde(default)]
    pub debug_stubs: bool,
}

fn default_gnb_id_length() -> u8 {
    32
}

impl GnbConfig {
    /// Loads a gNB configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: GnbConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration invariants at boot.
    pub fn validate(&self) -> Result<(), Error> {
        if !(22..=32).contains(&self.gnb_id_length) {
            return Err(Error::Config(format!(
                "gnb_id_length must be in 22..=32, got {}",
                self.gnb_id_length
            )));
        }
        if self.tac > 0xff_ffff {
            return Err(Error::Config(format!("tac exceeds 24 bits: {}", self.tac)));
        }
        if self.nci > 0xf_ffff_ffff {
            return Err(Error::Config(format!("nci exceeds 36 bits: {}", self.nci)));
        }
        if self.amf_configs.is_empty() {
            return Err(Error::Config("at least one AMF must be configured".into()));
        }
        Ok(())
    }
}

/// Configuration for one default PDU session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// PDU session type (only IPv4 is supported)
    #[serde(rename = "type", default)]
    pub session_type: PduSessionType,
    /// Access Point Name / DNN
    #[serde(default)]
    pub apn: Option<String>,
    /// S-NSSAI for the session
    #[serde(default)]
    pub s_nssai: Option<SNssai>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_type: PduSessionType::Ipv4,
            apn: None,
            s_nssai: None,
        }
    }
}

/// UE (User Equipment) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UeConfig {
    /// Subscription Permanent Identifier (e.g. "imsi-901700000000001").
    /// A UE without a SUPI has no valid SIM.
    #[serde(default)]
    pub supi: Option<String>,
    /// International Mobile Equipment Identity
    #[serde(default)]
    pub imei: Option<String>,
    /// IMEI Software Version
    #[serde(default)]
    pub imeisv: Option<String>,
    /// Home PLMN
    pub plmn: Plmn,
    /// Configured network slices
    #[serde(default)]
    pub nssais: Vec<SNssai>,
    /// Whether to install routes for established sessions
    #[serde(default)]
    pub configure_routing: bool,
    /// Whether the UE drives registration and sessions autonomously
    #[serde(default = "default_true")]
    pub auto_behaviour: bool,
    /// Default PDU sessions to establish after registration
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    /// TUN interface name prefix (the PSI is appended)
    #[serde(default = "default_tun_prefix")]
    pub tun_name_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_tun_prefix() -> String {
    "ransimtun".to_string()
}

impl UeConfig {
    /// Loads a UE configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: UeConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration invariants at boot.
    pub fn validate(&self) -> Result<(), Error> {
        for session in &self.sessions {
            if session.session_type != PduSessionType::Ipv4 {
                return Err(Error::Config(format!(
                    "unsupported PDU session type: {}",
                    session.session_type
                )));
            }
        }
        Ok(())
    }

    /// Returns the node name used for logging and CLI addressing.
    pub fn node_name(&self) -> String {
        self.supi
            .clone()
            .or_else(|| self.imei.as_ref().map(|i| format!("imei-{i}")))
            .unwrap_or_else(|| "ue".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_gnb_config() -> GnbConfig {
        GnbConfig {
            gnb_id: 1,
            gnb_id_length: 32,
            name: "ransim-gnb-1".to_string(),
            plmn: Plmn::new(901, 70, false),
            tac: 1,
            nci: 0x10,
            nssais: vec![SNssai::new(1)],
            paging_drx: PagingDrx::V128,
            amf_configs: vec![AmfConfig::new("127.0.0.1".parse().unwrap(), 38412)],
            ignore_stream_ids: false,
            debug_stubs: false,
        }
    }

    #[test]
    fn test_gnb_config_validation() {
        assert!(test_gnb_config().validate().is_ok());

        let mut bad = test_gnb_config();
        bad.gnb_id_length = 10;
        assert!(bad.validate().is_err());

        let mut bad = test_gnb_config();
        bad.tac = 0x1_000_000;
        assert!(bad.validate().is_err());

        let mut bad = test_gnb_config();
        bad.amf_configs.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_gnb_config_yaml_round_trip() {
        let config = test_gnb_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: GnbConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.name, config.name);
        assert_eq!(parsed.amf_configs.len(), 1);
    }

    #[test]
    fn test_ue_config_defaults() {
        let yaml = "supi: imsi-901700000000001\nplmn: { mcc: 901, mnc: 70 }\n";
        let config: UeConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.auto_behaviour);
        assert_eq!(config.tun_name_prefix, "ransimtun");
        assert_eq!(config.node_name(), "imsi-901700000000001");
    }

    #[test]
    fn test_ue_config_rejects_ipv6_session() {
        let config = UeConfig {
            supi: None,
            imei: None,
            imeisv: None,
            plmn: Plmn::new(901, 70, false),
            nssais: vec![],
            configure_routing: false,
            auto_behaviour: true,
            sessions: vec![SessionConfig {
                session_type: PduSessionType::Ipv6,
                apn: None,
                s_nssai: None,
            }],
            tun_name_prefix: "ransimtun".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
