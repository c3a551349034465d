//! gNB status aggregation

use serde::Serialize;

/// Aggregated gNB status, serialized to YAML for the CLI.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GnbStatusInfo {
    /// True once NGAP completed NG Setup toward every configured AMF
    #[serde(rename = "is-ngap-up")]
    pub is_ngap_up: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_yaml_shape() {
        let status = GnbStatusInfo { is_ngap_up: true };
        let yaml = serde_yaml::to_string(&status).unwrap();
        assert!(yaml.contains("is-ngap-up: true"));
    }
}
