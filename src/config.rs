//! Declarative description of the desired remote state, as loaded from a
//! YAML document keyed by domain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pullzone::PullZoneConfig;
use crate::record::RecordConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub domains: BTreeMap<String, DomainConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DomainConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_records: Vec<RecordConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pull_zones: BTreeMap<String, PullZoneConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    #[test]
    fn test_minimal_config() {
        let config: SyncConfig = serde_yaml::from_str("domains: {}").unwrap();
        assert!(config.domains.is_empty());
    }

    #[test]
    fn test_domain_with_records_and_zones() {
        let yaml = r#"
domains:
  example.com:
    dns_records:
      - type: A
        name: "@"
        value: 203.0.113.10
      - type: CNAME
        name: www
        value: example.com
        ttl: 3600
    pull_zones:
      example-assets:
        origin_url: https://origin.example.com
        hostnames:
          - cdn.example.com
        force_ssl: true
"#;
        let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        let domain = &config.domains["example.com"];
        assert_eq!(domain.dns_records.len(), 2);
        assert_eq!(domain.dns_records[0].kind, RecordKind::A);
        assert_eq!(domain.dns_records[1].ttl, 3600);

        let zone = &domain.pull_zones["example-assets"];
        assert_eq!(zone.hostnames, vec!["cdn.example.com"]);
        assert_eq!(zone.force_ssl, Some(true));
    }

    #[test]
    fn test_domains_keep_sorted_order() {
        let yaml = r#"
domains:
  zeta.org: {}
  alpha.net: {}
"#;
        let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<&String> = config.domains.keys().collect();
        assert_eq!(names, vec!["alpha.net", "zeta.org"]);
    }
}
