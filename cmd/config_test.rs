use edge_syncer::config::SyncConfig;
use edge_syncer::pullzone::PullZoneKind;
use edge_syncer::record::RecordKind;
use edge_syncer::rules::{ActionConfig, MatchKind, TriggerKind};

#[test]
fn test_full_config_deserialize() {
    let yaml = r#"
domains:
  example.com:
    dns_records:
      - type: A
        name: "@"
        value: 203.0.113.10
      - type: MX
        name: "@"
        value: mail.example.com
        priority: 10
        ttl: 3600
    pull_zones:
      example-assets:
        origin_url: https://origin.example.com
        origin_host_header: origin.example.com
        type: volume
        enabled_regions:
          - EU
          - US
        hostnames:
          - cdn.example.com
        force_ssl: true
        edge_rules:
          - description: block admin
            triggers:
              - type: url
                patterns:
                  - "*/admin/*"
            actions:
              - type: block
          - description: old links
            enabled: false
            triggers:
              - type: url
                patterns:
                  - "*/old/*"
                match: none
            actions:
              - type: redirect
                url: https://example.com/new
                status_code: "302"
"#;

    let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
    let domain = &config.domains["example.com"];

    assert_eq!(domain.dns_records.len(), 2);
    assert_eq!(domain.dns_records[0].kind, RecordKind::A);
    assert_eq!(domain.dns_records[0].ttl, 300);
    assert_eq!(domain.dns_records[1].kind, RecordKind::MX);
    assert_eq!(domain.dns_records[1].priority, Some(10));
    assert_eq!(domain.dns_records[1].ttl, 3600);

    let zone = &domain.pull_zones["example-assets"];
    assert_eq!(zone.kind, PullZoneKind::Volume);
    assert_eq!(zone.enabled_regions, vec!["EU", "US"]);
    assert_eq!(zone.hostnames, vec!["cdn.example.com"]);
    assert_eq!(zone.force_ssl, Some(true));

    assert_eq!(zone.edge_rules.len(), 2);
    let blocked = &zone.edge_rules[0];
    assert_eq!(blocked.description, "block admin");
    assert!(blocked.enabled);
    assert_eq!(blocked.trigger_match, MatchKind::All);
    assert_eq!(blocked.triggers[0].kind, TriggerKind::Url);
    assert_eq!(blocked.triggers[0].match_mode, MatchKind::Any);
    assert_eq!(blocked.actions, vec![ActionConfig::Block]);

    let redirect = &zone.edge_rules[1];
    assert!(!redirect.enabled);
    assert_eq!(redirect.triggers[0].match_mode, MatchKind::None);
    assert_eq!(
        redirect.actions[0],
        ActionConfig::Redirect {
            url: "https://example.com/new".to_string(),
            status_code: "302".to_string(),
        }
    );
}

#[test]
fn test_domain_without_pull_zones() {
    let yaml = r#"
domains:
  example.com:
    dns_records:
      - type: CNAME
        name: www
        value: example.com
"#;

    let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
    let domain = &config.domains["example.com"];
    assert_eq!(domain.dns_records.len(), 1);
    assert!(domain.pull_zones.is_empty());
}

#[test]
fn test_empty_config() {
    let config: SyncConfig = serde_yaml::from_str("domains: {}").unwrap();
    assert!(config.domains.is_empty());
}
