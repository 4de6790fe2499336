use std::fmt;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

////////////////////////////////////////////////////////////
// Record kinds
////////////////////////////////////////////////////////////

/// DNS record kinds, with the provider's numeric wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RecordKind {
    A,
    AAAA,
    CNAME,
    TXT,
    MX,
    #[serde(rename = "RDR", alias = "REDIRECT")]
    Redirect,
    #[serde(rename = "PZ", alias = "PULLZONE")]
    PullZone,
    #[serde(rename = "SRV")]
    Srv,
    #[serde(rename = "CAA")]
    Caa,
    #[serde(rename = "PTR")]
    Ptr,
    #[serde(rename = "SCR", alias = "SCRIPT")]
    Script,
    #[serde(rename = "NS")]
    Ns,
}

impl RecordKind {
    pub fn code(self) -> u8 {
        match self {
            RecordKind::A => 0,
            RecordKind::AAAA => 1,
            RecordKind::CNAME => 2,
            RecordKind::TXT => 3,
            RecordKind::MX => 4,
            RecordKind::Redirect => 5,
            RecordKind::PullZone => 7,
            RecordKind::Srv => 8,
            RecordKind::Caa => 9,
            RecordKind::Ptr => 10,
            RecordKind::Script => 11,
            RecordKind::Ns => 12,
        }
    }

    /// Unrecognized remote codes decode to `A`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => RecordKind::A,
            1 => RecordKind::AAAA,
            2 => RecordKind::CNAME,
            3 => RecordKind::TXT,
            4 => RecordKind::MX,
            5 => RecordKind::Redirect,
            7 => RecordKind::PullZone,
            8 => RecordKind::Srv,
            9 => RecordKind::Caa,
            10 => RecordKind::Ptr,
            11 => RecordKind::Script,
            12 => RecordKind::Ns,
            _ => RecordKind::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::AAAA => "AAAA",
            RecordKind::CNAME => "CNAME",
            RecordKind::TXT => "TXT",
            RecordKind::MX => "MX",
            RecordKind::Redirect => "RDR",
            RecordKind::PullZone => "PZ",
            RecordKind::Srv => "SRV",
            RecordKind::Caa => "CAA",
            RecordKind::Ptr => "PTR",
            RecordKind::Script => "SCR",
            RecordKind::Ns => "NS",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

////////////////////////////////////////////////////////////
// Normalization
////////////////////////////////////////////////////////////

/// Lowercase, trim, and map the `@` root marker to the empty string.
pub fn normalize_name(name: &str) -> String {
    let n = name.trim().to_lowercase();
    if n == "@" { String::new() } else { n }
}

/// AAAA values are re-rendered in canonical IPv6 form so that textual
/// variants of the same address compare equal. Everything else passes
/// through untouched, including AAAA values that fail to parse.
pub fn normalize_value(value: &str, kind: RecordKind) -> String {
    if kind == RecordKind::AAAA {
        if let Ok(addr) = value.parse::<Ipv6Addr>() {
            return addr.to_string();
        }
    }
    value.to_string()
}

fn opt_or_zero(value: Option<i64>) -> i64 {
    value.unwrap_or(0)
}

////////////////////////////////////////////////////////////
// Record
////////////////////////////////////////////////////////////

/// A DNS record, desired or remote. `id` is remote-assigned and unset
/// before creation.
#[derive(Debug, Clone, PartialEq)]
pub struct DnsRecord {
    pub kind: RecordKind,
    pub name: String,
    pub value: String,
    pub ttl: u32,
    pub priority: Option<i64>,
    pub weight: Option<i64>,
    pub port: Option<i64>,
    pub id: Option<i64>,
}

impl DnsRecord {
    /// Identity: same kind, same normalized name, same normalized value.
    pub fn matches(&self, other: &DnsRecord) -> bool {
        self.kind == other.kind
            && normalize_name(&self.name) == normalize_name(&other.name)
            && normalize_value(&self.value, self.kind)
                == normalize_value(&other.value, other.kind)
    }

    /// A matching record still needs an update when the ttl differs or any
    /// of priority/weight/port differ, with absent treated as zero.
    pub fn needs_update(&self, desired: &DnsRecord) -> bool {
        if !self.matches(desired) {
            return false;
        }
        self.ttl != desired.ttl
            || opt_or_zero(self.priority) != opt_or_zero(desired.priority)
            || opt_or_zero(self.weight) != opt_or_zero(desired.weight)
            || opt_or_zero(self.port) != opt_or_zero(desired.port)
    }

    /// One-line rendering used in sync reports.
    pub fn describe(&self) -> String {
        format!("{} {} -> {}", self.kind, self.name, self.value)
    }

    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "Type": self.kind.code(),
            "Name": self.name,
            "Value": self.value,
            "Ttl": self.ttl,
        });
        if let Some(priority) = self.priority {
            payload["Priority"] = priority.into();
        }
        if let Some(weight) = self.weight {
            payload["Weight"] = weight.into();
        }
        if let Some(port) = self.port {
            payload["Port"] = port.into();
        }
        payload
    }

    pub fn from_api(data: &Value) -> Self {
        Self {
            id: data["Id"].as_i64(),
            kind: RecordKind::from_code(data["Type"].as_u64().unwrap_or(0) as u8),
            name: data["Name"].as_str().unwrap_or("").to_string(),
            value: data["Value"].as_str().unwrap_or("").to_string(),
            ttl: data["Ttl"].as_u64().unwrap_or(300) as u32,
            priority: data["Priority"].as_i64(),
            weight: data["Weight"].as_i64(),
            port: data["Port"].as_i64(),
        }
    }
}

////////////////////////////////////////////////////////////
// Configuration shape
////////////////////////////////////////////////////////////

pub(crate) fn default_ttl() -> u32 {
    300
}

/// A desired record as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecordConfig {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub name: String,
    pub value: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            kind: RecordKind::A,
            name: String::new(),
            value: String::new(),
            ttl: default_ttl(),
            priority: None,
            weight: None,
            port: None,
        }
    }
}

impl RecordConfig {
    pub fn to_record(&self) -> DnsRecord {
        DnsRecord {
            kind: self.kind,
            name: self.name.clone(),
            value: self.value.clone(),
            ttl: self.ttl,
            priority: self.priority,
            weight: self.weight,
            port: self.port,
            id: None,
        }
    }

    /// Export form of a remote record: the root name renders as `@` and
    /// zero-valued optional fields are dropped.
    pub fn from_record(record: &DnsRecord) -> Self {
        let name = if record.name.is_empty() {
            "@".to_string()
        } else {
            record.name.clone()
        };
        Self {
            kind: record.kind,
            name,
            value: record.value.clone(),
            ttl: record.ttl,
            priority: record.priority.filter(|p| *p != 0),
            weight: record.weight.filter(|w| *w != 0),
            port: record.port.filter(|p| *p != 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: RecordKind, name: &str, value: &str, ttl: u32) -> DnsRecord {
        DnsRecord {
            kind,
            name: name.to_string(),
            value: value.to_string(),
            ttl,
            priority: None,
            weight: None,
            port: None,
            id: None,
        }
    }

    #[test]
    fn test_normalize_name_root_forms() {
        assert_eq!(normalize_name("@"), "");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("  @  "), "");
    }

    #[test]
    fn test_normalize_name_lowercase_and_trim() {
        assert_eq!(normalize_name(" WWW "), "www");
        assert_eq!(normalize_name("Sub.Example"), "sub.example");
    }

    #[test]
    fn test_normalize_value_ipv6_forms() {
        assert_eq!(
            normalize_value("2001:0db8:0000:0000:0000:0000:0000:0001", RecordKind::AAAA),
            normalize_value("2001:db8::1", RecordKind::AAAA),
        );
    }

    #[test]
    fn test_normalize_value_invalid_ipv6_passthrough() {
        assert_eq!(
            normalize_value("not-an-address", RecordKind::AAAA),
            "not-an-address"
        );
    }

    #[test]
    fn test_normalize_value_non_aaaa_identity() {
        assert_eq!(
            normalize_value("2001:db8::1", RecordKind::TXT),
            "2001:db8::1"
        );
    }

    #[test]
    fn test_matches_at_vs_empty() {
        let a = record(RecordKind::A, "@", "1.2.3.4", 300);
        let b = record(RecordKind::A, "", "1.2.3.4", 600);
        assert!(a.matches(&b));
    }

    #[test]
    fn test_matches_name_case() {
        let a = record(RecordKind::CNAME, "WWW", "example.com", 300);
        let b = record(RecordKind::CNAME, "www", "example.com", 300);
        assert!(a.matches(&b));
    }

    #[test]
    fn test_no_match_different_kind() {
        let a = record(RecordKind::A, "www", "1.2.3.4", 300);
        let b = record(RecordKind::TXT, "www", "1.2.3.4", 300);
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_no_match_different_value() {
        let a = record(RecordKind::A, "www", "1.2.3.4", 300);
        let b = record(RecordKind::A, "www", "5.6.7.8", 300);
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_needs_update_ttl() {
        let current = record(RecordKind::A, "@", "1.2.3.4", 300);
        let desired = record(RecordKind::A, "@", "1.2.3.4", 600);
        assert!(current.needs_update(&desired));
    }

    #[test]
    fn test_no_update_when_identical() {
        let current = record(RecordKind::A, "@", "1.2.3.4", 300);
        assert!(!current.needs_update(&current.clone()));
    }

    #[test]
    fn test_no_update_absent_vs_zero() {
        let mut current = record(RecordKind::MX, "@", "mail.example.com", 300);
        current.priority = Some(0);
        current.weight = None;
        let mut desired = current.clone();
        desired.priority = None;
        desired.weight = Some(0);
        assert!(!current.needs_update(&desired));
    }

    #[test]
    fn test_needs_update_priority_changed() {
        let mut current = record(RecordKind::MX, "@", "mail.example.com", 300);
        current.priority = Some(10);
        let mut desired = current.clone();
        desired.priority = Some(20);
        assert!(current.needs_update(&desired));
    }

    #[test]
    fn test_no_update_for_non_matching() {
        let current = record(RecordKind::A, "www", "1.2.3.4", 300);
        let desired = record(RecordKind::A, "www", "5.6.7.8", 600);
        assert!(!current.needs_update(&desired));
    }

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in [
            RecordKind::A,
            RecordKind::AAAA,
            RecordKind::CNAME,
            RecordKind::TXT,
            RecordKind::MX,
            RecordKind::Redirect,
            RecordKind::PullZone,
            RecordKind::Srv,
            RecordKind::Caa,
            RecordKind::Ptr,
            RecordKind::Script,
            RecordKind::Ns,
        ] {
            assert_eq!(RecordKind::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn test_unknown_code_defaults_to_a() {
        assert_eq!(RecordKind::from_code(99), RecordKind::A);
        assert_eq!(RecordKind::from_code(6), RecordKind::A);
    }

    #[test]
    fn test_payload_includes_optionals_only_when_set() {
        let mut srv = record(RecordKind::Srv, "_sip._tcp", "sip.example.com", 300);
        srv.priority = Some(10);
        srv.weight = Some(5);
        srv.port = Some(5060);
        let payload = srv.to_payload();
        assert_eq!(payload["Type"], 8);
        assert_eq!(payload["Priority"], 10);
        assert_eq!(payload["Weight"], 5);
        assert_eq!(payload["Port"], 5060);

        let plain = record(RecordKind::A, "@", "1.2.3.4", 300).to_payload();
        assert!(plain.get("Priority").is_none());
    }

    #[test]
    fn test_from_api_unknown_type() {
        let data = json!({"Id": 3, "Type": 42, "Name": "x", "Value": "y"});
        let record = DnsRecord::from_api(&data);
        assert_eq!(record.kind, RecordKind::A);
        assert_eq!(record.ttl, 300);
        assert_eq!(record.id, Some(3));
    }

    #[test]
    fn test_record_config_deserialize() {
        let yaml = r#"
type: MX
name: "@"
value: mail.example.com
ttl: 600
priority: 10
"#;
        let config: RecordConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.kind, RecordKind::MX);
        assert_eq!(config.name, "@");
        assert_eq!(config.ttl, 600);
        assert_eq!(config.priority, Some(10));
        assert_eq!(config.weight, None);
    }

    #[test]
    fn test_record_config_defaults() {
        let yaml = r#"
type: A
name: www
value: 1.2.3.4
"#;
        let config: RecordConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.ttl, 300);
    }

    #[test]
    fn test_export_renders_root_as_at() {
        let remote = record(RecordKind::A, "", "1.2.3.4", 300);
        let config = RecordConfig::from_record(&remote);
        assert_eq!(config.name, "@");
    }
}
