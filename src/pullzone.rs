use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::rules::{EdgeRuleConfig, EdgeRulesReport};

////////////////////////////////////////////////////////////
// Model
////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PullZoneKind {
    #[default]
    Standard,
    Volume,
}

impl PullZoneKind {
    pub fn code(self) -> u8 {
        match self {
            PullZoneKind::Standard => 0,
            PullZoneKind::Volume => 1,
        }
    }

    /// Unrecognized remote codes decode to `Standard`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => PullZoneKind::Volume,
            _ => PullZoneKind::Standard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PullZoneKind::Standard => "standard",
            PullZoneKind::Volume => "volume",
        }
    }
}

/// The five per-region pricing flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionFlags {
    pub us: bool,
    pub eu: bool,
    pub asia: bool,
    pub sa: bool,
    pub af: bool,
}

impl Default for RegionFlags {
    fn default() -> Self {
        Self {
            us: true,
            eu: true,
            asia: true,
            sa: true,
            af: true,
        }
    }
}

impl RegionFlags {
    pub fn from_codes(codes: &[String]) -> Self {
        let has = |code: &str| codes.iter().any(|c| c.eq_ignore_ascii_case(code));
        Self {
            us: has("US"),
            eu: has("EU"),
            asia: has("ASIA"),
            sa: has("SA"),
            af: has("AF"),
        }
    }

    pub fn to_codes(&self) -> Vec<String> {
        let mut codes = Vec::new();
        for (enabled, code) in [
            (self.eu, "EU"),
            (self.us, "US"),
            (self.asia, "ASIA"),
            (self.sa, "SA"),
            (self.af, "AF"),
        ] {
            if enabled {
                codes.push(code.to_string());
            }
        }
        codes
    }

    /// One note per differing region, e.g. `"US: true -> false"`.
    fn diff(&self, desired: &RegionFlags) -> Vec<String> {
        let mut notes = Vec::new();
        for (current, wanted, code) in [
            (self.us, desired.us, "US"),
            (self.eu, desired.eu, "EU"),
            (self.asia, desired.asia, "ASIA"),
            (self.sa, desired.sa, "SA"),
            (self.af, desired.af, "AF"),
        ] {
            if current != wanted {
                notes.push(format!("{code}: {current} -> {wanted}"));
            }
        }
        notes
    }
}

#[derive(Debug, Clone, Default)]
pub struct Hostname {
    pub value: String,
    pub id: Option<i64>,
    pub force_ssl: bool,
    pub has_certificate: bool,
    /// Infrastructure-provisioned; immutable and excluded from sync.
    pub is_system: bool,
}

impl Hostname {
    pub fn from_api(data: &Value) -> Self {
        Self {
            id: data["Id"].as_i64(),
            value: data["Value"].as_str().unwrap_or("").to_string(),
            force_ssl: data["ForceSSL"].as_bool().unwrap_or(false),
            has_certificate: data["HasCertificate"].as_bool().unwrap_or(false),
            is_system: data["IsSystemHostname"].as_bool().unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PullZone {
    pub id: Option<i64>,
    pub name: String,
    pub origin_url: Option<String>,
    pub origin_host_header: Option<String>,
    pub kind: PullZoneKind,
    pub regions: RegionFlags,
    pub hostnames: Vec<Hostname>,
}

impl PullZone {
    pub fn from_api(data: &Value) -> Self {
        Self {
            id: data["Id"].as_i64(),
            name: data["Name"].as_str().unwrap_or("").to_string(),
            origin_url: data["OriginUrl"].as_str().map(str::to_string),
            origin_host_header: data["OriginHostHeader"].as_str().map(str::to_string),
            kind: PullZoneKind::from_code(data["Type"].as_u64().unwrap_or(0) as u8),
            regions: RegionFlags {
                us: data["EnableGeoZoneUS"].as_bool().unwrap_or(true),
                eu: data["EnableGeoZoneEU"].as_bool().unwrap_or(true),
                asia: data["EnableGeoZoneASIA"].as_bool().unwrap_or(true),
                sa: data["EnableGeoZoneSA"].as_bool().unwrap_or(true),
                af: data["EnableGeoZoneAF"].as_bool().unwrap_or(true),
            },
            hostnames: data["Hostnames"]
                .as_array()
                .map(|hs| hs.iter().map(Hostname::from_api).collect())
                .unwrap_or_default(),
        }
    }

    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "Name": self.name,
            "Type": self.kind.code(),
            "EnableGeoZoneUS": self.regions.us,
            "EnableGeoZoneEU": self.regions.eu,
            "EnableGeoZoneASIA": self.regions.asia,
            "EnableGeoZoneSA": self.regions.sa,
            "EnableGeoZoneAF": self.regions.af,
        });
        if let Some(origin_url) = &self.origin_url {
            payload["OriginUrl"] = origin_url.clone().into();
        }
        if let Some(host_header) = &self.origin_host_header {
            payload["OriginHostHeader"] = host_header.clone().into();
        }
        payload
    }

    /// Render the zone back into configuration shape. The force-TLS flag is
    /// taken from the first non-system hostname; edge rules are exported
    /// separately.
    pub fn to_config(&self) -> PullZoneConfig {
        let custom: Vec<&Hostname> = self.hostnames.iter().filter(|h| !h.is_system).collect();
        PullZoneConfig {
            origin_url: self.origin_url.clone(),
            origin_host_header: self.origin_host_header.clone(),
            kind: self.kind,
            enabled_regions: self.regions.to_codes(),
            hostnames: custom.iter().map(|h| h.value.clone()).collect(),
            force_ssl: custom.first().map(|h| h.force_ssl),
            edge_rules: Vec::new(),
        }
    }

    fn id_or_err(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::Parse(format!("pull zone '{}' has no id", self.name)))
    }
}

////////////////////////////////////////////////////////////
// Configuration shape
////////////////////////////////////////////////////////////

fn default_regions() -> Vec<String> {
    ["EU", "US", "ASIA", "SA", "AF"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PullZoneConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_host_header: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: PullZoneKind,
    #[serde(default = "default_regions")]
    pub enabled_regions: Vec<String>,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_rules: Vec<EdgeRuleConfig>,
}

impl Default for PullZoneConfig {
    fn default() -> Self {
        Self {
            origin_url: None,
            origin_host_header: None,
            kind: PullZoneKind::default(),
            enabled_regions: default_regions(),
            hostnames: Vec::new(),
            force_ssl: None,
            edge_rules: Vec::new(),
        }
    }
}

impl PullZoneConfig {
    fn to_zone(&self, name: &str) -> PullZone {
        PullZone {
            id: None,
            name: name.to_string(),
            origin_url: self.origin_url.clone(),
            origin_host_header: self.origin_host_header.clone(),
            kind: self.kind,
            regions: RegionFlags::from_codes(&self.enabled_regions),
            hostnames: Vec::new(),
        }
    }
}

////////////////////////////////////////////////////////////
// Reconciler
////////////////////////////////////////////////////////////

/// Outcome of a best-effort side operation: either it went through, or the
/// failure was captured as a warning note for the report.
enum Attempt {
    Done,
    Warned(String),
}

#[derive(Debug, Clone, Default)]
pub struct PullZoneReport {
    pub zone: String,
    pub domain: Option<String>,
    pub created: bool,
    pub updated: bool,
    pub hostnames_added: Vec<String>,
    pub hostnames_removed: Vec<String>,
    pub certificates_loaded: Vec<String>,
    pub changes: Vec<String>,
    pub edge_rules: Option<EdgeRulesReport>,
}

pub struct PullZoneManager<'a> {
    client: &'a ApiClient,
}

impl<'a> PullZoneManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list_zones(&self) -> Result<Vec<PullZone>> {
        let response = self.client.get("/pullzone", None).await?;
        let zones = response
            .as_array()
            .map(|items| items.iter().map(PullZone::from_api).collect())
            .unwrap_or_default();
        Ok(zones)
    }

    pub async fn get_zone(&self, zone_id: i64) -> Result<PullZone> {
        let response = self.client.get(&format!("/pullzone/{zone_id}"), None).await?;
        Ok(PullZone::from_api(&response))
    }

    /// The listing carries hostnames already, no refetch needed.
    pub async fn get_zone_by_name(&self, name: &str) -> Result<Option<PullZone>> {
        Ok(self
            .list_zones()
            .await?
            .into_iter()
            .find(|zone| zone.name.eq_ignore_ascii_case(name)))
    }

    /// Pull zones serving `domain`: any non-system hostname equals the
    /// domain or sits under it.
    pub async fn zones_for_domain(&self, domain: &str) -> Result<Vec<PullZone>> {
        let domain = domain.to_lowercase();
        let suffix = format!(".{domain}");
        Ok(self
            .list_zones()
            .await?
            .into_iter()
            .filter(|zone| {
                zone.hostnames.iter().any(|h| {
                    if h.is_system {
                        return false;
                    }
                    let value = h.value.to_lowercase();
                    value == domain || value.ends_with(&suffix)
                })
            })
            .collect())
    }

    pub async fn create_zone(&self, zone: &PullZone) -> Result<PullZone> {
        info!("creating pull zone {}", zone.name);
        let response = self.client.post("/pullzone", Some(zone.to_payload())).await?;
        Ok(PullZone::from_api(&response))
    }

    pub async fn update_zone(&self, zone_id: i64, zone: &PullZone) -> Result<PullZone> {
        let response = self
            .client
            .post(&format!("/pullzone/{zone_id}"), Some(zone.to_payload()))
            .await?;
        Ok(PullZone::from_api(&response))
    }

    pub async fn delete_zone(&self, zone_id: i64) -> Result<()> {
        self.client
            .delete(&format!("/pullzone/{zone_id}"), None)
            .await?;
        Ok(())
    }

    pub async fn add_hostname(&self, zone_id: i64, hostname: &str) -> Result<()> {
        self.client
            .post(
                &format!("/pullzone/{zone_id}/addHostname"),
                Some(json!({"Hostname": hostname})),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_hostname(&self, zone_id: i64, hostname: &str) -> Result<()> {
        self.client
            .delete(
                &format!("/pullzone/{zone_id}/removeHostname"),
                Some(&[("hostname", hostname)]),
            )
            .await?;
        Ok(())
    }

    pub async fn load_free_certificate(&self, hostname: &str) -> Result<()> {
        self.client
            .get(
                "/pullzone/loadFreeCertificate",
                Some(&[("hostname", hostname)]),
            )
            .await?;
        Ok(())
    }

    pub async fn set_force_ssl(&self, zone_id: i64, hostname: &str, force: bool) -> Result<()> {
        self.client
            .post(
                &format!("/pullzone/{zone_id}/setForceSSL"),
                Some(json!({"Hostname": hostname, "ForceSSL": force})),
            )
            .await?;
        Ok(())
    }

    async fn try_load_certificate(&self, hostname: &str) -> Attempt {
        match self.load_free_certificate(hostname).await {
            Ok(()) => Attempt::Done,
            Err(err) => {
                warn!("certificate issuance failed for {hostname}: {err}");
                Attempt::Warned(format!(
                    "Warning: Could not load certificate for {hostname}: {err}"
                ))
            }
        }
    }

    async fn try_set_force_ssl(&self, zone_id: i64, hostname: &str, force: bool) -> Attempt {
        match self.set_force_ssl(zone_id, hostname, force).await {
            Ok(()) => Attempt::Done,
            Err(err) => {
                warn!("force SSL toggle failed for {hostname}: {err}");
                Attempt::Warned(format!(
                    "Warning: Could not set Force SSL for {hostname}: {err}"
                ))
            }
        }
    }

    /// Reconcile one pull zone: zone attributes, then hostnames with their
    /// certificate and force-TLS state. Certificate issuance and force-TLS
    /// failures become warning notes, never errors. Under `dry_run` no
    /// mutating call is issued.
    pub async fn sync_zone(
        &self,
        name: &str,
        config: &PullZoneConfig,
        dry_run: bool,
    ) -> Result<PullZoneReport> {
        let mut report = PullZoneReport {
            zone: name.to_string(),
            ..Default::default()
        };

        let desired_kind = config.kind;
        let desired_regions = RegionFlags::from_codes(&config.enabled_regions);

        let zone = match self.get_zone_by_name(name).await? {
            None => {
                report.created = true;
                report.changes.push(format!("Creating pull zone '{name}'"));
                if dry_run {
                    None
                } else {
                    Some(self.create_zone(&config.to_zone(name)).await?)
                }
            }
            Some(existing) => {
                let mut needs_update = false;

                if let Some(origin_url) = &config.origin_url {
                    if existing.origin_url.as_deref() != Some(origin_url) {
                        needs_update = true;
                        report.changes.push(format!(
                            "Updating origin URL: {} -> {}",
                            existing.origin_url.as_deref().unwrap_or("none"),
                            origin_url
                        ));
                    }
                }
                if let Some(host_header) = &config.origin_host_header {
                    if existing.origin_host_header.as_deref() != Some(host_header) {
                        needs_update = true;
                        report.changes.push(format!(
                            "Updating origin host header: {} -> {}",
                            existing.origin_host_header.as_deref().unwrap_or("none"),
                            host_header
                        ));
                    }
                }
                if existing.kind != desired_kind {
                    needs_update = true;
                    report.changes.push(format!(
                        "Updating zone type: {} -> {}",
                        existing.kind.as_str(),
                        desired_kind.as_str()
                    ));
                }
                let region_notes = existing.regions.diff(&desired_regions);
                if !region_notes.is_empty() {
                    needs_update = true;
                    report
                        .changes
                        .push(format!("Updating regions: {}", region_notes.join(", ")));
                }

                if needs_update {
                    report.updated = true;
                    if !dry_run {
                        let zone_id = existing.id_or_err()?;
                        Some(self.update_zone(zone_id, &config.to_zone(name)).await?)
                    } else {
                        Some(existing)
                    }
                } else {
                    Some(existing)
                }
            }
        };

        // A zone that would only be created under dry-run cannot have
        // hostnames attached yet; report the planned additions and stop.
        let Some(zone) = zone else {
            for hostname in &config.hostnames {
                report.hostnames_added.push(hostname.clone());
                report.changes.push(format!("Adding hostname: {hostname}"));
            }
            return Ok(report);
        };
        let zone_id = zone.id_or_err()?;

        let current: Vec<&Hostname> = zone.hostnames.iter().filter(|h| !h.is_system).collect();
        let find_current =
            |name: &str| current.iter().find(|h| h.value.eq_ignore_ascii_case(name));

        // Desired hostnames missing remotely.
        for hostname in &config.hostnames {
            if find_current(hostname).is_none() {
                report.hostnames_added.push(hostname.clone());
                report.changes.push(format!("Adding hostname: {hostname}"));
                if !dry_run {
                    self.add_hostname(zone_id, hostname).await?;
                    match self.try_load_certificate(hostname).await {
                        Attempt::Done => report.certificates_loaded.push(hostname.clone()),
                        Attempt::Warned(note) => report.changes.push(note),
                    }
                    if let Some(force) = config.force_ssl {
                        match self.try_set_force_ssl(zone_id, hostname, force).await {
                            Attempt::Done => report.changes.push(format!(
                                "{} Force SSL for {hostname}",
                                if force { "Enabled" } else { "Disabled" }
                            )),
                            Attempt::Warned(note) => report.changes.push(note),
                        }
                    }
                }
            }
        }

        // Existing hostnames still waiting on a certificate.
        for hostname in &config.hostnames {
            if let Some(existing) = find_current(hostname) {
                if !existing.has_certificate {
                    report
                        .changes
                        .push(format!("Loading certificate for {hostname}"));
                    if !dry_run {
                        match self.try_load_certificate(hostname).await {
                            Attempt::Done => report.certificates_loaded.push(hostname.clone()),
                            Attempt::Warned(note) => report.changes.push(note),
                        }
                    }
                }
            }
        }

        // Existing hostnames whose force-TLS state diverges.
        if let Some(force) = config.force_ssl {
            for hostname in &config.hostnames {
                if let Some(existing) = find_current(hostname) {
                    if existing.force_ssl != force {
                        report.changes.push(format!(
                            "{} Force SSL for {hostname}",
                            if force { "Enabling" } else { "Disabling" }
                        ));
                        if !dry_run {
                            if let Attempt::Warned(note) =
                                self.try_set_force_ssl(zone_id, hostname, force).await
                            {
                                report.changes.push(note);
                            }
                        }
                    }
                }
            }
        }

        // Remote hostnames absent from the desired set.
        for hostname in &current {
            let wanted = config
                .hostnames
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&hostname.value));
            if !wanted {
                report.hostnames_removed.push(hostname.value.clone());
                report
                    .changes
                    .push(format!("Removing hostname: {}", hostname.value));
                if !dry_run {
                    self.remove_hostname(zone_id, &hostname.value).await?;
                }
            }
        }

        Ok(report)
    }
}
