//! Top-level reconciliation driver: walks the configured domains and brings
//! DNS zones, pull zones and edge rules in line with the configuration.

use log::{info, warn};

use crate::client::ApiClient;
use crate::config::{DomainConfig, SyncConfig};
use crate::dns::{DnsManager, DnsZoneReport};
use crate::error::{Error, Result};
use crate::pullzone::{PullZone, PullZoneConfig, PullZoneManager, PullZoneReport};
use crate::rules::EdgeRulesManager;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Remove remote DNS records absent from the configuration.
    pub delete_extra_records: bool,
    /// Restrict the run to a single configured domain.
    pub domain: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            delete_extra_records: true,
            domain: None,
        }
    }
}

/// What the export path reads back from the account.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullOptions {
    /// Only pull DNS records.
    pub dns_only: bool,
    /// Only pull the pull zones.
    pub pullzones_only: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub dns_records_created: usize,
    pub dns_records_updated: usize,
    pub dns_records_deleted: usize,
    pub pull_zones_created: usize,
    pub pull_zones_updated: usize,
    pub hostnames_added: usize,
    pub hostnames_removed: usize,
    pub edge_rules_created: usize,
    pub edge_rules_deleted: usize,
}

impl Summary {
    fn absorb_dns(&mut self, report: &DnsZoneReport) {
        self.dns_records_created += report.created.len();
        self.dns_records_updated += report.updated.len();
        self.dns_records_deleted += report.deleted.len();
    }

    fn absorb_pull_zone(&mut self, report: &PullZoneReport) {
        if report.created {
            self.pull_zones_created += 1;
        }
        if report.updated {
            self.pull_zones_updated += 1;
        }
        self.hostnames_added += report.hostnames_added.len();
        self.hostnames_removed += report.hostnames_removed.len();
        if let Some(rules) = &report.edge_rules {
            self.edge_rules_created += rules.created.len();
            self.edge_rules_deleted += rules.deleted.len();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub dry_run: bool,
    pub domain_filter: Option<String>,
    pub dns_zones: Vec<DnsZoneReport>,
    pub pull_zones: Vec<PullZoneReport>,
    pub summary: Summary,
}

pub struct Syncer {
    client: ApiClient,
}

impl Syncer {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: ApiClient::new(api_key),
        }
    }

    pub fn with_client(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn dns(&self) -> DnsManager<'_> {
        DnsManager::new(&self.client)
    }

    pub fn pull_zones(&self) -> PullZoneManager<'_> {
        PullZoneManager::new(&self.client)
    }

    pub fn edge_rules(&self) -> EdgeRulesManager<'_> {
        EdgeRulesManager::new(&self.client)
    }

    fn filter_domains<'c>(
        config: &'c SyncConfig,
        filter: Option<&str>,
    ) -> Result<Vec<(&'c String, &'c DomainConfig)>> {
        let selected: Vec<_> = config
            .domains
            .iter()
            .filter(|(name, _)| match filter {
                Some(wanted) => name.eq_ignore_ascii_case(wanted),
                None => true,
            })
            .collect();
        if selected.is_empty() {
            if let Some(wanted) = filter {
                return Err(Error::Config(format!(
                    "domain '{wanted}' not found in configuration"
                )));
            }
        }
        Ok(selected)
    }

    /// Reconcile every selected domain: its DNS zone first, then each of its
    /// pull zones together with their edge rules.
    pub async fn sync(&self, config: &SyncConfig, options: &SyncOptions) -> Result<SyncReport> {
        let mut report = self.new_report(options);

        for (domain, domain_config) in Self::filter_domains(config, options.domain.as_deref())? {
            info!("syncing domain {domain}");
            if !domain_config.dns_records.is_empty() {
                self.sync_domain_dns(domain, domain_config, options, &mut report)
                    .await?;
            }
            self.sync_domain_pull_zones(domain, domain_config, options, true, &mut report)
                .await?;
        }

        Ok(report)
    }

    /// Like [`sync`](Self::sync) but touches DNS zones only.
    pub async fn sync_dns_only(
        &self,
        config: &SyncConfig,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let mut report = self.new_report(options);
        for (domain, domain_config) in Self::filter_domains(config, options.domain.as_deref())? {
            if !domain_config.dns_records.is_empty() {
                self.sync_domain_dns(domain, domain_config, options, &mut report)
                    .await?;
            }
        }
        Ok(report)
    }

    /// Like [`sync`](Self::sync) but touches pull zones only; edge rules are
    /// left exactly as they are on the account.
    pub async fn sync_pull_zones_only(
        &self,
        config: &SyncConfig,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let mut report = self.new_report(options);
        for (domain, domain_config) in Self::filter_domains(config, options.domain.as_deref())? {
            self.sync_domain_pull_zones(domain, domain_config, options, false, &mut report)
                .await?;
        }
        Ok(report)
    }

    fn new_report(&self, options: &SyncOptions) -> SyncReport {
        SyncReport {
            dry_run: options.dry_run,
            domain_filter: options.domain.clone(),
            ..Default::default()
        }
    }

    async fn sync_domain_dns(
        &self,
        domain: &str,
        domain_config: &DomainConfig,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<()> {
        let zone_report = self
            .dns()
            .sync_zone(
                domain,
                &domain_config.dns_records,
                options.dry_run,
                options.delete_extra_records,
            )
            .await?;
        report.summary.absorb_dns(&zone_report);
        report.dns_zones.push(zone_report);
        Ok(())
    }

    async fn sync_domain_pull_zones(
        &self,
        domain: &str,
        domain_config: &DomainConfig,
        options: &SyncOptions,
        sync_edge_rules: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        let pull_zones = self.pull_zones();
        let edge_rules = self.edge_rules();

        for (zone_name, zone_config) in &domain_config.pull_zones {
            let mut zone_report = pull_zones
                .sync_zone(zone_name, zone_config, options.dry_run)
                .await?;
            zone_report.domain = Some(domain.to_string());

            if sync_edge_rules && !zone_config.edge_rules.is_empty() {
                // Re-resolve the zone: it may have just been created. Under
                // dry-run a planned zone has no id yet, so rules are skipped.
                match pull_zones.get_zone_by_name(zone_name).await? {
                    Some(zone) => {
                        let zone_id = zone.id.ok_or_else(|| {
                            Error::Parse(format!("pull zone '{zone_name}' has no id"))
                        })?;
                        let rules_report = edge_rules
                            .sync_rules(zone_id, &zone_config.edge_rules, options.dry_run)
                            .await?;
                        zone_report.edge_rules = Some(rules_report);
                    }
                    None => {
                        warn!("skipping edge rules for unresolved pull zone {zone_name}");
                        zone_report.changes.push(format!(
                            "Skipping edge rules for '{zone_name}' (zone not created yet)"
                        ));
                    }
                }
            }

            report.summary.absorb_pull_zone(&zone_report);
            report.pull_zones.push(zone_report);
        }
        Ok(())
    }

    /// Read the remote state for one domain back into configuration shape:
    /// its DNS records plus every pull zone serving a hostname under it.
    /// Returns `None` when the DNS zone is absent and no pull zone matches.
    pub async fn pull_domain(
        &self,
        domain: &str,
        options: &PullOptions,
    ) -> Result<Option<DomainConfig>> {
        let mut domain_config = DomainConfig::default();
        let mut zone_found = true;

        if !options.pullzones_only {
            match self.dns().export_zone(domain).await? {
                Some(records) => domain_config.dns_records = records,
                None => zone_found = false,
            }
        }

        if !options.dns_only {
            for zone in self.pull_zones().zones_for_domain(domain).await? {
                let zone_config = self.export_pull_zone(&zone).await?;
                domain_config.pull_zones.insert(zone.name, zone_config);
            }
        }

        if !zone_found && domain_config.pull_zones.is_empty() {
            return Ok(None);
        }
        Ok(Some(domain_config))
    }

    /// Read the whole account back into configuration shape: every DNS zone,
    /// plus every pull zone attached to the domain one of its non-system
    /// hostnames falls under. Pull zones matching no domain are dropped with
    /// a warning.
    pub async fn pull_all_domains(&self, options: &PullOptions) -> Result<SyncConfig> {
        let mut config = SyncConfig::default();

        if !options.pullzones_only {
            for (domain, records) in self.dns().export_all_zones().await? {
                config.domains.entry(domain).or_default().dns_records = records;
            }
        }

        if !options.dns_only {
            let dns_domains: Vec<String> = if config.domains.is_empty() {
                self.dns()
                    .list_zones()
                    .await?
                    .into_iter()
                    .map(|zone| zone.domain)
                    .collect()
            } else {
                config.domains.keys().cloned().collect()
            };

            for zone in self.pull_zones().list_zones().await? {
                let zone_config = self.export_pull_zone(&zone).await?;
                match Self::match_domain(&zone, &dns_domains) {
                    Some(domain) => {
                        config
                            .domains
                            .entry(domain)
                            .or_default()
                            .pull_zones
                            .insert(zone.name, zone_config);
                    }
                    None => {
                        warn!(
                            "pull zone '{}' could not be matched to any domain",
                            zone.name
                        );
                    }
                }
            }
        }

        Ok(config)
    }

    async fn export_pull_zone(&self, zone: &PullZone) -> Result<PullZoneConfig> {
        let mut zone_config = zone.to_config();
        if let Some(zone_id) = zone.id {
            zone_config.edge_rules = self.edge_rules().export_rules(zone_id).await?;
        }
        Ok(zone_config)
    }

    /// The first domain one of the zone's non-system hostnames equals or
    /// sits under.
    fn match_domain(zone: &PullZone, domains: &[String]) -> Option<String> {
        for hostname in &zone.hostnames {
            if hostname.is_system {
                continue;
            }
            let value = hostname.value.to_lowercase();
            for domain in domains {
                let lower = domain.to_lowercase();
                if value == lower || value.ends_with(&format!(".{lower}")) {
                    return Some(domain.clone());
                }
            }
        }
        None
    }
}
