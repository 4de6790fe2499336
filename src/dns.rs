use std::collections::{BTreeMap, HashSet};

use log::{debug, info};
use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::record::{DnsRecord, RecordConfig};

#[derive(Debug, Clone, Default)]
pub struct DnsZone {
    pub id: Option<i64>,
    pub domain: String,
    pub records: Vec<DnsRecord>,
}

impl DnsZone {
    pub fn from_api(data: &Value) -> Self {
        let records = data["Records"]
            .as_array()
            .map(|items| items.iter().map(DnsRecord::from_api).collect())
            .unwrap_or_default();
        Self {
            id: data["Id"].as_i64(),
            domain: data["Domain"].as_str().unwrap_or("").to_string(),
            records,
        }
    }

    fn id_or_err(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::Parse(format!("dns zone '{}' has no id", self.domain)))
    }
}

/// Outcome of one zone sync, identical in shape for live and dry runs.
#[derive(Debug, Clone, Default)]
pub struct DnsZoneReport {
    pub zone: String,
    pub zone_created: bool,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

pub struct DnsManager<'a> {
    client: &'a ApiClient,
}

impl<'a> DnsManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list_zones(&self) -> Result<Vec<DnsZone>> {
        let response = self.client.get("/dnszone", None).await?;
        let zones = response["Items"]
            .as_array()
            .map(|items| items.iter().map(DnsZone::from_api).collect())
            .unwrap_or_default();
        Ok(zones)
    }

    pub async fn get_zone(&self, zone_id: i64) -> Result<DnsZone> {
        let response = self.client.get(&format!("/dnszone/{zone_id}"), None).await?;
        Ok(DnsZone::from_api(&response))
    }

    /// Find a zone by domain name, case-insensitively, refetching the full
    /// zone so its records are present. Absence is not an error.
    pub async fn get_zone_by_domain(&self, domain: &str) -> Result<Option<DnsZone>> {
        for zone in self.list_zones().await? {
            if zone.domain.eq_ignore_ascii_case(domain) {
                return Ok(Some(self.get_zone(zone.id_or_err()?).await?));
            }
        }
        Ok(None)
    }

    pub async fn create_zone(&self, domain: &str) -> Result<DnsZone> {
        info!("creating dns zone {domain}");
        let response = self
            .client
            .post("/dnszone", Some(json!({"Domain": domain})))
            .await?;
        Ok(DnsZone::from_api(&response))
    }

    pub async fn delete_zone(&self, zone_id: i64) -> Result<()> {
        self.client
            .delete(&format!("/dnszone/{zone_id}"), None)
            .await?;
        Ok(())
    }

    pub async fn add_record(&self, zone_id: i64, record: &DnsRecord) -> Result<DnsRecord> {
        debug!("adding record {} to zone {zone_id}", record.describe());
        let response = self
            .client
            .put(&format!("/dnszone/{zone_id}/records"), Some(record.to_payload()))
            .await?;
        Ok(DnsRecord::from_api(&response))
    }

    pub async fn update_record(
        &self,
        zone_id: i64,
        record_id: i64,
        record: &DnsRecord,
    ) -> Result<()> {
        debug!("updating record {record_id} in zone {zone_id}");
        let mut payload = record.to_payload();
        payload["Id"] = record_id.into();
        self.client
            .post(
                &format!("/dnszone/{zone_id}/records/{record_id}"),
                Some(payload),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_record(&self, zone_id: i64, record_id: i64) -> Result<()> {
        debug!("deleting record {record_id} from zone {zone_id}");
        self.client
            .delete(&format!("/dnszone/{zone_id}/records/{record_id}"), None)
            .await?;
        Ok(())
    }

    /// Render a zone's records back into configuration shape, or `None` when
    /// the zone does not exist on the account.
    pub async fn export_zone(&self, domain: &str) -> Result<Option<Vec<RecordConfig>>> {
        let Some(zone) = self.get_zone_by_domain(domain).await? else {
            return Ok(None);
        };
        Ok(Some(
            zone.records.iter().map(RecordConfig::from_record).collect(),
        ))
    }

    /// Export every zone on the account, keyed by domain.
    pub async fn export_all_zones(&self) -> Result<BTreeMap<String, Vec<RecordConfig>>> {
        let mut zones = BTreeMap::new();
        for listed in self.list_zones().await? {
            let zone = self.get_zone(listed.id_or_err()?).await?;
            zones.insert(
                zone.domain.clone(),
                zone.records.iter().map(RecordConfig::from_record).collect(),
            );
        }
        Ok(zones)
    }

    /// Reconcile one zone's records against the desired set.
    ///
    /// Each desired record consumes the first current record it matches;
    /// unconsumed current records are deleted when `delete_extra` is set.
    /// Under `dry_run` no mutating call is issued but the report is the same
    /// as a live run against the same initial state.
    pub async fn sync_zone(
        &self,
        domain: &str,
        desired_records: &[RecordConfig],
        dry_run: bool,
        delete_extra: bool,
    ) -> Result<DnsZoneReport> {
        let mut report = DnsZoneReport {
            zone: domain.to_string(),
            ..Default::default()
        };

        let zone = match self.get_zone_by_domain(domain).await? {
            Some(zone) => zone,
            None if dry_run => {
                // The zone does not exist yet, so every desired record would
                // be created into an empty zone.
                report.zone_created = true;
                for config in desired_records {
                    report.created.push(config.to_record().describe());
                }
                return Ok(report);
            }
            None => {
                report.zone_created = true;
                self.create_zone(domain).await?
            }
        };
        let zone_id = zone.id_or_err()?;

        let current = &zone.records;
        let mut consumed_ids: HashSet<i64> = HashSet::new();

        for config in desired_records {
            let mut desired = config.to_record();
            match current.iter().find(|c| desired.matches(c)) {
                Some(matched) => {
                    if let Some(id) = matched.id {
                        consumed_ids.insert(id);
                    }
                    if matched.needs_update(&desired) {
                        report.updated.push(desired.describe());
                        if !dry_run {
                            let record_id = matched.id.ok_or_else(|| {
                                Error::Parse(format!(
                                    "remote record {} has no id",
                                    matched.describe()
                                ))
                            })?;
                            desired.id = matched.id;
                            self.update_record(zone_id, record_id, &desired).await?;
                        }
                    } else {
                        report.unchanged.push(desired.describe());
                    }
                }
                None => {
                    report.created.push(desired.describe());
                    if !dry_run {
                        self.add_record(zone_id, &desired).await?;
                    }
                }
            }
        }

        if delete_extra {
            for current_record in current {
                if let Some(id) = current_record.id {
                    if !consumed_ids.contains(&id) {
                        report.deleted.push(current_record.describe());
                        if !dry_run {
                            self.delete_record(zone_id, id).await?;
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
