//! Package registry ingestion.
//!
//! Input records mirror the registry dumps the source system collected:
//! package metadata plus a `normalized_licenses` list of SPDX ids.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use super::IngestReport;
use crate::model::Package;
use crate::stores::PackageStore;
use crate::types::LicenseerError;

/// Serde shape of one registry metadata record.
#[derive(Clone, Debug, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub dependents_count: Option<u64>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Declared license identifiers; may be empty for unlicensed or
    /// unrecognized packages.
    #[serde(default)]
    pub normalized_licenses: Vec<String>,
}

impl PackageRecord {
    fn package(&self) -> Package {
        Package {
            name: self.name.clone(),
            description: self.description.clone(),
            homepage: self.homepage.clone(),
            repository_url: self.repository_url.clone(),
            dependents_count: self.dependents_count,
            keywords: self.keywords.clone(),
        }
    }
}

/// Upserts packages and attaches their declared licenses.
pub struct PackageIngestor {
    store: Arc<dyn PackageStore>,
    /// Fixed delay between records, same backpressure policy as the
    /// matrix sweep.
    write_delay: Duration,
}

impl PackageIngestor {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self {
            store,
            write_delay: Duration::from_millis(10),
        }
    }

    #[must_use]
    pub fn with_write_delay(mut self, write_delay: Duration) -> Self {
        self.write_delay = write_delay;
        self
    }

    pub async fn ingest(&self, records: Vec<PackageRecord>) -> IngestReport {
        let mut report = IngestReport::default();
        for record in records {
            let name = record.name.clone();
            match self.ingest_one(&record).await {
                Ok(()) => {
                    info!(package = %name, licenses = record.normalized_licenses.len(), "package ingested");
                    report.record_success(name);
                }
                Err(err) => {
                    warn!(package = %name, error = %err, "package ingestion failed");
                    report.record_failure(name, err.to_string());
                }
            }
            if !self.write_delay.is_zero() {
                tokio::time::sleep(self.write_delay).await;
            }
        }
        report
    }

    async fn ingest_one(&self, record: &PackageRecord) -> Result<(), LicenseerError> {
        self.store.upsert_package(&record.package()).await?;
        for spdx_id in &record.normalized_licenses {
            self.store.attach_license(&record.name, spdx_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_from_registry_json() {
        let raw = r#"{
            "name": "requests",
            "description": "HTTP for humans",
            "dependents_count": 100000,
            "keywords": ["http", "client"],
            "normalized_licenses": ["Apache-2.0"]
        }"#;
        let record: PackageRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.name, "requests");
        assert_eq!(record.normalized_licenses, vec!["Apache-2.0"]);
        assert_eq!(record.package().dependents_count, Some(100000));
    }

    #[test]
    fn missing_optional_fields_default() {
        let record: PackageRecord = serde_json::from_str(r#"{"name": "tiny"}"#).unwrap();
        assert!(record.normalized_licenses.is_empty());
        assert!(record.keywords.is_empty());
        assert_eq!(record.description, None);
    }
}
