//! Compatibility matrix ingestion.
//!
//! The input is a square table keyed by license identifier with cells in
//! {Yes, No, Unknown}. Two policies here are deliberate and documented:
//!
//! * Unknown is materialized as `is_compatible = false`. The store cannot
//!   later distinguish "known incompatible" from "unknown"; revisiting
//!   that collapse is a requirements question, not a local fix.
//! * Self-pairs are skipped during the bulk sweep, so self-compatibility
//!   reads stay Unknown unless asserted explicitly elsewhere.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::stores::CompatibilityStore;
use crate::types::LicenseerError;

/// One cell of the externally supplied compatibility table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompatibilityCell {
    Yes,
    No,
    Unknown,
}

impl CompatibilityCell {
    /// Parse a raw cell. Unrecognized labels degrade to `Unknown` so one
    /// odd cell never aborts the sweep.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Yes" => Self::Yes,
            "No" => Self::No,
            "Unknown" => Self::Unknown,
            other => {
                warn!(cell = other, "unrecognized compatibility cell, treating as Unknown");
                Self::Unknown
            }
        }
    }

    /// The lossy collapse applied at ingestion time.
    pub fn as_stored_bool(self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Square compatibility table: `cells[i][j]` relates `license_ids[i]`
/// (source) to `license_ids[j]` (target).
#[derive(Clone, Debug)]
pub struct CompatibilityTable {
    pub license_ids: Vec<String>,
    pub cells: Vec<Vec<CompatibilityCell>>,
}

impl CompatibilityTable {
    pub fn new(
        license_ids: Vec<String>,
        cells: Vec<Vec<CompatibilityCell>>,
    ) -> Result<Self, LicenseerError> {
        let n = license_ids.len();
        if cells.len() != n || cells.iter().any(|row| row.len() != n) {
            return Err(LicenseerError::InvalidInput(format!(
                "compatibility table must be {n}x{n} to match {n} license ids"
            )));
        }
        Ok(Self { license_ids, cells })
    }

    /// Parse the matrix CSV shape: a header row of license ids, then one
    /// row per source license whose first column repeats its id.
    pub fn from_csv(text: &str) -> Result<Self, LicenseerError> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| LicenseerError::InvalidInput("compatibility csv is empty".into()))?;
        let license_ids: Vec<String> = header
            .split(',')
            .skip(1)
            .map(|id| id.trim().to_string())
            .collect();

        let mut cells = Vec::with_capacity(license_ids.len());
        for line in lines {
            let mut columns = line.split(',');
            let row_id = columns.next().unwrap_or_default().trim();
            let row: Vec<CompatibilityCell> = columns.map(CompatibilityCell::parse).collect();
            if row.len() != license_ids.len() {
                return Err(LicenseerError::InvalidInput(format!(
                    "row '{row_id}' has {} cells, expected {}",
                    row.len(),
                    license_ids.len()
                )));
            }
            cells.push(row);
        }
        Self::new(license_ids, cells)
    }
}

/// Summary of one matrix sweep.
#[derive(Clone, Debug, Default)]
pub struct MatrixIngestReport {
    /// Directed edges written to the store.
    pub written: usize,
    /// Self-pair cells skipped by policy.
    pub skipped_self_pairs: usize,
    /// Pairs that failed to write, with reasons.
    pub failed: Vec<(String, String, String)>,
}

/// Writes a [`CompatibilityTable`] into a [`CompatibilityStore`] as an
/// O(n²) sweep of directed edges.
pub struct MatrixIngestor {
    store: Arc<dyn CompatibilityStore>,
    /// Fixed delay between writes. Backpressure on the backing store, not
    /// an optimization; do not remove to speed up ingestion.
    write_delay: Duration,
}

impl MatrixIngestor {
    pub fn new(store: Arc<dyn CompatibilityStore>) -> Self {
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

    pub async fn ingest(&self, table: &CompatibilityTable) -> MatrixIngestReport {
        let n = table.license_ids.len();
        info!(licenses = n, "ingesting compatibility matrix ({} potential edges)", n * n);

        let mut report = MatrixIngestReport::default();
        for (i, source) in table.license_ids.iter().enumerate() {
            for (j, target) in table.license_ids.iter().enumerate() {
                if i == j {
                    report.skipped_self_pairs += 1;
                    continue;
                }
                let is_compatible = table.cells[i][j].as_stored_bool();
                match self.store.set_compatibility(source, target, is_compatible).await {
                    Ok(()) => report.written += 1,
                    Err(err) => {
                        warn!(source = %source, target = %target, error = %err, "matrix write failed");
                        report
                            .failed
                            .push((source.clone(), target.clone(), err.to_string()));
                    }
                }
                if !self.write_delay.is_zero() {
                    tokio::time::sleep(self.write_delay).await;
                }
            }
        }

        debug!(
            written = report.written,
            skipped = report.skipped_self_pairs,
            failed = report.failed.len(),
            "compatibility matrix sweep complete"
        );
        report
    }
}
