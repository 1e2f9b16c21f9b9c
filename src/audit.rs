use std::collections::BTreeSet;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::county::Counties;
use crate::parse::parse_count;
use crate::totals::{AuditTotals, AuditTotalsByCounty};
use crate::{info_time, Error, Result};

/// Fields per batch results line: county, batch name, batch type and seven counts.
const AUDIT_ROW_LEN: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub totals: AuditTotalsByCounty,
    /// County names in the report that aren't in the county list.
    pub unknown_names: BTreeSet<String>,
}

/// Cached audit totals: either a whole `AuditReport`, or the flat county map older caches hold.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CachedAuditReport {
    Report(AuditReport),
    Totals(AuditTotalsByCounty),
}

impl From<CachedAuditReport> for AuditReport {
    fn from(cached: CachedAuditReport) -> Self {
        match cached {
            CachedAuditReport::Report(report) => report,
            CachedAuditReport::Totals(totals) => AuditReport {
                totals,
                unknown_names: BTreeSet::new(),
            },
        }
    }
}

pub async fn read_audit_totals(path: &Path, counties: &Counties) -> Result<AuditReport> {
    let start_time = Local::now();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::from(e).in_file(path))?;
    let report = parse_audit_csv(&text, counties).map_err(|e| e.in_file(path))?;
    info_time!(
        start_time,
        "Read audit totals for {} counties",
        report.totals.len()
    );
    Ok(report)
}

/// Sums the batch results lines per county.
/// Every listed county gets a row, even when the report has no batches for it.
pub fn parse_audit_csv(text: &str, counties: &Counties) -> Result<AuditReport> {
    let mut report = AuditReport {
        totals: counties
            .names()
            .map(|name| (name.to_string(), AuditTotals::default()))
            .collect(),
        unknown_names: BTreeSet::new(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    for (line, record) in reader.records().enumerate() {
        let line = line + 1;
        let record = record?;
        if record.len() != AUDIT_ROW_LEN {
            return Err(Error::AuditRow {
                line,
                reason: format!("expected {AUDIT_ROW_LEN} fields, got {}", record.len()),
            });
        }

        let mut counts = [0i64; 7];
        for (count, field) in counts.iter_mut().zip(record.iter().skip(3)) {
            *count = parse_count("batch count", field).map_err(|e| Error::AuditRow {
                line,
                reason: e.to_string(),
            })?;
        }

        let name = &record[0];
        let Some(county) = counties.resolve_normalized(name) else {
            if report.unknown_names.insert(name.to_string()) {
                debug!("audit report line {line}: unknown county {name:?}");
            }
            continue;
        };
        let Some(county_totals) = report.totals.get_mut(&county.name) else {
            continue;
        };

        *county_totals += batch_totals(&counts);
    }

    Ok(report)
}

/// Counts are: Trump, Biden, Jorgensen, invalid write-ins, valid write-ins, undervotes, overvotes.
fn batch_totals(counts: &[i64; 7]) -> AuditTotals {
    let mut totals = AuditTotals::default();
    totals.votes.candidates = counts[..3].iter().sum();
    totals.votes.ballots_cast = counts.iter().sum();
    totals.invalid_write_ins = counts[3];
    totals.valid_write_ins = counts[4];
    totals.votes.undervotes = counts[5];
    totals.votes.overvotes = counts[6];
    totals
}
