//! BALLOTS CAST RECONCILIATION
//! Compares the per-county ballots cast published on the official results site
//! with the totals from the risk-limiting audit report.

mod error;
mod macros;

pub mod audit;
pub mod cache;
pub mod config;
pub mod county;
pub mod output;
pub mod parse;
pub mod process;
pub mod reconcile;
pub mod request;
pub mod totals;

pub use error::{Error, Result};

const COUNTIES_PATH: &str = "input-data/counties.json";
const AUDIT_REPORT_PATH: &str = "input-data/audit-report-batch-results-lines.csv";
const DOWNLOADS_DIR: &str = "downloads";
const CACHE_DIR: &str = "cache";
const OUTPUT_PATH: &str = "output.csv";

const DETAIL_XML_URL: &str =
    "https://results.enr.clarityelections.com//GA/{name}/{id1}/{id2}/reports/detailxml.zip";
const SUM_JSON_URL: &str =
    "https://results.enr.clarityelections.com//GA/{name}/{id1}/{id2}/json/sum.json";
/// Member of the `detailxml.zip` archive holding the results.
const DETAIL_XML_MEMBER: &str = "detail.xml";

/// Pause between two actual downloads, so the results site isn't hammered.
const DOWNLOAD_DELAY_SECS: u64 = 5;

/// Only the presidential contest is reconciled.
const CONTEST_PREFIX: &str = "President of the United States";

/// Georgia has 159 counties.
const EXPECTED_NUM_OF_COUNTIES: usize = 159;

/// Gwinnett counted the second card of its two-card ballots as undervotes in the audit.
/// The absentee-by-mail card #2 count from the official results is subtracted as a proxy.
const DEFAULT_ADJUSTMENT_COUNTY: &str = "Gwinnett";
const DEFAULT_ADJUSTMENT_AMOUNT: i64 = 119461;
