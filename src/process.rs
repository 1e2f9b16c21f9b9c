use chrono::Local;
use reqwest::Client;

use crate::audit::{read_audit_totals, AuditReport, CachedAuditReport};
use crate::cache::{load_cached, store_cached};
use crate::config::Settings;
use crate::county::{load_counties, Counties};
use crate::output::write_output;
use crate::parse::read_official_totals;
use crate::reconcile::{apply_adjustments, reconcile, Reconciliation};
use crate::request::download_county_results;
use crate::totals::OfficialTotals;
use crate::{info_time, Result};

/// Cache name of the parsed audit report.
const AUDIT_CACHE_NAME: &str = "rla-totals";

/// Downloads the official results, reads both sources, and writes the comparison table.
pub async fn process_election(settings: &Settings) -> Result<Reconciliation> {
    let start_time = Local::now();
    info_time!("Started reconciling ballots cast");

    let counties = load_counties(&settings.counties_path).await?;

    if settings.offline {
        info_time!("Offline, using the files in {}", settings.format_dir().display());
    } else {
        let client = Client::new();
        download_county_results(&client, &counties, &settings.download_settings()).await?;
    }

    let official = official_totals(settings, &counties).await?;
    let AuditReport {
        totals: mut audit,
        unknown_names,
    } = audit_totals(settings, &counties).await?;
    apply_adjustments(&mut audit, &settings.adjustments)?;

    let mut recon = reconcile(&official, &audit);
    recon.unknown_audit_names = unknown_names.into_iter().collect();
    recon.report_unmatched(settings.expected_counties);
    info_time!(
        start_time,
        "Reconciled {} counties ({} official only, {} audit only)",
        recon.county_count(),
        recon.official_only.len(),
        recon.audit_only.len()
    );

    write_output(&settings.output_path, &recon).await?;
    Ok(recon)
}

async fn official_totals(settings: &Settings, counties: &Counties) -> Result<OfficialTotals> {
    let cache_name = settings.format.name();
    if !settings.refresh {
        if let Some(totals) = load_cached(&settings.cache_dir, cache_name).await? {
            return Ok(totals);
        }
    }

    let totals = read_official_totals(&settings.format_dir(), counties, settings.format).await?;
    store_cached(&settings.cache_dir, cache_name, &totals).await?;
    Ok(totals)
}

/// Adjustments aren't cached, they are applied to a fresh copy on every run.
async fn audit_totals(settings: &Settings, counties: &Counties) -> Result<AuditReport> {
    if !settings.refresh {
        if let Some(cached) =
            load_cached::<CachedAuditReport>(&settings.cache_dir, AUDIT_CACHE_NAME).await?
        {
            return Ok(cached.into());
        }
    }

    let report = read_audit_totals(&settings.audit_report_path, counties).await?;
    store_cached(&settings.cache_dir, AUDIT_CACHE_NAME, &report).await?;
    Ok(report)
}
