use std::path::Path;

use chrono::Local;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::reconcile::Reconciliation;
use crate::totals::{AUDIT_KEYS, VOTE_TOTAL_KEYS};
use crate::{info_time, Result};

/// `County`, then the official, audit and delta columns.
pub fn headers() -> Vec<String> {
    let groups: [(&str, &[&str]); 3] = [
        ("Ofc", &VOTE_TOTAL_KEYS),
        ("RLA", &AUDIT_KEYS),
        ("\u{0394}", &VOTE_TOTAL_KEYS),
    ];

    let mut headers = vec!["County".to_string()];
    for (prefix, keys) in groups {
        headers.extend(keys.iter().map(|key| format!("{prefix}-{key}")));
    }
    headers
}

/// Renders the comparison table, one row per reconciled county.
pub fn render_csv(recon: &Reconciliation) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers())?;

    for row in &recon.rows {
        let values = row
            .official
            .values()
            .into_iter()
            .chain(row.audit.values())
            .chain(row.delta.values())
            .map(|value| value.to_string());
        writer.write_record(std::iter::once(row.name.clone()).chain(values))?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

pub async fn write_output(path: &Path, recon: &Reconciliation) -> Result<()> {
    let start_time = Local::now();
    let bytes = render_csv(recon)?;

    let mut file = File::create(path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    info_time!(start_time, "Wrote {} rows to: {}", recon.rows.len(), path.display());

    Ok(())
}
