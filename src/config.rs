use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::parse::OfficialFormat;
use crate::reconcile::Adjustment;
use crate::request::DownloadSettings;
use crate::{
    AUDIT_REPORT_PATH, CACHE_DIR, COUNTIES_PATH, DEFAULT_ADJUSTMENT_AMOUNT,
    DEFAULT_ADJUSTMENT_COUNTY, DOWNLOADS_DIR, DOWNLOAD_DELAY_SECS, EXPECTED_NUM_OF_COUNTIES, OUTPUT_PATH,
};

#[derive(Debug, Clone, Parser)]
#[cfg_attr(test, derive(PartialEq))]
#[clap(author, version, about)]
pub struct Opt {
    /// The participating counties, as found under `settings.electiondetails` of the results
    /// site's `electionsettings.json`.
    #[clap(long, default_value = COUNTIES_PATH, env = "BALLOTS_RECON_COUNTIES")]
    pub counties: PathBuf,

    /// The batch results lines of the audit report, as CSV with a header row.
    #[clap(long, default_value = AUDIT_REPORT_PATH, env = "BALLOTS_RECON_AUDIT_REPORT")]
    pub audit_report: PathBuf,

    #[clap(long, default_value = DOWNLOADS_DIR, env = "BALLOTS_RECON_DOWNLOADS_DIR")]
    pub downloads_dir: PathBuf,

    #[clap(long, default_value = CACHE_DIR, env = "BALLOTS_RECON_CACHE_DIR")]
    pub cache_dir: PathBuf,

    #[clap(long, short, default_value = OUTPUT_PATH, env = "BALLOTS_RECON_OUTPUT")]
    pub output: PathBuf,

    /// Which official results file to fetch per county.
    #[clap(long, value_enum, default_value_t = OfficialFormat::DetailXml)]
    pub format: OfficialFormat,

    /// Results URL with `{name}`, `{id1}` and `{id2}` placeholders. Defaults to the
    /// Georgia results site for the chosen format.
    #[clap(long, env = "BALLOTS_RECON_URL_TEMPLATE")]
    pub url_template: Option<String>,

    /// Seconds to wait after each download.
    #[clap(long, default_value_t = DOWNLOAD_DELAY_SECS)]
    pub delay_secs: u64,

    /// Don't download anything, use what is already in the downloads directory.
    #[clap(long)]
    pub offline: bool,

    /// Ignore cached totals and parse the sources again.
    #[clap(long)]
    pub refresh: bool,

    /// Subtract `AMOUNT` from a county's audited ballots cast and undervotes, as `NAME=AMOUNT`.
    /// Can be repeated. Added to the default Gwinnett=119461 correction, which an adjustment
    /// naming Gwinnett replaces.
    #[clap(long = "adjust")]
    pub adjustments: Vec<Adjustment>,

    /// Don't apply the default Gwinnett correction.
    #[clap(long)]
    pub no_adjust: bool,

    /// Warn when the number of reconciled counties differs. 0 disables the check.
    #[clap(long, default_value_t = EXPECTED_NUM_OF_COUNTIES)]
    pub expect_counties: usize,

    /// Sets a custom logging filter. Syntax is `<target>=<level>`, e.g. -lballots_recon=debug.
    ///
    /// Log levels (least to most verbose) are error, warn, info, debug, and trace.
    /// By default, all targets log `info`. The global log level can be set with `-l<level>`.
    #[clap(long, short, default_value = "info")]
    pub log: String,
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub counties_path: PathBuf,
    pub audit_report_path: PathBuf,
    pub downloads_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub output_path: PathBuf,
    pub format: OfficialFormat,
    pub url_template: String,
    pub delay: Duration,
    pub offline: bool,
    pub refresh: bool,
    pub adjustments: Vec<Adjustment>,
    pub expected_counties: Option<usize>,
}

impl Settings {
    /// Directory holding the downloaded files for the chosen format.
    pub fn format_dir(&self) -> PathBuf {
        self.downloads_dir.join(self.format.name())
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            url_template: self.url_template.clone(),
            output_dir: self.format_dir(),
            zip_member: self.format.zip_member().map(str::to_string),
            delay: self.delay,
        }
    }
}

impl From<Opt> for Settings {
    fn from(opt: Opt) -> Self {
        let url_template = opt
            .url_template
            .unwrap_or_else(|| opt.format.default_url_template().to_string());
        let mut adjustments = Vec::with_capacity(opt.adjustments.len() + 1);
        if !opt.no_adjust
            && !opt
                .adjustments
                .iter()
                .any(|a| a.county == DEFAULT_ADJUSTMENT_COUNTY)
        {
            adjustments.push(Adjustment {
                county: DEFAULT_ADJUSTMENT_COUNTY.to_string(),
                amount: DEFAULT_ADJUSTMENT_AMOUNT,
            });
        }
        adjustments.extend(opt.adjustments);

        Settings {
            counties_path: opt.counties,
            audit_report_path: opt.audit_report,
            downloads_dir: opt.downloads_dir,
            cache_dir: opt.cache_dir,
            output_path: opt.output,
            format: opt.format,
            url_template,
            delay: Duration::from_secs(opt.delay_secs),
            offline: opt.offline,
            refresh: opt.refresh,
            adjustments,
            expected_counties: (opt.expect_counties > 0).then_some(opt.expect_counties),
        }
    }
}
