use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed county line at index {index}: {line:?}")]
    CountyLine { index: usize, line: String },
    #[error("Download file name doesn't start with a county index: {0:?}")]
    DownloadName(String),

    #[error("Request to {url} got status code: {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Got contest name: {0:?}")]
    WrongContest(String),
    #[error("The results are missing: {0}")]
    MissingField(&'static str),
    #[error("Unexpected vote type: {0:?}")]
    UnexpectedVoteType(String),
    #[error("Unexpected choice in the presidential contest: {0:?}")]
    UnexpectedChoice(String),
    #[error("Invalid count for {field}: {value:?}")]
    InvalidCount { field: &'static str, value: String },
    #[error("Error reading {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Audit report error at line {line}: {reason}")]
    AuditRow { line: usize, reason: String },

    #[error("Invalid adjustment {0:?}, expected NAME=AMOUNT")]
    AdjustmentSyntax(String),
    #[error("Adjustment for a county missing from the audit totals: {0}")]
    UnknownAdjustmentCounty(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Zip Error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Xml Error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid log directive: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}

impl Error {
    /// Wraps the error with the path of the file that produced it.
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Error::ReadFile {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
