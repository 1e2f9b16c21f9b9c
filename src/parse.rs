use std::path::{Path, PathBuf};

use chrono::Local;
use clap::ValueEnum;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::county::Counties;
use crate::totals::{OfficialTotals, VoteTotals};
use crate::{
    info_time, Error, Result, CONTEST_PREFIX, DETAIL_XML_MEMBER, DETAIL_XML_URL, SUM_JSON_URL,
};

/// The results file published per county.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OfficialFormat {
    /// `detailxml.zip`, with candidate, undervote and overvote totals.
    DetailXml,
    /// `sum.json`, ballots cast only.
    SumJson,
}

impl OfficialFormat {
    /// Name of the download subdirectory and of the cache file.
    pub fn name(self) -> &'static str {
        match self {
            OfficialFormat::DetailXml => "detailxml",
            OfficialFormat::SumJson => "sumjson",
        }
    }

    pub fn default_url_template(self) -> &'static str {
        match self {
            OfficialFormat::DetailXml => DETAIL_XML_URL,
            OfficialFormat::SumJson => SUM_JSON_URL,
        }
    }

    pub fn zip_member(self) -> Option<&'static str> {
        match self {
            OfficialFormat::DetailXml => Some(DETAIL_XML_MEMBER),
            OfficialFormat::SumJson => None,
        }
    }

    /// Extension of the parsed files in the download directory.
    pub fn extension(self) -> &'static str {
        match self {
            OfficialFormat::DetailXml => "xml",
            OfficialFormat::SumJson => "json",
        }
    }

    pub fn parse(self, text: &str) -> Result<VoteTotals> {
        match self {
            OfficialFormat::DetailXml => parse_detail_xml(text),
            OfficialFormat::SumJson => parse_sum_json(text),
        }
    }
}

/// Parses every county file in `dir`. Files are named `NNN-Name.ext`, `NNN` being the county index.
pub async fn read_official_totals(
    dir: &Path,
    counties: &Counties,
    format: OfficialFormat,
) -> Result<OfficialTotals> {
    let start_time = Local::now();
    let mut totals = OfficialTotals::new();

    for path in sorted_entries(dir).await? {
        // Skip files like ".gitkeep" and ".DS_Store".
        let Some(ext) = path.extension() else {
            continue;
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if ext != format.extension() {
            warn!("skipping unexpected file: {}", path.display());
            continue;
        }

        let index = file_name
            .split('-')
            .next()
            .and_then(|prefix| prefix.parse::<usize>().ok())
            .ok_or_else(|| Error::DownloadName(file_name.clone()))?;
        let Some(county) = counties.by_index(index) else {
            warn!("skipping file of an unlisted county index {index}: {}", path.display());
            continue;
        };

        let county_totals = parse_file(path.clone(), format)
            .await
            .map_err(|e| e.in_file(&path))?;
        debug!("{}: {:?}", county.name, county_totals);
        totals.insert(county.name.clone(), county_totals);
    }

    info_time!(start_time, "Parsed official totals for {} counties", totals.len());
    Ok(totals)
}

async fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort_unstable();
    Ok(paths)
}

async fn parse_file(path: PathBuf, format: OfficialFormat) -> Result<VoteTotals> {
    let text = tokio::fs::read_to_string(&path).await?;
    spawn_blocking(move || format.parse(&text)).await?
}

/// Extracts the presidential contest totals from a county's `detail.xml`.
pub fn parse_detail_xml(text: &str) -> Result<VoteTotals> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut ballots_cast = None;
    let mut undervotes = None;
    let mut overvotes = None;
    let mut candidates = 0;
    let mut seen_contest = false;

    // Number of currently open elements, and the depth of the first contest while inside it.
    let mut depth = 0usize;
    let mut contest_depth = None;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) | Event::Empty(e) => {
                match e.name().as_ref() {
                    b"VoterTurnout" if ballots_cast.is_none() => {
                        ballots_cast = Some(count_attr(e, b"ballotsCast", "ballotsCast")?);
                    }
                    b"Contest" if !seen_contest => {
                        seen_contest = true;
                        let name = attr(e, b"text").unwrap_or_default();
                        if !name.starts_with(CONTEST_PREFIX) {
                            return Err(Error::WrongContest(name));
                        }
                        if matches!(event, Event::Start(_)) {
                            contest_depth = Some(depth);
                        }
                    }
                    // Only the contest's own children; choices carry vote types of their own.
                    b"VoteType" if contest_depth.map(|d| d + 1) == Some(depth) => {
                        let name = attr(e, b"name").unwrap_or_default();
                        let votes = count_attr(e, b"votes", "votes")?;
                        match name.as_str() {
                            "Overvotes" => overvotes = Some(votes),
                            "Undervotes" => undervotes = Some(votes),
                            _ => return Err(Error::UnexpectedVoteType(name)),
                        }
                    }
                    b"Choice" if contest_depth.map(|d| d + 1) == Some(depth) => {
                        let name = attr(e, b"text").unwrap_or_default();
                        if !["Trump", "Biden", "Jorgensen"]
                            .iter()
                            .any(|candidate| name.contains(candidate))
                        {
                            return Err(Error::UnexpectedChoice(name));
                        }
                        candidates += count_attr(e, b"totalVotes", "totalVotes")?;
                    }
                    _ => {}
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if contest_depth == Some(depth) {
                    contest_depth = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_contest {
        return Err(Error::MissingField("Contest"));
    }
    Ok(VoteTotals {
        candidates,
        ballots_cast: ballots_cast.ok_or(Error::MissingField("VoterTurnout"))?,
        undervotes: undervotes.ok_or(Error::MissingField("Undervotes"))?,
        overvotes: overvotes.ok_or(Error::MissingField("Overvotes"))?,
    })
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn count_attr(e: &BytesStart, key: &[u8], field: &'static str) -> Result<i64> {
    let value = attr(e, key).ok_or(Error::MissingField(field))?;
    parse_count(field, &value)
}

pub(crate) fn parse_count(field: &'static str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidCount {
            field,
            value: value.to_string(),
        })
}

#[derive(Deserialize)]
struct SumJson {
    #[serde(rename = "Contests")]
    contests: Vec<SumContest>,
}

#[derive(Deserialize)]
struct SumContest {
    #[serde(rename = "C")]
    name: String,
    #[serde(rename = "BC")]
    ballots_cast: i64,
}

/// Extracts ballots cast from a county's `sum.json`. The other totals are left at zero.
pub fn parse_sum_json(text: &str) -> Result<VoteTotals> {
    let data: SumJson = serde_json::from_str(text)?;
    let contest = data
        .contests
        .into_iter()
        .next()
        .ok_or(Error::MissingField("Contests"))?;
    if !contest.name.starts_with(CONTEST_PREFIX) {
        return Err(Error::WrongContest(contest.name));
    }

    Ok(VoteTotals {
        ballots_cast: contest.ballots_cast,
        ..Default::default()
    })
}
