use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// A participating county as listed in the election settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct County {
    /// 0-based position in the county list, used to name the download files.
    pub index: usize,
    pub name: String,
    pub id1: String,
    pub id2: String,
}

impl County {
    /// Name as it appears in result URLs and download file names.
    pub fn url_name(&self) -> String {
        self.name.replace(' ', "_")
    }
}

/// Either the extracted county list or the whole `electionsettings.json`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CountiesFile {
    Extracted {
        participatingcounties: Vec<String>,
    },
    Settings {
        settings: ElectionSettings,
    },
}

#[derive(Deserialize)]
struct ElectionSettings {
    electiondetails: ElectionDetails,
}

#[derive(Deserialize)]
struct ElectionDetails {
    participatingcounties: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Counties {
    counties: Vec<County>,
    by_normalized: HashMap<String, usize>,
}

impl Counties {
    pub fn new(counties: Vec<County>) -> Self {
        let by_normalized = counties
            .iter()
            .enumerate()
            .map(|(pos, county)| (normalize(&county.name), pos))
            .collect();
        Counties {
            counties,
            by_normalized,
        }
    }

    /// Parses the `participatingcounties` lines, in order.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let counties = lines
            .iter()
            .enumerate()
            .map(|(index, line)| parse_county_line(index, line.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Counties::new(counties))
    }

    pub fn iter(&self) -> impl Iterator<Item = &County> {
        self.counties.iter()
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    pub fn by_index(&self, index: usize) -> Option<&County> {
        self.counties.get(index)
    }

    /// Looks a name up the way the audit report spells it (upper case).
    pub fn resolve_normalized(&self, name: &str) -> Option<&County> {
        self.by_normalized
            .get(&normalize(name))
            .map(|&pos| &self.counties[pos])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.counties.iter().map(|c| c.name.as_str())
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Parses a line like `Appling|105371|271560|11/16/2020 3:48:35 PM EST|16`.
pub fn parse_county_line(index: usize, line: &str) -> Result<County> {
    let mut parts = line.split('|');
    let (Some(name), Some(id1), Some(id2)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::CountyLine {
            index,
            line: line.to_string(),
        });
    };
    if name.is_empty() || id1.is_empty() || id2.is_empty() {
        return Err(Error::CountyLine {
            index,
            line: line.to_string(),
        });
    }

    Ok(County {
        index,
        name: name.replace('_', " "),
        id1: id1.to_string(),
        id2: id2.to_string(),
    })
}

pub async fn load_counties(path: &Path) -> Result<Counties> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::from(e).in_file(path))?;
    let file: CountiesFile =
        serde_json::from_str(&text).map_err(|e| Error::from(e).in_file(path))?;
    let lines = match file {
        CountiesFile::Extracted {
            participatingcounties,
        } => participatingcounties,
        CountiesFile::Settings { settings } => settings.electiondetails.participatingcounties,
    };

    let counties = Counties::from_lines(&lines)?;
    debug!("loaded {} counties from {}", counties.len(), path.display());
    Ok(counties)
}
