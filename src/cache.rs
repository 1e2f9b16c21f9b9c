//! Parsed totals are kept as pretty-printed JSON, so later runs skip parsing entirely.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::{Error, Result};

pub fn cache_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// Returns `None` if nothing was cached under `name` yet.
pub async fn load_cached<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Option<T>> {
    let path = cache_path(dir, name);
    if !tokio::fs::try_exists(&path).await? {
        return Ok(None);
    }

    info!("using cached data: {}", path.display());
    let text = tokio::fs::read_to_string(&path).await?;
    let data = serde_json::from_str(&text).map_err(|e| Error::from(e).in_file(&path))?;
    Ok(Some(data))
}

pub async fn store_cached<T: Serialize>(dir: &Path, name: &str, data: &T) -> Result<PathBuf> {
    let path = cache_path(dir, name);
    tokio::fs::create_dir_all(dir).await?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser)?;

    info!("writing json: {}", path.display());
    tokio::fs::write(&path, buf).await?;
    Ok(path)
}
