use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use reqwest::{Client, StatusCode};
use tokio::{fs::File, io::AsyncWriteExt, task::spawn_blocking};
use tracing::info;

use crate::county::{Counties, County};
use crate::{info_time, Error, Result};

/// Where and how the per-county result files are fetched.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// URL with `{name}`, `{id1}` and `{id2}` placeholders.
    pub url_template: String,
    pub output_dir: PathBuf,
    /// When set, the download is a zip archive and only this member is kept.
    pub zip_member: Option<String>,
    pub delay: Duration,
}

pub fn county_url(template: &str, county: &County) -> String {
    template
        .replace("{name}", &county.url_name())
        .replace("{id1}", &county.id1)
        .replace("{id2}", &county.id2)
}

/// `{index:03}-{name}.{ext}`, the extension taken from the url.
pub fn download_file_name(county: &County, url: &str) -> String {
    let ext = url.rsplit('.').next().unwrap_or_default();
    format!("{:03}-{}.{ext}", county.index, county.url_name())
}

/// Downloads every county's results into `settings.output_dir`, skipping files already on disk.
/// Returns how many files were actually fetched.
pub async fn download_county_results(
    client: &Client,
    counties: &Counties,
    settings: &DownloadSettings,
) -> Result<usize> {
    let start_time = Local::now();
    tokio::fs::create_dir_all(&settings.output_dir).await?;

    let mut downloaded = 0;
    for county in counties.iter() {
        let url = county_url(&settings.url_template, county);
        let path = settings.output_dir.join(download_file_name(county, &url));
        let target = match &settings.zip_member {
            Some(member) => unzipped_path(&path, member),
            None => path.clone(),
        };

        if !download(client, &url, &path, &target).await? {
            continue;
        }
        downloaded += 1;

        if let Some(member) = &settings.zip_member {
            unzip_member(&path, member).await?;
        }

        if !settings.delay.is_zero() {
            info!(
                "sleeping for {} seconds before next download...",
                settings.delay.as_secs_f64()
            );
            tokio::time::sleep(settings.delay).await;
        }
    }

    info_time!(
        start_time,
        "Downloaded {} of {} county results",
        downloaded,
        counties.len()
    );
    Ok(downloaded)
}

/// Fetches `url` into `path` unless `target` already exists.
/// Returns whether a request was made.
pub async fn download(client: &Client, url: &str, path: &Path, target: &Path) -> Result<bool> {
    if tokio::fs::try_exists(target).await? {
        info!("already downloaded: {}", target.display());
        return Ok(false);
    }

    info!("downloading: {url}");
    let res = client.get(url).send().await?;
    if res.status() != StatusCode::OK {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: res.status().as_u16(),
        });
    }
    let body = res.bytes().await?;

    let mut file = File::create(path).await?;
    file.write_all(&body).await?;
    file.flush().await?;
    info!("wrote to: {}", path.display());

    Ok(true)
}

/// The zip's path with the member's extension.
fn unzipped_path(zip_path: &Path, member: &str) -> PathBuf {
    match Path::new(member).extension() {
        Some(ext) => zip_path.with_extension(ext),
        None => zip_path.with_extension(""),
    }
}

/// Extracts `member` next to the archive, renamed after the archive, then removes the archive.
/// The member goes through a `.part` file, renamed only once it was read and checked in full.
pub async fn unzip_member(zip_path: &Path, member: &str) -> Result<PathBuf> {
    let new_path = unzipped_path(zip_path, member);
    let part_path = new_path.with_extension("part");

    let extracted = spawn_blocking({
        let zip_path = zip_path.to_path_buf();
        let member = member.to_string();
        let part_path = part_path.clone();
        move || -> Result<()> {
            let file = std::fs::File::open(&zip_path)?;
            let mut archive = zip::ZipArchive::new(file)?;
            let mut entry = archive.by_name(&member)?;
            let mut out = std::fs::File::create(&part_path)?;
            std::io::copy(&mut entry, &mut out)?;
            out.sync_all()?;
            Ok(())
        }
    })
    .await?;

    if let Err(e) = extracted {
        if tokio::fs::try_exists(&part_path).await.unwrap_or(false) {
            tokio::fs::remove_file(&part_path).await?;
        }
        return Err(e.in_file(zip_path));
    }
    tokio::fs::rename(&part_path, &new_path).await?;
    info!("extracted to: {}", new_path.display());

    info!("removing: {}", zip_path.display());
    tokio::fs::remove_file(zip_path).await?;

    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use httpmock::prelude::*;

    use super::*;

    fn county(index: usize, name: &str) -> County {
        County {
            index,
            name: name.into(),
            id1: "105371".into(),
            id2: "271560".into(),
        }
    }

    fn zipped(member: &str, content: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file(member, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn builds_url_and_file_name() {
        let county = county(7, "Ben Hill");
        let url = county_url(
            "https://example.com//GA/{name}/{id1}/{id2}/reports/detailxml.zip",
            &county,
        );
        assert_eq!(
            url,
            "https://example.com//GA/Ben_Hill/105371/271560/reports/detailxml.zip"
        );
        assert_eq!(download_file_name(&county, &url), "007-Ben_Hill.zip");
    }

    #[tokio::test]
    async fn download_skips_existing_target() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/sum.json");
                then.status(200).body(r#"{"Contests": []}"#);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000-Appling.json");
        let client = Client::new();
        let url = server.url("/sum.json");

        assert!(download(&client, &url, &path, &path).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"Contests": []}"#
        );
        assert!(!download(&client, &url, &path, &path).await.unwrap());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn download_fails_on_bad_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(404);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000-Appling.json");
        let err = download(&Client::new(), &server.url("/missing.json"), &path, &path)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn downloads_and_unzips_every_county() {
        let server = MockServer::start_async().await;
        let appling = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/GA/Appling/105371/271560/reports/detailxml.zip");
                then.status(200).body(zipped("detail.xml", "<ElectionResult/>"));
            })
            .await;
        let ben_hill = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/GA/Ben_Hill/105371/271560/reports/detailxml.zip");
                then.status(200).body(zipped("detail.xml", "<Other/>"));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("detailxml");
        let settings = DownloadSettings {
            url_template: format!(
                "{}/GA/{{name}}/{{id1}}/{{id2}}/reports/detailxml.zip",
                server.base_url()
            ),
            output_dir: output_dir.clone(),
            zip_member: Some("detail.xml".into()),
            delay: Duration::ZERO,
        };
        let counties = Counties::new(vec![county(0, "Appling"), county(1, "Ben Hill")]);
        let client = Client::new();

        let fetched = download_county_results(&client, &counties, &settings)
            .await
            .unwrap();
        assert_eq!(fetched, 2);
        assert_eq!(
            std::fs::read_to_string(output_dir.join("000-Appling.xml")).unwrap(),
            "<ElectionResult/>"
        );
        assert_eq!(
            std::fs::read_to_string(output_dir.join("001-Ben_Hill.xml")).unwrap(),
            "<Other/>"
        );
        assert!(!output_dir.join("000-Appling.zip").exists());

        // Second run finds the extracted files and makes no requests.
        let fetched = download_county_results(&client, &counties, &settings)
            .await
            .unwrap();
        assert_eq!(fetched, 0);
        appling.assert_hits_async(1).await;
        ben_hill.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn unzip_reports_missing_member() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("000-Appling.zip");
        std::fs::write(&zip_path, zipped("other.xml", "<x/>")).unwrap();

        let err = unzip_member(&zip_path, "detail.xml").await.unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }));
        assert!(zip_path.exists());
    }

    #[tokio::test]
    async fn corrupt_member_leaves_no_target() {
        let server = MockServer::start_async().await;
        let mut body = zipped("detail.xml", "<ElectionResult>GOODDATA</ElectionResult>");
        let pos = body
            .windows(8)
            .position(|w| w == b"GOODDATA")
            .unwrap();
        body[pos] = b'X';
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/GA/Appling/105371/271560/reports/detailxml.zip");
                then.status(200).body(body);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("detailxml");
        let settings = DownloadSettings {
            url_template: format!(
                "{}/GA/{{name}}/{{id1}}/{{id2}}/reports/detailxml.zip",
                server.base_url()
            ),
            output_dir: output_dir.clone(),
            zip_member: Some("detail.xml".into()),
            delay: Duration::ZERO,
        };
        let counties = Counties::new(vec![county(0, "Appling")]);
        let client = Client::new();

        let err = download_county_results(&client, &counties, &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }));
        assert!(!output_dir.join("000-Appling.xml").exists());
        assert!(!output_dir.join("000-Appling.part").exists());

        // The next run fetches the archive again instead of trusting a broken target.
        assert!(download_county_results(&client, &counties, &settings)
            .await
            .is_err());
        mock.assert_hits_async(2).await;
    }
}
