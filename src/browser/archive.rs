//! Pinned browser archive for read-only hosts.
//!
//! The archive is downloaded once per cache directory and unpacked into a
//! directory keyed by the archive's file name. Unpacking happens in a
//! temporary sibling that is renamed into place, so two requests populating
//! the cache at the same time only waste a download.

use futures::StreamExt;
use reqwest::Client;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::ProvisioningFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
}

impl ArchiveFormat {
    pub fn from_url(url: &Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            ArchiveFormat::TarGz
        } else {
            ArchiveFormat::Tar
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveCache {
    url: Url,
    cache_dir: PathBuf,
    executable: PathBuf,
    http: Client,
}

impl ArchiveCache {
    pub fn new(url: Url, cache_dir: impl Into<PathBuf>, executable: impl Into<PathBuf>, http: Client) -> Self {
        Self {
            url,
            cache_dir: cache_dir.into(),
            executable: executable.into(),
            http,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn install_dir(&self) -> PathBuf {
        self.cache_dir.join(cache_key(&self.url))
    }

    pub fn executable_path(&self) -> PathBuf {
        self.install_dir().join(&self.executable)
    }

    pub fn is_materialized(&self) -> bool {
        self.executable_path().is_file()
    }

    /// Path to the unpacked executable, downloading the archive if needed.
    pub async fn ensure(&self) -> Result<PathBuf, ProvisioningFailure> {
        let executable = self.executable_path();
        if executable.is_file() {
            debug!(path = %executable.display(), "browser archive already materialized");
            return Ok(executable);
        }

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| unpack_failure(&self.cache_dir, e))?;

        info!(url = %self.url, cache = %self.cache_dir.display(), "fetching browser archive");
        let download = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| unpack_failure(&self.cache_dir, e))?;
        self.download_to(download.path()).await?;

        let staging = tempfile::Builder::new()
            .prefix(".unpack-")
            .tempdir_in(&self.cache_dir)
            .map_err(|e| unpack_failure(&self.cache_dir, e))?;

        let archive_path = download.path().to_path_buf();
        let staging_path = staging.path().to_path_buf();
        let format = ArchiveFormat::from_url(&self.url);
        tokio::task::spawn_blocking(move || unpack(&archive_path, &staging_path, format))
            .await
            .map_err(|e| ProvisioningFailure::ArchiveUnpack(e.to_string()))??;

        let staged_executable = staging.path().join(&self.executable);
        if !staged_executable.is_file() {
            return Err(ProvisioningFailure::ArchiveMissingExecutable(
                self.executable.clone(),
            ));
        }
        mark_executable(&staged_executable).map_err(|e| unpack_failure(&staged_executable, e))?;

        let install_dir = self.install_dir();
        if let Err(err) = std::fs::rename(staging.path(), &install_dir) {
            // Another request finished populating first.
            if !executable.is_file() {
                return Err(unpack_failure(&install_dir, err));
            }
            debug!("browser cache populated concurrently; discarding staged copy");
        }

        info!(path = %executable.display(), "browser archive materialized");
        Ok(executable)
    }

    async fn download_to(&self, dest: &Path) -> Result<(), ProvisioningFailure> {
        let fetch_failure = |message: String| ProvisioningFailure::ArchiveFetch {
            url: self.url.to_string(),
            message,
        };

        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| fetch_failure(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failure(format!("unexpected status {status}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| unpack_failure(dest, e))?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| fetch_failure(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| unpack_failure(dest, e))?;
        }
        file.flush().await.map_err(|e| unpack_failure(dest, e))?;
        Ok(())
    }
}

fn unpack(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<(), ProvisioningFailure> {
    let file = File::open(archive).map_err(|e| unpack_failure(archive, e))?;
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::Tar => Box::new(BufReader::new(file)),
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(BufReader::new(file))),
    };
    tar::Archive::new(reader)
        .unpack(dest)
        .map_err(|e| unpack_failure(archive, e))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn unpack_failure(path: &Path, err: std::io::Error) -> ProvisioningFailure {
    ProvisioningFailure::ArchiveUnpack(format!("{}: {}", path.display(), err))
}

/// Directory name for an archive: its file name without archive extensions.
fn cache_key(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let stem = [".tar.gz", ".tgz", ".tar"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name);
    let key = sanitize_filename::sanitize(stem);
    if key.is_empty() {
        "browser".to_string()
    } else {
        key
    }
}
