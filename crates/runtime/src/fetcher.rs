//! Browser binary provisioning.
//!
//! A [`BrowserFetcher`] is bound to a downloads directory, a download host,
//! and a target platform. Revision metadata is computed without touching the
//! network; [`BrowserFetcher::download`] streams the build archive and
//! extracts it under the project root.

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// CDN serving versioned Firefox automation builds.
pub const DEFAULT_DOWNLOAD_HOST: &str = "https://playwright.azureedge.net/builds/firefox";

/// Progress callback invoked with `(downloaded_bytes, total_bytes)`.
///
/// `downloaded_bytes` is non-decreasing across invocations; `total_bytes` is
/// zero when the server does not report a content length.
pub type OnProgress = dyn Fn(u64, u64) + Send + Sync;

/// Target platform for a browser build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Linux,
    Mac,
    MacArm64,
    Win64,
}

impl Platform {
    /// Detects the platform of the running host.
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Win64
        } else if cfg!(target_os = "macos") {
            if cfg!(target_arch = "aarch64") {
                Platform::MacArm64
            } else {
                Platform::Mac
            }
        } else {
            Platform::Linux
        }
    }

    /// Platform tag used in archive names and folder names.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Mac => "mac",
            Platform::MacArm64 => "mac-arm64",
            Platform::Win64 => "win64",
        }
    }

    fn archive_name(self) -> String {
        format!("firefox-{}.zip", self.as_str())
    }

    /// Path of the browser executable inside an extracted build folder.
    fn executable_relpath(self) -> &'static [&'static str] {
        match self {
            Platform::Linux => &["firefox", "firefox"],
            Platform::Mac | Platform::MacArm64 => {
                &["firefox", "Nightly.app", "Contents", "MacOS", "firefox"]
            }
            Platform::Win64 => &["firefox", "firefox.exe"],
        }
    }
}

/// Options for constructing a [`BrowserFetcher`].
#[derive(Debug, Clone, Default)]
pub struct FetcherOptions {
    /// Download host override; defaults to [`DEFAULT_DOWNLOAD_HOST`].
    pub host: Option<String>,
    /// Platform override; defaults to the detected host platform.
    pub platform: Option<Platform>,
    /// Downloads directory override; defaults to `<project_root>/.local-browsers`.
    pub downloads_path: Option<PathBuf>,
}

impl FetcherOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the download host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the target platform.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Sets the downloads directory.
    pub fn downloads_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.downloads_path = Some(path.into());
        self
    }
}

/// Resolved metadata for one browser revision.
#[derive(Debug, Clone, Serialize)]
pub struct RevisionInfo {
    /// The revision tag this metadata was resolved for.
    pub revision: String,
    /// Folder the build lives in (or will be extracted into).
    pub folder_path: PathBuf,
    /// Path of the browser executable inside the build folder.
    pub executable_path: PathBuf,
    /// URL the build archive is downloaded from.
    pub url: String,
    /// Whether the executable is already present on disk.
    pub local: bool,
}

/// Downloads and resolves versioned browser builds under a project root.
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    downloads_dir: PathBuf,
    host: String,
    platform: Platform,
}

impl BrowserFetcher {
    /// Creates a fetcher bound to `project_root` and the given options.
    ///
    /// Performs no I/O; directories are created on first download.
    pub fn new(project_root: &Path, options: FetcherOptions) -> Self {
        Self {
            downloads_dir: options
                .downloads_path
                .unwrap_or_else(|| project_root.join(".local-browsers")),
            host: options.host.unwrap_or_else(|| DEFAULT_DOWNLOAD_HOST.to_string()),
            platform: options.platform.unwrap_or_else(Platform::detect),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Computes metadata for `revision`.
    ///
    /// Pure apart from a filesystem metadata read to decide the `local` flag.
    pub fn revision_info(&self, revision: &str) -> RevisionInfo {
        let folder_path = self
            .downloads_dir
            .join(format!("firefox-{}-{revision}", self.platform.as_str()));
        let mut executable_path = folder_path.clone();
        for part in self.platform.executable_relpath() {
            executable_path.push(part);
        }
        let url = format!("{}/{revision}/{}", self.host, self.platform.archive_name());
        let local = executable_path.is_file();
        RevisionInfo {
            revision: revision.to_string(),
            folder_path,
            executable_path,
            url,
            local,
        }
    }

    /// Downloads and extracts `revision`, reporting progress along the way.
    ///
    /// Returns immediately if the revision is already local, so a duplicated
    /// concurrent download converges on a correct result. A partial archive
    /// is removed before any error is surfaced.
    ///
    /// # Errors
    ///
    /// Returns `Error::Provisioning` on network, integrity, or disk failure.
    pub async fn download(
        &self,
        revision: &str,
        on_progress: Option<&OnProgress>,
    ) -> Result<RevisionInfo> {
        let info = self.revision_info(revision);
        if info.local {
            tracing::debug!(revision, "revision already downloaded");
            return Ok(info);
        }

        tokio::fs::create_dir_all(&self.downloads_dir)
            .await
            .map_err(|e| {
                Error::Provisioning(format!(
                    "failed to create {}: {e}",
                    self.downloads_dir.display()
                ))
            })?;

        let archive = self
            .downloads_dir
            .join(format!("firefox-{revision}-{}.zip.part", std::process::id()));

        tracing::debug!(revision, url = %info.url, "downloading browser build");
        if let Err(e) = fetch_archive(&info.url, &archive, on_progress).await {
            let _ = tokio::fs::remove_file(&archive).await;
            return Err(e);
        }

        let archive_for_extract = archive.clone();
        let folder = info.folder_path.clone();
        let extract = tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::open(&archive_for_extract)
                .map_err(|e| Error::Provisioning(format!("failed to open archive: {e}")))?;
            let mut zip = zip::ZipArchive::new(file)
                .map_err(|e| Error::Provisioning(format!("corrupt archive: {e}")))?;
            zip.extract(&folder)
                .map_err(|e| Error::Provisioning(format!("failed to extract archive: {e}")))
        })
        .await
        .map_err(|e| Error::Provisioning(format!("extraction task failed: {e}")))?;

        let _ = tokio::fs::remove_file(&archive).await;
        extract?;

        let info = self.revision_info(revision);
        if !info.local {
            return Err(Error::Provisioning(format!(
                "archive for revision {revision} did not contain {}",
                info.executable_path.display()
            )));
        }
        tracing::debug!(revision, path = %info.executable_path.display(), "browser build ready");
        Ok(info)
    }
}

async fn fetch_archive(url: &str, dest: &Path, on_progress: Option<&OnProgress>) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .map_err(|e| Error::Provisioning(format!("download request failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::Provisioning(format!("download rejected: {e}")))?;

    let total = response.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::Provisioning(format!("failed to create {}: {e}", dest.display())))?;

    let mut downloaded = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::Provisioning(format!("download interrupted: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::Provisioning(format!("failed to write archive: {e}")))?;
        downloaded += chunk.len() as u64;
        if let Some(report) = on_progress {
            report(downloaded, total);
        }
    }

    file.flush()
        .await
        .map_err(|e| Error::Provisioning(format!("failed to flush archive: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn fetcher(platform: Platform) -> BrowserFetcher {
        BrowserFetcher::new(
            Path::new("/tmp/project"),
            FetcherOptions::new().platform(platform),
        )
    }

    #[test]
    fn revision_info_computes_stable_paths() {
        let info = fetcher(Platform::Linux).revision_info("1028");
        assert_eq!(
            info.folder_path,
            Path::new("/tmp/project/.local-browsers/firefox-linux-1028")
        );
        assert_eq!(
            info.executable_path,
            Path::new("/tmp/project/.local-browsers/firefox-linux-1028/firefox/firefox")
        );
        assert_eq!(
            info.url,
            format!("{DEFAULT_DOWNLOAD_HOST}/1028/firefox-linux.zip")
        );
        assert!(!info.local);
    }

    #[test]
    fn revision_info_respects_platform_layout() {
        let info = fetcher(Platform::Mac).revision_info("1028");
        assert!(info.executable_path.ends_with("Nightly.app/Contents/MacOS/firefox"));
        assert!(info.url.ends_with("firefox-mac.zip"));

        let info = fetcher(Platform::Win64).revision_info("1028");
        assert!(info.executable_path.ends_with("firefox/firefox.exe"));
    }

    #[test]
    fn host_override_changes_url_only() {
        let fetcher = BrowserFetcher::new(
            Path::new("/tmp/project"),
            FetcherOptions::new()
                .platform(Platform::Linux)
                .host("http://mirror.local/builds"),
        );
        let info = fetcher.revision_info("7");
        assert_eq!(info.url, "http://mirror.local/builds/7/firefox-linux.zip");
        assert!(info.folder_path.starts_with("/tmp/project/.local-browsers"));
    }

    #[tokio::test]
    async fn download_from_unreachable_host_is_a_provisioning_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = BrowserFetcher::new(
            dir.path(),
            FetcherOptions::new()
                .platform(Platform::Linux)
                .host("http://127.0.0.1:9/builds"),
        );

        let err = fetcher.download("1028", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provisioning);

        // No partial archive may be left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(".local-browsers"))
            .map(|entries| entries.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "partial downloads must be cleaned up");
    }

    #[tokio::test]
    async fn download_is_a_no_op_when_already_local() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = BrowserFetcher::new(
            dir.path(),
            FetcherOptions::new().platform(Platform::Linux),
        );
        let info = fetcher.revision_info("9");
        std::fs::create_dir_all(info.executable_path.parent().unwrap()).unwrap();
        std::fs::write(&info.executable_path, b"#!/bin/sh\n").unwrap();

        // Host is unreachable, so success proves no network was touched.
        let info = fetcher.download("9", None).await.unwrap();
        assert!(info.local);
    }
}
