// src/recipe/kitchen/sources.rs

//! Source acquisition and verification
//!
//! Every `SourceN:` and `PatchN:` entry is resolved to a file in the sources
//! directory, by download when the entry is a URL and by lookup otherwise.
//! The file is copied into the build directory under its local name and every
//! declared digest is checked. A declared signature is fetched the same way
//! and verified with the [`SignatureVerifier`].

use super::signature::{SignatureVerifier, verify_source};
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::hash::hash_file;
use crate::recipe::package::{Recipe, SourceEntry, url_basename};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Whether a source location is a URL to download rather than a cached path
pub fn is_remote(location: &str) -> bool {
    Url::parse(location).is_ok_and(|url| url.scheme() != "file" && url.has_host())
}

/// Filesystem path named by a `file://` location
pub fn file_url_path(location: &str) -> Option<PathBuf> {
    Url::parse(location)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
}

/// Stream an HTTP response to a file, updating the progress bar if any
fn stream_response_to_file(
    mut response: reqwest::blocking::Response,
    file: &mut File,
    progress_bar: Option<&ProgressBar>,
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;

        downloaded += bytes_read as u64;

        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    Ok(downloaded)
}

fn create_progress_bar(size: u64, name: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(name.to_string());
    pb
}

/// Blocking HTTP downloader
///
/// There is no timeout and no retry: a failed download fails the build.
pub struct Downloader {
    client: Client,
    show_progress: bool,
}

impl Downloader {
    pub fn new(show_progress: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .user_agent(concat!("alpmbuild/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            show_progress,
        })
    }

    /// Download `url` to `dest`, replacing it only once the body is complete
    pub fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let progress = self
            .show_progress
            .then(|| {
                create_progress_bar(response.content_length().unwrap_or(0), &url_basename(url))
            });

        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let mut file = File::create(&partial)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", partial.display())))?;
        let size = stream_response_to_file(response, &mut file, progress.as_ref())?;
        drop(file);

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        fs::rename(&partial, dest).map_err(|e| {
            Error::IoError(format!("Failed to move download to {}: {e}", dest.display()))
        })?;

        debug!("Downloaded {} bytes to {}", size, dest.display());
        Ok(size)
    }
}

/// Resolves sources into the working area
pub struct SourceFetcher<'a> {
    ctx: &'a BuildContext,
    downloader: Option<Downloader>,
}

impl<'a> SourceFetcher<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            downloader: None,
        }
    }

    fn downloader(&mut self) -> Result<&Downloader> {
        let downloader = match self.downloader.take() {
            Some(downloader) => downloader,
            None => {
                let show_progress =
                    !self.ctx.options.hide_command_output && std::io::stderr().is_terminal();
                Downloader::new(show_progress)?
            }
        };
        Ok(self.downloader.insert(downloader))
    }

    /// Resolve a location to a file in the sources directory
    pub fn cache(&mut self, location: &str) -> Result<PathBuf> {
        if is_remote(location) {
            let dest = self.ctx.area.sources.join(url_basename(location));
            self.ctx
                .reporter
                .status(format!("Downloading {}...", url_basename(location)));
            self.downloader()?.download(location, &dest)?;
            return Ok(dest);
        }

        if let Some(path) = file_url_path(location) {
            if !path.is_file() {
                return Err(Error::NotFound(format!("source {}", location)));
            }
            debug!("Using local file {}", path.display());
            return Ok(path);
        }

        let cached = self.ctx.area.sources.join(location);
        if !cached.is_file() {
            return Err(Error::NotFound(format!(
                "source {} (expected at {})",
                location,
                cached.display()
            )));
        }
        debug!("Using cached source {}", cached.display());
        Ok(cached)
    }

    /// Cache, copy into the build directory and verify one entry
    pub fn acquire(
        &mut self,
        entry: &SourceEntry,
        verifier: &dyn SignatureVerifier,
    ) -> Result<PathBuf> {
        let cached = self.cache(&entry.url)?;

        let target = self.ctx.area.build.join(entry.local_name());
        if cached != target {
            fs::copy(&cached, &target).map_err(|e| {
                Error::IoError(format!(
                    "Failed to copy {} to {}: {e}",
                    cached.display(),
                    target.display()
                ))
            })?;
        }

        verify_digests(entry, &target)?;

        if let Some(signature) = &entry.signature {
            let signature_file = self.cache(signature)?;
            verify_source(verifier, entry, &cached, &signature_file, &self.ctx.reporter)?;
        }

        Ok(target)
    }
}

/// Check every declared digest of `file`
pub fn verify_digests(entry: &SourceEntry, file: &Path) -> Result<()> {
    for (algorithm, expected) in &entry.digests {
        let actual = hash_file(*algorithm, file).map_err(|e| {
            Error::IoError(format!("Failed to hash {}: {e}", file.display()))
        })?;

        if !actual.eq_ignore_ascii_case(expected) {
            return Err(Error::ChecksumMismatch {
                file: entry.local_name(),
                algorithm: algorithm.name().to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        debug!("{} {} ok for {}", algorithm.name(), actual, entry.local_name());
    }
    Ok(())
}

/// Acquire every source and patch of the recipe into the build directory
pub fn acquire_sources(
    ctx: &BuildContext,
    recipe: &Recipe,
    verifier: &dyn SignatureVerifier,
) -> Result<Vec<PathBuf>> {
    let root = recipe.root();
    let mut fetcher = SourceFetcher::new(ctx);
    let mut acquired = Vec::new();

    for entry in root.sources.iter().chain(root.patches.iter()) {
        acquired.push(fetcher.acquire(entry, verifier)?);
    }

    info!("Acquired {} source files", acquired.len());
    Ok(acquired)
}
