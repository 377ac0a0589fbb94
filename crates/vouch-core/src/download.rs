//! Download an installer to a temporary file.
//!
//! The file is owned by [`DownloadedFile`]: it is removed by
//! [`DownloadedFile::remove`], which reports failure, or on drop otherwise.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{VouchError, VouchResult};

pub const USER_AGENT_VALUE: &str = concat!("vouch/", env!("CARGO_PKG_VERSION"));

const TEMP_PREFIX: &str = "vouch-";

/// HTTP(S) downloader.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    config: DownloadConfig,
}

/// A completely downloaded file in the temp directory.
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
    len: u64,
    sha256: String,
}

impl DownloadedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lowercase hex SHA-256 of the content.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Delete the file, reporting failure.
    pub fn remove(self) -> VouchResult<()> {
        let path = self.path.to_path_buf();
        self.path.close().map_err(|e| VouchError::Cleanup {
            path,
            message: e.to_string(),
        })
    }
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> VouchResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| VouchError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Stream `url` into a new temporary file.
    pub async fn download_to_temp(&self, url: &str) -> VouchResult<DownloadedFile> {
        let parsed = parse_download_url(url)?;
        debug!(url = %parsed, "downloading");

        let mut response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| download_error(url, format!("request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(download_error(url, format!("bad status: {}", status)));
        }

        let expected_len = response.content_length();
        if let Some(len) = expected_len {
            if len > self.config.max_bytes {
                return Err(download_error(
                    url,
                    format!("body of {} bytes exceeds limit of {}", len, self.config.max_bytes),
                ));
            }
        }

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&file_suffix(&parsed))
            .tempfile()
            .map_err(|e| download_error(url, format!("failed to create temp file: {}", e)))?;

        // `temp` still owns deletion; any early return below removes the partial file.
        let handle = temp
            .as_file()
            .try_clone()
            .map_err(|e| download_error(url, format!("failed to open temp file: {}", e)))?;
        let mut out = tokio::fs::File::from_std(handle);
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_error(url, format!("failed to read body: {}", e)))?
        {
            written += chunk.len() as u64;
            if written > self.config.max_bytes {
                return Err(download_error(
                    url,
                    format!("body exceeds limit of {} bytes", self.config.max_bytes),
                ));
            }
            hasher.update(&chunk);
            out.write_all(&chunk)
                .await
                .map_err(|e| download_error(url, format!("failed to save file: {}", e)))?;
        }

        out.flush()
            .await
            .map_err(|e| download_error(url, format!("failed to save file: {}", e)))?;
        out.sync_all()
            .await
            .map_err(|e| download_error(url, format!("failed to save file: {}", e)))?;
        drop(out);

        if let Some(len) = expected_len {
            if written != len {
                return Err(download_error(
                    url,
                    format!("truncated body: received {} of {} bytes", written, len),
                ));
            }
        }

        let sha256 = hex::encode(hasher.finalize());
        let path = temp.into_temp_path();
        info!(
            url = %parsed,
            path = %path.display(),
            bytes = written,
            sha256 = %sha256,
            "file downloaded"
        );

        Ok(DownloadedFile {
            path,
            len: written,
            sha256,
        })
    }
}

fn parse_download_url(url: &str) -> VouchResult<Url> {
    let parsed = Url::parse(url).map_err(|e| VouchError::Config {
        message: format!("invalid URL {:?}: {}", url, e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(VouchError::Config {
            message: format!("unsupported URL scheme {:?} (expected http or https)", other),
        }),
    }
}

/// Extension of the URL's last path segment, with its dot.
///
/// The inspector picks a signature format by extension, so `.msi` and
/// `.exe` must survive into the temp file name.
fn file_suffix(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 16
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext)
        }
        _ => String::new(),
    }
}

fn download_error(url: &str, message: String) -> VouchError {
    VouchError::Download {
        url: url.to_string(),
        message,
    }
}
