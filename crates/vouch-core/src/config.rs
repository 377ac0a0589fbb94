//! Configuration: defaults, YAML file, then environment.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `VOUCH_URL` | Installer URL to download and verify |
//! | `VOUCH_EXPECTED_COMMON_NAME` | Expected signer common name |
//! | `VOUCH_EXPECTED_ORGANIZATION` | Expected signer organization |
//! | `VOUCH_EXPECTED_STATE` | Expected signer state/province |
//! | `VOUCH_EXPECTED_COUNTRY` | Expected signer country |
//! | `VOUCH_INSPECTOR` | Inspector program (default: `pwsh`) |
//! | `VOUCH_INSPECTOR_TIMEOUT` | Inspector deadline in seconds, `0` = none (default: 120) |
//! | `VOUCH_DOWNLOAD_TIMEOUT` | Download timeout in seconds (default: 300) |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{VouchError, VouchResult};
use crate::policy::PublisherPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VouchConfig {
    /// Installer URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Expected publisher identity.
    #[serde(default)]
    pub publisher: PublisherPolicy,

    #[serde(default)]
    pub inspector: InspectorConfig,

    #[serde(default)]
    pub download: DownloadConfig,
}

/// How the external signature inspector is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InspectorConfig {
    /// PowerShell executable.
    #[serde(default = "default_inspector_program")]
    pub program: String,

    /// Arguments placed before `-NoProfile -NonInteractive -Command <script>`.
    #[serde(default)]
    pub leading_args: Vec<String>,

    /// Deadline in seconds; `0` waits indefinitely.
    #[serde(default = "default_inspector_timeout")]
    pub timeout_secs: u64,
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Largest accepted body in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_inspector_program() -> String {
    "pwsh".to_string()
}

fn default_inspector_timeout() -> u64 {
    120
}

fn default_download_timeout() -> u64 {
    300
}

fn default_max_bytes() -> u64 {
    1024 * 1024 * 1024
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            program: default_inspector_program(),
            leading_args: Vec::new(),
            timeout_secs: default_inspector_timeout(),
        }
    }
}

impl InspectorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl VouchConfig {
    /// Defaults, overlaid by `path` (if given), overlaid by environment.
    pub fn load(path: Option<&Path>) -> VouchResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Parse a YAML config file.
    pub fn from_file(path: &Path) -> VouchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| VouchError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&text).map_err(|e| VouchError::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Overlay `VOUCH_*` environment variables.
    pub fn apply_env(mut self) -> VouchResult<Self> {
        if let Some(url) = env_string("VOUCH_URL") {
            self.url = Some(url);
        }
        if let Some(value) = env_string("VOUCH_EXPECTED_COMMON_NAME") {
            self.publisher.common_name = value;
        }
        if let Some(value) = env_string("VOUCH_EXPECTED_ORGANIZATION") {
            self.publisher.organization = value;
        }
        if let Some(value) = env_string("VOUCH_EXPECTED_STATE") {
            self.publisher.state = value;
        }
        if let Some(value) = env_string("VOUCH_EXPECTED_COUNTRY") {
            self.publisher.country = value;
        }
        if let Some(program) = env_string("VOUCH_INSPECTOR") {
            self.inspector.program = program;
        }
        if let Some(secs) = env_secs("VOUCH_INSPECTOR_TIMEOUT")? {
            self.inspector.timeout_secs = secs;
        }
        if let Some(secs) = env_secs("VOUCH_DOWNLOAD_TIMEOUT")? {
            self.download.timeout_secs = secs;
        }
        Ok(self)
    }

    /// Set the installer URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replace the expected publisher.
    pub fn with_publisher(mut self, publisher: PublisherPolicy) -> Self {
        self.publisher = publisher;
        self
    }

    /// Set the inspector program.
    pub fn with_inspector_program(mut self, program: impl Into<String>) -> Self {
        self.inspector.program = program.into();
        self
    }

    /// Set the inspector deadline (`0` = none).
    pub fn with_inspector_timeout(mut self, secs: u64) -> Self {
        self.inspector.timeout_secs = secs;
        self
    }
}

// Expected-subject values are compared verbatim, so an empty variable is
// treated as unset rather than as "expect empty".
fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_secs(name: &str) -> VouchResult<Option<u64>> {
    match env_string(name) {
        Some(v) => v.trim().parse().map(Some).map_err(|_| VouchError::Config {
            message: format!("{} must be a whole number of seconds, got {:?}", name, v),
        }),
        None => Ok(None),
    }
}
