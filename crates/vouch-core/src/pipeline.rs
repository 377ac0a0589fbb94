//! download → inspect → evaluate → clean up.

use std::path::Path;

use tracing::{info, warn};

use crate::config::VouchConfig;
use crate::download::Downloader;
use crate::error::{VouchError, VouchResult};
use crate::inspector::{PowerShellInspector, SignatureInspector};
use crate::policy::{PublisherPolicy, ValidationResult};

/// Verifies installers against an expected publisher.
#[derive(Debug)]
pub struct InstallerVerifier<I> {
    downloader: Downloader,
    inspector: I,
    policy: PublisherPolicy,
}

/// Outcome of [`InstallerVerifier::verify_url`].
///
/// Verification and cleanup are independent: neither masks the other.
#[derive(Debug)]
pub struct VerificationReport {
    pub outcome: VouchResult<ValidationResult>,
    pub cleanup: VouchResult<()>,
}

impl InstallerVerifier<PowerShellInspector> {
    /// Build a verifier that shells out to PowerShell.
    pub fn from_config(config: &VouchConfig) -> VouchResult<Self> {
        Ok(Self::new(
            Downloader::new(config.download.clone())?,
            PowerShellInspector::new(config.inspector.clone()),
            config.publisher.clone(),
        ))
    }
}

impl<I: SignatureInspector> InstallerVerifier<I> {
    pub fn new(downloader: Downloader, inspector: I, policy: PublisherPolicy) -> Self {
        Self {
            downloader,
            inspector,
            policy,
        }
    }

    pub fn policy(&self) -> &PublisherPolicy {
        &self.policy
    }

    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    pub fn into_inspector(self) -> I {
        self.inspector
    }

    /// Inspect and evaluate a local file.
    pub async fn verify_path(&self, path: &Path) -> VouchResult<ValidationResult> {
        let record = self.inspector.inspect(path).await?;
        let result = self.policy.evaluate(&record);
        match &result.reason {
            None => info!(path = %path.display(), "signature accepted"),
            Some(reason) => info!(path = %path.display(), reason = %reason, "signature rejected"),
        }
        Ok(result)
    }

    /// Download `url`, verify it, and remove the download.
    pub async fn verify_url(&self, url: &str) -> VerificationReport {
        let file = match self.downloader.download_to_temp(url).await {
            Ok(file) => file,
            Err(e) => {
                return VerificationReport {
                    outcome: Err(e),
                    cleanup: Ok(()),
                }
            }
        };

        let outcome = self.verify_path(file.path()).await;

        let cleanup = file.remove();
        if let Err(e) = &cleanup {
            warn!(error = %e, "failed to remove downloaded file");
        }

        VerificationReport { outcome, cleanup }
    }
}

impl VerificationReport {
    /// Verdict if one was produced.
    pub fn result(&self) -> Option<&ValidationResult> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&VouchError> {
        self.outcome.as_ref().err()
    }

    pub fn cleanup_error(&self) -> Option<&VouchError> {
        self.cleanup.as_ref().err()
    }
}
