//! Verify that a downloaded installer is Authenticode-signed by an expected publisher.
//!
//! The pipeline:
//!
//! - Download the installer to a temporary file
//! - Run `Get-AuthenticodeSignature` through PowerShell and decode its JSON
//! - Derive the signer's subject from the raw certificate bytes
//! - Compare status and subject against a [`PublisherPolicy`]
//!
//! Chain building, revocation, and the cryptographic check itself are left
//! to the inspector; its `Status` is taken as the validity verdict.
//!
//! # Quick Start
//!
//! ```no_run
//! use vouch_core::{InstallerVerifier, ProgramOutput, VouchConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = VouchConfig::load(None)?;
//! let verifier = InstallerVerifier::from_config(&config)?;
//!
//! let report = verifier
//!     .verify_url("https://download.emeditor.info/emed64_25.4.3.msi")
//!     .await;
//! let output = ProgramOutput::from_report(&report);
//! println!("{}", serde_json::to_string(&output)?);
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod config;
pub mod date;
pub mod download;
pub mod error;
pub mod inspector;
pub mod pipeline;
pub mod policy;
pub mod record;
pub mod report;

pub use certificate::{extract_subject_info, SubjectInfo};
pub use config::{DownloadConfig, InspectorConfig, VouchConfig};
pub use date::EpochDate;
pub use download::{DownloadedFile, Downloader, USER_AGENT_VALUE};
pub use error::{error_chain, VouchError, VouchResult};
pub use inspector::{
    decode_inspection_output, inspection_script, PowerShellInspector, SignatureInspector,
};
pub use pipeline::{InstallerVerifier, VerificationReport};
pub use policy::{PolicyCheck, PublisherPolicy, ValidationResult};
pub use record::{SignatureRecord, SignatureStatus, SignerCertificate};
pub use report::{ProgramOutput, EXIT_INVALID, EXIT_VALID};
