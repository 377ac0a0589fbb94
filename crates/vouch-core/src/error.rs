//! Error types for the verification pipeline.

use std::path::PathBuf;

/// Maximum bytes of captured process output kept per stream.
pub const MAX_CAPTURED_OUTPUT: usize = 4096;

/// Verification errors.
///
/// A verdict is only produced from a fully decoded record, so every variant
/// here means "could not determine signature status". A signature that was
/// inspected and rejected is a [`ValidationResult`](crate::ValidationResult),
/// not an error.
#[derive(Debug, thiserror::Error)]
pub enum VouchError {
    /// Invalid configuration (bad URL, unreadable config file).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Network or storage failure while downloading.
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// The inspector could not be started, crashed, or timed out.
    #[error("signature inspector `{program}` failed: {message}{}", format_captured(.stdout, .stderr))]
    InspectionExecution {
        program: String,
        message: String,
        stdout: String,
        stderr: String,
    },

    /// The inspector ran but its output does not match the expected schema.
    #[error("failed to decode inspector output: {message}; raw:\n{raw_output}")]
    InspectionDecode {
        message: String,
        raw_output: String,
        #[source]
        source: Option<Box<VouchError>>,
    },

    /// Signer certificate bytes are not a well-formed X.509 certificate.
    #[error("failed to parse signer certificate ({len} bytes): {message}")]
    CertificateParse { len: usize, message: String },

    /// Date text does not follow the `/Date(<ms>)/` convention.
    #[error("invalid inspector date {raw:?}: {message}")]
    DateFormat { raw: String, message: String },

    /// The temporary download could not be removed.
    #[error("failed to remove temporary file {}: {message}", .path.display())]
    Cleanup { path: PathBuf, message: String },
}

impl VouchError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Download { .. } => 3,
            Self::InspectionExecution { .. } => 4,

            // Decode family: the inspector answered, we could not read it
            Self::InspectionDecode { .. } => 5,
            Self::CertificateParse { .. } => 5,
            Self::DateFormat { .. } => 5,

            Self::Cleanup { .. } => 6,
        }
    }

    pub(crate) fn decode(message: impl Into<String>, raw_output: &str) -> Self {
        Self::InspectionDecode {
            message: message.into(),
            raw_output: truncate_output(raw_output),
            source: None,
        }
    }

    pub(crate) fn decode_with_source(source: VouchError, raw_output: &str) -> Self {
        Self::InspectionDecode {
            message: source.to_string(),
            raw_output: truncate_output(raw_output),
            source: Some(Box::new(source)),
        }
    }
}

impl From<reqwest::Error> for VouchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Download {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: err.to_string(),
        }
    }
}

/// Result type for verification operations.
pub type VouchResult<T> = Result<T, VouchError>;

/// Cap captured output to avoid carrying arbitrarily large diagnostics.
pub(crate) fn truncate_output(text: &str) -> String {
    if text.len() <= MAX_CAPTURED_OUTPUT {
        return text.to_string();
    }
    let mut end = MAX_CAPTURED_OUTPUT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &text[..end])
}

fn format_captured(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stdout.trim().is_empty() {
        out.push_str("; stdout:\n");
        out.push_str(stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        out.push_str("; stderr:\n");
        out.push_str(stderr.trim_end());
    }
    out
}

/// Render an error with its full source chain, joined with `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        let next = source.to_string();
        // InspectionDecode repeats its source's message; skip exact echoes.
        if !text.contains(&next) {
            text.push_str(": ");
            text.push_str(&next);
        }
        current = source.source();
    }
    text
}
