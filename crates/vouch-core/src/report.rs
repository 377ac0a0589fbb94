//! Machine-readable result document.

use serde::Serialize;

use crate::error::{error_chain, VouchError, VouchResult};
use crate::pipeline::VerificationReport;
use crate::policy::ValidationResult;

pub const EXIT_VALID: i32 = 0;
pub const EXIT_INVALID: i32 = 1;

/// The single document printed per run.
///
/// `error` means the signature status could not be determined. An invalid
/// signature is a `result` with `valid: false`, never an `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,

    #[serde(skip)]
    exit_code: i32,
}

impl ProgramOutput {
    /// Envelope for a run with no download step.
    pub fn from_outcome(outcome: &VouchResult<ValidationResult>) -> Self {
        match outcome {
            Ok(result) => Self {
                exit_code: verdict_exit_code(result),
                result: Some(result.clone()),
                ..Self::default()
            },
            Err(e) => Self::from_error(e),
        }
    }

    pub fn from_error(err: &VouchError) -> Self {
        Self {
            error: Some(error_chain(err)),
            exit_code: err.exit_code(),
            ..Self::default()
        }
    }

    /// Envelope for a full pipeline run.
    ///
    /// Exit code priority: execution error, then invalid verdict, then
    /// cleanup failure.
    pub fn from_report(report: &VerificationReport) -> Self {
        let mut output = Self::from_outcome(&report.outcome);
        if let Some(cleanup) = report.cleanup_error() {
            output.cleanup_error = Some(error_chain(cleanup));
            if output.exit_code == EXIT_VALID {
                output.exit_code = cleanup.exit_code();
            }
        }
        output
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

fn verdict_exit_code(result: &ValidationResult) -> i32 {
    if result.valid {
        EXIT_VALID
    } else {
        EXIT_INVALID
    }
}
