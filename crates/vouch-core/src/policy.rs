//! Expected-publisher policy.
//!
//! Checks run in a fixed order and the first failure wins:
//! status, common name, organization, state, country. Comparisons are exact
//! and case-sensitive; a certificate that differs only by whitespace or case
//! is a different publisher.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::SignatureRecord;

/// Identity a signer certificate must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherPolicy {
    pub common_name: String,
    pub organization: String,
    pub state: String,
    pub country: String,
}

impl Default for PublisherPolicy {
    fn default() -> Self {
        Self {
            common_name: "Emurasoft, Inc.".to_string(),
            organization: "Emurasoft, Inc.".to_string(),
            state: "Washington".to_string(),
            country: "US".to_string(),
        }
    }
}

/// Which check produced a failing verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyCheck {
    Status,
    CommonName,
    Organization,
    State,
    Country,
}

impl fmt::Display for PolicyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Status => "status",
            Self::CommonName => "common name",
            Self::Organization => "organization",
            Self::State => "state",
            Self::Country => "country",
        })
    }
}

/// Final verdict. `reason` is present iff `valid` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip)]
    pub check: Option<PolicyCheck>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            valid: true,
            reason: None,
            check: None,
        }
    }

    pub fn fail(check: PolicyCheck, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            check: Some(check),
        }
    }
}

impl PublisherPolicy {
    pub fn new(
        common_name: impl Into<String>,
        organization: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            common_name: common_name.into(),
            organization: organization.into(),
            state: state.into(),
            country: country.into(),
        }
    }

    /// Evaluate a decoded record against this publisher.
    pub fn evaluate(&self, record: &SignatureRecord) -> ValidationResult {
        if record.status != 0 {
            return ValidationResult::fail(
                PolicyCheck::Status,
                format!(
                    "invalid signature status: {} (status code: {})",
                    record.status_message, record.status
                ),
            );
        }

        let subject = record.subject();
        let checks = [
            (PolicyCheck::CommonName, &subject.common_name, &self.common_name),
            (PolicyCheck::Organization, &subject.organization, &self.organization),
            (PolicyCheck::State, &subject.state, &self.state),
            (PolicyCheck::Country, &subject.country, &self.country),
        ];

        for (check, actual, expected) in checks {
            if actual != expected {
                return ValidationResult::fail(
                    check,
                    format!("unexpected {}: {:?} (expected {:?})", check, actual, expected),
                );
            }
        }

        ValidationResult::pass()
    }
}
