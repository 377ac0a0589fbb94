//! Decoded signature records.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Serialize, Serializer};

use crate::certificate::SubjectInfo;
use crate::date::EpochDate;

/// Result of inspecting one file's Authenticode signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureRecord {
    /// Signer certificate; `None` when the file is unsigned.
    pub signer_certificate: Option<SignerCertificate>,

    /// Inspector status code (0 = valid).
    pub status: i64,

    /// Human-readable explanation of `status`.
    pub status_message: String,

    /// The inspected file.
    pub path: String,
}

impl SignatureRecord {
    /// Subject derived from the certificate bytes, or all-empty if none.
    pub fn subject(&self) -> SubjectInfo {
        self.signer_certificate
            .as_ref()
            .and_then(|cert| cert.subject.clone())
            .unwrap_or_default()
    }

    /// Known name for `status`, if any.
    pub fn status_name(&self) -> Option<SignatureStatus> {
        SignatureStatus::from_code(self.status)
    }
}

/// Signer certificate metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignerCertificate {
    pub not_after: EpochDate,
    pub not_before: EpochDate,

    /// DER certificate bytes (base64 when serialized).
    #[serde(serialize_with = "serialize_base64")]
    pub raw_data: Vec<u8>,

    /// Parsed from `raw_data`; `Some` iff `raw_data` is non-empty.
    pub subject: Option<SubjectInfo>,

    /// Inspector's flattened subject string. Display only.
    pub subject_text: Option<String>,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

/// `System.Management.Automation.SignatureStatus` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureStatus {
    Valid,
    UnknownError,
    NotSigned,
    HashMismatch,
    NotTrusted,
    NotSupportedFileFormat,
    Incompatible,
}

impl SignatureStatus {
    const ALL: [SignatureStatus; 7] = [
        Self::Valid,
        Self::UnknownError,
        Self::NotSigned,
        Self::HashMismatch,
        Self::NotTrusted,
        Self::NotSupportedFileFormat,
        Self::Incompatible,
    ];

    pub fn code(self) -> i64 {
        match self {
            Self::Valid => 0,
            Self::UnknownError => 1,
            Self::NotSigned => 2,
            Self::HashMismatch => 3,
            Self::NotTrusted => 4,
            Self::NotSupportedFileFormat => 5,
            Self::Incompatible => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::UnknownError => "UnknownError",
            Self::NotSigned => "NotSigned",
            Self::HashMismatch => "HashMismatch",
            Self::NotTrusted => "NotTrusted",
            Self::NotSupportedFileFormat => "NotSupportedFileFormat",
            Self::Incompatible => "Incompatible",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Parse the name emitted by `ConvertTo-Json -EnumsAsStrings`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
