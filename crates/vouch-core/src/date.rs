//! `/Date(<ms>)/` timestamps as emitted by PowerShell's `ConvertTo-Json`.
//!
//! The integer is signed milliseconds since the Unix epoch (UTC). JSON
//! `null` is a valid, unset date.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{VouchError, VouchResult};

const DATE_PREFIX: &str = "/Date(";
const DATE_SUFFIX: &str = ")/";

/// A decoded inspector timestamp; `None` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochDate(Option<DateTime<Utc>>);

impl EpochDate {
    /// The zero/unset timestamp.
    pub const UNSET: EpochDate = EpochDate(None);

    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Some(at))
    }

    /// Parse `null`, `"\/Date(<ms>)\/"` (JSON literal), or `/Date(<ms>)/`.
    pub fn parse(text: &str) -> VouchResult<Self> {
        if text == "null" {
            return Ok(Self::UNSET);
        }

        let unquoted = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text);
        let unescaped = unquoted.replace("\\/", "/");

        let digits = unescaped
            .strip_prefix(DATE_PREFIX)
            .and_then(|t| t.strip_suffix(DATE_SUFFIX))
            .ok_or_else(|| date_error(text, "expected /Date(<milliseconds>)/"))?;

        if !is_signed_integer(digits) {
            return Err(date_error(text, "milliseconds must be an integer"));
        }
        let ms: i64 = digits
            .parse()
            .map_err(|e| date_error(text, format!("milliseconds out of range: {}", e)))?;

        DateTime::from_timestamp_millis(ms)
            .map(Self::new)
            .ok_or_else(|| date_error(text, "timestamp outside the supported range"))
    }

    /// Decode a date field straight from inspector JSON.
    ///
    /// Windows PowerShell 5.1 sometimes wraps `DateTime` values in an object
    /// carrying extended properties; the encoded date is its `value` member.
    pub fn from_json(value: &Value) -> VouchResult<Self> {
        match value {
            Value::Null => Ok(Self::UNSET),
            Value::String(text) => Self::parse(text),
            Value::Object(map) => match map.get("value") {
                Some(Value::String(text)) => Self::parse(text),
                Some(Value::Null) => Ok(Self::UNSET),
                _ => Err(date_error(
                    &value.to_string(),
                    "date object has no string `value` member",
                )),
            },
            other => Err(date_error(
                &other.to_string(),
                "expected a string or null date",
            )),
        }
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.0
    }
}

impl Serialize for EpochDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(at) => serializer.serialize_str(&at.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }
}

fn is_signed_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn date_error(raw: &str, message: impl Into<String>) -> VouchError {
    VouchError::DateFormat {
        raw: raw.to_string(),
        message: message.into(),
    }
}
