//! Signer identity extraction from raw X.509 certificate bytes.

use serde::Serialize;
use x509_parser::x509::AttributeTypeAndValue;

use crate::error::{VouchError, VouchResult};

/// ASN.1 universal tag for BMPString (UCS-2, big endian).
const TAG_BMP_STRING: u32 = 30;

/// Identity fields from a certificate's subject distinguished name.
///
/// Each field holds the first value of its attribute type, or is empty when
/// the certificate carries none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectInfo {
    pub common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub state: String,
    pub country: String,
}

/// Parse a DER certificate and extract its subject identity.
pub fn extract_subject_info(raw: &[u8]) -> VouchResult<SubjectInfo> {
    let (rest, cert) = x509_parser::parse_x509_certificate(raw).map_err(|e| parse_error(raw, e))?;
    if !rest.is_empty() {
        return Err(parse_error(
            raw,
            format!("{} trailing bytes after certificate", rest.len()),
        ));
    }

    let subject = cert.subject();
    Ok(SubjectInfo {
        common_name: first_value(raw, subject.iter_common_name())?,
        organization: first_value(raw, subject.iter_organization())?,
        organizational_unit: first_value(raw, subject.iter_organizational_unit())?,
        locality: first_value(raw, subject.iter_locality())?,
        state: first_value(raw, subject.iter_state_or_province())?,
        country: first_value(raw, subject.iter_country())?,
    })
}

fn first_value<'a, 'b: 'a>(
    raw: &[u8],
    mut values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> VouchResult<String> {
    match values.next() {
        Some(attr) => attribute_text(attr).map_err(|message| parse_error(raw, message)),
        None => Ok(String::new()),
    }
}

fn attribute_text(attr: &AttributeTypeAndValue<'_>) -> Result<String, String> {
    if let Ok(text) = attr.as_str() {
        return Ok(text.to_string());
    }

    let value = attr.attr_value();
    if value.header.tag().0 == TAG_BMP_STRING {
        return decode_bmp_string(value.data);
    }
    Err(format!(
        "unsupported string type (tag {}) for attribute {}",
        value.header.tag().0,
        attr.attr_type()
    ))
}

fn decode_bmp_string(data: &[u8]) -> Result<String, String> {
    if data.len() % 2 != 0 {
        return Err("BMPString has odd length".to_string());
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| format!("invalid BMPString: {}", e))
}

fn parse_error(raw: &[u8], message: impl ToString) -> VouchError {
    VouchError::CertificateParse {
        len: raw.len(),
        message: message.to_string(),
    }
}
