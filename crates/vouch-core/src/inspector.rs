//! Authenticode inspection through PowerShell's `Get-AuthenticodeSignature`.
//!
//! The inspector's JSON is an untyped data source. Decoding is strict: a
//! record is only returned when every field the policy depends on decoded
//! cleanly, and every deviation is an [`VouchError::InspectionDecode`].
//! Malformed output is never read as "unsigned" or "valid".

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::certificate::extract_subject_info;
use crate::config::InspectorConfig;
use crate::date::EpochDate;
use crate::error::{truncate_output, VouchError, VouchResult};
use crate::record::{SignatureRecord, SignatureStatus, SignerCertificate};

// How long to keep reading the child's pipes once it has exited or been killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Produces a decoded signature record for a local file.
#[async_trait]
pub trait SignatureInspector: Send + Sync {
    async fn inspect(&self, path: &Path) -> VouchResult<SignatureRecord>;
}

/// Runs `Get-AuthenticodeSignature` in a PowerShell child process.
#[derive(Debug, Clone, Default)]
pub struct PowerShellInspector {
    config: InspectorConfig,
}

impl PowerShellInspector {
    pub fn new(config: InspectorConfig) -> Self {
        Self { config }
    }

    /// Run the inspector once and return its stdout.
    pub async fn run(&self, path: &Path) -> VouchResult<String> {
        let program = &self.config.program;
        let script = inspection_script(path)?;

        let mut command = Command::new(program);
        command
            .args(&self.config.leading_args)
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %program,
            path = %path.display(),
            timeout_secs = self.config.timeout_secs,
            "invoking signature inspector"
        );

        let mut child = command
            .spawn()
            .map_err(|e| execution_error(program, format!("failed to start: {}", e), b"", b""))?;

        // Streams are drained alongside the wait so a timeout still has
        // whatever the child wrote before it hung.
        let stdout = CapturedStream::spawn(child.stdout.take());
        let stderr = CapturedStream::spawn(child.stderr.take());

        let waited = match self.config.timeout() {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!(program = %program, error = %e, "failed to kill timed out inspector");
                    }
                    let stdout = stdout.finish_within(DRAIN_GRACE).await;
                    let stderr = stderr.finish_within(DRAIN_GRACE).await;
                    return Err(execution_error(
                        program,
                        format!("timed out after {:?}", limit),
                        &stdout,
                        &stderr,
                    ));
                }
            },
            None => child.wait().await,
        };
        let status = waited.map_err(|e| {
            execution_error(
                program,
                format!("failed to wait for inspector: {}", e),
                &stdout.snapshot(),
                &stderr.snapshot(),
            )
        })?;

        let stdout = stdout.finish_within(DRAIN_GRACE).await;
        let stderr = stderr.finish_within(DRAIN_GRACE).await;

        if !status.success() {
            return Err(execution_error(
                program,
                format!("exited with {}", status),
                &stdout,
                &stderr,
            ));
        }

        if !stderr.is_empty() {
            warn!(
                program = %program,
                stderr = %truncate_output(&String::from_utf8_lossy(&stderr)),
                "signature inspector wrote to stderr"
            );
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// A child stream read to EOF in a background task.
struct CapturedStream {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl CapturedStream {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = reader.map(|mut reader| {
            let sink = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            lock(&sink).extend_from_slice(&chunk[..n]);
                        }
                        Err(e) => {
                            debug!(error = %e, "inspector stream closed with error");
                            break;
                        }
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Bytes read so far.
    fn snapshot(&self) -> Vec<u8> {
        lock(&self.buf).clone()
    }

    /// Wait up to `grace` for EOF and return everything read.
    ///
    /// A grandchild can hold the pipe open after the inspector exits, so the
    /// wait is bounded.
    async fn finish_within(mut self, grace: Duration) -> Vec<u8> {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                task.abort();
            }
        }
        std::mem::take(&mut *lock(&self.buf))
    }
}

impl Drop for CapturedStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SignatureInspector for PowerShellInspector {
    async fn inspect(&self, path: &Path) -> VouchResult<SignatureRecord> {
        let stdout = self.run(path).await?;
        let record = decode_inspection_output(&stdout, path)?;
        debug!(
            status = record.status,
            status_name = ?record.status_name(),
            signed = record.signer_certificate.is_some(),
            "decoded signature record"
        );
        Ok(record)
    }
}

/// Build the PowerShell command text for `path`.
///
/// The projection keeps only the fields the record needs; `RawData` is the
/// source of truth for the subject, `Subject` is informational. Paths that
/// are not valid UTF-8 cannot be expressed in the script and are rejected.
pub fn inspection_script(path: &Path) -> VouchResult<String> {
    let literal = path.to_str().ok_or_else(|| VouchError::Config {
        message: format!("path is not valid UTF-8: {}", path.display()),
    })?;
    Ok(format!(
        "$ErrorActionPreference = 'Stop'; \
         Get-AuthenticodeSignature -LiteralPath '{}' | \
         Select-Object @{{Name='SignerCertificate'; Expression={{$_.SignerCertificate | Select-Object NotAfter, NotBefore, Subject, RawData}}}}, Status, StatusMessage, Path | \
         ConvertTo-Json -Depth 4 -Compress",
        quote_literal(literal)
    ))
}

/// Escape text for a single-quoted PowerShell string.
///
/// PowerShell also treats the typographic single quotes as delimiters.
fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(c);
        }
        out.push(c);
    }
    out
}

fn execution_error(program: &str, message: String, stdout: &[u8], stderr: &[u8]) -> VouchError {
    VouchError::InspectionExecution {
        program: program.to_string(),
        message,
        stdout: truncate_output(&String::from_utf8_lossy(stdout)),
        stderr: truncate_output(&String::from_utf8_lossy(stderr)),
    }
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "SignerCertificate", deserialize_with = "nullable")]
    signer_certificate: Option<WireCertificate>,

    #[serde(rename = "Status")]
    status: Value,

    #[serde(rename = "StatusMessage", deserialize_with = "nullable")]
    status_message: Option<String>,

    #[serde(rename = "Path", default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCertificate {
    #[serde(rename = "NotAfter")]
    not_after: Value,

    #[serde(rename = "NotBefore")]
    not_before: Value,

    #[serde(rename = "Subject", default)]
    subject: Option<String>,

    #[serde(rename = "RawData")]
    raw_data: Value,
}

// The key must be present; its value may be null.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Decode the inspector's JSON into a [`SignatureRecord`].
///
/// `path` is used when the output omits `Path`.
pub fn decode_inspection_output(output: &str, path: &Path) -> VouchResult<SignatureRecord> {
    let text = output.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(VouchError::decode("inspector produced no output", output));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| VouchError::decode(format!("invalid JSON: {}", e), output))?;
    if !value.is_object() {
        return Err(VouchError::decode(
            format!("expected a JSON object, found {}", json_kind(&value)),
            output,
        ));
    }

    let wire: WireRecord = serde_json::from_value(value)
        .map_err(|e| VouchError::decode(format!("unexpected schema: {}", e), output))?;

    let status = decode_status(&wire.status).map_err(|m| VouchError::decode(m, output))?;

    let signer_certificate = match wire.signer_certificate {
        Some(cert) => Some(
            decode_certificate(cert, output)
                .map_err(|e| match e {
                    err @ VouchError::InspectionDecode { .. } => err,
                    leaf => VouchError::decode_with_source(leaf, output),
                })?,
        ),
        None => None,
    };

    Ok(SignatureRecord {
        signer_certificate,
        status,
        status_message: wire.status_message.unwrap_or_default(),
        path: wire
            .path
            .unwrap_or_else(|| path.to_string_lossy().into_owned()),
    })
}

fn decode_certificate(wire: WireCertificate, output: &str) -> VouchResult<SignerCertificate> {
    let not_after = EpochDate::from_json(&wire.not_after)?;
    let not_before = EpochDate::from_json(&wire.not_before)?;

    // Raw bytes first; the subject is derived from them, never from `Subject`.
    let raw_data = decode_raw_data(&wire.raw_data)
        .map_err(|m| VouchError::decode(format!("invalid RawData: {}", m), output))?;
    let subject = if raw_data.is_empty() {
        None
    } else {
        Some(extract_subject_info(&raw_data)?)
    };

    Ok(SignerCertificate {
        not_after,
        not_before,
        raw_data,
        subject,
        subject_text: wire.subject,
    })
}

fn decode_status(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("Status must be an integer, got {}", n)),
        Value::String(name) => SignatureStatus::from_name(name)
            .map(SignatureStatus::code)
            .ok_or_else(|| format!("unknown Status name {:?}", name)),
        other => Err(format!("Status must be an integer, got {}", json_kind(other))),
    }
}

/// Normalize `RawData` to bytes.
///
/// PowerShell 7 emits base64 text; Windows PowerShell 5.1 emits an array of
/// integers, sometimes wrapped as `{"value": [...], "Count": n}`.
fn decode_raw_data(value: &Value) -> Result<Vec<u8>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => BASE64
            .decode(text.trim())
            .map_err(|e| format!("invalid base64: {}", e)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| format!("element {} is not a byte: {}", i, item))
            })
            .collect(),
        Value::Object(map) => match map.get("value") {
            Some(inner @ (Value::Array(_) | Value::String(_) | Value::Null)) => {
                decode_raw_data(inner)
            }
            _ => Err("object has no `value` array".to_string()),
        },
        other => Err(format!("expected base64 text or a byte array, got {}", json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
