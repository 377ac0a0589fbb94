//! Process exit codes for `vouch`.
//! Part of the public contract: scripts branch on these.

pub const SUCCESS: i32 = 0; // Signature valid and publisher matches
pub const INVALID_SIGNATURE: i32 = 1; // Verdict produced, and it is negative
pub const CONFIG_ERROR: i32 = 2; // Bad flags, config file, or URL
pub const DOWNLOAD_ERROR: i32 = 3;
pub const INSPECTION_FAILED: i32 = 4; // Inspector could not be run or failed
pub const DECODE_ERROR: i32 = 5; // Inspector output or certificate unreadable
pub const CLEANUP_FAILED: i32 = 6; // Verdict produced but temp file survived

/// Short label for logs.
pub fn reason(code: i32) -> &'static str {
    match code {
        SUCCESS => "valid",
        INVALID_SIGNATURE => "invalid_signature",
        CONFIG_ERROR => "config_error",
        DOWNLOAD_ERROR => "download_error",
        INSPECTION_FAILED => "inspection_failed",
        DECODE_ERROR => "decode_error",
        CLEANUP_FAILED => "cleanup_failed",
        _ => "unknown",
    }
}
