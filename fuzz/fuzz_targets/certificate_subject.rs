#![no_main]

use libfuzzer_sys::fuzz_target;
use vouch_core::{extract_subject_info, VouchError};

fuzz_target!(|data: &[u8]| {
    if let Err(e) = extract_subject_info(data) {
        assert!(matches!(e, VouchError::CertificateParse { .. }));
    }
});
