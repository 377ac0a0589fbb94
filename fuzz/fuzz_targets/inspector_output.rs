#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use vouch_core::{decode_inspection_output, PublisherPolicy, VouchError};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    match decode_inspection_output(text, Path::new("fuzz.msi")) {
        Ok(record) => {
            // Any decoded record must evaluate to a verdict with a reason iff invalid.
            let result = PublisherPolicy::default().evaluate(&record);
            assert_eq!(result.valid, result.reason.is_none());
        }
        Err(e) => {
            assert!(matches!(
                e,
                VouchError::InspectionDecode { .. }
                    | VouchError::CertificateParse { .. }
                    | VouchError::DateFormat { .. }
            ));
            assert_eq!(e.exit_code(), 5);
        }
    }
});
