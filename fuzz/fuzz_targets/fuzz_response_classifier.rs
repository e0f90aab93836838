//! Fuzz target: bot API response classification
//!
//! Feeds arbitrary bytes (lossily decoded as UTF-8) to the failure
//! classifier and the success parser, verifying:
//! - No panics on malformed JSON, truncated bodies or odd digits
//! - Classification is deterministic
//! - `Other` always carries the raw input back unchanged
//!
//! cargo fuzz run fuzz_response_classifier

#![no_main]

use libfuzzer_sys::fuzz_target;
use meterguard::error::SendFailure;
use meterguard::notify::response;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    let failure = response::classify(&raw, 60);
    if let SendFailure::Other(echo) = &failure {
        assert_eq!(echo.as_str(), raw.as_ref());
    }

    assert_eq!(failure, response::classify(&raw, 60));
    let _ = response::message_id(&raw);
});
