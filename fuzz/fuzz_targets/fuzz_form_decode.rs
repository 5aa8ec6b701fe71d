//! Fuzz target: form and percent decoding
//!
//! Arbitrary request bodies must decode without panicking, and decoding
//! never yields more than three bytes per input byte.
//!
//! cargo fuzz run fuzz_form_decode

#![no_main]

use cardinal_grip::app::http::{Form, url_decode};
use cardinal_grip::app::multipart::boundary_from_content_type;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    let decoded = url_decode(&text);
    assert!(decoded.len() <= text.len() * 3);

    let form = Form::parse(&text, &text);
    let _ = form.get("ssid");
    let _ = form.get("password");

    if let Some(boundary) = boundary_from_content_type(&text) {
        assert!(!boundary.is_empty() && boundary.len() <= 70);
    }
});
