//! Fuzz target: `MultipartParser::feed`
//!
//! Splits arbitrary bytes at a data-chosen point and drives both halves
//! through the streaming parser.  It must never panic, must never emit
//! more payload than it was fed, and must report `end` or `abort` at most
//! once per `begin`.
//!
//! cargo fuzz run fuzz_multipart

#![no_main]

use cardinal_grip::app::multipart::{MultipartParser, PartSink};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Counter {
    begins: usize,
    closes: usize,
    bytes: usize,
}

impl PartSink for Counter {
    fn begin(&mut self, _filename: &str) {
        self.begins += 1;
    }
    fn data(&mut self, bytes: &[u8]) {
        self.bytes += bytes.len();
    }
    fn end(&mut self) {
        self.closes += 1;
    }
    fn abort(&mut self) {
        self.closes += 1;
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let cut = usize::from(split) % (body.len() + 1);

    let mut parser = MultipartParser::new("fuzzB", "firmware");
    let mut sink = Counter::default();
    let _ = parser
        .feed(&body[..cut], &mut sink)
        .and_then(|()| parser.feed(&body[cut..], &mut sink));
    let _ = parser.finish(&mut sink);

    assert!(sink.bytes <= body.len());
    assert!(sink.closes <= sink.begins);
});
