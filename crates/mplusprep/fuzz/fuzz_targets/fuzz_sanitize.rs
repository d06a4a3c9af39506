//! Fuzz target for name sanitizing.
//!
//! Whatever the input, every generated name is legal and no two collide,
//! even ignoring case.

#![no_main]

use std::collections::HashSet;

use libfuzzer_sys::fuzz_target;
use mplusprep::input::unique_headers;
use mplusprep::{is_legal, sanitize};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let names = unique_headers(text.split(',').map(str::to_string).collect());
    let map = sanitize(&names);

    let generated: HashSet<String> = map.generated().map(str::to_ascii_lowercase).collect();
    assert_eq!(generated.len(), names.len());
    assert!(map.generated().all(is_legal));
});
