//! Fuzz target for delimited text ingestion, including encoding recovery.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mplusprep::{AutoConfirm, Parser};
use std::io::Write;

fuzz_target!(|data: &[u8]| {
    // Only process reasonable-sized inputs to avoid OOM
    if data.len() > 100_000 {
        return;
    }

    if let Ok(mut temp_file) = tempfile::NamedTempFile::with_suffix(".csv") {
        if temp_file.write_all(data).is_ok() {
            let _ = Parser::new().parse_file(temp_file.path(), &AutoConfirm::yes());
        }
    }
});
