//! Fuzz target for the SPSS system file reader.
//!
//! The reader must reject malformed files with an error, never a panic
//! or an unbounded allocation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mplusprep::input::sav::parse_sav;

fuzz_target!(|data: &[u8]| {
    if let Ok(dataset) = parse_sav(data) {
        // Every row must match the header width
        let width = dataset.table.column_count();
        assert!(dataset.table.rows.iter().all(|r| r.len() == width));
    }
});
