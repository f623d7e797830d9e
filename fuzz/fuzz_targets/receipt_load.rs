#![no_main]

use std::fs;

use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;
use versioner_receipt::{BUILD_RECEIPT_NAME, read_timestamp};

fuzz_target!(|data: &[u8]| {
    let td = match tempdir() {
        Ok(v) => v,
        Err(_) => return,
    };

    let path = td.path().join(BUILD_RECEIPT_NAME);
    if fs::write(&path, data).is_ok() {
        let _ = read_timestamp(&path);
    }
});
