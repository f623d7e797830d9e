#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use versioner_receipt::{parse_properties, write_properties};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // Whatever was parsed must survive a write/parse cycle unchanged.
    let parsed = parse_properties(input);
    let written = write_properties(&parsed, Some("fuzz"));
    assert_eq!(parse_properties(&written), parsed);

    // Arbitrary text as a single value.
    let mut single = BTreeMap::new();
    single.insert("buildTimestamp".to_string(), input.to_string());
    let written = write_properties(&single, None);
    assert_eq!(parse_properties(&written), single);
});
