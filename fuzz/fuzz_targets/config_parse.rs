#![no_main]

use libfuzzer_sys::fuzz_target;
use versioner_config::Config;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = toml::from_str::<Config>(input) {
        let merged = config.merge(&Config::default());
        assert_eq!(merged, config);
    }
});
