#![no_main]

use fdstream_core::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = Config::from_toml_str(text) {
        // Anything that parsed and validated must survive a round trip.
        let rendered = config.to_toml_string().expect("render parsed config");
        let reparsed = Config::from_toml_str(&rendered).expect("reparse rendered config");
        assert_eq!(reparsed.engine, config.engine);
    }
});
