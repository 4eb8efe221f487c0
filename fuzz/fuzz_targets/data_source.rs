//! Connection string parsing must never panic, and rendering a parsed
//! data source must produce a string that parses back to the same thing.

#![no_main]

use dbconn_client::DataSource;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(parsed) = data.parse::<DataSource>() else {
        return;
    };

    let rendered = parsed.connection_string();
    let reparsed: DataSource = rendered
        .parse()
        .unwrap_or_else(|e| panic!("rendered string failed to parse: {e}: {rendered:?}"));
    assert_eq!(reparsed.connection_string(), rendered);

    let _ = parsed.redacted();
});
