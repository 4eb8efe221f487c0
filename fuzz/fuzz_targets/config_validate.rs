//! Building and validating a config from arbitrary input must never panic.

#![no_main]

use dbconn_client::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(config) = Config::from_connection_string(data) {
        let _ = config.validate();
        let _ = format!("{config:?}");
    }
});
