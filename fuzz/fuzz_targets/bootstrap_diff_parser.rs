#![no_main]

use libfuzzer_sys::fuzz_target;
use phoenix::ground_truth::parse_bootstrap_diff;

fuzz_target!(|data: &[u8]| {
    // Any payload the service could send must parse or fail, never panic
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        for column in ["iteration_time_ns", "duration_ns", "ops.per.sec"] {
            let _ = parse_bootstrap_diff(&value, column);
        }
    }
});
