#![no_main]

use libfuzzer_sys::fuzz_target;
use notion2sql_core::property::{decode_properties, plain_text};
use notion2sql_core::DatabaseSchema;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    // Only well-formed JSON reaches the decoder in practice
    let Ok(json) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    // Decoding arbitrary page and database shapes must not panic
    let decoded = decode_properties(&json["properties"]);
    let _ = plain_text(&json["title"]);

    // Re-encoding decoded values against an arbitrary schema returns
    // errors for mismatches instead of panicking
    let schema = DatabaseSchema::from_json(&json);
    let _ = schema.encode_properties(&decoded);
});
