#![no_main]

use libfuzzer_sys::fuzz_target;
use notion2sql_core::query::{parse, Parser};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string (ignore invalid UTF-8)
    if let Ok(sql) = std::str::from_utf8(data) {
        // Limit query length to prevent timeout
        if sql.len() > 10_000 {
            return;
        }

        // Parsing must never panic
        let statement = match Parser::new(sql).and_then(|mut parser| parser.parse()) {
            Ok(statement) => statement,
            Err(_) => return,
        };

        // Displayed statements parse back to the same tree
        let printed = statement.to_string();
        let reparsed = parse(&printed).expect("displayed statement should parse");
        assert_eq!(statement, reparsed, "round trip changed {printed:?}");
    }
});
