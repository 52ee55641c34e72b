//! Fuzz target for the chart DSL parser.
//!
//! Parsing never fails outright: errors are collected next to a best-effort
//! config, and every error carries a usable position.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use chartwell_dsl::{build_config, parse, to_dsl, tokenize, Parser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let result = parse(input);
        for err in &result.errors {
            assert!(err.line >= 1, "Error line should be >= 1");
            assert!(err.column >= 1, "Error column should be >= 1");
            assert!(!err.message.is_empty(), "Error message should not be empty");
        }

        // The printer must cope with anything the parser produces.
        let _ = to_dsl(&result.config);

        let (document, _) = Parser::new(tokenize(input)).parse();
        assert_eq!(build_config(&document), result.config);
    }
});
