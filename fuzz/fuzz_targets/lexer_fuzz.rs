//! Fuzz target for the chart DSL lexer.
//!
//! Arbitrary UTF-8 must tokenize without panicking, stay under the token
//! cap and always end in `Eof`.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use chartwell_dsl::{Lexer, TokenKind, DEFAULT_TOKEN_LIMIT};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();

        assert!(!tokens.is_empty(), "Tokenization should produce at least Eof");
        assert_eq!(
            tokens.last().map(|t| &t.kind),
            Some(&TokenKind::Eof),
            "Last token should always be Eof"
        );
        assert!(tokens.len() <= DEFAULT_TOKEN_LIMIT + 1, "Token cap exceeded");

        for token in &tokens {
            assert!(token.span.start <= token.span.end, "Span start should be <= end");
            assert!(token.span.end <= input.len(), "Span should stay inside the input");
            assert!(token.span.line >= 1, "Line numbers should be >= 1");
            assert!(token.span.column >= 1, "Column numbers should be >= 1");
        }
    }
});
