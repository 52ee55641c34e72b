//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

/// Default cap on emitted tokens per lex pass.
pub const DEFAULT_TOKEN_LIMIT: usize = 1000;

// ============================================================================
// LEXER IMPLEMENTATION
// ============================================================================

/// Lexer for the chart DSL.
///
/// Never fails: characters that cannot start a token are skipped.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
    token_limit: usize,
    truncated: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
            token_limit: DEFAULT_TOKEN_LIMIT,
            truncated: false,
        }
    }

    /// Override the cap on emitted tokens (excluding the final `Eof`).
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    /// True if the last [`Lexer::tokenize`] stopped at the token cap.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Tokenize the entire source into a vector of tokens ending in `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            if !is_eof && tokens.len() >= self.token_limit {
                self.truncated = true;
                tokens.push(self.eof_token());
                break;
            }
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    fn eof_token(&self) -> Token {
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            span: Span {
                start: self.pos,
                end: self.pos,
                line: self.line,
                column: self.column,
            },
        }
    }

    /// Get the next token from the source.
    fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();

            let start_pos = self.pos;
            let start_line = self.line;
            let start_col = self.column;

            let kind = match self.peek_char() {
                None => Some(TokenKind::Eof),
                Some(c) => match c {
                    '#' => {
                        self.advance();
                        Some(self.scan_comment())
                    }
                    '/' if self.peek_next_char() == Some('/') => {
                        self.advance();
                        self.advance();
                        Some(self.scan_comment())
                    }
                    '$' => self.scan_dollar(),
                    '"' | '\'' => Some(self.scan_string(c)),
                    ':' => {
                        self.advance();
                        Some(TokenKind::Colon)
                    }
                    ';' => {
                        self.advance();
                        Some(TokenKind::Semicolon)
                    }
                    '.' => {
                        self.advance();
                        Some(TokenKind::Dot)
                    }
                    '(' => {
                        self.advance();
                        Some(TokenKind::LParen)
                    }
                    ')' => {
                        self.advance();
                        Some(TokenKind::RParen)
                    }
                    '-' if self.peek_next_char().is_some_and(|c| c.is_ascii_digit()) => {
                        Some(self.scan_number())
                    }
                    c if c.is_ascii_digit() => Some(self.scan_number()),
                    c if is_ident_start(c) => Some(self.scan_identifier()),
                    _ => {
                        self.advance();
                        None
                    }
                },
            };

            if let Some(kind) = kind {
                return Token {
                    kind,
                    text: self.source[start_pos..self.pos].to_string(),
                    span: Span {
                        start: start_pos,
                        end: self.pos,
                        line: start_line,
                        column: start_col,
                    },
                };
            }
        }
    }

    /// Scan `${...}`, `$.` or `$name`. A lone `$` yields nothing.
    fn scan_dollar(&mut self) -> Option<TokenKind> {
        match self.peek_next_char() {
            Some('{') => {
                self.advance(); // $
                self.advance(); // {
                Some(self.scan_interpolation())
            }
            Some('.') => {
                self.advance();
                Some(TokenKind::Variable("$".to_string()))
            }
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                self.advance();
                while self.peek_char().is_some_and(is_ident_char) {
                    self.advance();
                }
                Some(TokenKind::Variable(self.source[start..self.pos].to_string()))
            }
            _ => {
                self.advance();
                None
            }
        }
    }

    /// Scan the body of an interpolation, counting nested braces.
    ///
    /// An unterminated interpolation runs to the end of input.
    fn scan_interpolation(&mut self) -> TokenKind {
        let start = self.pos;
        let mut depth = 1usize;

        while let Some(c) = self.peek_char() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let expr = self.source[start..self.pos].to_string();
                        self.advance();
                        return TokenKind::Interpolation(expr);
                    }
                }
                _ => {}
            }
            self.advance();
        }

        TokenKind::Interpolation(self.source[start..].to_string())
    }

    /// Scan an identifier, boolean keyword or indexed segment (`charts[0]`).
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while self.peek_char().is_some_and(is_ident_char) {
            self.advance();
        }

        if let Some(len) = index_suffix_len(&self.source[self.pos..]) {
            for _ in 0..len {
                self.advance();
            }
        }

        match &self.source[start..self.pos] {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            ident => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// Scan a string literal with escape sequences.
    ///
    /// An unterminated string runs to the end of input.
    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None => break,
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some(c @ ('\\' | '"' | '\'')) => {
                            self.advance();
                            value.push(c);
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::String(value)
    }

    /// Scan digits with at most one embedded `.` and an optional leading `-`.
    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;

        if self.peek_char() == Some('-') {
            self.advance();
        }
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek_char() == Some('.') && self.peek_next_char().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.source[start..self.pos];
        TokenKind::Number(text.parse::<f64>().unwrap_or_default())
    }

    /// Scan a comment body up to (not including) the newline.
    fn scan_comment(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        TokenKind::Comment(self.source[start..self.pos].trim().to_string())
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let (i, c) = self.chars.next()?;
        self.pos = i + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length in chars of a `[digits]` prefix of `rest`, if present.
fn index_suffix_len(rest: &str) -> Option<usize> {
    let inner = rest.strip_prefix('[')?;
    let digits = inner.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && inner[digits..].starts_with(']') {
        Some(digits + 2)
    } else {
        None
    }
}

/// Tokenize `source` with the default token cap.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexer_statement() {
        assert_eq!(
            kinds("options.responsive: true;"),
            vec![
                TokenKind::Identifier("options".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("responsive".to_string()),
                TokenKind::Colon,
                TokenKind::Boolean(true),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_boolean_needs_word_boundary() {
        assert_eq!(
            kinds("truefoo false"),
            vec![
                TokenKind::Identifier("truefoo".to_string()),
                TokenKind::Boolean(false),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_numbers() {
        assert_eq!(
            kinds("42 3.25 -7 1.2.3"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.25),
                TokenKind::Number(-7.0),
                TokenKind::Number(1.2),
                TokenKind::Dot,
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_string_escapes() {
        let tokens = tokenize(r#""a\nb\t\"c\\" 'it\'s'"#);
        assert_eq!(tokens[0].kind, TokenKind::String("a\nb\t\"c\\".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::String("it's".to_string()));
    }

    #[test]
    fn test_lexer_unterminated_string_runs_to_end() {
        let tokens = tokenize("title: \"Sales");
        assert_eq!(tokens[2].kind, TokenKind::String("Sales".to_string()));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_lexer_comments() {
        assert_eq!(
            kinds("# heading\ntype: bar; // trailing"),
            vec![
                TokenKind::Comment("heading".to_string()),
                TokenKind::Identifier("type".to_string()),
                TokenKind::Colon,
                TokenKind::Identifier("bar".to_string()),
                TokenKind::Semicolon,
                TokenKind::Comment("trailing".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_variable_and_path_root() {
        assert_eq!(
            kinds("$primary $.months"),
            vec![
                TokenKind::Variable("$primary".to_string()),
                TokenKind::Variable("$".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("months".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_indexed_segment() {
        assert_eq!(
            kinds("$.charts[0].label"),
            vec![
                TokenKind::Variable("$".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("charts[0]".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("label".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_interpolation_balanced_braces() {
        let tokens = tokenize("title: ${ params.a ? { b } : c };");
        assert_eq!(
            tokens[2].kind,
            TokenKind::Interpolation(" params.a ? { b } : c ".to_string())
        );
        assert_eq!(tokens[3].kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_lexer_unterminated_interpolation() {
        let tokens = tokenize("x: ${ params.a");
        assert_eq!(tokens[2].kind, TokenKind::Interpolation(" params.a".to_string()));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_lexer_skips_unknown_characters() {
        assert_eq!(
            kinds("a , [ ] @ b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_positions() {
        let tokens = tokenize("type: bar;\n  title: \"x\";");
        let title = &tokens[4];
        assert_eq!(title.kind, TokenKind::Identifier("title".to_string()));
        assert_eq!(title.line(), 2);
        assert_eq!(title.column(), 3);
        assert_eq!(title.text, "title");
    }

    #[test]
    fn test_lexer_token_limit() {
        let source = "a: 1;".repeat(100);
        let mut lexer = Lexer::new(&source).with_token_limit(10);
        let tokens = lexer.tokenize();
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
        assert!(lexer.was_truncated());
    }

    #[test]
    fn test_lexer_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }
}
