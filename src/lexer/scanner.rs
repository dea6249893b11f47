use std::collections::HashSet;

use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// Scanner for Losp source text
///
/// Produces a flat vector of span tokens. The scanner must know the set of
/// special-operator names so a bare symbol directly followed by `(` can be
/// classified as a `SpecialOperatorSymbol`; names starting with `$` (and
/// longer than one character) always qualify.
pub struct Scanner<'a> {
    /// Source text
    source: &'a str,
    /// Source bytes (delimiters are all ASCII, so byte-wise scanning is safe)
    bytes: &'a [u8],
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of the current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Column where the current token started
    token_column: usize,
    /// Line where the current token started
    token_line: usize,
    /// Registered special-operator names
    specials: HashSet<String>,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner that recognises the builtin special operators
    pub fn new(source: &'a str) -> Self {
        Scanner::with_special_operators(
            source,
            crate::ops::BUILTIN_SPECIAL_NAMES.iter().map(|s| s.to_string()),
        )
    }

    /// Creates a scanner with an explicit special-operator name set
    pub fn with_special_operators(
        source: &'a str,
        specials: impl IntoIterator<Item = String>,
    ) -> Self {
        Scanner {
            source,
            bytes: source.as_bytes(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            token_column: 1,
            token_line: 1,
            specials: specials.into_iter().collect(),
        }
    }

    /// Scans all tokens from the source and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.token_line = self.line;
            self.token_column = self.column;
            self.scan_token()?;
        }
        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            // Whitespace
            b' ' | b'\r' | b'\t' | b'\n' => {}

            // Brackets
            b'(' => self.add_token(TokenKind::LParen),
            b')' => self.add_token(TokenKind::RParen),
            b'[' => self.add_token(TokenKind::LBracket),
            b']' => self.add_token(TokenKind::RBracket),
            b'{' => {
                if self.match_byte(b'{') {
                    self.add_token(TokenKind::DblLCurly);
                } else {
                    self.add_token(TokenKind::LCurly);
                }
            }
            b'}' => {
                if self.match_byte(b'}') {
                    self.add_token(TokenKind::DblRCurly);
                } else {
                    self.add_token(TokenKind::RCurly);
                }
            }

            // Filter chainer: only when directly opening a frame; a bare %
            // falls through to the value rule and becomes the modulo symbol
            b'%' if self.peek() == b'(' => self.add_token(TokenKind::LeftChainFilter),

            // Quoted strings
            b'"' | b'`' => self.scan_string(c)?,

            // Line comment
            b'/' if self.peek() == b'/' => self.skip_line_comment(),

            // Function literal prefix
            b'F' if self.peek() == b'N' && self.peek_at(1) == b'(' => {
                self.advance();
                self.advance();
                self.add_token(TokenKind::LeftInitFunc);
            }

            _ => self.scan_value()?,
        }

        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != b'\n' {
            self.advance();
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<()> {
        loop {
            if self.is_at_end() {
                return Err(self.error_here("unterminated string"));
            }
            let c = self.peek();
            if c == b'\\' && self.peek_at(1) == quote {
                // Backslash directly before the quote escapes it
                self.advance();
                self.advance();
            } else if c == quote {
                self.advance();
                break;
            } else {
                self.advance();
            }
        }
        self.add_token(TokenKind::String);
        Ok(())
    }

    /// Reads a bare value: advance until whitespace, a bracket, or `//`,
    /// then classify the run
    fn scan_value(&mut self) -> Result<()> {
        while !self.is_at_end() && !Self::ends_value(self.peek()) {
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                break;
            }
            self.advance();
        }

        let text = &self.source[self.start..self.current];

        // A run directly followed by `(` may be a filter or special-operator
        // prefix; the `(` itself stays in the stream for the builder
        if self.peek() == b'(' {
            if text == "#" {
                self.add_token(TokenKind::LeftInitFilter);
                return Ok(());
            }
            if self.specials.contains(text) || (text.starts_with('$') && text.len() > 1) {
                self.add_token(TokenKind::SpecialOperatorSymbol);
                return Ok(());
            }
        }

        let kind = if text == "null" {
            TokenKind::Null
        } else if let Some(tag) = text.strip_prefix('#') {
            if tag.is_empty() {
                return Err(self.error_here("empty tag"));
            }
            // Tag spans exclude the leading #
            self.tokens.push(Token::new(
                TokenKind::Tag,
                self.start + 1,
                self.current,
                self.token_line,
                self.token_column,
            ));
            return Ok(());
        } else if text == "true" || text == "false" {
            TokenKind::Bool
        } else if text.parse::<i32>().is_ok() {
            TokenKind::Int
        } else if text.parse::<f32>().is_ok() {
            TokenKind::Float
        } else {
            TokenKind::Symbol
        };

        self.add_token(kind);
        Ok(())
    }

    fn ends_value(c: u8) -> bool {
        matches!(
            c,
            b' ' | b'\r' | b'\t' | b'\n' | b'(' | b')' | b'[' | b']' | b'{' | b'}'
        )
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(
            kind,
            self.start,
            self.current,
            self.token_line,
            self.token_column,
        ));
    }

    fn error_here(&self, message: &str) -> Error {
        let excerpt: String = self.source[self.start..]
            .chars()
            .take(16)
            .collect();
        Error::SyntaxError {
            line: self.token_line,
            col: self.token_column,
            message: format!("{} near '{}'", message, excerpt),
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.current];
        self.current += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.advance();
        true
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        if self.current + offset >= self.bytes.len() {
            0
        } else {
            self.bytes[self.current + offset]
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        scanner
            .scan_tokens()
            .unwrap()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_brackets_and_literals() {
        assert_eq!(
            kinds("(+ 5 6.5 true null \"hi\")"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Bool,
                TokenKind::Null,
                TokenKind::String,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_double_curly() {
        assert_eq!(
            kinds("{{from 0}}"),
            vec![
                TokenKind::DblLCurly,
                TokenKind::Symbol,
                TokenKind::Int,
                TokenKind::DblRCurly,
            ]
        );
    }

    #[test]
    fn test_special_operator_prefix() {
        assert_eq!(
            kinds("IF(x 1 2)"),
            vec![
                TokenKind::SpecialOperatorSymbol,
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_dollar_prefix_is_special() {
        let ks = kinds("$host(1)");
        assert_eq!(ks[0], TokenKind::SpecialOperatorSymbol);
        // A lone $ is not special
        let ks = kinds("$(1)");
        assert_eq!(ks[0], TokenKind::Symbol);
    }

    #[test]
    fn test_filter_prefixes() {
        assert_eq!(kinds("#(x)")[0], TokenKind::LeftInitFilter);
        assert_eq!(kinds("%(x)")[0], TokenKind::LeftChainFilter);
    }

    #[test]
    fn test_percent_symbol_when_not_prefix() {
        assert_eq!(
            kinds("(% 7 2)"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_fn_prefix() {
        let ks = kinds("FN([a] a)");
        assert_eq!(ks[0], TokenKind::LeftInitFunc);
        assert_eq!(ks[1], TokenKind::LBracket);
    }

    #[test]
    fn test_tag_span_excludes_hash() {
        let source = "#mark";
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Tag);
        assert_eq!(tokens[0].lexeme(source), "mark");
    }

    #[test]
    fn test_comment_skipped() {
        assert_eq!(
            kinds("5 // six seven\n8"),
            vec![TokenKind::Int, TokenKind::Int]
        );
    }

    #[test]
    fn test_string_quote_escape() {
        let source = r#""say \"hi\"""#;
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme(source), source);
    }

    #[test]
    fn test_backtick_string() {
        assert_eq!(kinds("`hello`"), vec![TokenKind::String]);
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let mut scanner = Scanner::new("\"oops");
        assert!(scanner.scan_tokens().is_err());
    }

    #[test]
    fn test_int_overflow_falls_back_to_float() {
        assert_eq!(kinds("2147483648"), vec![TokenKind::Float]);
        assert_eq!(kinds("-12"), vec![TokenKind::Int]);
    }
}
