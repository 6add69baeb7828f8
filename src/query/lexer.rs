use tracing::warn;

use crate::error::{GraphError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    String,
    Number,
    Symbol,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

const KEYWORDS: [&str; 6] = ["CREATE", "MATCH", "SET", "DELETE", "RETURN", "WHERE"];

/// Splits a query string into tokens, always ending with `Eof`.
///
/// Keywords are recognized case-insensitively but keep their original
/// spelling in the token value. Unknown characters are skipped with a
/// warning; an unterminated string literal is an error.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            if byte.is_ascii_whitespace() {
                self.pos += 1;
            } else if byte.is_ascii_alphabetic() {
                self.read_identifier_or_keyword();
            } else if byte == b'"' {
                self.read_string()?;
            } else if byte.is_ascii_digit() {
                self.read_number();
            } else {
                self.read_symbol();
            }
        }
        self.tokens.push(Token::new(TokenKind::Eof, ""));
        Ok(self.tokens)
    }

    fn read_identifier_or_keyword(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let value = &self.input[start..self.pos];
        let kind = if KEYWORDS.contains(&value.to_ascii_uppercase().as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.tokens.push(Token::new(kind, value));
    }

    fn read_string(&mut self) -> Result<()> {
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'"' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(GraphError::Parse(format!(
                "unterminated string literal starting at byte {}",
                start - 1
            )));
        }
        let value = &self.input[start..self.pos];
        self.pos += 1;
        self.tokens.push(Token::new(TokenKind::String, value));
        Ok(())
    }

    fn read_number(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        self.tokens
            .push(Token::new(TokenKind::Number, &self.input[start..self.pos]));
    }

    fn read_symbol(&mut self) {
        let byte = self.bytes[self.pos];
        match byte {
            b'-' if self.pos + 1 < self.bytes.len() && self.bytes[self.pos + 1] == b'>' => {
                self.tokens.push(Token::new(TokenKind::Symbol, "->"));
                self.pos += 2;
            }
            b'(' | b')' | b'{' | b'}' | b':' | b',' | b'=' | b'-' | b'[' | b']' | b'.' => {
                self.tokens
                    .push(Token::new(TokenKind::Symbol, (byte as char).to_string()));
                self.pos += 1;
            }
            _ => {
                warn!(byte, position = self.pos, "skipping unknown character");
                self.pos += 1;
            }
        }
    }
}
