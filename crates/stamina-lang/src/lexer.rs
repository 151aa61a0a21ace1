//! Lexer for the model language.
//!
//! Converts source text into a stream of tokens. Line comments (`//`) are
//! skipped.

use crate::parser::ParseError;
use crate::token::{Span, Token, TokenKind};
use std::str::Chars;

/// Lexer for model and property source text.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    /// Current byte position.
    pos: usize,
    /// Current line number (1-indexed).
    line: u32,
    /// Current column number (1-indexed).
    column: u32,
    token_start: usize,
    token_start_line: u32,
    token_start_column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars(),
            pos: 0,
            line: 1,
            column: 1,
            token_start: 0,
            token_start_line: 1,
            token_start_column: 1,
        }
    }

    /// Tokenize the entire source, returning all tokens including EOF.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            self.skip_whitespace();
            if self.peek() == Some('/') && self.peek_next() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            break;
        }
        self.mark_token_start();

        let Some(c) = self.peek() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        if c == '"' {
            return self.lex_string();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(self.lex_identifier());
        }
        self.lex_operator_or_punctuation()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn mark_token_start(&mut self) {
        self.token_start = self.pos;
        self.token_start_line = self.line;
        self.token_start_column = self.column;
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn span(&self) -> Span {
        Span::new(
            self.token_start,
            self.pos,
            self.token_start_line,
            self.token_start_column,
        )
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            span: self.span(),
        }
    }

    fn lex_string(&mut self) -> Result<Token, ParseError> {
        self.advance(); // opening quote
        let content_start = self.pos;
        loop {
            match self.peek() {
                Some('"') => break,
                Some(_) => {
                    self.advance();
                }
                None => {
                    return Err(ParseError::UnterminatedString { span: self.span() });
                }
            }
        }
        let text = self.source[content_start..self.pos].to_string();
        self.advance(); // closing quote
        Ok(self.make_token(TokenKind::StringLit(text)))
    }

    fn lex_number(&mut self) -> Result<Token, ParseError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        // A dot followed by a digit continues a double literal; `..` is the
        // range operator and must stay untouched.
        let mut is_double = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            let mut after = lookahead.clone();
            let sign_ok = match after.next() {
                Some('+' | '-') => after.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if sign_ok {
                is_double = true;
                self.advance(); // e
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.source[self.token_start..self.pos];
        if is_double {
            let value: f64 = text
                .parse()
                .map_err(|_| ParseError::InvalidNumber { span: self.span() })?;
            if !value.is_finite() {
                return Err(ParseError::InvalidNumber { span: self.span() });
            }
            Ok(self.make_token(TokenKind::DoubleLit(value)))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| ParseError::InvalidNumber { span: self.span() })?;
            Ok(self.make_token(TokenKind::IntLit(value)))
        }
    }

    fn lex_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let text = &self.source[self.token_start..self.pos];
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
        self.make_token(kind)
    }

    fn lex_operator_or_punctuation(&mut self) -> Result<Token, ParseError> {
        let c = self.advance().expect("caller checked non-empty");
        let kind = match c {
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '\'' => TokenKind::Prime,
            '?' => TokenKind::Question,
            '&' => TokenKind::Amp,
            '|' => TokenKind::Pipe,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Eq,
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    TokenKind::DotDot
                } else {
                    return Err(ParseError::UnexpectedChar {
                        found: c,
                        span: self.span(),
                    });
                }
            }
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Neq
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            _ => {
                return Err(ParseError::UnexpectedChar {
                    found: c,
                    span: self.span(),
                });
            }
        };
        Ok(self.make_token(kind))
    }
}
