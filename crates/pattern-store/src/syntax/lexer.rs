//! Tokenizer for the object-literal format
//!
//! Line (`//`) and block (`/* */`) comments are skipped. Strings may use
//! single or double quotes with backslash escapes.

use crate::error::ParseError;

/// Byte range in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Span {
    #[inline]
    pub(crate) fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both
    #[inline]
    #[must_use]
    pub(crate) fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Semicolon,
    Str(String),
    /// Numeric literal text, kept verbatim for exact conversion
    Number(String),
    Ident(String),
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::LBrace => "'{'".into(),
            Self::RBrace => "'}'".into(),
            Self::LBracket => "'['".into(),
            Self::RBracket => "']'".into(),
            Self::Colon => "':'".into(),
            Self::Comma => "','".into(),
            Self::Semicolon => "';'".into(),
            Self::Str(s) => format!("string '{s}'"),
            Self::Number(n) => format!("number {n}"),
            Self::Ident(i) => format!("identifier '{i}'"),
            Self::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let start = self.pos;

        let Some(&b) = self.bytes.get(self.pos) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        let kind = match b {
            b'(' => self.punct(TokenKind::LParen),
            b')' => self.punct(TokenKind::RParen),
            b'{' => self.punct(TokenKind::LBrace),
            b'}' => self.punct(TokenKind::RBrace),
            b'[' => self.punct(TokenKind::LBracket),
            b']' => self.punct(TokenKind::RBracket),
            b':' => self.punct(TokenKind::Colon),
            b',' => self.punct(TokenKind::Comma),
            b';' => self.punct(TokenKind::Semicolon),
            b'\'' | b'"' => self.string(b)?,
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.number()?,
            b if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => self.ident(),
            _ => {
                let ch = self.src[start..].chars().next().unwrap_or('?');
                return Err(ParseError::syntax(
                    self.src,
                    start,
                    format!("unexpected character '{ch}'"),
                ));
            }
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
        })
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.bytes.get(self.pos), self.bytes.get(self.pos + 1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    while self.bytes.get(self.pos).is_some_and(|&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let open = self.pos;
                    match self.src[self.pos + 2..].find("*/") {
                        Some(rel) => self.pos += 2 + rel + 2,
                        None => {
                            return Err(ParseError::syntax(
                                self.src,
                                open,
                                "unterminated block comment",
                            ))
                        }
                    }
                }
                // Non-ASCII whitespace such as a BOM or NBSP
                (Some(b), _) if *b >= 0x80 => {
                    let ch = self.src[self.pos..].chars().next().unwrap_or('\0');
                    if ch.is_whitespace() || ch == '\u{feff}' {
                        self.pos += ch.len_utf8();
                    } else {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let rest = &self.src[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(ParseError::syntax(self.src, open, "unterminated string"));
            };
            match ch {
                '\n' => return Err(ParseError::syntax(self.src, open, "unterminated string")),
                '\\' => {
                    let escaped = rest[1..].chars().next().ok_or_else(|| {
                        ParseError::syntax(self.src, open, "unterminated string")
                    })?;
                    let decoded = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '\'' | '"' => escaped,
                        other => {
                            return Err(ParseError::syntax(
                                self.src,
                                self.pos,
                                format!("unsupported escape '\\{other}'"),
                            ))
                        }
                    };
                    out.push(decoded);
                    self.pos += 1 + escaped.len_utf8();
                }
                c if c as u32 == u32::from(quote) => {
                    self.pos += 1;
                    return Ok(TokenKind::Str(out));
                }
                c => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let int_digits = self.digits();
        let mut frac_digits = 0;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            frac_digits = self.digits();
        }
        if int_digits + frac_digits == 0 {
            return Err(ParseError::syntax(self.src, start, "malformed number"));
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'-' | b'+')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(ParseError::syntax(self.src, start, "malformed exponent"));
            }
        }
        if self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ParseError::syntax(self.src, start, "malformed number"));
        }
        Ok(TokenKind::Number(self.src[start..self.pos].to_string()))
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
        {
            self.pos += 1;
        }
        TokenKind::Ident(self.src[start..self.pos].to_string())
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}
