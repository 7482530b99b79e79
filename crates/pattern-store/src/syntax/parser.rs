//! Recursive-descent parser producing a spanned value tree
//!
//! Grammar (comments and whitespace elided):
//!
//! ```text
//! file   := '(' object ')' ';'? EOF  |  object ';'? EOF
//! object := '{' (member (',' member)* ','?)? '}'
//! member := (IDENT | STRING) ':' value
//! array  := '[' (value (',' value)* ','?)? ']'
//! value  := object | array | STRING | NUMBER
//! ```

use super::lexer::{Lexer, Span, Token, TokenKind};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Object(Vec<Member>),
    Array(Vec<Node>),
    Str(String),
    Number(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub(crate) value: Value,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Member {
    pub(crate) key: String,
    pub(crate) key_span: Span,
    pub(crate) value: Node,
}

impl Value {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Str(_) => "string",
            Self::Number(_) => "number",
        }
    }
}

/// Parse a whole file into its root object node
pub(crate) fn parse(src: &str) -> Result<Node, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
    };
    parser.file()
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn file(&mut self) -> Result<Node, ParseError> {
        if self.peek().kind == TokenKind::Eof {
            return Err(self.error_here("expected pattern object, found end of input"));
        }

        let wrapped = self.eat(&TokenKind::LParen);
        if self.peek().kind != TokenKind::LBrace {
            return Err(self.unexpected("'{'"));
        }
        let root = self.value()?;
        if wrapped {
            self.expect(&TokenKind::RParen, "')'")?;
        }
        self.eat(&TokenKind::Semicolon);

        if self.peek().kind != TokenKind::Eof {
            return Err(self.unexpected("end of input"));
        }
        Ok(root)
    }

    fn value(&mut self) -> Result<Node, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::LBrace => self.object(),
            TokenKind::LBracket => self.array(),
            TokenKind::Str(s) => {
                self.pos += 1;
                Ok(Node {
                    value: Value::Str(s),
                    span: token.span,
                })
            }
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(Node {
                    value: Value::Number(n),
                    span: token.span,
                })
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    fn object(&mut self) -> Result<Node, ParseError> {
        let open = self.advance().span;
        let mut members = Vec::new();

        loop {
            if let Some(close) = self.eat_span(&TokenKind::RBrace) {
                return Ok(Node {
                    value: Value::Object(members),
                    span: open.to(close),
                });
            }

            let key_token = self.peek().clone();
            let key = match key_token.kind {
                TokenKind::Ident(k) | TokenKind::Str(k) => k,
                _ => return Err(self.unexpected("a field name or '}'")),
            };
            self.pos += 1;
            self.expect(&TokenKind::Colon, "':'")?;
            let value = self.value()?;
            members.push(Member {
                key,
                key_span: key_token.span,
                value,
            });

            if !self.eat(&TokenKind::Comma) && self.peek().kind != TokenKind::RBrace {
                return Err(self.unexpected("',' or '}'"));
            }
        }
    }

    fn array(&mut self) -> Result<Node, ParseError> {
        let open = self.advance().span;
        let mut items = Vec::new();

        loop {
            if let Some(close) = self.eat_span(&TokenKind::RBracket) {
                return Ok(Node {
                    value: Value::Array(items),
                    span: open.to(close),
                });
            }

            items.push(self.value()?);

            if !self.eat(&TokenKind::Comma) && self.peek().kind != TokenKind::RBracket {
                return Err(self.unexpected("',' or ']'"));
            }
        }
    }

    fn peek(&self) -> &Token {
        // tokenize() always ends with Eof and Eof is never consumed
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        self.eat_span(kind).is_some()
    }

    fn eat_span(&mut self, kind: &TokenKind) -> Option<Span> {
        if &self.peek().kind == kind {
            Some(self.advance().span)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Span, ParseError> {
        self.eat_span(kind).ok_or_else(|| self.unexpected(what))
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = self.peek().kind.describe();
        self.error_here(format!("expected {expected}, found {found}"))
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(self.src, self.peek().span.start, message)
    }
}
