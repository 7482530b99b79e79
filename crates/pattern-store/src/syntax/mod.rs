//! Object-literal syntax
//!
//! A small lexer and parser for the fixed grammar of pattern files. The
//! parser yields an untyped tree with byte spans; `decode` turns it into a
//! typed document.

mod lexer;
mod parser;

pub(crate) use parser::{parse, Member, Node, Value};
