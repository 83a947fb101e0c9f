//! Token types for the expression tokenizer.

use std::ops::BitOr;

use super::ast::{BinaryOp, UnaryOp};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Char offset of the first character of the token.
    pub pos: usize,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Raw digits and dots, e.g. `440`, `0.5` or the malformed `2.3.4`.
    Number(String),
    /// Identifier: letters, digits, `_` and `#`, starting with a letter.
    Word(String),
    Open,
    Close,
    Unary(UnaryOp),
    Binary(BinaryOp),
}

/// Set of token classes permitted next.
///
/// The lexer carries one of these between tokens; it is what tells a unary
/// minus from a binary one and rejects sequences like `1 2` or `)(`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expect(u8);

impl Expect {
    pub const OP: Expect = Expect(1 << 0);
    pub const OPEN: Expect = Expect(1 << 1);
    pub const CLOSE: Expect = Expect(1 << 2);
    pub const NUMBER: Expect = Expect(1 << 3);
    pub const WORD: Expect = Expect(1 << 4);
    /// Set only right after a unary operator was produced.
    pub const UNARY: Expect = Expect(1 << 5);

    /// State at the start of an expression.
    pub const START: Expect = Expect(Self::OPEN.0 | Self::NUMBER.0 | Self::WORD.0);

    pub fn contains(self, other: Expect) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Expect {
    type Output = Expect;

    fn bitor(self, rhs: Expect) -> Expect {
        Expect(self.0 | rhs.0)
    }
}
