//! Tokenizer for the expression language.
//!
//! The lexer is driven one token at a time and carries an [`Expect`] set
//! between calls. That set decides whether `-` is unary or binary and
//! rejects juxtaposed operands such as `1 2` before the parser sees them.

use super::ast::{BinaryOp, UnaryOp};
use super::error::{CompileError, LexError};
use super::token::{Expect, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    expect: Expect,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '#'
}

fn is_operator_char(c: char) -> bool {
    !is_word_char(c) && !c.is_whitespace() && c != '(' && c != ')'
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            expect: Expect::START,
        }
    }

    /// Token classes permitted after the last token produced.
    pub fn expect(&self) -> Expect {
        self.expect
    }

    /// Lex the whole input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, CompileError> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Ok(None);
        }

        let start = self.pos;
        let ch = self.peek();

        let kind = if ch.is_ascii_digit() {
            if !self.expect.contains(Expect::NUMBER) {
                return Err(CompileError::lex(LexError::UnexpectedNumber, start));
            }
            self.expect = Expect::OP | Expect::CLOSE;
            TokenKind::Number(self.take_while(|c| c.is_ascii_digit() || c == '.'))
        } else if ch.is_ascii_alphabetic() {
            if !self.expect.contains(Expect::WORD) {
                return Err(CompileError::lex(LexError::UnexpectedWord, start));
            }
            self.expect = Expect::OP | Expect::OPEN | Expect::CLOSE;
            TokenKind::Word(self.take_while(is_word_char))
        } else if ch == '(' {
            if !self.expect.contains(Expect::OPEN) {
                return Err(CompileError::lex(LexError::UnexpectedParen, start));
            }
            self.advance();
            self.expect = Expect::NUMBER | Expect::WORD | Expect::OPEN | Expect::CLOSE;
            TokenKind::Open
        } else if ch == ')' {
            if !self.expect.contains(Expect::CLOSE) {
                return Err(CompileError::lex(LexError::UnexpectedParen, start));
            }
            self.advance();
            self.expect = Expect::OP | Expect::CLOSE;
            TokenKind::Close
        } else if !self.expect.contains(Expect::OP) {
            let op = UnaryOp::from_char(ch)
                .ok_or_else(|| CompileError::lex(LexError::MissingOperand, start))?;
            self.advance();
            self.expect = Expect::NUMBER | Expect::WORD | Expect::OPEN | Expect::UNARY;
            TokenKind::Unary(op)
        } else {
            let op = self.lex_binary_operator()?;
            self.expect = Expect::NUMBER | Expect::WORD | Expect::OPEN;
            TokenKind::Binary(op)
        };

        Ok(Some(Token { kind, pos: start }))
    }

    /// Greedily match the longest known operator spelling.
    fn lex_binary_operator(&mut self) -> Result<BinaryOp, CompileError> {
        let start = self.pos;
        let mut spelling = String::new();
        let mut longest: Option<(BinaryOp, usize)> = None;

        let mut i = self.pos;
        while i < self.chars.len() && is_operator_char(self.chars[i]) {
            spelling.push(self.chars[i]);
            match BinaryOp::from_spelling(&spelling) {
                Some(op) => longest = Some((op, i + 1)),
                None if longest.is_some() => break,
                None => {}
            }
            i += 1;
        }

        let (op, end) = longest.ok_or_else(|| CompileError::lex(LexError::UnknownOperator, start))?;
        self.pos = end;
        Ok(op)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while !self.is_at_end() && pred(self.peek()) {
            s.push(self.advance());
        }
        s
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}
