//! Error types for the expression compiler.

use std::fmt;

/// An error that occurred while compiling an expression.
///
/// Compilation is all-or-nothing: whenever one of these is returned, the
/// variable table and any previously compiled program are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
    /// Char offset into the source where the problem was detected.
    pub pos: usize,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A token that is not legal in the current grammar state.
    Lex(LexError),
    /// Unbalanced parentheses, malformed calls, bad assignment targets.
    Syntax,
    /// A resource limit was hit while building the tree.
    Resource,
}

/// The five ways the tokenizer can reject input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// A number where no operand may start.
    UnexpectedNumber,
    /// A word where no operand may start.
    UnexpectedWord,
    /// `(` or `)` in the wrong place.
    UnexpectedParen,
    /// An operator where an operand was required, and it is not a unary one.
    MissingOperand,
    /// A run of operator characters that spells no known operator.
    UnknownOperator,
}

impl CompileError {
    pub fn lex(error: LexError, pos: usize) -> Self {
        let message = match error {
            LexError::UnexpectedNumber => "unexpected number",
            LexError::UnexpectedWord => "unexpected word",
            LexError::UnexpectedParen => "unexpected parenthesis",
            LexError::MissingOperand => "missing operand",
            LexError::UnknownOperator => "unknown operator",
        };
        Self {
            message: message.to_string(),
            pos,
            kind: ErrorKind::Lex(error),
        }
    }

    pub fn syntax(message: impl Into<String>, pos: usize) -> Self {
        Self {
            message: message.into(),
            pos,
            kind: ErrorKind::Syntax,
        }
    }

    pub fn resource(message: impl Into<String>, pos: usize) -> Self {
        Self {
            message: message.into(),
            pos,
            kind: ErrorKind::Resource,
        }
    }

    /// Whether the tokenizer rejected the input.
    pub fn is_lexical(&self) -> bool {
        matches!(self.kind, ErrorKind::Lex(_))
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Lex(_) => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Resource => "resource error",
        };
        write!(f, "[{}] {kind}: {}", self.pos, self.message)
    }
}

impl std::error::Error for CompileError {}
