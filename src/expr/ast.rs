//! Abstract syntax tree for compiled programs.
//!
//! A program is a plain tree of [`Expr`] nodes. Variable references share
//! cells with the session's [`VariableTable`](super::VariableTable); every
//! [`Call`] node exclusively owns the running state of its function.

use std::fmt;

use super::vars::VarRef;
use crate::library::{CallContext, Function};

/// Unary operators, all binding tighter than any binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `^x` or `~x`
    BitNot,
}

impl UnaryOp {
    /// Look up a unary operator by its single-character spelling.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(UnaryOp::Neg),
            '!' => Some(UnaryOp::Not),
            '^' | '~' => Some(UnaryOp::BitNot),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Assign,
    Comma,
}

/// Binding strength of unary operators.
pub const UNARY_PRECEDENCE: u8 = 10;

const SPELLINGS: &[(&str, BinaryOp)] = &[
    ("**", BinaryOp::Pow),
    ("*", BinaryOp::Mul),
    ("/", BinaryOp::Div),
    ("%", BinaryOp::Rem),
    ("+", BinaryOp::Add),
    ("-", BinaryOp::Sub),
    ("<<", BinaryOp::Shl),
    (">>", BinaryOp::Shr),
    ("<", BinaryOp::Lt),
    ("<=", BinaryOp::Le),
    (">", BinaryOp::Gt),
    (">=", BinaryOp::Ge),
    ("==", BinaryOp::Eq),
    ("!=", BinaryOp::Ne),
    ("&", BinaryOp::BitAnd),
    ("|", BinaryOp::BitOr),
    ("^", BinaryOp::BitXor),
    ("&&", BinaryOp::And),
    ("||", BinaryOp::Or),
    ("=", BinaryOp::Assign),
    (",", BinaryOp::Comma),
];

impl BinaryOp {
    /// Look up a binary operator by its exact spelling.
    pub fn from_spelling(s: &str) -> Option<Self> {
        SPELLINGS
            .iter()
            .find(|(spelling, _)| *spelling == s)
            .map(|&(_, op)| op)
    }

    pub fn symbol(self) -> &'static str {
        SPELLINGS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|&(s, _)| s)
            .unwrap_or("?")
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Pow => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 8,
            BinaryOp::Add | BinaryOp::Sub => 7,
            BinaryOp::Shl | BinaryOp::Shr => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Eq | BinaryOp::Ne => 4,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => 3,
            BinaryOp::And | BinaryOp::Or => 2,
            BinaryOp::Assign => 1,
            BinaryOp::Comma => 0,
        }
    }

    pub fn is_left_assoc(self) -> bool {
        !matches!(self, BinaryOp::Pow | BinaryOp::Assign | BinaryOp::Comma)
    }
}

/// A node of a compiled program.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f32),
    Var(VarRef),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Call),
}

impl Default for Expr {
    /// The empty program.
    fn default() -> Self {
        Expr::Const(0.0)
    }
}

impl Expr {
    /// If this is a comma pair `(a, b)`, borrow both halves.
    pub fn as_pair(&self) -> Option<(&Expr, &Expr)> {
        match self {
            Expr::Binary(BinaryOp::Comma, a, b) => Some((a, b)),
            _ => None,
        }
    }

    /// Mutable variant of [`Expr::as_pair`].
    pub fn as_pair_mut(&mut self) -> Option<(&mut Expr, &mut Expr)> {
        match self {
            Expr::Binary(BinaryOp::Comma, a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Expr::Binary(BinaryOp::Comma, _, _))
    }

    /// Number of call sites in this tree.
    pub fn call_count(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Var(_) => 0,
            Expr::Unary(_, a) => a.call_count(),
            Expr::Binary(_, a, b) => a.call_count() + b.call_count(),
            Expr::Call(call) => 1 + call.args.iter().map(Expr::call_count).sum::<usize>(),
        }
    }
}

/// A function call site.
#[derive(Debug)]
pub struct Call {
    pub function: Function,
    pub args: Vec<Expr>,
    /// Running state of this call site; never shared with another node.
    pub context: CallContext,
}

impl Call {
    pub fn new(function: Function, args: Vec<Expr>) -> Self {
        let context = function.new_context();
        Self {
            function,
            args,
            context,
        }
    }
}

impl Clone for Call {
    /// Deep-copies the arguments but starts the copy from a fresh context;
    /// the running state of the original is never duplicated.
    fn clone(&self) -> Self {
        Call::new(self.function.clone(), self.args.clone())
    }
}

impl PartialEq for Call {
    /// Structural equality; running state is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function && self.args == other.args
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Var(var) => write!(f, "{}", var.name()),
            Expr::Unary(op, a) => write!(f, "({}{a})", op.symbol()),
            Expr::Binary(BinaryOp::Comma, a, b) => write!(f, "({a}, {b})"),
            Expr::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
            Expr::Call(call) => {
                write!(f, "{}(", call.function.name())?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::FunctionKind;

    #[test]
    fn spellings_round_trip() {
        for &(s, op) in SPELLINGS {
            assert_eq!(BinaryOp::from_spelling(s), Some(op));
            assert_eq!(op.symbol(), s);
        }
        assert_eq!(BinaryOp::from_spelling("**="), None);
    }

    #[test]
    fn precedence_tiers() {
        assert!(BinaryOp::Pow.precedence() > BinaryOp::Mul.precedence());
        assert_eq!(BinaryOp::Mul.precedence(), BinaryOp::Rem.precedence());
        assert_eq!(BinaryOp::Add.precedence(), BinaryOp::Sub.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Shl.precedence());
        assert!(BinaryOp::Or.precedence() > BinaryOp::Assign.precedence());
        assert!(BinaryOp::Assign.precedence() > BinaryOp::Comma.precedence());
        assert!(UNARY_PRECEDENCE > BinaryOp::Pow.precedence());
    }

    #[test]
    fn associativity() {
        assert!(BinaryOp::Sub.is_left_assoc());
        assert!(!BinaryOp::Pow.is_left_assoc());
        assert!(!BinaryOp::Assign.is_left_assoc());
        assert!(!BinaryOp::Comma.is_left_assoc());
    }

    #[test]
    fn unary_spellings() {
        assert_eq!(UnaryOp::from_char('-'), Some(UnaryOp::Neg));
        assert_eq!(UnaryOp::from_char('!'), Some(UnaryOp::Not));
        assert_eq!(UnaryOp::from_char('^'), Some(UnaryOp::BitNot));
        assert_eq!(UnaryOp::from_char('~'), Some(UnaryOp::BitNot));
        assert_eq!(UnaryOp::from_char('+'), None);
    }

    #[test]
    fn pair_helpers() {
        let pair = Expr::Binary(
            BinaryOp::Comma,
            Box::new(Expr::Const(1.0)),
            Box::new(Expr::Const(2.0)),
        );
        assert!(pair.is_pair());
        let (a, b) = pair.as_pair().unwrap();
        assert_eq!(*a, Expr::Const(1.0));
        assert_eq!(*b, Expr::Const(2.0));
        assert!(Expr::Const(1.0).as_pair().is_none());
    }

    #[test]
    fn cloned_call_starts_from_fresh_state() {
        let function = Function::new("sin", FunctionKind::Sin);
        let mut call = Call::new(function, vec![Expr::Const(440.0)]);
        if let CallContext::Osc(osc) = &mut call.context {
            osc.phase = 0.5;
            osc.freq = 440.0;
        }
        let copy = call.clone();
        assert_eq!(copy, call);
        match &copy.context {
            CallContext::Osc(osc) => {
                assert_eq!(osc.phase, 0.0);
                assert_eq!(osc.freq, 0.0);
            }
            other => panic!("expected oscillator context, got {other:?}"),
        }
    }

    #[test]
    fn call_count_walks_the_tree() {
        let sin = Function::new("sin", FunctionKind::Sin);
        let inner = Expr::Call(Call::new(sin.clone(), vec![Expr::Const(1.0)]));
        let outer = Expr::Call(Call::new(sin, vec![inner]));
        let tree = Expr::Binary(BinaryOp::Add, Box::new(outer), Box::new(Expr::Const(2.0)));
        assert_eq!(tree.call_count(), 2);
    }
}
