//! Operator-precedence parser and binder.
//!
//! Builds an [`Expr`] tree from the token stream with two explicit stacks
//! (operands and operators) plus a frame per open function call. Names are
//! bound eagerly: a word followed by `(` must be a registered function, any
//! other word resolves to (or implicitly declares) a variable.

use super::ast::{BinaryOp, Call, Expr, UnaryOp, UNARY_PRECEDENCE};
use super::error::CompileError;
use super::lexer::Lexer;
use super::token::TokenKind;
use super::vars::Scope;
use crate::library::{Function, FunctionRegistry};

/// Upper bound on nesting: operator stack depth, open calls and the depth
/// of the finished tree.
pub const MAX_DEPTH: usize = 1024;

/// Entries of the operator stack.
#[derive(Debug)]
enum Pending {
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// A grouping `(`.
    Group,
    /// Function name waiting for its `(`.
    Function(Function),
    /// The `(` that opened a call.
    CallOpen,
}

impl Pending {
    fn precedence(&self) -> Option<u8> {
        match self {
            Pending::Unary(_) => Some(UNARY_PRECEDENCE),
            Pending::Binary(op) => Some(op.precedence()),
            _ => None,
        }
    }
}

/// Bookkeeping for one open call.
struct CallFrame {
    /// Operator stack depth right after the call's `(` was pushed.
    ops_depth: usize,
    /// Operand stack depth when the call's `(` was seen.
    operands_depth: usize,
    args: Vec<Expr>,
    /// Deepest argument so far.
    depth: usize,
}

pub struct Parser<'a, 'v> {
    registry: &'a FunctionRegistry,
    scope: &'a mut Scope<'v>,
    /// Finished subtrees with their depth.
    operands: Vec<(Expr, usize)>,
    operators: Vec<Pending>,
    frames: Vec<CallFrame>,
}

impl<'a, 'v> Parser<'a, 'v> {
    pub fn new(registry: &'a FunctionRegistry, scope: &'a mut Scope<'v>) -> Self {
        Self {
            registry,
            scope,
            operands: Vec::new(),
            operators: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Parse a complete program. Empty input parses as the constant 0.
    pub fn parse(mut self, source: &str) -> Result<Expr, CompileError> {
        let mut lexer = Lexer::new(source);
        let end = source.chars().count();
        let mut word: Option<(String, usize)> = None;

        while let Some(token) = lexer.next_token()? {
            let pos = token.pos;
            // A word directly followed by `(` names a function; that `(`
            // opens its argument list rather than a group.
            let mut opens_call = false;

            if let Some((name, name_pos)) = word.take() {
                if token.kind == TokenKind::Open {
                    let function = self.registry.lookup(&name).ok_or_else(|| {
                        CompileError::syntax(format!("unknown function '{name}'"), name_pos)
                    })?;
                    self.push_operator(Pending::Function(function), name_pos)?;
                    opens_call = true;
                } else {
                    let var = self.resolve(&name, name_pos)?;
                    self.operands.push((var, 1));
                }
            }

            match token.kind {
                TokenKind::Open if opens_call => {
                    self.push_operator(Pending::CallOpen, pos)?;
                    if self.frames.len() >= MAX_DEPTH {
                        return Err(CompileError::resource("calls nested too deeply", pos));
                    }
                    self.frames.push(CallFrame {
                        ops_depth: self.operators.len(),
                        operands_depth: self.operands.len(),
                        args: Vec::new(),
                        depth: 0,
                    });
                }
                TokenKind::Open => self.push_operator(Pending::Group, pos)?,
                TokenKind::Close => self.close(pos)?,
                TokenKind::Number(text) => {
                    let value: f32 = text.parse().map_err(|_| {
                        CompileError::syntax(format!("invalid number '{text}'"), pos)
                    })?;
                    self.operands.push((Expr::Const(value), 1));
                }
                TokenKind::Word(name) => {
                    word = Some((name, pos));
                }
                TokenKind::Unary(op) => self.push_operator(Pending::Unary(op), pos)?,
                TokenKind::Binary(op) => self.operator(op, pos)?,
            }
        }

        if let Some((name, name_pos)) = word.take() {
            let var = self.resolve(&name, name_pos)?;
            self.operands.push((var, 1));
        }

        while let Some(pending) = self.operators.pop() {
            match pending {
                Pending::Unary(_) | Pending::Binary(_) => self.reduce(pending, end)?,
                _ => return Err(CompileError::syntax("unbalanced parenthesis", end)),
            }
        }

        match self.operands.len() {
            0 => Ok(Expr::default()),
            1 => Ok(self.operands.pop().map(|(expr, _)| expr).unwrap_or_default()),
            _ => Err(CompileError::syntax("dangling operand", end)),
        }
    }

    fn resolve(&mut self, name: &str, pos: usize) -> Result<Expr, CompileError> {
        self.scope
            .resolve(name)
            .map(Expr::Var)
            .ok_or_else(|| CompileError::syntax(format!("invalid variable name '{name}'"), pos))
    }

    /// Push a combined node, rejecting trees deeper than [`MAX_DEPTH`].
    fn push_operand(&mut self, expr: Expr, depth: usize, pos: usize) -> Result<(), CompileError> {
        if depth > MAX_DEPTH {
            return Err(CompileError::resource("expression nested too deeply", pos));
        }
        self.operands.push((expr, depth));
        Ok(())
    }

    fn push_operator(&mut self, pending: Pending, pos: usize) -> Result<(), CompileError> {
        if self.operators.len() >= MAX_DEPTH {
            return Err(CompileError::resource("expression nested too deeply", pos));
        }
        self.operators.push(pending);
        Ok(())
    }

    /// Handle a binary operator token.
    fn operator(&mut self, op: BinaryOp, pos: usize) -> Result<(), CompileError> {
        loop {
            if op == BinaryOp::Comma && matches!(self.operators.last(), Some(Pending::CallOpen)) {
                return self.collect_argument(pos);
            }
            let top = match self.operators.last().and_then(Pending::precedence) {
                Some(top) => top,
                None => break,
            };
            let prec = op.precedence();
            let reduce = (op.is_left_assoc() && prec <= top) || prec < top;
            if !reduce {
                break;
            }
            if let Some(pending) = self.operators.pop() {
                self.reduce(pending, pos)?;
            }
        }
        self.push_operator(Pending::Binary(op), pos)
    }

    /// A comma directly inside a call: the operand just completed becomes
    /// the next argument.
    fn collect_argument(&mut self, pos: usize) -> Result<(), CompileError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| CompileError::syntax("argument separator outside a call", pos))?;
        if self.operands.len() <= frame.operands_depth {
            return Err(CompileError::syntax("missing argument", pos));
        }
        if let Some((arg, depth)) = self.operands.pop() {
            frame.args.push(arg);
            frame.depth = frame.depth.max(depth);
        }
        Ok(())
    }

    /// Handle `)`.
    fn close(&mut self, pos: usize) -> Result<(), CompileError> {
        let floor = self.frames.last().map_or(0, |f| f.ops_depth);
        while self.operators.len() > floor
            && matches!(self.operators.last(), Some(Pending::Unary(_) | Pending::Binary(_)))
        {
            if let Some(pending) = self.operators.pop() {
                self.reduce(pending, pos)?;
            }
        }

        match self.operators.pop() {
            Some(Pending::Group) => Ok(()),
            Some(Pending::CallOpen) => {
                let function = match self.operators.pop() {
                    Some(Pending::Function(function)) => function,
                    _ => return Err(CompileError::syntax("malformed call", pos)),
                };
                let mut frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| CompileError::syntax("malformed call", pos))?;
                if self.operands.len() > frame.operands_depth {
                    if let Some((arg, depth)) = self.operands.pop() {
                        frame.args.push(arg);
                        frame.depth = frame.depth.max(depth);
                    }
                }
                self.push_operand(Expr::Call(Call::new(function, frame.args)), frame.depth + 1, pos)
            }
            _ => Err(CompileError::syntax("unbalanced parenthesis", pos)),
        }
    }

    /// Pop operands for `pending` and push the combined node.
    fn reduce(&mut self, pending: Pending, pos: usize) -> Result<(), CompileError> {
        match pending {
            Pending::Unary(op) => {
                let (a, depth) = self
                    .operands
                    .pop()
                    .ok_or_else(|| CompileError::syntax("missing operand", pos))?;
                self.push_operand(Expr::Unary(op, Box::new(a)), depth + 1, pos)?;
            }
            Pending::Binary(op) => {
                let ((b, db), (a, da)) = match (self.operands.pop(), self.operands.pop()) {
                    (Some(b), Some(a)) => (b, a),
                    _ => return Err(CompileError::syntax("missing operand", pos)),
                };
                if op == BinaryOp::Assign && !matches!(a, Expr::Var(_)) {
                    return Err(CompileError::syntax(
                        "left side of assignment must be a variable",
                        pos,
                    ));
                }
                self.push_operand(Expr::Binary(op, Box::new(a), Box::new(b)), da.max(db) + 1, pos)?;
            }
            _ => return Err(CompileError::syntax("unbalanced parenthesis", pos)),
        }
        Ok(())
    }
}
