//! The expression language: tokenizer, parser/binder, AST and evaluator.
//!
//! ```text
//! source → Lexer → Parser (binds names) → Expr → eval() per sample
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod vars;

pub use ast::{BinaryOp, Call, Expr, UnaryOp};
pub use error::{CompileError, ErrorKind, LexError};
pub use eval::{eval, to_int};
pub use lexer::Lexer;
pub use parser::Parser;
pub use vars::{VarRef, VariableTable};

use crate::library::FunctionRegistry;

/// Compile `source` against a persistent variable table.
///
/// Variables first mentioned by `source` are added to `vars` only when the
/// whole program compiles.
pub fn compile(
    source: &str,
    vars: &VariableTable,
    functions: &FunctionRegistry,
) -> Result<Expr, CompileError> {
    let mut scope = vars.scope();
    let expr = Parser::new(functions, &mut scope).parse(source)?;
    scope.commit();
    Ok(expr)
}
