//! Tree-walking evaluator.

use super::ast::{BinaryOp, Expr, UnaryOp};
use crate::library::{self, Env};

/// Integer view of a float used by the bitwise and shift operators.
///
/// NaN maps to 0 and infinities saturate; finite values truncate toward zero.
pub fn to_int(x: f32) -> i32 {
    if x.is_nan() {
        0
    } else if x == f32::INFINITY {
        i32::MAX
    } else if x == f32::NEG_INFINITY {
        i32::MIN
    } else {
        // `as` saturates out-of-range finite values.
        x as i32
    }
}

fn truth(x: f32) -> bool {
    // NaN counts as true: it is not equal to zero.
    x != 0.0
}

fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Evaluate `expr` once. Call sites update their private state.
pub fn eval(expr: &mut Expr, env: &mut Env) -> f32 {
    match expr {
        Expr::Const(value) => *value,
        Expr::Var(var) => var.get(),
        Expr::Unary(op, a) => {
            let a = eval(a, env);
            match op {
                UnaryOp::Neg => -a,
                UnaryOp::Not => flag(a == 0.0),
                UnaryOp::BitNot => !to_int(a) as f32,
            }
        }
        Expr::Binary(op, a, b) => binary(*op, a, b, env),
        Expr::Call(call) => library::call(call, env),
    }
}

fn binary(op: BinaryOp, a: &mut Expr, b: &mut Expr, env: &mut Env) -> f32 {
    match op {
        BinaryOp::And => {
            let x = eval(a, env);
            if !truth(x) {
                return 0.0;
            }
            let y = eval(b, env);
            if truth(y) {
                y
            } else {
                0.0
            }
        }
        BinaryOp::Or => {
            let x = eval(a, env);
            if truth(x) {
                return x;
            }
            let y = eval(b, env);
            if truth(y) {
                y
            } else {
                0.0
            }
        }
        BinaryOp::Comma => {
            eval(a, env);
            eval(b, env)
        }
        BinaryOp::Assign => {
            let value = eval(b, env);
            if let Expr::Var(var) = a {
                var.set(value);
            }
            value
        }
        _ => {
            let x = eval(a, env);
            let y = eval(b, env);
            arithmetic(op, x, y)
        }
    }
}

fn arithmetic(op: BinaryOp, x: f32, y: f32) -> f32 {
    match op {
        BinaryOp::Pow => x.powf(y),
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        // Shift amounts wrap modulo 32.
        BinaryOp::Shl => to_int(x).wrapping_shl(to_int(y) as u32) as f32,
        BinaryOp::Shr => to_int(x).wrapping_shr(to_int(y) as u32) as f32,
        BinaryOp::Lt => flag(x < y),
        BinaryOp::Le => flag(x <= y),
        BinaryOp::Gt => flag(x > y),
        BinaryOp::Ge => flag(x >= y),
        BinaryOp::Eq => flag(x == y),
        BinaryOp::Ne => flag(x != y),
        BinaryOp::BitAnd => (to_int(x) & to_int(y)) as f32,
        BinaryOp::BitOr => (to_int(x) | to_int(y)) as f32,
        BinaryOp::BitXor => (to_int(x) ^ to_int(y)) as f32,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Comma | BinaryOp::Assign => f32::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{compile, VariableTable};
    use crate::library::FunctionRegistry;
    use assert_approx_eq::assert_approx_eq;

    fn run(src: &str) -> f32 {
        let vars = VariableTable::new();
        let mut expr = compile(src, &vars, &FunctionRegistry::with_builtins()).unwrap();
        eval(&mut expr, &mut Env::new(8000, 1))
    }

    #[test]
    fn to_int_handles_non_finite() {
        assert_eq!(to_int(f32::NAN), 0);
        assert_eq!(to_int(f32::INFINITY), i32::MAX);
        assert_eq!(to_int(f32::NEG_INFINITY), i32::MIN);
        assert_eq!(to_int(2.9), 2);
        assert_eq!(to_int(-2.9), -2);
        assert_eq!(to_int(1e20), i32::MAX);
    }

    #[test]
    fn arithmetic_follows_float_rules() {
        assert_eq!(run("1 + 2 * 3"), 7.0);
        assert_eq!(run("7 / 2"), 3.5);
        assert_eq!(run("7 % 3"), 1.0);
        assert_eq!(run("-7 % 3"), -1.0);
        assert_eq!(run("2 ** 10"), 1024.0);
        assert_approx_eq!(run("2 ** 0.5"), 2f32.sqrt());
        assert_eq!(run("10 - 4 - 3"), 3.0);
        assert!(run("1 / 0").is_infinite());
        assert!(run("0 / 0").is_nan());
    }

    #[test]
    fn bitwise_coerces_to_int() {
        assert_eq!(run("6 & 3"), 2.0);
        assert_eq!(run("6 | 3"), 7.0);
        assert_eq!(run("6 ^ 3"), 5.0);
        assert_eq!(run("1 << 4"), 16.0);
        assert_eq!(run("256 >> 4"), 16.0);
        assert_eq!(run("-16 >> 2"), -4.0);
        assert_eq!(run("~0"), -1.0);
        assert_eq!(run("^5"), -6.0);
        assert_eq!(run("5.9 & 7"), 5.0);
        assert_eq!(run("(0/0) | 3"), 3.0);
    }

    #[test]
    fn comparisons_yield_flags() {
        assert_eq!(run("1 < 2"), 1.0);
        assert_eq!(run("2 <= 1"), 0.0);
        assert_eq!(run("3 == 3"), 1.0);
        assert_eq!(run("3 != 3"), 0.0);
        assert_eq!(run("(0/0) == (0/0)"), 0.0);
        assert_eq!(run("!0"), 1.0);
        assert_eq!(run("!5"), 0.0);
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(run("3 && 4"), 4.0);
        assert_eq!(run("0 && 4"), 0.0);
        assert_eq!(run("3 && 0"), 0.0);
        assert_eq!(run("3 || 4"), 3.0);
        assert_eq!(run("0 || 4"), 4.0);
        assert_eq!(run("0 || 0"), 0.0);
        assert!(run("(0/0) && (0/0)").is_nan());
    }

    #[test]
    fn logical_operators_short_circuit() {
        let vars = VariableTable::new();
        let registry = FunctionRegistry::with_builtins();
        let mut env = Env::new(8000, 1);
        let mut expr = compile("0 && (q = 5)", &vars, &registry).unwrap();
        eval(&mut expr, &mut env);
        assert_eq!(vars.get("q"), Some(0.0));
        let mut expr = compile("1 || (q = 5)", &vars, &registry).unwrap();
        eval(&mut expr, &mut env);
        assert_eq!(vars.get("q"), Some(0.0));
        let mut expr = compile("1 && (q = 5)", &vars, &registry).unwrap();
        assert_eq!(eval(&mut expr, &mut env), 5.0);
        assert_eq!(vars.get("q"), Some(5.0));
    }

    #[test]
    fn assignment_writes_cell_and_returns_value() {
        let vars = VariableTable::new();
        let mut expr = compile("a = b = 3", &vars, &FunctionRegistry::with_builtins()).unwrap();
        assert_eq!(eval(&mut expr, &mut Env::new(8000, 1)), 3.0);
        assert_eq!(vars.get("a"), Some(3.0));
        assert_eq!(vars.get("b"), Some(3.0));
    }

    #[test]
    fn comma_returns_right_operand() {
        assert_eq!(run("1, 2, 3"), 3.0);
        assert_eq!(run("x = 4, x * 2"), 8.0);
    }

    #[test]
    fn nan_propagates_through_arithmetic() {
        assert!(run("(0/0) + 1").is_nan());
        assert!(run("-(0/0) * 2").is_nan());
    }

    #[test]
    fn bytebeat_formula() {
        let vars = VariableTable::new();
        let mut expr = compile("t * (t >> 8)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        vars.define("t", 1000.0);
        assert_approx_eq!(eval(&mut expr, &mut Env::new(8000, 1)), 3000.0);
    }
}
