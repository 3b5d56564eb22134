//! Formula evaluation against per-point variable bindings

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Evaluate an expression.
///
/// Variables resolve from `bindings`; a name with no binding evaluates to
/// NaN. Arithmetic follows IEEE-754: division by zero yields an infinity,
/// NaN operands poison the result. Evaluation never fails.
pub fn eval_expr(bindings: &HashMap<String, f64>, expr: &Expr) -> f64 {
    match expr {
        Expr::Number(n) => *n,
        Expr::Variable(name) => bindings.get(name).copied().unwrap_or(f64::NAN),
        Expr::BinaryOp(lhs, op, rhs) => {
            let l = eval_expr(bindings, lhs);
            let r = eval_expr(bindings, rhs);
            match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Pow => l.powf(r),
            }
        }
        Expr::UnaryOp(op, inner) => {
            let v = eval_expr(bindings, inner);
            match op {
                UnaryOp::Neg => -v,
                UnaryOp::Pos => v,
            }
        }
        Expr::Paren(inner) => eval_expr(bindings, inner),
    }
}
