//! Formula engine capability boundary
//!
//! The calculator talks to its expression evaluator through these traits,
//! so alternate engines can be swapped in without touching the transform.

use std::collections::{HashMap, HashSet};

use crate::ast::Expr;
use crate::errors::FormulaError;
use crate::{eval, parse};

/// A formula compiled against a fixed variable set.
pub trait CompiledFormula {
    /// Evaluate with per-point bindings. Unbound variables are NaN.
    fn evaluate(&self, bindings: &HashMap<String, f64>) -> f64;
}

/// Compiles formula text once; the result is evaluated per record.
pub trait FormulaEngine {
    /// Compile `formula` against the declared variable set.
    ///
    /// Referencing a name outside `variables` is a compile error, not a
    /// per-record one.
    fn compile(
        &self,
        formula: &str,
        variables: &HashSet<String>,
    ) -> Result<Box<dyn CompiledFormula>, FormulaError>;
}

/// The default engine, backed by the pest grammar in `formula.pest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEngine;

impl FormulaEngine for ExprEngine {
    fn compile(
        &self,
        formula: &str,
        variables: &HashSet<String>,
    ) -> Result<Box<dyn CompiledFormula>, FormulaError> {
        let ast = parse::parse_formula(formula, variables)?;
        Ok(Box::new(CompiledExpr { ast }))
    }
}

struct CompiledExpr {
    ast: Expr,
}

impl CompiledFormula for CompiledExpr {
    fn evaluate(&self, bindings: &HashMap<String, f64>) -> f64 {
        eval::eval_expr(bindings, &self.ast)
    }
}
