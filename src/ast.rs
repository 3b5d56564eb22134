//! Abstract syntax tree for compiled formulas

/// A formula expression over named variables
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// Named variable, resolved against per-point bindings
    Variable(String),
    /// Binary operation
    BinaryOp(Box<Expr>, BinaryOp, Box<Expr>),
    /// Unary prefix: -x, +x
    UnaryOp(UnaryOp, Box<Expr>),
    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Right-associative exponentiation
    Pow,
}

/// Unary prefix operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

impl Expr {
    /// Walk the tree and collect every variable name referenced.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => names.push(name),
            Expr::BinaryOp(lhs, _, rhs) => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Expr::UnaryOp(_, inner) | Expr::Paren(inner) => inner.collect_variables(names),
        }
    }
}
