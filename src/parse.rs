//! Parse pest pairs into formula AST nodes
//!
//! Variable references are validated here, against the declared input set,
//! so a bad formula fails at stage construction instead of per record.

use std::collections::HashSet;

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::errors::{FormulaError, SourceContext};
use crate::{FormulaParser, Rule};

/// Parse formula text into an AST.
///
/// Every identifier must be a member of `variables`; the caller decides
/// what is in scope (declared input attributes plus the built-ins).
pub fn parse_formula(source: &str, variables: &HashSet<String>) -> Result<Expr, FormulaError> {
    let ctx = SourceContext::new("<formula>", source);
    let mut pairs =
        FormulaParser::parse(Rule::formula, source).map_err(|e| syntax_error(&ctx, &e))?;

    // formula = SOI ~ expr ~ EOI
    let formula = pairs.next().unwrap();
    let expr = formula
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .unwrap();
    parse_expr(expr, &ctx, variables)
}

fn syntax_error(ctx: &SourceContext, error: &pest::error::Error<Rule>) -> FormulaError {
    let span = match error.location.clone() {
        InputLocation::Pos(pos) => (pos, 0).into(),
        InputLocation::Span((start, end)) => (start, end - start).into(),
    };
    FormulaError::Syntax {
        message: error.variant.message().to_string(),
        src: ctx.named_source(),
        span,
    }
}

fn parse_expr(
    pair: Pair<Rule>,
    ctx: &SourceContext,
    vars: &HashSet<String>,
) -> Result<Expr, FormulaError> {
    // expr = term ~ (add_op ~ term)*
    let mut inner = pair.into_inner();
    let mut result = parse_term(inner.next().unwrap(), ctx, vars)?;

    while let Some(op_pair) = inner.next() {
        if op_pair.as_rule() != Rule::add_op {
            continue;
        }
        let op = match op_pair.as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            _ => continue,
        };
        let rhs = parse_term(inner.next().unwrap(), ctx, vars)?;
        result = Expr::BinaryOp(Box::new(result), op, Box::new(rhs));
    }

    Ok(result)
}

fn parse_term(
    pair: Pair<Rule>,
    ctx: &SourceContext,
    vars: &HashSet<String>,
) -> Result<Expr, FormulaError> {
    // term = prefix? ~ power ~ (mul_op ~ prefix? ~ power)*
    let mut inner = pair.into_inner().peekable();

    let mut prefix: Option<UnaryOp> = None;
    if inner.peek().map(|p| p.as_rule()) == Some(Rule::prefix) {
        prefix = Some(parse_prefix(&inner.next().unwrap()));
    }

    let mut result = parse_power(inner.next().unwrap(), ctx, vars)?;
    if let Some(op) = prefix {
        result = Expr::UnaryOp(op, Box::new(result));
    }

    while let Some(op_pair) = inner.next() {
        if op_pair.as_rule() != Rule::mul_op {
            continue;
        }
        let op = match op_pair.as_str() {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            _ => continue,
        };

        let mut rhs_prefix: Option<UnaryOp> = None;
        if inner.peek().map(|p| p.as_rule()) == Some(Rule::prefix) {
            rhs_prefix = Some(parse_prefix(&inner.next().unwrap()));
        }

        let mut rhs = parse_power(inner.next().unwrap(), ctx, vars)?;
        if let Some(op) = rhs_prefix {
            rhs = Expr::UnaryOp(op, Box::new(rhs));
        }

        result = Expr::BinaryOp(Box::new(result), op, Box::new(rhs));
    }

    Ok(result)
}

fn parse_power(
    pair: Pair<Rule>,
    ctx: &SourceContext,
    vars: &HashSet<String>,
) -> Result<Expr, FormulaError> {
    // power = primary ~ (pow_op ~ prefix? ~ power)?
    let mut inner = pair.into_inner().peekable();
    let base = parse_primary(inner.next().unwrap(), ctx, vars)?;

    let Some(op_pair) = inner.next() else {
        return Ok(base);
    };
    debug_assert_eq!(op_pair.as_rule(), Rule::pow_op);

    let mut prefix: Option<UnaryOp> = None;
    if inner.peek().map(|p| p.as_rule()) == Some(Rule::prefix) {
        prefix = Some(parse_prefix(&inner.next().unwrap()));
    }

    // Recursion keeps ^ right-associative
    let mut exponent = parse_power(inner.next().unwrap(), ctx, vars)?;
    if let Some(op) = prefix {
        exponent = Expr::UnaryOp(op, Box::new(exponent));
    }

    Ok(Expr::BinaryOp(
        Box::new(base),
        BinaryOp::Pow,
        Box::new(exponent),
    ))
}

fn parse_primary(
    pair: Pair<Rule>,
    ctx: &SourceContext,
    vars: &HashSet<String>,
) -> Result<Expr, FormulaError> {
    let first = pair.into_inner().next().unwrap();
    match first.as_rule() {
        Rule::NUMBER => {
            let value = first.as_str().parse::<f64>().map_err(|e| {
                let span = first.as_span();
                FormulaError::Syntax {
                    message: format!("invalid number: {e}"),
                    src: ctx.named_source(),
                    span: (span.start(), span.end() - span.start()).into(),
                }
            })?;
            Ok(Expr::Number(value))
        }
        Rule::IDENT => {
            let name = first.as_str();
            if !vars.contains(name) {
                let span = first.as_span();
                return Err(FormulaError::UnknownVariable {
                    name: name.to_string(),
                    src: ctx.named_source(),
                    span: (span.start(), span.end() - span.start()).into(),
                });
            }
            Ok(Expr::Variable(name.to_string()))
        }
        // Parenthesized expression: "(" ~ expr ~ ")"
        Rule::expr => Ok(Expr::Paren(Box::new(parse_expr(first, ctx, vars)?))),
        rule => unreachable!("unexpected rule in primary: {rule:?}"),
    }
}

fn parse_prefix(pair: &Pair<Rule>) -> UnaryOp {
    match pair.as_str() {
        "-" => UnaryOp::Neg,
        _ => UnaryOp::Pos,
    }
}
