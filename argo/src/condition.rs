//! Condition evaluator
//!
//! Evaluates `decide` branch conditions of the form
//! `<operand> <operator> <operand>` against the interpreter context.
//! Grounded on the dispatch shape of a rule evaluator, simplified to
//! spec.md's single-comparison grammar: no boolean composition, no regex
//! matching beyond the literal operators below.

use crate::context::Context;
use crate::error::{ArgoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    fn parse(tok: &str) -> Option<Self> {
        match tok {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            _ => None,
        }
    }
}

/// Resolve one operand: a `context.`-prefixed path (with optional
/// `.length` suffix), or else the token taken as a literal string/number.
fn resolve_operand(token: &str, ctx: &Context) -> String {
    if let Some(path) = token.strip_prefix("context.") {
        if let Some(base) = path.strip_suffix(".length") {
            return ctx.len_of(base).map(|n| n.to_string()).unwrap_or_default();
        }
        return ctx.get(path).unwrap_or("").to_string();
    }
    token.trim_matches('"').to_string()
}

/// Evaluate `"<operand> <operator> <operand>"` against `ctx`.
///
/// Numeric comparison is used when both resolved operands parse as
/// `f64`; otherwise operands are compared as strings (only `==`/`!=` are
/// meaningful for strings, per spec.md §4.5 — other operators on
/// non-numeric operands always evaluate false).
pub fn evaluate(condition: &str, ctx: &Context) -> Result<bool> {
    let tokens: Vec<&str> = condition.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(ArgoError::ProtocolFormat(format!(
            "condition must have exactly 3 tokens: {:?}",
            condition
        )));
    }
    let (lhs_tok, op_tok, rhs_tok) = (tokens[0], tokens[1], tokens[2]);
    let op = Operator::parse(op_tok)
        .ok_or_else(|| ArgoError::ProtocolFormat(format!("unknown operator: {}", op_tok)))?;

    let lhs = resolve_operand(lhs_tok, ctx);
    let rhs = resolve_operand(rhs_tok, ctx);

    if let (Ok(l), Ok(r)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        return Ok(match op {
            Operator::Eq => l == r,
            Operator::Ne => l != r,
            Operator::Gt => l > r,
            Operator::Gte => l >= r,
            Operator::Lt => l < r,
            Operator::Lte => l <= r,
        });
    }

    Ok(match op {
        Operator::Eq => lhs == rhs,
        Operator::Ne => lhs != rhs,
        _ => false,
    })
}
