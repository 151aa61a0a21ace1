//! Rendering of expressions and properties back to source text.

use crate::ast::{BinOp, Expr, ExprKind, UnaryOp};
use crate::properties::{PathFormula, Property};

fn prec(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
        BinOp::Add | BinOp::Sub => 4,
        BinOp::Mul | BinOp::Div => 5,
    }
}

fn op_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "|",
        BinOp::And => "&",
        BinOp::Eq => "=",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
    }
}

/// Whether a child expression needs parentheses under `parent`.
fn needs_parens(parent: BinOp, child: BinOp, right_side: bool) -> bool {
    let p = prec(parent);
    let c = prec(child);
    if c != p {
        return c < p;
    }
    match parent {
        // Left-associative, order-sensitive.
        BinOp::Sub | BinOp::Div => right_side,
        // Comparisons do not chain.
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => true,
        _ => false,
    }
}

/// Format a double so it re-lexes as a double literal.
fn fmt_double(d: f64) -> String {
    if d.is_finite() && d == d.trunc() && d.abs() < 1e15 {
        format!("{d:.1}")
    } else {
        format!("{d}")
    }
}

/// Render an expression with minimal parentheses.
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    render(expr, &mut out);
    out
}

fn render(expr: &Expr, out: &mut String) {
    match &expr.kind {
        ExprKind::Int(n) => out.push_str(&n.to_string()),
        ExprKind::Double(d) => out.push_str(&fmt_double(*d)),
        ExprKind::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::Unary { op, operand } => {
            out.push_str(match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
            });
            if matches!(operand.kind, ExprKind::Binary { .. }) {
                out.push('(');
                render(operand, out);
                out.push(')');
            } else {
                render(operand, out);
            }
        }
        ExprKind::Binary { op, left, right } => {
            render_child(*op, left, false, out);
            out.push(' ');
            out.push_str(op_text(*op));
            out.push(' ');
            render_child(*op, right, true, out);
        }
    }
}

fn render_child(parent: BinOp, child: &Expr, right_side: bool, out: &mut String) {
    let parens = match &child.kind {
        ExprKind::Binary { op, .. } => needs_parens(parent, *op, right_side),
        _ => false,
    };
    if parens {
        out.push('(');
        render(child, out);
        out.push(')');
    } else {
        render(child, out);
    }
}

fn path_operand(expr: &Expr) -> String {
    if matches!(expr.kind, ExprKind::Binary { .. }) {
        format!("({})", expr_to_string(expr))
    } else {
        expr_to_string(expr)
    }
}

/// Render a property back to source text.
pub fn property_to_string(property: &Property) -> String {
    let body = match &property.path {
        PathFormula::Eventually { bound, target } => {
            format!("F<={} {}", fmt_double(*bound), path_operand(target))
        }
        PathFormula::Until { left, bound, right } => format!(
            "{} U<={} {}",
            path_operand(left),
            fmt_double(*bound),
            path_operand(right)
        ),
    };
    match &property.name {
        Some(name) => format!("\"{name}\": P=? [ {body} ]"),
        None => format!("P=? [ {body} ]"),
    }
}
