//! Direct AST evaluation of model-language expressions.

use crate::ast::{BinOp, Expr, ExprKind, UnaryOp};
use crate::token::Span;
use std::fmt;
use thiserror::Error;

/// A runtime value: int, double, or bool. Integers promote to doubles in
/// mixed arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl Value {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Numeric view with int promotion.
    pub fn as_double(self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(n as f64),
            Value::Double(d) => Some(d),
            Value::Bool(_) => None,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown identifier '{name}' at {span}")]
    UnknownIdentifier { name: String, span: Span },

    #[error("type error at {span}: {message}")]
    TypeMismatch { message: String, span: Span },

    #[error("division by zero at {span}")]
    DivisionByZero { span: Span },
}

fn type_error(message: impl Into<String>, span: Span) -> EvalError {
    EvalError::TypeMismatch {
        message: message.into(),
        span,
    }
}

/// Evaluate an expression against a name-lookup function.
pub fn eval(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> Result<Value, EvalError> {
    match &expr.kind {
        ExprKind::Int(n) => Ok(Value::Int(*n)),
        ExprKind::Double(d) => Ok(Value::Double(*d)),
        ExprKind::Bool(b) => Ok(Value::Bool(*b)),
        ExprKind::Ident(name) => lookup(name).ok_or_else(|| EvalError::UnknownIdentifier {
            name: name.clone(),
            span: expr.span,
        }),
        ExprKind::Unary { op, operand } => {
            let value = eval(operand, lookup)?;
            match op {
                UnaryOp::Not => match value {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(type_error(
                        format!("'!' needs a bool, got {}", other.type_name()),
                        expr.span,
                    )),
                },
                UnaryOp::Neg => match value {
                    Value::Int(n) => Ok(Value::Int(-n)),
                    Value::Double(d) => Ok(Value::Double(-d)),
                    other => Err(type_error(
                        format!("'-' needs a number, got {}", other.type_name()),
                        expr.span,
                    )),
                },
            }
        }
        ExprKind::Binary { op, left, right } => {
            let l = eval(left, lookup)?;
            let r = eval(right, lookup)?;
            eval_binary(*op, l, r, expr.span)
        }
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value, span: Span) -> Result<Value, EvalError> {
    use BinOp::*;
    match op {
        Or | And => {
            let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) else {
                return Err(type_error(
                    format!(
                        "boolean operator on {} and {}",
                        l.type_name(),
                        r.type_name()
                    ),
                    span,
                ));
            };
            Ok(Value::Bool(if op == Or { a || b } else { a && b }))
        }
        Eq | Ne => {
            let equal = match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                _ => match (l.as_double(), r.as_double()) {
                    (Some(a), Some(b)) => a == b,
                    _ => {
                        return Err(type_error(
                            format!("comparing {} with {}", l.type_name(), r.type_name()),
                            span,
                        ));
                    }
                },
            };
            Ok(Value::Bool(if op == Eq { equal } else { !equal }))
        }
        Lt | Le | Gt | Ge => {
            let (Some(a), Some(b)) = (l.as_double(), r.as_double()) else {
                return Err(type_error(
                    format!("ordering {} with {}", l.type_name(), r.type_name()),
                    span,
                ));
            };
            let result = match op {
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                _ => a >= b,
            };
            Ok(Value::Bool(result))
        }
        Add | Sub | Mul => {
            if let (Value::Int(a), Value::Int(b)) = (l, r) {
                let result = match op {
                    Add => a.wrapping_add(b),
                    Sub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                };
                return Ok(Value::Int(result));
            }
            let (Some(a), Some(b)) = (l.as_double(), r.as_double()) else {
                return Err(type_error(
                    format!("arithmetic on {} and {}", l.type_name(), r.type_name()),
                    span,
                ));
            };
            let result = match op {
                Add => a + b,
                Sub => a - b,
                _ => a * b,
            };
            Ok(Value::Double(result))
        }
        Div => {
            let (Some(a), Some(b)) = (l.as_double(), r.as_double()) else {
                return Err(type_error(
                    format!("arithmetic on {} and {}", l.type_name(), r.type_name()),
                    span,
                ));
            };
            if b == 0.0 {
                return Err(EvalError::DivisionByZero { span });
            }
            Ok(Value::Double(a / b))
        }
    }
}

/// Evaluate an expression that must be a bool.
pub fn eval_bool(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> Result<bool, EvalError> {
    let value = eval(expr, lookup)?;
    value
        .as_bool()
        .ok_or_else(|| type_error(format!("expected bool, got {}", value.type_name()), expr.span))
}

/// Evaluate an expression that must be an int.
pub fn eval_int(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> Result<i64, EvalError> {
    let value = eval(expr, lookup)?;
    value
        .as_int()
        .ok_or_else(|| type_error(format!("expected int, got {}", value.type_name()), expr.span))
}

/// Evaluate an expression that must be numeric; ints promote.
pub fn eval_double(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> Result<f64, EvalError> {
    let value = eval(expr, lookup)?;
    value.as_double().ok_or_else(|| {
        type_error(
            format!("expected a number, got {}", value.type_name()),
            expr.span,
        )
    })
}
