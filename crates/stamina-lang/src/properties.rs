//! Parsing of property files.
//!
//! One `P=?[...]` query per property, optionally named:
//!
//! ```text
//! "p1": P=? [ F<=1.0 s = 10 ]
//! P=? [ s < 5 U<=2.5 s = 10 ]
//! ```

use crate::ast::Expr;
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};
use crate::token::TokenKind;

/// A probability query over a time-bounded path formula.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: Option<String>,
    pub path: PathFormula,
}

#[derive(Debug, Clone)]
pub enum PathFormula {
    /// `F<=t target`
    Eventually { bound: f64, target: Expr },
    /// `left U<=t right`
    Until { left: Expr, bound: f64, right: Expr },
}

impl PathFormula {
    pub fn time_bound(&self) -> f64 {
        match self {
            PathFormula::Eventually { bound, .. } | PathFormula::Until { bound, .. } => *bound,
        }
    }

    /// The target (right-hand) state predicate.
    pub fn target(&self) -> &Expr {
        match self {
            PathFormula::Eventually { target, .. } => target,
            PathFormula::Until { right, .. } => right,
        }
    }

    /// The left-hand state predicate, if this is a genuine until.
    pub fn left(&self) -> Option<&Expr> {
        match self {
            PathFormula::Eventually { .. } => None,
            PathFormula::Until { left, .. } => Some(left),
        }
    }
}

/// Parse a property file: comments and blank lines are skipped by the lexer,
/// each remaining query is parsed in order.
pub fn parse_properties(source: &str) -> Result<Vec<Property>, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let mut properties = Vec::new();
    while !parser.at_eof() {
        properties.push(property(&mut parser)?);
    }
    Ok(properties)
}

fn property(parser: &mut Parser) -> Result<Property, ParseError> {
    let name = match parser.peek().kind.clone() {
        TokenKind::StringLit(name) => {
            parser.advance();
            parser.expect(&TokenKind::Colon)?;
            Some(name)
        }
        _ => None,
    };

    let (head, _) = parser.expect_ident()?;
    if head != "P" {
        return Err(parser.unexpected("'P=?' query"));
    }
    parser.expect(&TokenKind::Eq)?;
    parser.expect(&TokenKind::Question)?;
    parser.expect(&TokenKind::LBracket)?;
    let path = path_formula(parser)?;
    parser.expect(&TokenKind::RBracket)?;

    Ok(Property { name, path })
}

fn path_formula(parser: &mut Parser) -> Result<PathFormula, ParseError> {
    // `F<=t φ`; the eventually operator is only recognized when immediately
    // followed by its bound, so a state variable named F stays usable.
    if matches!(parser.peek().kind, TokenKind::Ident(ref name) if name == "F")
        && parser.peek_at(1) == &TokenKind::Le
    {
        parser.advance();
        parser.expect(&TokenKind::Le)?;
        let bound = time_bound(parser)?;
        let target = parser.expr()?;
        return Ok(PathFormula::Eventually { bound, target });
    }

    let left = parser.expr()?;
    let (op, _) = parser.expect_ident()?;
    if op != "U" {
        return Err(parser.unexpected("'U' path operator"));
    }
    parser.expect(&TokenKind::Le)?;
    let bound = time_bound(parser)?;
    let right = parser.expr()?;
    Ok(PathFormula::Until { left, bound, right })
}

fn time_bound(parser: &mut Parser) -> Result<f64, ParseError> {
    let bound = match parser.peek().kind {
        TokenKind::IntLit(n) => n as f64,
        TokenKind::DoubleLit(d) => d,
        _ => return Err(parser.unexpected("time bound")),
    };
    parser.advance();
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    #[test]
    fn test_parse_eventually() {
        let props = parse_properties("P=? [ F<=1.0 s = 2 ]").unwrap();
        assert_eq!(props.len(), 1);
        assert!(props[0].name.is_none());
        match &props[0].path {
            PathFormula::Eventually { bound, target } => {
                assert_eq!(*bound, 1.0);
                assert!(matches!(target.kind, ExprKind::Binary { .. }));
            }
            other => panic!("expected eventually, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_named_until() {
        let props =
            parse_properties("// comment\n\"safe\": P=? [ s < 3 U<=2 s = 3 ]\n").unwrap();
        assert_eq!(props[0].name.as_deref(), Some("safe"));
        match &props[0].path {
            PathFormula::Until { bound, .. } => assert_eq!(*bound, 2.0),
            other => panic!("expected until, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_multiple() {
        let props = parse_properties(
            "P=? [ F<=1.0 x = 1 ]\nP=? [ F<=2.0 x = 2 ]\n// done\n",
        )
        .unwrap();
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_reject_unbounded() {
        assert!(parse_properties("P=? [ F x = 1 ]").is_err());
    }

    #[test]
    fn test_reject_non_probability_query() {
        assert!(parse_properties("S=? [ x = 1 ]").is_err());
    }
}
