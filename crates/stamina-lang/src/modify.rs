//! Model and property augmentation for truncation bookkeeping.
//!
//! The engine needs one fresh boolean variable in the model to mark the
//! synthetic absorbing state, and two derived variants of every property that
//! respectively exclude and include that state. Both transformations happen
//! here, before anything is handed to the builder.

use crate::ast::{BinOp, Expr, ExprKind};
use crate::pretty::property_to_string;
use crate::properties::{PathFormula, Property};
use crate::token::Span;

/// Name of the injected boolean variable. The engine locates it through the
/// generator's variable information.
pub const ABSORBING_VARIABLE: &str = "Absorbing";

/// Name of the injected module holding the variable. The module has no
/// commands; the engine itself drives the bit.
pub const ABSORBING_MODULE: &str = "Absorbing_Def_STAMINA";

/// Append the absorbing-variable module to the model source. The result is
/// reparsed like any other model file.
pub fn augment_model_source(source: &str) -> String {
    format!(
        "{source}\n\nmodule {ABSORBING_MODULE}\n\n\t{ABSORBING_VARIABLE} : [0..1] init 0;\n\nendmodule\n"
    )
}

/// `Absorbing = value`, with dummy spans (synthesized node).
fn absorbing_equals(value: i64) -> Expr {
    Expr::binary(
        BinOp::Eq,
        Expr::new(ExprKind::Ident(ABSORBING_VARIABLE.to_string()), Span::dummy()),
        Expr::new(ExprKind::Int(value), Span::dummy()),
    )
}

fn with_target(property: &Property, target: Expr) -> Property {
    let path = match &property.path {
        PathFormula::Eventually { bound, .. } => PathFormula::Eventually {
            bound: *bound,
            target,
        },
        PathFormula::Until { left, bound, .. } => PathFormula::Until {
            left: left.clone(),
            bound: *bound,
            right: target,
        },
    };
    Property {
        name: property.name.clone(),
        path,
    }
}

/// Derive the Pmin/Pmax property pair: the target predicate conjoined with
/// `Absorbing = 0`, respectively disjoined with `Absorbing = 1`.
pub fn augment_property(property: &Property) -> (Property, Property) {
    let target = property.path.target().clone();
    let pmin = with_target(
        property,
        Expr::binary(BinOp::And, target.clone(), absorbing_equals(0)),
    );
    let pmax = with_target(
        property,
        Expr::binary(BinOp::Or, target, absorbing_equals(1)),
    );
    (pmin, pmax)
}

/// One original property with its derived pair.
#[derive(Debug, Clone)]
pub struct AugmentedProperty {
    /// Display name: the declared name or a positional fallback.
    pub name: String,
    pub original: Property,
    pub pmin: Property,
    pub pmax: Property,
}

/// Augment a whole property list, assigning positional names where none were
/// declared.
pub fn augment_properties(properties: &[Property]) -> Vec<AugmentedProperty> {
    properties
        .iter()
        .enumerate()
        .map(|(index, property)| {
            let (pmin, pmax) = augment_property(property);
            let name = property
                .name
                .clone()
                .unwrap_or_else(|| format!("property_{index}"));
            AugmentedProperty {
                name,
                original: property.clone(),
                pmin,
                pmax,
            }
        })
        .collect()
}

/// Render the augmented property list as a properties file.
pub fn render_augmented(properties: &[AugmentedProperty]) -> String {
    let mut out = String::new();
    for prop in properties {
        out.push_str(&property_to_string(&prop.pmin));
        out.push_str(" // Property for Pmin\n");
        out.push_str(&property_to_string(&prop.pmax));
        out.push_str(" // Property for Pmax\n");
    }
    out
}
