//! Semantic analysis: constant evaluation and variable bit layout.

use crate::ast::{Command, ConstType, Expr, Program, VarKind};
use crate::eval::{eval, eval_bool, eval_int, EvalError, Value};
use crate::token::Span;
use ahash::AHashMap;
use stamina_model::{ModelType, VariableInformation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("duplicate constant '{name}' at {span}")]
    DuplicateConstant { name: String, span: Span },

    #[error("duplicate variable '{name}' at {span}")]
    DuplicateVariable { name: String, span: Span },

    #[error("duplicate label \"{name}\" at {span}")]
    DuplicateLabel { name: String, span: Span },

    #[error("constant '{name}' at {span} does not match its declared type")]
    ConstantType { name: String, span: Span },

    #[error("variable '{name}' has empty range [{low}..{high}]")]
    EmptyRange { name: String, low: i64, high: i64 },

    #[error("initial value {init} of '{name}' is outside [{low}..{high}]")]
    InitOutOfRange {
        name: String,
        init: i64,
        low: i64,
        high: i64,
    },

    #[error("assignment to undeclared variable '{name}' at {span}")]
    UnknownAssignTarget { name: String, span: Span },

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// How a declaration-ordered variable slot maps into [`VariableInformation`].
#[derive(Debug, Clone)]
pub enum SlotKind {
    /// Index into the boolean variable table.
    Bool(usize),
    /// Index into the integer variable table.
    Int(usize),
}

#[derive(Debug, Clone)]
pub struct VarSlot {
    pub name: String,
    pub kind: SlotKind,
}

/// The analyzed program: evaluated constants, variable layout, and the
/// flattened command list the generator executes.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub model_type: ModelType,
    pub constants: AHashMap<String, Value>,
    pub variables: VariableInformation,
    /// Variables in declaration order across all modules.
    pub slots: Vec<VarSlot>,
    pub slot_index: AHashMap<String, usize>,
    /// Commands from all modules, in order. Modules interleave; action names
    /// become choice labels.
    pub commands: Vec<Command>,
    pub labels: Vec<(String, Expr)>,
}

/// Analyze a parsed program into the form the generator consumes.
pub fn analyze(program: &Program) -> Result<ProgramInfo, AnalysisError> {
    let mut constants: AHashMap<String, Value> = AHashMap::new();
    for decl in &program.constants {
        if constants.contains_key(&decl.name) {
            return Err(AnalysisError::DuplicateConstant {
                name: decl.name.clone(),
                span: decl.span,
            });
        }
        let lookup = |name: &str| constants.get(name).copied();
        let value = eval(&decl.value, &lookup)?;
        let value = match (decl.ty, value) {
            (ConstType::Int, Value::Int(_)) => value,
            (ConstType::Bool, Value::Bool(_)) => value,
            (ConstType::Double, Value::Double(_)) => value,
            // Int literals are fine for double constants.
            (ConstType::Double, Value::Int(n)) => Value::Double(n as f64),
            _ => {
                return Err(AnalysisError::ConstantType {
                    name: decl.name.clone(),
                    span: decl.span,
                });
            }
        };
        constants.insert(decl.name.clone(), value);
    }

    let mut variables = VariableInformation::new();
    let mut slots = Vec::new();
    let mut slot_index: AHashMap<String, usize> = AHashMap::new();
    let const_lookup = |name: &str| constants.get(name).copied();
    for module in &program.modules {
        for var in &module.variables {
            if slot_index.contains_key(&var.name) || constants.contains_key(&var.name) {
                return Err(AnalysisError::DuplicateVariable {
                    name: var.name.clone(),
                    span: var.span,
                });
            }
            let kind = match &var.kind {
                VarKind::Bool { init } => {
                    let init = eval_bool(init, &const_lookup)?;
                    let idx = variables.booleans().len();
                    variables.add_boolean(var.name.clone(), init);
                    SlotKind::Bool(idx)
                }
                VarKind::Int { low, high, init } => {
                    let low = eval_int(low, &const_lookup)?;
                    let high = eval_int(high, &const_lookup)?;
                    let init = eval_int(init, &const_lookup)?;
                    if low > high {
                        return Err(AnalysisError::EmptyRange {
                            name: var.name.clone(),
                            low,
                            high,
                        });
                    }
                    if !(low..=high).contains(&init) {
                        return Err(AnalysisError::InitOutOfRange {
                            name: var.name.clone(),
                            init,
                            low,
                            high,
                        });
                    }
                    let idx = variables.integers().len();
                    variables.add_integer(var.name.clone(), low, high, init);
                    SlotKind::Int(idx)
                }
            };
            slot_index.insert(var.name.clone(), slots.len());
            slots.push(VarSlot {
                name: var.name.clone(),
                kind,
            });
        }
    }

    let mut commands = Vec::new();
    for module in &program.modules {
        for command in &module.commands {
            for update in &command.updates {
                for assignment in &update.assignments {
                    if !slot_index.contains_key(&assignment.var) {
                        return Err(AnalysisError::UnknownAssignTarget {
                            name: assignment.var.clone(),
                            span: assignment.span,
                        });
                    }
                }
            }
            commands.push(command.clone());
        }
    }

    let mut labels = Vec::new();
    for decl in &program.labels {
        if labels.iter().any(|(name, _)| name == &decl.name) {
            return Err(AnalysisError::DuplicateLabel {
                name: decl.name.clone(),
                span: decl.span,
            });
        }
        labels.push((decl.name.clone(), decl.expr.clone()));
    }

    Ok(ProgramInfo {
        model_type: program.model_kind.to_model_type(),
        constants,
        variables,
        slots,
        slot_index,
        commands,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn test_analyze_layout() {
        let program = parse_program(
            "ctmc\n\
             const int N = 2 + 3;\n\
             const double rate = N * 2;\n\
             module m\n\
               s : [0..N] init N - 5;\n\
               b : bool init true;\n\
             endmodule\n",
        )
        .unwrap();
        let info = analyze(&program).unwrap();
        assert_eq!(info.model_type, ModelType::Ctmc);
        assert_eq!(info.constants["N"], Value::Int(5));
        assert_eq!(info.constants["rate"], Value::Double(10.0));
        assert_eq!(info.slots.len(), 2);
        assert_eq!(info.variables.integers()[0].upper_bound, 5);
        assert_eq!(info.variables.booleans()[0].init, true);
        // 3 bits for [0..5] plus the boolean.
        assert_eq!(info.variables.total_bit_count(), 4);
    }

    #[test]
    fn test_init_out_of_range() {
        let program =
            parse_program("ctmc module m s : [0..3] init 7; endmodule").unwrap();
        assert!(matches!(
            analyze(&program),
            Err(AnalysisError::InitOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_assignment_target() {
        let program = parse_program(
            "ctmc module m s : [0..1] init 0; [] s = 0 -> (t'=1); endmodule",
        )
        .unwrap();
        assert!(matches!(
            analyze(&program),
            Err(AnalysisError::UnknownAssignTarget { .. })
        ));
    }

    #[test]
    fn test_duplicate_variable() {
        let program = parse_program(
            "ctmc module a s : [0..1] init 0; endmodule module b s : bool init false; endmodule",
        )
        .unwrap();
        assert!(matches!(
            analyze(&program),
            Err(AnalysisError::DuplicateVariable { .. })
        ));
    }
}
