//! Program-backed next-state generator.

use crate::ast::Expr;
use crate::eval::{eval, eval_bool, eval_double, Value};
use crate::program::{ProgramInfo, SlotKind};
use stamina_model::{
    Behavior, Choice, CompressedState, GeneratorError, ModelType, NextStateGenerator,
    StateIndex, StateLabeling, StateResolver, VariableInformation,
};
use tracing::{trace, warn};

/// Executes an analyzed program as a next-state generator: unpacks loaded
/// states into valuations, evaluates guards, rates, and assignments directly
/// on the AST, and packs successors back into compressed states.
pub struct ProgramGenerator {
    info: ProgramInfo,
    /// Caller-registered label expressions (property predicates).
    extra_labels: Vec<(String, Expr)>,
    /// Valuation of the loaded state, in slot order.
    loaded: Option<Vec<Value>>,
}

fn lookup_value(info: &ProgramInfo, valuation: &[Value], name: &str) -> Option<Value> {
    if let Some(&slot) = info.slot_index.get(name) {
        return Some(valuation[slot]);
    }
    info.constants.get(name).copied()
}

impl ProgramGenerator {
    pub fn new(info: ProgramInfo) -> Self {
        Self {
            info,
            extra_labels: Vec::new(),
            loaded: None,
        }
    }

    /// Register an extra label expression, evaluated per state during
    /// labeling and queryable against the loaded state. The refinement
    /// controller registers the augmented property predicates this way.
    pub fn register_label_expression(&mut self, name: impl Into<String>, expr: Expr) {
        self.extra_labels.push((name.into(), expr));
    }

    pub fn info(&self) -> &ProgramInfo {
        &self.info
    }

    fn unpack(&self, state: &CompressedState) -> Vec<Value> {
        let vi = &self.info.variables;
        self.info
            .slots
            .iter()
            .map(|slot| match slot.kind {
                SlotKind::Bool(i) => Value::Bool(vi.get_boolean(state, &vi.booleans()[i])),
                SlotKind::Int(i) => Value::Int(vi.get_integer(state, &vi.integers()[i])),
            })
            .collect()
    }

    fn pack(&self, valuation: &[Value]) -> CompressedState {
        let vi = &self.info.variables;
        let mut state = CompressedState::new(vi.total_bit_count());
        for (slot, value) in self.info.slots.iter().zip(valuation) {
            match slot.kind {
                SlotKind::Bool(i) => {
                    vi.set_boolean(&mut state, &vi.booleans()[i], value.as_bool().unwrap())
                }
                SlotKind::Int(i) => {
                    vi.set_integer(&mut state, &vi.integers()[i], value.as_int().unwrap())
                }
            }
        }
        state
    }

    /// Apply one update's assignments to the loaded valuation, checking
    /// variable types and ranges.
    fn apply_assignments(
        &self,
        valuation: &[Value],
        assignments: &[crate::ast::Assignment],
    ) -> Result<Vec<Value>, GeneratorError> {
        let lookup = |name: &str| lookup_value(&self.info, valuation, name);
        let mut next = valuation.to_vec();
        for assignment in assignments {
            let value = eval(&assignment.value, &lookup)
                .map_err(|e| GeneratorError::Eval(e.to_string()))?;
            let slot = self.info.slot_index[&assignment.var];
            match (&self.info.slots[slot].kind, value) {
                (SlotKind::Bool(_), Value::Bool(_)) => next[slot] = value,
                (SlotKind::Int(i), Value::Int(n)) => {
                    let var = &self.info.variables.integers()[*i];
                    if !(var.lower_bound..=var.upper_bound).contains(&n) {
                        return Err(GeneratorError::OutOfRange {
                            name: assignment.var.clone(),
                            value: n,
                        });
                    }
                    next[slot] = value;
                }
                (_, other) => {
                    return Err(GeneratorError::Eval(format!(
                        "assignment of {} value to variable '{}'",
                        other, assignment.var
                    )));
                }
            }
        }
        Ok(next)
    }

    fn eval_label_on(&self, valuation: &[Value], name: &str) -> Option<bool> {
        let expr = self
            .extra_labels
            .iter()
            .chain(self.info.labels.iter())
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)?;
        let lookup = |n: &str| lookup_value(&self.info, valuation, n);
        match eval_bool(expr, &lookup) {
            Ok(b) => Some(b),
            Err(e) => {
                warn!(label = name, error = %e, "label evaluation failed");
                None
            }
        }
    }
}

impl NextStateGenerator for ProgramGenerator {
    fn model_type(&self) -> ModelType {
        self.info.model_type
    }

    fn variable_info(&self) -> &VariableInformation {
        &self.info.variables
    }

    fn initial_states(
        &mut self,
        resolve: &mut StateResolver<'_>,
    ) -> Result<Vec<StateIndex>, GeneratorError> {
        let packed = self.info.variables.packed_initial();
        Ok(vec![resolve(&packed)])
    }

    fn load(&mut self, state: &CompressedState) {
        self.loaded = Some(self.unpack(state));
    }

    fn expand(&mut self, resolve: &mut StateResolver<'_>) -> Result<Behavior, GeneratorError> {
        let valuation = self.loaded.clone().ok_or(GeneratorError::NoStateLoaded)?;
        let lookup = |name: &str| lookup_value(&self.info, &valuation, name);

        let mut behavior = Behavior::default();
        for command in &self.info.commands {
            let enabled =
                eval_bool(&command.guard, &lookup).map_err(|e| GeneratorError::Eval(e.to_string()))?;
            if !enabled {
                continue;
            }
            let mut choice = Choice::new(command.action.clone());
            for update in &command.updates {
                let rate = match &update.rate {
                    Some(expr) => eval_double(expr, &lookup)
                        .map_err(|e| GeneratorError::Eval(e.to_string()))?,
                    None => 1.0,
                };
                if !rate.is_finite() || rate < 0.0 {
                    return Err(GeneratorError::BadRate(rate));
                }
                if rate == 0.0 {
                    trace!(guard = ?command.span, "skipping zero-rate update");
                    continue;
                }
                let next = self.apply_assignments(&valuation, &update.assignments)?;
                let packed = self.pack(&next);
                choice.add(resolve(&packed), rate);
            }
            if !choice.transitions.is_empty() {
                behavior.choices.push(choice);
            }
        }
        Ok(behavior)
    }

    fn label(
        &self,
        states: &[CompressedState],
        initials: &[StateIndex],
        deadlocks: &[StateIndex],
    ) -> Result<StateLabeling, GeneratorError> {
        let mut labeling = StateLabeling::new(states.len());
        for (name, _) in self.extra_labels.iter().chain(self.info.labels.iter()) {
            labeling.add_label(name);
        }
        for (index, packed) in states.iter().enumerate() {
            let valuation = self.unpack(packed);
            let lookup = |n: &str| lookup_value(&self.info, &valuation, n);
            for (name, expr) in self.extra_labels.iter().chain(self.info.labels.iter()) {
                let holds =
                    eval_bool(expr, &lookup).map_err(|e| GeneratorError::Eval(e.to_string()))?;
                if holds {
                    labeling.add_label_to_state(name, index as StateIndex);
                }
            }
        }
        labeling.add_label("init");
        for &index in initials {
            labeling.add_label_to_state("init", index);
        }
        labeling.add_label("deadlock");
        for &index in deadlocks {
            labeling.add_label_to_state("deadlock", index);
        }
        Ok(labeling)
    }

    fn eval_label(&self, name: &str) -> Option<bool> {
        let valuation = self.loaded.as_ref()?;
        self.eval_label_on(valuation, name)
    }
}
