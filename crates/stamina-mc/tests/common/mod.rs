//! Shared test support: a conforming in-memory generator over an explicit
//! rate matrix, and wiring helpers for end-to-end refinement runs.

// Each integration test binary uses its own subset of these helpers.
#![allow(dead_code)]

use stamina_lang::ast::{BinOp, Expr};
use stamina_lang::modify::{augment_model_source, augment_properties};
use stamina_lang::properties::parse_properties;
use stamina_lang::{analyze, parse_program, ProgramGenerator};
use stamina_mc::PropertyPair;
use stamina_model::{
    Behavior, BoundedUntil, Choice, CompressedState, GeneratorError, ModelType,
    NextStateGenerator, SparseMatrixBuilder, SparseModel, StateIndex, StateLabeling,
    StateResolver, VariableInformation,
};

/// A label over the matrix generator's external state ids.
#[derive(Debug, Clone)]
pub struct TestLabel {
    pub name: String,
    pub ids: Vec<usize>,
    /// Whether the synthetic absorbing state carries the label too.
    pub include_absorbing: bool,
}

/// Next-state generator backed by an explicit rate matrix, for exercising the
/// engine against known dynamics. External ids are row numbers; the packed
/// encoding is an `s` counter plus the `Absorbing` flag the engine expects.
pub struct MatrixGenerator {
    rows: Vec<Vec<(usize, f64)>>,
    initials: Vec<usize>,
    labels: Vec<TestLabel>,
    info: VariableInformation,
    loaded: Option<(usize, bool)>,
}

impl MatrixGenerator {
    pub fn new(rows: Vec<Vec<(usize, f64)>>, initials: Vec<usize>) -> Self {
        let mut info = VariableInformation::new();
        let max_id = rows.len().saturating_sub(1).max(1) as i64;
        info.add_integer("s", 0, max_id, 0);
        info.add_integer("Absorbing", 0, 1, 0);
        Self {
            rows,
            initials,
            labels: Vec::new(),
            info,
            loaded: None,
        }
    }

    /// A generator whose variable layout lacks the `Absorbing` flag, for
    /// exercising the absorbing-setup failure path.
    pub fn without_absorbing_flag(rows: Vec<Vec<(usize, f64)>>, initials: Vec<usize>) -> Self {
        let mut generator = Self::new(rows, initials);
        let mut info = VariableInformation::new();
        let max_id = generator.rows.len().saturating_sub(1).max(1) as i64;
        info.add_integer("s", 0, max_id, 0);
        generator.info = info;
        generator
    }

    pub fn with_label(mut self, label: TestLabel) -> Self {
        self.labels.push(label);
        self
    }

    pub fn pack(&self, id: usize) -> CompressedState {
        let mut state = self.info.packed_initial();
        self.info
            .set_integer(&mut state, &self.info.integers()[0], id as i64);
        state
    }

    fn unpack(&self, state: &CompressedState) -> (usize, bool) {
        let id = self.info.get_integer(state, &self.info.integers()[0]) as usize;
        let absorbing = self
            .info
            .integers()
            .get(1)
            .map(|v| self.info.get_integer(state, v) == 1)
            .unwrap_or(false);
        (id, absorbing)
    }

    /// Total exit rate of an external state, straight from the matrix.
    pub fn exit_rate(&self, id: usize) -> f64 {
        self.rows[id].iter().map(|(_, r)| r).sum()
    }

    /// Decode a packed state back to its external id and absorbing flag.
    pub fn external_id(&self, state: &CompressedState) -> (usize, bool) {
        self.unpack(state)
    }

    pub fn row(&self, id: usize) -> &[(usize, f64)] {
        &self.rows[id]
    }

    /// The full, untruncated model over the external ids (no absorbing
    /// state), for computing reference probabilities.
    pub fn full_model(&self) -> SparseModel {
        let n = self.rows.len();
        let mut builder = SparseMatrixBuilder::new();
        for (row, entries) in self.rows.iter().enumerate() {
            let mut sorted: Vec<(usize, f64)> = Vec::new();
            for &(to, rate) in entries {
                match sorted.iter_mut().find(|(t, _)| *t == to) {
                    Some((_, r)) => *r += rate,
                    None => sorted.push((to, rate)),
                }
            }
            sorted.sort_by_key(|(to, _)| *to);
            if sorted.is_empty() {
                builder.add_next_value(row as StateIndex, row as StateIndex, 1.0);
            } else {
                for (to, rate) in sorted {
                    builder.add_next_value(row as StateIndex, to as StateIndex, rate);
                }
            }
        }
        let transitions = builder.build(n);

        let mut labeling = StateLabeling::new(n);
        for label in &self.labels {
            labeling.add_label(&label.name);
            for &id in &label.ids {
                labeling.add_label_to_state(&label.name, id as StateIndex);
            }
        }
        SparseModel {
            model_type: ModelType::Ctmc,
            transitions,
            labeling,
            initial_states: self.initials.iter().map(|&i| i as StateIndex).collect(),
            reward_model: None,
        }
    }
}

impl NextStateGenerator for MatrixGenerator {
    fn model_type(&self) -> ModelType {
        ModelType::Ctmc
    }

    fn variable_info(&self) -> &VariableInformation {
        &self.info
    }

    fn initial_states(
        &mut self,
        resolve: &mut StateResolver<'_>,
    ) -> Result<Vec<StateIndex>, GeneratorError> {
        let initials = self.initials.clone();
        Ok(initials.iter().map(|&id| resolve(&self.pack(id))).collect())
    }

    fn load(&mut self, state: &CompressedState) {
        self.loaded = Some(self.unpack(state));
    }

    fn expand(&mut self, resolve: &mut StateResolver<'_>) -> Result<Behavior, GeneratorError> {
        let (id, absorbing) = self.loaded.ok_or(GeneratorError::NoStateLoaded)?;
        let mut behavior = Behavior::default();
        if absorbing {
            return Ok(behavior);
        }
        let row = self.rows[id].clone();
        if row.is_empty() {
            return Ok(behavior);
        }
        let mut choice = Choice::new(None);
        for (to, rate) in row {
            choice.add(resolve(&self.pack(to)), rate);
        }
        behavior.choices.push(choice);
        Ok(behavior)
    }

    fn label(
        &self,
        states: &[CompressedState],
        initials: &[StateIndex],
        deadlocks: &[StateIndex],
    ) -> Result<StateLabeling, GeneratorError> {
        let mut labeling = StateLabeling::new(states.len());
        for label in &self.labels {
            labeling.add_label(&label.name);
        }
        for (index, packed) in states.iter().enumerate() {
            let (id, absorbing) = self.unpack(packed);
            for label in &self.labels {
                let holds = if absorbing {
                    label.include_absorbing
                } else {
                    label.ids.contains(&id)
                };
                if holds {
                    labeling.add_label_to_state(&label.name, index as StateIndex);
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

    fn eval_label(&self, _name: &str) -> Option<bool> {
        None
    }
}

/// Wire a model and properties source through augmentation into a generator
/// and the solver-ready property pairs, the way the CLI does.
pub fn prepare(model_source: &str, properties_source: &str) -> (ProgramGenerator, Vec<PropertyPair>) {
    let augmented_source = augment_model_source(model_source);
    let program = parse_program(&augmented_source).expect("model parses");
    let info = analyze(&program).expect("model analyzes");
    let properties = parse_properties(properties_source).expect("properties parse");
    let augmented = augment_properties(&properties);

    let mut generator = ProgramGenerator::new(info);
    let mut pairs = Vec::new();
    for (index, prop) in augmented.iter().enumerate() {
        let min_label = format!("stamina_prop{index}_min");
        let max_label = format!("stamina_prop{index}_max");
        generator.register_label_expression(&min_label, prop.pmin.path.target().clone());
        generator.register_label_expression(&max_label, prop.pmax.path.target().clone());

        let left_label = prop.original.path.left().map(|left| {
            let name = format!("stamina_prop{index}_left");
            generator.register_label_expression(&name, left.clone());
            name
        });
        let refine_label = prop.original.path.left().map(|left| {
            let name = format!("stamina_prop{index}_phi");
            let phi = Expr::binary(
                BinOp::Or,
                left.clone(),
                prop.original.path.target().clone(),
            );
            generator.register_label_expression(&name, phi);
            name
        });

        let bound = prop.original.path.time_bound();
        pairs.push(PropertyPair {
            name: prop.name.clone(),
            pmin: BoundedUntil {
                left_label: left_label.clone(),
                right_label: min_label,
                time_bound: bound,
            },
            pmax: BoundedUntil {
                left_label,
                right_label: max_label,
                time_bound: bound,
            },
            refine_label,
        });
    }
    (generator, pairs)
}
