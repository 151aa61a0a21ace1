//! The next-state generator interface consumed by the exploration engine.

use crate::labeling::StateLabeling;
use crate::model::ModelType;
use crate::state::CompressedState;
use crate::variables::VariableInformation;
use crate::StateIndex;
use smallvec::SmallVec;
use thiserror::Error;

/// Callback resolving a packed successor state to its dense index.
///
/// The engine passes one of two resolvers: an inserting resolver that
/// allocates fresh indices, or a route-to-absorbing resolver that collapses
/// unknown successors into the sink. The resolver is an explicit argument of
/// every expansion call; generators must not retain it.
pub type StateResolver<'a> = dyn FnMut(&CompressedState) -> StateIndex + 'a;

/// Errors surfaced by a next-state generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("no state is loaded in the generator")]
    NoStateLoaded,

    #[error("expression evaluation failed: {0}")]
    Eval(String),

    #[error("assignment drives '{name}' outside its declared range (value {value})")]
    OutOfRange { name: String, value: i64 },

    #[error("rate expression evaluated to {0}, which is not a valid rate")]
    BadRate(f64),
}

/// One enabled choice: an optional action label and the successor
/// distribution as (index, rate) pairs. Pairs with the same target may repeat;
/// the transition accumulator merges them.
#[derive(Debug, Clone)]
pub struct Choice {
    pub action: Option<String>,
    pub transitions: SmallVec<[(StateIndex, f64); 4]>,
}

impl Choice {
    pub fn new(action: Option<String>) -> Self {
        Self {
            action,
            transitions: SmallVec::new(),
        }
    }

    pub fn add(&mut self, target: StateIndex, rate: f64) {
        self.transitions.push((target, rate));
    }

    pub fn total_rate(&self) -> f64 {
        self.transitions.iter().map(|(_, r)| r).sum()
    }
}

/// Everything the generator knows about one expanded state.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub choices: Vec<Choice>,
    pub state_rewards: SmallVec<[f64; 1]>,
}

impl Behavior {
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Total exit rate across all choices (CTMC race semantics).
    pub fn total_exit_rate(&self) -> f64 {
        self.choices.iter().map(Choice::total_rate).sum()
    }
}

/// External collaborator computing enabled transitions from a loaded packed
/// state. The engine is the only caller; all methods are synchronous.
pub trait NextStateGenerator {
    fn model_type(&self) -> ModelType;

    fn variable_info(&self) -> &VariableInformation;

    /// Total bit width of a packed state.
    fn state_size(&self) -> usize {
        self.variable_info().total_bit_count()
    }

    /// Produce all initial states, resolving each through `resolve`.
    fn initial_states(
        &mut self,
        resolve: &mut StateResolver<'_>,
    ) -> Result<Vec<StateIndex>, GeneratorError>;

    /// Stage a state for expansion.
    fn load(&mut self, state: &CompressedState);

    /// Enumerate the loaded state's choices, resolving successors through
    /// `resolve`.
    fn expand(&mut self, resolve: &mut StateResolver<'_>) -> Result<Behavior, GeneratorError>;

    /// Build the labeling for the finished model. `states` lists every packed
    /// state in index order.
    fn label(
        &self,
        states: &[CompressedState],
        initials: &[StateIndex],
        deadlocks: &[StateIndex],
    ) -> Result<StateLabeling, GeneratorError>;

    /// Evaluate a registered label expression against the loaded state.
    /// Returns `None` if no such expression is registered.
    fn eval_label(&self, name: &str) -> Option<bool>;

    /// Renumber any state indices the generator has retained. The default
    /// implementation assumes the generator keeps none.
    fn remap_state_ids(&mut self, _remap: &dyn Fn(StateIndex) -> StateIndex) {}
}
