//! The per-iteration exploration engine.

use crate::absorbing::{AbsorbingState, ABSORBING_INDEX};
use crate::errors::{BuildError, BuildResult};
use crate::frontier::{Discipline, Frontier};
use crate::index_map::StateIndexMap;
use crate::options::BuildConfig;
use crate::transitions::TransitionAccumulator;
use stamina_model::{CompressedState, ModelType, NextStateGenerator, StateIndex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress-message frequency in explored states.
const MSG_FREQUENCY: usize = 100_000;

/// How one call to [`Explorer::explore`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreOutcome {
    /// The frontier drained.
    Complete,
    /// The cancellation flag was raised; the iteration is incomplete.
    Cancelled,
}

/// On-the-fly truncated state-space construction.
///
/// Owns the generator, the index map with its metadata pool, the transition
/// accumulator, and the frontier. One `explore` call runs a single refinement
/// iteration at the current local κ; the accumulator keeps the real expansion
/// edges across iterations, so a state is expanded at most once per
/// accumulator lifetime.
pub struct Explorer<G> {
    generator: G,
    states: StateIndexMap,
    transitions: TransitionAccumulator,
    frontier: Frontier,
    absorbing: AbsorbingState,
    discipline: Discipline,
    local_kappa: f64,
    iteration: u32,
    initial_states: Vec<StateIndex>,
    deadlock_states: Vec<StateIndex>,
    number_transitions: usize,
    explored_total: usize,
    /// Reward per state, harvested from expansion behaviors.
    state_rewards: Vec<f64>,
    has_rewards: bool,
    /// Label whose failure makes a state a self-loop sink (property-guided
    /// pruning). None disables pruning.
    refine_label: Option<String>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<G: NextStateGenerator> Explorer<G> {
    /// Create an engine for `generator`. Only CTMCs are supported; DTMCs are
    /// accepted best-effort with a warning.
    pub fn new(generator: G, config: &BuildConfig) -> BuildResult<Self> {
        match generator.model_type() {
            ModelType::Ctmc => {}
            ModelType::Dtmc => {
                warn!("model is a DTMC; only CTMCs are fully supported, checking is best-effort");
            }
            other => return Err(BuildError::UnsupportedModel(other)),
        }
        Ok(Self {
            generator,
            states: StateIndexMap::new(),
            transitions: TransitionAccumulator::new(),
            frontier: Frontier::new(config.discipline),
            absorbing: AbsorbingState::new(),
            discipline: config.discipline,
            local_kappa: config.kappa,
            iteration: 0,
            initial_states: Vec::new(),
            deadlock_states: Vec::new(),
            number_transitions: 0,
            explored_total: 0,
            state_rewards: Vec::new(),
            has_rewards: false,
            refine_label: None,
            stop_flag: None,
        })
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    pub fn set_refine_label(&mut self, label: Option<String>) {
        self.refine_label = label;
    }

    pub fn set_stop_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.stop_flag = flag;
    }

    pub fn local_kappa(&self) -> f64 {
        self.local_kappa
    }

    /// Shrink the local κ by the configured factor.
    pub fn reduce_kappa(&mut self, factor: f64) {
        self.local_kappa /= factor;
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.number_transitions
    }

    pub fn num_initial_states(&self) -> usize {
        self.initial_states.len()
    }

    pub fn initial_states(&self) -> &[StateIndex] {
        &self.initial_states
    }

    pub fn deadlock_states(&self) -> &[StateIndex] {
        &self.deadlock_states
    }

    pub fn index_map(&self) -> &StateIndexMap {
        &self.states
    }

    pub fn transitions(&self) -> &TransitionAccumulator {
        &self.transitions
    }

    /// Number of states currently on the truncation perimeter.
    pub fn number_terminal(&self) -> usize {
        self.states.count_terminal()
    }

    /// Drop all exploration state for a fresh refinement run.
    pub fn reset(&mut self, config: &BuildConfig) {
        self.states.clear();
        self.transitions.clear();
        self.frontier = Frontier::new(config.discipline);
        self.absorbing.reset();
        self.discipline = config.discipline;
        self.local_kappa = config.kappa;
        self.iteration = 0;
        self.initial_states.clear();
        self.deadlock_states.clear();
        self.number_transitions = 0;
        self.explored_total = 0;
        self.state_rewards.clear();
        self.has_rewards = false;
    }

    fn cancelled(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run one refinement iteration: seed or resume, then drain the frontier.
    pub fn explore(&mut self, config: &BuildConfig) -> BuildResult<ExploreOutcome> {
        self.iteration += 1;
        if self.iteration == 1 {
            self.absorbing.install(
                &self.generator,
                &mut self.states,
                &mut self.transitions,
                &mut self.deadlock_states,
            )?;
            self.seed_initial_states()?;
        } else if self.discipline == Discipline::ReExploring {
            self.reset_for_reexploration();
        } else {
            self.resume();
        }

        while let Some(index) = self.frontier.pop() {
            if self.cancelled() {
                info!(iteration = self.iteration, "exploration cancelled");
                return Ok(ExploreOutcome::Cancelled);
            }
            debug_assert_ne!(index, ABSORBING_INDEX, "absorbing state was enqueued");

            // Truncation check at pop time: low-probability terminal states
            // stay on the perimeter. Comparison is strict, so mass exactly
            // equal to κ is explored.
            let record = self.states.get_meta(index);
            if record.terminal && record.pi < self.local_kappa {
                continue;
            }

            self.expand_state(index, config)?;
            self.explored_total += 1;
            if self.explored_total % MSG_FREQUENCY == 0 {
                info!(
                    explored = self.explored_total,
                    states = self.states.len(),
                    queued = self.frontier.len(),
                    "exploring state space"
                );
            }
        }
        debug!(
            iteration = self.iteration,
            kappa = self.local_kappa,
            states = self.states.len(),
            terminal = self.states.count_terminal(),
            transitions = self.number_transitions,
            "iteration finished"
        );
        Ok(ExploreOutcome::Complete)
    }

    /// First-iteration seeding: every initial state gets an equal share of
    /// probability mass 1 and goes on the frontier.
    fn seed_initial_states(&mut self) -> BuildResult<()> {
        let map = &mut self.states;
        let mut fresh: Vec<StateIndex> = Vec::new();
        let initials = self
            .generator
            .initial_states(&mut |state: &CompressedState| {
                let (index, is_new) = map.lookup_or_insert(state);
                if is_new {
                    fresh.push(index);
                }
                index
            })?;
        if initials.is_empty() {
            return Err(BuildError::EmptyInitial);
        }
        if initials.contains(&ABSORBING_INDEX) {
            return Err(BuildError::AbsorbingSetupFailed(
                "an initial state resolved to the absorbing index".to_string(),
            ));
        }
        if fresh.len() != initials.len() {
            warn!("some initial states existed before seeding");
        }

        let share = 1.0 / initials.len() as f64;
        for &index in &initials {
            let record = self.states.get_meta_mut(index);
            record.add_to_pi(share);
            record.iteration_last_seen = 1;
            let pi = record.pi;
            self.frontier.push(index, pi);
        }
        info!(count = initials.len(), "seeded initial states");
        self.initial_states = initials;
        Ok(())
    }

    /// Re-enqueue every terminal state whose estimate reaches the shrunken κ.
    /// Non-terminal states and low-`pi` terminals are skipped.
    fn resume(&mut self) {
        let iteration = self.iteration;
        let kappa = self.local_kappa;
        let mut requeued = 0usize;
        for index in 1..self.states.len() as StateIndex {
            let record = self.states.get_meta_mut(index);
            if !record.terminal || record.pi < kappa {
                continue;
            }
            record.iteration_last_seen = iteration;
            record.was_put_in_terminal_queue = true;
            let pi = record.pi;
            if self.frontier.push(index, pi) {
                requeued += 1;
            }
        }
        debug!(iteration, kappa, requeued, "resumed exploration");
    }

    /// Re-exploring discipline: throw away the accumulated transition
    /// structure, mark everything terminal again, and re-seed. The index map
    /// is retained so indices stay stable across iterations.
    fn reset_for_reexploration(&mut self) {
        self.transitions.clear();
        self.number_transitions = 0;
        self.deadlock_states.clear();
        self.deadlock_states.push(ABSORBING_INDEX);
        self.transitions
            .append(ABSORBING_INDEX, ABSORBING_INDEX, 1.0);

        for record in self.states.records_mut() {
            record.pi = 0.0;
            record.terminal = record.index != ABSORBING_INDEX;
            record.is_new = true;
            record.was_put_in_terminal_queue = false;
        }

        let iteration = self.iteration;
        let share = 1.0 / self.initial_states.len() as f64;
        for &index in &self.initial_states.clone() {
            let record = self.states.get_meta_mut(index);
            record.add_to_pi(share);
            record.iteration_last_seen = iteration;
            let pi = record.pi;
            self.frontier.push(index, pi);
        }
        debug!(iteration, "re-exploring from scratch");
    }

    /// Expand one popped state: enumerate its behavior, record its edges,
    /// propagate probability mass, and schedule fresh successors.
    fn expand_state(&mut self, index: StateIndex, config: &BuildConfig) -> BuildResult<()> {
        let packed = self.states.state_of(index).clone();
        self.generator.load(&packed);

        // Property-guided pruning: states that can no longer influence the
        // property become self-loop sinks and are not expanded.
        if let Some(label) = &self.refine_label {
            if self.generator.eval_label(label) == Some(false) {
                let record = self.states.get_meta_mut(index);
                let append_loop = record.is_new;
                record.terminal = false;
                record.pi = 0.0;
                record.is_new = false;
                record.was_put_in_terminal_queue = false;
                if append_loop {
                    self.transitions.append(index, index, 1.0);
                    self.number_transitions += 1;
                }
                return Ok(());
            }
        }

        let map = &mut self.states;
        let mut fresh: Vec<StateIndex> = Vec::new();
        let behavior = self
            .generator
            .expand(&mut |state: &CompressedState| {
                let (successor, is_new) = map.lookup_or_insert(state);
                if is_new {
                    fresh.push(successor);
                }
                successor
            })?;

        if behavior.is_empty() {
            if !config.fix_deadlocks {
                return Err(BuildError::EmptyBehavior { index });
            }
            debug!(state = index, "no enabled choices, stubbing as deadlock");
            self.deadlock_states.push(index);
            let record = self.states.get_meta_mut(index);
            record.terminal = false;
            record.pi = 0.0;
            record.is_new = false;
            record.was_put_in_terminal_queue = false;
            return Ok(());
        }

        if let Some(&reward) = behavior.state_rewards.first() {
            self.record_state_reward(index, reward);
        }

        let exit_rate = behavior.total_exit_rate();
        let pi_u = self.states.get_meta(index).pi;
        let iteration = self.iteration;
        let record_edges = self.states.get_meta(index).is_new;

        for choice in &behavior.choices {
            for &(successor, rate) in &choice.transitions {
                if successor == ABSORBING_INDEX {
                    warn!(from = index, "generator produced an edge to the absorbing index");
                    continue;
                }
                if (successor as usize) >= self.states.len() {
                    let error = BuildError::UnreachablePredecessor { index: successor };
                    warn!(error = %error, "skipping edge to unindexed successor");
                    continue;
                }
                if record_edges {
                    self.transitions.append(index, successor, rate);
                    self.number_transitions += 1;
                }
                let record = self.states.get_meta_mut(successor);
                if pi_u > 0.0 && exit_rate > 0.0 {
                    record.add_to_pi(pi_u * rate / exit_rate);
                }
                record.iteration_last_seen = iteration;
            }
        }

        // Fresh successors enter the frontier after the whole expansion, so
        // the priority snapshot sees the full contribution of this state.
        for successor in fresh {
            let pi = self.states.get_meta(successor).pi;
            self.frontier.push(successor, pi);
        }

        let record = self.states.get_meta_mut(index);
        record.pi = 0.0;
        record.terminal = false;
        record.is_new = false;
        record.was_put_in_terminal_queue = false;
        Ok(())
    }

    fn record_state_reward(&mut self, index: StateIndex, reward: f64) {
        if reward != 0.0 {
            self.has_rewards = true;
        }
        if self.state_rewards.len() <= index as usize {
            self.state_rewards.resize(index as usize + 1, 0.0);
        }
        self.state_rewards[index as usize] = reward;
    }

    pub(crate) fn finalize_parts(
        &mut self,
    ) -> (
        &mut G,
        &mut StateIndexMap,
        &mut TransitionAccumulator,
        &mut Vec<StateIndex>,
        &mut Vec<StateIndex>,
    ) {
        (
            &mut self.generator,
            &mut self.states,
            &mut self.transitions,
            &mut self.initial_states,
            &mut self.deadlock_states,
        )
    }

    pub(crate) fn reward_vector(&self) -> Option<Vec<f64>> {
        if !self.has_rewards {
            return None;
        }
        let mut rewards = self.state_rewards.clone();
        rewards.resize(self.states.len(), 0.0);
        Some(rewards)
    }
}
