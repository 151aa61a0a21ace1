//! The synthetic absorbing sink: installation and truncation-edge synthesis.

use crate::errors::{BuildError, BuildResult};
use crate::index_map::StateIndexMap;
use crate::transitions::TransitionAccumulator;
use stamina_model::{CompressedState, NextStateGenerator, StateIndex};
use tracing::{debug, warn};

/// Index reserved for the absorbing state.
pub const ABSORBING_INDEX: StateIndex = 0;

/// Name of the boolean flag the model-modification layer injects into the
/// source model. The absorbing packed state is the initial assignment with
/// this bit forced to 1.
pub const ABSORBING_VARIABLE: &str = "Absorbing";

/// Bookkeeping for the single sink state collecting truncated mass.
#[derive(Debug, Default)]
pub struct AbsorbingState {
    packed: Option<CompressedState>,
}

impl AbsorbingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.packed.is_some()
    }

    pub fn packed(&self) -> Option<&CompressedState> {
        self.packed.as_ref()
    }

    /// Build the absorbing packed state from the generator's variable layout,
    /// install it at index 0, and record it as an expanded deadlock with a
    /// unit self-loop.
    pub fn install<G: NextStateGenerator>(
        &mut self,
        generator: &G,
        map: &mut StateIndexMap,
        transitions: &mut TransitionAccumulator,
        deadlocks: &mut Vec<StateIndex>,
    ) -> BuildResult<()> {
        if self.is_installed() {
            return Ok(());
        }

        let info = generator.variable_info();
        let mut packed = info.packed_initial();
        if let Some(var) = info.boolean_by_name(ABSORBING_VARIABLE) {
            info.set_boolean(&mut packed, var, true);
            if !info.get_boolean(&packed, var) {
                return Err(BuildError::AbsorbingSetupFailed(
                    "could not set the absorbing bit".to_string(),
                ));
            }
        } else if let Some(var) = info
            .integers()
            .iter()
            .find(|v| v.name == ABSORBING_VARIABLE && v.lower_bound == 0 && v.upper_bound == 1)
        {
            info.set_integer(&mut packed, var, 1);
            if info.get_integer(&packed, var) != 1 {
                return Err(BuildError::AbsorbingSetupFailed(
                    "could not set the absorbing bit".to_string(),
                ));
            }
        } else {
            return Err(BuildError::AbsorbingSetupFailed(format!(
                "did not find the '{ABSORBING_VARIABLE}' variable in the model"
            )));
        }

        let (index, fresh) = map.lookup_or_insert(&packed);
        if index != ABSORBING_INDEX || !fresh {
            return Err(BuildError::AbsorbingSetupFailed(format!(
                "absorbing state should be index 0, got {index}"
            )));
        }
        // The sink is fully known: a unit self-loop, never to be expanded.
        let record = map.get_meta_mut(ABSORBING_INDEX);
        record.terminal = false;
        record.is_new = false;
        transitions.append(ABSORBING_INDEX, ABSORBING_INDEX, 1.0);
        deadlocks.push(ABSORBING_INDEX);

        debug!("installed absorbing state at index 0");
        self.packed = Some(packed);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.packed = None;
    }
}

/// Re-expand every still-terminal state with the route-to-absorbing resolver
/// and record its real edges plus one edge to index 0 carrying the total rate
/// of unknown successors. Preserves each terminal state's exit rate while
/// redirecting truncated mass into the sink.
pub fn connect_terminal_states<G: NextStateGenerator>(
    generator: &mut G,
    map: &StateIndexMap,
    snapshot: &mut TransitionAccumulator,
) -> BuildResult<()> {
    for index in 1..map.len() as StateIndex {
        if !map.get_meta(index).terminal {
            continue;
        }
        let packed = map.state_of(index).clone();
        generator.load(&packed);
        let behavior = generator.expand(&mut |s: &CompressedState| map.lookup_or_absorbing(s))?;
        if behavior.is_empty() {
            // The flush self-loop stub covers this row.
            warn!(state = index, "behavior for terminal state was empty");
            continue;
        }
        for choice in &behavior.choices {
            let mut rate_to_absorbing = 0.0;
            for &(target, rate) in &choice.transitions {
                if target == ABSORBING_INDEX {
                    rate_to_absorbing += rate;
                } else {
                    snapshot.append(index, target, rate);
                }
            }
            if rate_to_absorbing > 0.0 {
                snapshot.append(index, ABSORBING_INDEX, rate_to_absorbing);
            }
        }
    }
    Ok(())
}
