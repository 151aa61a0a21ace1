//! Conversion of the exploration state into a finished sparse model.

use crate::absorbing::{connect_terminal_states, ABSORBING_INDEX};
use crate::errors::{BuildError, BuildResult};
use crate::explorer::Explorer;
use stamina_model::{
    NextStateGenerator, RewardModel, SparseMatrixBuilder, SparseModel, StateIndex,
};
use tracing::{info, warn};

impl<G: NextStateGenerator> Explorer<G> {
    /// Build the finished sparse model from the current exploration state.
    ///
    /// Works on a snapshot of the accumulator: the truncation edges from
    /// still-terminal states are synthesized fresh on every call, so finalize
    /// can be re-run after further refinement without stale edges surviving,
    /// and running it twice on the same exploration state produces identical
    /// artifacts.
    pub fn finalize(&mut self, remapping: Option<&[StateIndex]>) -> BuildResult<SparseModel> {
        if let Some(remapping) = remapping {
            self.apply_remapping(remapping);
        }

        let reward_vector = self.reward_vector();
        let model_type = self.generator().model_type();
        let (generator, states, transitions, initial_states, deadlock_states) =
            self.finalize_parts();
        let num_states = states.len();

        let mut snapshot = transitions.clone();
        connect_terminal_states(generator, states, &mut snapshot)?;

        let mut builder = SparseMatrixBuilder::new();
        snapshot.flush_into(&mut builder, num_states);
        let matrix = builder.build(num_states);

        let mut labeling = generator.label(states.states(), initial_states, deadlock_states)?;
        labeling.add_label("absorbing");
        labeling.add_label_to_state("absorbing", ABSORBING_INDEX);

        let model = SparseModel {
            model_type,
            transitions: matrix,
            labeling,
            initial_states: initial_states.clone(),
            reward_model: reward_vector.map(|state_rewards| RewardModel { state_rewards }),
        };
        info!(
            states = model.num_states(),
            transitions = model.num_transitions(),
            "finalized sparse model"
        );
        Ok(model)
    }

    /// Apply an index renumbering to the accumulator, the stored initial and
    /// deadlock indices, the index map, and the generator. A vector shorter
    /// than the explored-state count is never trusted: a warning is logged
    /// and the identity mapping is kept.
    pub fn apply_remapping(&mut self, remapping: &[StateIndex]) {
        let num_states = self.num_states();
        if remapping.len() < num_states {
            let error = BuildError::RemapSizeMismatch {
                remapped: remapping.len(),
                explored: num_states,
            };
            warn!(error = %error, "ignoring remapping, keeping identity");
            return;
        }

        let (generator, states, transitions, initial_states, deadlock_states) =
            self.finalize_parts();
        transitions.remap(remapping);
        states.remap(remapping);
        for index in initial_states.iter_mut().chain(deadlock_states.iter_mut()) {
            *index = remapping[*index as usize];
        }
        initial_states.sort_unstable();
        generator.remap_state_ids(&|index: StateIndex| remapping[index as usize]);
    }
}
