//! State labeling: named sets of states.

use crate::StateIndex;
use std::collections::BTreeMap;

/// Maps label names to the set of states carrying them.
///
/// Backed by dense boolean vectors so a finished labeling compares exactly
/// (finalization must be reproducible byte-for-byte).
#[derive(Debug, Clone, PartialEq)]
pub struct StateLabeling {
    num_states: usize,
    labels: BTreeMap<String, Vec<bool>>,
}

impl StateLabeling {
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            labels: BTreeMap::new(),
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Register a label. Idempotent.
    pub fn add_label(&mut self, name: &str) {
        self.labels
            .entry(name.to_string())
            .or_insert_with(|| vec![false; self.num_states]);
    }

    /// Attach a label to one state, registering the label if needed.
    pub fn add_label_to_state(&mut self, name: &str, state: StateIndex) {
        let num_states = self.num_states;
        let set = self
            .labels
            .entry(name.to_string())
            .or_insert_with(|| vec![false; num_states]);
        set[state as usize] = true;
    }

    pub fn contains_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn has_label(&self, name: &str, state: StateIndex) -> bool {
        self.labels
            .get(name)
            .is_some_and(|set| set[state as usize])
    }

    /// The membership vector of a label, if registered.
    pub fn states(&self, name: &str) -> Option<&[bool]> {
        self.labels.get(name).map(|v| v.as_slice())
    }

    /// All label names, sorted.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(|s| s.as_str())
    }
}
