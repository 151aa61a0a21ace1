//! Bidirectional packed-state ↔ dense-index mapping.

use crate::records::{ProbabilityState, StatePool};
use ahash::AHashMap;
use stamina_model::{CompressedState, StateIndex};

/// Owns the injective mapping between packed states and contiguous indices,
/// and the metadata record of every indexed state.
///
/// All cross-references in the engine go through indices; the map is the only
/// place holding packed states.
#[derive(Debug, Default)]
pub struct StateIndexMap {
    index_of: AHashMap<CompressedState, StateIndex>,
    states: Vec<CompressedState>,
    pool: StatePool,
}

impl StateIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed states. Indices always form the prefix `[0, len)`.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Existing index of `state`, or the next contiguous index with a fresh
    /// metadata record. The flag reports whether the state was fresh.
    pub fn lookup_or_insert(&mut self, state: &CompressedState) -> (StateIndex, bool) {
        if let Some(&index) = self.index_of.get(state) {
            return (index, false);
        }
        let index = self.states.len() as StateIndex;
        self.index_of.insert(state.clone(), index);
        self.states.push(state.clone());
        self.pool.alloc(ProbabilityState::new(index));
        (index, true)
    }

    /// Pure query.
    pub fn lookup(&self, state: &CompressedState) -> Option<StateIndex> {
        self.index_of.get(state).copied()
    }

    /// Existing index of `state`, or index 0. Used as the resolver for
    /// terminal expansion, where unknown successors must collapse into the
    /// absorbing sink rather than be created.
    pub fn lookup_or_absorbing(&self, state: &CompressedState) -> StateIndex {
        self.lookup(state).unwrap_or(0)
    }

    pub fn get_meta(&self, index: StateIndex) -> &ProbabilityState {
        self.pool.get(index)
    }

    pub fn get_meta_mut(&mut self, index: StateIndex) -> &mut ProbabilityState {
        self.pool.get_mut(index)
    }

    pub fn state_of(&self, index: StateIndex) -> &CompressedState {
        &self.states[index as usize]
    }

    /// Every packed state, in index order.
    pub fn states(&self) -> &[CompressedState] {
        &self.states
    }

    pub fn records(&self) -> impl Iterator<Item = &ProbabilityState> {
        self.pool.iter()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut ProbabilityState> {
        self.pool.iter_mut()
    }

    /// Number of states currently marked terminal.
    pub fn count_terminal(&self) -> usize {
        self.pool.iter().filter(|r| r.terminal).count()
    }

    /// Apply an index permutation (`remapping[old] = new`) to both directions
    /// of the mapping and to the record pool, so the stored relation matches
    /// a renumbered row ordering.
    pub fn remap(&mut self, remapping: &[StateIndex]) {
        assert!(remapping.len() >= self.states.len());
        let mut reordered: Vec<Option<CompressedState>> = vec![None; self.states.len()];
        for (old, state) in self.states.drain(..).enumerate() {
            let new = remapping[old] as usize;
            let slot = &mut reordered[new];
            assert!(slot.is_none(), "remapping is not a permutation");
            *slot = Some(state);
        }
        self.states = reordered
            .into_iter()
            .map(|s| s.expect("remapping is not a permutation"))
            .collect();
        for (index, state) in self.states.iter().enumerate() {
            self.index_of
                .insert(state.clone(), index as StateIndex);
        }
        self.pool.apply_permutation(remapping);
    }

    pub fn clear(&mut self) {
        self.index_of.clear();
        self.states.clear();
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(value: u64) -> CompressedState {
        let mut s = CompressedState::new(16);
        s.set_bits(0, 16, value);
        s
    }

    #[test]
    fn test_contiguous_insertion() {
        let mut map = StateIndexMap::new();
        for i in 0..10 {
            let (index, fresh) = map.lookup_or_insert(&packed(i * 7));
            assert_eq!(index, i as StateIndex);
            assert!(fresh);
        }
        // Re-inserting returns the existing index.
        let (index, fresh) = map.lookup_or_insert(&packed(21));
        assert_eq!(index, 3);
        assert!(!fresh);
        assert_eq!(map.len(), 10);
    }

    #[test]
    fn test_lookup_or_absorbing() {
        let mut map = StateIndexMap::new();
        map.lookup_or_insert(&packed(0));
        map.lookup_or_insert(&packed(5));
        assert_eq!(map.lookup_or_absorbing(&packed(5)), 1);
        assert_eq!(map.lookup_or_absorbing(&packed(99)), 0);
        // The unknown state must not have been created.
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup(&packed(99)), None);
    }

    #[test]
    fn test_meta_round_trip() {
        let mut map = StateIndexMap::new();
        let (index, _) = map.lookup_or_insert(&packed(4));
        map.get_meta_mut(index).pi = 0.25;
        assert_eq!(map.get_meta(index).pi, 0.25);
        assert!(map.get_meta(index).terminal);
        assert_eq!(map.count_terminal(), 1);
    }

    #[test]
    fn test_remap_permutes_both_directions() {
        let mut map = StateIndexMap::new();
        for i in 0..4 {
            map.lookup_or_insert(&packed(i));
        }
        map.remap(&[2, 0, 3, 1]);

        assert_eq!(map.lookup(&packed(0)), Some(2));
        assert_eq!(map.lookup(&packed(1)), Some(0));
        assert_eq!(map.lookup(&packed(2)), Some(3));
        assert_eq!(map.lookup(&packed(3)), Some(1));
        assert_eq!(map.state_of(2), &packed(0));
        assert_eq!(map.get_meta(2).index, 2);
        assert_eq!(map.len(), 4);
    }
}
