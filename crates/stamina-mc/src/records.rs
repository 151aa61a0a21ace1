//! Per-state metadata records and their backing pool.

use stamina_model::StateIndex;

/// Exploration metadata of one indexed state.
///
/// `pi` estimates the probability of reaching this state since its last
/// expansion; every expansion distributes the mass to the successors and
/// zeroes it. A state is `terminal` while its outgoing edges are absent from
/// the accumulator.
#[derive(Debug, Clone)]
pub struct ProbabilityState {
    pub index: StateIndex,
    pub pi: f64,
    pub terminal: bool,
    /// Iteration at which this state was most recently touched, for detecting
    /// stale entries across refinement iterations.
    pub iteration_last_seen: u32,
    pub assigned_in_remapping: bool,
    /// True until the state's first expansion in the current accumulator
    /// lifetime.
    pub is_new: bool,
    /// True while the state sits in the frontier because of a terminal
    /// re-enqueue (as opposed to being freshly discovered).
    pub was_put_in_terminal_queue: bool,
}

impl ProbabilityState {
    pub fn new(index: StateIndex) -> Self {
        Self {
            index,
            pi: 0.0,
            terminal: true,
            iteration_last_seen: 0,
            assigned_in_remapping: false,
            is_new: true,
            was_put_in_terminal_queue: false,
        }
    }

    pub fn add_to_pi(&mut self, amount: f64) {
        self.pi += amount;
    }
}

/// Fixed block capacity; blocks never reallocate once created, so references
/// handed out between allocations stay valid.
const BLOCK_SIZE: usize = 1024;

/// Bulk-allocated storage for [`ProbabilityState`] records.
///
/// Records are addressed by their dense state index and are never
/// individually freed; the whole pool is released when a refinement run ends.
#[derive(Debug, Default)]
pub struct StatePool {
    blocks: Vec<Vec<ProbabilityState>>,
    len: usize,
}

impl StatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocate the record for the next contiguous index. The caller passes
    /// the index it is installing; allocation order must match index order.
    pub fn alloc(&mut self, record: ProbabilityState) -> &mut ProbabilityState {
        debug_assert_eq!(record.index as usize, self.len);
        if self
            .blocks
            .last()
            .is_none_or(|block| block.len() == BLOCK_SIZE)
        {
            self.blocks.push(Vec::with_capacity(BLOCK_SIZE));
        }
        let block = self.blocks.last_mut().expect("block pushed above");
        block.push(record);
        self.len += 1;
        block.last_mut().expect("record pushed above")
    }

    pub fn get(&self, index: StateIndex) -> &ProbabilityState {
        &self.blocks[index as usize / BLOCK_SIZE][index as usize % BLOCK_SIZE]
    }

    pub fn get_mut(&mut self, index: StateIndex) -> &mut ProbabilityState {
        &mut self.blocks[index as usize / BLOCK_SIZE][index as usize % BLOCK_SIZE]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbabilityState> {
        self.blocks.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProbabilityState> {
        self.blocks.iter_mut().flatten()
    }

    /// Move every record to its remapped slot and update its stored index.
    /// `remapping[old] = new` must be a permutation of `0..len`.
    pub fn apply_permutation(&mut self, remapping: &[StateIndex]) {
        let mut reordered: Vec<Option<ProbabilityState>> = vec![None; self.len];
        for block in self.blocks.drain(..) {
            for mut record in block {
                let new_index = remapping[record.index as usize];
                record.index = new_index;
                record.assigned_in_remapping = true;
                let slot = &mut reordered[new_index as usize];
                assert!(slot.is_none(), "remapping is not a permutation");
                *slot = Some(record);
            }
        }
        self.len = 0;
        let count = reordered.len();
        for record in reordered {
            self.alloc(record.expect("remapping is not a permutation"));
        }
        debug_assert_eq!(self.len, count);
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }
}
