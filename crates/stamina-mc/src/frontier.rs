//! Frontier work queues: FIFO and reachability-priority disciplines.

use ahash::AHashSet;
use stamina_model::StateIndex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Exploration discipline selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discipline {
    /// Breadth-first per-iteration work list.
    #[default]
    Iterative,
    /// Always expand the highest-estimated-reachability frontier state.
    Priority,
    /// Rebuild the transition structure from scratch every refinement
    /// iteration (breadth-first within an iteration).
    ReExploring,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Discipline::Iterative => "iterative",
            Discipline::Priority => "priority",
            Discipline::ReExploring => "re-exploring",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iterative" => Ok(Discipline::Iterative),
            "priority" => Ok(Discipline::Priority),
            "re-exploring" => Ok(Discipline::ReExploring),
            other => Err(format!("unknown discipline '{other}'")),
        }
    }
}

/// Heap entry: the `pi` estimate snapshotted at enqueue time. Max-heap on
/// `pi`, ties broken by ascending index.
#[derive(Debug, Clone, Copy)]
struct PriorityEntry {
    pi: f64,
    index: StateIndex,
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityEntry {}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pi
            .total_cmp(&other.pi)
            .then_with(|| other.index.cmp(&self.index))
    }
}

#[derive(Debug)]
enum QueueKind {
    Fifo(VecDeque<StateIndex>),
    Priority(BinaryHeap<PriorityEntry>),
}

/// The set of states scheduled for expansion. Duplicate pushes are refused:
/// a state enqueued twice is expanded once per iteration.
#[derive(Debug)]
pub struct Frontier {
    kind: QueueKind,
    queued: AHashSet<StateIndex>,
}

impl Frontier {
    pub fn new(discipline: Discipline) -> Self {
        let kind = match discipline {
            Discipline::Priority => QueueKind::Priority(BinaryHeap::new()),
            Discipline::Iterative | Discipline::ReExploring => {
                QueueKind::Fifo(VecDeque::new())
            }
        };
        Self {
            kind,
            queued: AHashSet::new(),
        }
    }

    /// Schedule a state, with its current `pi` as the priority snapshot.
    /// Returns false if the state was already queued.
    pub fn push(&mut self, index: StateIndex, pi: f64) -> bool {
        if !self.queued.insert(index) {
            return false;
        }
        match &mut self.kind {
            QueueKind::Fifo(queue) => queue.push_back(index),
            QueueKind::Priority(heap) => heap.push(PriorityEntry { pi, index }),
        }
        true
    }

    pub fn pop(&mut self) -> Option<StateIndex> {
        let index = match &mut self.kind {
            QueueKind::Fifo(queue) => queue.pop_front()?,
            QueueKind::Priority(heap) => heap.pop()?.index,
        };
        self.queued.remove(&index);
        Some(index)
    }

    pub fn contains(&self, index: StateIndex) -> bool {
        self.queued.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn clear(&mut self) {
        match &mut self.kind {
            QueueKind::Fifo(queue) => queue.clear(),
            QueueKind::Priority(heap) => heap.clear(),
        }
        self.queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut q = Frontier::new(Discipline::Iterative);
        q.push(3, 0.1);
        q.push(1, 0.9);
        q.push(2, 0.5);
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_priority_order() {
        let mut q = Frontier::new(Discipline::Priority);
        q.push(3, 0.1);
        q.push(1, 0.9);
        q.push(2, 0.5);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn test_priority_ties_break_by_index() {
        let mut q = Frontier::new(Discipline::Priority);
        q.push(7, 0.5);
        q.push(2, 0.5);
        q.push(5, 0.5);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(5));
        assert_eq!(q.pop(), Some(7));
    }

    #[test]
    fn test_duplicates_refused() {
        for discipline in [Discipline::Iterative, Discipline::Priority] {
            let mut q = Frontier::new(discipline);
            assert!(q.push(1, 0.2));
            assert!(!q.push(1, 0.8));
            assert_eq!(q.len(), 1);
            assert!(q.contains(1));
            assert_eq!(q.pop(), Some(1));
            assert!(!q.contains(1));
            assert_eq!(q.pop(), None);
            // Popped states may be re-queued.
            assert!(q.push(1, 0.3));
        }
    }

    #[test]
    fn test_discipline_parse() {
        assert_eq!("priority".parse::<Discipline>(), Ok(Discipline::Priority));
        assert_eq!(
            "re-exploring".parse::<Discipline>(),
            Ok(Discipline::ReExploring)
        );
        assert!("dfs".parse::<Discipline>().is_err());
    }
}
