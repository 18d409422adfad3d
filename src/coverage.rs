//! Per-run record of which schema nodes validation has exercised.
//!
//! Kept apart from the compiled tree so one schema can be shared while each
//! test run accumulates its own coverage.
use std::collections::BTreeSet;

use crate::param::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    covered: BTreeSet<NodeId>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, id: NodeId) {
        self.covered.insert(id);
    }

    pub fn unmark(&mut self, id: NodeId) {
        self.covered.remove(&id);
    }

    pub fn is_covered(&self, id: NodeId) -> bool {
        self.covered.contains(&id)
    }

    pub fn clear(&mut self) {
        self.covered.clear();
    }

    /// Number of covered nodes.
    pub fn len(&self) -> usize {
        self.covered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covered.is_empty()
    }

    /// Folds another run's coverage into this one.
    pub fn merge(&mut self, other: &Coverage) {
        self.covered.extend(other.covered.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_unmark_merge() {
        let mut a = Coverage::new();
        a.mark(NodeId(1));
        a.mark(NodeId(1));
        assert_eq!(a.len(), 1);
        let mut b = Coverage::new();
        b.mark(NodeId(2));
        a.merge(&b);
        assert!(a.is_covered(NodeId(2)));
        a.unmark(NodeId(1));
        assert!(!a.is_covered(NodeId(1)));
        a.clear();
        assert!(a.is_empty());
    }
}
