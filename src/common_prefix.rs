//! Tracking the common prefix of an execution

use crate::{
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
};

/// Folds the common prefix parameter of successive tip sets into a running
/// maximum. The maximum over a whole execution is the depth a block must be
/// buried at before every party is guaranteed to agree on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommonPrefixAnalyzer {
    safety_depth: u64,
    observations: u64,
}

impl CommonPrefixAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the common prefix parameter of `tips` and returns it.
    pub fn observe(
        &mut self,
        tree: &BlockTree,
        tips: &[BlockId],
    ) -> Result<u64, BlockTreeError> {
        let k = tree.common_prefix_k(tips)?;
        self.safety_depth = self.safety_depth.max(k);
        self.observations += 1;

        Ok(k)
    }

    /// Records every tip set in `tip_sets`, returning the resulting safety
    /// depth.
    pub fn analyze<'a, I>(
        &mut self,
        tree: &BlockTree,
        tip_sets: I,
    ) -> Result<u64, BlockTreeError>
    where
        I: IntoIterator<Item = &'a [BlockId]>,
    {
        for tips in tip_sets {
            self.observe(tree, tips)?;
        }

        Ok(self.safety_depth)
    }

    /// Largest common prefix parameter observed so far.
    #[inline]
    pub fn safety_depth(&self) -> u64 {
        self.safety_depth
    }

    /// Number of tip sets observed so far.
    #[inline]
    pub fn observations(&self) -> u64 {
        self.observations
    }
}
