//! Private mining attack: extend a hidden chain, adopting the honest chain
//! whenever it pulls ahead.

use rand::RngCore;

use super::Adversary;
use crate::{
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
};

/// Mines every block on top of a single private chain. Before mining in a
/// round, switches to the heaviest honest tip if it carries more work than
/// the private chain.
#[derive(Debug, Clone, Default)]
pub struct PrivateMining {
    tip: Option<BlockId>,
}

impl PrivateMining {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tip of the private chain, once one has been chosen.
    pub fn tip(&self) -> Option<BlockId> {
        self.tip
    }
}

impl Adversary for PrivateMining {
    fn name(&self) -> String {
        "Private mining".into()
    }

    fn mine(
        &mut self,
        tree: &mut BlockTree,
        honest_tips: &mut Vec<BlockId>,
        blocks: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(), BlockTreeError> {
        let mut tip = self.tip.unwrap_or_else(|| tree.genesis());

        if let Some(best) = tree.heaviest(honest_tips) {
            if tree[best].chain_work > tree[tip].chain_work {
                tip = best;
            }
        }

        for _ in 0..blocks {
            tip = tree.mine(tip, rng)?;
        }

        self.tip = Some(tip);
        Ok(())
    }

    fn tips(&self) -> Vec<BlockId> {
        self.tip.into_iter().collect()
    }
}
