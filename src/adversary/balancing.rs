//! Balancing attack: keep honest forks evenly matched.

use rand::RngCore;

use super::Adversary;
use crate::{
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
};

/// Extends the lightest honest tip with each block and releases it straight
/// away, so that no honest fork can pull ahead of the others.
#[derive(Debug, Clone, Default)]
pub struct Balancing;

impl Balancing {
    pub fn new() -> Self {
        Balancing
    }
}

impl Adversary for Balancing {
    fn name(&self) -> String {
        "Balancing".into()
    }

    fn mine(
        &mut self,
        tree: &mut BlockTree,
        honest_tips: &mut Vec<BlockId>,
        blocks: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(), BlockTreeError> {
        for _ in 0..blocks {
            let Some(lightest) = tree.lightest(honest_tips) else {
                break;
            };

            let block = tree.mine(lightest, rng)?;
            for tip in honest_tips.iter_mut().filter(|t| **t == lightest) {
                *tip = block;
            }
        }

        Ok(())
    }

    fn tips(&self) -> Vec<BlockId> {
        vec![]
    }
}
