//! Adversary that never mines.

use rand::RngCore;

use super::Adversary;
use crate::{
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
};

/// Discards every block it wins.
#[derive(Debug, Clone, Default)]
pub struct Idle;

impl Adversary for Idle {
    fn name(&self) -> String {
        "Idle".into()
    }

    fn mine(
        &mut self,
        _tree: &mut BlockTree,
        _honest_tips: &mut Vec<BlockId>,
        _blocks: u64,
        _rng: &mut dyn RngCore,
    ) -> Result<(), BlockTreeError> {
        Ok(())
    }

    fn tips(&self) -> Vec<BlockId> {
        vec![]
    }
}
