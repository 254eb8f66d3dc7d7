//! Adversarial strategies for the discrete-round backbone model.

pub mod balancing;
pub mod idle;
pub mod private_mining;

pub use balancing::Balancing;
pub use idle::Idle;
pub use private_mining::PrivateMining;

use std::fmt::Debug;

use dyn_clone::DynClone;
use rand::RngCore;

use crate::{
    block::BlockId,
    blocktree::{BlockTree, BlockTreeError},
};

/// A rushing adversary with some specific strategy. Acts after the honest
/// parties in every round and maintains internal state relating to its
/// private chain, if necessary.
pub trait Adversary: Debug + DynClone + Send + Sync {
    /// Places the `blocks` blocks won by the adversary this round. The honest
    /// tip set of the round is visible and may be modified, which models
    /// blocks the adversary chooses to deliver to honest parties.
    fn mine(
        &mut self,
        tree: &mut BlockTree,
        honest_tips: &mut Vec<BlockId>,
        blocks: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(), BlockTreeError>;

    /// Chains held privately by the adversary, which count towards the common
    /// prefix of an execution.
    fn tips(&self) -> Vec<BlockId>;

    /// Returns the name of the adversary's strategy.
    fn name(&self) -> String {
        "Name not set".into()
    }
}

dyn_clone::clone_trait_object!(Adversary);
