//! Arena-backed block trees
//!
//! A [`BlockTree`] owns every block created during a single execution. Blocks
//! are addressed by [`BlockId`], which indexes directly into the arena, and a
//! block's parent link is only ever used as a lookup key. All traversals are
//! iterative so arbitrarily long chains can be walked without recursion.

use std::{collections::VecDeque, ops::Index};

use rand::Rng;
use thiserror::Error;

use crate::{
    block::{Block, BlockId},
    work::{WorkModel, WorkSample},
};

/// Tree of blocks rooted at a single genesis block. Blocks are added with
/// [`BlockTree::extend`] or [`BlockTree::mine`] and never removed.
#[derive(Debug, Clone)]
pub struct BlockTree {
    /// The genesis block of this tree.
    genesis: BlockId,
    /// Maximum height of any block in the tree.
    max_height: u64,
    /// Weight function applied to the proof sample of each new block.
    work_model: WorkModel,
    /// All blocks in the tree, indexed by [`BlockId`].
    blocks: Vec<BlockData>,
}

/// A block and its associated metadata as held within a [`BlockTree`].
#[derive(Debug, Clone)]
pub struct BlockData {
    pub block: Block,
    /// Length of the path from `block` to the genesis block of the tree.
    pub height: u64,
    /// Sum of the block work of every block on the path from the genesis
    /// block to `block`, inclusive.
    pub chain_work: f64,
    /// All blocks which directly extend `block`, in creation order.
    pub children: Vec<BlockId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockTreeError {
    #[error("block {0} was not found in this tree")]
    UnknownBlock(BlockId),
    #[error("blocks {0} and {1} do not share a root")]
    DisjointTrees(BlockId, BlockId),
}

impl BlockTree {
    /// Creates a new tree containing only a genesis block. The genesis block
    /// has [`BlockId`] 0, height 0 and zero work.
    pub fn new(work_model: WorkModel) -> Self {
        let genesis = Block::new(0.into(), None, None, 0.0);

        BlockTree {
            genesis: 0.into(),
            max_height: 0,
            work_model,
            blocks: vec![BlockData {
                block: genesis,
                height: 0,
                chain_work: 0.0,
                children: vec![],
            }],
        }
    }

    /// Returns the ID of the genesis block.
    #[inline]
    pub fn genesis(&self) -> BlockId {
        self.genesis
    }

    /// Returns the work model used to weigh new blocks.
    #[inline]
    pub fn work_model(&self) -> WorkModel {
        self.work_model
    }

    /// Maximum height of any block in the tree.
    #[inline]
    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    /// Number of blocks in the tree, including the genesis block.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: every tree holds at least its genesis block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns true iff the given block ID is associated with a block in the
    /// tree.
    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        id.0 < self.blocks.len()
    }

    /// Returns a reference to the [`BlockData`] associated with the given
    /// block ID.
    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockData> {
        self.blocks.get(id.0)
    }

    /// Returns the parent of the block with the given ID.
    #[inline]
    pub fn get_parent(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(|data| data.block.parent)
    }

    #[inline]
    fn data(&self, id: BlockId) -> Result<&BlockData, BlockTreeError> {
        self.get(id).ok_or(BlockTreeError::UnknownBlock(id))
    }

    /// Creates a child of `parent` whose weight is derived from `sample`.
    pub fn extend(
        &mut self,
        parent: BlockId,
        sample: WorkSample,
    ) -> Result<BlockId, BlockTreeError> {
        let id = BlockId(self.blocks.len());
        let block_work = self.work_model.work(sample);

        let parent_data = self
            .blocks
            .get_mut(parent.0)
            .ok_or(BlockTreeError::UnknownBlock(parent))?;
        parent_data.children.push(id);

        let height = parent_data.height + 1;
        let chain_work = parent_data.chain_work + block_work;
        self.max_height = self.max_height.max(height);

        self.blocks.push(BlockData {
            block: Block::new(id, Some(parent), Some(sample), block_work),
            height,
            chain_work,
            children: vec![],
        });

        Ok(id)
    }

    /// Draws a fresh proof sample and extends `parent` with it.
    #[inline]
    pub fn mine<R: Rng + ?Sized>(
        &mut self,
        parent: BlockId,
        rng: &mut R,
    ) -> Result<BlockId, BlockTreeError> {
        let sample = self.work_model.sample(rng);
        self.extend(parent, sample)
    }

    /// Finds the lowest common ancestor of `a` and `b`, returning how many
    /// steps each of them sits above it.
    pub fn lca(
        &self,
        a: BlockId,
        b: BlockId,
    ) -> Result<(u64, u64), BlockTreeError> {
        let height_a = self.data(a)?.height;
        let height_b = self.data(b)?.height;

        if height_b < height_a {
            let (j_b, j_a) = self.lca(b, a)?;
            return Ok((j_a, j_b));
        }

        // b is at least as deep as a
        let mut low = a;
        let mut high = b;
        let mut high_height = height_b;
        while high_height > height_a {
            high = self
                .get_parent(high)
                .ok_or(BlockTreeError::DisjointTrees(a, b))?;
            high_height -= 1;
        }

        while low != high {
            match (self.get_parent(low), self.get_parent(high)) {
                (Some(l), Some(h)) => {
                    low = l;
                    high = h;
                }
                _ => return Err(BlockTreeError::DisjointTrees(a, b)),
            }
        }

        let meet = self.blocks[low.0].height;
        Ok((height_a - meet, height_b - meet))
    }

    /// Returns the smallest number of blocks which must be removed from every
    /// tip in `tips` so that all of them agree on a common prefix.
    pub fn common_prefix_k(
        &self,
        tips: &[BlockId],
    ) -> Result<u64, BlockTreeError> {
        let mut k = 0;

        for (i, &a) in tips.iter().enumerate() {
            for &b in &tips[i + 1..] {
                let (j_a, j_b) = self.lca(a, b)?;
                k = k.max(j_a.max(j_b));
            }
        }

        Ok(k)
    }

    /// Returns the first tip with maximal chain work.
    pub fn heaviest(&self, tips: &[BlockId]) -> Option<BlockId> {
        let mut best: Option<BlockId> = None;
        for &tip in tips {
            match best {
                Some(b) if self[b].chain_work >= self[tip].chain_work => (),
                _ => best = Some(tip),
            }
        }

        best
    }

    /// Returns the first tip with minimal chain work.
    pub fn lightest(&self, tips: &[BlockId]) -> Option<BlockId> {
        let mut best: Option<BlockId> = None;
        for &tip in tips {
            match best {
                Some(b) if self[b].chain_work <= self[tip].chain_work => (),
                _ => best = Some(tip),
            }
        }

        best
    }

    /// Returns the IDs of all blocks on the path from the given block ID to the
    /// genesis block, in ascending order of height and including the given
    /// block ID.
    ///
    /// ## Panics
    /// If a block with [`BlockId`] `id` is not present in the tree.
    pub fn ancestors_of(&self, id: BlockId) -> Vec<BlockId> {
        assert!(
            self.contains(id),
            "block tree does not contain a block with ID: {:?}",
            id
        );

        let mut ancestors = vec![id];

        let mut curr = id;
        while let Some(parent) = self.get_parent(curr) {
            ancestors.push(parent);
            curr = parent;
        }

        ancestors.reverse();
        ancestors
    }

    /// Returns the root of the tree containing `id`.
    pub fn root_of(&self, id: BlockId) -> Result<BlockId, BlockTreeError> {
        let mut curr = self.data(id)?.block.id;
        while let Some(parent) = self.get_parent(curr) {
            curr = parent;
        }

        Ok(curr)
    }

    /// Breadth-first traversal over `from` and all of its descendants.
    pub fn descendants(
        &self,
        from: BlockId,
    ) -> Result<Bfs<'_>, BlockTreeError> {
        self.data(from)?;

        Ok(Bfs {
            tree: self,
            queue: VecDeque::from([from]),
        })
    }

    /// Number of edges on the longest path from `from` down to a leaf.
    pub fn subtree_depth(&self, from: BlockId) -> Result<u64, BlockTreeError> {
        let base = self.data(from)?.height;
        let deepest = self
            .descendants(from)?
            .map(|id| self.blocks[id.0].height)
            .max()
            .unwrap_or(base);

        Ok(deepest - base)
    }

    /// Length of the longest path from the genesis block to a leaf.
    #[inline]
    pub fn depth(&self) -> u64 {
        self.max_height
    }

    /// All blocks without children, in breadth-first order from the genesis
    /// block.
    pub fn leaves(&self) -> impl Iterator<Item = BlockId> + '_ {
        Bfs {
            tree: self,
            queue: VecDeque::from([self.genesis]),
        }
        .filter(|&id| self.blocks[id.0].children.is_empty())
    }
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new(WorkModel::default())
    }
}

impl Index<BlockId> for BlockTree {
    type Output = BlockData;

    fn index(&self, index: BlockId) -> &Self::Output {
        self.blocks.index(index.0)
    }
}

impl Index<&BlockId> for BlockTree {
    type Output = BlockData;

    fn index(&self, index: &BlockId) -> &Self::Output {
        self.blocks.index(index.0)
    }
}

/// Breadth-first iterator over a subtree of a [`BlockTree`].
#[derive(Debug, Clone)]
pub struct Bfs<'a> {
    tree: &'a BlockTree,
    queue: VecDeque<BlockId>,
}

impl Iterator for Bfs<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        self.queue.extend(self.tree[id].children.iter().copied());

        Some(id)
    }
}
