use crate::work::WorkSample;

/// Representation of a mined block.
#[derive(Debug, Clone)]
pub struct Block {
    /// The block this block extends. `None` only for the genesis block.
    pub parent: Option<BlockId>,
    /// Position of this block in its
    /// [`BlockTree`](crate::blocktree::BlockTree).
    pub id: BlockId,
    /// Proof sample drawn when this block was mined. `None` for the genesis
    /// block.
    pub sample: Option<WorkSample>,
    /// Weight this block contributes to any chain containing it.
    pub block_work: f64,
}

/// A unique identifier assigned to each [`Block`]. Directly corresponds to the
/// order in which blocks were added to their tree.
#[repr(transparent)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Returns the [`usize`] corresponding to this [`BlockId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for BlockId {
    fn from(value: usize) -> Self {
        BlockId(value)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Block {
    pub fn new(
        id: BlockId,
        parent: Option<BlockId>,
        sample: Option<WorkSample>,
        block_work: f64,
    ) -> Self {
        Block {
            parent,
            id,
            sample,
            block_work,
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Block {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
