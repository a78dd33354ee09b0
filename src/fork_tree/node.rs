/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Entries of the [`ForkTree`](super::ForkTree).

use crate::types::{
    block::Block,
    data_types::{BlockHeight, CryptoHash},
};

/// Stable handle to a [`Node`] inside the [`ForkTree`](super::ForkTree) that created it.
///
/// A `NodeId` is an index into the tree's arena. It stays valid for as long as the tree lives, since
/// nodes are never removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(super) usize);

/// A block stored in the fork tree, together with its position.
#[derive(Clone, Debug)]
pub struct Node {
    pub(super) id: CryptoHash,
    pub(super) block: Block,
    pub(super) height: BlockHeight,
    pub(super) parent: Option<NodeId>,
    pub(super) child: Option<NodeId>,
}

impl Node {
    /// The hash of this node's block. Distinct nodes may share the same `id`.
    pub fn id(&self) -> &CryptoHash {
        &self.id
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Distance from this node's root. Roots have height 0.
    pub fn height(&self) -> BlockHeight {
        self.height
    }

    /// The node this node extends. `None` for roots.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The child of this node that lies on the most recent longest chain passing through it, if any.
    ///
    /// Other children (forks) are not tracked here; they are only reachable by looking them up by hash.
    pub fn child(&self) -> Option<NodeId> {
        self.child
    }
}
