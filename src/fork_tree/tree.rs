/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The arena-backed [`ForkTree`].

use std::{collections::HashMap, iter::successors};

use crate::types::{
    block::Block,
    data_types::{BlockHeight, CryptoHash},
};

use super::node::{Node, NodeId};

/// Multi-rooted, append-only index of every known block.
///
/// Insertion never fails: deciding *whether* a block may be inserted is the job of the
/// [`ChainValidator`](crate::validator::ChainValidator).
#[derive(Clone, Default)]
pub struct ForkTree {
    nodes: Vec<Node>,
    by_hash: HashMap<CryptoHash, Vec<NodeId>>,
    roots: Vec<NodeId>,
    head: Option<NodeId>,
}

/// Mutators.
impl ForkTree {
    /// Create an empty fork tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `block` as a new root (a node with no parent).
    ///
    /// The root becomes the longest chain head only if the tree was empty.
    pub fn insert_root(&mut self, block: Block) -> NodeId {
        let id = self.push(block, BlockHeight::new(0), None);
        self.roots.push(id);
        if self.head.is_none() {
            self.head = Some(id);
        }
        id
    }

    /// Insert `block` as a child of `parent`.
    ///
    /// The new node becomes the longest chain head if its height is strictly greater than that of the
    /// current head, so on ties the first node to reach a height keeps the head.
    pub fn insert_child(&mut self, block: Block, parent: NodeId) -> NodeId {
        let height = self.node(parent).height + 1;
        let id = self.push(block, height, Some(parent));
        if self.max_height().map_or(true, |max| height > max) {
            self.set_head(id);
        }
        id
    }

    fn push(&mut self, block: Block, height: BlockHeight, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let hash = block.hash();
        self.nodes.push(Node {
            id: hash,
            block,
            height,
            parent,
            child: None,
        });
        self.by_hash.entry(hash).or_default().push(id);
        id
    }

    /// Make `head` the longest chain head, re-pointing the `child` links of its ancestors so that
    /// walking forward from its root follows the new longest chain.
    ///
    /// Every link up to the root is rewritten: a link that already points at the new chain does not mean
    /// that the links above it do, since an older head may have re-pointed them to another fork.
    fn set_head(&mut self, head: NodeId) {
        self.head = Some(head);
        let mut cursor = head;
        while let Some(parent) = self.nodes[cursor.0].parent {
            self.nodes[parent.0].child = Some(cursor);
            cursor = parent;
        }
    }
}

/// Getters.
impl ForkTree {
    /// Get the node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Get every node whose block hashes to `hash`, in insertion order.
    pub fn find(&self, hash: &CryptoHash) -> &[NodeId] {
        self.by_hash.get(hash).map_or(&[], |ids| ids.as_slice())
    }

    pub fn contains(&self, hash: &CryptoHash) -> bool {
        !self.find(hash).is_empty()
    }

    /// Get every root, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Get the head of the longest chain. `None` if the tree is empty.
    pub fn longest_chain_head(&self) -> Option<NodeId> {
        self.head
    }

    /// Get the height of the longest chain head. `None` if the tree is empty.
    pub fn max_height(&self) -> Option<BlockHeight> {
        self.head.map(|head| self.node(head).height)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate from `id` back to its root, starting with `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        successors(Some(id), move |node| self.node(*node).parent)
    }

    /// Get the path from the root of `id` to `id`, both inclusive.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = self.ancestors(id).collect();
        path.reverse();
        path
    }

    /// Get the longest chain, from its root to the head, by following `child` links forward.
    pub fn longest_chain(&self) -> Vec<NodeId> {
        let Some(head) = self.head else {
            return Vec::new();
        };
        let root = self.ancestors(head).last().unwrap_or(head);

        let mut chain: Vec<NodeId> = successors(Some(root), |node| self.node(*node).child).collect();
        // A root whose subtree was never part of a longest chain has no child links past the head.
        chain.truncate(self.node(head).height.int() as usize + 1);
        chain
    }
}
