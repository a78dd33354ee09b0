/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The in-memory tree of every block a node knows about.
//!
//! # The Fork Tree
//!
//! Miners propose blocks independently and concurrently, so the blocks a node learns about form a
//! tree rather than a chain: two blocks may extend the same parent (a *fork*), and peers may even
//! disagree about the genesis block, in which case the tree has more than one *root*.
//!
//! The agreed-upon history is the *longest chain*: the root-to-leaf path of maximum height. The tree
//! tracks the head of this path explicitly. Ties are broken in favour of whichever node reached the
//! height first.
//!
//! # Storage
//!
//! Nodes live in an arena owned by [`ForkTree`] and are addressed by [`NodeId`]s. A node's parent is a
//! `NodeId`, not an owning pointer, so nodes never outlive the tree and there are no reference cycles.
//! Nodes are never removed or mutated after insertion, except for the `child` link that records which
//! child lies on the current longest chain.
//!
//! Blocks are indexed by hash, but the index maps each hash to a *list* of nodes: the tree itself does
//! not assume that hashes are unique. Rejecting re-insertions is left to the validator.

pub mod node;

pub mod tree;

pub use node::{Node, NodeId};
pub use tree::ForkTree;
