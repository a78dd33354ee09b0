/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The fork tree and its validator, shared between the threads of a node.
//!
//! The tree and the [`ChainValidator`] live together behind one [`RwLock`]. [`Chain`] is the
//! read-and-write handle: every insertion takes the write lock for the whole validate-then-insert step,
//! so no other insertion can change the tree in the middle of a validation. [`ChainCamera`] is the
//! read-only handle given out to library users and to the networking layer.
//!
//! Readers hold the read lock only long enough to copy out the blocks they need. Replaying a path to
//! derive accounts or filesystem state happens after the lock is released, so long replays never hold
//! up insertions.
//!
//! A thread that panics while holding the lock poisons it. Neither the tree nor the validator is ever
//! left half-updated by a panic (the tree is only written by [`ForkTree::insert_child`] and
//! [`ForkTree::insert_root`], at the very end of a validation), so poisoned locks are recovered.

use std::{
    sync::{mpsc::Sender, Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use crate::{
    config::{Confirmations, Difficulty, Economics},
    events::{Event, InsertBlockEvent, UpdateHeadEvent},
    fork_tree::{ForkTree, NodeId},
    miner::cancellation::CancellationToken,
    state::{
        accounts::accounts_state_from_path, filesystem::filesystem_state_from_path,
        ledger::LedgerState, AccountsState, FilesystemState, StateError,
    },
    types::{
        block::Block,
        data_types::{BlockHeight, CryptoHash},
    },
    validator::{ChainValidator, ValidationError},
};

struct ChainInner {
    tree: ForkTree,
    validator: ChainValidator,
    // Stopped, and forgotten, the next time the head moves.
    head_watchers: Vec<CancellationToken>,
}

/// Position of a block in the fork tree, as reported after it is inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertedBlock {
    pub hash: CryptoHash,
    pub height: BlockHeight,
}

/// The head of the longest chain at some point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HeadSnapshot {
    pub(crate) node: NodeId,
    pub(crate) hash: CryptoHash,
    pub(crate) height: BlockHeight,
}

/// Read and write handle to the shared fork tree.
#[derive(Clone)]
pub(crate) struct Chain {
    inner: Arc<RwLock<ChainInner>>,
    economics: Economics,
    event_publisher: Option<Sender<Event>>,
}

impl Chain {
    pub(crate) fn new(
        economics: Economics,
        difficulty: Difficulty,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ChainInner {
                tree: ForkTree::new(),
                validator: ChainValidator::new(economics, difficulty),
                head_watchers: Vec::new(),
            })),
            economics,
            event_publisher,
        }
    }

    pub(crate) fn camera(&self) -> ChainCamera {
        ChainCamera {
            inner: self.inner.clone(),
            economics: self.economics,
        }
    }

    /// Validate `block` and insert it into the tree if it is valid, publishing an
    /// [`InsertBlockEvent`], and also an [`UpdateHeadEvent`] if the block became the new head.
    pub(crate) fn insert(&self, block: Block) -> Result<InsertedBlock, ValidationError> {
        let (inserted, is_head) = {
            let mut inner = self.write();
            let ChainInner {
                tree,
                validator,
                head_watchers,
            } = &mut *inner;
            let id = validator.validate_and_insert(tree, block)?;
            let node = tree.node(id);
            let is_head = tree.longest_chain_head() == Some(id);
            if is_head {
                head_watchers.drain(..).for_each(|token| token.request_stop());
            }
            (
                InsertedBlock {
                    hash: *node.id(),
                    height: node.height(),
                },
                is_head,
            )
        };

        Event::InsertBlock(InsertBlockEvent {
            timestamp: SystemTime::now(),
            block: inserted.hash,
            height: inserted.height,
        })
        .publish(&self.event_publisher);

        if is_head {
            Event::UpdateHead(UpdateHeadEvent {
                timestamp: SystemTime::now(),
                head: inserted.hash,
                height: inserted.height,
            })
            .publish(&self.event_publisher);
        }

        Ok(inserted)
    }

    pub(crate) fn head(&self) -> Option<HeadSnapshot> {
        let inner = self.read();
        inner.tree.longest_chain_head().map(|node| HeadSnapshot {
            node,
            hash: *inner.tree.node(node).id(),
            height: inner.tree.node(node).height(),
        })
    }

    /// Arrange for `token` to be stopped as soon as the head moves away from `head`, which is `None` for
    /// an empty tree. Returns false, registering nothing, if the head has already moved.
    ///
    /// Miners use this to abandon a nonce search whose block could only end up on a shorter fork.
    pub(crate) fn stop_on_head_change(&self, head: Option<NodeId>, token: &CancellationToken) -> bool {
        let mut inner = self.write();
        if inner.tree.longest_chain_head() != head {
            return false;
        }
        inner.head_watchers.push(token.clone());
        true
    }

    /// Get the full, unconfirmed state after the block at `node`.
    pub(crate) fn ledger_at(&self, node: NodeId) -> Result<LedgerState, StateError> {
        let inner = self.read();
        inner.validator.ledger_at(&inner.tree, node)
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A read-only view into the shared fork tree.
///
/// Cameras are cheap to clone, and every clone observes the same tree. Each call sees the tree as it was
/// at one instant, but consecutive calls may see different trees.
#[derive(Clone)]
pub struct ChainCamera {
    inner: Arc<RwLock<ChainInner>>,
    economics: Economics,
}

impl ChainCamera {
    /// Get the hash of the head of the longest chain. `None` if no block is known yet.
    pub fn head(&self) -> Option<CryptoHash> {
        let inner = self.read();
        inner
            .tree
            .longest_chain_head()
            .map(|head| *inner.tree.node(head).id())
    }

    /// Get the height of the head of the longest chain. `None` if no block is known yet.
    pub fn head_height(&self) -> Option<BlockHeight> {
        self.read().tree.max_height()
    }

    /// Get the block with hash `hash`, if it is in the tree.
    pub fn block(&self, hash: &CryptoHash) -> Option<Block> {
        let inner = self.read();
        inner
            .tree
            .find(hash)
            .first()
            .map(|id| inner.tree.node(*id).block().clone())
    }

    /// Get the height of the block with hash `hash`, if it is in the tree.
    pub fn block_height(&self, hash: &CryptoHash) -> Option<BlockHeight> {
        let inner = self.read();
        inner
            .tree
            .find(hash)
            .first()
            .map(|id| inner.tree.node(*id).height())
    }

    pub fn contains(&self, hash: &CryptoHash) -> bool {
        self.read().tree.contains(hash)
    }

    /// Get every root block, in the order they were inserted.
    pub fn roots(&self) -> Vec<Block> {
        let inner = self.read();
        inner
            .tree
            .roots()
            .iter()
            .map(|id| inner.tree.node(*id).block().clone())
            .collect()
    }

    /// Get the blocks of the longest chain, from its root to its head.
    pub fn longest_chain(&self) -> Vec<Block> {
        let inner = self.read();
        inner
            .tree
            .longest_chain()
            .iter()
            .map(|id| inner.tree.node(*id).block().clone())
            .collect()
    }

    /// Get the number of blocks in the tree, across every fork.
    pub fn len(&self) -> usize {
        self.read().tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tree.is_empty()
    }

    /// Compute the balances at the head of the longest chain.
    pub fn accounts_state(&self) -> Result<AccountsState, StateError> {
        accounts_state_from_path(&self.economics, &self.longest_chain())
    }

    /// Compute the confirmed files at the head of the longest chain.
    pub fn filesystem_state(
        &self,
        confirmations: &Confirmations,
    ) -> Result<FilesystemState, StateError> {
        filesystem_state_from_path(confirmations, &self.longest_chain())
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
