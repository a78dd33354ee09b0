/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Entry point for every block that joins the fork tree, whether mined locally or received from a peer.
//!
//! # Completing a block's ancestry
//!
//! A block can only be inserted once its parent is in the tree. Blocks from peers often arrive before
//! their parents (a node that joins late has none of them), so when the validator reports a
//! [missing parent](ValidationError::MissingParent), the [`TreeManager`] asks peers for that parent,
//! inserts it first, and then retries the block once. The parent itself may be missing its own parent,
//! and so on, until either:
//! 1. A block whose parent is already in the tree is reached,
//! 2. A genesis block is reached, or
//! 3. No peer has the block asked for, in which case every block waiting on it is discarded as an
//!    orphan.
//!
//! Blocks waiting on their parents are kept on an explicit stack rather than on the call stack, and at
//! most `max_fetch_depth` blocks are fetched for any single [`add_block`](TreeManager::add_block)
//! call, so a peer that serves an endless chain of ancestors cannot make the node block forever.
//! Fetched blocks are checked to actually have the hash that was asked for.
//!
//! # Gossip
//!
//! A block passed to `add_block` that ends up inserted is broadcast to peers. Ancestors fetched along
//! the way are not, since peers already had them. A block that was already in the tree is not broadcast
//! again, which is what stops a block from circulating forever.

use std::{collections::HashSet, sync::mpsc::Sender, time::SystemTime};

use crate::{
    chain::{Chain, InsertedBlock},
    config::TreeManagerConfiguration,
    events::{Event, FetchBlockEvent, OrphanBlockEvent, RejectBlockEvent},
    networking::{network::Network, sending::SenderHandle},
    types::{block::Block, data_types::CryptoHash},
    validator::ValidationError,
};

/// Ways in which [`TreeManager::add_block`] can fail to insert a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddBlockError {
    /// The block itself failed validation.
    Rejected(ValidationError),

    /// The block could not be connected to the tree: `missing` is an ancestor that no peer could
    /// provide, that failed validation, or that lies beyond the fetch limit.
    Orphaned { block: CryptoHash, missing: CryptoHash },
}

impl From<ValidationError> for AddBlockError {
    fn from(value: ValidationError) -> Self {
        AddBlockError::Rejected(value)
    }
}

#[derive(Clone)]
pub(crate) struct TreeManager<N: Network> {
    config: TreeManagerConfiguration,
    chain: Chain,
    network: N,
    sender: SenderHandle<N>,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network> TreeManager<N> {
    pub(crate) fn new(
        config: TreeManagerConfiguration,
        chain: Chain,
        network: N,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            chain,
            sender: SenderHandle::new(network.clone()),
            network,
            event_publisher,
        }
    }

    /// Insert `block`, first fetching and inserting any of its ancestors that are missing, then broadcast
    /// it to peers.
    pub(crate) fn add_block(&mut self, block: Block) -> Result<InsertedBlock, AddBlockError> {
        let top = block.hash();
        // Blocks waiting for their parent, with the most recently fetched ancestor on top.
        let mut pending: Vec<(CryptoHash, Block)> = vec![(top, block)];
        let mut waiting: HashSet<CryptoHash> = HashSet::new();
        let mut fetched = 0;

        while let Some((hash, block)) = pending.pop() {
            let is_top = pending.is_empty();
            let error = match self.chain.insert(block.clone()) {
                Ok(inserted) if is_top => {
                    self.sender.broadcast(block);
                    return Ok(inserted);
                }
                Ok(_) => continue,
                // An ancestor may have been inserted by another thread since it was found missing.
                Err(ValidationError::DuplicateBlock { .. }) if !is_top => continue,
                Err(error) => error,
            };

            let parent = match error {
                ValidationError::MissingParent { parent, .. } => parent,
                error => {
                    if !matches!(error, ValidationError::DuplicateBlock { .. }) {
                        self.publish_reject(hash, &error);
                    }
                    return Err(if is_top {
                        AddBlockError::Rejected(error)
                    } else {
                        self.orphan(top, hash)
                    });
                }
            };

            // A block that was already retried after its parent was inserted, a parent that is already
            // waiting (a cycle), or one fetch too many.
            if waiting.contains(&hash)
                || waiting.contains(&parent)
                || parent == hash
                || fetched >= self.config.max_fetch_depth
            {
                return Err(self.orphan(top, parent));
            }

            fetched += 1;
            let parent_block = self
                .network
                .get_remote_block(&parent)
                .filter(|parent_block| parent_block.hash() == parent);
            Event::FetchBlock(FetchBlockEvent {
                timestamp: SystemTime::now(),
                block: parent,
                found: parent_block.is_some(),
            })
            .publish(&self.event_publisher);

            let Some(parent_block) = parent_block else {
                return Err(self.orphan(top, parent));
            };
            waiting.insert(hash);
            pending.push((hash, block));
            pending.push((parent, parent_block));
        }

        // `pending` always holds the top block until it is inserted or the call returns.
        Err(self.orphan(top, top))
    }

    /// Ask peers for their roots and insert them. Used when a node starts, so that a node joining an
    /// existing network adopts its genesis block instead of mining its own.
    pub(crate) fn sync_roots(&mut self) {
        for root in self.network.get_remote_roots() {
            let hash = root.hash();
            match self.add_block(root) {
                Ok(_)
                | Err(AddBlockError::Rejected(ValidationError::DuplicateBlock { .. }))
                | Err(AddBlockError::Rejected(ValidationError::DuplicateGenesis { .. })) => (),
                Err(error) => log::warn!("could not insert remote root {}: {:?}", hash, error),
            }
        }
    }

    fn orphan(&self, block: CryptoHash, missing: CryptoHash) -> AddBlockError {
        Event::OrphanBlock(OrphanBlockEvent {
            timestamp: SystemTime::now(),
            block,
            missing,
        })
        .publish(&self.event_publisher);
        AddBlockError::Orphaned { block, missing }
    }

    fn publish_reject(&self, block: CryptoHash, reason: &ValidationError) {
        Event::RejectBlock(RejectBlockEvent {
            timestamp: SystemTime::now(),
            block,
            reason: reason.clone(),
        })
        .publish(&self.event_publisher);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        config::{Difficulty, Economics},
        miner::cancellation::CancellationToken,
        networking::messages::Message,
        types::data_types::AccountId,
    };

    /// Serves blocks from a fixed map, and records what is broadcast.
    #[derive(Clone, Default)]
    struct StubNetwork {
        blocks: Arc<Mutex<HashMap<CryptoHash, Block>>>,
        broadcasts: Arc<Mutex<Vec<Message>>>,
        requests: Arc<Mutex<usize>>,
    }

    impl StubNetwork {
        fn serve(&self, block: &Block) {
            self.blocks.lock().unwrap().insert(block.hash(), block.clone());
        }
    }

    impl Network for StubNetwork {
        fn broadcast(&mut self, message: Message) {
            self.broadcasts.lock().unwrap().push(message);
        }

        fn recv(&mut self) -> Option<Message> {
            None
        }

        fn get_remote_block(&mut self, hash: &CryptoHash) -> Option<Block> {
            *self.requests.lock().unwrap() += 1;
            self.blocks.lock().unwrap().get(hash).cloned()
        }

        fn get_remote_roots(&mut self) -> Vec<Block> {
            self.blocks
                .lock()
                .unwrap()
                .values()
                .filter(|block| block.block_type() == crate::types::block::BlockType::Genesis)
                .cloned()
                .collect()
        }
    }

    fn setup(max_fetch_depth: usize) -> (TreeManager<StubNetwork>, Chain, StubNetwork) {
        let chain = Chain::new(Economics::default(), Difficulty { op: 1, no_op: 1 }, None);
        let network = StubNetwork::default();
        let tree_manager = TreeManager::new(
            TreeManagerConfiguration { max_fetch_depth },
            chain.clone(),
            network.clone(),
            None,
        );
        (tree_manager, chain, network)
    }

    /// A mined chain of `len` blocks starting at a genesis block.
    fn mined_chain(len: usize) -> Vec<Block> {
        let cancel = CancellationToken::new();
        let miner = AccountId::new("m");
        let mut chain = vec![Block::genesis(miner.clone(), 0).mine(1, &cancel).unwrap()];
        while chain.len() < len {
            let prev = chain[chain.len() - 1].hash();
            chain.push(Block::no_op(prev, miner.clone(), 0).mine(1, &cancel).unwrap());
        }
        chain
    }

    #[test]
    fn missing_ancestors_are_fetched_and_only_the_block_is_broadcast() {
        let (mut tree_manager, chain, network) = setup(16);
        let blocks = mined_chain(5);
        blocks.iter().for_each(|block| network.serve(block));

        let inserted = tree_manager.add_block(blocks[4].clone()).unwrap();
        assert_eq!(inserted.hash, blocks[4].hash());
        assert_eq!(chain.camera().longest_chain(), blocks);
        assert_eq!(*network.requests.lock().unwrap(), 4);
        assert_eq!(
            *network.broadcasts.lock().unwrap(),
            vec![Message::ReceiveBlock(blocks[4].clone())]
        );
    }

    #[test]
    fn adding_twice_is_a_rejected_duplicate_and_not_rebroadcast() {
        let (mut tree_manager, _, network) = setup(16);
        let blocks = mined_chain(1);

        tree_manager.add_block(blocks[0].clone()).unwrap();
        assert_eq!(
            tree_manager.add_block(blocks[0].clone()),
            Err(AddBlockError::Rejected(ValidationError::DuplicateBlock {
                block: blocks[0].hash()
            }))
        );
        assert_eq!(network.broadcasts.lock().unwrap().len(), 1);
    }

    #[test]
    fn block_with_unknown_ancestry_is_orphaned() {
        let (mut tree_manager, chain, network) = setup(16);
        let blocks = mined_chain(3);
        // Peers have the parent but not the genesis block.
        network.serve(&blocks[1]);

        assert_eq!(
            tree_manager.add_block(blocks[2].clone()),
            Err(AddBlockError::Orphaned {
                block: blocks[2].hash(),
                missing: blocks[0].hash(),
            })
        );
        assert!(chain.camera().is_empty());
        assert!(network.broadcasts.lock().unwrap().is_empty());
    }

    #[test]
    fn fetching_stops_at_the_depth_limit() {
        let (mut tree_manager, chain, network) = setup(3);
        let blocks = mined_chain(10);
        blocks.iter().for_each(|block| network.serve(block));

        assert!(matches!(
            tree_manager.add_block(blocks[9].clone()),
            Err(AddBlockError::Orphaned { .. })
        ));
        assert_eq!(*network.requests.lock().unwrap(), 3);
        assert!(chain.camera().is_empty());

        // Once the older part of the chain is known, the rest fits within the limit.
        tree_manager.add_block(blocks[6].clone()).unwrap_err();
        assert!(tree_manager.add_block(blocks[3].clone()).is_ok());
        assert!(tree_manager.add_block(blocks[6].clone()).is_ok());
        assert!(tree_manager.add_block(blocks[9].clone()).is_ok());
        assert_eq!(chain.camera().head(), Some(blocks[9].hash()));
    }

    #[test]
    fn roots_are_synced_from_peers() {
        let (mut tree_manager, chain, network) = setup(16);
        let blocks = mined_chain(2);
        blocks.iter().for_each(|block| network.serve(block));

        tree_manager.sync_roots();
        assert_eq!(chain.camera().roots(), vec![blocks[0].clone()]);
        assert_eq!(chain.camera().len(), 1);

        // Syncing again is harmless.
        tree_manager.sync_roots();
        assert_eq!(chain.camera().len(), 1);
    }
}
