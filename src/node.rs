/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a node.
//!
//! A node keeps a replica of the fork tree, mines blocks on top of its longest chain, and exchanges
//! blocks and jobs with its peers. The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the node](NodeSpec) with:
//!   1. `NodeSpec::builder` to construct a `NodeSpecBuilder`,
//!   2. The setters of the `NodeSpecBuilder`, and
//!   3. The `NodeSpecBuilder::build` method to construct a [`NodeSpec`],
//! - The function to [start](NodeSpec::start) a [`Node`] given its specification,
//! - [The type](Node) which keeps the node alive, and through which its state is queried and jobs are
//!   submitted.
//!
//! ## Starting a node
//!
//! ```ignore
//! let node =
//!     NodeSpec::builder()
//!     .network(network)
//!     .configuration(configuration)
//!     .genesis(Some(genesis))
//!     .on_insert_block(insert_block_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//!
//! - `.network(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! `.genesis(...)` provides a genesis block to insert before anything else. Nodes that are meant to
//! share one chain should either all be given the same genesis block, or be started one after the
//! other so that later nodes pick up the genesis of earlier ones from their peers. A node that starts
//! with an empty tree and finds no roots among its peers mines its own genesis block.
//!
//! The remaining optional setters register user-defined event handlers for events from
//! [crate::events]:
//! - `.on_insert_block(...)`
//! - `.on_update_head(...)`
//! - `.on_reject_block(...)`
//! - `.on_orphan_block(...)`
//! - `.on_fetch_block(...)`
//! - `.on_mine_block(...)`
//! - `.on_discard_stale_block(...)`
//! - `.on_drop_job(...)`
//! - `.on_submit_job(...)`
//! - `.on_receive_job(...)`
//! - `.on_receive_block(...)`

use std::{
    sync::{
        mpsc::{self, Sender},
        Mutex, MutexGuard, PoisonError,
    },
    thread::JoinHandle,
    time::SystemTime,
};

use typed_builder::TypedBuilder;

use crate::{
    chain::{Chain, ChainCamera, InsertedBlock},
    config::{Configuration, Confirmations},
    event_bus::*,
    events::*,
    miner::{block_calculator::BlockCalculator, cancellation::CancellationToken, job_queue::JobQueue},
    networking::{network::Network, receiving::start_polling, sending::SenderHandle},
    state::{AccountsState, FilesystemState, StateError},
    tree_manager::{AddBlockError, TreeManager},
    types::{
        block::{Block, BlockOp},
        data_types::CryptoHash,
    },
};

/// Stores all necessary parameters and trait implementations required to run a [`Node`].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [NodeSpec]. On the builder call the following methods to construct a valid [NodeSpec].

    Required:
    - `.network(...)`
    - `.configuration(...)`

    Optional:
    - `.genesis(...)`
    - `.on_insert_block(...)`
    - `.on_update_head(...)`
    - `.on_reject_block(...)`
    - `.on_orphan_block(...)`
    - `.on_fetch_block(...)`
    - `.on_mine_block(...)`
    - `.on_discard_stale_block(...)`
    - `.on_drop_job(...)`
    - `.on_submit_job(...)`
    - `.on_receive_job(...)`
    - `.on_receive_block(...)`
"))]
pub struct NodeSpec<N: Network + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::network::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(doc = "Set the genesis block inserted when the node starts. Optional."))]
    genesis: Option<Block>,
    #[builder(default, setter(transform = |handler: impl Fn(&InsertBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<InsertBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is inserted into the fork tree. Optional."))]
    on_insert_block: Option<HandlerPtr<InsertBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateHeadEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateHeadEvent>),
    doc = "Register a handler closure to be invoked after the head of the longest chain changes. Optional."))]
    on_update_head: Option<HandlerPtr<UpdateHeadEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectBlockEvent>),
    doc = "Register a handler closure to be invoked after a block fails validation. Optional."))]
    on_reject_block: Option<HandlerPtr<RejectBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&OrphanBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<OrphanBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is discarded because its ancestry could not be completed. Optional."))]
    on_orphan_block: Option<HandlerPtr<OrphanBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&FetchBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<FetchBlockEvent>),
    doc = "Register a handler closure to be invoked after a missing ancestor is requested from peers. Optional."))]
    on_fetch_block: Option<HandlerPtr<FetchBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&MineBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<MineBlockEvent>),
    doc = "Register a handler closure to be invoked after the node mines a block. Optional."))]
    on_mine_block: Option<HandlerPtr<MineBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DiscardStaleBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DiscardStaleBlockEvent>),
    doc = "Register a handler closure to be invoked after a mined block is discarded because the head moved. Optional."))]
    on_discard_stale_block: Option<HandlerPtr<DiscardStaleBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DropJobEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DropJobEvent>),
    doc = "Register a handler closure to be invoked after a queued job is dropped because it can never be applied. Optional."))]
    on_drop_job: Option<HandlerPtr<DropJobEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SubmitJobEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SubmitJobEvent>),
    doc = "Register a handler closure to be invoked after a job is submitted to this node. Optional."))]
    on_submit_job: Option<HandlerPtr<SubmitJobEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveJobEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveJobEvent>),
    doc = "Register a handler closure to be invoked after a job is received from a peer. Optional."))]
    on_receive_job: Option<HandlerPtr<ReceiveJobEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is received from a peer. Optional."))]
    on_receive_block: Option<HandlerPtr<ReceiveBlockEvent>>,
}

impl<N: Network + 'static> NodeSpec<N> {
    /// Starts all threads and channels associated with running a node, and returns the handles to them
    /// in a [`Node`] struct.
    pub fn start(self) -> Node<N> {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            UserEventHandlers {
                on_insert_block: self.on_insert_block,
                on_update_head: self.on_update_head,
                on_reject_block: self.on_reject_block,
                on_orphan_block: self.on_orphan_block,
                on_fetch_block: self.on_fetch_block,
                on_mine_block: self.on_mine_block,
                on_discard_stale_block: self.on_discard_stale_block,
                on_drop_job: self.on_drop_job,
                on_submit_job: self.on_submit_job,
                on_receive_job: self.on_receive_job,
                on_receive_block: self.on_receive_block,
            },
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let (event_bus_shutdown, event_bus) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus =
                    start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
                (Some(event_bus_shutdown), Some(event_bus))
            }
            None => (None, None),
        };

        let chain = Chain::new(
            self.configuration.economics(),
            self.configuration.difficulty(),
            event_publisher.clone(),
        );
        let mut tree_manager = TreeManager::new(
            (&self.configuration).into(),
            chain.clone(),
            self.network.clone(),
            event_publisher.clone(),
        );

        if let Some(genesis) = self.genesis {
            let hash = genesis.hash();
            if let Err(error) = chain.insert(genesis) {
                log::warn!("genesis block {} was not inserted: {:?}", hash, error);
            }
        }
        tree_manager.sync_roots();

        let job_queue = JobQueue::new();
        let shutdown = CancellationToken::new();

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let poller = start_polling(
            self.network.clone(),
            tree_manager.clone(),
            job_queue.clone(),
            poller_shutdown_receiver,
            event_publisher.clone(),
        );

        let (no_op_miner, job_miner) = BlockCalculator::new(
            (&self.configuration).into(),
            chain.clone(),
            tree_manager.clone(),
            job_queue.clone(),
            shutdown.clone(),
            event_publisher.clone(),
        )
        .start();

        Node {
            chain_camera: chain.camera(),
            configuration: self.configuration,
            tree_manager: Mutex::new(tree_manager),
            sender: Mutex::new(SenderHandle::new(self.network)),
            job_queue,
            shutdown,
            event_publisher,
            poller: Some(poller),
            poller_shutdown,
            no_op_miner: Some(no_op_miner),
            job_miner: Some(job_miner),
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of a node. When this value is dropped, all background threads are
/// gracefully shut down.
pub struct Node<N: Network + 'static> {
    chain_camera: ChainCamera,
    configuration: Configuration,
    tree_manager: Mutex<TreeManager<N>>,
    sender: Mutex<SenderHandle<N>>,
    job_queue: JobQueue,
    shutdown: CancellationToken,
    event_publisher: Option<Sender<Event>>,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    no_op_miner: Option<JoinHandle<()>>,
    job_miner: Option<JoinHandle<()>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<N: Network + 'static> Node<N> {
    /// Returns a [`ChainCamera`] which can be used to peek into the node's fork tree, for example to
    /// serve peers' block and root requests.
    pub fn chain_camera(&self) -> &ChainCamera {
        &self.chain_camera
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Get the files on the longest chain, counting a create (respectively, an append) only once it is
    /// followed by at least `confirms_create` (respectively, `confirms_append`) blocks.
    pub fn filesystem_state(
        &self,
        confirms_create: u64,
        confirms_append: u64,
    ) -> Result<FilesystemState, StateError> {
        self.chain_camera.filesystem_state(&Confirmations {
            create: confirms_create,
            append: confirms_append,
        })
    }

    /// Get the balances on the longest chain.
    pub fn accounts_state(&self) -> Result<AccountsState, StateError> {
        self.chain_camera.accounts_state()
    }

    pub fn roots(&self) -> Vec<Block> {
        self.chain_camera.roots()
    }

    pub fn head(&self) -> Option<CryptoHash> {
        self.chain_camera.head()
    }

    /// Queue `op` to be mined, and send it to peers so that their miners can mine it too.
    ///
    /// Returns false, doing nothing, if an identical operation is already queued.
    pub fn submit_job(&self, op: BlockOp) -> bool {
        if !self.job_queue.push(op.clone()) {
            return false;
        }
        Event::SubmitJob(SubmitJobEvent {
            timestamp: SystemTime::now(),
            op: op.clone(),
        })
        .publish(&self.event_publisher);
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).broadcast(op);
        true
    }

    /// Insert `block` into the fork tree, fetching its missing ancestors from peers first, and broadcast
    /// it if it was inserted.
    pub fn add_block(&self, block: Block) -> Result<InsertedBlock, AddBlockError> {
        // Fetching ancestors can take a while, so work on a copy rather than holding the lock.
        let mut tree_manager = self.tree_manager().clone();
        tree_manager.add_block(block)
    }

    pub(crate) fn job_queue(&self) -> &JobQueue {
        &self.job_queue
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    fn tree_manager(&self) -> MutexGuard<'_, TreeManager<N>> {
        self.tree_manager.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<N: Network + 'static> Drop for Node<N> {
    fn drop(&mut self) {
        // The miners and the poller publish events, so the event bus is shut down last to catch every
        // event they publish on the way out.

        self.shutdown.request_stop();
        for miner in [self.no_op_miner.take(), self.job_miner.take()].into_iter().flatten() {
            if miner.join().is_err() {
                log::warn!("a mining worker panicked");
            }
        }

        let _ = self.poller_shutdown.send(());
        if let Some(poller) = self.poller.take() {
            if poller.join().is_err() {
                log::warn!("the poller panicked");
            }
        }

        self.event_bus_shutdown.iter().for_each(|shutdown| {
            let _ = shutdown.send(());
        });
        if let Some(event_bus) = self.event_bus.take() {
            if event_bus.join().is_err() {
                log::warn!("the event bus panicked");
            }
        }
    }
}
