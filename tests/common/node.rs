use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use blockfs::{
    config::Configuration,
    events::{InsertBlockEvent, MineBlockEvent},
    miner::cancellation::CancellationToken,
    node::{Node, NodeSpec},
    types::{block::Block, data_types::AccountId},
};

use crate::common::network::NetworkStub;

use super::logging::log_with_context;

/// Difficulty of every block in tests. Low enough for blocks to come every few milliseconds.
pub(crate) const DIFFICULTY: u32 = 12;

/// Things the nodes will have in common:
/// - Economics and difficulty.
/// - Confirmation depths.
///
/// Things that they will differ in:
/// - Miner account.
/// - Network instance.
pub(crate) struct TestNode {
    name: String,
    mined_blocks: Arc<AtomicUsize>,
    node: Node<NetworkStub>,
}

impl TestNode {
    pub(crate) fn new(name: &str, network: NetworkStub, genesis: Option<Block>) -> TestNode {
        let configuration = Configuration::builder()
            .miner_id(AccountId::new(name))
            .op_difficulty(DIFFICULTY)
            .no_op_difficulty(DIFFICULTY)
            .op_reward(1)
            .no_op_reward(5)
            .create_fee(3)
            .append_fee(1)
            .confirms_per_file_create(2)
            .confirms_per_file_append(2)
            .ops_per_block(5)
            .confirmation_poll_interval(Duration::from_millis(10))
            .log_events(true)
            .build();

        let mined_blocks = Arc::new(AtomicUsize::new(0));
        let node = NodeSpec::builder()
            .network(network.clone())
            .configuration(configuration)
            .genesis(genesis)
            .on_insert_block(insert_block_handler(name.to_string()))
            .on_mine_block(mine_block_handler(mined_blocks.clone()))
            .build()
            .start();
        network.register(node.chain_camera().clone());

        TestNode {
            name: name.to_string(),
            mined_blocks,
            node,
        }
    }

    pub(crate) fn node(&self) -> &Node<NetworkStub> {
        &self.node
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn mined_blocks(&self) -> usize {
        self.mined_blocks.load(Ordering::SeqCst)
    }

    /// The height of the head of the longest chain, or 0 if the tree is empty.
    pub(crate) fn height(&self) -> u64 {
        self.node
            .chain_camera()
            .head_height()
            .map_or(0, |height| height.int())
    }

    /// The block at `height` on the longest chain.
    pub(crate) fn block_at(&self, height: u64) -> Option<Block> {
        self.node
            .chain_camera()
            .longest_chain()
            .get(height as usize)
            .cloned()
    }
}

/// A genesis block that every node in a test can start from.
pub(crate) fn shared_genesis() -> Block {
    Block::genesis(AccountId::new("genesis"), 0)
        .mine(DIFFICULTY, &CancellationToken::new())
        .unwrap()
}

/// Poll `condition` until it holds, panicking if it does not within `timeout`.
pub(crate) fn wait_until(timeout: Duration, description: &str, mut condition: impl FnMut() -> bool) {
    log_with_context(None, &format!("Waiting until {}.", description));
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("timed out waiting until {}", description);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn insert_block_handler(name: String) -> impl Fn(&InsertBlockEvent) + Send + 'static {
    move |insert_block_event| {
        log::trace!(
            "{}: Inserted Block, block hash: {}, height: {}",
            name,
            insert_block_event.block,
            insert_block_event.height
        );
    }
}

fn mine_block_handler(mined_blocks: Arc<AtomicUsize>) -> impl Fn(&MineBlockEvent) + Send + 'static {
    move |_| {
        mined_blocks.fetch_add(1, Ordering::SeqCst);
    }
}
