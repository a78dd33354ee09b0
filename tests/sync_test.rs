use std::time::Duration;

use blockfs::{
    state::accounts::accounts_state_from_path, tree_manager::AddBlockError,
    validator::ValidationError,
};
use log::LevelFilter;

mod common;

use common::{
    logging::{log_with_context, setup_logger},
    network::mock_network,
    node::{shared_genesis, wait_until, TestNode},
};

const TIMEOUT: Duration = Duration::from_secs(120);

/// Tests that a single node, started without a genesis block and without peers, mines its own chain and
/// earns the rewards for it.
#[test]
fn lone_node_mines_its_own_chain_test() {
    setup_logger(LevelFilter::Info);

    let mut network_stubs = mock_network(1);
    let node = TestNode::new("lone", network_stubs.remove(0), None);

    wait_until(TIMEOUT, "the lone node's chain reaches height 5", || {
        node.height() >= 5
    });

    wait_until(TIMEOUT, "the mined blocks are reported to the handler", || {
        node.mined_blocks() >= 6
    });

    let chain = node.node().chain_camera().longest_chain();
    assert_eq!(node.node().roots().len(), 1);
    assert_eq!(chain[0].miner_id().as_str(), "lone");

    // Genesis pays nothing and every other block on the chain is a no-op block paying 5.
    let economics = node.node().configuration().economics();
    let accounts = accounts_state_from_path(&economics, &chain).unwrap();
    let mined_on_chain = chain.len() as u64 - 1;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[chain[0].miner_id()], 5 * mined_on_chain);
}

/// Tests that nodes started from the same genesis block agree on a common history.
///
/// Starts three nodes sharing one genesis block, lets them mine against each other, and checks that
/// their longest chains end up sharing a block at height 10.
#[test]
fn nodes_converge_on_the_longest_chain_test() {
    setup_logger(LevelFilter::Info);

    let genesis = shared_genesis();
    let nodes: Vec<TestNode> = mock_network(3)
        .into_iter()
        .enumerate()
        .map(|(i, network)| TestNode::new(&format!("node-{}", i), network, Some(genesis.clone())))
        .collect();

    for node in &nodes {
        assert_eq!(node.node().roots(), vec![genesis.clone()]);
    }

    wait_until(TIMEOUT, "every node agrees on the block at height 10", || {
        // Stay a few blocks behind the heads, where forks have settled.
        nodes.iter().all(|node| node.height() >= 15) && {
            let first = nodes[0].block_at(10);
            first.is_some() && nodes.iter().all(|node| node.block_at(10) == first)
        }
    });

    // Every node replays the agreed prefix to the same balances.
    log_with_context(None, "Comparing the balances computed by each node.");
    let economics = nodes[0].node().configuration().economics();
    let balances: Vec<_> = nodes
        .iter()
        .map(|node| {
            let chain = node.node().chain_camera().longest_chain();
            accounts_state_from_path(&economics, &chain[..=10]).unwrap()
        })
        .collect();
    assert!(balances.iter().all(|accounts| *accounts == balances[0]));
    assert_eq!(balances[0].values().sum::<u64>(), 5 * 10);
}

/// Tests that a node that joins late adopts the existing network's genesis block and catches up with its
/// chain by fetching the ancestors of the blocks it receives.
#[test]
fn late_joiner_catches_up_test() {
    setup_logger(LevelFilter::Info);

    let mut network_stubs = mock_network(2);
    let lagging_network = network_stubs.pop().unwrap();

    let early_node = TestNode::new("early", network_stubs.pop().unwrap(), None);
    wait_until(TIMEOUT, "the early node's chain reaches height 8", || {
        early_node.height() >= 8
    });
    let early_block = early_node.block_at(8).unwrap();

    log_with_context(None, "Start the lagging node.");
    let lagging_node = TestNode::new("lagging", lagging_network, None);
    assert_eq!(lagging_node.node().roots(), early_node.node().roots());

    wait_until(TIMEOUT, "the lagging node has the early node's chain", || {
        lagging_node.block_at(8).as_ref() == Some(&early_block)
    });
    log_with_context(
        Some(lagging_node.name()),
        &format!("caught up to height {}", lagging_node.height()),
    );
}

/// Tests that adding a block that a node already has is harmless.
#[test]
fn adding_a_known_block_is_idempotent_test() {
    setup_logger(LevelFilter::Info);

    let mut network_stubs = mock_network(1);
    let node = TestNode::new("idempotent", network_stubs.remove(0), None);
    wait_until(TIMEOUT, "the node's chain reaches height 3", || node.height() >= 3);

    let block = node.block_at(2).unwrap();
    assert_eq!(
        node.node().add_block(block.clone()),
        Err(AddBlockError::Rejected(ValidationError::DuplicateBlock {
            block: block.hash()
        }))
    );

    // The node keeps mining, so only check that the block is not on the chain twice.
    assert_eq!(
        node.node()
            .chain_camera()
            .longest_chain()
            .iter()
            .filter(|on_chain| **on_chain == block)
            .count(),
        1
    );
}
