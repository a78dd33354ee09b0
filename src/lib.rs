/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A proof-of-work blockchain that replicates an append-only record filesystem across miner nodes.
//!
//! Every node keeps a [fork tree](fork_tree) of every valid block it has seen. Blocks carry filesystem
//! operations (create a file, append a fixed-size record, delete a file) that are paid for with coin
//! earned by mining. The agreed-upon history is the longest chain in the tree, and both the
//! [balances and the files](state) are derived by replaying it from its genesis block.
//!
//! The main entry points are:
//! - [`NodeSpec`](node::NodeSpec), to configure and start a [`Node`](node::Node), which validates
//!   blocks, mines, and gossips with peers through a user-provided [`Network`](networking::network::Network).
//! - [`RecordFs`](record_fs::RecordFs), a blocking file API over a running node.
//! - [`ChainCamera`](chain::ChainCamera), a read-only view into a node's fork tree.

pub mod chain;

pub mod config;

pub mod event_bus;

pub mod events;

pub mod fork_tree;

pub(crate) mod logging;

pub mod miner;

pub mod networking;

pub mod node;

pub mod record_fs;

pub mod state;

pub mod tree_manager;

pub mod types;

pub mod validator;
