/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! blockfs does not implement a transport. Library users provide one by implementing the
//! [`Network`](network::Network) trait, which covers two protocols:
//! 1. **Push**: newly accepted blocks and newly submitted jobs are broadcast to every peer as
//!    [`Message`](messages::Message)s, fire-and-forget. Messages pushed by peers are picked up by the
//!    node's poller thread.
//! 2. **Retrieval**: while completing the ancestry of a block, the
//!    [`TreeManager`](crate::tree_manager::TreeManager) asks peers for single blocks by hash, and on
//!    startup it asks them for every root they know. Peers answer these requests by reading their
//!    [`ChainCamera`](crate::chain::ChainCamera).

pub mod messages;

pub mod network;

pub(crate) mod receiving;

pub(crate) mod sending;
