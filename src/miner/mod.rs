/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Background proof-of-work mining.
//!
//! # Workers
//!
//! The miner runs two threads that share the [job queue](job_queue) and the fork tree:
//! 1. The **no-op worker** mines empty blocks on top of the current head, earning the miner the no-op
//!    reward. If the tree is empty, it mines a genesis block instead.
//! 2. The **job worker** waits for operations to be queued. When there are some, it suspends the no-op
//!    worker, picks the oldest operations that can be applied on the current head (dropping the ones
//!    that never can be), and mines a block carrying them. After the block is inserted, the operations
//!    it carries are removed from the queue. If none of the queued operations can be applied right now,
//!    it lets the no-op worker resume.
//!
//! # Cancellation
//!
//! Proof-of-work search is never interrupted forcibly. Instead, it polls a [`CancellationToken`]
//! every [`NONCE_BATCH`](crate::types::block::NONCE_BATCH) nonces. The node's shutdown token is the
//! root; the token that suspends the no-op worker is its child, so shutting down also stops a no-op
//! search in progress.
//!
//! # Stale blocks
//!
//! Mining can take a long time, during which a peer's block may become the new head. Before a mined
//! block is submitted, the worker checks that the head is still the block it mined on. If it is not,
//! the mined block is discarded and the worker starts over on the new head.
//!
//! [`CancellationToken`]: cancellation::CancellationToken

pub(crate) mod block_calculator;

pub mod cancellation;

pub(crate) mod job_queue;
