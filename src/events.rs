/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Notifications that are emitted when significant things happen in the local node.
//!
//! ## Event enum
//!
//! Significant occurrences in the node include inserting a new block into the fork tree, switching to
//! a new longest chain, mining a block, and receiving a job from a peer. Each of these corresponds to
//! a variant of the [event enum](Event). Each variant tuple contains an inner struct type storing
//! information that summarizes the particular kind of event. Every event is timestamped with the time
//! at which it happened.
//!
//! ## Event handlers
//!
//! Library users can register event handler closures, which are internally called by the library's
//! [event bus](crate::event_bus) thread when the corresponding event happens. Handlers are registered
//! through the setters of [`NodeSpec`](crate::node::NodeSpec).
//!
//! ## Timing
//!
//! Events are always emitted **after** the corresponding occurrence is "completed". So for example,
//! [`InsertBlockEvent`] is only emitted after the insertion has been applied to the fork tree.

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::{
    state::StateError,
    types::{
        block::{BlockOp, BlockType},
        data_types::{BlockHeight, CryptoHash},
    },
    validator::ValidationError,
};

/// Enumerates all events defined for blockfs.
pub enum Event {
    // Events that change the fork tree.
    InsertBlock(InsertBlockEvent),
    UpdateHead(UpdateHeadEvent),
    RejectBlock(RejectBlockEvent),
    OrphanBlock(OrphanBlockEvent),
    FetchBlock(FetchBlockEvent),

    // Events emitted by the miner.
    MineBlock(MineBlockEvent),
    DiscardStaleBlock(DiscardStaleBlockEvent),
    DropJob(DropJobEvent),

    // Events that involve the job queue or peers.
    SubmitJob(SubmitJobEvent),
    ReceiveJob(ReceiveJobEvent),
    ReceiveBlock(ReceiveBlockEvent),
}

impl Event {
    /// Publish this event on the event bus, if there is one.
    ///
    /// Publishing never blocks and never fails: if the event bus has already shut down, the event is
    /// dropped.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(self);
        }
    }
}

/// A block passed validation and was inserted into the fork tree.
pub struct InsertBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: BlockHeight,
}

/// The head of the longest chain changed.
pub struct UpdateHeadEvent {
    pub timestamp: SystemTime,
    pub head: CryptoHash,
    pub height: BlockHeight,
}

/// A block failed validation for a reason other than a missing parent.
pub struct RejectBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub reason: ValidationError,
}

/// A block was discarded because its ancestry could not be completed from peers.
pub struct OrphanBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub missing: CryptoHash,
}

/// A block was requested from peers while completing the ancestry of another block.
pub struct FetchBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub found: bool,
}

/// The local miner found a nonce for a block extending the head it started from.
pub struct MineBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub block_type: BlockType,
    pub ops: usize,
}

/// The local miner found a nonce, but the head moved while it was mining, so the block was dropped.
pub struct DiscardStaleBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
}

/// A queued operation was removed from the job queue because it can never be applied.
pub struct DropJobEvent {
    pub timestamp: SystemTime,
    pub op: BlockOp,
    pub reason: StateError,
}

/// An operation was submitted to the local job queue.
pub struct SubmitJobEvent {
    pub timestamp: SystemTime,
    pub op: BlockOp,
}

/// An operation was received from a peer and queued.
pub struct ReceiveJobEvent {
    pub timestamp: SystemTime,
    pub op: BlockOp,
}

/// A block was received from a peer.
pub struct ReceiveBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
}
