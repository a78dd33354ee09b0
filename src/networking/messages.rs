/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages that nodes push to each other.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::block::{Block, BlockOp};

/// All message variants broadcast between blockfs nodes.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// A block that the sender accepted into its fork tree.
    ReceiveBlock(Block),

    /// An operation that the sender queued for mining.
    ReceiveJob(BlockOp),
}

impl From<Block> for Message {
    fn from(value: Block) -> Self {
        Message::ReceiveBlock(value)
    }
}

impl From<BlockOp> for Message {
    fn from(value: BlockOp) -> Self {
        Message::ReceiveJob(value)
    }
}
