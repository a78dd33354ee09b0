/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::{block::Block, data_types::CryptoHash};

use super::messages::Message;

pub trait Network: Clone + Send {
    /// Send a message to all peers without blocking.
    fn broadcast(&mut self, message: Message);

    /// Receive a message from any peer. Returns immediately with a None if no message is available now.
    fn recv(&mut self) -> Option<Message>;

    /// Ask peers for the block whose hash is `hash`. Returns None if no peer has it.
    ///
    /// This may block while peers are asked, but implementations should give up after a bounded time.
    fn get_remote_block(&mut self, hash: &CryptoHash) -> Option<Block>;

    /// Ask peers for every root block they know.
    ///
    /// Like [`get_remote_block`](Self::get_remote_block), this may block for a bounded time.
    fn get_remote_roots(&mut self) -> Vec<Block>;
}
