/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::{state::StateError, types::data_types::CryptoHash};

/// Enumerates the reasons a block can be refused by the [`ChainValidator`](super::ChainValidator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A block with the same hash is already in the tree.
    DuplicateBlock { block: CryptoHash },

    /// The block's hash has fewer leading zero bits than required for its class.
    InvalidProofOfWork { block: CryptoHash, difficulty: u32 },

    /// The block is a genesis block, but the tree already has one.
    DuplicateGenesis { block: CryptoHash },

    /// The block's parent is not in the tree.
    MissingParent { block: CryptoHash, parent: CryptoHash },

    /// See: [`StateError`].
    StateError(StateError),
}

impl From<StateError> for ValidationError {
    fn from(value: StateError) -> Self {
        ValidationError::StateError(value)
    }
}
