/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deterministic derivation of account balances and filesystem contents from a chain.
//!
//! Neither state is ever stored. Both are recomputed on every query by walking the path from a node's
//! root to the node and replaying every block on it, in order:
//! 1. The block's miner is credited its reward (op-blocks and no-op blocks pay different rewards; genesis
//!    pays nothing).
//! 2. Each operation the block carries is checked against the state left by everything before it,
//!    including earlier operations in the same block, and then its fee is charged to its creator.
//!
//! The result only depends on the blocks on the path, never on other forks or on the order in which
//! blocks were inserted.
//!
//! [Accounts state](accounts::accounts_state) reports the balances after the last block. [Filesystem
//! state](filesystem::filesystem_state) additionally hides every create and append that does not yet
//! have enough blocks on top of it.
//!
//! Replay fails with a [`StateError`] if the path breaks the same rules that the
//! [`ChainValidator`](crate::validator::ChainValidator) enforces on insertion. This can only happen on
//! paths that were assembled without validation.

use crate::types::data_types::{AccountId, Balance, BlockHeight, CryptoHash, RecordNumber};

pub mod accounts;

pub mod filesystem;

pub(crate) mod ledger;

pub use accounts::{accounts_state, AccountsState};
pub use filesystem::{filesystem_state, FileInfo, FilesystemState};

/// Ways in which a block or one of its operations can be inconsistent with the state it is applied on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A genesis block appeared anywhere but at the root of a path.
    UnexpectedGenesis { block: CryptoHash, height: BlockHeight },

    /// A genesis or no-op block carried operations.
    UnexpectedRecords { block: CryptoHash },

    /// `CreateFile` on a name that already exists.
    FileAlreadyExists { filename: String },

    /// `AppendFile` or `DeleteFile` on a name that does not exist.
    FileDoesNotExist { filename: String },

    /// `AppendFile` on a file that already holds [`MAX_RECORDS`](crate::types::data_types::MAX_RECORDS)
    /// records.
    MaxLengthReached { filename: String },

    /// `AppendFile` whose record number is not the next one in the file.
    AppendDuplicate {
        filename: String,
        expected: RecordNumber,
        found: RecordNumber,
    },

    /// The creator of an operation cannot afford its fee.
    NotEnoughMoney {
        account: AccountId,
        balance: Balance,
        fee: Balance,
    },
}

impl StateError {
    /// Whether the operation that caused this error may succeed if submitted again unchanged, once more
    /// blocks have been added.
    ///
    /// Being short of money is temporary, and so is appending past the end of a file whose earlier records
    /// are still being mined. Every other error is permanent for the operation as submitted.
    pub fn is_retryable(&self) -> bool {
        match self {
            StateError::NotEnoughMoney { .. } => true,
            StateError::AppendDuplicate { expected, found, .. } => found > expected,
            _ => false,
        }
    }
}
