/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Block`] and [`BlockOp`] types and their associated methods.
//!
//! Blocks are immutable once built: every field is private and only readable through getters. The
//! only way to obtain a block with a different nonce is to [`mine`](Block::mine) it, which returns a
//! new block.
//!
//! ## Hashing
//!
//! A block's [hash](Block::hash) is the first 16 bytes of the SHA256 digest over the borsh
//! serialization of the tuple `(block_type, prev_hash, miner_id, records, nonce)`. Because the nonce is
//! the last field, a proof-of-work search can hash the first four fields once and then only feed the
//! 8 little-endian bytes of each candidate nonce into a clone of that hasher.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::miner::cancellation::CancellationToken;

use super::crypto_primitives::{finalize, leading_zero_bits, CryptoHasher, Digest};
use super::data_types::{AccountId, CryptoHash, Nonce, RecordData, RecordNumber};

/// Number of nonces tried between two polls of the [`CancellationToken`] in [`Block::mine`].
pub const NONCE_BATCH: u64 = 1 << 12;

/// The class of a block. The class decides which proof-of-work difficulty and which miner reward
/// apply to the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum BlockType {
    /// The first block of a chain. Its `prev_hash` is ignored and it credits no reward.
    Genesis,
    /// A block that carries no operations. Mined while there are no jobs to earn the miner a reward.
    NoOp,
    /// A block that carries one or more [`BlockOp`]s.
    Regular,
}

/// Discriminant of a [`BlockOp`], used where operations are matched by kind rather than content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum BlockOpType {
    CreateFile,
    AppendFile,
    DeleteFile,
}

/// One filesystem operation carried by a [`Regular`](BlockType::Regular) block.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum BlockOp {
    /// Create an empty file called `filename`, owned by `creator`.
    CreateFile {
        creator: AccountId,
        filename: String,
    },

    /// Append `data` to `filename` as the record with index `record_number`.
    AppendFile {
        creator: AccountId,
        filename: String,
        record_number: RecordNumber,
        data: RecordData,
    },

    /// Remove `filename` and all of its records.
    DeleteFile {
        creator: AccountId,
        filename: String,
    },
}

impl BlockOp {
    pub fn create_file(creator: AccountId, filename: impl Into<String>) -> Self {
        BlockOp::CreateFile {
            creator,
            filename: filename.into(),
        }
    }

    pub fn append_file(
        creator: AccountId,
        filename: impl Into<String>,
        record_number: RecordNumber,
        data: RecordData,
    ) -> Self {
        BlockOp::AppendFile {
            creator,
            filename: filename.into(),
            record_number,
            data,
        }
    }

    pub fn delete_file(creator: AccountId, filename: impl Into<String>) -> Self {
        BlockOp::DeleteFile {
            creator,
            filename: filename.into(),
        }
    }

    pub fn op_type(&self) -> BlockOpType {
        match self {
            BlockOp::CreateFile { .. } => BlockOpType::CreateFile,
            BlockOp::AppendFile { .. } => BlockOpType::AppendFile,
            BlockOp::DeleteFile { .. } => BlockOpType::DeleteFile,
        }
    }

    /// The account that pays for this operation.
    pub fn creator(&self) -> &AccountId {
        match self {
            BlockOp::CreateFile { creator, .. }
            | BlockOp::AppendFile { creator, .. }
            | BlockOp::DeleteFile { creator, .. } => creator,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            BlockOp::CreateFile { filename, .. }
            | BlockOp::AppendFile { filename, .. }
            | BlockOp::DeleteFile { filename, .. } => filename,
        }
    }

    /// The record number of an append, `None` for every other operation.
    pub fn record_number(&self) -> Option<RecordNumber> {
        match self {
            BlockOp::AppendFile { record_number, .. } => Some(*record_number),
            BlockOp::CreateFile { .. } | BlockOp::DeleteFile { .. } => None,
        }
    }
}

/// A mined (or about to be mined) unit of the chain.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    block_type: BlockType,
    prev_hash: CryptoHash,
    miner_id: AccountId,
    records: Vec<BlockOp>,
    nonce: Nonce,
}

impl Block {
    /// Build a genesis block. Genesis blocks have an all-zeroes `prev_hash` and no records.
    pub fn genesis(miner_id: AccountId, nonce: Nonce) -> Block {
        Block {
            block_type: BlockType::Genesis,
            prev_hash: CryptoHash::zero(),
            miner_id,
            records: Vec::new(),
            nonce,
        }
    }

    /// Build an unmined no-op block extending `prev_hash`.
    pub fn no_op(prev_hash: CryptoHash, miner_id: AccountId, nonce: Nonce) -> Block {
        Block {
            block_type: BlockType::NoOp,
            prev_hash,
            miner_id,
            records: Vec::new(),
            nonce,
        }
    }

    /// Build an unmined block extending `prev_hash` that carries `records`, applied in order.
    pub fn regular(
        prev_hash: CryptoHash,
        miner_id: AccountId,
        records: Vec<BlockOp>,
        nonce: Nonce,
    ) -> Block {
        Block {
            block_type: BlockType::Regular,
            prev_hash,
            miner_id,
            records,
            nonce,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn prev_hash(&self) -> &CryptoHash {
        &self.prev_hash
    }

    pub fn miner_id(&self) -> &AccountId {
        &self.miner_id
    }

    pub fn records(&self) -> &[BlockOp] {
        &self.records
    }

    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Whether this block is subject to the operation-block difficulty and reward (as opposed to the
    /// no-op ones).
    pub fn is_op_block(&self) -> bool {
        self.block_type == BlockType::Regular
    }

    /// Compute the content hash of this block.
    pub fn hash(&self) -> CryptoHash {
        let mut hasher = self.header_hasher();
        hasher.update(self.nonce.to_le_bytes());
        finalize(hasher)
    }

    /// Check whether the hash of this block has at least `difficulty` leading zero bits.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        leading_zero_bits(&self.hash().bytes()) >= difficulty
    }

    /// Search for a nonce that makes this block's hash have at least `difficulty` leading zero bits,
    /// starting from the block's current nonce and counting upwards (wrapping around).
    ///
    /// Returns the mined block, or `None` if a stop was requested on `cancel` before a solution was
    /// found, or if the entire nonce space was exhausted.
    pub fn mine(&self, difficulty: u32, cancel: &CancellationToken) -> Option<Block> {
        let header_hasher = self.header_hasher();
        let start = self.nonce;
        let mut nonce = start;

        loop {
            for _ in 0..NONCE_BATCH {
                let mut hasher = header_hasher.clone();
                hasher.update(nonce.to_le_bytes());
                if leading_zero_bits(&finalize(hasher).bytes()) >= difficulty {
                    return Some(Block {
                        nonce,
                        ..self.clone()
                    });
                }

                nonce = nonce.wrapping_add(1);
                if nonce == start {
                    return None;
                }
            }

            if cancel.is_stop_requested() {
                return None;
            }
        }
    }

    /// A hasher that has consumed every field of the block except the nonce.
    fn header_hasher(&self) -> CryptoHasher {
        let mut hasher = CryptoHasher::new();
        // Safety: serializing into an in-memory buffer cannot fail.
        hasher.update(&self.block_type.try_to_vec().unwrap());
        hasher.update(&self.prev_hash.try_to_vec().unwrap());
        hasher.update(&self.miner_id.try_to_vec().unwrap());
        hasher.update(&self.records.try_to_vec().unwrap());
        hasher
    }
}
