/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Number of bytes in a [`CryptoHash`].
pub const HASH_LEN: usize = 16;

/// Number of bytes in a single record of a file.
pub const RECORD_SIZE: usize = 512;

/// Maximum length in bytes of a filename.
pub const MAX_FILENAME_LEN: usize = 64;

/// Maximum number of records a single file can hold.
pub const MAX_RECORDS: u16 = u16::MAX;

/// 16-byte content hash of a block.
///
/// Within blockfs, `CryptoHash`-es are always the first 16 bytes of a SHA256 digest over the borsh
/// serialization of a block's fields. See [`Block::hash`](super::block::Block::hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; HASH_LEN]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// The all-zeroes hash. Used as the `prev_hash` of genesis blocks.
    pub const fn zero() -> Self {
        Self([0; HASH_LEN])
    }

    /// Get the inner `[u8; 16]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; HASH_LEN] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Height of a node in the fork tree.
///
/// Starts at 0 for roots, and increases by 1 for every subsequent "level" of blocks connected by
/// [`prev_hash`](super::block::Block::prev_hash) links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BorshDeserialize, BorshSerialize)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockHeight`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl AddAssign<u64> for BlockHeight {
    fn add_assign(&mut self, rhs: u64) {
        self.0.add_assign(rhs)
    }
}

impl Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> Self::Output {
        BlockHeight::new(self.0.add(rhs))
    }
}

impl Sub<BlockHeight> for BlockHeight {
    type Output = u64;
    fn sub(self, rhs: BlockHeight) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

/// Identifier of an account. Miners are credited, and operation creators are charged, through their
/// `AccountId`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new `AccountId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Amount of coin held by an account.
pub type Balance = u64;

/// Index of a record within a file. The first record appended to a file has record number 0.
pub type RecordNumber = u16;

/// Proof-of-work solution carried by a block.
pub type Nonce = u64;

/// One record's worth of bytes.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct RecordData([u8; RECORD_SIZE]);

impl RecordData {
    /// Create a new `RecordData` wrapping `bytes`.
    pub const fn new(bytes: [u8; RECORD_SIZE]) -> Self {
        Self(bytes)
    }

    /// A record filled with zeroes. Used as the payload of operations that carry no record.
    pub const fn empty() -> Self {
        Self([0; RECORD_SIZE])
    }

    /// Create a record whose leading bytes are `prefix` and whose remaining bytes are zero. Bytes of
    /// `prefix` beyond [`RECORD_SIZE`] are ignored.
    pub fn from_prefix(prefix: &[u8]) -> Self {
        let mut bytes = [0; RECORD_SIZE];
        let len = prefix.len().min(RECORD_SIZE);
        bytes[..len].copy_from_slice(&prefix[..len]);
        Self(bytes)
    }

    pub const fn bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }
}

impl Debug for RecordData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let used = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        write!(f, "RecordData({} bytes used)", used)
    }
}

impl Default for RecordData {
    fn default() -> Self {
        Self::empty()
    }
}
