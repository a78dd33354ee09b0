/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The full, unconfirmed state produced by replaying a chain, and the rules for applying a block to it.

use std::collections::HashMap;

use crate::{
    config::Economics,
    types::{
        block::{Block, BlockOp, BlockType},
        data_types::{AccountId, Balance, BlockHeight, RecordData, MAX_RECORDS},
    },
};

use super::StateError;

/// A file as seen by the replay, remembering at which height each part of it was written.
#[derive(Clone, Debug)]
pub(crate) struct FileEntry {
    pub(crate) creator: AccountId,
    pub(crate) created_at: BlockHeight,
    pub(crate) records: Vec<(BlockHeight, RecordData)>,
}

/// Account balances and files after applying some prefix of a chain, with no confirmation filtering.
///
/// If `economics` is `None`, rewards and fees are not tracked and [`NotEnoughMoney`](StateError::NotEnoughMoney)
/// is never returned.
#[derive(Clone, Debug, Default)]
pub(crate) struct LedgerState {
    economics: Option<Economics>,
    accounts: HashMap<AccountId, Balance>,
    files: HashMap<String, FileEntry>,
}

impl LedgerState {
    pub(crate) fn new(economics: Option<Economics>) -> Self {
        Self {
            economics,
            accounts: HashMap::new(),
            files: HashMap::new(),
        }
    }

    /// Replay `path`, a chain of blocks in order from its root. The block at index `i` is taken to be at
    /// height `i`.
    pub(crate) fn replay<'a>(
        economics: Option<Economics>,
        path: impl IntoIterator<Item = &'a Block>,
    ) -> Result<Self, StateError> {
        let mut ledger = Self::new(economics);
        for (height, block) in path.into_iter().enumerate() {
            ledger.apply_block(block, BlockHeight::new(height as u64))?;
        }
        Ok(ledger)
    }

    /// Apply `block`, located at `height`, in full: credit its miner, then apply each of its records in
    /// order, each seeing the effects of those before it.
    ///
    /// On error, the state may have been partially updated and should be discarded.
    pub(crate) fn apply_block(&mut self, block: &Block, height: BlockHeight) -> Result<(), StateError> {
        match block.block_type() {
            BlockType::Genesis => {
                if height != BlockHeight::new(0) {
                    return Err(StateError::UnexpectedGenesis {
                        block: block.hash(),
                        height,
                    });
                }
                if !block.records().is_empty() {
                    return Err(StateError::UnexpectedRecords { block: block.hash() });
                }
            }
            BlockType::NoOp => {
                if !block.records().is_empty() {
                    return Err(StateError::UnexpectedRecords { block: block.hash() });
                }
                self.credit_reward(block.miner_id(), BlockType::NoOp);
            }
            BlockType::Regular => {
                self.credit_reward(block.miner_id(), BlockType::Regular);
                for op in block.records() {
                    self.apply_op(op, height)?;
                }
            }
        }
        Ok(())
    }

    /// Credit `miner` with the reward for mining a block of class `block_type`.
    pub(crate) fn credit_reward(&mut self, miner: &AccountId, block_type: BlockType) {
        let Some(economics) = self.economics else {
            return;
        };
        let reward = match block_type {
            BlockType::Genesis => return,
            BlockType::NoOp => economics.no_op_reward,
            BlockType::Regular => economics.op_reward,
        };
        let balance = self.accounts.entry(miner.clone()).or_insert(0);
        *balance = balance.saturating_add(reward);
    }

    /// Apply a single `op` carried by a block at `height`.
    ///
    /// Every check happens before anything is written, so on error the state is left untouched.
    pub(crate) fn apply_op(&mut self, op: &BlockOp, height: BlockHeight) -> Result<(), StateError> {
        // 1. Filesystem semantics.
        match op {
            BlockOp::CreateFile { filename, .. } => {
                if self.files.contains_key(filename) {
                    return Err(StateError::FileAlreadyExists {
                        filename: filename.clone(),
                    });
                }
            }
            BlockOp::AppendFile {
                filename,
                record_number,
                ..
            } => {
                let file = self
                    .files
                    .get(filename)
                    .ok_or_else(|| StateError::FileDoesNotExist {
                        filename: filename.clone(),
                    })?;
                let expected = file.records.len();
                if expected >= MAX_RECORDS as usize {
                    return Err(StateError::MaxLengthReached {
                        filename: filename.clone(),
                    });
                }
                if *record_number as usize != expected {
                    return Err(StateError::AppendDuplicate {
                        filename: filename.clone(),
                        expected: expected as u16,
                        found: *record_number,
                    });
                }
            }
            BlockOp::DeleteFile { filename, .. } => {
                if !self.files.contains_key(filename) {
                    return Err(StateError::FileDoesNotExist {
                        filename: filename.clone(),
                    });
                }
            }
        }

        // 2. Economics.
        let fee = self.fee(op);
        if fee > 0 {
            let creator = op.creator();
            let balance = self.balance(creator);
            if balance < fee {
                return Err(StateError::NotEnoughMoney {
                    account: creator.clone(),
                    balance,
                    fee,
                });
            }
            self.accounts.insert(creator.clone(), balance - fee);
        }

        // 3. Effects.
        match op {
            BlockOp::CreateFile { creator, filename } => {
                self.files.insert(
                    filename.clone(),
                    FileEntry {
                        creator: creator.clone(),
                        created_at: height,
                        records: Vec::new(),
                    },
                );
            }
            BlockOp::AppendFile { filename, data, .. } => {
                if let Some(file) = self.files.get_mut(filename) {
                    file.records.push((height, data.clone()));
                }
            }
            BlockOp::DeleteFile { filename, .. } => {
                self.files.remove(filename);
            }
        }

        Ok(())
    }

    fn fee(&self, op: &BlockOp) -> Balance {
        match (self.economics, op) {
            (None, _) => 0,
            (Some(economics), BlockOp::CreateFile { .. }) => economics.create_fee,
            (Some(economics), BlockOp::AppendFile { .. }) => economics.append_fee,
            (Some(_), BlockOp::DeleteFile { .. }) => 0,
        }
    }

    pub(crate) fn balance(&self, account: &AccountId) -> Balance {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    pub(crate) fn accounts(&self) -> &HashMap<AccountId, Balance> {
        &self.accounts
    }

    pub(crate) fn files(&self) -> &HashMap<String, FileEntry> {
        &self.files
    }
}
