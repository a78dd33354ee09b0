/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Confirmed filesystem contents derived from a chain.
//!
//! A create or append is only *confirmed* once enough blocks have been built on top of the block that
//! carries it. With the queried node at height `D`, a file created at height `d` is visible only if
//! `D - d >= confirmations.create`, and a record appended at height `d` is visible only if
//! `D - d >= confirmations.append`. A visible file exposes the longest prefix of its records that is
//! confirmed, so a file whose create is confirmed but whose appends are not is shown empty.
//!
//! Deletes take effect as soon as they are replayed.

use std::collections::BTreeMap;

use crate::{
    config::Confirmations,
    fork_tree::{ForkTree, NodeId},
    types::{
        block::Block,
        data_types::{AccountId, BlockHeight, RecordData, RecordNumber},
    },
};

use super::{ledger::LedgerState, StateError};

/// A confirmed file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub creator: AccountId,
    pub number_of_records: RecordNumber,
    pub data: Vec<RecordData>,
}

/// Every confirmed file on a chain, by name.
pub type FilesystemState = BTreeMap<String, FileInfo>;

/// Compute the confirmed files as of the block at `node`, replaying the path from its root.
///
/// `None` stands for the head of an empty tree and yields an empty map.
pub fn filesystem_state(
    tree: &ForkTree,
    confirmations: &Confirmations,
    node: Option<NodeId>,
) -> Result<FilesystemState, StateError> {
    let Some(node) = node else {
        return Ok(FilesystemState::new());
    };
    let path = tree.path_to(node);
    filesystem_state_from_path(confirmations, path.iter().map(|id| tree.node(*id).block()))
}

/// Compute the confirmed files as of the last block of `path`, which must start at a root.
pub fn filesystem_state_from_path<'a>(
    confirmations: &Confirmations,
    path: impl IntoIterator<Item = &'a Block>,
) -> Result<FilesystemState, StateError> {
    let path: Vec<&Block> = path.into_iter().collect();
    let Some(top) = path.len().checked_sub(1) else {
        return Ok(FilesystemState::new());
    };
    let top = BlockHeight::new(top as u64);

    // Fees have no bearing on which operations a valid chain contains.
    let ledger = LedgerState::replay(None, path)?;

    let confirmed = |at: BlockHeight, depth: u64| top - at >= depth;
    Ok(ledger
        .files()
        .iter()
        .filter(|(_, file)| confirmed(file.created_at, confirmations.create))
        .map(|(filename, file)| {
            let data: Vec<RecordData> = file
                .records
                .iter()
                .take_while(|(appended_at, _)| confirmed(*appended_at, confirmations.append))
                .map(|(_, data)| data.clone())
                .collect();
            let info = FileInfo {
                creator: file.creator.clone(),
                number_of_records: data.len() as RecordNumber,
                data,
            };
            (filename.clone(), info)
        })
        .collect())
}
