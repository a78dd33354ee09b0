/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Account balances derived from a chain.

use std::collections::BTreeMap;

use crate::{
    config::Economics,
    fork_tree::{ForkTree, NodeId},
    types::{
        block::Block,
        data_types::{AccountId, Balance},
    },
};

use super::{ledger::LedgerState, StateError};

/// Balance of every account that has ever been credited or charged on a chain.
pub type AccountsState = BTreeMap<AccountId, Balance>;

/// Compute the balances after the block at `node`, replaying the path from its root.
///
/// `None` stands for the head of an empty tree and yields an empty map.
pub fn accounts_state(
    tree: &ForkTree,
    economics: &Economics,
    node: Option<NodeId>,
) -> Result<AccountsState, StateError> {
    let Some(node) = node else {
        return Ok(AccountsState::new());
    };
    let path = tree.path_to(node);
    accounts_state_from_path(economics, path.iter().map(|id| tree.node(*id).block()))
}

/// Compute the balances after the last block of `path`, which must start at a root.
pub fn accounts_state_from_path<'a>(
    economics: &Economics,
    path: impl IntoIterator<Item = &'a Block>,
) -> Result<AccountsState, StateError> {
    let ledger = LedgerState::replay(Some(*economics), path)?;
    Ok(ledger
        .accounts()
        .iter()
        .map(|(account, balance)| (account.clone(), *balance))
        .collect())
}
