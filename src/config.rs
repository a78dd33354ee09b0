/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration as specified by the operator.
//!
//! A [`Configuration`] is built with the builder pattern and then split up into smaller,
//! component-specific config structs before being passed to components:
//!
//! ```
//! # use std::time::Duration;
//! # use blockfs::{config::Configuration, types::data_types::AccountId};
//! let configuration = Configuration::builder()
//!     .miner_id(AccountId::new("miner-1"))
//!     .op_difficulty(16)
//!     .no_op_difficulty(12)
//!     .op_reward(5)
//!     .no_op_reward(2)
//!     .create_fee(3)
//!     .append_fee(1)
//!     .confirms_per_file_create(5)
//!     .confirms_per_file_append(2)
//!     .ops_per_block(8)
//!     .build();
//! ```
//!
//! ## Confirmations
//!
//! `confirms_per_file_create` and `confirms_per_file_append` are the number of blocks that must follow
//! the block carrying a create (respectively, an append) on the longest chain before
//! [`RecordFs`](crate::record_fs::RecordFs) considers the operation final. They do not affect what the
//! validator accepts.
//!
//! ## Log Events
//!
//! blockfs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a [logging
//! implementation](https://docs.rs/log/latest/log/#available-logging-implementations).

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::types::data_types::{AccountId, Balance};

#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.miner_id(...)`
    - `.op_difficulty(...)`
    - `.no_op_difficulty(...)`
    - `.op_reward(...)`
    - `.no_op_reward(...)`
    - `.create_fee(...)`
    - `.append_fee(...)`
    - `.confirms_per_file_create(...)`
    - `.confirms_per_file_append(...)`
    - `.ops_per_block(...)`

    Optional:
    - `.max_fetch_depth(...)` (default: 1024)
    - `.confirmation_poll_interval(...)` (default: 100ms)
    - `.log_events(...)` (default: false)
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the account credited with the rewards of blocks mined by this node. Required."))]
    pub miner_id: AccountId,
    #[builder(setter(doc = "Set the number of leading zero bits required of operation-carrying blocks. Required."))]
    pub op_difficulty: u32,
    #[builder(setter(doc = "Set the number of leading zero bits required of no-op and genesis blocks. Required."))]
    pub no_op_difficulty: u32,
    #[builder(setter(doc = "Set the reward credited to the miner of an operation-carrying block. Required."))]
    pub op_reward: Balance,
    #[builder(setter(doc = "Set the reward credited to the miner of a no-op block. Required."))]
    pub no_op_reward: Balance,
    #[builder(setter(doc = "Set the fee charged to the creator of a CreateFile operation. Required."))]
    pub create_fee: Balance,
    #[builder(setter(doc = "Set the fee charged to the creator of an AppendFile operation. Required."))]
    pub append_fee: Balance,
    #[builder(setter(doc = "Set the number of blocks that must follow a create before it is considered confirmed. Required."))]
    pub confirms_per_file_create: u64,
    #[builder(setter(doc = "Set the number of blocks that must follow an append before it is considered confirmed. Required."))]
    pub confirms_per_file_append: u64,
    #[builder(setter(doc = "Set the maximum number of operations a mined block may carry, plus one. Required."))]
    pub ops_per_block: usize,
    #[builder(default = 1024, setter(doc = "Set the maximum number of ancestors fetched from peers while adding a single block. Optional."))]
    pub max_fetch_depth: usize,
    #[builder(default = Duration::from_millis(100), setter(doc = "Set how often blocking client operations poll for confirmation. Optional."))]
    pub confirmation_poll_interval: Duration,
    #[builder(default = false, setter(doc = "Enable logging of events? Optional."))]
    pub log_events: bool,
}

/// Fixed rewards and fees that drive the accounts state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Economics {
    pub op_reward: Balance,
    pub no_op_reward: Balance,
    pub create_fee: Balance,
    pub append_fee: Balance,
}

/// Proof-of-work difficulty, in leading zero bits, per block class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Difficulty {
    pub op: u32,
    pub no_op: u32,
}

/// Confirmation depths applied when deriving the filesystem state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Confirmations {
    pub create: u64,
    pub append: u64,
}

/// Immutable parameters that define the behaviour of the
/// [`BlockCalculator`](crate::miner::block_calculator::BlockCalculator).
#[derive(Clone)]
pub(crate) struct MinerConfiguration {
    pub(crate) miner_id: AccountId,
    pub(crate) difficulty: Difficulty,
    pub(crate) ops_per_block: usize,
}

/// Immutable parameters that define the behaviour of the [`TreeManager`](crate::tree_manager::TreeManager).
#[derive(Clone, Copy)]
pub(crate) struct TreeManagerConfiguration {
    pub(crate) max_fetch_depth: usize,
}

impl Configuration {
    pub fn economics(&self) -> Economics {
        Economics {
            op_reward: self.op_reward,
            no_op_reward: self.no_op_reward,
            create_fee: self.create_fee,
            append_fee: self.append_fee,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        Difficulty {
            op: self.op_difficulty,
            no_op: self.no_op_difficulty,
        }
    }

    pub fn confirmations(&self) -> Confirmations {
        Confirmations {
            create: self.confirms_per_file_create,
            append: self.confirms_per_file_append,
        }
    }
}

impl From<&Configuration> for MinerConfiguration {
    fn from(config: &Configuration) -> Self {
        MinerConfiguration {
            miner_id: config.miner_id.clone(),
            difficulty: config.difficulty(),
            ops_per_block: config.ops_per_block,
        }
    }
}

impl From<&Configuration> for TreeManagerConfiguration {
    fn from(config: &Configuration) -> Self {
        TreeManagerConfiguration {
            max_fetch_depth: config.max_fetch_depth,
        }
    }
}
