/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules that decide whether a block may join the [fork tree](crate::fork_tree).
//!
//! # Validation steps
//!
//! [`ChainValidator::validate_and_insert`] runs the following checks on a candidate block, in order,
//! stopping at the first one that fails:
//!
//! |Step|Check|Error|
//! |---|---|---|
//! |1|The block's hash is not in the tree yet.|[`DuplicateBlock`](ValidationError::DuplicateBlock)|
//! |2|The hash has enough leading zero bits for the block's class.|[`InvalidProofOfWork`](ValidationError::InvalidProofOfWork)|
//! |3|A genesis block is only accepted into a tree with no genesis.|[`DuplicateGenesis`](ValidationError::DuplicateGenesis)|
//! |4|The block's parent is in the tree.|[`MissingParent`](ValidationError::MissingParent)|
//! |5|The block's miner reward and operations apply cleanly on the state at its parent.|[`StateError`](ValidationError::StateError)|
//!
//! A block that passes every check is inserted into the tree, as a root if it is a genesis block and as
//! a child of its parent otherwise.
//!
//! # Replay cache
//!
//! Step 5 needs the state at the candidate's parent. Since blocks usually arrive one after another on
//! the longest chain, the validator keeps the state it computed for the last block it inserted, and
//! only replays from the root when a candidate extends some other node.
//!
//! The validator never fetches missing blocks itself. [`MissingParent`](ValidationError::MissingParent)
//! is left for the [`TreeManager`](crate::tree_manager::TreeManager) to resolve.

pub mod chain_validator;

pub mod errors;

pub use chain_validator::ChainValidator;
pub use errors::ValidationError;
