/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple components of blockfs.
//!
//! Other types, specific to single components, can be found in those components' modules, e.g.,
//! [`crate::state`] for the derived account and filesystem states.

pub mod block;

pub mod crypto_primitives;

pub mod data_types;
