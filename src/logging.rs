/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the node's
//! [configuration](crate::config::Configuration).
//!
//! blockfs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how an [InsertBlock](crate::events::InsertBlockEvent) is printed:
//!
//! ```text
//! InsertBlock, 1701329264, AAAfNGC, 17
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the hash of the inserted
//!   block.
//! - The fourth value is the height of the inserted block.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::{events::*, types::block::BlockOp};

// Names of each event in PascalCase for printing:
pub const INSERT_BLOCK: &str = "InsertBlock";
pub const UPDATE_HEAD: &str = "UpdateHead";
pub const REJECT_BLOCK: &str = "RejectBlock";
pub const ORPHAN_BLOCK: &str = "OrphanBlock";
pub const FETCH_BLOCK: &str = "FetchBlock";

pub const MINE_BLOCK: &str = "MineBlock";
pub const DISCARD_STALE_BLOCK: &str = "DiscardStaleBlock";
pub const DROP_JOB: &str = "DropJob";

pub const SUBMIT_JOB: &str = "SubmitJob";
pub const RECEIVE_JOB: &str = "ReceiveJob";
pub const RECEIVE_BLOCK: &str = "ReceiveBlock";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for InsertBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |insert_block_event: &InsertBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                INSERT_BLOCK,
                secs_since_unix_epoch(insert_block_event.timestamp),
                first_seven_base64_chars(&insert_block_event.block.bytes()),
                insert_block_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateHeadEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_head_event: &UpdateHeadEvent| {
            log::info!(
                "{}, {}, {}, {}",
                UPDATE_HEAD,
                secs_since_unix_epoch(update_head_event.timestamp),
                first_seven_base64_chars(&update_head_event.head.bytes()),
                update_head_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_block_event: &RejectBlockEvent| {
            log::info!(
                "{}, {}, {}, {:?}",
                REJECT_BLOCK,
                secs_since_unix_epoch(reject_block_event.timestamp),
                first_seven_base64_chars(&reject_block_event.block.bytes()),
                reject_block_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for OrphanBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |orphan_block_event: &OrphanBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ORPHAN_BLOCK,
                secs_since_unix_epoch(orphan_block_event.timestamp),
                first_seven_base64_chars(&orphan_block_event.block.bytes()),
                first_seven_base64_chars(&orphan_block_event.missing.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for FetchBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |fetch_block_event: &FetchBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                FETCH_BLOCK,
                secs_since_unix_epoch(fetch_block_event.timestamp),
                first_seven_base64_chars(&fetch_block_event.block.bytes()),
                fetch_block_event.found
            )
        };
        Box::new(logger)
    }
}

impl Logger for MineBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |mine_block_event: &MineBlockEvent| {
            log::info!(
                "{}, {}, {}, {:?}, {}",
                MINE_BLOCK,
                secs_since_unix_epoch(mine_block_event.timestamp),
                first_seven_base64_chars(&mine_block_event.block.bytes()),
                mine_block_event.block_type,
                mine_block_event.ops
            )
        };
        Box::new(logger)
    }
}

impl Logger for DiscardStaleBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |discard_stale_block_event: &DiscardStaleBlockEvent| {
            log::info!(
                "{}, {}, {}",
                DISCARD_STALE_BLOCK,
                secs_since_unix_epoch(discard_stale_block_event.timestamp),
                first_seven_base64_chars(&discard_stale_block_event.block.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for DropJobEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |drop_job_event: &DropJobEvent| {
            log::info!(
                "{}, {}, {}, {:?}",
                DROP_JOB,
                secs_since_unix_epoch(drop_job_event.timestamp),
                op_info(&drop_job_event.op),
                drop_job_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for SubmitJobEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |submit_job_event: &SubmitJobEvent| {
            log::info!(
                "{}, {}, {}",
                SUBMIT_JOB,
                secs_since_unix_epoch(submit_job_event.timestamp),
                op_info(&submit_job_event.op)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveJobEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_job_event: &ReceiveJobEvent| {
            log::info!(
                "{}, {}, {}",
                RECEIVE_JOB,
                secs_since_unix_epoch(receive_job_event.timestamp),
                op_info(&receive_job_event.op)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_block_event: &ReceiveBlockEvent| {
            log::info!(
                "{}, {}, {}",
                RECEIVE_BLOCK,
                secs_since_unix_epoch(receive_block_event.timestamp),
                first_seven_base64_chars(&receive_block_event.block.bytes())
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Kind, creator, filename, and (for appends) record number of `op`, separated by commas.
fn op_info(op: &BlockOp) -> String {
    match op.record_number() {
        Some(record_number) => format!(
            "{:?}, {}, {}, {}",
            op.op_type(),
            op.creator(),
            op.filename(),
            record_number
        ),
        None => format!("{:?}, {}, {}", op.op_type(), op.creator(), op.filename()),
    }
}
