/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The queue of operations waiting to be mined, shared by the miner's workers and by job submitters.

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::types::{
    block::{BlockOp, BlockOpType},
    data_types::RecordNumber,
};

/// First-in, first-out set of pending [`BlockOp`]s. Cheap to clone; every clone shares the same queue.
#[derive(Clone, Default)]
pub(crate) struct JobQueue {
    jobs: Arc<(Mutex<VecDeque<BlockOp>>, Condvar)>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `op` behind every operation already queued. Returns false, leaving the queue unchanged, if
    /// an identical operation is already queued.
    pub(crate) fn push(&self, op: BlockOp) -> bool {
        let mut jobs = self.lock();
        if jobs.contains(&op) {
            return false;
        }
        jobs.push_back(op);
        self.jobs.1.notify_all();
        true
    }

    /// Get every queued operation, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<BlockOp> {
        self.lock().iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Block until the queue is non-empty or `timeout` elapses. Returns whether the queue is non-empty.
    pub(crate) fn wait_for_jobs(&self, timeout: Duration) -> bool {
        let jobs = self.lock();
        let (jobs, _) = self
            .jobs
            .1
            .wait_timeout_while(jobs, timeout, |jobs| jobs.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        !jobs.is_empty()
    }

    pub(crate) fn contains(&self, op: &BlockOp) -> bool {
        self.lock().contains(op)
    }

    /// Remove `op` if it is queued.
    pub(crate) fn remove(&self, op: &BlockOp) {
        self.lock().retain(|queued| queued != op);
    }

    /// Remove every queued operation that is made redundant by the operations of a block that was just
    /// mined.
    ///
    /// A queued operation is redundant if a mined operation has the same filename and kind. For appends,
    /// the queued record number must also not be greater than the mined one: a later append to the same
    /// file is still needed.
    pub(crate) fn remove_mined(&self, mined: &[BlockOp]) {
        self.lock().retain(|queued| {
            !mined.iter().any(|mined| {
                queued.filename() == mined.filename()
                    && queued.op_type() == mined.op_type()
                    && match (queued.record_number(), mined.record_number()) {
                        (Some(queued), Some(mined)) => queued <= mined,
                        _ => true,
                    }
            })
        });
    }

    /// Whether a `CreateFile` for `filename` is queued.
    pub(crate) fn has_pending_create(&self, filename: &str) -> bool {
        self.lock()
            .iter()
            .any(|op| op.op_type() == BlockOpType::CreateFile && op.filename() == filename)
    }

    /// Whether an append of record `record_number` to `filename` is queued.
    pub(crate) fn has_pending_append(&self, filename: &str, record_number: RecordNumber) -> bool {
        self.lock()
            .iter()
            .any(|op| op.filename() == filename && op.record_number() == Some(record_number))
    }

    /// The highest record number among queued appends to `filename`, if there are any.
    pub(crate) fn last_pending_append(&self, filename: &str) -> Option<RecordNumber> {
        self.lock()
            .iter()
            .filter(|op| op.filename() == filename)
            .filter_map(BlockOp::record_number)
            .max()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BlockOp>> {
        self.jobs.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
