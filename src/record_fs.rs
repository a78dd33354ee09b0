/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A blocking, file-oriented client API layered over a [`Node`].
//!
//! Writes ([`create_file`](RecordFs::create_file), [`append_record`](RecordFs::append_record),
//! [`delete_file`](RecordFs::delete_file)) submit a job to the node and then wait until the longest
//! chain reflects it. Creates and appends are only reported done once they have been followed by
//! `confirms_per_file_create` (respectively, `confirms_per_file_append`) blocks. Deletes take effect as
//! soon as they are mined.
//!
//! Waiting is unbounded. While waiting, a write keeps an eye on its job: if the job vanished from the
//! queue without reaching the chain (for example, because the block that carried it was left behind on
//! a shorter fork), it is submitted again. An append whose record number was taken by someone else's
//! record is renumbered and resubmitted. A write that lacks the money for its fee simply waits, since
//! the node's own no-op mining eventually earns it.
//!
//! Waits can be abandoned from another thread through the [cancellation
//! token](RecordFs::cancellation_token), in which case the write returns [`RecordFsError::Shutdown`].
//!
//! Reads ([`list_files`](RecordFs::list_files), [`total_records`](RecordFs::total_records),
//! [`read_record`](RecordFs::read_record)) see only confirmed files and records.

use std::{
    fmt::{self, Display, Formatter},
    thread,
    time::Duration,
};

use crate::{
    miner::cancellation::CancellationToken,
    networking::network::Network,
    node::Node,
    state::{FileInfo, FilesystemState, StateError},
    types::{
        block::BlockOp,
        data_types::{RecordData, RecordNumber, MAX_FILENAME_LEN, MAX_RECORDS},
    },
};

/// Polls back off up to this multiple of the configured confirmation poll interval.
const MAX_BACKOFF: u32 = 8;

/// Ways in which a [`RecordFs`] operation can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFsError {
    /// The filename is empty or longer than [`MAX_FILENAME_LEN`] bytes.
    BadFilename,
    FileExists,
    FileDoesNotExist,
    /// The file already holds [`MAX_RECORDS`] records.
    FileMaxLenReached,
    RecordOutOfRange,
    /// The wait was cancelled, or the node is shutting down.
    Shutdown,
    /// The longest chain could not be replayed.
    StateError(StateError),
}

impl Display for RecordFsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RecordFsError::BadFilename => write!(
                f,
                "filename must be between 1 and {} bytes long",
                MAX_FILENAME_LEN
            ),
            RecordFsError::FileExists => write!(f, "file already exists"),
            RecordFsError::FileDoesNotExist => write!(f, "file does not exist"),
            RecordFsError::FileMaxLenReached => write!(f, "file has reached its maximum length"),
            RecordFsError::RecordOutOfRange => write!(f, "record number is out of range"),
            RecordFsError::Shutdown => write!(f, "operation was cancelled"),
            RecordFsError::StateError(error) => write!(f, "cannot replay the chain: {:?}", error),
        }
    }
}

impl std::error::Error for RecordFsError {}

impl From<StateError> for RecordFsError {
    fn from(value: StateError) -> Self {
        RecordFsError::StateError(value)
    }
}

/// File operations on the filesystem replicated by a [`Node`], acting as the node's miner account.
pub struct RecordFs<'a, N: Network + 'static> {
    node: &'a Node<N>,
    cancel: CancellationToken,
}

impl<'a, N: Network + 'static> RecordFs<'a, N> {
    pub fn new(node: &'a Node<N>) -> Self {
        Self {
            node,
            cancel: node.shutdown_token().child(),
        }
    }

    /// Get a token which, when stopped, makes every pending and future write of this `RecordFs` return
    /// [`RecordFsError::Shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Create an empty file named `filename`, and wait until its creation is confirmed.
    pub fn create_file(&self, filename: &str) -> Result<(), RecordFsError> {
        check_filename(filename)?;
        let me = &self.node.configuration().miner_id;
        let job_queue = self.node.job_queue();
        if self.unconfirmed()?.contains_key(filename) || job_queue.has_pending_create(filename) {
            return Err(RecordFsError::FileExists);
        }

        let op = BlockOp::create_file(me.clone(), filename);
        self.node.submit_job(op.clone());
        let confirms = self.node.configuration().confirms_per_file_create;

        self.wait_until(|| match self.unconfirmed()?.get(filename) {
            Some(file) if file.creator != *me => Err(RecordFsError::FileExists),
            Some(_) => Ok(self
                .node
                .filesystem_state(confirms, 0)?
                .get(filename)
                .is_some_and(|file| file.creator == *me)
                .then_some(())),
            None => {
                self.resubmit_if_lost(&op);
                Ok(None)
            }
        })
    }

    /// Append `record` to `filename`, and wait until the append is confirmed. Returns the record number
    /// the record ended up with.
    pub fn append_record(
        &self,
        filename: &str,
        record: RecordData,
    ) -> Result<RecordNumber, RecordFsError> {
        check_filename(filename)?;
        let me = &self.node.configuration().miner_id;
        let job_queue = self.node.job_queue();
        let confirms = self.node.configuration().confirms_per_file_append;

        loop {
            let record_number = self.next_record_number(filename)?;
            let op = BlockOp::append_file(me.clone(), filename, record_number, record.clone());
            self.node.submit_job(op.clone());

            let appended = self.wait_until(|| {
                let unconfirmed = self.unconfirmed()?;
                let Some(file) = unconfirmed.get(filename) else {
                    job_queue.remove(&op);
                    return Err(RecordFsError::FileDoesNotExist);
                };
                match file.data.get(record_number as usize) {
                    Some(data) if *data == record => Ok(self
                        .node
                        .filesystem_state(0, confirms)?
                        .get(filename)
                        .and_then(|file| file.data.get(record_number as usize))
                        .is_some_and(|data| *data == record)
                        .then_some(true)),
                    // Another record took this slot.
                    Some(_) => Ok(Some(false)),
                    // The records before this one are no longer on their way.
                    None if !self.gap_is_pending(filename, file, record_number) => Ok(Some(false)),
                    None => {
                        self.resubmit_if_lost(&op);
                        Ok(None)
                    }
                }
            })?;

            if appended {
                return Ok(record_number);
            }
            job_queue.remove(&op);
        }
    }

    /// Delete `filename` and all of its records, and wait until the deletion is mined.
    pub fn delete_file(&self, filename: &str) -> Result<(), RecordFsError> {
        check_filename(filename)?;
        if !self.unconfirmed()?.contains_key(filename) {
            return Err(RecordFsError::FileDoesNotExist);
        }

        let op = BlockOp::delete_file(self.node.configuration().miner_id.clone(), filename);
        self.node.submit_job(op.clone());

        self.wait_until(|| {
            if self.unconfirmed()?.contains_key(filename) {
                self.resubmit_if_lost(&op);
                Ok(None)
            } else {
                Ok(Some(()))
            }
        })
    }

    /// Get the names of every confirmed file, in lexicographic order.
    pub fn list_files(&self) -> Result<Vec<String>, RecordFsError> {
        Ok(self.confirmed()?.into_keys().collect())
    }

    /// Get the number of confirmed records in `filename`.
    pub fn total_records(&self, filename: &str) -> Result<RecordNumber, RecordFsError> {
        self.confirmed()?
            .get(filename)
            .map(|file| file.number_of_records)
            .ok_or(RecordFsError::FileDoesNotExist)
    }

    /// Read the confirmed record `record_number` of `filename`.
    pub fn read_record(
        &self,
        filename: &str,
        record_number: RecordNumber,
    ) -> Result<RecordData, RecordFsError> {
        let mut confirmed = self.confirmed()?;
        let file = confirmed
            .get_mut(filename)
            .ok_or(RecordFsError::FileDoesNotExist)?;
        if record_number as usize >= file.data.len() {
            return Err(RecordFsError::RecordOutOfRange);
        }
        Ok(file.data.swap_remove(record_number as usize))
    }

    /// Every file on the longest chain, including creates and appends that are not yet confirmed.
    fn unconfirmed(&self) -> Result<FilesystemState, RecordFsError> {
        Ok(self.node.filesystem_state(0, 0)?)
    }

    /// Files and records on the longest chain that have the configured number of confirmations.
    fn confirmed(&self) -> Result<FilesystemState, RecordFsError> {
        let configuration = self.node.configuration();
        Ok(self.node.filesystem_state(
            configuration.confirms_per_file_create,
            configuration.confirms_per_file_append,
        )?)
    }

    /// The record number a new append to `filename` should use: the one after every record already on
    /// the chain and every append already queued.
    fn next_record_number(&self, filename: &str) -> Result<RecordNumber, RecordFsError> {
        let unconfirmed = self.unconfirmed()?;
        let file = unconfirmed
            .get(filename)
            .ok_or(RecordFsError::FileDoesNotExist)?;
        let after_pending = self
            .node
            .job_queue()
            .last_pending_append(filename)
            .map_or(0, |last| last as u32 + 1);
        let next = (file.number_of_records as u32).max(after_pending);
        if next >= MAX_RECORDS as u32 {
            return Err(RecordFsError::FileMaxLenReached);
        }
        Ok(next as RecordNumber)
    }

    /// Whether an append that would fill the next free slot of `file` is queued, so that an append of
    /// `record_number` can still become applicable.
    fn gap_is_pending(&self, filename: &str, file: &FileInfo, record_number: RecordNumber) -> bool {
        let next = file.number_of_records;
        next == record_number || self.node.job_queue().has_pending_append(filename, next)
    }

    fn resubmit_if_lost(&self, op: &BlockOp) {
        if !self.node.job_queue().contains(op) {
            log::debug!("resubmitting job on {}", op.filename());
            self.node.submit_job(op.clone());
        }
    }

    /// Call `poll` until it returns a value, sleeping between calls with exponential backoff.
    fn wait_until<T>(
        &self,
        mut poll: impl FnMut() -> Result<Option<T>, RecordFsError>,
    ) -> Result<T, RecordFsError> {
        let base = self.node.configuration().confirmation_poll_interval;
        let mut interval = base;
        loop {
            if self.cancel.is_stop_requested() {
                return Err(RecordFsError::Shutdown);
            }
            if let Some(value) = poll()? {
                return Ok(value);
            }
            thread::sleep(interval);
            interval = (interval * 2).min(base * MAX_BACKOFF).max(Duration::from_millis(1));
        }
    }
}

fn check_filename(filename: &str) -> Result<(), RecordFsError> {
    if filename.is_empty() || filename.len() > MAX_FILENAME_LEN {
        return Err(RecordFsError::BadFilename);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_must_fit() {
        assert_eq!(check_filename(""), Err(RecordFsError::BadFilename));
        assert_eq!(check_filename(&"f".repeat(MAX_FILENAME_LEN)), Ok(()));
        assert_eq!(
            check_filename(&"f".repeat(MAX_FILENAME_LEN + 1)),
            Err(RecordFsError::BadFilename)
        );
    }

    #[test]
    fn errors_display() {
        assert_eq!(RecordFsError::FileExists.to_string(), "file already exists");
        assert_eq!(
            RecordFsError::BadFilename.to_string(),
            "filename must be between 1 and 64 bytes long"
        );
    }
}
