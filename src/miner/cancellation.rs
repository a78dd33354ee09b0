/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cooperative cancellation for proof-of-work searches.
//!
//! A [`CancellationToken`] carries a *request* to stop. Nothing is ever interrupted forcibly: the
//! nonce search in [`Block::mine`](crate::types::block::Block::mine) polls its token once every
//! [`NONCE_BATCH`](crate::types::block::NONCE_BATCH) nonces and returns `None` once a stop has been
//! requested.
//!
//! Tokens form a tree. A token created with [`child`](CancellationToken::child) observes stop requests
//! made on its parent, but [`clear`](CancellationToken::clear)-ing a child only withdraws the child's own
//! request. The block calculator uses this to make node shutdown (the root token) override the
//! suspend/resume traffic between its two workers (child tokens), and gives every nonce search its own
//! child so that it can be abandoned once the head it builds on is replaced.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shareable request-to-stop flag. Clones refer to the same flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    stop_requested: Arc<AtomicBool>,
    parent: Option<Box<CancellationToken>>,
}

impl CancellationToken {
    /// Create a new root token with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that is considered stopped whenever either it or `self` has a stop requested.
    pub fn child(&self) -> Self {
        Self {
            stop_requested: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Ask every holder of this token (and of its children) to stop at their next poll.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst)
    }

    /// Withdraw this token's own stop request. A stop requested on an ancestor remains in effect.
    pub fn clear(&self) {
        self.stop_requested.store(false, Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_stop_requested())
    }
}
