/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions for receiving messages from the P2P network.

use std::{
    sync::mpsc::{Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::{Duration, SystemTime},
};

use crate::{
    events::{Event, ReceiveBlockEvent, ReceiveJobEvent},
    miner::job_queue::JobQueue,
    tree_manager::TreeManager,
};

use super::{messages::Message, network::Network};

/// How long the poller sleeps when the network has no message for it.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn the poller thread, which polls the [`Network`] for messages and handles them:
/// 1. Blocks are passed to the [`TreeManager`], which inserts them (fetching their missing ancestors
///    first) and re-broadcasts the ones that were new.
/// 2. Jobs are added to the [`JobQueue`], unless an identical job is already queued.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    mut tree_manager: TreeManager<N>,
    job_queue: JobQueue,
    shutdown_signal: Receiver<()>,
    event_publisher: Option<Sender<Event>>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match network.recv() {
            Some(Message::ReceiveBlock(block)) => {
                Event::ReceiveBlock(ReceiveBlockEvent {
                    timestamp: SystemTime::now(),
                    block: block.hash(),
                })
                .publish(&event_publisher);
                // Rejections and orphans are published as events by the tree manager.
                let _ = tree_manager.add_block(block);
            }
            Some(Message::ReceiveJob(op)) => {
                if job_queue.push(op.clone()) {
                    Event::ReceiveJob(ReceiveJobEvent {
                        timestamp: SystemTime::now(),
                        op,
                    })
                    .publish(&event_publisher);
                }
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    })
}
