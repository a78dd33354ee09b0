/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which fires the handlers registered for each [event](crate::events).
//!
//! Handlers registered by the library user are stored in [`EventHandlers`] alongside the default
//! [logging](crate::logging) handlers, which are only present if `log_events` is enabled.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{events::*, logging::Logger};

/// Pointer to a handler closure, parametrised by the argument (for our use case, the event type).
pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Stores the handlers for each event, both user-defined and default logging handlers.
#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) insert_block_handlers: Vec<HandlerPtr<InsertBlockEvent>>,
    pub(crate) update_head_handlers: Vec<HandlerPtr<UpdateHeadEvent>>,
    pub(crate) reject_block_handlers: Vec<HandlerPtr<RejectBlockEvent>>,
    pub(crate) orphan_block_handlers: Vec<HandlerPtr<OrphanBlockEvent>>,
    pub(crate) fetch_block_handlers: Vec<HandlerPtr<FetchBlockEvent>>,
    pub(crate) mine_block_handlers: Vec<HandlerPtr<MineBlockEvent>>,
    pub(crate) discard_stale_block_handlers: Vec<HandlerPtr<DiscardStaleBlockEvent>>,
    pub(crate) drop_job_handlers: Vec<HandlerPtr<DropJobEvent>>,
    pub(crate) submit_job_handlers: Vec<HandlerPtr<SubmitJobEvent>>,
    pub(crate) receive_job_handlers: Vec<HandlerPtr<ReceiveJobEvent>>,
    pub(crate) receive_block_handlers: Vec<HandlerPtr<ReceiveBlockEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, adding the default logging handler for every event if
    /// `log_events` is true.
    pub(crate) fn new(log_events: bool, user_handlers: UserEventHandlers) -> EventHandlers {
        let mut handlers = EventHandlers::default();

        fn register<T: Logger>(
            list: &mut Vec<HandlerPtr<T>>,
            user_handler: Option<HandlerPtr<T>>,
            log_events: bool,
        ) {
            if let Some(handler) = user_handler {
                list.push(handler);
            }
            if log_events {
                list.push(T::get_logger());
            }
        }

        register(&mut handlers.insert_block_handlers, user_handlers.on_insert_block, log_events);
        register(&mut handlers.update_head_handlers, user_handlers.on_update_head, log_events);
        register(&mut handlers.reject_block_handlers, user_handlers.on_reject_block, log_events);
        register(&mut handlers.orphan_block_handlers, user_handlers.on_orphan_block, log_events);
        register(&mut handlers.fetch_block_handlers, user_handlers.on_fetch_block, log_events);
        register(&mut handlers.mine_block_handlers, user_handlers.on_mine_block, log_events);
        register(
            &mut handlers.discard_stale_block_handlers,
            user_handlers.on_discard_stale_block,
            log_events,
        );
        register(&mut handlers.drop_job_handlers, user_handlers.on_drop_job, log_events);
        register(&mut handlers.submit_job_handlers, user_handlers.on_submit_job, log_events);
        register(&mut handlers.receive_job_handlers, user_handlers.on_receive_job, log_events);
        register(&mut handlers.receive_block_handlers, user_handlers.on_receive_block, log_events);

        handlers
    }

    /// Whether no handler at all is registered, in which case there is no need for an event bus.
    pub(crate) fn is_empty(&self) -> bool {
        self.insert_block_handlers.is_empty()
            && self.update_head_handlers.is_empty()
            && self.reject_block_handlers.is_empty()
            && self.orphan_block_handlers.is_empty()
            && self.fetch_block_handlers.is_empty()
            && self.mine_block_handlers.is_empty()
            && self.discard_stale_block_handlers.is_empty()
            && self.drop_job_handlers.is_empty()
            && self.submit_job_handlers.is_empty()
            && self.receive_job_handlers.is_empty()
            && self.receive_block_handlers.is_empty()
    }

    /// Call every handler registered for the kind of `event`.
    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::InsertBlock(insert_block_event) => self
                .insert_block_handlers
                .iter()
                .for_each(|handler| handler(&insert_block_event)),

            Event::UpdateHead(update_head_event) => self
                .update_head_handlers
                .iter()
                .for_each(|handler| handler(&update_head_event)),

            Event::RejectBlock(reject_block_event) => self
                .reject_block_handlers
                .iter()
                .for_each(|handler| handler(&reject_block_event)),

            Event::OrphanBlock(orphan_block_event) => self
                .orphan_block_handlers
                .iter()
                .for_each(|handler| handler(&orphan_block_event)),

            Event::FetchBlock(fetch_block_event) => self
                .fetch_block_handlers
                .iter()
                .for_each(|handler| handler(&fetch_block_event)),

            Event::MineBlock(mine_block_event) => self
                .mine_block_handlers
                .iter()
                .for_each(|handler| handler(&mine_block_event)),

            Event::DiscardStaleBlock(discard_stale_block_event) => self
                .discard_stale_block_handlers
                .iter()
                .for_each(|handler| handler(&discard_stale_block_event)),

            Event::DropJob(drop_job_event) => self
                .drop_job_handlers
                .iter()
                .for_each(|handler| handler(&drop_job_event)),

            Event::SubmitJob(submit_job_event) => self
                .submit_job_handlers
                .iter()
                .for_each(|handler| handler(&submit_job_event)),

            Event::ReceiveJob(receive_job_event) => self
                .receive_job_handlers
                .iter()
                .for_each(|handler| handler(&receive_job_event)),

            Event::ReceiveBlock(receive_block_event) => self
                .receive_block_handlers
                .iter()
                .for_each(|handler| handler(&receive_block_event)),
        }
    }
}

/// The optional handlers a library user may register, one per kind of event.
#[derive(Default)]
pub(crate) struct UserEventHandlers {
    pub(crate) on_insert_block: Option<HandlerPtr<InsertBlockEvent>>,
    pub(crate) on_update_head: Option<HandlerPtr<UpdateHeadEvent>>,
    pub(crate) on_reject_block: Option<HandlerPtr<RejectBlockEvent>>,
    pub(crate) on_orphan_block: Option<HandlerPtr<OrphanBlockEvent>>,
    pub(crate) on_fetch_block: Option<HandlerPtr<FetchBlockEvent>>,
    pub(crate) on_mine_block: Option<HandlerPtr<MineBlockEvent>>,
    pub(crate) on_discard_stale_block: Option<HandlerPtr<DiscardStaleBlockEvent>>,
    pub(crate) on_drop_job: Option<HandlerPtr<DropJobEvent>>,
    pub(crate) on_submit_job: Option<HandlerPtr<SubmitJobEvent>>,
    pub(crate) on_receive_job: Option<HandlerPtr<ReceiveJobEvent>>,
    pub(crate) on_receive_block: Option<HandlerPtr<ReceiveBlockEvent>>,
}

/// How long the event bus waits for an event before checking for shutdown again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Start the event bus thread, which polls `event_subscriber` and fires the matching handlers for
/// every event it receives, until a shutdown signal is sent or every publisher is gone.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                // Drain whatever was published before shutdown was requested.
                event_subscriber
                    .try_iter()
                    .for_each(|event| event_handlers.fire_handlers(event));
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
