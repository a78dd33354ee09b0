/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The two mining workers and the logic that decides what they mine.

use std::{
    collections::HashSet,
    sync::mpsc::Sender,
    thread::{self, JoinHandle},
    time::{Duration, SystemTime},
};

use crate::{
    chain::{Chain, HeadSnapshot},
    config::MinerConfiguration,
    events::{DiscardStaleBlockEvent, DropJobEvent, Event, MineBlockEvent},
    networking::network::Network,
    state::ledger::LedgerState,
    tree_manager::TreeManager,
    types::{
        block::{Block, BlockOp, BlockType},
        data_types::CryptoHash,
    },
};

use super::{cancellation::CancellationToken, job_queue::JobQueue};

/// How long a worker with nothing to do waits before looking again.
const IDLE_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the no-op worker and the job worker against one shared chain and job queue.
pub(crate) struct BlockCalculator<N: Network> {
    config: MinerConfiguration,
    chain: Chain,
    tree_manager: TreeManager<N>,
    job_queue: JobQueue,
    shutdown: CancellationToken,
    suspend_no_op: CancellationToken,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network + 'static> BlockCalculator<N> {
    pub(crate) fn new(
        config: MinerConfiguration,
        chain: Chain,
        tree_manager: TreeManager<N>,
        job_queue: JobQueue,
        shutdown: CancellationToken,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            chain,
            tree_manager,
            job_queue,
            suspend_no_op: shutdown.child(),
            shutdown,
            event_publisher,
        }
    }

    /// Spawn the no-op worker and the job worker. Both run until the shutdown token is stopped.
    pub(crate) fn start(self) -> (JoinHandle<()>, JoinHandle<()>) {
        let mut no_op_worker = self.clone_worker();
        let mut job_worker = self;
        (
            thread::spawn(move || no_op_worker.run_no_op_worker()),
            thread::spawn(move || job_worker.run_job_worker()),
        )
    }

    fn clone_worker(&self) -> Self {
        Self {
            config: self.config.clone(),
            chain: self.chain.clone(),
            tree_manager: self.tree_manager.clone(),
            job_queue: self.job_queue.clone(),
            shutdown: self.shutdown.clone(),
            suspend_no_op: self.suspend_no_op.clone(),
            event_publisher: self.event_publisher.clone(),
        }
    }

    /// Mine no-op blocks on the current head whenever the job worker has not suspended no-op mining. If
    /// the tree is still empty, mine a genesis block instead.
    fn run_no_op_worker(&mut self) {
        while !self.shutdown.is_stop_requested() {
            if self.suspend_no_op.is_stop_requested() {
                thread::sleep(IDLE_INTERVAL);
                continue;
            }

            let head = self.chain.head();
            let attempt = self.suspend_no_op.child();
            if !self.chain.stop_on_head_change(head.map(|head| head.node), &attempt) {
                continue;
            }
            let candidate = match head {
                Some(head) => Block::no_op(head.hash, self.config.miner_id.clone(), rand::random()),
                None => Block::genesis(self.config.miner_id.clone(), rand::random()),
            };
            if let Some(block) = candidate.mine(self.config.difficulty.no_op, &attempt) {
                self.submit(block, head);
            }
        }
    }

    /// Mine blocks carrying queued operations whenever there are any that can be applied on the current
    /// head, suspending no-op mining meanwhile.
    fn run_job_worker(&mut self) {
        // The head and queue length at which no queued operation could be applied. Nothing changes
        // until either does.
        let mut blocked_at: Option<(CryptoHash, usize)> = None;

        while !self.shutdown.is_stop_requested() {
            if !self.job_queue.wait_for_jobs(IDLE_INTERVAL) {
                self.suspend_no_op.clear();
                continue;
            }

            let Some(head) = self.chain.head() else {
                // Nothing to build on until a genesis block exists.
                self.suspend_no_op.clear();
                thread::sleep(IDLE_INTERVAL);
                continue;
            };
            if blocked_at == Some((head.hash, self.job_queue.len())) {
                thread::sleep(IDLE_INTERVAL);
                continue;
            }
            self.suspend_no_op.request_stop();
            let ops = match self.chain.ledger_at(head.node) {
                Ok(ledger) => self.select_ops(ledger, head),
                Err(error) => {
                    log::warn!("cannot replay the chain at head {}: {:?}", head.hash, error);
                    Vec::new()
                }
            };
            if ops.is_empty() {
                // Let no-op mining earn the money that queued operations may be waiting for.
                blocked_at = Some((head.hash, self.job_queue.len()));
                self.suspend_no_op.clear();
                continue;
            }
            blocked_at = None;

            // Abandoned if a peer's block moves the head first. The operations stay queued and are
            // selected again on the new head.
            let attempt = self.shutdown.child();
            if !self.chain.stop_on_head_change(Some(head.node), &attempt) {
                continue;
            }
            let candidate = Block::regular(
                head.hash,
                self.config.miner_id.clone(),
                ops.clone(),
                rand::random(),
            );
            if let Some(block) = candidate.mine(self.config.difficulty.op, &attempt) {
                if self.submit(block, Some(head)) {
                    self.job_queue.remove_mined(&ops);
                }
            }
        }
        self.suspend_no_op.clear();
    }

    /// Pick the operations to mine on top of `head`: the oldest queued operations that apply cleanly, one
    /// after another, on the state at `head`, up to the per-block limit.
    ///
    /// Operations that can never apply are dropped from the queue. Operations that might apply later stay
    /// queued, and so does every later operation on the same file, since it may depend on them.
    fn select_ops(&self, mut ledger: LedgerState, head: HeadSnapshot) -> Vec<BlockOp> {
        let limit = self.config.ops_per_block.saturating_sub(1).max(1);
        let height = head.height + 1;
        ledger.credit_reward(&self.config.miner_id, BlockType::Regular);

        let mut selected = Vec::new();
        // Files with an operation left queued in this round.
        let mut deferred: HashSet<String> = HashSet::new();
        for op in self.job_queue.snapshot() {
            if selected.len() == limit {
                break;
            }
            match ledger.apply_op(&op, height) {
                Ok(()) => selected.push(op),
                Err(error) if error.is_retryable() || deferred.contains(op.filename()) => {
                    deferred.insert(op.filename().to_string());
                }
                Err(error) => {
                    self.job_queue.remove(&op);
                    Event::DropJob(DropJobEvent {
                        timestamp: SystemTime::now(),
                        op,
                        reason: error,
                    })
                    .publish(&self.event_publisher);
                }
            }
        }
        selected
    }

    /// Add a freshly mined `block` to the tree, unless the head moved away from `mined_on` while it was
    /// being mined. Returns whether the block was inserted.
    fn submit(&mut self, block: Block, mined_on: Option<HeadSnapshot>) -> bool {
        let hash = block.hash();
        if self.chain.head().map(|head| head.node) != mined_on.map(|head| head.node) {
            Event::DiscardStaleBlock(DiscardStaleBlockEvent {
                timestamp: SystemTime::now(),
                block: hash,
            })
            .publish(&self.event_publisher);
            return false;
        }

        Event::MineBlock(MineBlockEvent {
            timestamp: SystemTime::now(),
            block: hash,
            block_type: block.block_type(),
            ops: block.records().len(),
        })
        .publish(&self.event_publisher);

        match self.tree_manager.add_block(block) {
            Ok(_) => true,
            Err(error) => {
                log::warn!("mined block {} was not inserted: {:?}", hash, error);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::mpsc::{self, Receiver},
        time::Instant,
    };

    use super::*;
    use crate::{
        config::{Confirmations, Difficulty, Economics, TreeManagerConfiguration},
        networking::messages::Message,
        state::StateError,
        types::data_types::{AccountId, RecordData},
    };

    const EASY: Difficulty = Difficulty { op: 1, no_op: 1 };

    /// A network without peers.
    #[derive(Clone)]
    struct NoPeers;

    impl Network for NoPeers {
        fn broadcast(&mut self, _: Message) {}

        fn recv(&mut self) -> Option<Message> {
            None
        }

        fn get_remote_block(&mut self, _: &CryptoHash) -> Option<Block> {
            None
        }

        fn get_remote_roots(&mut self) -> Vec<Block> {
            Vec::new()
        }
    }

    fn acct(id: &str) -> AccountId {
        AccountId::new(id)
    }

    fn mined(block: Block) -> Block {
        block.mine(1, &CancellationToken::new()).unwrap()
    }

    /// A calculator for miner "m" on a chain holding a genesis block followed by one no-op block mined by
    /// "m".
    fn setup(economics: Economics, ops_per_block: usize) -> (BlockCalculator<NoPeers>, Receiver<Event>) {
        let (event_publisher, event_subscriber) = mpsc::channel();
        let chain = Chain::new(economics, EASY, Some(event_publisher.clone()));
        let genesis = chain.insert(mined(Block::genesis(acct("g"), 0))).unwrap();
        chain
            .insert(mined(Block::no_op(genesis.hash, acct("m"), 0)))
            .unwrap();

        let tree_manager = TreeManager::new(
            TreeManagerConfiguration { max_fetch_depth: 8 },
            chain.clone(),
            NoPeers,
            Some(event_publisher.clone()),
        );
        let calculator = BlockCalculator::new(
            MinerConfiguration {
                miner_id: acct("m"),
                difficulty: EASY,
                ops_per_block,
            },
            chain,
            tree_manager,
            JobQueue::new(),
            CancellationToken::new(),
            Some(event_publisher),
        );
        event_subscriber.try_iter().for_each(drop);
        (calculator, event_subscriber)
    }

    fn select(calculator: &BlockCalculator<NoPeers>) -> Vec<BlockOp> {
        let head = calculator.chain.head().unwrap();
        let ledger = calculator.chain.ledger_at(head.node).unwrap();
        calculator.select_ops(ledger, head)
    }

    fn dropped_jobs(event_subscriber: &Receiver<Event>) -> Vec<(BlockOp, StateError)> {
        event_subscriber
            .try_iter()
            .filter_map(|event| match event {
                Event::DropJob(dropped) => Some((dropped.op, dropped.reason)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn blocks_carry_at_most_one_less_than_ops_per_block() {
        let (calculator, _) = setup(Economics::default(), 3);
        for filename in ["a", "b", "c"] {
            calculator.job_queue.push(BlockOp::create_file(acct("m"), filename));
        }

        assert_eq!(
            select(&calculator),
            vec![
                BlockOp::create_file(acct("m"), "a"),
                BlockOp::create_file(acct("m"), "b"),
            ]
        );
        assert_eq!(calculator.job_queue.len(), 3);
    }

    #[test]
    fn never_applicable_ops_are_dropped_and_unaffordable_ones_kept() {
        let economics = Economics {
            op_reward: 0,
            no_op_reward: 20,
            create_fee: 10,
            append_fee: 1,
        };
        let (calculator, event_subscriber) = setup(economics, 10);
        let missing = BlockOp::append_file(acct("m"), "missing", 0, RecordData::empty());
        let unaffordable = BlockOp::create_file(acct("poor"), "p");
        let affordable = BlockOp::create_file(acct("m"), "f");
        for op in [&missing, &unaffordable, &affordable] {
            calculator.job_queue.push(op.clone());
        }

        assert_eq!(select(&calculator), vec![affordable.clone()]);
        assert_eq!(calculator.job_queue.snapshot(), vec![unaffordable, affordable]);
        assert_eq!(
            dropped_jobs(&event_subscriber),
            vec![(
                missing,
                StateError::FileDoesNotExist {
                    filename: "missing".into()
                }
            )]
        );
    }

    #[test]
    fn ops_behind_an_unaffordable_create_of_the_same_file_stay_queued() {
        let economics = Economics {
            op_reward: 0,
            no_op_reward: 1,
            create_fee: 20,
            append_fee: 1,
        };
        let (calculator, event_subscriber) = setup(economics, 10);
        let create = BlockOp::create_file(acct("m"), "f");
        let append = BlockOp::append_file(acct("m"), "f", 0, RecordData::from_prefix(b"first"));
        let delete = BlockOp::delete_file(acct("m"), "f");
        let unrelated = BlockOp::delete_file(acct("m"), "g");
        for op in [&create, &append, &delete, &unrelated] {
            calculator.job_queue.push(op.clone());
        }

        assert!(select(&calculator).is_empty());
        assert_eq!(calculator.job_queue.snapshot(), vec![create, append, delete]);
        assert_eq!(dropped_jobs(&event_subscriber).len(), 1);
    }

    #[test]
    fn blocks_mined_on_a_moved_head_are_discarded() {
        let (mut calculator, event_subscriber) = setup(Economics::default(), 2);
        let old_head = calculator.chain.head().unwrap();
        let stale = mined(Block::no_op(old_head.hash, acct("m"), 1));

        // A peer's block extends the head while `stale` is being mined.
        calculator
            .chain
            .insert(mined(Block::no_op(old_head.hash, acct("peer"), 0)))
            .unwrap();
        calculator
            .chain
            .insert(mined(Block::no_op(
                calculator.chain.head().unwrap().hash,
                acct("peer"),
                1,
            )))
            .unwrap();
        event_subscriber.try_iter().for_each(drop);

        assert!(!calculator.submit(stale.clone(), Some(old_head)));
        assert!(!calculator.chain.camera().contains(&stale.hash()));
        assert!(event_subscriber
            .try_iter()
            .any(|event| matches!(event, Event::DiscardStaleBlock(discarded) if discarded.block == stale.hash())));
    }

    #[test]
    fn mined_ops_leave_the_queue() {
        let (mut calculator, _) = setup(Economics::default(), 3);
        let create = BlockOp::create_file(acct("m"), "f");
        let append = BlockOp::append_file(acct("m"), "f", 0, RecordData::from_prefix(b"zero"));
        let next_append = BlockOp::append_file(acct("m"), "f", 1, RecordData::from_prefix(b"one"));
        for op in [&create, &append, &next_append] {
            calculator.job_queue.push(op.clone());
        }

        let head = calculator.chain.head().unwrap();
        let ops = select(&calculator);
        assert_eq!(ops, vec![create, append]);

        let block = mined(Block::regular(head.hash, acct("m"), ops.clone(), 0));
        assert!(calculator.submit(block, Some(head)));
        calculator.job_queue.remove_mined(&ops);
        assert_eq!(calculator.job_queue.snapshot(), vec![next_append.clone()]);

        // The remaining append applies on the new head.
        assert_eq!(select(&calculator), vec![next_append]);
    }

    #[test]
    fn no_op_mining_resumes_while_queued_ops_cannot_be_paid_for() {
        let economics = Economics {
            op_reward: 0,
            no_op_reward: 1,
            create_fee: 10,
            append_fee: 1,
        };
        let (calculator, _) = setup(economics, 2);
        let shutdown = calculator.shutdown.clone();
        let job_queue = calculator.job_queue.clone();
        let camera = calculator.chain.camera();
        job_queue.push(BlockOp::create_file(acct("m"), "f"));

        let (no_op_worker, job_worker) = calculator.start();

        // The create needs ten no-op rewards, which only arrive if the job worker lets the no-op worker
        // run while the create is unaffordable.
        let deadline = Instant::now() + Duration::from_secs(60);
        let unconfirmed = Confirmations { create: 0, append: 0 };
        while !camera
            .filesystem_state(&unconfirmed)
            .is_ok_and(|files| files.contains_key("f"))
        {
            assert!(Instant::now() < deadline, "the create was never mined");
            thread::sleep(Duration::from_millis(10));
        }
        while job_queue.len() > 0 {
            assert!(Instant::now() < deadline, "the mined create never left the queue");
            thread::sleep(Duration::from_millis(10));
        }

        shutdown.request_stop();
        no_op_worker.join().unwrap();
        job_worker.join().unwrap();
        assert!(camera.len() >= 12);
    }
}
