/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`ChainValidator`] and its replay cache.

use crate::{
    config::{Difficulty, Economics},
    fork_tree::{ForkTree, NodeId},
    state::{ledger::LedgerState, StateError},
    types::{
        block::{Block, BlockType},
        crypto_primitives::leading_zero_bits,
        data_types::BlockHeight,
    },
};

use super::ValidationError;

/// Gatekeeper of a [`ForkTree`]. Every insertion into a tree shared between threads should go through
/// [`validate_and_insert`](Self::validate_and_insert) while holding exclusive access to both the tree
/// and the validator.
pub struct ChainValidator {
    economics: Economics,
    difficulty: Difficulty,
    cache: Option<(NodeId, LedgerState)>,
}

impl ChainValidator {
    pub fn new(economics: Economics, difficulty: Difficulty) -> Self {
        Self {
            economics,
            difficulty,
            cache: None,
        }
    }

    /// Number of leading zero bits the hash of a block of class `block_type` must have.
    pub fn required_difficulty(&self, block_type: BlockType) -> u32 {
        match block_type {
            BlockType::Regular => self.difficulty.op,
            BlockType::NoOp | BlockType::Genesis => self.difficulty.no_op,
        }
    }

    /// Check `block` against `tree` and, if it is valid, insert it.
    ///
    /// Returns the id of the inserted node. On error, `tree` is left unchanged.
    pub fn validate_and_insert(
        &mut self,
        tree: &mut ForkTree,
        block: Block,
    ) -> Result<NodeId, ValidationError> {
        let hash = block.hash();

        // 1. Existence.
        if tree.contains(&hash) {
            return Err(ValidationError::DuplicateBlock { block: hash });
        }

        // 2. Proof of work.
        let difficulty = self.required_difficulty(block.block_type());
        if leading_zero_bits(&hash.bytes()) < difficulty {
            return Err(ValidationError::InvalidProofOfWork {
                block: hash,
                difficulty,
            });
        }

        // 3. Genesis.
        if block.block_type() == BlockType::Genesis {
            let has_genesis = tree
                .roots()
                .iter()
                .any(|root| tree.node(*root).block().block_type() == BlockType::Genesis);
            if has_genesis {
                return Err(ValidationError::DuplicateGenesis { block: hash });
            }
            LedgerState::new(Some(self.economics)).apply_block(&block, BlockHeight::new(0))?;
            return Ok(tree.insert_root(block));
        }

        // 4. Parent.
        let Some(&parent) = tree.find(block.prev_hash()).first() else {
            return Err(ValidationError::MissingParent {
                block: hash,
                parent: *block.prev_hash(),
            });
        };

        // 5. State.
        let mut ledger = match self.cache.take() {
            Some((cached, ledger)) if cached == parent => ledger,
            _ => self.replay(tree, parent)?,
        };
        ledger.apply_block(&block, tree.node(parent).height() + 1)?;

        let id = tree.insert_child(block, parent);
        self.cache = Some((id, ledger));
        Ok(id)
    }

    /// Get the full state after the block at `node`, reusing the replay cache if it is at `node`.
    pub(crate) fn ledger_at(&self, tree: &ForkTree, node: NodeId) -> Result<LedgerState, StateError> {
        match &self.cache {
            Some((cached, ledger)) if *cached == node => Ok(ledger.clone()),
            _ => self.replay(tree, node),
        }
    }

    fn replay(&self, tree: &ForkTree, node: NodeId) -> Result<LedgerState, StateError> {
        let path = tree.path_to(node);
        LedgerState::replay(
            Some(self.economics),
            path.iter().map(|id| tree.node(*id).block()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Confirmations,
        miner::cancellation::CancellationToken,
        state::{accounts_state, filesystem_state},
        types::{
            block::BlockOp,
            data_types::{AccountId, CryptoHash, RecordData},
        },
    };

    const ECONOMICS: Economics = Economics {
        op_reward: 2,
        no_op_reward: 5,
        create_fee: 3,
        append_fee: 1,
    };

    const EASY: Difficulty = Difficulty { op: 2, no_op: 1 };

    fn acct(id: &str) -> AccountId {
        AccountId::new(id)
    }

    fn mined(block: Block) -> Block {
        let difficulty = if block.is_op_block() { EASY.op } else { EASY.no_op };
        block.mine(difficulty, &CancellationToken::new()).unwrap()
    }

    fn setup() -> (ChainValidator, ForkTree, NodeId) {
        let mut validator = ChainValidator::new(ECONOMICS, EASY);
        let mut tree = ForkTree::new();
        let genesis = validator
            .validate_and_insert(&mut tree, mined(Block::genesis(acct("0"), 0)))
            .unwrap();
        (validator, tree, genesis)
    }

    fn hash_of(tree: &ForkTree, node: NodeId) -> CryptoHash {
        *tree.node(node).id()
    }

    #[test]
    fn duplicate_block_is_rejected_without_effect() {
        let (mut validator, mut tree, genesis) = setup();
        let block = mined(Block::no_op(hash_of(&tree, genesis), acct("1"), 0));

        let first = validator.validate_and_insert(&mut tree, block.clone()).unwrap();
        assert_eq!(
            validator.validate_and_insert(&mut tree, block.clone()),
            Err(ValidationError::DuplicateBlock { block: block.hash() })
        );
        assert_eq!(tree.len(), 2);
        assert_eq!(
            accounts_state(&tree, &ECONOMICS, Some(first)).unwrap()[&acct("1")],
            ECONOMICS.no_op_reward
        );
    }

    #[test]
    fn insufficient_proof_of_work_is_rejected() {
        let mut validator = ChainValidator::new(ECONOMICS, Difficulty { op: 64, no_op: 64 });
        let mut tree = ForkTree::new();
        let block = Block::genesis(acct("0"), 0);
        assert_eq!(
            validator.validate_and_insert(&mut tree, block.clone()),
            Err(ValidationError::InvalidProofOfWork {
                block: block.hash(),
                difficulty: 64,
            })
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn only_one_genesis() {
        let (mut validator, mut tree, _) = setup();
        let other = mined(Block::genesis(acct("other"), 0));
        assert_eq!(
            validator.validate_and_insert(&mut tree, other.clone()),
            Err(ValidationError::DuplicateGenesis { block: other.hash() })
        );
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn unknown_parent_is_reported() {
        let (mut validator, mut tree, _) = setup();
        let parent = CryptoHash::new([7; 16]);
        let block = mined(Block::no_op(parent, acct("1"), 0));
        assert_eq!(
            validator.validate_and_insert(&mut tree, block.clone()),
            Err(ValidationError::MissingParent {
                block: block.hash(),
                parent,
            })
        );
    }

    #[test]
    fn operations_see_earlier_operations_in_the_same_block() {
        let (mut validator, mut tree, genesis) = setup();
        let parent = hash_of(&tree, genesis);
        let no_op = validator
            .validate_and_insert(&mut tree, mined(Block::no_op(parent, acct("1"), 0)))
            .unwrap();

        let block = mined(Block::regular(
            hash_of(&tree, no_op),
            acct("1"),
            vec![
                BlockOp::create_file(acct("1"), "f"),
                BlockOp::append_file(acct("1"), "f", 0, RecordData::from_prefix(b"hello")),
            ],
            0,
        ));
        let head = validator.validate_and_insert(&mut tree, block).unwrap();

        let confirmations = Confirmations { create: 0, append: 0 };
        let files = filesystem_state(&tree, &confirmations, Some(head)).unwrap();
        assert_eq!(files["f"].number_of_records, 1);
        // 5 (no-op) + 2 (op) - 3 (create) - 1 (append).
        assert_eq!(accounts_state(&tree, &ECONOMICS, Some(head)).unwrap()[&acct("1")], 3);

        let duplicate = mined(Block::regular(
            hash_of(&tree, head),
            acct("1"),
            vec![BlockOp::create_file(acct("1"), "f")],
            0,
        ));
        assert_eq!(
            validator.validate_and_insert(&mut tree, duplicate),
            Err(ValidationError::StateError(StateError::FileAlreadyExists {
                filename: "f".into()
            }))
        );
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn state_follows_the_parent_not_the_last_insertion() {
        let (mut validator, mut tree, genesis) = setup();
        let genesis_hash = hash_of(&tree, genesis);

        // "rich" earns a reward on one fork only. The validator last inserted into that fork, so checking
        // a block on the other one needs a fresh replay.
        let other_fork = validator
            .validate_and_insert(&mut tree, mined(Block::no_op(genesis_hash, acct("poor"), 0)))
            .unwrap();
        validator
            .validate_and_insert(&mut tree, mined(Block::no_op(genesis_hash, acct("rich"), 0)))
            .unwrap();

        let spend = mined(Block::regular(
            hash_of(&tree, other_fork),
            acct("poor"),
            vec![BlockOp::create_file(acct("rich"), "f")],
            0,
        ));
        assert_eq!(
            validator.validate_and_insert(&mut tree, spend),
            Err(ValidationError::StateError(StateError::NotEnoughMoney {
                account: acct("rich"),
                balance: 0,
                fee: ECONOMICS.create_fee,
            }))
        );
    }

    #[test]
    fn state_does_not_depend_on_the_insertion_order_of_forks() {
        let genesis = mined(Block::genesis(acct("0"), 0));
        let a1 = mined(Block::no_op(genesis.hash(), acct("a"), 0));
        let a2 = mined(Block::regular(
            a1.hash(),
            acct("a"),
            vec![BlockOp::create_file(acct("a"), "f")],
            0,
        ));
        let b1 = mined(Block::no_op(genesis.hash(), acct("b"), 0));
        let b2 = mined(Block::regular(
            b1.hash(),
            acct("b"),
            vec![
                BlockOp::create_file(acct("b"), "f"),
                BlockOp::append_file(acct("b"), "f", 0, RecordData::from_prefix(b"b")),
            ],
            0,
        ));
        let b3 = mined(Block::no_op(b2.hash(), acct("b"), 1));
        let fork_a = [a1, a2.clone()];
        let fork_b = [b1, b2, b3.clone()];

        let build = |first: &[Block], second: &[Block]| {
            let mut validator = ChainValidator::new(ECONOMICS, EASY);
            let mut tree = ForkTree::new();
            for block in std::iter::once(&genesis).chain(first).chain(second) {
                validator.validate_and_insert(&mut tree, block.clone()).unwrap();
            }
            tree
        };
        let a_first = build(&fork_a, &fork_b);
        let b_first = build(&fork_b, &fork_a);

        let confirmations = Confirmations { create: 1, append: 0 };
        for top in [&a2, &b3] {
            let in_a_first = a_first.find(&top.hash())[0];
            let in_b_first = b_first.find(&top.hash())[0];
            assert_eq!(
                accounts_state(&a_first, &ECONOMICS, Some(in_a_first)),
                accounts_state(&b_first, &ECONOMICS, Some(in_b_first))
            );
            assert_eq!(
                filesystem_state(&a_first, &confirmations, Some(in_a_first)),
                filesystem_state(&b_first, &confirmations, Some(in_b_first))
            );
        }
        assert_eq!(
            accounts_state(&a_first, &ECONOMICS, a_first.longest_chain_head()).unwrap()[&acct("b")],
            5 + 2 - 3 - 1 + 5
        );
    }

    #[test]
    fn confirmed_state_only_grows_as_the_chain_extends() {
        let (mut validator, mut tree, genesis) = setup();
        let confirmations = Confirmations { create: 2, append: 1 };
        let block_at = |parent: CryptoHash, height: u64| match height {
            1 => Block::no_op(parent, acct("1"), 0),
            2 => Block::regular(
                parent,
                acct("1"),
                vec![
                    BlockOp::create_file(acct("1"), "f"),
                    BlockOp::append_file(acct("1"), "f", 0, RecordData::from_prefix(b"zero")),
                ],
                0,
            ),
            3 => Block::regular(
                parent,
                acct("1"),
                vec![BlockOp::append_file(acct("1"), "f", 1, RecordData::from_prefix(b"one"))],
                0,
            ),
            _ => Block::no_op(parent, acct("1"), height),
        };

        let mut head = genesis;
        let mut previous = filesystem_state(&tree, &confirmations, Some(head)).unwrap();
        for height in 1..=6 {
            let parent = hash_of(&tree, head);
            head = validator
                .validate_and_insert(&mut tree, mined(block_at(parent, height)))
                .unwrap();
            let current = filesystem_state(&tree, &confirmations, Some(head)).unwrap();
            for (filename, file) in &previous {
                let grown = &current[filename];
                assert_eq!(grown.creator, file.creator);
                assert_eq!(grown.data[..file.data.len()], file.data[..]);
            }
            previous = current;
        }
        assert_eq!(previous["f"].number_of_records, 2);
    }
}
