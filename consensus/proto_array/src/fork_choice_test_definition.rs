mod execution_status;
mod ffg_updates;
mod no_votes;
mod votes;

use crate::proto_array_fork_choice::{Block, ExecutionStatus, ProtoArrayForkChoice};
use crate::{InvalidationOperation, JustifiedBalances};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use types::{
    ChainSpec, Checkpoint, Epoch, ExecutionBlockHash, FixedBytesExtended, Hash256,
    MainnetEthSpec, Slot,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    FindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
        expected_head: Hash256,
    },
    ProposerBoostFindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
        expected_head: Hash256,
        proposer_boost_root: Hash256,
    },
    InvalidFindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
    },
    ProcessBlock {
        slot: Slot,
        root: Hash256,
        parent_root: Hash256,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        /// Defaults to `justified_checkpoint` when absent.
        unrealized_justified_checkpoint: Option<Checkpoint>,
    },
    InvalidProcessBlock {
        slot: Slot,
        root: Hash256,
        parent_root: Hash256,
    },
    ProcessAttestation {
        validator_index: usize,
        block_root: Hash256,
        target_epoch: Epoch,
    },
    Prune {
        finalized_root: Hash256,
        prune_threshold: usize,
        expected_len: usize,
    },
    InvalidatePayload {
        head_block_root: Hash256,
        latest_valid_ancestor_root: Option<ExecutionBlockHash>,
    },
    ValidatePayload {
        block_root: Hash256,
    },
    AssertWeight {
        block_root: Hash256,
        weight: u64,
    },
    AssertExecutionStatus {
        block_root: Hash256,
        is_invalid: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkChoiceTestDefinition {
    pub finalized_block_slot: Slot,
    /// The wall-clock slot used for every operation.
    pub current_slot: Slot,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub operations: Vec<Operation>,
}

impl ForkChoiceTestDefinition {
    pub fn run(self) {
        let mut spec = ChainSpec::mainnet();
        spec.proposer_score_boost = Some(50);

        let current_slot = self.current_slot;
        let mut fork_choice = ProtoArrayForkChoice::new::<MainnetEthSpec>(
            current_slot,
            self.finalized_block_slot,
            Hash256::zero(),
            self.justified_checkpoint,
            self.finalized_checkpoint,
            ExecutionStatus::Optimistic(ExecutionBlockHash::zero()),
        )
        .expect("should create fork choice struct");
        let equivocating_indices = BTreeSet::new();

        let find_head = |fork_choice: &mut ProtoArrayForkChoice,
                         justified_checkpoint: Checkpoint,
                         finalized_checkpoint: Checkpoint,
                         balances: Vec<u64>,
                         proposer_boost_root: Hash256| {
            let justified_balances = JustifiedBalances::from_effective_balances(balances).unwrap();
            fork_choice.find_head::<MainnetEthSpec>(
                justified_checkpoint,
                finalized_checkpoint,
                &justified_balances,
                proposer_boost_root,
                &equivocating_indices,
                current_slot,
                &spec,
            )
        };

        for (op_index, op) in self.operations.into_iter().enumerate() {
            match op.clone() {
                Operation::FindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                    expected_head,
                } => {
                    let head = find_head(
                        &mut fork_choice,
                        justified_checkpoint,
                        finalized_checkpoint,
                        justified_state_balances,
                        Hash256::zero(),
                    )
                    .unwrap_or_else(|e| {
                        panic!("find_head op at index {} returned error {:?}", op_index, e)
                    });

                    assert_eq!(
                        head, expected_head,
                        "Operation at index {} failed head check. Operation: {:?}",
                        op_index, op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::ProposerBoostFindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                    expected_head,
                    proposer_boost_root,
                } => {
                    let head = find_head(
                        &mut fork_choice,
                        justified_checkpoint,
                        finalized_checkpoint,
                        justified_state_balances,
                        proposer_boost_root,
                    )
                    .unwrap_or_else(|e| {
                        panic!("find_head op at index {} returned error {:?}", op_index, e)
                    });

                    assert_eq!(
                        head, expected_head,
                        "Operation at index {} failed head check. Operation: {:?}",
                        op_index, op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::InvalidFindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                } => {
                    let result = find_head(
                        &mut fork_choice,
                        justified_checkpoint,
                        finalized_checkpoint,
                        justified_state_balances,
                        Hash256::zero(),
                    );

                    assert!(
                        result.is_err(),
                        "Operation at index {} . Operation: {:?}",
                        op_index,
                        op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::ProcessBlock {
                    slot,
                    root,
                    parent_root,
                    justified_checkpoint,
                    finalized_checkpoint,
                    unrealized_justified_checkpoint,
                } => {
                    let block = block(
                        slot,
                        root,
                        parent_root,
                        justified_checkpoint,
                        finalized_checkpoint,
                        unrealized_justified_checkpoint.unwrap_or(justified_checkpoint),
                    );
                    fork_choice
                        .process_block::<MainnetEthSpec>(block, current_slot)
                        .unwrap_or_else(|e| {
                            panic!(
                                "process_block op at index {} returned error: {:?}",
                                op_index, e
                            )
                        });
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::InvalidProcessBlock {
                    slot,
                    root,
                    parent_root,
                } => {
                    let checkpoint = get_checkpoint(0);
                    let block = block(slot, root, parent_root, checkpoint, checkpoint, checkpoint);
                    let len = fork_choice.len();
                    assert!(
                        fork_choice
                            .process_block::<MainnetEthSpec>(block, current_slot)
                            .is_err(),
                        "process_block op at index {} should fail",
                        op_index
                    );
                    assert_eq!(fork_choice.len(), len);
                }
                Operation::ProcessAttestation {
                    validator_index,
                    block_root,
                    target_epoch,
                } => {
                    fork_choice
                        .process_attestation(validator_index, block_root, target_epoch)
                        .unwrap_or_else(|e| {
                            panic!(
                                "process_attestation op at index {} returned error {:?}",
                                op_index, e
                            )
                        });
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::Prune {
                    finalized_root,
                    prune_threshold,
                    expected_len,
                } => {
                    fork_choice.set_prune_threshold(prune_threshold);
                    fork_choice
                        .maybe_prune(finalized_root)
                        .unwrap_or_else(|e| {
                            panic!("prune op at index {} returned error {:?}", op_index, e)
                        });

                    assert_eq!(
                        fork_choice.len(),
                        expected_len,
                        "Prune op at index {} failed with {} instead of {}",
                        op_index,
                        fork_choice.len(),
                        expected_len
                    );
                    for node in fork_choice.core_proto_array().nodes.iter() {
                        assert!(
                            fork_choice.is_descendant(finalized_root, node.root),
                            "pruning left a non-descendant of the finalized root"
                        );
                    }
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::InvalidatePayload {
                    head_block_root,
                    latest_valid_ancestor_root,
                } => {
                    let op = if let Some(latest_valid_ancestor) = latest_valid_ancestor_root {
                        InvalidationOperation::InvalidateMany {
                            head_block_root,
                            always_invalidate_head: true,
                            latest_valid_ancestor,
                        }
                    } else {
                        InvalidationOperation::InvalidateOne {
                            block_root: head_block_root,
                        }
                    };
                    fork_choice
                        .process_execution_payload_invalidation::<MainnetEthSpec>(&op)
                        .unwrap()
                }
                Operation::ValidatePayload { block_root } => fork_choice
                    .process_execution_payload_validation(block_root)
                    .unwrap(),
                Operation::AssertWeight { block_root, weight } => assert_eq!(
                    fork_choice.get_weight(&block_root).unwrap(),
                    weight,
                    "block weight at op index {}",
                    op_index
                ),
                Operation::AssertExecutionStatus {
                    block_root,
                    is_invalid,
                } => assert_eq!(
                    fork_choice
                        .get_block_execution_status(&block_root)
                        .unwrap()
                        .is_invalid(),
                    is_invalid,
                    "execution status at op index {}",
                    op_index
                ),
            }
        }
    }
}

fn block(
    slot: Slot,
    root: Hash256,
    parent_root: Hash256,
    justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    unrealized_justified_checkpoint: Checkpoint,
) -> Block {
    Block {
        slot,
        root,
        parent_root: Some(parent_root),
        state_root: Hash256::zero(),
        target_root: Hash256::zero(),
        justified_checkpoint,
        finalized_checkpoint,
        // All blocks are imported optimistically.
        execution_status: ExecutionStatus::Optimistic(ExecutionBlockHash::from_root(root)),
        unrealized_justified_checkpoint,
        unrealized_finalized_checkpoint: finalized_checkpoint,
    }
}

/// Gives a root that is not the zero hash (unless i is `u64::MAX`).
fn get_root(i: u64) -> Hash256 {
    Hash256::from_low_u64_be(i + 1)
}

/// Gives a hash that is not the zero hash (unless i is `u64::MAX`).
fn get_hash(i: u64) -> ExecutionBlockHash {
    ExecutionBlockHash::from_root(get_root(i))
}

/// Gives a checkpoint with a root that is not the zero hash (unless i is `u64::MAX`).
/// `Epoch` will always equal `i`.
fn get_checkpoint(i: u64) -> Checkpoint {
    Checkpoint {
        epoch: Epoch::new(i),
        root: get_root(i),
    }
}

/// A `ProcessBlock` whose realized and unrealized checkpoints are all genesis.
fn process_block(slot: u64, root: u64, parent: u64) -> Operation {
    Operation::ProcessBlock {
        slot: Slot::new(slot),
        root: get_root(root),
        parent_root: get_root(parent),
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        unrealized_justified_checkpoint: None,
    }
}

fn check_bytes_round_trip(original: &ProtoArrayForkChoice) {
    let bytes = original.as_bytes();
    let decoded =
        ProtoArrayForkChoice::from_bytes(&bytes).expect("fork choice should decode from bytes");
    assert!(
        *original == decoded,
        "fork choice should encode and decode without change"
    );
}

#[test]
fn definitions_survive_yaml() {
    let definition = votes::get_votes_test_definition();
    let yaml = serde_yaml::to_string(&definition).unwrap();
    let decoded: ForkChoiceTestDefinition = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(decoded.operations.len(), definition.operations.len());
    decoded.run();
}
