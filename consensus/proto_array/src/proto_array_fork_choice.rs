use crate::{
    JustifiedBalances,
    error::Error,
    proto_array::{InvalidationOperation, Iter, ProposerBoost, ProtoArray, ProtoNode},
    ssz_container::SszContainer,
};
use serde::{Deserialize, Serialize};
use ssz::{Decode, Encode};
use ssz_derive::{Decode, Encode};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};
use types::{
    ChainSpec, Checkpoint, Epoch, EthSpec, ExecutionBlockHash, FixedBytesExtended, Hash256, Slot,
};

pub const DEFAULT_PRUNE_THRESHOLD: usize = 256;

/// The latest message of a single validator.
///
/// `next_*` is written by `process_attestation`. `current_root` only catches up with
/// `next_root` once `find_head` has folded the vote into the tree, so fresh votes carry no
/// weight before then.
#[derive(Default, PartialEq, Clone, Debug, Encode, Decode)]
pub struct VoteTracker {
    current_root: Hash256,
    next_root: Hash256,
    next_epoch: Epoch,
}

/// Represents the verification status of an execution payload.
#[derive(Clone, Copy, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
#[ssz(enum_behaviour = "union")]
pub enum ExecutionStatus {
    /// An EL has determined that the payload is valid.
    Valid(ExecutionBlockHash),
    /// An EL has determined that the payload is invalid.
    Invalid(ExecutionBlockHash),
    /// An EL has not yet verified the execution payload.
    Optimistic(ExecutionBlockHash),
    /// The block is either prior to the merge fork, or after the merge fork but before the terminal
    /// PoW block has been found.
    ///
    /// # Note:
    ///
    /// This `bool` only exists to satisfy our SSZ implementation which requires all variants
    /// to have a value. It can be set to anything.
    Irrelevant(bool),
}

impl ExecutionStatus {
    pub fn is_execution_enabled(&self) -> bool {
        !matches!(self, ExecutionStatus::Irrelevant(_))
    }

    pub fn irrelevant() -> Self {
        ExecutionStatus::Irrelevant(false)
    }

    pub fn block_hash(&self) -> Option<ExecutionBlockHash> {
        match self {
            ExecutionStatus::Valid(hash)
            | ExecutionStatus::Invalid(hash)
            | ExecutionStatus::Optimistic(hash) => Some(*hash),
            ExecutionStatus::Irrelevant(_) => None,
        }
    }

    /// Returns `true` if the block:
    ///
    /// - Has a valid payload, OR
    /// - Does not have execution enabled.
    ///
    /// Whenever this function returns `true`, the block is *fully valid*.
    pub fn is_valid_or_irrelevant(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Valid(_) | ExecutionStatus::Irrelevant(_)
        )
    }

    /// Returns `true` if the block has a payload that has not yet been verified by an EL.
    pub fn is_strictly_optimistic(&self) -> bool {
        matches!(self, ExecutionStatus::Optimistic(_))
    }

    /// Returns `true` if the block has a payload that is either unverified or invalid.
    pub fn is_optimistic_or_invalid(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Optimistic(_) | ExecutionStatus::Invalid(_)
        )
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ExecutionStatus::Invalid(_))
    }

    pub fn is_irrelevant(&self) -> bool {
        matches!(self, ExecutionStatus::Irrelevant(_))
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Valid(_) => write!(f, "valid"),
            ExecutionStatus::Invalid(_) => write!(f, "invalid"),
            ExecutionStatus::Optimistic(_) => write!(f, "optimistic"),
            ExecutionStatus::Irrelevant(_) => write!(f, "irrelevant"),
        }
    }
}

/// A block that is to be applied to the fork choice.
///
/// A simplified version of a beacon block, carrying only what fork choice needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub slot: Slot,
    pub root: Hash256,
    pub parent_root: Option<Hash256>,
    pub state_root: Hash256,
    pub target_root: Hash256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    /// Indicates if an execution node has marked this block as valid. Also contains the execution
    /// block hash.
    pub execution_status: ExecutionStatus,
    pub unrealized_justified_checkpoint: Checkpoint,
    pub unrealized_finalized_checkpoint: Checkpoint,
}

impl Block {
    fn from_node(node: &ProtoNode, parent_root: Option<Hash256>) -> Self {
        Self {
            slot: node.slot,
            root: node.root,
            parent_root,
            state_root: node.state_root,
            target_root: node.target_root,
            justified_checkpoint: node.justified_checkpoint,
            finalized_checkpoint: node.finalized_checkpoint,
            execution_status: node.execution_status,
            unrealized_justified_checkpoint: node.unrealized_justified_checkpoint,
            unrealized_finalized_checkpoint: node.unrealized_finalized_checkpoint,
        }
    }
}

/// A `Vec` that grows with `Default` values whenever an index past its end is written.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ElasticList<T>(pub Vec<T>);

impl<T> ElasticList<T>
where
    T: Default,
{
    pub fn get_mut(&mut self, i: usize) -> Result<&mut T, Error> {
        if self.0.len() <= i {
            let len = i
                .checked_add(1)
                .ok_or(Error::IndexOverflow("elastic_list"))?;
            self.0.resize_with(len, Default::default);
        }
        self.0
            .get_mut(i)
            .ok_or(Error::IndexOverflow("elastic_list"))
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.0.get(i)
    }
}

#[derive(PartialEq, Debug)]
pub struct ProtoArrayForkChoice {
    pub(crate) proto_array: ProtoArray,
    pub(crate) votes: ElasticList<VoteTracker>,
    pub(crate) balances: JustifiedBalances,
}

impl ProtoArrayForkChoice {
    pub fn new<E: EthSpec>(
        current_slot: Slot,
        finalized_block_slot: Slot,
        finalized_block_state_root: Hash256,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        execution_status: ExecutionStatus,
    ) -> Result<Self, Error> {
        let mut proto_array = ProtoArray {
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            justified_checkpoint,
            finalized_checkpoint,
            nodes: Vec::with_capacity(1),
            indices: HashMap::with_capacity(1),
            previous_proposer_boost: ProposerBoost::default(),
        };

        let block = Block {
            slot: finalized_block_slot,
            root: finalized_checkpoint.root,
            parent_root: None,
            state_root: finalized_block_state_root,
            // We are using the finalized_root as the target_root, since it always lies on an
            // epoch boundary.
            target_root: finalized_checkpoint.root,
            justified_checkpoint,
            finalized_checkpoint,
            execution_status,
            unrealized_justified_checkpoint: justified_checkpoint,
            unrealized_finalized_checkpoint: finalized_checkpoint,
        };

        proto_array.on_block::<E>(block, current_slot)?;

        Ok(Self {
            proto_array,
            votes: ElasticList::default(),
            balances: JustifiedBalances::default(),
        })
    }

    /// See `ProtoArray::propagate_execution_payload_validation` for documentation.
    pub fn process_execution_payload_validation(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error> {
        self.proto_array
            .propagate_execution_payload_validation(block_root)
    }

    /// See `ProtoArray::propagate_execution_payload_invalidation` for documentation.
    pub fn process_execution_payload_invalidation<E: EthSpec>(
        &mut self,
        op: &InvalidationOperation,
    ) -> Result<(), Error> {
        self.proto_array
            .propagate_execution_payload_invalidation::<E>(op)
    }

    /// Records the latest message of `validator_index`. A vote only replaces the stored one if it
    /// is the first for this validator or targets a strictly later epoch.
    pub fn process_attestation(
        &mut self,
        validator_index: usize,
        block_root: Hash256,
        target_epoch: Epoch,
    ) -> Result<(), Error> {
        let vote = self.votes.get_mut(validator_index)?;

        if target_epoch > vote.next_epoch || *vote == VoteTracker::default() {
            vote.next_root = block_root;
            vote.next_epoch = target_epoch;
        }

        Ok(())
    }

    /// Runs every check `process_block` would run, without inserting anything. Known blocks pass.
    pub fn validate_block(&self, block: &Block) -> Result<(), Error> {
        if self.contains_block(&block.root) {
            return Ok(());
        }
        if block.parent_root.is_none() {
            return Err(Error::MissingParentRoot(block.root));
        }

        self.proto_array
            .parent_index_for(block.root, block.parent_root)
            .map(drop)
    }

    pub fn process_block<E: EthSpec>(
        &mut self,
        block: Block,
        current_slot: Slot,
    ) -> Result<(), Error> {
        self.validate_block(&block)?;
        self.proto_array.on_block::<E>(block, current_slot)
    }

    /// Applies the score changes of all pending votes and returns the head.
    ///
    /// Votes only roll over, and the new balances only replace the old ones, once the tree has
    /// accepted the changes. A failure leaves every vote pending.
    #[allow(clippy::too_many_arguments)]
    pub fn find_head<E: EthSpec>(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: &JustifiedBalances,
        proposer_boost_root: Hash256,
        equivocating_indices: &BTreeSet<u64>,
        current_slot: Slot,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        let StagedDeltas {
            deltas,
            rolled_votes,
        } = compute_deltas(
            &self.proto_array.indices,
            &self.votes,
            &self.balances.effective_balances,
            &justified_state_balances.effective_balances,
            equivocating_indices,
        )?;

        self.proto_array.apply_score_changes::<E>(
            deltas,
            justified_checkpoint,
            finalized_checkpoint,
            justified_state_balances,
            proposer_boost_root,
            current_slot,
            spec,
        )?;

        commit_votes(&mut self.votes, rolled_votes);
        self.balances = justified_state_balances.clone();

        self.proto_array
            .find_head::<E>(&justified_checkpoint.root, current_slot)
    }

    pub fn maybe_prune(&mut self, finalized_root: Hash256) -> Result<(), Error> {
        self.proto_array.maybe_prune(finalized_root)
    }

    pub fn set_prune_threshold(&mut self, prune_threshold: usize) {
        self.proto_array.prune_threshold = prune_threshold;
    }

    pub fn len(&self) -> usize {
        self.proto_array.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proto_array.nodes.is_empty()
    }

    pub fn contains_block(&self, block_root: &Hash256) -> bool {
        self.proto_array.indices.contains_key(block_root)
    }

    fn get_proto_node(&self, block_root: &Hash256) -> Option<&ProtoNode> {
        let block_index = self.proto_array.indices.get(block_root)?;
        self.proto_array.nodes.get(*block_index)
    }

    pub fn get_block(&self, block_root: &Hash256) -> Option<Block> {
        let node = self.get_proto_node(block_root)?;
        let parent_root = node
            .parent
            .and_then(|i| self.proto_array.nodes.get(i))
            .map(|parent| parent.root);

        Some(Block::from_node(node, parent_root))
    }

    /// Returns the `block.execution_status` field, if the block is present.
    pub fn get_block_execution_status(&self, block_root: &Hash256) -> Option<ExecutionStatus> {
        let block = self.get_proto_node(block_root)?;
        Some(block.execution_status)
    }

    /// Returns the weight of a given block.
    pub fn get_weight(&self, block_root: &Hash256) -> Option<u64> {
        self.get_proto_node(block_root).map(|node| node.weight)
    }

    /// See `ProtoArray` documentation.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.proto_array
            .is_descendant(ancestor_root, descendant_root)
    }

    /// See `ProtoArray` documentation.
    pub fn is_finalized_checkpoint_or_descendant<E: EthSpec>(
        &self,
        descendant_root: Hash256,
    ) -> bool {
        self.proto_array
            .is_finalized_checkpoint_or_descendant::<E>(descendant_root)
    }

    pub fn latest_message(&self, validator_index: usize) -> Option<(Hash256, Epoch)> {
        let vote = self.votes.get(validator_index)?;

        if *vote == VoteTracker::default() {
            None
        } else {
            Some((vote.next_root, vote.next_epoch))
        }
    }

    /// See `ProtoArray::iter_nodes`
    pub fn iter_nodes(&self, block_root: &Hash256) -> Iter<'_> {
        self.proto_array.iter_nodes(block_root)
    }

    /// See `ProtoArray::iter_block_roots`
    pub fn iter_block_roots(
        &self,
        block_root: &Hash256,
    ) -> impl Iterator<Item = (Hash256, Slot)> + '_ {
        self.proto_array.iter_block_roots(block_root)
    }

    /// Returns all nodes that have zero children and are descended from the finalized checkpoint.
    pub fn heads_descended_from_finalization<E: EthSpec>(&self) -> Vec<&ProtoNode> {
        self.proto_array
            .heads()
            .into_iter()
            .filter(|node| {
                self.proto_array
                    .is_finalized_checkpoint_or_descendant::<E>(node.root)
            })
            .collect()
    }

    /// Returns all nodes in the tree which have the given `parent_root` as their parent.
    pub fn children_of(&self, parent_root: &Hash256) -> Vec<&ProtoNode> {
        let Some(parent_index) = self.proto_array.indices.get(parent_root).copied() else {
            return vec![];
        };
        self.proto_array
            .nodes
            .iter()
            .filter(|node| node.parent == Some(parent_index))
            .collect()
    }

    pub fn as_ssz_container(&self) -> SszContainer {
        SszContainer::from(self)
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        SszContainer::from(self).as_ssz_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let container = SszContainer::from_ssz_bytes(bytes)?;
        container.try_into()
    }

    /// Returns a read-lock to core `ProtoArray` struct.
    ///
    /// Should only be used when encoding/decoding during troubleshooting.
    pub fn core_proto_array(&self) -> &ProtoArray {
        &self.proto_array
    }

    /// Returns a mutable reference to the core `ProtoArray` struct.
    ///
    /// Should only be used during database schema migrations.
    pub fn core_proto_array_mut(&mut self) -> &mut ProtoArray {
        &mut self.proto_array
    }
}

/// Score changes for every node, together with the `current_root` each changed vote moves to.
#[derive(Debug)]
pub(crate) struct StagedDeltas {
    pub deltas: Vec<i64>,
    pub rolled_votes: Vec<(usize, Hash256)>,
}

/// Moves each vote in `rolled_votes` onto its new `current_root`.
pub(crate) fn commit_votes(
    votes: &mut ElasticList<VoteTracker>,
    rolled_votes: Vec<(usize, Hash256)>,
) {
    for (validator_index, root) in rolled_votes {
        if let Some(vote) = votes.0.get_mut(validator_index) {
            vote.current_root = root;
        }
    }
}

/// Computes one delta per node in `indices` from the difference between each validator's
/// current and next vote, and between `old_balances` and `new_balances`.
///
/// `votes` is left untouched: the roll-overs come back in `StagedDeltas::rolled_votes`.
/// Votes for roots outside `indices` only drop out of the tree.
pub(crate) fn compute_deltas(
    indices: &HashMap<Hash256, usize>,
    votes: &ElasticList<VoteTracker>,
    old_balances: &[u64],
    new_balances: &[u64],
    equivocating_indices: &BTreeSet<u64>,
) -> Result<StagedDeltas, Error> {
    let mut deltas = vec![0_i64; indices.len()];
    let mut rolled_votes = vec![];

    let apply = |deltas: &mut Vec<i64>, root: &Hash256, amount: i64| -> Result<(), Error> {
        // Votes for roots outside of the tree (e.g., pre-finalization) are ignored.
        if let Some(index) = indices.get(root).copied() {
            let delta = deltas
                .get_mut(index)
                .ok_or(Error::InvalidNodeDelta(index))?;
            *delta = delta
                .checked_add(amount)
                .ok_or(Error::DeltaOverflow(index))?;
        }
        Ok(())
    };

    for (val_index, vote) in votes.0.iter().enumerate() {
        // There is no need to create a score change if the validator has never voted or both their
        // votes are for the zero hash (alias to the genesis block).
        if vote.current_root.is_zero() && vote.next_root.is_zero() {
            continue;
        }

        // If the validator was not included in the _old_ balances (i.e., it did not exist yet)
        // then say its balance was zero.
        let old_balance = old_balances.get(val_index).copied().unwrap_or(0);

        // Equivocating validators lose their weight exactly once: the deduction is applied while
        // `current_root` is still set, after which it is zeroed for good. Later attestations only
        // ever touch `next_root`.
        if equivocating_indices.contains(&(val_index as u64)) {
            if !vote.current_root.is_zero() {
                apply(&mut deltas, &vote.current_root, -(old_balance as i64))?;
                rolled_votes.push((val_index, Hash256::zero()));
            }
            continue;
        }

        // It is possible that there is a vote for an unknown validator if we change our justified
        // state to a new state with a higher epoch that is on a different fork because that fork
        // may have on-boarded less validators than the prior fork.
        let new_balance = new_balances.get(val_index).copied().unwrap_or(0);

        if vote.current_root != vote.next_root || old_balance != new_balance {
            apply(&mut deltas, &vote.current_root, -(old_balance as i64))?;
            apply(&mut deltas, &vote.next_root, new_balance as i64)?;

            rolled_votes.push((val_index, vote.next_root));
        }
    }

    Ok(StagedDeltas {
        deltas,
        rolled_votes,
    })
}
