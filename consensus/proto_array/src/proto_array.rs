use crate::error::InvalidBestNodeInfo;
use crate::{Block, ExecutionStatus, JustifiedBalances, error::Error};
use serde::{Deserialize, Serialize};
use ssz::Encode;
use ssz::four_byte_option_impl;
use ssz_derive::{Decode, Encode};
use std::collections::{HashMap, HashSet};
use types::{ChainSpec, Checkpoint, Epoch, EthSpec, ExecutionBlockHash, Hash256, Slot};

// `Option<usize>` encoded with a four byte union selector, matching the persisted layout.
four_byte_option_impl!(four_byte_option_usize, usize);

/// A verdict from the execution engine that marks one or more payloads as invalid.
#[derive(Clone, Debug)]
pub enum InvalidationOperation {
    /// Only `block_root` and its descendants are invalid.
    InvalidateOne { block_root: Hash256 },
    /// Everything between `head_block_root` and the block carrying `latest_valid_ancestor` is
    /// invalid. The head itself is spared when its own payload is `latest_valid_ancestor`,
    /// unless `always_invalidate_head` is set.
    InvalidateMany {
        head_block_root: Hash256,
        always_invalidate_head: bool,
        latest_valid_ancestor: ExecutionBlockHash,
    },
}

impl InvalidationOperation {
    pub fn block_root(&self) -> Hash256 {
        match self {
            InvalidationOperation::InvalidateOne { block_root } => *block_root,
            InvalidationOperation::InvalidateMany {
                head_block_root, ..
            } => *head_block_root,
        }
    }

    pub fn latest_valid_ancestor(&self) -> Option<ExecutionBlockHash> {
        match self {
            InvalidationOperation::InvalidateOne { .. } => None,
            InvalidationOperation::InvalidateMany {
                latest_valid_ancestor,
                ..
            } => Some(*latest_valid_ancestor),
        }
    }

    pub fn invalidate_block_root(&self) -> bool {
        match self {
            InvalidationOperation::InvalidateOne { .. } => true,
            InvalidationOperation::InvalidateMany {
                always_invalidate_head,
                ..
            } => *always_invalidate_head,
        }
    }
}

/// One block of the tree, addressed by its position in `ProtoArray::nodes`.
#[derive(Clone, PartialEq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ProtoNode {
    /// Carried for callers; the weighting never reads it.
    pub slot: Slot,
    pub state_root: Hash256,
    /// Checkpoint root of the epoch this block belongs to, as seen from this block.
    pub target_root: Hash256,
    pub root: Hash256,
    #[ssz(with = "four_byte_option_usize")]
    pub parent: Option<usize>,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub weight: u64,
    #[ssz(with = "four_byte_option_usize")]
    pub best_child: Option<usize>,
    #[ssz(with = "four_byte_option_usize")]
    pub best_descendant: Option<usize>,
    pub execution_status: ExecutionStatus,
    pub unrealized_justified_checkpoint: Checkpoint,
    pub unrealized_finalized_checkpoint: Checkpoint,
}

impl ProtoNode {
    fn from_block(block: Block, parent: Option<usize>) -> Self {
        Self {
            slot: block.slot,
            state_root: block.state_root,
            target_root: block.target_root,
            root: block.root,
            parent,
            justified_checkpoint: block.justified_checkpoint,
            finalized_checkpoint: block.finalized_checkpoint,
            weight: 0,
            best_child: None,
            best_descendant: None,
            execution_status: block.execution_status,
            unrealized_justified_checkpoint: block.unrealized_justified_checkpoint,
            unrealized_finalized_checkpoint: block.unrealized_finalized_checkpoint,
        }
    }
}

/// The boost most recently folded into the weights, so it can be taken out again.
#[derive(PartialEq, Debug, Default, Encode, Decode, Serialize, Deserialize, Copy, Clone)]
pub struct ProposerBoost {
    pub root: Hash256,
    pub score: u64,
}

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct ProtoArray {
    /// `maybe_prune` does nothing until the finalized node sits at least this deep.
    pub prune_threshold: usize,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    /// Topologically ordered: every parent precedes its children.
    pub nodes: Vec<ProtoNode>,
    pub indices: HashMap<Hash256, usize>,
    pub previous_proposer_boost: ProposerBoost,
}

impl ProtoArray {
    fn node(&self, index: usize) -> Result<&ProtoNode, Error> {
        self.nodes.get(index).ok_or(Error::InvalidNodeIndex(index))
    }

    /// Folds `deltas` (one per node) into the node weights, swaps the old proposer boost for the
    /// new one and then rebuilds every best-child and best-descendant link.
    ///
    /// Weights are computed in full before any node is touched, so a failing delta leaves the
    /// array as it was.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_score_changes<E: EthSpec>(
        &mut self,
        deltas: Vec<i64>,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        new_justified_balances: &JustifiedBalances,
        proposer_boost_root: Hash256,
        current_slot: Slot,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        if deltas.len() != self.indices.len() {
            return Err(Error::InvalidDeltaLen {
                deltas: deltas.len(),
                indices: self.indices.len(),
            });
        }
        self.ensure_finalized_epoch_not_reverted(finalized_checkpoint)?;

        let boost =
            self.proposer_boost::<E>(proposer_boost_root, new_justified_balances, spec)?;
        let weights = self.reweigh(deltas, boost)?;

        for (node, weight) in self.nodes.iter_mut().zip(weights) {
            node.weight = weight;
        }
        self.previous_proposer_boost = boost;
        self.justified_checkpoint = justified_checkpoint;
        self.finalized_checkpoint = finalized_checkpoint;

        // Links are only rebuilt once every weight is final, otherwise a parent could compare
        // a fresh child against a stale sibling.
        for child_index in (0..self.nodes.len()).rev() {
            if let Some(parent_index) = self.node(child_index)?.parent {
                self.update_best_link::<E>(parent_index, child_index, current_slot)?;
            }
        }

        Ok(())
    }

    /// The boost `root` should receive. Unknown, zero and invalid roots score nothing.
    fn proposer_boost<E: EthSpec>(
        &self,
        root: Hash256,
        balances: &JustifiedBalances,
        spec: &ChainSpec,
    ) -> Result<ProposerBoost, Error> {
        let boosted = spec
            .proposer_score_boost
            .filter(|_| !root.is_zero())
            .and_then(|percent| {
                let index = *self.indices.get(&root)?;
                let node = self.nodes.get(index)?;
                (!node.execution_status.is_invalid()).then_some((index, percent))
            });

        let score = match boosted {
            Some((index, percent)) => calculate_committee_fraction::<E>(balances, percent)
                .ok_or(Error::ProposerBoostOverflow(index))?,
            None => 0,
        };

        Ok(ProposerBoost { root, score })
    }

    /// Walks the nodes leaves-first, pushing each node's delta into its parent, and returns the
    /// weight every node ends up with.
    fn reweigh(&self, mut deltas: Vec<i64>, boost: ProposerBoost) -> Result<Vec<u64>, Error> {
        let mut weights: Vec<u64> = self.nodes.iter().map(|node| node.weight).collect();

        for (index, node) in self.nodes.iter().enumerate().rev() {
            // The zero root stands in for genesis and always wins; its weight is never read.
            if node.root.is_zero() {
                continue;
            }

            let delta = self.node_delta(index, node, &deltas, boost)?;

            let weight = weights
                .get_mut(index)
                .ok_or(Error::InvalidNodeIndex(index))?;
            *weight = if node.execution_status.is_invalid() {
                0
            } else {
                weight
                    .checked_add_signed(delta)
                    .ok_or(Error::DeltaOverflow(index))?
            };

            if let Some(parent_index) = node.parent {
                let parent_delta = deltas
                    .get_mut(parent_index)
                    .ok_or(Error::InvalidParentDelta(parent_index))?;
                *parent_delta = parent_delta
                    .checked_add(delta)
                    .ok_or(Error::DeltaOverflow(parent_index))?;
            }
        }

        Ok(weights)
    }

    /// The change in weight of the node at `index`, including the boost swap. An invalid node
    /// sheds everything it carries and takes no part in boosting.
    fn node_delta(
        &self,
        index: usize,
        node: &ProtoNode,
        deltas: &[i64],
        boost: ProposerBoost,
    ) -> Result<i64, Error> {
        if node.execution_status.is_invalid() {
            return i64::try_from(node.weight)
                .map(|weight| -weight)
                .map_err(|_| Error::InvalidExecutionDeltaOverflow(index));
        }

        let mut delta = deltas
            .get(index)
            .copied()
            .ok_or(Error::InvalidNodeDelta(index))?;

        let previous = self.previous_proposer_boost;
        if !previous.root.is_zero() && previous.root == node.root {
            delta = i64::try_from(previous.score)
                .ok()
                .and_then(|score| delta.checked_sub(score))
                .ok_or(Error::DeltaOverflow(index))?;
        }
        if !boost.root.is_zero() && boost.root == node.root {
            delta = i64::try_from(boost.score)
                .ok()
                .and_then(|score| delta.checked_add(score))
                .ok_or(Error::DeltaOverflow(index))?;
        }

        Ok(delta)
    }

    /// Inserts `block` as a new leaf. Known blocks are ignored.
    ///
    /// A block with a `Valid` payload also validates every optimistic ancestor.
    pub fn on_block<E: EthSpec>(&mut self, block: Block, current_slot: Slot) -> Result<(), Error> {
        if self.indices.contains_key(&block.root) {
            return Ok(());
        }

        let parent_index = self.parent_index_for(block.root, block.parent_root)?;
        let node_index = self.nodes.len();
        let payload_is_valid = matches!(block.execution_status, ExecutionStatus::Valid(_));

        self.indices.insert(block.root, node_index);
        self.nodes.push(ProtoNode::from_block(block, parent_index));

        if let Some(parent_index) = parent_index {
            self.update_best_link::<E>(parent_index, node_index, current_slot)?;

            if payload_is_valid {
                self.validate_payloads_from(parent_index)?;
            }
        }

        Ok(())
    }

    /// Resolves where a new block would hang in the tree without inserting it.
    ///
    /// Only the very first node may come without a parent. Any other block needs a known parent
    /// whose payload has not been declared invalid.
    pub fn parent_index_for(
        &self,
        block_root: Hash256,
        parent_root: Option<Hash256>,
    ) -> Result<Option<usize>, Error> {
        let Some(parent_root) = parent_root else {
            return if self.nodes.is_empty() {
                Ok(None)
            } else {
                Err(Error::MissingParentRoot(block_root))
            };
        };

        let parent_index = *self
            .indices
            .get(&parent_root)
            .ok_or(Error::ParentUnknown {
                block_root,
                parent_root,
            })?;
        let parent = self
            .nodes
            .get(parent_index)
            .ok_or(Error::InvalidParentIndex(parent_index))?;

        if parent.execution_status.is_invalid() {
            return Err(Error::ParentExecutionStatusIsInvalid {
                block_root,
                parent_root,
            });
        }

        Ok(Some(parent_index))
    }

    /// Fails with `RevertedFinalizedEpoch` when `finalized_checkpoint` would move finality
    /// backwards. Never mutates.
    pub fn ensure_finalized_epoch_not_reverted(
        &self,
        finalized_checkpoint: Checkpoint,
    ) -> Result<(), Error> {
        if finalized_checkpoint.epoch < self.finalized_checkpoint.epoch {
            return Err(Error::RevertedFinalizedEpoch {
                current_finalized_epoch: self.finalized_checkpoint.epoch,
                new_finalized_epoch: finalized_checkpoint.epoch,
            });
        }
        Ok(())
    }

    /// Marks the payload of `block_root` and of every optimistic ancestor as valid.
    ///
    /// Errors if the block is unknown or if an ancestor was already declared invalid.
    pub fn propagate_execution_payload_validation(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error> {
        let index = *self
            .indices
            .get(&block_root)
            .ok_or(Error::NodeUnknown(block_root))?;
        self.validate_payloads_from(index)
    }

    fn validate_payloads_from(&mut self, mut index: usize) -> Result<(), Error> {
        loop {
            let node = self
                .nodes
                .get_mut(index)
                .ok_or(Error::InvalidNodeIndex(index))?;

            match node.execution_status {
                // Everything behind a valid or pre-merge block is already settled.
                ExecutionStatus::Valid(_) | ExecutionStatus::Irrelevant(_) => return Ok(()),
                ExecutionStatus::Optimistic(hash) => {
                    node.execution_status = ExecutionStatus::Valid(hash);
                }
                // The engine contradicted itself. Nothing sensible can be done here.
                ExecutionStatus::Invalid(hash) => {
                    return Err(Error::InvalidAncestorOfValidPayload {
                        ancestor_block_root: node.root,
                        ancestor_payload_block_hash: hash,
                    });
                }
            }

            match node.parent {
                Some(parent_index) => index = parent_index,
                None => return Ok(()),
            }
        }
    }

    /// Applies `op` to the tree: the affected chain segment is invalidated first, then every
    /// descendant of an invalidated block follows.
    pub fn propagate_execution_payload_invalidation<E: EthSpec>(
        &mut self,
        op: &InvalidationOperation,
    ) -> Result<(), Error> {
        let head_root = op.block_root();
        let head_index = *self
            .indices
            .get(&head_root)
            .ok_or(Error::NodeUnknown(head_root))?;

        // The latest valid hash only counts when it names a known ancestor of the head that
        // sits inside the finalized chain. Junk or pre-finalization hashes are ignored.
        let anchor_root = op
            .latest_valid_ancestor()
            .and_then(|hash| self.execution_block_hash_to_beacon_block_root(&hash))
            .filter(|root| {
                self.is_descendant(*root, head_root)
                    && self.is_finalized_checkpoint_or_descendant::<E>(*root)
            });

        let mut invalidated = self.invalidate_ancestors(op, head_index, anchor_root.is_some())?;

        let start_root = anchor_root.unwrap_or(head_root);
        let start_index = *self
            .indices
            .get(&start_root)
            .ok_or(Error::NodeUnknown(start_root))?;
        self.invalidate_descendants(start_index, &mut invalidated)?;

        Ok(())
    }

    /// Walks back from the head, invalidating optimistic blocks until the latest valid payload
    /// is reached. Without a usable anchor only the head itself is considered.
    fn invalidate_ancestors(
        &mut self,
        op: &InvalidationOperation,
        head_index: usize,
        anchor_is_known: bool,
    ) -> Result<HashSet<usize>, Error> {
        let latest_valid_hash = op.latest_valid_ancestor();
        let mut invalidated = HashSet::new();
        let mut next = Some(head_index);

        while let Some(index) = next {
            let node = self
                .nodes
                .get_mut(index)
                .ok_or(Error::InvalidNodeIndex(index))?;
            let is_head = index == head_index;

            // Pre-merge blocks carry no payload and neither do their ancestors.
            let Some(hash) = node.execution_status.block_hash() else {
                break;
            };
            if !is_head && !anchor_is_known {
                break;
            }
            if latest_valid_hash == Some(hash) {
                // Stop at the last valid payload, cutting any link into the invalid segment.
                if node
                    .best_child
                    .is_some_and(|child| invalidated.contains(&child))
                {
                    node.best_child = None;
                }
                if node
                    .best_descendant
                    .is_some_and(|descendant| invalidated.contains(&descendant))
                {
                    node.best_descendant = None;
                }
                break;
            }

            if !is_head || op.invalidate_block_root() || anchor_is_known {
                match node.execution_status {
                    ExecutionStatus::Valid(payload_block_hash) => {
                        return Err(Error::ValidExecutionStatusBecameInvalid {
                            block_root: node.root,
                            payload_block_hash,
                        });
                    }
                    ExecutionStatus::Optimistic(hash) => {
                        // An invalid block cannot lead anywhere.
                        node.execution_status = ExecutionStatus::Invalid(hash);
                        node.best_child = None;
                        node.best_descendant = None;
                        invalidated.insert(index);
                    }
                    ExecutionStatus::Invalid(_) | ExecutionStatus::Irrelevant(_) => {}
                }
            }

            next = node.parent;
        }

        Ok(invalidated)
    }

    /// Scans forward from `start_index` and invalidates every block whose parent is invalidated.
    fn invalidate_descendants(
        &mut self,
        start_index: usize,
        invalidated: &mut HashSet<usize>,
    ) -> Result<(), Error> {
        for index in start_index.saturating_add(1)..self.nodes.len() {
            let node = self
                .nodes
                .get_mut(index)
                .ok_or(Error::InvalidNodeIndex(index))?;

            if !node
                .parent
                .is_some_and(|parent| invalidated.contains(&parent))
            {
                continue;
            }

            match node.execution_status {
                ExecutionStatus::Valid(payload_block_hash) => {
                    return Err(Error::ValidExecutionStatusBecameInvalid {
                        block_root: node.root,
                        payload_block_hash,
                    });
                }
                ExecutionStatus::Optimistic(hash) | ExecutionStatus::Invalid(hash) => {
                    node.execution_status = ExecutionStatus::Invalid(hash);
                }
                ExecutionStatus::Irrelevant(_) => {
                    return Err(Error::IrrelevantDescendant {
                        block_root: node.root,
                    });
                }
            }
            invalidated.insert(index);
        }

        Ok(())
    }

    /// Returns the best descendant of the justified block, or the justified block itself.
    ///
    /// Only meaningful right after `apply_score_changes`: `on_block` does not refresh the links
    /// above the new leaf's parent.
    pub fn find_head<E: EthSpec>(
        &self,
        justified_root: &Hash256,
        current_slot: Slot,
    ) -> Result<Hash256, Error> {
        let justified_index = *self
            .indices
            .get(justified_root)
            .ok_or(Error::JustifiedNodeUnknown(*justified_root))?;
        let justified_node = self
            .nodes
            .get(justified_index)
            .ok_or(Error::InvalidJustifiedIndex(justified_index))?;

        // Nothing below an invalid justified block can be valid, so there is no head to pick.
        if justified_node.execution_status.is_invalid() {
            return Err(Error::InvalidJustifiedCheckpointExecutionStatus {
                justified_root: *justified_root,
            });
        }

        let head_index = justified_node.best_descendant.unwrap_or(justified_index);
        let head = self
            .nodes
            .get(head_index)
            .ok_or(Error::InvalidBestDescendant(head_index))?;

        if !self.node_is_viable_for_head::<E>(head, current_slot) {
            return Err(Error::InvalidBestNode(Box::new(InvalidBestNodeInfo {
                current_slot,
                start_root: *justified_root,
                justified_checkpoint: self.justified_checkpoint,
                finalized_checkpoint: self.finalized_checkpoint,
                head_root: head.root,
                head_justified_checkpoint: head.justified_checkpoint,
                head_finalized_checkpoint: head.finalized_checkpoint,
            })));
        }

        Ok(head.root)
    }

    /// Update the tree with new finalization information. The tree is only actually pruned if
    /// the finalized node sits at least `self.prune_threshold` positions into the array.
    ///
    /// Every node which is neither the finalized node nor one of its descendants is removed, and
    /// all indices (parent, best-child, best-descendant and the root map) are rebuilt.
    ///
    /// ## Errors
    ///
    /// - The finalized root is unknown.
    /// - An index points outside of `self.nodes`.
    pub fn maybe_prune(&mut self, finalized_root: Hash256) -> Result<(), Error> {
        let finalized_index = *self
            .indices
            .get(&finalized_root)
            .ok_or(Error::FinalizedNodeUnknown(finalized_root))?;

        if finalized_index < self.prune_threshold {
            // Pruning at small numbers incurs more cost than benefit.
            return Ok(());
        }

        // Maps each old index to its position in the pruned array, if it survives. Parents always
        // precede their children, so a single forward pass from the finalized node finds all of
        // its descendants.
        let mut new_indices: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut retained = Vec::with_capacity(self.nodes.len().saturating_sub(finalized_index));

        for (old_index, node) in self.nodes.drain(..).enumerate() {
            if old_index < finalized_index {
                continue;
            }
            let keep = old_index == finalized_index
                || node
                    .parent
                    .and_then(|parent| new_indices.get(parent).copied().flatten())
                    .is_some();
            if keep {
                if let Some(slot) = new_indices.get_mut(old_index) {
                    *slot = Some(retained.len());
                }
                retained.push(node);
            }
        }

        let remap = |index: Option<usize>| index.and_then(|i| new_indices.get(i).copied().flatten());

        self.indices.clear();
        for (index, node) in retained.iter_mut().enumerate() {
            node.parent = remap(node.parent);
            node.best_child = remap(node.best_child);
            node.best_descendant = remap(node.best_descendant);
            self.indices.insert(node.root, index);
        }
        self.nodes = retained;

        Ok(())
    }

    /// Re-evaluates whether the child at `child_index` should be the best child of the node at
    /// `parent_index`, and points the parent's best descendant accordingly.
    fn update_best_link<E: EthSpec>(
        &mut self,
        parent_index: usize,
        child_index: usize,
        current_slot: Slot,
    ) -> Result<(), Error> {
        let child = self.node(child_index)?;
        let parent = self.node(parent_index)?;
        let child_is_viable = self.node_leads_to_viable_head::<E>(child, current_slot)?;

        let to_child = (
            Some(child_index),
            child.best_descendant.or(Some(child_index)),
        );
        let unchanged = (parent.best_child, parent.best_descendant);

        let (best_child, best_descendant) = match parent.best_child {
            Some(current) if current == child_index => {
                if child_is_viable {
                    to_child
                } else {
                    (None, None)
                }
            }
            Some(current) => {
                let incumbent = self
                    .nodes
                    .get(current)
                    .ok_or(Error::InvalidBestChildIndex(current))?;
                let incumbent_is_viable =
                    self.node_leads_to_viable_head::<E>(incumbent, current_slot)?;

                // Viability wins first, then weight, then the greater root.
                if (child_is_viable, child.weight, child.root)
                    > (incumbent_is_viable, incumbent.weight, incumbent.root)
                {
                    to_child
                } else {
                    unchanged
                }
            }
            None if child_is_viable => to_child,
            None => unchanged,
        };

        let parent = self
            .nodes
            .get_mut(parent_index)
            .ok_or(Error::InvalidNodeIndex(parent_index))?;
        parent.best_child = best_child;
        parent.best_descendant = best_descendant;

        Ok(())
    }

    fn node_leads_to_viable_head<E: EthSpec>(
        &self,
        node: &ProtoNode,
        current_slot: Slot,
    ) -> Result<bool, Error> {
        if let Some(index) = node.best_descendant {
            let best_descendant = self
                .nodes
                .get(index)
                .ok_or(Error::InvalidBestDescendant(index))?;
            if self.node_is_viable_for_head::<E>(best_descendant, current_slot) {
                return Ok(true);
            }
        }

        Ok(self.node_is_viable_for_head::<E>(node, current_slot))
    }

    /// A node may become head only if its payload is not invalid and it agrees with the
    /// tree's justified and finalized checkpoints. Genesis checkpoints match anything.
    pub fn node_is_viable_for_head<E: EthSpec>(&self, node: &ProtoNode, current_slot: Slot) -> bool {
        if node.execution_status.is_invalid() {
            return false;
        }

        let genesis_epoch = Epoch::new(0);
        let current_epoch = current_slot.epoch(E::slots_per_epoch());
        let node_epoch = node.slot.epoch(E::slots_per_epoch());

        // Blocks from a previous epoch have had their unrealized checkpoints pulled up by now, so
        // judge them by those.
        let (justified_checkpoint, finalized_checkpoint) = if current_epoch > node_epoch {
            (
                node.unrealized_justified_checkpoint,
                node.unrealized_finalized_checkpoint,
            )
        } else {
            (node.justified_checkpoint, node.finalized_checkpoint)
        };

        let correct_justified = justified_checkpoint == self.justified_checkpoint
            || self.justified_checkpoint.epoch == genesis_epoch;
        let correct_finalized = finalized_checkpoint == self.finalized_checkpoint
            || self.finalized_checkpoint.epoch == genesis_epoch;

        correct_justified && correct_finalized
    }

    /// Return a reverse iterator over the nodes which comprise the chain ending at `block_root`.
    pub fn iter_nodes<'a>(&'a self, block_root: &Hash256) -> Iter<'a> {
        let next_node_index = self.indices.get(block_root).copied();
        Iter {
            next_node_index,
            proto_array: self,
        }
    }

    /// Return a reverse iterator over the block roots of the chain ending at `block_root`.
    ///
    /// Skipped slots yield nothing.
    pub fn iter_block_roots<'a>(
        &'a self,
        block_root: &Hash256,
    ) -> impl Iterator<Item = (Hash256, Slot)> + 'a {
        self.iter_nodes(block_root)
            .map(|node| (node.root, node.slot))
    }

    /// `true` when `ancestor_root` lies on the chain ending at `descendant_root`, including the
    /// case where both are the same known block. Unknown roots give `false`.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        let Some(ancestor) = self
            .indices
            .get(&ancestor_root)
            .and_then(|index| self.nodes.get(*index))
        else {
            return false;
        };

        self.iter_nodes(&descendant_root)
            .take_while(|node| node.slot >= ancestor.slot)
            .any(|node| node.root == ancestor_root)
    }

    /// `true` when `root` is the finalized checkpoint block or builds on it. This tests against
    /// the finalized *checkpoint*, which may name an earlier block than the epoch start.
    pub fn is_finalized_checkpoint_or_descendant<E: EthSpec>(&self, root: Hash256) -> bool {
        let finalized = self.finalized_checkpoint;
        let finalized_slot = finalized.epoch.start_slot(E::slots_per_epoch());

        let Some(node) = self
            .indices
            .get(&root)
            .and_then(|index| self.nodes.get(*index))
        else {
            return false;
        };

        // A block that already records the finalized checkpoint needs no walk.
        let known = [
            node.finalized_checkpoint,
            node.justified_checkpoint,
            node.unrealized_finalized_checkpoint,
            node.unrealized_justified_checkpoint,
        ];
        if known.contains(&finalized) {
            return true;
        }

        // The first ancestor at or before the finalized slot must be the finalized block. A
        // chain that ends before reaching it was pruned away, so it conflicts with finality.
        self.iter_nodes(&root)
            .find(|ancestor| ancestor.slot <= finalized_slot)
            .is_some_and(|ancestor| ancestor.root == finalized.root)
    }

    /// The most recent block whose payload has `block_hash`, if any.
    pub fn execution_block_hash_to_beacon_block_root(
        &self,
        block_hash: &ExecutionBlockHash,
    ) -> Option<Hash256> {
        self.nodes
            .iter()
            .rev()
            .find(|node| node.execution_status.block_hash() == Some(*block_hash))
            .map(|node| node.root)
    }

    /// Returns every node which has no children, in insertion order.
    pub fn heads(&self) -> Vec<&ProtoNode> {
        let parents: HashSet<usize> = self.nodes.iter().filter_map(|node| node.parent).collect();
        self.nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| !parents.contains(index))
            .map(|(_, node)| node)
            .collect()
    }

    /// Approximate size of the array when SSZ encoded. Used for metrics.
    pub fn ssz_bytes_len(&self) -> usize {
        self.nodes.iter().map(|node| node.ssz_bytes_len()).sum()
    }
}

/// `proposer_score_boost` percent of the average per-slot committee weight.
pub fn calculate_committee_fraction<E: EthSpec>(
    justified_balances: &JustifiedBalances,
    proposer_score_boost: u64,
) -> Option<u64> {
    justified_balances
        .total_effective_balance
        .checked_div(E::slots_per_epoch())?
        .checked_mul(proposer_score_boost)?
        .checked_div(100)
}

/// Reverse iterator over one path through a `ProtoArray`.
pub struct Iter<'a> {
    next_node_index: Option<usize>,
    proto_array: &'a ProtoArray,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ProtoNode;

    fn next(&mut self) -> Option<Self::Item> {
        let next_node_index = self.next_node_index?;
        let node = self.proto_array.nodes.get(next_node_index)?;
        self.next_node_index = node.parent;
        Some(node)
    }
}
