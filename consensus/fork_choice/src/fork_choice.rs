use crate::metrics::{self, scrape_for_metrics};
use crate::{ForkChoiceStore, PostBlockState};
use logging::crit;
use proto_array::{
    Block as ProtoBlock, ExecutionStatus, InvalidationOperation, ProtoArrayForkChoice,
};
use ssz_derive::{Decode, Encode};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;
use types::{
    BeaconBlockHeader, BeaconStateError, ChainSpec, Checkpoint, Epoch, EthSpec,
    ExecutionBlockHash, FixedBytesExtended, Hash256, IndexedAttestation, Slot,
};

/// Attesting indices may reach this far past the justified balances. Validators activated after
/// the justified checkpoint have no balance there yet.
pub const VALIDATOR_INDEX_MARGIN: usize = 1 << 20;

#[derive(Debug)]
pub enum Error<T> {
    InvalidAttestation(InvalidAttestation),
    InvalidBlock(InvalidBlock),
    ProtoArrayError(proto_array::Error),
    InvalidProtoArrayBytes(proto_array::Error),
    FailedToProcessInvalidExecutionPayload(proto_array::Error),
    FailedToProcessValidExecutionPayload(proto_array::Error),
    MissingProtoArrayBlock(Hash256),
    /// The clock was asked to jump more than one slot at once.
    InconsistentOnTick {
        previous_slot: Slot,
        time: Slot,
    },
    BeaconStateError(BeaconStateError),
    UnableToSetJustifiedCheckpoint(T),
    /// The store refused a block that passed every fork choice check.
    AfterBlockFailed(T),
    /// Anchors must sit on an epoch boundary.
    InvalidAnchor {
        block_slot: Slot,
        state_slot: Slot,
    },
    /// A block with a non-zero payload hash was reported as having no payload.
    InvalidPayloadStatus {
        block_slot: Slot,
        block_root: Hash256,
        payload_verification_status: PayloadVerificationStatus,
    },
    MissingJustifiedBlock {
        justified_checkpoint: Checkpoint,
    },
    MissingFinalizedBlock {
        finalized_checkpoint: Checkpoint,
    },
}

impl<T> From<InvalidAttestation> for Error<T> {
    fn from(e: InvalidAttestation) -> Self {
        Error::InvalidAttestation(e)
    }
}

impl<T> From<proto_array::Error> for Error<T> {
    fn from(e: proto_array::Error) -> Self {
        Error::ProtoArrayError(e)
    }
}

impl<T> From<BeaconStateError> for Error<T> {
    fn from(e: BeaconStateError) -> Self {
        Error::BeaconStateError(e)
    }
}

/// Reasons `ForkChoice::on_block` turns a block away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidBlock {
    UnknownParent(Hash256),
    FutureSlot {
        current_slot: Slot,
        block_slot: Slot,
    },
    FinalizedSlot {
        finalized_slot: Slot,
        block_slot: Slot,
    },
    NotFinalizedDescendant {
        finalized_root: Hash256,
        block_ancestor: Option<Hash256>,
    },
}

/// Reasons `ForkChoice::on_attestation` turns an attestation away. None of them leave a vote
/// behind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidAttestation {
    /// No validator signed it.
    EmptyAggregationBitfield,
    /// An attesting index lies at or past `bound`, outside any registry fork choice can weigh.
    UnknownValidatorIndex { validator_index: u64, bound: u64 },
    /// `beacon_block_root` is not in the DAG.
    UnknownHeadBlock { beacon_block_root: Hash256 },
    /// `data.slot` falls outside `target.epoch`.
    BadTargetEpoch { target: Epoch, slot: Slot },
    /// `target.root` is not in the DAG.
    UnknownTargetRoot(Hash256),
    /// Gossip attestations must target the current or previous epoch.
    FutureEpoch {
        attestation_epoch: Epoch,
        current_epoch: Epoch,
    },
    PastEpoch {
        attestation_epoch: Epoch,
        current_epoch: Epoch,
    },
    /// `target.root` disagrees with the epoch boundary block of the voted chain.
    InvalidTarget {
        attestation: Hash256,
        local: Hash256,
    },
    /// The voted block is newer than the attestation.
    AttestsToFutureBlock { block: Slot, attestation: Slot },
    FutureSlot {
        attestation_slot: Slot,
        current_slot: Slot,
    },
}

/// What the execution layer said about a block's payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadVerificationStatus {
    Verified,
    /// Imported without a verdict.
    Optimistic,
    /// The block has no payload to verify.
    Irrelevant,
}

impl PayloadVerificationStatus {
    pub fn is_optimistic(&self) -> bool {
        matches!(self, PayloadVerificationStatus::Optimistic)
    }

    /// The DAG status for a block whose payload hash is `block_hash`. `None` when a real payload
    /// was reported as `Irrelevant`.
    fn execution_status(self, block_hash: Option<ExecutionBlockHash>) -> Option<ExecutionStatus> {
        match (block_hash, self) {
            (None, _) => Some(ExecutionStatus::irrelevant()),
            (Some(hash), PayloadVerificationStatus::Verified) => Some(ExecutionStatus::Valid(hash)),
            (Some(hash), PayloadVerificationStatus::Optimistic) => {
                Some(ExecutionStatus::Optimistic(hash))
            }
            (Some(_), PayloadVerificationStatus::Irrelevant) => None,
        }
    }
}

/// The payload hash of `state`, if it carries a payload fork choice should track.
fn payload_block_hash<S: PostBlockState>(state: &S) -> Option<ExecutionBlockHash> {
    state
        .latest_execution_block_hash()
        .filter(|hash| state.is_execution_enabled() && *hash != ExecutionBlockHash::zero())
}

/// An attestation held back until its slot has passed.
#[derive(Clone, PartialEq, Debug, Encode, Decode)]
pub struct QueuedAttestation {
    slot: Slot,
    attesting_indices: Vec<u64>,
    block_root: Hash256,
    target_epoch: Epoch,
}

impl From<&IndexedAttestation> for QueuedAttestation {
    fn from(a: &IndexedAttestation) -> Self {
        Self {
            slot: a.data.slot,
            attesting_indices: a.attesting_indices.clone(),
            block_root: a.data.beacon_block_root,
            target_epoch: a.data.target.epoch,
        }
    }
}

impl QueuedAttestation {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn block_root(&self) -> Hash256 {
        self.block_root
    }
}

/// Drains the leading run of `queued` made before `current_slot`.
fn dequeue_attestations(
    current_slot: Slot,
    queued: &mut Vec<QueuedAttestation>,
) -> Vec<QueuedAttestation> {
    let ready = queued
        .iter()
        .take_while(|a| a.slot < current_slot)
        .count();

    metrics::inc_counter_by(&metrics::FORK_CHOICE_DEQUEUED_ATTESTATIONS, ready as u64);

    queued.drain(..ready).collect()
}

/// Whether an attestation arrived inside a block. Block attestations skip the clock checks.
#[derive(Clone, Copy)]
pub enum AttestationFromBlock {
    True,
    False,
}

/// The checkpoints that moved during a call into `ForkChoice`.
///
/// Each field is `Some` only if the store's checkpoint actually advanced. If it advanced more than
/// once during the call, the latest value is reported.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CheckpointUpdates {
    pub justified: Option<Checkpoint>,
    pub finalized: Option<Checkpoint>,
}

impl CheckpointUpdates {
    pub fn is_empty(&self) -> bool {
        self.justified.is_none() && self.finalized.is_none()
    }

    fn merge(&mut self, other: CheckpointUpdates) {
        if other.justified.is_some() {
            self.justified = other.justified;
        }
        if other.finalized.is_some() {
            self.finalized = other.finalized;
        }
    }
}

/// A block that cleared every check in `ForkChoice::on_block`, with the store writes it implies.
/// Building one touches nothing.
struct StagedBlock {
    proto_block: ProtoBlock,
    checkpoints: CheckpointUpdates,
    apply_proposer_boost: bool,
}

/// Head values handed to the execution layer, refreshed by `ForkChoice::get_head`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForkchoiceUpdateParameters {
    pub head_root: Hash256,
    pub head_hash: Option<ExecutionBlockHash>,
    pub justified_hash: Option<ExecutionBlockHash>,
    pub finalized_hash: Option<ExecutionBlockHash>,
}

impl Default for ForkchoiceUpdateParameters {
    fn default() -> Self {
        Self {
            head_root: Hash256::zero(),
            head_hash: None,
            justified_hash: None,
            finalized_hash: None,
        }
    }
}

/// LMD-GHOST fork choice over a `ProtoArrayForkChoice` DAG, with a `ForkChoiceStore` holding the
/// clock, checkpoints and justified balances.
///
/// Blocks and attestations are validated in full before anything is written. Attestations from
/// the current slot wait in a queue. The head is cached until something that can move it changes.
///
/// Every `&mut self` method must be called from one logical sequence.
pub struct ForkChoice<T, E> {
    fc_store: T,
    proto_array: ProtoArrayForkChoice,
    queued_attestations: Vec<QueuedAttestation>,
    forkchoice_update_parameters: ForkchoiceUpdateParameters,
    /// Set whenever something that can move the head changes.
    head_is_stale: bool,
    _phantom: PhantomData<E>,
}

impl<T, E> PartialEq for ForkChoice<T, E>
where
    T: ForkChoiceStore<E> + PartialEq,
    E: EthSpec,
{
    fn eq(&self, other: &Self) -> bool {
        self.fc_store == other.fc_store
            && self.proto_array == other.proto_array
            && self.queued_attestations == other.queued_attestations
    }
}

impl<T, E> ForkChoice<T, E>
where
    T: ForkChoiceStore<E>,
    E: EthSpec,
{
    /// Starts fork choice from a trusted anchor: genesis or a finalized checkpoint.
    ///
    /// The store must already hold the anchor as both its justified and finalized checkpoint.
    pub fn from_anchor<S: PostBlockState>(
        fc_store: T,
        anchor_block_root: Hash256,
        anchor_block: &BeaconBlockHeader,
        anchor_state: &S,
        current_slot: Option<Slot>,
        spec: &ChainSpec,
    ) -> Result<Self, Error<T::Error>> {
        if anchor_state.slot() % E::slots_per_epoch() != 0 {
            return Err(Error::InvalidAnchor {
                block_slot: anchor_block.slot,
                state_slot: anchor_state.slot(),
            });
        }

        // A trusted anchor's payload is valid by definition.
        let execution_status = payload_block_hash(anchor_state)
            .map_or_else(ExecutionStatus::irrelevant, ExecutionStatus::Valid);

        let current_slot = current_slot.unwrap_or_else(|| fc_store.get_current_slot());

        let proto_array = ProtoArrayForkChoice::new::<E>(
            current_slot,
            anchor_block.slot,
            anchor_block.state_root,
            *fc_store.justified_checkpoint(),
            *fc_store.finalized_checkpoint(),
            execution_status,
        )?;

        debug!(
            root = ?anchor_block_root,
            slot = %anchor_block.slot,
            %execution_status,
            "Fork choice anchored"
        );

        Self::from_parts(fc_store, proto_array, vec![], spec)
    }

    /// Rebuilds `Self` from `Self::to_persisted` output and the store it was saved alongside.
    pub fn from_persisted(
        persisted: PersistedForkChoice,
        fc_store: T,
        spec: &ChainSpec,
    ) -> Result<Self, Error<T::Error>> {
        let proto_array = ProtoArrayForkChoice::try_from(persisted.proto_array)
            .map_err(Error::InvalidProtoArrayBytes)?;

        Self::from_parts(fc_store, proto_array, persisted.queued_attestations, spec)
    }

    fn from_parts(
        fc_store: T,
        proto_array: ProtoArrayForkChoice,
        queued_attestations: Vec<QueuedAttestation>,
        spec: &ChainSpec,
    ) -> Result<Self, Error<T::Error>> {
        let mut fork_choice = Self {
            fc_store,
            proto_array,
            queued_attestations,
            forkchoice_update_parameters: ForkchoiceUpdateParameters::default(),
            head_is_stale: true,
            _phantom: PhantomData,
        };

        fork_choice.get_head(spec)?;

        Ok(fork_choice)
    }

    /// The values cached by the last head computation.
    pub fn get_forkchoice_update_parameters(&self) -> ForkchoiceUpdateParameters {
        self.forkchoice_update_parameters
    }

    /// Root of the newest block at or before `ancestor_slot` on the chain ending at `block_root`.
    ///
    /// `Ok(None)` means the chain runs out before `ancestor_slot`, which happens for leftovers
    /// of a prune.
    pub fn get_ancestor(
        &self,
        block_root: Hash256,
        ancestor_slot: Slot,
    ) -> Result<Option<Hash256>, Error<T::Error>> {
        let block = self
            .proto_array
            .get_block(&block_root)
            .ok_or(Error::MissingProtoArrayBlock(block_root))?;

        if block.slot <= ancestor_slot {
            return Ok(Some(block_root));
        }

        Ok(self
            .proto_array
            .iter_block_roots(&block_root)
            .find(|(_, slot)| *slot <= ancestor_slot)
            .map(|(root, _)| root))
    }

    /// Returns the head root, recomputing it only if something moved since the last call.
    ///
    /// Does not advance the clock; see `Self::update_time`.
    pub fn get_head(&mut self, spec: &ChainSpec) -> Result<Hash256, Error<T::Error>> {
        if !self.head_is_stale {
            return Ok(self.forkchoice_update_parameters.head_root);
        }

        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_GET_HEAD_TIMES);

        let current_slot = self.fc_store.get_current_slot();
        let justified = *self.fc_store.justified_checkpoint();
        let finalized = *self.fc_store.finalized_checkpoint();

        let head_root = self
            .proto_array
            .find_head::<E>(
                justified,
                finalized,
                self.fc_store.justified_balances(),
                self.fc_store.proposer_boost_root(),
                self.fc_store.equivocating_indices(),
                current_slot,
                spec,
            )
            .inspect_err(|e| {
                if matches!(
                    e,
                    proto_array::Error::RevertedFinalizedEpoch { .. }
                        | proto_array::Error::InvalidBestNode(_)
                ) {
                    crit!(
                        error = ?e,
                        %current_slot,
                        justified_epoch = %justified.epoch,
                        justified_root = ?justified.root,
                        finalized_epoch = %finalized.epoch,
                        finalized_root = ?finalized.root,
                        "Fork choice is inconsistent"
                    );
                }
            })?;

        self.forkchoice_update_parameters = ForkchoiceUpdateParameters {
            head_root,
            head_hash: self.execution_block_hash(&head_root),
            justified_hash: self.execution_block_hash(&justified.root),
            finalized_hash: self.execution_block_hash(&finalized.root),
        };
        self.head_is_stale = false;

        Ok(head_root)
    }

    /// Same as `Self::get_head`, but returns the head's slot, state root and execution status
    /// along with its root.
    pub fn get_head_block(&mut self, spec: &ChainSpec) -> Result<ProtoBlock, Error<T::Error>> {
        let head_root = self.get_head(spec)?;
        self.proto_array
            .get_block(&head_root)
            .ok_or(Error::MissingProtoArrayBlock(head_root))
    }

    fn execution_block_hash(&self, block_root: &Hash256) -> Option<ExecutionBlockHash> {
        self.get_block(block_root)
            .and_then(|block| block.execution_status.block_hash())
    }

    /// Works out which of `candidates`, taken in order, would move the store's checkpoints
    /// forward. Writes nothing.
    fn advance_checkpoints(&self, candidates: &[(Checkpoint, Checkpoint)]) -> CheckpointUpdates {
        let mut justified = *self.fc_store.justified_checkpoint();
        let mut finalized = *self.fc_store.finalized_checkpoint();
        let mut updates = CheckpointUpdates::default();

        for &(candidate_justified, candidate_finalized) in candidates {
            if candidate_justified.epoch > justified.epoch {
                justified = candidate_justified;
                updates.justified = Some(justified);
            }
            if candidate_finalized.epoch > finalized.epoch {
                finalized = candidate_finalized;
                updates.finalized = Some(finalized);
            }
        }

        updates
    }

    /// Writes `updates` to the store. The justified checkpoint goes first since it is the only
    /// write that can fail.
    fn store_checkpoints(
        &mut self,
        updates: CheckpointUpdates,
    ) -> Result<CheckpointUpdates, Error<T::Error>> {
        if let Some(justified) = updates.justified {
            self.fc_store
                .set_justified_checkpoint(justified)
                .map_err(Error::UnableToSetJustifiedCheckpoint)?;
            debug!(
                epoch = %justified.epoch,
                root = ?justified.root,
                "Fork choice justified checkpoint updated"
            );
        }

        if let Some(finalized) = updates.finalized {
            self.fc_store.set_finalized_checkpoint(finalized);
            debug!(
                epoch = %finalized.epoch,
                root = ?finalized.root,
                "Fork choice finalized checkpoint updated"
            );
        }

        if !updates.is_empty() {
            self.head_is_stale = true;
        }

        Ok(updates)
    }

    /// Adds a block, whose post-state is `state`, to the DAG.
    ///
    /// `block_delay` is how far into its slot the block was seen. The block must already have
    /// passed the state transition; it is not re-run here.
    ///
    /// Every check runs before the first write, so a rejected block leaves the store and DAG as
    /// they were. Only the clock may have moved.
    #[allow(clippy::too_many_arguments)]
    pub fn on_block<S: PostBlockState>(
        &mut self,
        system_time_current_slot: Slot,
        block: &BeaconBlockHeader,
        block_root: Hash256,
        block_delay: Duration,
        state: &S,
        payload_verification_status: PayloadVerificationStatus,
        spec: &ChainSpec,
    ) -> Result<CheckpointUpdates, Error<T::Error>> {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_ON_BLOCK_TIMES);

        // Re-importing would hand out a second proposer boost.
        if self.proto_array.contains_block(&block_root) {
            return Ok(CheckpointUpdates::default());
        }

        let mut updates = self.update_time(system_time_current_slot)?;

        let staged = self.stage_block(
            block,
            block_root,
            block_delay,
            state,
            payload_verification_status,
            spec,
        )?;
        updates.merge(self.commit_block(block, state, staged)?);

        Ok(updates)
    }

    /// Runs every check `on_block` makes and collects what it would write.
    fn stage_block<S: PostBlockState>(
        &self,
        block: &BeaconBlockHeader,
        block_root: Hash256,
        block_delay: Duration,
        state: &S,
        payload_verification_status: PayloadVerificationStatus,
        spec: &ChainSpec,
    ) -> Result<StagedBlock, Error<T::Error>> {
        let slots_per_epoch = E::slots_per_epoch();
        let current_slot = self.fc_store.get_current_slot();

        let parent = self
            .proto_array
            .get_block(&block.parent_root)
            .ok_or(Error::InvalidBlock(InvalidBlock::UnknownParent(
                block.parent_root,
            )))?;

        if block.slot > current_slot {
            return Err(Error::InvalidBlock(InvalidBlock::FutureSlot {
                current_slot,
                block_slot: block.slot,
            }));
        }

        let finalized = *self.fc_store.finalized_checkpoint();
        let finalized_slot = finalized.epoch.start_slot(slots_per_epoch);
        if block.slot <= finalized_slot {
            return Err(Error::InvalidBlock(InvalidBlock::FinalizedSlot {
                finalized_slot,
                block_slot: block.slot,
            }));
        }

        // `block.slot > finalized_slot`, so walking from the parent finds the same ancestor.
        let block_ancestor = self.get_ancestor(block.parent_root, finalized_slot)?;
        if block_ancestor != Some(finalized.root) {
            return Err(Error::InvalidBlock(InvalidBlock::NotFinalizedDescendant {
                finalized_root: finalized.root,
                block_ancestor,
            }));
        }

        let execution_status = payload_verification_status
            .execution_status(payload_block_hash(state))
            .ok_or(Error::InvalidPayloadStatus {
                block_slot: block.slot,
                block_root,
                payload_verification_status,
            })?;

        // A parent already justified in this epoch and finalized in the last one cannot be
        // improved on by its child.
        let block_epoch = block.slot.epoch(slots_per_epoch);
        let (unrealized_justified, unrealized_finalized) = if parent
            .unrealized_justified_checkpoint
            .epoch
            == block_epoch
            && parent.unrealized_finalized_checkpoint.epoch + 1 == block_epoch
        {
            (
                parent.unrealized_justified_checkpoint,
                parent.unrealized_finalized_checkpoint,
            )
        } else {
            state.unrealized_checkpoints()?
        };

        let target_slot = block_epoch.start_slot(slots_per_epoch);
        let target_root = if block.slot == target_slot {
            block_root
        } else {
            state.block_root_at_slot(target_slot)?
        };

        let proto_block = ProtoBlock {
            slot: block.slot,
            root: block_root,
            parent_root: Some(block.parent_root),
            target_root,
            state_root: block.state_root,
            justified_checkpoint: state.current_justified_checkpoint(),
            finalized_checkpoint: state.finalized_checkpoint(),
            execution_status,
            unrealized_justified_checkpoint: unrealized_justified,
            unrealized_finalized_checkpoint: unrealized_finalized,
        };
        self.proto_array.validate_block(&proto_block)?;

        let mut candidates = vec![(
            proto_block.justified_checkpoint,
            proto_block.finalized_checkpoint,
        )];
        // Blocks from an earlier epoch missed the pull-up at its boundary.
        if block_epoch < current_slot.epoch(slots_per_epoch) {
            candidates.push((unrealized_justified, unrealized_finalized));
        }

        Ok(StagedBlock {
            checkpoints: self.advance_checkpoints(&candidates),
            apply_proposer_boost: self.is_timely(block.slot, block_delay, spec),
            proto_block,
        })
    }

    /// Whether a block at `block_slot` seen `block_delay` into the slot earns the proposer boost.
    /// Only the first timely block of the current slot does.
    fn is_timely(&self, block_slot: Slot, block_delay: Duration, spec: &ChainSpec) -> bool {
        let attesting_interval = spec
            .seconds_per_slot
            .checked_div(spec.intervals_per_slot)
            .map(Duration::from_secs)
            .unwrap_or_default();

        block_slot == self.fc_store.get_current_slot()
            && block_delay < attesting_interval
            && self.fc_store.proposer_boost_root().is_zero()
    }

    /// Applies a staged block. The fallible store writes run first; the DAG insertion cannot
    /// fail for a staged block.
    fn commit_block<S: PostBlockState>(
        &mut self,
        block: &BeaconBlockHeader,
        state: &S,
        staged: StagedBlock,
    ) -> Result<CheckpointUpdates, Error<T::Error>> {
        let StagedBlock {
            proto_block,
            checkpoints,
            apply_proposer_boost,
        } = staged;
        let block_root = proto_block.root;
        let execution_status = proto_block.execution_status;
        let unrealized_justified = proto_block.unrealized_justified_checkpoint;
        let unrealized_finalized = proto_block.unrealized_finalized_checkpoint;

        self.fc_store
            .on_verified_block(block, block_root, state)
            .map_err(Error::AfterBlockFailed)?;
        let updates = self.store_checkpoints(checkpoints)?;

        let current_slot = self.fc_store.get_current_slot();
        self.proto_array
            .process_block::<E>(proto_block, current_slot)?;

        if unrealized_justified.epoch > self.fc_store.unrealized_justified_checkpoint().epoch {
            self.fc_store
                .set_unrealized_justified_checkpoint(unrealized_justified);
        }
        if unrealized_finalized.epoch > self.fc_store.unrealized_finalized_checkpoint().epoch {
            self.fc_store
                .set_unrealized_finalized_checkpoint(unrealized_finalized);
        }
        if apply_proposer_boost {
            self.fc_store.set_proposer_boost_root(block_root);
        }
        self.head_is_stale = true;

        debug!(
            ?block_root,
            slot = %block.slot,
            %execution_status,
            proposer_boost = apply_proposer_boost,
            "Fork choice imported block"
        );

        Ok(updates)
    }

    fn validate_target_epoch_against_current_time(
        &self,
        target_epoch: Epoch,
    ) -> Result<(), InvalidAttestation> {
        let current_epoch = self
            .fc_store
            .get_current_slot()
            .epoch(E::slots_per_epoch());

        if target_epoch > current_epoch {
            Err(InvalidAttestation::FutureEpoch {
                attestation_epoch: target_epoch,
                current_epoch,
            })
        } else if target_epoch + 1 < current_epoch {
            Err(InvalidAttestation::PastEpoch {
                attestation_epoch: target_epoch,
                current_epoch,
            })
        } else {
            Ok(())
        }
    }

    /// Rejects attesting indices at or past the justified balances plus `VALIDATOR_INDEX_MARGIN`.
    fn validate_attesting_indices(
        &self,
        indexed_attestation: &IndexedAttestation,
    ) -> Result<(), InvalidAttestation> {
        let bound = self
            .fc_store
            .justified_balances()
            .effective_balances
            .len()
            .saturating_add(VALIDATOR_INDEX_MARGIN);

        match indexed_attestation
            .attesting_indices_iter()
            .find(|&&index| usize::try_from(index).map_or(true, |index| index >= bound))
        {
            Some(&validator_index) => Err(InvalidAttestation::UnknownValidatorIndex {
                validator_index,
                bound: u64::try_from(bound).unwrap_or(u64::MAX),
            }),
            None => Ok(()),
        }
    }

    /// Checks an attestation against the clock and the DAG. Signatures are assumed checked.
    fn validate_on_attestation(
        &self,
        indexed_attestation: &IndexedAttestation,
        is_from_block: AttestationFromBlock,
    ) -> Result<(), InvalidAttestation> {
        if indexed_attestation.attesting_indices_is_empty() {
            return Err(InvalidAttestation::EmptyAggregationBitfield);
        }
        self.validate_attesting_indices(indexed_attestation)?;

        let data = &indexed_attestation.data;
        let target = data.target;

        if let AttestationFromBlock::False = is_from_block {
            self.validate_target_epoch_against_current_time(target.epoch)?;

            let current_slot = self.fc_store.get_current_slot();
            if data.slot > current_slot {
                return Err(InvalidAttestation::FutureSlot {
                    attestation_slot: data.slot,
                    current_slot,
                });
            }
        }

        if target.epoch != data.slot.epoch(E::slots_per_epoch()) {
            return Err(InvalidAttestation::BadTargetEpoch {
                target: target.epoch,
                slot: data.slot,
            });
        }

        if !self.proto_array.contains_block(&target.root) {
            return Err(InvalidAttestation::UnknownTargetRoot(target.root));
        }

        let block = self.proto_array.get_block(&data.beacon_block_root).ok_or(
            InvalidAttestation::UnknownHeadBlock {
                beacon_block_root: data.beacon_block_root,
            },
        )?;

        // A vote for a block from an earlier epoch skips every slot up to the target, which makes
        // that block its own target.
        let expected_target = if target.epoch > block.slot.epoch(E::slots_per_epoch()) {
            data.beacon_block_root
        } else {
            block.target_root
        };
        if expected_target != target.root {
            return Err(InvalidAttestation::InvalidTarget {
                attestation: target.root,
                local: expected_target,
            });
        }

        if block.slot > data.slot {
            return Err(InvalidAttestation::AttestsToFutureBlock {
                block: block.slot,
                attestation: data.slot,
            });
        }

        Ok(())
    }

    /// Records the votes in an attestation whose signature was already verified.
    ///
    /// Votes made in the current slot are queued and count from the next slot on. Votes for the
    /// zero root are dropped, since every validator implicitly backs the anchor.
    pub fn on_attestation(
        &mut self,
        system_time_current_slot: Slot,
        attestation: &IndexedAttestation,
        is_from_block: AttestationFromBlock,
    ) -> Result<CheckpointUpdates, Error<T::Error>> {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_ON_ATTESTATION_TIMES);

        let updates = self.update_time(system_time_current_slot)?;

        if attestation.data.beacon_block_root.is_zero() {
            return Ok(updates);
        }

        self.validate_on_attestation(attestation, is_from_block)?;

        let attestation = QueuedAttestation::from(attestation);
        if attestation.slot < self.fc_store.get_current_slot() {
            self.apply_votes(&attestation)?;
        } else {
            self.queued_attestations.push(attestation);
        }

        Ok(updates)
    }

    fn apply_votes(&mut self, attestation: &QueuedAttestation) -> Result<(), Error<T::Error>> {
        for &validator_index in &attestation.attesting_indices {
            let validator_index = usize::try_from(validator_index)
                .map_err(|_| proto_array::Error::IndexOverflow("validator_index"))?;
            self.proto_array.process_attestation(
                validator_index,
                attestation.block_root,
                attestation.target_epoch,
            )?;
        }
        self.head_is_stale = true;
        Ok(())
    }

    /// Marks every validator found in both attestations of a slashing as equivocating. Their
    /// weight leaves the DAG at the next head computation.
    pub fn on_attester_slashing(&mut self, attesting_indices_1: &[u64], attesting_indices_2: &[u64]) {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_ON_ATTESTER_SLASHING_TIMES);

        let first = attesting_indices_1.iter().copied().collect::<BTreeSet<_>>();
        let second = attesting_indices_2.iter().copied().collect::<BTreeSet<_>>();
        self.fc_store
            .extend_equivocating_indices(first.intersection(&second).copied());
        self.head_is_stale = true;
    }

    /// Steps the clock one slot at a time up to `current_slot`, then applies any queued votes
    /// that became eligible. Returns the checkpoints that moved at epoch boundaries.
    pub fn update_time(
        &mut self,
        current_slot: Slot,
    ) -> Result<CheckpointUpdates, Error<T::Error>> {
        let mut updates = CheckpointUpdates::default();

        while self.fc_store.get_current_slot() < current_slot {
            let next_slot = self.fc_store.get_current_slot() + 1;
            updates.merge(self.on_tick(next_slot)?);
        }

        self.process_attestation_queue()?;

        Ok(updates)
    }

    /// Moves the clock to `time`, which must be the slot after the current one. Clears the
    /// proposer boost, and at an epoch start pulls up the unrealized checkpoints.
    fn on_tick(&mut self, time: Slot) -> Result<CheckpointUpdates, Error<T::Error>> {
        let previous_slot = self.fc_store.get_current_slot();
        if time != previous_slot + 1 {
            return Err(Error::InconsistentOnTick {
                previous_slot,
                time,
            });
        }

        self.fc_store.set_current_slot(time);
        self.fc_store.set_proposer_boost_root(Hash256::zero());
        self.head_is_stale = true;

        let slots_per_epoch = E::slots_per_epoch();
        if time.epoch(slots_per_epoch).start_slot(slots_per_epoch) != time {
            return Ok(CheckpointUpdates::default());
        }

        let unrealized = (
            *self.fc_store.unrealized_justified_checkpoint(),
            *self.fc_store.unrealized_finalized_checkpoint(),
        );
        let updates = self.advance_checkpoints(&[unrealized]);
        self.store_checkpoints(updates)
    }

    fn process_attestation_queue(&mut self) -> Result<(), Error<T::Error>> {
        let current_slot = self.fc_store.get_current_slot();
        for attestation in dequeue_attestations(current_slot, &mut self.queued_attestations) {
            self.apply_votes(&attestation)?;
        }
        Ok(())
    }

    /// Marks `block_root` and its ancestors as having valid payloads.
    pub fn on_valid_execution_payload(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error<T::Error>> {
        self.proto_array
            .process_execution_payload_validation(block_root)
            .map_err(Error::FailedToProcessValidExecutionPayload)?;
        self.head_is_stale = true;
        Ok(())
    }

    /// Marks the blocks named by `op` invalid, along with all their descendants.
    pub fn on_invalid_execution_payload(
        &mut self,
        op: &InvalidationOperation,
    ) -> Result<(), Error<T::Error>> {
        self.proto_array
            .process_execution_payload_invalidation::<E>(op)
            .map_err(Error::FailedToProcessInvalidExecutionPayload)?;
        self.head_is_stale = true;
        Ok(())
    }

    /// Returns `true` if the block is known **and** a descendant of the finalized root.
    pub fn contains_block(&self, block_root: &Hash256) -> bool {
        self.proto_array.contains_block(block_root)
            && self.is_finalized_checkpoint_or_descendant(*block_root)
    }

    /// Returns a `ProtoBlock` if the block is known **and** a descendant of the finalized root.
    pub fn get_block(&self, block_root: &Hash256) -> Option<ProtoBlock> {
        self.is_finalized_checkpoint_or_descendant(*block_root)
            .then(|| self.proto_array.get_block(block_root))
            .flatten()
    }

    pub fn get_block_execution_status(&self, block_root: &Hash256) -> Option<ExecutionStatus> {
        self.is_finalized_checkpoint_or_descendant(*block_root)
            .then(|| self.proto_array.get_block_execution_status(block_root))
            .flatten()
    }

    pub fn get_justified_block(&self) -> Result<ProtoBlock, Error<T::Error>> {
        let justified_checkpoint = self.justified_checkpoint();
        self.get_block(&justified_checkpoint.root)
            .ok_or(Error::MissingJustifiedBlock {
                justified_checkpoint,
            })
    }

    pub fn get_finalized_block(&self) -> Result<ProtoBlock, Error<T::Error>> {
        let finalized_checkpoint = self.finalized_checkpoint();
        self.get_block(&finalized_checkpoint.root)
            .ok_or(Error::MissingFinalizedBlock {
                finalized_checkpoint,
            })
    }

    pub fn is_finalized_checkpoint_or_descendant(&self, block_root: Hash256) -> bool {
        self.proto_array
            .is_finalized_checkpoint_or_descendant::<E>(block_root)
    }

    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.proto_array
            .is_descendant(ancestor_root, descendant_root)
    }

    /// Whether `block_root` was imported optimistically or later found invalid. Unknown blocks
    /// report the finalized block's status.
    pub fn is_optimistic_or_invalid_block(
        &self,
        block_root: &Hash256,
    ) -> Result<bool, Error<T::Error>> {
        let status = match self.get_block_execution_status(block_root) {
            Some(status) => status,
            None => self.get_finalized_block()?.execution_status,
        };
        Ok(status.is_optimistic_or_invalid())
    }

    pub fn finalized_checkpoint(&self) -> Checkpoint {
        *self.fc_store.finalized_checkpoint()
    }

    pub fn justified_checkpoint(&self) -> Checkpoint {
        *self.fc_store.justified_checkpoint()
    }

    pub fn unrealized_justified_checkpoint(&self) -> Checkpoint {
        *self.fc_store.unrealized_justified_checkpoint()
    }

    pub fn unrealized_finalized_checkpoint(&self) -> Checkpoint {
        *self.fc_store.unrealized_finalized_checkpoint()
    }

    /// The `(block_root, target_epoch)` of the validator's latest applied vote. Queued votes
    /// are not visible until `Self::update_time` applies them.
    pub fn latest_message(&self, validator_index: usize) -> Option<(Hash256, Epoch)> {
        self.proto_array.latest_message(validator_index)
    }

    /// Returns every leaf of the block tree that descends from the finalized checkpoint.
    pub fn heads(&self) -> Vec<ProtoBlock> {
        self.proto_array
            .heads_descended_from_finalization::<E>()
            .into_iter()
            .filter_map(|node| self.proto_array.get_block(&node.root))
            .collect()
    }

    pub fn proto_array(&self) -> &ProtoArrayForkChoice {
        &self.proto_array
    }

    /// Test access to the DAG. Marks the head stale.
    pub fn proto_array_mut(&mut self) -> &mut ProtoArrayForkChoice {
        self.head_is_stale = true;
        &mut self.proto_array
    }

    pub fn fc_store(&self) -> &T {
        &self.fc_store
    }

    pub fn queued_attestations(&self) -> &[QueuedAttestation] {
        &self.queued_attestations
    }

    pub fn proposer_boost_root(&self) -> Hash256 {
        self.fc_store.proposer_boost_root()
    }

    /// Drops the part of the DAG that no longer descends from the finalized root.
    pub fn prune(&mut self) -> Result<(), Error<T::Error>> {
        let finalized_root = self.fc_store.finalized_checkpoint().root;
        self.proto_array
            .maybe_prune(finalized_root)
            .map_err(Into::into)
    }

    pub fn to_persisted(&self) -> PersistedForkChoice {
        PersistedForkChoice {
            proto_array: self.proto_array.as_ssz_container(),
            queued_attestations: self.queued_attestations.clone(),
        }
    }

    /// Update the global metrics `DEFAULT_REGISTRY` with info from the fork choice
    pub fn scrape_for_metrics(&self) {
        scrape_for_metrics(self);
    }
}

/// The DAG and queue of a `ForkChoice` as SSZ. The store is persisted separately by its owner.
#[derive(Encode, Decode, Clone, Debug, PartialEq)]
pub struct PersistedForkChoice {
    pub proto_array: proto_array::core::SszContainer,
    pub queued_attestations: Vec<QueuedAttestation>,
}
