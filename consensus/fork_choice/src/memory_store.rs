//! Defines `MemoryStore`, a `ForkChoiceStore` that keeps everything in memory.
//!
//! Additionally, the private `BalancesCache` struct is defined; a cache of validator balances for
//! recent epoch boundary blocks, so that justified balances can be loaded without a database.

use crate::metrics;
use crate::{ForkChoiceStore, PostBlockState};
use proto_array::JustifiedBalances;
use ssz_derive::{Decode, Encode};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use tracing::debug;
use types::{
    BeaconBlockHeader, BeaconStateError, Checkpoint, EthSpec, FixedBytesExtended, Hash256, Slot,
};

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The balances for the given justified checkpoint were never seen by the cache.
    UnknownJustifiedBalances(Checkpoint),
    BeaconStateError(BeaconStateError),
    Arith(safe_arith::ArithError),
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Self {
        Error::BeaconStateError(e)
    }
}

impl From<safe_arith::ArithError> for Error {
    fn from(e: safe_arith::ArithError) -> Self {
        Error::Arith(e)
    }
}

/// The number of validator balance sets that are cached within `BalancesCache`.
const MAX_BALANCE_CACHE_SIZE: usize = 4;

/// An item that is stored in the `BalancesCache`.
#[derive(PartialEq, Clone, Debug, Encode, Decode)]
struct CacheItem {
    /// The block root at which `self.balances` are valid.
    block_root: Hash256,
    /// The effective balances from a `BeaconState` validator registry.
    balances: Vec<u64>,
}

/// It is effectively a mapping of `epoch_boundary_block_root -> state.balances`.
#[derive(PartialEq, Clone, Default, Debug, Encode, Decode)]
struct BalancesCache {
    items: Vec<CacheItem>,
}

impl BalancesCache {
    /// Determine the root of the block at the first slot of the state's epoch and, if there is
    /// not already some entry for that root, add the effective balances from `state`.
    ///
    /// The first block processed on top of an epoch boundary therefore supplies the balances for
    /// that boundary. Skipped boundary slots resolve to the most recent prior block.
    fn process_state<E: EthSpec, S: PostBlockState>(
        &mut self,
        block_root: Hash256,
        state: &S,
    ) -> Result<(), Error> {
        let epoch_boundary_slot = state
            .slot()
            .epoch(E::slots_per_epoch())
            .start_slot(E::slots_per_epoch());
        let epoch_boundary_root = if epoch_boundary_slot == state.slot() {
            block_root
        } else {
            state.block_root_at_slot(epoch_boundary_slot)?
        };

        if self.position(epoch_boundary_root).is_none() {
            self.insert(epoch_boundary_root, state.effective_balances()?);
        }

        Ok(())
    }

    fn insert(&mut self, block_root: Hash256, balances: Vec<u64>) {
        if self.items.len() == MAX_BALANCE_CACHE_SIZE {
            self.items.remove(0);
        }

        self.items.push(CacheItem {
            block_root,
            balances,
        });
    }

    fn position(&self, block_root: Hash256) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.block_root == block_root)
    }

    /// Get the balances for the given `block_root`, if any.
    fn get(&self, block_root: Hash256) -> Option<&[u64]> {
        let i = self.position(block_root)?;
        self.items.get(i).map(|item| item.balances.as_slice())
    }
}

/// An in-memory `ForkChoiceStore`.
///
/// Justified balances are only ever loaded from the `BalancesCache`, so a justified checkpoint
/// whose epoch boundary state was never handed to `on_verified_block` cannot be adopted.
#[derive(Debug)]
pub struct MemoryStore<E: EthSpec> {
    balances_cache: BalancesCache,
    time: Slot,
    finalized_checkpoint: Checkpoint,
    justified_checkpoint: Checkpoint,
    justified_balances: JustifiedBalances,
    unrealized_justified_checkpoint: Checkpoint,
    unrealized_finalized_checkpoint: Checkpoint,
    proposer_boost_root: Hash256,
    equivocating_indices: BTreeSet<u64>,
    _phantom: PhantomData<E>,
}

impl<E: EthSpec> PartialEq for MemoryStore<E> {
    fn eq(&self, other: &Self) -> bool {
        self.balances_cache == other.balances_cache
            && self.time == other.time
            && self.finalized_checkpoint == other.finalized_checkpoint
            && self.justified_checkpoint == other.justified_checkpoint
            && self.justified_balances == other.justified_balances
            && self.unrealized_justified_checkpoint == other.unrealized_justified_checkpoint
            && self.unrealized_finalized_checkpoint == other.unrealized_finalized_checkpoint
            && self.proposer_boost_root == other.proposer_boost_root
            && self.equivocating_indices == other.equivocating_indices
    }
}

impl<E: EthSpec> MemoryStore<E> {
    /// Initialize `Self` from some anchor block which may or may not be the genesis block.
    ///
    /// The anchor is both justified and finalized at the epoch of `anchor_state`.
    pub fn get_forkchoice_store<S: PostBlockState>(
        anchor_root: Hash256,
        anchor_state: &S,
    ) -> Result<Self, Error> {
        let anchor_epoch = anchor_state.slot().epoch(E::slots_per_epoch());
        let justified_checkpoint = Checkpoint {
            epoch: anchor_epoch,
            root: anchor_root,
        };
        let finalized_checkpoint = justified_checkpoint;
        let balances = anchor_state.effective_balances()?;

        let mut balances_cache = BalancesCache::default();
        balances_cache.insert(anchor_root, balances.clone());

        Ok(Self {
            balances_cache,
            time: anchor_state.slot(),
            justified_checkpoint,
            justified_balances: JustifiedBalances::from_effective_balances(balances)?,
            finalized_checkpoint,
            unrealized_justified_checkpoint: justified_checkpoint,
            unrealized_finalized_checkpoint: finalized_checkpoint,
            proposer_boost_root: Hash256::zero(),
            equivocating_indices: BTreeSet::new(),
            _phantom: PhantomData,
        })
    }

    /// Save the current state of `Self` to a `PersistedMemoryStore`.
    pub fn to_persisted(&self) -> PersistedMemoryStore {
        PersistedMemoryStore {
            balances_cache: self.balances_cache.clone(),
            time: self.time,
            finalized_checkpoint: self.finalized_checkpoint,
            justified_checkpoint: self.justified_checkpoint,
            justified_balances: self.justified_balances.effective_balances.clone(),
            unrealized_justified_checkpoint: self.unrealized_justified_checkpoint,
            unrealized_finalized_checkpoint: self.unrealized_finalized_checkpoint,
            proposer_boost_root: self.proposer_boost_root,
            equivocating_indices: self.equivocating_indices.iter().copied().collect(),
        }
    }

    /// Restore `Self` from a previously-generated `PersistedMemoryStore`.
    pub fn from_persisted(persisted: PersistedMemoryStore) -> Result<Self, Error> {
        let justified_balances =
            JustifiedBalances::from_effective_balances(persisted.justified_balances)?;
        Ok(Self {
            balances_cache: persisted.balances_cache,
            time: persisted.time,
            finalized_checkpoint: persisted.finalized_checkpoint,
            justified_checkpoint: persisted.justified_checkpoint,
            justified_balances,
            unrealized_justified_checkpoint: persisted.unrealized_justified_checkpoint,
            unrealized_finalized_checkpoint: persisted.unrealized_finalized_checkpoint,
            proposer_boost_root: persisted.proposer_boost_root,
            equivocating_indices: persisted.equivocating_indices.into_iter().collect(),
            _phantom: PhantomData,
        })
    }
}

impl<E: EthSpec> ForkChoiceStore<E> for MemoryStore<E> {
    type Error = Error;

    fn get_current_slot(&self) -> Slot {
        self.time
    }

    fn set_current_slot(&mut self, slot: Slot) {
        self.time = slot
    }

    fn on_verified_block<S: PostBlockState>(
        &mut self,
        _block: &BeaconBlockHeader,
        block_root: Hash256,
        state: &S,
    ) -> Result<(), Self::Error> {
        self.balances_cache
            .process_state::<E, S>(block_root, state)
    }

    fn justified_checkpoint(&self) -> &Checkpoint {
        &self.justified_checkpoint
    }

    fn justified_balances(&self) -> &JustifiedBalances {
        &self.justified_balances
    }

    fn finalized_checkpoint(&self) -> &Checkpoint {
        &self.finalized_checkpoint
    }

    fn unrealized_justified_checkpoint(&self) -> &Checkpoint {
        &self.unrealized_justified_checkpoint
    }

    fn unrealized_finalized_checkpoint(&self) -> &Checkpoint {
        &self.unrealized_finalized_checkpoint
    }

    fn proposer_boost_root(&self) -> Hash256 {
        self.proposer_boost_root
    }

    fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.finalized_checkpoint = checkpoint
    }

    fn set_justified_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<(), Error> {
        let Some(balances) = self.balances_cache.get(checkpoint.root) else {
            metrics::inc_counter(&metrics::FORK_CHOICE_BALANCES_CACHE_MISSES);
            return Err(Error::UnknownJustifiedBalances(checkpoint));
        };
        metrics::inc_counter(&metrics::FORK_CHOICE_BALANCES_CACHE_HITS);

        self.justified_balances = JustifiedBalances::from_effective_balances(balances.to_vec())?;
        self.justified_checkpoint = checkpoint;

        debug!(
            epoch = %checkpoint.epoch,
            root = ?checkpoint.root,
            total_effective_balance = self.justified_balances.total_effective_balance,
            "Loaded justified balances"
        );

        Ok(())
    }

    fn set_unrealized_justified_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.unrealized_justified_checkpoint = checkpoint;
    }

    fn set_unrealized_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.unrealized_finalized_checkpoint = checkpoint;
    }

    fn set_proposer_boost_root(&mut self, proposer_boost_root: Hash256) {
        self.proposer_boost_root = proposer_boost_root;
    }

    fn equivocating_indices(&self) -> &BTreeSet<u64> {
        &self.equivocating_indices
    }

    fn extend_equivocating_indices(&mut self, indices: impl IntoIterator<Item = u64>) {
        self.equivocating_indices.extend(indices);
    }
}

/// A container which allows persisting the `MemoryStore` as SSZ bytes.
#[derive(Encode, Decode, Clone, Debug, PartialEq)]
pub struct PersistedMemoryStore {
    balances_cache: BalancesCache,
    time: Slot,
    finalized_checkpoint: Checkpoint,
    justified_checkpoint: Checkpoint,
    justified_balances: Vec<u64>,
    unrealized_justified_checkpoint: Checkpoint,
    unrealized_finalized_checkpoint: Checkpoint,
    proposer_boost_root: Hash256,
    equivocating_indices: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz::{Decode, Encode};
    use std::collections::HashMap;
    use types::{Epoch, ExecutionBlockHash, MainnetEthSpec};

    type E = MainnetEthSpec;

    struct TestState {
        slot: Slot,
        block_roots: HashMap<Slot, Hash256>,
        balances: Vec<u64>,
    }

    impl PostBlockState for TestState {
        fn slot(&self) -> Slot {
            self.slot
        }

        fn current_justified_checkpoint(&self) -> Checkpoint {
            Checkpoint::default()
        }

        fn finalized_checkpoint(&self) -> Checkpoint {
            Checkpoint::default()
        }

        fn block_root_at_slot(&self, slot: Slot) -> Result<Hash256, BeaconStateError> {
            self.block_roots
                .get(&slot)
                .copied()
                .ok_or(BeaconStateError::SlotOutOfBounds)
        }

        fn unrealized_checkpoints(&self) -> Result<(Checkpoint, Checkpoint), BeaconStateError> {
            Ok((Checkpoint::default(), Checkpoint::default()))
        }

        fn effective_balances(&self) -> Result<Vec<u64>, BeaconStateError> {
            Ok(self.balances.clone())
        }

        fn is_execution_enabled(&self) -> bool {
            false
        }

        fn latest_execution_block_hash(&self) -> Option<ExecutionBlockHash> {
            None
        }
    }

    fn root(i: u64) -> Hash256 {
        Hash256::from_low_u64_be(i)
    }

    fn anchor_store() -> MemoryStore<E> {
        let anchor = TestState {
            slot: Slot::new(0),
            block_roots: HashMap::new(),
            balances: vec![1, 2],
        };
        MemoryStore::get_forkchoice_store(root(1), &anchor).unwrap()
    }

    #[test]
    fn anchor_balances_are_loaded() {
        let store = anchor_store();
        assert_eq!(store.justified_balances().total_effective_balance, 3);
        assert_eq!(store.justified_checkpoint().root, root(1));
        assert_eq!(store.finalized_checkpoint().epoch, Epoch::new(0));
    }

    #[test]
    fn boundary_balances_come_from_first_block() {
        let mut store = anchor_store();

        // First block of epoch 1, at its start slot.
        let first = TestState {
            slot: Slot::new(32),
            block_roots: HashMap::new(),
            balances: vec![10],
        };
        store
            .on_verified_block(&BeaconBlockHeader::default(), root(32), &first)
            .unwrap();

        // A later block in the same epoch does not replace the boundary balances.
        let second = TestState {
            slot: Slot::new(33),
            block_roots: HashMap::from([(Slot::new(32), root(32))]),
            balances: vec![20],
        };
        store
            .on_verified_block(&BeaconBlockHeader::default(), root(33), &second)
            .unwrap();

        let checkpoint = Checkpoint {
            epoch: Epoch::new(1),
            root: root(32),
        };
        store.set_justified_checkpoint(checkpoint).unwrap();
        assert_eq!(store.justified_balances().effective_balances, vec![10]);

        let unknown = Checkpoint {
            epoch: Epoch::new(2),
            root: root(33),
        };
        assert_eq!(
            store.set_justified_checkpoint(unknown),
            Err(Error::UnknownJustifiedBalances(unknown))
        );
        assert_eq!(*store.justified_checkpoint(), checkpoint);
    }

    #[test]
    fn skipped_boundary_slot_uses_prior_block() {
        let mut store = anchor_store();

        // Slot 64 was skipped, so the epoch boundary block is the one at slot 63.
        let state = TestState {
            slot: Slot::new(65),
            block_roots: HashMap::from([(Slot::new(64), root(63))]),
            balances: vec![7],
        };
        store
            .on_verified_block(&BeaconBlockHeader::default(), root(65), &state)
            .unwrap();
        assert_eq!(store.balances_cache.get(root(63)), Some(&[7][..]));
        assert_eq!(store.balances_cache.get(root(65)), None);
    }

    #[test]
    fn cache_is_bounded() {
        let mut cache = BalancesCache::default();
        for i in 0..(MAX_BALANCE_CACHE_SIZE as u64 + 1) {
            cache.insert(root(i), vec![i]);
        }
        assert_eq!(cache.items.len(), MAX_BALANCE_CACHE_SIZE);
        assert!(cache.get(root(0)).is_none());
        assert!(cache.get(root(MAX_BALANCE_CACHE_SIZE as u64)).is_some());
    }

    #[test]
    fn persisted_store_round_trips() {
        let mut store = anchor_store();
        store.extend_equivocating_indices([3, 1]);
        store.set_proposer_boost_root(root(9));

        let bytes = store.to_persisted().as_ssz_bytes();
        let decoded = PersistedMemoryStore::from_ssz_bytes(&bytes).unwrap();
        let restored = MemoryStore::<E>::from_persisted(decoded).unwrap();
        assert_eq!(store, restored);
    }
}
