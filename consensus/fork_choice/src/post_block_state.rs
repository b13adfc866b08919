use types::{BeaconStateError, Checkpoint, ExecutionBlockHash, Hash256, Slot};

/// The parts of a post-block `BeaconState` that fork choice reads.
///
/// Fork choice never runs the state transition itself. The caller has already applied the block
/// and hands over the resulting state through this trait.
pub trait PostBlockState {
    fn slot(&self) -> Slot;

    fn current_justified_checkpoint(&self) -> Checkpoint;

    fn finalized_checkpoint(&self) -> Checkpoint;

    /// Returns the root of the block at `slot`, or the most recent block prior to it if `slot`
    /// was skipped.
    fn block_root_at_slot(&self, slot: Slot) -> Result<Hash256, BeaconStateError>;

    /// Returns the `(justified, finalized)` checkpoints this state would reach if justification
    /// and finalization were processed at the end of its current epoch.
    fn unrealized_checkpoints(&self) -> Result<(Checkpoint, Checkpoint), BeaconStateError>;

    /// Effective balance of every validator in the registry, with zero for validators that are
    /// not active in the state's current epoch.
    fn effective_balances(&self) -> Result<Vec<u64>, BeaconStateError>;

    fn is_execution_enabled(&self) -> bool;

    /// The block hash of the latest execution payload header, if the state carries one.
    fn latest_execution_block_hash(&self) -> Option<ExecutionBlockHash>;
}
