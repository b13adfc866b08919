use crate::Slot;

/// Failures raised while reading a `BeaconState`.
#[derive(Debug, PartialEq, Clone)]
pub enum BeaconStateError {
    SlotOutOfBounds,
    /// The requested block root is older than the state's historical root window.
    BlockRootOutOfRange {
        slot: Slot,
        state_slot: Slot,
    },
    UnknownValidator(usize),
    BalancesOutOfBounds(usize),
    InsufficientBlockRoots,
    /// The state does not carry an execution payload header.
    IncorrectStateVariant,
}
