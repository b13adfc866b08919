mod fork_choice;
mod fork_choice_store;
mod memory_store;
pub mod metrics;
mod post_block_state;

pub use crate::fork_choice::{
    AttestationFromBlock, CheckpointUpdates, Error, ForkChoice, ForkchoiceUpdateParameters,
    InvalidAttestation, InvalidBlock, PayloadVerificationStatus, PersistedForkChoice,
    QueuedAttestation, VALIDATOR_INDEX_MARGIN,
};
pub use fork_choice_store::ForkChoiceStore;
pub use memory_store::{Error as MemoryStoreError, MemoryStore, PersistedMemoryStore};
pub use post_block_state::PostBlockState;
pub use proto_array::{
    Block as ProtoBlock, ExecutionStatus, InvalidationOperation, JustifiedBalances,
};
