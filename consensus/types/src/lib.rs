//! Ethereum 2.0 types used by fork choice.

pub mod attestation;
pub mod beacon_block_header;
pub mod beacon_state_error;
pub mod chain_spec;
pub mod checkpoint;
pub mod eth_spec;
pub mod execution_block_hash;
pub mod slot_epoch;

pub use crate::attestation::{AttestationData, IndexedAttestation};
pub use crate::beacon_block_header::BeaconBlockHeader;
pub use crate::beacon_state_error::BeaconStateError;
pub use crate::chain_spec::ChainSpec;
pub use crate::checkpoint::Checkpoint;
pub use crate::eth_spec::{EthSpec, EthSpecId, MainnetEthSpec, MinimalEthSpec};
pub use crate::execution_block_hash::ExecutionBlockHash;
pub use crate::slot_epoch::{Epoch, Slot};

pub use fixed_bytes::{FixedBytesExtended, Hash256};

pub type Gwei = u64;
