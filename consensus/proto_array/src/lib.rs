mod error;
#[cfg(test)]
mod fork_choice_test_definition;
mod justified_balances;
mod proto_array;
mod proto_array_fork_choice;
mod ssz_container;

pub use crate::justified_balances::JustifiedBalances;
pub use crate::proto_array::{InvalidationOperation, calculate_committee_fraction};
pub use crate::proto_array_fork_choice::{
    Block, DEFAULT_PRUNE_THRESHOLD, ExecutionStatus, ProtoArrayForkChoice,
};
pub use error::{Error, InvalidBestNodeInfo};

pub mod core {
    pub use super::proto_array::{Iter, ProposerBoost, ProtoArray, ProtoNode};
    pub use super::proto_array_fork_choice::VoteTracker;
    pub use super::ssz_container::SszContainer;
}
