use crate::proto_array::ProposerBoost;
use crate::{
    Error, JustifiedBalances,
    proto_array::{ProtoArray, ProtoNode},
    proto_array_fork_choice::{ElasticList, ProtoArrayForkChoice, VoteTracker},
};
use ssz_derive::{Decode, Encode};
use std::collections::HashMap;
use types::{Checkpoint, Hash256};

/// The persisted form of a `ProtoArrayForkChoice`.
///
/// The root-to-index map is stored as a list of pairs and rebuilt on decode. The justified
/// balances are stored as raw effective balances; their totals are recomputed.
#[derive(Encode, Decode, Clone, PartialEq, Debug)]
pub struct SszContainer {
    pub votes: Vec<VoteTracker>,
    pub balances: Vec<u64>,
    pub prune_threshold: usize,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub nodes: Vec<ProtoNode>,
    pub indices: Vec<(Hash256, usize)>,
    pub previous_proposer_boost: ProposerBoost,
}

impl From<&ProtoArrayForkChoice> for SszContainer {
    fn from(from: &ProtoArrayForkChoice) -> Self {
        let proto_array = &from.proto_array;

        let mut indices: Vec<(Hash256, usize)> =
            proto_array.indices.iter().map(|(k, v)| (*k, *v)).collect();
        // Keep the encoding independent of `HashMap` iteration order.
        indices.sort_unstable_by_key(|(_, index)| *index);

        Self {
            votes: from.votes.0.clone(),
            balances: from.balances.effective_balances.clone(),
            prune_threshold: proto_array.prune_threshold,
            justified_checkpoint: proto_array.justified_checkpoint,
            finalized_checkpoint: proto_array.finalized_checkpoint,
            nodes: proto_array.nodes.clone(),
            indices,
            previous_proposer_boost: proto_array.previous_proposer_boost,
        }
    }
}

impl TryFrom<SszContainer> for ProtoArrayForkChoice {
    type Error = Error;

    fn try_from(from: SszContainer) -> Result<Self, Error> {
        if let Some((_, index)) = from
            .indices
            .iter()
            .find(|(_, index)| *index >= from.nodes.len())
        {
            return Err(Error::InvalidNodeIndex(*index));
        }

        let proto_array = ProtoArray {
            prune_threshold: from.prune_threshold,
            justified_checkpoint: from.justified_checkpoint,
            finalized_checkpoint: from.finalized_checkpoint,
            nodes: from.nodes,
            indices: from.indices.into_iter().collect::<HashMap<_, _>>(),
            previous_proposer_boost: from.previous_proposer_boost,
        };

        Ok(Self {
            proto_array,
            votes: ElasticList(from.votes),
            balances: JustifiedBalances::from_effective_balances(from.balances)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionStatus;
    use ssz::{Decode, Encode};
    use types::{Epoch, FixedBytesExtended, MainnetEthSpec, Slot};

    #[test]
    fn encoding_is_deterministic() {
        let checkpoint = Checkpoint {
            epoch: Epoch::new(0),
            root: Hash256::from_low_u64_be(1),
        };
        let fc = ProtoArrayForkChoice::new::<MainnetEthSpec>(
            Slot::new(0),
            Slot::new(0),
            Hash256::zero(),
            checkpoint,
            checkpoint,
            ExecutionStatus::irrelevant(),
        )
        .unwrap();

        let bytes = fc.as_bytes();
        assert_eq!(bytes, fc.as_bytes());

        let container = SszContainer::from_ssz_bytes(&bytes).unwrap();
        assert_eq!(container.as_ssz_bytes(), bytes);
        assert_eq!(container.indices, vec![(checkpoint.root, 0)]);
    }

    #[test]
    fn dangling_index_is_rejected() {
        let container = SszContainer {
            votes: vec![],
            balances: vec![],
            prune_threshold: 0,
            justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            nodes: vec![],
            indices: vec![(Hash256::from_low_u64_be(1), 3)],
            previous_proposer_boost: ProposerBoost::default(),
        };
        assert_eq!(
            ProtoArrayForkChoice::try_from(container),
            Err(Error::InvalidNodeIndex(3))
        );
    }
}
