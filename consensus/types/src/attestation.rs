use crate::{Checkpoint, Hash256, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};

/// The data upon which an attestation is based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash, Encode, Decode, Default)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: u64,

    // LMD GHOST vote
    pub beacon_block_root: Hash256,

    // FFG Vote
    pub source: Checkpoint,
    pub target: Checkpoint,
}

/// An attestation with its aggregation bitfield resolved to validator indices.
///
/// The aggregate signature is checked before an `IndexedAttestation` reaches fork choice, so
/// only the indices and the data are carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, Default)]
pub struct IndexedAttestation {
    /// Lists validator registry indices, not committee indices.
    pub attesting_indices: Vec<u64>,
    pub data: AttestationData,
}

impl IndexedAttestation {
    pub fn attesting_indices_len(&self) -> usize {
        self.attesting_indices.len()
    }

    pub fn attesting_indices_is_empty(&self) -> bool {
        self.attesting_indices.is_empty()
    }

    pub fn attesting_indices_iter(&self) -> impl Iterator<Item = &u64> {
        self.attesting_indices.iter()
    }
}
