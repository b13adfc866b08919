//! BLS12-381 signatures as used by the beacon chain, backed by `blst`.
//!
//! Public keys live in G1 (48 bytes compressed) and signatures in G2 (96 bytes compressed). All
//! messages are 32-byte signing roots and all signatures use the proof-of-possession ciphersuite.

#[macro_use]
mod macros;
mod aggregate_public_key;
mod aggregate_signature;
mod keypair;
mod public_key;
mod secret_key;
mod signature;
mod signature_set;

pub use aggregate_public_key::AggregatePublicKey;
pub use aggregate_signature::AggregateSignature;
pub use fixed_bytes::Hash256;
pub use keypair::Keypair;
pub use public_key::{PUBLIC_KEY_BYTES_LEN, PublicKey};
pub use secret_key::{SECRET_KEY_BYTES_LEN, SecretKey};
pub use signature::{INFINITY_SIGNATURE, SIGNATURE_BYTES_LEN, Signature};
pub use signature_set::{SignatureSet, verify_same_message, verify_signature_sets};

use blst::BLST_ERROR;

/// Domain separation tag of the `BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_` ciphersuite.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An error was raised from the `blst` library.
    BlstError(BLST_ERROR),
    /// The provided bytes were an incorrect length.
    InvalidByteLength { got: usize, expected: usize },
    /// The provided secret key bytes were an incorrect length.
    InvalidSecretKeyLength { got: usize, expected: usize },
    /// The public key represents the point at infinity, which is invalid.
    InvalidInfinityPublicKey,
    /// The signature does not decode to a point in the G2 subgroup.
    InvalidSignaturePoint,
    /// Attempted to aggregate an empty list of keys or signatures.
    EmptyAggregate,
    /// A hex string could not be decoded.
    InvalidHex(String),
}

impl From<BLST_ERROR> for Error {
    fn from(e: BLST_ERROR) -> Error {
        Error::BlstError(e)
    }
}
