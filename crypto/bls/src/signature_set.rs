use crate::{AggregatePublicKey, AggregateSignature, DST, Hash256, PublicKey, Signature};
use blst::{BLST_ERROR, blst_scalar, min_pk as blst_core};
use rand::Rng;
use std::borrow::Cow;
use std::num::NonZeroU64;

/// Number of random bits used for each scalar in `verify_signature_sets`.
const RAND_BITS: usize = 64;

/// A signature across a message by one or more public keys.
///
/// This struct is primarily useful in a collection (e.g., `Vec<SignatureSet>`) so we can perform
/// multiple-signature verification which is much faster than verifying each signature
/// individually.
#[derive(Clone, Debug)]
pub struct SignatureSet<'a> {
    pub signature: Cow<'a, Signature>,
    pub signing_keys: Vec<Cow<'a, PublicKey>>,
    pub message: Hash256,
}

impl<'a> SignatureSet<'a> {
    /// Instantiate self where `signature` is only signed by a single public key.
    pub fn single_pubkey(
        signature: impl Into<Cow<'a, Signature>>,
        signing_key: impl Into<Cow<'a, PublicKey>>,
        message: Hash256,
    ) -> Self {
        Self {
            signature: signature.into(),
            signing_keys: vec![signing_key.into()],
            message,
        }
    }

    /// Instantiate self where `signature` is signed by multiple public keys.
    pub fn multiple_pubkeys(
        signature: impl Into<Cow<'a, Signature>>,
        signing_keys: Vec<Cow<'a, PublicKey>>,
        message: Hash256,
    ) -> Self {
        Self {
            signature: signature.into(),
            signing_keys,
            message,
        }
    }

    /// Number of public keys that signed the message.
    pub fn num_signing_keys(&self) -> usize {
        self.signing_keys.len()
    }

    /// Clones any borrowed data so the set can be sent to another thread.
    pub fn into_owned(self) -> SignatureSet<'static> {
        SignatureSet {
            signature: Cow::Owned(self.signature.into_owned()),
            signing_keys: self
                .signing_keys
                .into_iter()
                .map(|pk| Cow::Owned(pk.into_owned()))
                .collect(),
            message: self.message,
        }
    }

    /// Returns the single public key this set verifies against, aggregating if required.
    fn aggregate_pubkey(&self) -> Option<PublicKey> {
        match self.signing_keys.as_slice() {
            [] => None,
            [pubkey] => Some(**pubkey),
            keys => {
                let keys = keys.iter().map(|pk| &**pk).collect::<Vec<&PublicKey>>();
                AggregatePublicKey::aggregate(&keys)
                    .ok()
                    .map(|agg| agg.to_public_key())
            }
        }
    }

    /// Returns `true` if `self.signature` is a signature across `self.message` by
    /// `self.signing_keys`.
    pub fn verify(&self) -> bool {
        self.aggregate_pubkey()
            .is_some_and(|pubkey| self.signature.verify(&pubkey, self.message))
    }
}

impl<'a> From<&'a Signature> for Cow<'a, Signature> {
    fn from(signature: &'a Signature) -> Self {
        Cow::Borrowed(signature)
    }
}

impl From<Signature> for Cow<'_, Signature> {
    fn from(signature: Signature) -> Self {
        Cow::Owned(signature)
    }
}

impl<'a> From<&'a PublicKey> for Cow<'a, PublicKey> {
    fn from(pubkey: &'a PublicKey) -> Self {
        Cow::Borrowed(pubkey)
    }
}

impl From<PublicKey> for Cow<'_, PublicKey> {
    fn from(pubkey: PublicKey) -> Self {
        Cow::Owned(pubkey)
    }
}

/// Verifies all `signature_sets` with a single randomized multi-pairing.
///
/// Returns `false` if `signature_sets` is empty, if any set has no signing keys or an invalid
/// signature point, or if any signature is incorrect. A `false` result does not identify which
/// set failed.
pub fn verify_signature_sets<'a, 'b: 'a>(
    signature_sets: impl IntoIterator<Item = &'a SignatureSet<'b>>,
) -> bool {
    let sets = signature_sets.into_iter().collect::<Vec<_>>();
    if sets.is_empty() {
        return false;
    }

    let mut pubkeys = Vec::with_capacity(sets.len());
    let mut signatures = Vec::with_capacity(sets.len());
    for set in &sets {
        let (Some(pubkey), Some(signature)) = (set.aggregate_pubkey(), set.signature.point())
        else {
            return false;
        };
        pubkeys.push(pubkey);
        signatures.push(signature);
    }

    let mut rng = rand::rng();
    let rands = sets
        .iter()
        .map(|_| {
            let mut scalar = blst_scalar::default();
            let bytes = rng.random::<NonZeroU64>().get().to_le_bytes();
            scalar.b[..bytes.len()].copy_from_slice(&bytes);
            scalar
        })
        .collect::<Vec<_>>();

    let msgs = sets
        .iter()
        .map(|set| set.message.as_slice())
        .collect::<Vec<_>>();
    let pubkey_points = pubkeys
        .iter()
        .map(|pk| pk.point())
        .collect::<Vec<&blst_core::PublicKey>>();

    blst_core::Signature::verify_multiple_aggregate_signatures(
        &msgs,
        DST,
        &pubkey_points,
        false,
        &signatures,
        false,
        &rands,
        RAND_BITS,
    ) == BLST_ERROR::BLST_SUCCESS
}

/// Verifies that each `(pubkey, signature)` pair is a signature across `message`, by aggregating
/// all signatures and all public keys into a single pairing check.
///
/// Returns `false` if `pairs` is empty or if any signature is not a valid point.
pub fn verify_same_message<'a>(
    pairs: impl IntoIterator<Item = (&'a PublicKey, &'a Signature)>,
    message: Hash256,
) -> bool {
    let (pubkeys, signatures): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();

    match AggregateSignature::aggregate(&signatures) {
        Ok(aggregate) => aggregate.fast_aggregate_verify(message, &pubkeys),
        Err(_) => false,
    }
}
