use crate::{Error, PublicKey};
use blst::min_pk as blst_core;

/// The sum of one or more BLS public keys.
#[derive(Clone)]
pub struct AggregatePublicKey {
    point: blst_core::AggregatePublicKey,
}

impl AggregatePublicKey {
    /// Aggregates `pubkeys`, failing if there are none.
    ///
    /// Keys are validated on deserialization so no subgroup checks are repeated here.
    pub fn aggregate(pubkeys: &[&PublicKey]) -> Result<Self, Error> {
        if pubkeys.is_empty() {
            return Err(Error::EmptyAggregate);
        }

        let points = pubkeys.iter().map(|pk| pk.point()).collect::<Vec<_>>();
        blst_core::AggregatePublicKey::aggregate(&points, false)
            .map(|point| Self { point })
            .map_err(Into::into)
    }

    /// Adds `pubkey` to `self`.
    pub fn add_assign(&mut self, pubkey: &PublicKey) {
        self.point
            .add_aggregate(&blst_core::AggregatePublicKey::from_public_key(
                pubkey.point(),
            ));
    }

    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from_point(self.point.to_public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregateSignature, Hash256, SecretKey};

    #[test]
    fn empty_aggregate_is_an_error() {
        assert!(matches!(
            AggregatePublicKey::aggregate(&[]),
            Err(Error::EmptyAggregate)
        ));
    }

    #[test]
    fn incremental_and_bulk_aggregation_agree() {
        let keys = (0..3)
            .map(|_| SecretKey::random().public_key())
            .collect::<Vec<_>>();

        let bulk = AggregatePublicKey::aggregate(&keys.iter().collect::<Vec<_>>()).unwrap();
        let mut incremental = AggregatePublicKey::aggregate(&[&keys[0]]).unwrap();
        incremental.add_assign(&keys[1]);
        incremental.add_assign(&keys[2]);

        assert_eq!(bulk.to_public_key(), incremental.to_public_key());
    }

    #[test]
    fn aggregate_key_verifies_aggregate_signature() {
        let msg = Hash256::repeat_byte(7);
        let secret_keys = (0..4).map(|_| SecretKey::random()).collect::<Vec<_>>();
        let pubkeys = secret_keys.iter().map(|sk| sk.public_key()).collect::<Vec<_>>();
        let signatures = secret_keys.iter().map(|sk| sk.sign(msg)).collect::<Vec<_>>();

        let aggregate_pubkey =
            AggregatePublicKey::aggregate(&pubkeys.iter().collect::<Vec<_>>()).unwrap();
        let aggregate_signature =
            AggregateSignature::aggregate(&signatures.iter().collect::<Vec<_>>()).unwrap();

        assert!(
            aggregate_signature
                .to_signature()
                .verify(&aggregate_pubkey.to_public_key(), msg)
        );
    }
}
