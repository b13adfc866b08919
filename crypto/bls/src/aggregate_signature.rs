use crate::{DST, Error, Hash256, PublicKey, Signature};
use blst::{BLST_ERROR, min_pk as blst_core};

/// The sum of one or more BLS signatures.
#[derive(Clone)]
pub struct AggregateSignature {
    point: blst_core::AggregateSignature,
}

impl AggregateSignature {
    /// Aggregates `signatures`.
    ///
    /// Fails if there are none or if any of them is not a valid point.
    pub fn aggregate(signatures: &[&Signature]) -> Result<Self, Error> {
        if signatures.is_empty() {
            return Err(Error::EmptyAggregate);
        }

        let points = signatures
            .iter()
            .map(|sig| sig.point().ok_or(Error::InvalidSignaturePoint))
            .collect::<Result<Vec<_>, _>>()?;

        blst_core::AggregateSignature::aggregate(&points, false)
            .map(|point| Self { point })
            .map_err(Into::into)
    }

    /// Adds `signature` to `self`, failing if it is not a valid point.
    pub fn add_assign(&mut self, signature: &Signature) -> Result<(), Error> {
        let point = signature.point().ok_or(Error::InvalidSignaturePoint)?;
        self.point.add_signature(point, false).map_err(Into::into)
    }

    pub fn to_signature(&self) -> Signature {
        Signature::from_point(self.point.to_signature())
    }

    /// Returns `true` if `self` is an aggregate of signatures across `msg` by each of `pubkeys`.
    pub fn fast_aggregate_verify(&self, msg: Hash256, pubkeys: &[&PublicKey]) -> bool {
        if pubkeys.is_empty() {
            return false;
        }
        let pubkeys = pubkeys.iter().map(|pk| pk.point()).collect::<Vec<_>>();
        self.point
            .to_signature()
            .fast_aggregate_verify(false, msg.as_slice(), DST, &pubkeys)
            == BLST_ERROR::BLST_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecretKey;

    #[test]
    fn fast_aggregate_verify() {
        let msg = Hash256::repeat_byte(3);
        let secret_keys = (0..8).map(|_| SecretKey::random()).collect::<Vec<_>>();
        let pubkeys = secret_keys.iter().map(|sk| sk.public_key()).collect::<Vec<_>>();
        let pubkey_refs = pubkeys.iter().collect::<Vec<_>>();

        let mut aggregate = AggregateSignature::aggregate(&[&secret_keys[0].sign(msg)]).unwrap();
        for sk in &secret_keys[1..] {
            aggregate.add_assign(&sk.sign(msg)).unwrap();
        }

        assert!(aggregate.fast_aggregate_verify(msg, &pubkey_refs));
        assert!(!aggregate.fast_aggregate_verify(msg, &pubkey_refs[1..]));
        assert!(!aggregate.fast_aggregate_verify(Hash256::repeat_byte(4), &pubkey_refs));
        assert!(!aggregate.fast_aggregate_verify(msg, &[]));
    }

    #[test]
    fn invalid_points_cannot_be_aggregated() {
        let valid = SecretKey::random().sign(Hash256::ZERO);
        let invalid = Signature::infinity();

        assert!(matches!(
            AggregateSignature::aggregate(&[&valid, &invalid]),
            Err(Error::InvalidSignaturePoint)
        ));

        let mut aggregate = AggregateSignature::aggregate(&[&valid]).unwrap();
        assert_eq!(
            aggregate.add_assign(&invalid),
            Err(Error::InvalidSignaturePoint)
        );
    }
}
