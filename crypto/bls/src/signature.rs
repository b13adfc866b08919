use crate::{DST, Error, Hash256, PublicKey};
use blst::{BLST_ERROR, min_pk as blst_core};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// The byte-length of a BLS signature when serialized in compressed form.
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// Represents the signature at infinity.
pub const INFINITY_SIGNATURE: [u8; SIGNATURE_BYTES_LEN] = {
    let mut bytes = [0; SIGNATURE_BYTES_LEN];
    bytes[0] = 0xc0;
    bytes
};

/// A BLS signature as received from the network.
///
/// Any 96 bytes are accepted. Bytes that do not decode to a non-infinity point in the G2
/// subgroup are kept as-is and never verify.
#[derive(Clone, Copy)]
pub struct Signature {
    bytes: [u8; SIGNATURE_BYTES_LEN],
    point: Option<blst_core::Signature>,
}

impl Signature {
    pub(crate) fn from_point(point: blst_core::Signature) -> Self {
        Self {
            bytes: point.compress(),
            point: Some(point),
        }
    }

    /// Returns the underlying BLS point, or `None` if the bytes are not a valid signature.
    pub(crate) fn point(&self) -> Option<&blst_core::Signature> {
        self.point.as_ref()
    }

    /// Returns the signature at infinity. It never verifies.
    pub fn infinity() -> Self {
        Self {
            bytes: INFINITY_SIGNATURE,
            point: None,
        }
    }

    /// Returns `true` if the bytes of `self` decode to a usable signature.
    pub fn is_valid_point(&self) -> bool {
        self.point.is_some()
    }

    /// Serialize `self` as compressed bytes.
    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        self.bytes
    }

    /// Deserialize `self` from compressed bytes.
    ///
    /// Only the length is checked here, see `Self::deserialize_strict` to also require a valid
    /// point.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; SIGNATURE_BYTES_LEN] =
            bytes.try_into().map_err(|_| Error::InvalidByteLength {
                got: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            })?;

        Ok(Self {
            bytes,
            point: blst_core::Signature::sig_validate(&bytes, true).ok(),
        })
    }

    /// Deserialize `self` from compressed bytes, failing if they are not a valid G2 point.
    pub fn deserialize_strict(bytes: &[u8]) -> Result<Self, Error> {
        let signature = Self::deserialize(bytes)?;
        if signature.is_valid_point() {
            Ok(signature)
        } else {
            Err(Error::InvalidSignaturePoint)
        }
    }

    /// Returns `true` if `self` is a signature across `msg` by `pubkey`.
    pub fn verify(&self, pubkey: &PublicKey, msg: Hash256) -> bool {
        let Some(point) = &self.point else {
            return false;
        };
        point.verify(false, msg.as_slice(), DST, &[], pubkey.point(), false)
            == BLST_ERROR::BLST_SUCCESS
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Signature {}

impl fmt::Display for Signature {
    impl_display!();
}

impl fmt::Debug for Signature {
    impl_debug!();
}

impl std::str::FromStr for Signature {
    impl_from_str!();
}

impl Serialize for Signature {
    impl_serde_serialize!();
}

impl<'de> Deserialize<'de> for Signature {
    impl_serde_deserialize!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecretKey;

    #[test]
    fn sign_and_verify() {
        let sk = SecretKey::random();
        let msg = Hash256::repeat_byte(42);
        let sig = sk.sign(msg);

        assert!(sig.verify(&sk.public_key(), msg));
        assert!(!sig.verify(&sk.public_key(), Hash256::repeat_byte(43)));
        assert!(!sig.verify(&SecretKey::random().public_key(), msg));
    }

    #[test]
    fn malformed_bytes_never_verify() {
        let sk = SecretKey::random();
        let msg = Hash256::repeat_byte(1);
        let mut bytes = sk.sign(msg).serialize();
        bytes[10] ^= 0xff;

        let sig = Signature::deserialize(&bytes).unwrap();
        assert_eq!(sig.serialize(), bytes);
        assert!(!sig.verify(&sk.public_key(), msg));
        assert_eq!(
            Signature::deserialize_strict(&bytes),
            Err(Error::InvalidSignaturePoint)
        );
    }

    #[test]
    fn infinity_is_not_a_valid_point() {
        let sig = Signature::deserialize(&INFINITY_SIGNATURE).unwrap();

        assert_eq!(sig, Signature::infinity());
        assert!(!sig.is_valid_point());
    }

    #[test]
    fn deserialize_rejects_bad_lengths() {
        assert_eq!(
            Signature::deserialize(&[0; 95]),
            Err(Error::InvalidByteLength {
                got: 95,
                expected: SIGNATURE_BYTES_LEN
            })
        );
    }

    #[test]
    fn hex_string_round_trip() {
        let sig = SecretKey::random().sign(Hash256::ZERO);

        assert_eq!(sig.to_string().parse::<Signature>(), Ok(sig));
    }
}
