use crate::{DST, Error, Hash256, PublicKey, Signature};
use blst::min_pk as blst_core;
use rand::RngCore;
use zeroize::Zeroizing;

/// The byte-length of a BLS secret key.
pub const SECRET_KEY_BYTES_LEN: usize = 32;

/// A BLS secret key.
///
/// The underlying `blst` key zeroizes itself on drop.
#[derive(Clone)]
pub struct SecretKey {
    point: blst_core::SecretKey,
}

impl SecretKey {
    /// Generate a new `Self` from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut ikm = Zeroizing::new([0u8; SECRET_KEY_BYTES_LEN]);
        let mut rng = rand::rng();
        loop {
            rng.fill_bytes(&mut ikm[..]);
            // `key_gen` only fails when `ikm` is shorter than 32 bytes.
            if let Ok(point) = blst_core::SecretKey::key_gen(&ikm[..], &[]) {
                return Self { point };
            }
        }
    }

    /// Returns the public key that corresponds to self.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(self.point.sk_to_pk())
    }

    /// Returns a signature across `msg` from `self`.
    pub fn sign(&self, msg: Hash256) -> Signature {
        Signature::from_point(self.point.sign(msg.as_slice(), DST, &[]))
    }

    /// Serialize `self` as bytes which are zeroized on drop.
    pub fn serialize(&self) -> Zeroizing<[u8; SECRET_KEY_BYTES_LEN]> {
        Zeroizing::new(self.point.to_bytes())
    }

    /// Deserialize `self` from bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SECRET_KEY_BYTES_LEN {
            return Err(Error::InvalidSecretKeyLength {
                got: bytes.len(),
                expected: SECRET_KEY_BYTES_LEN,
            });
        }

        blst_core::SecretKey::from_bytes(bytes)
            .map(|point| Self { point })
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trip() {
        let sk = SecretKey::random();
        let decoded = SecretKey::deserialize(&sk.serialize()[..]).unwrap();

        assert_eq!(decoded.public_key(), sk.public_key());
    }

    #[test]
    fn deserialize_rejects_bad_lengths() {
        assert!(matches!(
            SecretKey::deserialize(&[1; 31]),
            Err(Error::InvalidSecretKeyLength {
                got: 31,
                expected: SECRET_KEY_BYTES_LEN
            })
        ));
    }

    #[test]
    fn random_keys_differ() {
        assert_ne!(SecretKey::random().public_key(), SecretKey::random().public_key());
    }
}
