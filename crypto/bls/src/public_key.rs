use crate::Error;
use blst::min_pk as blst_core;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The byte-length of a BLS public key when serialized in compressed form.
pub const PUBLIC_KEY_BYTES_LEN: usize = 48;

/// A BLS public key that has been decoded and checked to be a non-infinity point in the G1
/// subgroup.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    point: blst_core::PublicKey,
}

impl PublicKey {
    pub(crate) fn from_point(point: blst_core::PublicKey) -> Self {
        Self { point }
    }

    /// Returns a reference to the underlying BLS point.
    pub(crate) fn point(&self) -> &blst_core::PublicKey {
        &self.point
    }

    /// Serialize `self` as compressed bytes.
    pub fn serialize(&self) -> [u8; PUBLIC_KEY_BYTES_LEN] {
        self.point.compress()
    }

    /// Deserialize `self` from compressed bytes.
    ///
    /// Rejects the point at infinity and points outside of the G1 subgroup.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            });
        }

        match blst_core::PublicKey::key_validate(bytes) {
            Ok(point) => Ok(Self { point }),
            Err(blst::BLST_ERROR::BLST_PK_IS_INFINITY) => Err(Error::InvalidInfinityPublicKey),
            Err(e) => Err(e.into()),
        }
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serialize().hash(state)
    }
}

impl fmt::Display for PublicKey {
    impl_display!();
}

impl fmt::Debug for PublicKey {
    impl_debug!();
}

impl std::str::FromStr for PublicKey {
    impl_from_str!();
}

impl Serialize for PublicKey {
    impl_serde_serialize!();
}

impl<'de> Deserialize<'de> for PublicKey {
    impl_serde_deserialize!();
}
