use crate::{PublicKey, SecretKey};
use std::fmt;

#[derive(Clone)]
pub struct Keypair {
    pub pk: PublicKey,
    pub sk: SecretKey,
}

impl Keypair {
    pub fn from_components(pk: PublicKey, sk: SecretKey) -> Self {
        Self { pk, sk }
    }

    pub fn random() -> Self {
        let sk = SecretKey::random();
        Self {
            pk: sk.public_key(),
            sk,
        }
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.pk == other.pk
    }
}

impl fmt::Debug for Keypair {
    /// Defers to `self.pk` to avoid leaking the secret key.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.pk.fmt(f)
    }
}
