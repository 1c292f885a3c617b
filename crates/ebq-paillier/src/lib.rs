pub mod errors;
pub mod float_codec;
pub mod int64_codec;
pub mod keys;
pub mod raw;

pub use errors::PaillierError;
pub use keys::{PrivateKey, PublicKey, keypair_from_seed};

use num_bigint::BigUint;
use rand::RngCore;

/// Convenience wrapper bundling a private key with the encode/decode steps
/// for the int64 and float wire formats.
pub struct Cipher {
    key: PrivateKey,
}

impl Cipher {
    pub fn new(key: PrivateKey) -> Self {
        Self { key }
    }

    pub fn public(&self) -> &PublicKey {
        &self.key.public
    }

    pub fn encrypt_int64(&self, v: i64, rng: &mut impl RngCore) -> BigUint {
        raw::encrypt(&self.key.public, &int64_codec::encode_int64(v), rng)
    }

    pub fn decrypt_int64(&self, c: &BigUint) -> Result<i64, PaillierError> {
        int64_codec::decode_int64(&raw::decrypt(&self.key, c))
    }

    pub fn encrypt_float(&self, v: f64, rng: &mut impl RngCore) -> Result<BigUint, PaillierError> {
        let m = float_codec::encode(v)?;
        Ok(raw::encrypt(&self.key.public, &m, rng))
    }

    pub fn decrypt_float(&self, c: &BigUint) -> f64 {
        float_codec::decode(&raw::decrypt(&self.key, c))
    }

    pub fn add(&self, c1: &BigUint, c2: &BigUint) -> BigUint {
        raw::add(&self.key.public, c1, c2)
    }
}
