use ebq_bignum::{gcd, mod_exp, rand_range};
use num_bigint::BigUint;
use num_traits::One;
use rand::RngCore;

use crate::keys::{PrivateKey, PublicKey};

/// Draws `r` uniformly from `{r : 1 <= r < n, gcd(r, n) = 1}`.
fn random_coprime(n: &BigUint, rng: &mut impl RngCore) -> BigUint {
    let one = BigUint::one();
    loop {
        let r = rand_range(&one, n, rng);
        if gcd(&r, n) == one {
            return r;
        }
    }
}

/// `E(m, r) = g^m * r^n mod n^2`.
pub fn encrypt(pk: &PublicKey, m: &BigUint, rng: &mut impl RngCore) -> BigUint {
    let r = random_coprime(&pk.n, rng);
    encrypt_with_r(pk, m, &r)
}

pub fn encrypt_with_r(pk: &PublicKey, m: &BigUint, r: &BigUint) -> BigUint {
    let gm = mod_exp(&pk.g, m, &pk.n_squared);
    let rn = mod_exp(r, &pk.n, &pk.n_squared);
    (gm * rn) % &pk.n_squared
}

/// `L(u) = (u - 1) / n`.
fn l_function(u: &BigUint, n: &BigUint) -> BigUint {
    (u - BigUint::one()) / n
}

/// `D(c) = L(c^lambda mod n^2) * mu mod n`.
pub fn decrypt(sk: &PrivateKey, c: &BigUint) -> BigUint {
    let u = mod_exp(c, &sk.lambda, &sk.public.n_squared);
    (l_function(&u, &sk.public.n) * &sk.mu) % &sk.public.n
}

/// Ciphertext addition: `c1 * c2 mod n^2`.
pub fn add(pk: &PublicKey, c1: &BigUint, c2: &BigUint) -> BigUint {
    (c1 * c2) % &pk.n_squared
}

/// `affine(c, a, b) = c^a * g^b mod n^2` — scales the plaintext by `a` and
/// adds the constant `b`, without decrypting.
pub fn affine(pk: &PublicKey, c: &BigUint, a: &BigUint, b: &BigUint) -> BigUint {
    let scaled = mod_exp(c, a, &pk.n_squared);
    let shifted = pk.g_pow(b);
    (scaled * shifted) % &pk.n_squared
}
