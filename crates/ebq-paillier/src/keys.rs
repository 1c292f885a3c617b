use ebq_bignum::{get_prime, mod_exp, mod_inverse};
use ebq_symcrypto::Prg;
use num_bigint::BigUint;
use num_traits::One;
use rand::RngCore;

/// Bit length of each of the two Paillier primes; `n = p*q` is exactly
/// `2 * PRIME_BITS` bits.
const PRIME_BITS: u64 = 512;

#[derive(Clone, Debug)]
pub struct PublicKey {
    pub n: BigUint,
    pub n_squared: BigUint,
    pub g: BigUint,
}

#[derive(Clone)]
pub struct PrivateKey {
    pub public: PublicKey,
    pub lambda: BigUint,
    pub mu: BigUint,
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        // lambda/mu are the factorization-derived secret; best-effort scrub.
        self.lambda = BigUint::default();
        self.mu = BigUint::default();
    }
}

/// A small adapter so [`ebq_bignum`]'s rejection samplers can draw from a
/// [`Prg`] instead of a generic CSPRNG, which is what makes key derivation
/// from `PRF(master_key, role || table_id)` reproducible.
struct PrgRng<'a>(&'a mut Prg);

impl RngCore for PrgRng<'_> {
    fn next_u32(&mut self) -> u32 {
        let b = self.0.next_bytes(4);
        u32::from_le_bytes(b.try_into().unwrap())
    }
    fn next_u64(&mut self) -> u64 {
        let b = self.0.next_bytes(8);
        u64::from_le_bytes(b.try_into().unwrap())
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.copy_from_slice(&self.0.next_bytes(dest.len()));
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Generates a Paillier key pair deterministically from `seed` by driving a
/// [`Prg`]: two distinct 512-bit primes are rejection-sampled until their
/// product is exactly 1024 bits.
pub fn keypair_from_seed(seed: &[u8]) -> PrivateKey {
    let mut prg = Prg::new(seed.to_vec());
    let mut rng = PrgRng(&mut prg);

    let (p, q, n) = loop {
        let p = get_prime(PRIME_BITS, &mut rng);
        let q = get_prime(PRIME_BITS, &mut rng);
        if p == q {
            continue;
        }
        let n = &p * &q;
        if n.bits() == 2 * PRIME_BITS {
            break (p, q, n);
        }
    };

    let n_squared = &n * &n;
    let g = &n + BigUint::one();
    let lambda = (&p - BigUint::one()) * (&q - BigUint::one());
    let mu = mod_inverse(&lambda, &n).expect("lambda invertible mod n for freshly generated primes");

    PrivateKey { public: PublicKey { n: n.clone(), n_squared, g }, lambda, mu }
}

impl PublicKey {
    /// `g^m mod n^2`, exposed for callers that need to recompute the
    /// generator term directly (e.g. `affine`'s additive-constant term).
    pub fn g_pow(&self, m: &BigUint) -> BigUint {
        mod_exp(&self.g, m, &self.n_squared)
    }
}
