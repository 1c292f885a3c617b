//! Arbitrary-precision modular arithmetic and prime generation.
//!
//! This is the number-theory floor the Paillier engine (`ebq-paillier`)
//! builds on: fast modular exponentiation over ~1024-bit operands, prime
//! generation by rejection sampling, and the big-endian byte framing used
//! on the wire for ciphertext integers.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::RngCore;

/// `gcd(a, b)`.
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    a.gcd(b)
}

/// Extended Euclidean algorithm: returns `(g, x, y)` such that
/// `a*x + b*y = g = gcd(a, b)`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    if b.is_zero() {
        return (a.clone(), BigInt::one(), BigInt::zero());
    }
    let (g, x1, y1) = extended_gcd(b, &(a % b));
    let x = y1.clone();
    let y = x1 - (a / b) * y1;
    (g, x, y)
}

/// `a^-1 mod modulus`, or `None` if `a` is not invertible.
pub fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    let a_signed = BigInt::from_biguint(Sign::Plus, a.clone());
    let m_signed = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let (g, x, _) = extended_gcd(&a_signed, &m_signed);
    if g != BigInt::one() && g != -BigInt::one() {
        return None;
    }
    let x = x.mod_floor(&m_signed);
    x.to_biguint()
}

/// `base^exp mod modulus`.
pub fn mod_exp(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    base.modpow(exp, modulus)
}

/// Samples uniformly from `[lo, hi)` by rejection sampling within the next
/// power-of-two width above `hi - lo`.
pub fn rand_range(lo: &BigUint, hi: &BigUint, rng: &mut impl RngCore) -> BigUint {
    assert!(lo < hi, "rand_range requires lo < hi");
    let width = hi - lo;
    let bits = width.bits();
    loop {
        let candidate = rng.gen_biguint(bits);
        if candidate < width {
            return lo + candidate;
        }
    }
}

/// Number of Miller-Rabin rounds needed to push the false-positive
/// probability below `error_prob` (each round halves it at worst, giving
/// `rounds = ceil(-ln(error_prob) / ln(4))`).
fn miller_rabin_rounds(error_prob: f64) -> u32 {
    assert!(error_prob > 0.0 && error_prob < 1.0);
    (-error_prob.ln() / 4f64.ln()).ceil() as u32
}

/// Miller-Rabin primality test with a false-positive probability bounded
/// by `error_prob`.
pub fn is_prime(n: &BigUint, error_prob: f64, rng: &mut impl RngCore) -> bool {
    let two = BigUint::from(2u8);
    let three = BigUint::from(3u8);
    if *n < two {
        return false;
    }
    if *n == two || *n == three {
        return true;
    }
    if (n % &two).is_zero() {
        return false;
    }

    let n_minus_one = n - BigUint::one();
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while (&d % &two).is_zero() {
        d /= &two;
        r += 1;
    }

    let rounds = miller_rabin_rounds(error_prob);
    let lo = two.clone();
    let hi = n - &two;
    'witness: for _ in 0..rounds {
        let a = rand_range(&lo, &hi, rng);
        let mut x = mod_exp(&a, &d, n);
        if x == BigUint::one() || x == n_minus_one {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = mod_exp(&x, &two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Default false-positive bound used when generating Paillier primes.
pub const DEFAULT_PRIME_ERROR_PROB: f64 = 1e-30;

/// Generates a random prime of exactly `bits` bits (top and bottom bit
/// set, so the product of two such primes is exactly `2*bits` bits).
pub fn get_prime(bits: u64, rng: &mut impl RngCore) -> BigUint {
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_prime(&candidate, DEFAULT_PRIME_ERROR_PROB, rng) {
            return candidate;
        }
    }
}

/// Serializes `n` as big-endian 32-bit limbs; zero still occupies the
/// minimum one limb (4 bytes).
pub fn long_to_bytes(n: &BigUint) -> Vec<u8> {
    let mut bytes = n.to_bytes_be();
    if bytes.is_empty() {
        bytes.push(0);
    }
    let padded_len = bytes.len().div_ceil(4) * 4;
    let mut out = vec![0u8; padded_len - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

/// Inverse of [`long_to_bytes`]; accepts any length, not just multiples of
/// four.
pub fn bytes_to_long(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn mod_exp_matches_known_value() {
        let base = BigUint::from(4u32);
        let exp = BigUint::from(13u32);
        let modulus = BigUint::from(497u32);
        assert_eq!(mod_exp(&base, &exp, &modulus), BigUint::from(445u32));
    }

    #[test]
    fn mod_inverse_round_trips() {
        let a = BigUint::from(17u32);
        let m = BigUint::from(3120u32);
        let inv = mod_inverse(&a, &m).unwrap();
        assert_eq!((&a * &inv) % &m, BigUint::one());
    }

    #[test]
    fn long_to_bytes_pads_to_limb_boundary() {
        assert_eq!(long_to_bytes(&BigUint::zero()), vec![0, 0, 0, 0]);
        assert_eq!(long_to_bytes(&BigUint::from(1u32)), vec![0, 0, 0, 1]);
        let big = BigUint::from(0x1_0000_0001u64);
        let bytes = long_to_bytes(&big);
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(bytes_to_long(&bytes), big);
    }

    #[test]
    fn bytes_to_long_accepts_any_length() {
        assert_eq!(bytes_to_long(&[0x01, 0x02, 0x03]), BigUint::from(0x010203u32));
    }

    #[test]
    fn is_prime_rejects_composites_and_accepts_small_primes() {
        let mut r = rng();
        for p in [2u32, 3, 5, 7, 101, 7919] {
            assert!(is_prime(&BigUint::from(p), 1e-12, &mut r), "{p} should be prime");
        }
        for c in [4u32, 9, 100, 7921] {
            assert!(!is_prime(&BigUint::from(c), 1e-12, &mut r), "{c} should be composite");
        }
    }

    #[test]
    fn get_prime_returns_correctly_sized_prime() {
        let mut r = rng();
        let p = get_prime(64, &mut r);
        assert_eq!(p.bits(), 64);
        assert!(is_prime(&p, 1e-20, &mut r));
    }

    #[test]
    fn rand_range_stays_in_bounds() {
        let mut r = rng();
        let lo = BigUint::from(10u32);
        let hi = BigUint::from(20u32);
        for _ in 0..50 {
            let x = rand_range(&lo, &hi, &mut r);
            assert!(x >= lo && x < hi);
        }
    }
}
