use ebq_bignum::bytes_to_long;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

use crate::errors::PaillierError;

/// Multi-value packing stores up to this many int64 lanes per ciphertext.
pub const PACKING_LIMIT: usize = 7;
const LANE_BITS: u64 = 128;
const VALUE_BITS: u64 = 96;
const GUARD_START_BIT: u64 = 63;

fn two_pow(bits: u64) -> BigUint {
    BigUint::one() << bits
}

/// Sign-extends a signed 64-bit value into a 96-bit two's-complement
/// pattern and returns it as the unsigned integer Paillier encrypts.
pub fn encode_int64(v: i64) -> BigUint {
    if v >= 0 {
        BigUint::from(v as u64)
    } else {
        let modulus = BigInt::from_biguint(Sign::Plus, two_pow(VALUE_BITS));
        (modulus + BigInt::from(v)).to_biguint().expect("non-negative by construction")
    }
}

/// Inverse of [`encode_int64`]; `Err` if the upper 33 guard bits (bits
/// 63..=95 of the 96-bit pattern) are not uniformly zero or one, which is
/// the signature of a homomorphic sum overflowing the 64-bit range.
pub fn decode_int64(m: &BigUint) -> Result<i64, PaillierError> {
    let mask96 = two_pow(VALUE_BITS) - BigUint::one();
    let m96 = m & &mask96;
    let sign_bit = m96.bit(95);
    for bit in GUARD_START_BIT..=95 {
        if m96.bit(bit) != sign_bit {
            return Err(PaillierError::Int64Overflow);
        }
    }
    let mask64 = two_pow(64) - BigUint::one();
    let low64 = (&m96 & &mask64).to_u64_digits();
    let raw: u64 = match low64.len() {
        0 => 0,
        1 => low64[0],
        _ => unreachable!("masked to 64 bits"),
    };
    Ok(raw as i64)
}

/// Packs up to [`PACKING_LIMIT`] int64 values into non-overlapping 128-bit
/// lanes (96 value bits + 32-bit guard gap each).
pub fn pack_int64_lanes(values: &[i64]) -> Result<BigUint, PaillierError> {
    if values.len() > PACKING_LIMIT {
        return Err(PaillierError::PackingLimitExceeded { limit: PACKING_LIMIT, got: values.len() });
    }
    let mut acc = BigUint::zero();
    for (i, v) in values.iter().enumerate() {
        acc += encode_int64(*v) << (LANE_BITS * i as u64);
    }
    Ok(acc)
}

/// Unpacks `count` (`<= PACKING_LIMIT`) int64 lanes from a packed
/// plaintext.
pub fn unpack_int64_lanes(m: &BigUint, count: usize) -> Result<Vec<i64>, PaillierError> {
    if count > PACKING_LIMIT {
        return Err(PaillierError::PackingLimitExceeded { limit: PACKING_LIMIT, got: count });
    }
    let mask = two_pow(LANE_BITS) - BigUint::one();
    (0..count)
        .map(|i| {
            let lane_bytes = ((m >> (LANE_BITS * i as u64)) & &mask).to_bytes_be();
            decode_int64(&bytes_to_long(&lane_bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_positive_and_negative() {
        for v in [0i64, 1, -1, i64::MAX, i64::MIN, 42, -42] {
            let encoded = encode_int64(v);
            assert_eq!(decode_int64(&encoded).unwrap(), v, "failed for {v}");
        }
    }

    #[test]
    fn sum_of_encodings_decodes_to_the_sum() {
        let a = encode_int64(2000);
        let b = encode_int64(-500);
        assert_eq!(decode_int64(&(a + b)).unwrap(), 1500);
    }

    #[test]
    fn overflow_is_detected_when_guard_bits_disagree() {
        // Forge a plaintext whose top guard bits are inconsistent.
        let bogus = (BigUint::one() << 90) | BigUint::one();
        assert!(decode_int64(&bogus).is_err());
    }

    #[test]
    fn lane_packing_round_trips() {
        let values = vec![1i64, -2, 3, -4, 5, -6, 7];
        let packed = pack_int64_lanes(&values).unwrap();
        assert_eq!(unpack_int64_lanes(&packed, values.len()).unwrap(), values);
    }

    #[test]
    fn lane_packing_rejects_too_many_values() {
        let values = vec![0i64; PACKING_LIMIT + 1];
        assert!(pack_int64_lanes(&values).is_err());
    }
}
