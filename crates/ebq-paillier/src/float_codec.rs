//! IEEE-754 double plaintext packing.
//!
//! The 1024-bit plaintext is partitioned, MSB to LSB, into six 32-bit
//! lanes (NaN counter, +inf counter, -inf counter, carry, sign-high guard,
//! sign-low guard) followed by an 831-bit mantissa field. The mantissa
//! field together with the two sign guard lanes forms a 895-bit
//! two's-complement fixed-point number with the binary point at bit 389,
//! so a finite value `v` is stored as `round(v * 2^389)` in that
//! two's-complement region.
//!
//! This module never reconstructs a value from the carry lane when
//! aggregating; overflow is detected purely by inspecting the two guard
//! lanes after summation.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::errors::PaillierError;

const MANTISSA_BITS: u64 = 831;
const SIGN_LOW_GUARD_BITS: u64 = 32;
const SIGN_HIGH_GUARD_BITS: u64 = 32;
const CARRY_BITS: u64 = 32;
const NEG_INF_BITS: u64 = 32;
const POS_INF_BITS: u64 = 32;
const NAN_BITS: u64 = 32;

const MANTISSA_START: u64 = 0;
const SIGN_LOW_GUARD_START: u64 = MANTISSA_START + MANTISSA_BITS;
const SIGN_HIGH_GUARD_START: u64 = SIGN_LOW_GUARD_START + SIGN_LOW_GUARD_BITS;
const CARRY_START: u64 = SIGN_HIGH_GUARD_START + SIGN_HIGH_GUARD_BITS;
const NEG_INF_START: u64 = CARRY_START + CARRY_BITS;
const POS_INF_START: u64 = NEG_INF_START + NEG_INF_BITS;
const NAN_START: u64 = POS_INF_START + POS_INF_BITS;

/// Width of the two's-complement fixed-point region (mantissa field plus
/// both sign guard lanes).
const SIGNED_REGION_BITS: u64 = SIGN_HIGH_GUARD_START + SIGN_HIGH_GUARD_BITS;

/// Fractional bits in the fixed-point region: "the binary point is at bit 389".
const FRACTIONAL_BITS: i32 = 389;

/// Plaintext exponents above this bound are rejected outright.
pub const MAX_EXPONENT: i32 = 389;
/// Magnitudes with an unbiased exponent below this bound round to zero.
pub const MIN_EXPONENT: i32 = -441;

fn lane_mask(bits: u64) -> BigUint {
    (BigUint::one() << bits) - BigUint::one()
}

fn read_lane(plaintext: &BigUint, start: u64, bits: u64) -> BigUint {
    (plaintext >> start) & lane_mask(bits)
}

fn set_lane(plaintext: &mut BigUint, start: u64, value: &BigUint) {
    *plaintext |= value << start;
}

/// Decomposes a finite, non-zero double into `(sign, unbiased exponent,
/// 53-bit mantissa including the implicit leading one)`.
fn decompose(v: f64) -> (bool, i32, u64) {
    let bits = v.to_bits();
    let negative = bits >> 63 == 1;
    let biased_exp = ((bits >> 52) & 0x7FF) as i32;
    let frac = bits & 0x000F_FFFF_FFFF_FFFF;
    let (exp, mantissa) = if biased_exp == 0 {
        // Subnormal: no implicit leading one, exponent floor is -1022.
        (-1022, frac)
    } else {
        (biased_exp - 1023, frac | (1u64 << 52))
    };
    (negative, exp, mantissa)
}

/// Encodes a finite double into the 895-bit signed fixed-point region.
/// Returns `Err` if the exponent exceeds [`MAX_EXPONENT`]; magnitudes
/// below [`MIN_EXPONENT`] are rounded to zero rather than rejected.
fn encode_finite(v: f64) -> Result<BigUint, PaillierError> {
    if v == 0.0 {
        return Ok(BigUint::zero());
    }
    let (negative, exp, mantissa) = decompose(v);
    if exp > MAX_EXPONENT {
        return Err(PaillierError::FloatExponentOverflow(exp));
    }
    if exp < MIN_EXPONENT {
        return Ok(BigUint::zero());
    }

    // scaled = mantissa * 2^(exp - 52 + FRACTIONAL_BITS)
    let shift = exp - 52 + FRACTIONAL_BITS;
    let magnitude = if shift >= 0 {
        BigUint::from(mantissa) << shift as u64
    } else {
        BigUint::from(mantissa) >> (-shift) as u64
    };

    if magnitude.is_zero() {
        return Ok(BigUint::zero());
    }

    let region = if negative {
        (BigUint::one() << SIGNED_REGION_BITS) - magnitude
    } else {
        magnitude
    };
    Ok(region)
}

/// Builds the full 1024-bit plaintext integer for a finite double, NaN, or
/// infinity.
pub fn encode(v: f64) -> Result<BigUint, PaillierError> {
    if v.is_nan() {
        let mut p = BigUint::zero();
        set_lane(&mut p, NAN_START, &BigUint::one());
        return Ok(p);
    }
    if v.is_infinite() {
        let mut p = BigUint::zero();
        if v > 0.0 {
            set_lane(&mut p, POS_INF_START, &BigUint::one());
        } else {
            set_lane(&mut p, NEG_INF_START, &BigUint::one());
        }
        return Ok(p);
    }
    encode_finite(v)
}

fn region_to_f64(region: &BigUint) -> f64 {
    let sign_high_guard = read_lane(region, SIGN_HIGH_GUARD_START, SIGN_HIGH_GUARD_BITS);
    let negative = !sign_high_guard.is_zero() && sign_high_guard == lane_mask(SIGN_HIGH_GUARD_BITS);
    let magnitude = if negative {
        (BigUint::one() << SIGNED_REGION_BITS) - region
    } else {
        region.clone()
    };
    let scaled = magnitude.to_f64().unwrap_or(f64::INFINITY);
    let value = scaled / 2f64.powi(FRACTIONAL_BITS);
    if negative { -value } else { value }
}

/// Decodes a 1024-bit plaintext (possibly the result of homomorphically
/// summing several encodings) back into an `f64`, applying the
/// NaN/+inf/-inf dominance rules and guard-lane overflow detection of
/// 
pub fn decode(plaintext: &BigUint) -> f64 {
    let nan_lane = read_lane(plaintext, NAN_START, NAN_BITS);
    let pos_inf_lane = read_lane(plaintext, POS_INF_START, POS_INF_BITS);
    let neg_inf_lane = read_lane(plaintext, NEG_INF_START, NEG_INF_BITS);

    if !nan_lane.is_zero() {
        return f64::NAN;
    }
    if !pos_inf_lane.is_zero() && !neg_inf_lane.is_zero() {
        return f64::NAN;
    }
    if !pos_inf_lane.is_zero() {
        return f64::INFINITY;
    }
    if !neg_inf_lane.is_zero() {
        return f64::NEG_INFINITY;
    }

    let sign_low_guard = read_lane(plaintext, SIGN_LOW_GUARD_START, SIGN_LOW_GUARD_BITS);
    let sign_high_guard = read_lane(plaintext, SIGN_HIGH_GUARD_START, SIGN_HIGH_GUARD_BITS);
    let all_ones = lane_mask(SIGN_HIGH_GUARD_BITS);

    if sign_high_guard.is_zero() && !sign_low_guard.is_zero() {
        return f64::INFINITY;
    }
    if sign_high_guard == all_ones && sign_low_guard != all_ones {
        return f64::NEG_INFINITY;
    }

    let region = read_lane(plaintext, MANTISSA_START, SIGNED_REGION_BITS);
    region_to_f64(&region)
}

/// `n² - escaped` raw-bytes SQL literal form used by the `PAILLIER_SUM`
/// server fragment: each byte of `n²`'s big-endian encoding as
/// `\xHH`.
pub fn sql_escape_bytes(n: &BigUint) -> String {
    let bytes = n.to_bytes_be();
    let mut out = String::with_capacity(bytes.len() * 4);
    for b in bytes {
        out.push_str(&format!("\\x{b:02X}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(v: f64) -> f64 {
        decode(&encode(v).unwrap())
    }

    #[test]
    fn round_trips_representative_finite_values() {
        for v in [0.0, 1.0, -1.0, 3512.5, -14050.25, 1e10, -1e-10, 0.001] {
            let got = round_trip(v);
            assert!((got - v).abs() < 1e-6, "v={v} got={got}");
        }
    }

    #[test]
    fn round_trips_special_values() {
        assert!(round_trip(f64::NAN).is_nan());
        assert_eq!(round_trip(f64::INFINITY), f64::INFINITY);
        assert_eq!(round_trip(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn exponent_above_bound_is_rejected() {
        let huge = 2f64.powi(400);
        assert!(encode(huge).is_err());
    }

    #[test]
    fn tiny_magnitude_rounds_to_zero() {
        let tiny = 2f64.powi(-500);
        assert_eq!(encode(tiny).unwrap(), BigUint::zero());
    }

    #[test]
    fn adding_infinities_of_opposite_sign_yields_nan() {
        let sum = encode(f64::INFINITY).unwrap() + encode(f64::NEG_INFINITY).unwrap();
        assert!(decode(&sum).is_nan());
    }

    #[test]
    fn nan_dominates_any_combination() {
        let sum = encode(f64::NAN).unwrap() + encode(1.0).unwrap();
        assert!(decode(&sum).is_nan());
    }

    #[test]
    fn sum_of_finite_values_decodes_to_their_sum() {
        let sum = encode(2000.0).unwrap() + encode(3800.0).unwrap() + encode(4300.0).unwrap() + encode(3950.0).unwrap();
        assert!((decode(&sum) - 14050.0).abs() < 1e-6);
    }
}
