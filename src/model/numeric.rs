//! 256-bit quantities carried as strings on the wire

use crate::error::DecayError;

use alloy_primitives::{U256, U512};

/// Parse a decimal or `0x`-prefixed hex string into a [`U256`].
pub fn parse_u256(field: &'static str, value: &str) -> Result<U256, DecayError> {
    let malformed = || DecayError::Malformed {
        field,
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            U256::from_str_radix(hex, 16)
        }
        Some(_) => return Err(malformed()),
        None if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) => {
            U256::from_str_radix(trimmed, 10)
        }
        None => return Err(malformed()),
    };

    parsed.map_err(|_| malformed())
}

/// `floor(a * b / c)` with a 512-bit intermediate product.
///
/// `None` when `c` is zero or the quotient does not fit in 256 bits.
pub fn mul_div(a: U256, b: U256, c: U256) -> Option<U256> {
    if c.is_zero() {
        return None;
    }

    let quotient = widen(a) * widen(b) / widen(c);
    let limbs = quotient.as_limbs();
    if limbs[4..].iter().any(|&limb| limb != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(value.as_limbs());
    U512::from_limbs(limbs)
}

/// Pack `(start, end)` as `start << 128 | end`.
pub fn pack_start_end_ts(start: u128, end: u128) -> U256 {
    (U256::from(start) << 128) | U256::from(end)
}

/// Split a packed timestamp word into `(start, end)`.
pub fn unpack_start_end_ts(packed: U256) -> (u128, u128) {
    let limbs = packed.as_limbs();
    let end = ((limbs[1] as u128) << 64) | limbs[0] as u128;
    let start = ((limbs[3] as u128) << 64) | limbs[2] as u128;
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_and_hex() {
        assert_eq!(parse_u256("startPrice", "10").unwrap(), U256::from(10u64));
        assert_eq!(parse_u256("startPrice", "0x10").unwrap(), U256::from(16u64));
        assert_eq!(
            parse_u256("startPrice", "100000000000000000").unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for value in ["", "abc", "-5", "1.5", "0x", "0xzz", "1e18"] {
            let err = parse_u256("endPrice", value).unwrap_err();
            assert_eq!(
                err,
                DecayError::Malformed {
                    field: "endPrice",
                    value: value.to_string()
                }
            );
        }
    }

    #[test]
    fn test_parse_rejects_values_above_256_bits() {
        let too_big = format!("0x1{}", "0".repeat(64));
        assert!(parse_u256("startEndTs", &too_big).is_err());
    }

    #[test]
    fn test_mul_div_keeps_wide_intermediate() {
        let half = U256::from(1u64) << 255;
        assert_eq!(
            mul_div(half, U256::from(60u64), U256::from(120u64)),
            Some(U256::from(1u64) << 254)
        );
        assert_eq!(
            mul_div(U256::MAX, U256::MAX, U256::MAX),
            Some(U256::MAX)
        );
        assert_eq!(mul_div(U256::from(10u64), U256::from(1u64), U256::from(3u64)), Some(U256::from(3u64)));
    }

    #[test]
    fn test_mul_div_rejects_zero_divisor_and_wide_quotient() {
        assert_eq!(mul_div(U256::from(1u64), U256::from(1u64), U256::ZERO), None);
        assert_eq!(mul_div(U256::MAX, U256::from(2u64), U256::from(1u64)), None);
    }

    #[test]
    fn test_pack_layout() {
        let packed = pack_start_end_ts(1_700_000_000, 1_700_000_120);
        assert_eq!(unpack_start_end_ts(packed), (1_700_000_000, 1_700_000_120));

        let expected = (U256::from(1_700_000_000u64) << 128) + U256::from(1_700_000_120u64);
        assert_eq!(packed, expected);

        let (start, end) = unpack_start_end_ts(pack_start_end_ts(u128::MAX, 0));
        assert_eq!((start, end), (u128::MAX, 0));
    }
}
