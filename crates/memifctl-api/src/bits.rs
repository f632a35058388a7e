//! Power-of-two and bit-field helpers.
//!
//! All functions are pure and total over `u64`. Where a precondition is
//! documented (a power-of-two `pow2`, a field that fits in 64 bits) the
//! result for inputs breaking it is meaningless but never a panic.

/// True when `x` has at most one bit set.
///
/// Zero counts as a power of two: `0 & (0 - 1) == 0`. Callers that must
/// reject zero check it separately.
pub const fn is_pow2(x: u64) -> bool {
    x & x.wrapping_sub(1) == 0
}

/// Mask of the low `count` bits. `count >= 64` yields all ones.
pub const fn pow2_mask(count: u32) -> u64 {
    if count >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

/// Round `x` up to a multiple of `pow2`, which must be a power of two.
pub const fn round_pow2(x: u64, pow2: u64) -> u64 {
    x.wrapping_add(pow2.wrapping_sub(1)) & !pow2.wrapping_sub(1)
}

/// Round `x` down to a multiple of `pow2`, which must be a power of two.
pub const fn round_down_pow2(x: u64, pow2: u64) -> u64 {
    x & !pow2.wrapping_sub(1)
}

/// The `count`-bit field of `x` starting at bit `start`.
pub const fn extract_bits(x: u64, start: u32, count: u32) -> u64 {
    let shifted = match x.checked_shr(start) {
        Some(v) => v,
        None => 0,
    };
    shifted & pow2_mask(count)
}

/// Index of the highest set bit (`floor(log2(x))`). Zero maps to zero.
pub const fn min_log2(x: u64) -> u32 {
    if x == 0 {
        0
    } else {
        u64::BITS - 1 - x.leading_zeros()
    }
}

/// `ceil(log2(x))`.
pub const fn max_log2(x: u64) -> u32 {
    let l = min_log2(x);
    if x > (1u64 << l) {
        l + 1
    } else {
        l
    }
}

/// Smallest power of two not below `x`, saturating at `1 << 63`.
pub const fn max_pow2(x: u64) -> u64 {
    let l = max_log2(x);
    if l >= u64::BITS {
        1u64 << (u64::BITS - 1)
    } else {
        1u64 << l
    }
}

/// Lowest set bit of `x` as a value (`x & -x`).
pub const fn first_set(x: u64) -> u64 {
    x & x.wrapping_neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers_of_two_are_recognized() {
        for shift in 0..64 {
            assert!(is_pow2(1u64 << shift), "1 << {shift}");
        }
        assert!(is_pow2(0), "zero passes the bit trick");
        for x in [3u64, 6, 100, 1023, 1025, u64::MAX] {
            assert!(!is_pow2(x), "{x}");
        }
    }

    #[test]
    fn rounding_to_power_of_two_multiples() {
        assert_eq!(round_pow2(0, 8), 0);
        assert_eq!(round_pow2(1, 8), 8);
        assert_eq!(round_pow2(8, 8), 8);
        assert_eq!(round_pow2(9, 8), 16);
        assert_eq!(round_down_pow2(9, 8), 8);
        assert_eq!(round_down_pow2(7, 8), 0);
        assert_eq!(round_down_pow2(4097, 4096), 4096);
    }

    #[test]
    fn extracting_bit_fields() {
        assert_eq!(extract_bits(0b1011_0000, 4, 4), 0b1011);
        assert_eq!(extract_bits(0b10, 1, 1), 1);
        assert_eq!(extract_bits(0b10, 0, 1), 0);
        assert_eq!(extract_bits(u64::MAX, 0, 64), u64::MAX);
        assert_eq!(extract_bits(u64::MAX, 60, 4), 0xf);
        assert_eq!(extract_bits(u64::MAX, 64, 4), 0);
    }

    #[test]
    fn log2_helpers() {
        assert_eq!(min_log2(1), 0);
        assert_eq!(min_log2(1024), 10);
        assert_eq!(min_log2(1025), 10);
        assert_eq!(max_log2(1024), 10);
        assert_eq!(max_log2(1025), 11);
        assert_eq!(max_pow2(1000), 1024);
        assert_eq!(max_pow2(1024), 1024);
        assert_eq!(max_pow2(u64::MAX), 1u64 << 63);
        assert_eq!(min_log2(0), 0);
    }

    #[test]
    fn first_set_isolates_lowest_bit() {
        assert_eq!(first_set(0b1011_0100), 0b100);
        assert_eq!(first_set(0), 0);
        assert_eq!(first_set(1u64 << 63), 1u64 << 63);
    }

    #[test]
    fn masks() {
        assert_eq!(pow2_mask(0), 0);
        assert_eq!(pow2_mask(8), 0xff);
        assert_eq!(pow2_mask(64), u64::MAX);
        assert_eq!(pow2_mask(100), u64::MAX);
    }
}
