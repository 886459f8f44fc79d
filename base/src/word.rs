//! Various convenience utilities for splitting 64-bit X-MP words
//! into parcels and bit fields and for joining them together.
//!
//! Bit positions are counted from the most-significant end of the
//! word, which is how the machine reference manuals number them.

/// Number of bits in a parcel.
pub const PARCEL_BITS: u32 = 16;

/// Number of bits in a word.
pub const WORD_BITS: u32 = 64;

/// Number of parcels in a word.
pub const PARCELS_PER_WORD: u64 = 4;

/// Split a word into its four parcels, most-significant first.
pub fn split_parcels(word: u64) -> [u16; 4] {
    [
        (word >> 48) as u16,
        (word >> 32) as u16,
        (word >> 16) as u16,
        word as u16,
    ]
}

/// Join four parcels (most-significant first) into a word.
pub fn join_parcels(parcels: [u16; 4]) -> u64 {
    parcels
        .iter()
        .fold(0_u64, |acc, p| (acc << PARCEL_BITS) | u64::from(*p))
}

/// A mask with the `n` least-significant bits set.  Widths of 64 or
/// more produce a mask of all ones.
pub const fn mask_right(n: u32) -> u64 {
    if n >= WORD_BITS {
        u64::MAX
    } else {
        (1_u64 << n) - 1
    }
}

/// A mask with the `n` most-significant bits set.  Widths of 64 or
/// more produce a mask of all ones.
pub const fn mask_left(n: u32) -> u64 {
    if n >= WORD_BITS {
        u64::MAX
    } else if n == 0 {
        0
    } else {
        !mask_right(WORD_BITS - n)
    }
}

/// Extract the `width`-bit field which starts at bit `start`
/// (counting from the most-significant bit).
///
/// # Panics
///
/// When the field does not lie within the word.
pub fn extract(word: u64, start: u32, width: u32) -> u64 {
    assert!(start + width <= WORD_BITS, "field {start}+{width} lies outside a word");
    if width == 0 {
        return 0;
    }
    (word >> (WORD_BITS - start - width)) & mask_right(width)
}

/// Replace the `width`-bit field which starts at bit `start`
/// (counting from the most-significant bit) with the low bits of
/// `value`.
///
/// # Panics
///
/// When the field does not lie within the word.
pub fn deposit(word: u64, start: u32, width: u32, value: u64) -> u64 {
    assert!(start + width <= WORD_BITS, "field {start}+{width} lies outside a word");
    if width == 0 {
        return word;
    }
    let shift = WORD_BITS - start - width;
    let mask = mask_right(width) << shift;
    (word & !mask) | ((value << shift) & mask)
}

/// Returns true when `value`, taken as an unsigned quantity, can be
/// represented in `width` bits.
pub fn fits_unsigned(value: u64, width: u32) -> bool {
    width >= WORD_BITS || value <= mask_right(width)
}

/// Returns true when `value`, taken as a two's complement quantity,
/// can be represented in `width` bits.
pub fn fits_signed(value: i64, width: u32) -> bool {
    if width >= WORD_BITS {
        return true;
    }
    if width == 0 {
        return value == 0;
    }
    let limit = 1_i64 << (width - 1);
    (-limit..limit).contains(&value)
}

/// Returns true when truncating `value` to `width` bits loses no
/// information, whether the value is read as signed or unsigned.
pub fn fits_field(value: u64, width: u32) -> bool {
    fits_unsigned(value, width) || fits_signed(value as i64, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    macro_rules! assert_octal_eq {
        ($left:expr, $right:expr $(,)?) => {{
            match (&$left, &$right) {
                (left_val, right_val) => {
                    if !(*left_val == *right_val) {
                        panic!(
                            "Assertion failed: {:>#024o} != {:>#024o}",
                            left_val, right_val
                        );
                    }
                }
            }
        }};
    }

    #[test]
    fn test_split_parcels() {
        assert_eq!(
            split_parcels(0x0123_4567_89AB_CDEF),
            [0x0123, 0x4567, 0x89AB, 0xCDEF]
        );
    }

    #[test]
    fn test_masks() {
        assert_octal_eq!(mask_right(0), 0_u64);
        assert_octal_eq!(mask_right(6), 0o77_u64);
        assert_octal_eq!(mask_right(64), u64::MAX);
        assert_octal_eq!(mask_left(0), 0_u64);
        assert_octal_eq!(mask_left(3), 0o1_600_000_000_000_000_000_000_u64);
        assert_octal_eq!(mask_left(64), u64::MAX);
    }

    #[test]
    fn test_deposit_instruction_field() {
        // An instruction parcel pair placed in the second and third
        // parcels of a word.
        let word = deposit(0, 16, 32, 0o020_100_000_007);
        assert_octal_eq!(word, 0o020_100_000_007_u64 << 16);
        assert_eq!(extract(word, 16, 32), 0o020_100_000_007);
    }

    #[test]
    fn test_fits() {
        assert!(fits_unsigned(63, 6));
        assert!(!fits_unsigned(64, 6));
        assert!(fits_signed(-32, 6));
        assert!(!fits_signed(-33, 6));
        assert!(fits_field((-1_i64) as u64, 3));
        assert!(!fits_field(8, 3));
    }

    #[proptest]
    fn parcels_round_trip(word: u64) {
        assert_eq!(join_parcels(split_parcels(word)), word);
    }

    #[proptest]
    fn deposit_then_extract(
        #[strategy(0_u32..64)] start: u32,
        #[strategy(0_u32..=(64 - #start))] width: u32,
        word: u64,
        value: u64,
    ) {
        let updated = deposit(word, start, width, value);
        assert_eq!(extract(updated, start, width), value & mask_right(width));
        // Bits outside the field are untouched.
        let outside = !(mask_right(width).checked_shl(64 - start - width).unwrap_or(0));
        if width > 0 {
            assert_eq!(updated & outside, word & outside);
        }
    }
}
