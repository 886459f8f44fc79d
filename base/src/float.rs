//! Conversion between host floating-point numbers and the X-MP
//! floating-point format.
//!
//! An X-MP floating-point word holds a sign bit (bit 0), a 15-bit
//! biased exponent (bits 1-15) and a 48-bit coefficient (bits 16-63).
//! The coefficient is a binary fraction whose most significant bit is
//! set in every normalized non-zero value, so the value represented
//! is `coefficient * 2^(exponent - 0o40000 - 48)`.  Zero is the all
//! zeros word.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

const EXPONENT_BIAS: i64 = 0o40000;
const EXPONENT_MAX: i64 = 0o77777;
const COEFFICIENT_BITS: u32 = 48;
const SIGN_BIT: u64 = 1 << 63;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatRangeError {
    Overflow(f64),
    Underflow(f64),
    NotANumber,
}

impl Display for FloatRangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FloatRangeError::Overflow(x) => {
                write!(f, "{x} is too large for the floating-point format")
            }
            FloatRangeError::Underflow(x) => {
                write!(f, "{x} is too small for the floating-point format")
            }
            FloatRangeError::NotANumber => f.write_str("value is not a number"),
        }
    }
}

impl Error for FloatRangeError {}

/// Convert a host double into an X-MP floating-point word.
///
/// # Errors
///
/// Returns an error for NaN, infinities and values whose exponent
/// does not fit in the 15-bit exponent field.
pub fn f64_to_cray(x: f64) -> Result<u64, FloatRangeError> {
    if x.is_nan() {
        return Err(FloatRangeError::NotANumber);
    }
    if x.is_infinite() {
        return Err(FloatRangeError::Overflow(x));
    }
    if x == 0.0 {
        return Ok(0);
    }
    let bits = x.to_bits();
    let sign = if bits & SIGN_BIT != 0 { SIGN_BIT } else { 0 };
    let biased = ((bits >> 52) & 0x7ff) as i64;
    if biased == 0 {
        // Host subnormals are far below the smallest X-MP value.
        return Err(FloatRangeError::Underflow(x));
    }
    // 53-bit significand with the hidden bit restored; as a fraction
    // it lies in [0.5, 1) and the binary exponent is biased - 1022.
    let significand: u64 = (bits & ((1 << 52) - 1)) | (1 << 52);
    let mut exponent: i64 = biased - 1022;
    let dropped = 53 - COEFFICIENT_BITS;
    let mut coefficient = significand >> dropped;
    if (significand >> (dropped - 1)) & 1 == 1 {
        coefficient += 1;
    }
    if coefficient >> COEFFICIENT_BITS != 0 {
        coefficient >>= 1;
        exponent += 1;
    }
    let field = exponent + EXPONENT_BIAS;
    if field > EXPONENT_MAX {
        return Err(FloatRangeError::Overflow(x));
    }
    if field < 0 {
        return Err(FloatRangeError::Underflow(x));
    }
    Ok(sign | ((field as u64) << COEFFICIENT_BITS) | coefficient)
}

/// Convert an X-MP floating-point word into a host double.  Values
/// outside the host range become infinities or zero.
pub fn cray_to_f64(word: u64) -> f64 {
    let coefficient = word & ((1 << COEFFICIENT_BITS) - 1);
    if coefficient == 0 {
        return 0.0;
    }
    let field = ((word >> COEFFICIENT_BITS) & 0o77777) as i64;
    let exponent = field - EXPONENT_BIAS - i64::from(COEFFICIENT_BITS);
    let magnitude = (coefficient as f64) * 2_f64.powi(exponent.clamp(-4000, 4000) as i32);
    if word & SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[test]
    fn test_one() {
        // 1.0 is 0.5 * 2^1.
        assert_eq!(f64_to_cray(1.0), Ok(0o040001_u64 << 48 | 1 << 47));
    }

    #[test]
    fn test_negative_half() {
        assert_eq!(f64_to_cray(-0.5), Ok(SIGN_BIT | 0o040000_u64 << 48 | 1 << 47));
    }

    #[test]
    fn test_zero() {
        assert_eq!(f64_to_cray(0.0), Ok(0));
        assert_eq!(cray_to_f64(0), 0.0);
    }

    #[test]
    fn test_rejects_nan() {
        assert_eq!(f64_to_cray(f64::NAN), Err(FloatRangeError::NotANumber));
    }

    #[proptest]
    fn small_integers_survive_round_trip(#[strategy(-1_000_000_i64..1_000_000)] n: i64) {
        let x = n as f64;
        let word = f64_to_cray(x).expect("integers in this range are representable");
        assert_eq!(cray_to_f64(word), x);
    }
}
