//! Character classes and the scanning of numeric and character
//! constants.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use base::prelude::Justification;

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || matches!(ch, '$' | '@' | '%')
}

pub(crate) fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '$' | '@' | '%')
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => chars.all(is_ident_char),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Integer(u64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScanError {
    BadDigit { digit: char, radix: u32 },
    Overflow,
    Malformed(String),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::BadDigit { digit, radix } => {
                write!(f, "'{digit}' is not a valid digit in base {radix}")
            }
            ScanError::Overflow => f.write_str("number is too large"),
            ScanError::Malformed(s) => write!(f, "'{s}' is not a valid number"),
        }
    }
}

impl Error for ScanError {}

fn parse_digits(digits: &str, radix: u32) -> Result<u64, ScanError> {
    if digits.is_empty() {
        return Err(ScanError::Malformed(digits.to_string()));
    }
    digits.chars().try_fold(0_u64, |acc, ch| {
        let d = ch
            .to_digit(radix)
            .ok_or(ScanError::BadDigit { digit: ch, radix })?;
        acc.checked_mul(u64::from(radix))
            .and_then(|n| n.checked_add(u64::from(d)))
            .ok_or(ScanError::Overflow)
    })
}

fn split_exponent(text: &str, markers: [char; 2]) -> Result<(&str, Option<i32>), ScanError> {
    match text.find(markers) {
        None => Ok((text, None)),
        Some(pos) => {
            let exponent = &text[pos + 1..];
            let n: i32 = exponent
                .parse()
                .map_err(|_| ScanError::Malformed(text.to_string()))?;
            Ok((&text[..pos], Some(n)))
        }
    }
}

/// Convert the text of a numeric constant.
///
/// The accepted form is `digits[.fraction][E±n][S±n]`.  A constant
/// with a decimal point or a decimal exponent (`E`) is a floating
/// point number, whose mantissa is always decimal.  Otherwise the
/// digits are taken in `radix`.  A binary scale (`S`) multiplies the
/// value by a power of two.
pub(crate) fn parse_number(text: &str, radix: u32) -> Result<Number, ScanError> {
    let (text, scale) = split_exponent(text, ['S', 's'])?;
    let (mantissa, exponent) = split_exponent(text, ['E', 'e'])?;
    if mantissa.contains('.') || exponent.is_some() {
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ScanError::Malformed(text.to_string()));
        }
        let frac_part = if frac_part.is_empty() { "0" } else { frac_part };
        let literal = format!("{int_part}.{frac_part}e{}", exponent.unwrap_or(0));
        let mut x: f64 = literal
            .parse()
            .map_err(|_| ScanError::Malformed(text.to_string()))?;
        if let Some(s) = scale {
            x *= 2_f64.powi(s);
        }
        if x.is_finite() {
            Ok(Number::Float(x))
        } else {
            Err(ScanError::Overflow)
        }
    } else {
        let n = parse_digits(mantissa, radix)?;
        match scale {
            None | Some(0) => Ok(Number::Integer(n)),
            Some(s) if s > 0 => {
                let shift = s.unsigned_abs();
                if shift >= 64 || n.leading_zeros() < shift {
                    Err(ScanError::Overflow)
                } else {
                    Ok(Number::Integer(n << shift))
                }
            }
            Some(s) => Ok(Number::Integer(n.checked_shr(s.unsigned_abs()).unwrap_or(0))),
        }
    }
}

/// Convert the digits of a based constant such as `O'777'`.
pub(crate) fn parse_based(digits: &str, radix: u32) -> Result<u64, ScanError> {
    parse_digits(digits, radix)
}

/// How many character positions a character constant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum StringCount {
    /// As many as needed, padded out to a whole number of words.
    #[default]
    Words,
    /// Exactly this many (`'text'n`).
    Chars(usize),
    /// Exactly as many as there are characters (`'text'*`).
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StringLit {
    pub(crate) bytes: Vec<u8>,
    pub(crate) count: StringCount,
    pub(crate) justification: Justification,
}

impl StringLit {
    /// Number of character positions the constant occupies.
    pub(crate) fn field_chars(&self) -> usize {
        match self.count {
            StringCount::Words | StringCount::Exact => self.bytes.len(),
            StringCount::Chars(n) => n,
        }
    }
}

/// Scan a character constant.  `body` starts just after the opening
/// quote.  On success returns the constant and the number of bytes of
/// `body` it occupies (including the closing quote and any count and
/// justification suffix).
pub(crate) fn scan_string(body: &str) -> Option<(StringLit, usize)> {
    let raw = body.as_bytes();
    let mut bytes = Vec::new();
    let mut pos = 0;
    loop {
        match raw.get(pos) {
            None => {
                return None;
            }
            Some(b'\'') => {
                if raw.get(pos + 1) == Some(&b'\'') {
                    bytes.push(b'\'');
                    pos += 2;
                } else {
                    pos += 1;
                    break;
                }
            }
            Some(b) => {
                bytes.push(*b);
                pos += 1;
            }
        }
    }
    let mut count = StringCount::Words;
    if raw.get(pos) == Some(&b'*') {
        count = StringCount::Exact;
        pos += 1;
    } else {
        let digits = raw[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            let n: usize = body[pos..pos + digits].parse().ok()?;
            count = StringCount::Chars(n);
            pos += digits;
        }
    }
    let mut justification = Justification::default();
    if let Some(&b) = raw.get(pos) {
        let follower_is_ident = raw
            .get(pos + 1)
            .is_some_and(|next| is_ident_char(char::from(*next)));
        if let Some(j) = Justification::from_suffix(char::from(b)) {
            if !follower_is_ident {
                justification = j;
                pos += 1;
            }
        }
    }
    Some((
        StringLit {
            bytes,
            count,
            justification,
        },
        pos,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(parse_number("17", 10), Ok(Number::Integer(17)));
        assert_eq!(parse_number("17", 8), Ok(Number::Integer(15)));
        assert_eq!(
            parse_number("19", 8),
            Err(ScanError::BadDigit {
                digit: '9',
                radix: 8
            })
        );
        assert_eq!(parse_number("3S2", 10), Ok(Number::Integer(12)));
        assert_eq!(parse_number("12S-2", 10), Ok(Number::Integer(3)));
        assert_eq!(
            parse_number("99999999999999999999999", 10),
            Err(ScanError::Overflow)
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(parse_number("1.5", 8), Ok(Number::Float(1.5)));
        assert_eq!(parse_number("2.", 10), Ok(Number::Float(2.0)));
        assert_eq!(parse_number("25E-1", 10), Ok(Number::Float(2.5)));
        assert_eq!(parse_number("1.0E2S1", 10), Ok(Number::Float(200.0)));
    }

    #[test]
    fn test_based() {
        assert_eq!(parse_based("FF", 16), Ok(255));
        assert_eq!(parse_based("777", 8), Ok(511));
    }

    #[test]
    fn test_plain_string() {
        let (lit, used) = scan_string("AB'").expect("valid string");
        assert_eq!(lit.bytes, b"AB");
        assert_eq!(lit.count, StringCount::Words);
        assert_eq!(lit.justification, Justification::LeftBlank);
        assert_eq!(used, 3);
    }

    #[test]
    fn test_doubled_quote() {
        let (lit, used) = scan_string("IT''S'").expect("valid string");
        assert_eq!(lit.bytes, b"IT'S");
        assert_eq!(used, 6);
    }

    #[test]
    fn test_count_and_justification() {
        let (lit, used) = scan_string("AB'3R,").expect("valid string");
        assert_eq!(lit.count, StringCount::Chars(3));
        assert_eq!(lit.justification, Justification::RightZero);
        assert_eq!(used, 5);
        let (lit, _) = scan_string("AB'*Z").expect("valid string");
        assert_eq!(lit.count, StringCount::Exact);
        assert_eq!(lit.justification, Justification::ZeroEnd);
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(scan_string("AB"), None);
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("$CPU"));
        assert!(is_identifier("A1B"));
        assert!(!is_identifier("1AB"));
        assert!(!is_identifier(""));
    }
}
