//! Packing of ASCII character strings into 64-bit words.
//!
//! Characters occupy eight bits each and are packed starting at the
//! most-significant end of the word, so a word holds eight of them.

/// How a character string is positioned within the words that hold
/// it, and what fills the unused character positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justification {
    /// Left justified, blank filled (suffix `H`).
    #[default]
    LeftBlank,
    /// Left justified, zero filled (suffix `L`).
    LeftZero,
    /// Right justified, zero filled (suffix `R`).
    RightZero,
    /// Left justified, zero filled, and always followed by at least
    /// one zero character (suffix `Z`).
    ZeroEnd,
}

impl Justification {
    pub fn from_suffix(ch: char) -> Option<Justification> {
        match ch.to_ascii_uppercase() {
            'H' => Some(Justification::LeftBlank),
            'L' => Some(Justification::LeftZero),
            'R' => Some(Justification::RightZero),
            'Z' => Some(Justification::ZeroEnd),
            _ => None,
        }
    }

    pub fn fill(&self) -> u8 {
        match self {
            Justification::LeftBlank => b' ',
            _ => 0,
        }
    }
}

const CHARS_PER_WORD: usize = 8;

/// Pack `field_len` character positions holding `bytes` into words.
///
/// `bytes` longer than `field_len` are truncated (keeping the
/// leftmost characters); shorter ones are padded with the
/// justification's fill character.  The field is then rounded up to a
/// whole number of words.  For [`Justification::RightZero`] the
/// characters end at the last position of the last word; for
/// [`Justification::ZeroEnd`] an extra zero character is guaranteed
/// (which may need an extra word).
pub fn pack_bytes(bytes: &[u8], field_len: usize, justification: Justification) -> Vec<u64> {
    let used = bytes.len().min(field_len);
    let mut chars: Vec<u8> = Vec::with_capacity(field_len + CHARS_PER_WORD);
    chars.extend_from_slice(&bytes[..used]);
    chars.resize(field_len, justification.fill());
    if justification == Justification::ZeroEnd {
        chars.push(0);
    }
    let total = chars.len().div_ceil(CHARS_PER_WORD) * CHARS_PER_WORD;
    let padding = total - chars.len();
    let mut laid_out: Vec<u8> = Vec::with_capacity(total);
    match justification {
        Justification::RightZero => {
            laid_out.resize(padding, 0);
            laid_out.extend_from_slice(&chars);
        }
        _ => {
            laid_out.extend_from_slice(&chars);
            laid_out.resize(total, justification.fill());
        }
    }
    laid_out
        .chunks(CHARS_PER_WORD)
        .map(|chunk| chunk.iter().fold(0_u64, |acc, b| (acc << 8) | u64::from(*b)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_blank() {
        assert_eq!(
            pack_bytes(b"AB", 8, Justification::LeftBlank),
            vec![0x4142_2020_2020_2020]
        );
    }

    #[test]
    fn test_right_zero() {
        assert_eq!(
            pack_bytes(b"AB", 2, Justification::RightZero),
            vec![0x0000_0000_0000_4142]
        );
    }

    #[test]
    fn test_left_zero_multiword() {
        assert_eq!(
            pack_bytes(b"ABCDEFGHI", 9, Justification::LeftZero),
            vec![0x4142_4344_4546_4748, 0x4900_0000_0000_0000]
        );
    }

    #[test]
    fn test_zero_end_needs_extra_word() {
        assert_eq!(
            pack_bytes(b"ABCDEFGH", 8, Justification::ZeroEnd),
            vec![0x4142_4344_4546_4748, 0]
        );
    }

    #[test]
    fn test_truncation_keeps_leftmost() {
        assert_eq!(
            pack_bytes(b"ABCDEFGHIJ", 8, Justification::LeftBlank),
            vec![0x4142_4344_4546_4748]
        );
    }
}
