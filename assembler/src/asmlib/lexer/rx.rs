use std::{ops::Deref, sync::OnceLock};

use regex::Regex;

/// A regular expression compiled on first use.
pub struct LazyRegex {
    once: OnceLock<Regex>,
    pattern: &'static str,
}

impl LazyRegex {
    #[must_use]
    pub const fn new(pattern: &'static str) -> Self {
        LazyRegex {
            once: OnceLock::new(),
            pattern,
        }
    }
}

impl Deref for LazyRegex {
    type Target = Regex;

    fn deref(&self) -> &Regex {
        self.once.get_or_init(|| match Regex::new(self.pattern) {
            Ok(r) => r,
            Err(e) => {
                panic!("'{}' is not a valid regular expression: {e}", self.pattern,);
            }
        })
    }
}

macro_rules! register_pattern {
    ($flags:literal) => {
        concat!(
            $flags,
            r"^(?:",
            r"(?P<one>PS|QS|ZS|PV|QV|SB|SR|ST|A|S|V)(?P<d1>[0-7])",
            r"|(?P<two>SM|B|T)(?P<d2>[0-7]{1,2})",
            r"|(?P<bare>SM|CA|CE|CI|CL|MC|RT|VL|VM|XA)",
            r")$"
        )
    };
}

/// Register designators: the single-digit groups (`A3`, `PS2`, ...),
/// the one- or two-digit groups (`SM17`, `B63`, `T7`) and the
/// registers which have no number (`VL`, `CA`, ...).
pub(crate) static REGISTER: LazyRegex = LazyRegex::new(register_pattern!(""));

/// As [`REGISTER`] but also accepting lower case, for the flexible
/// tokenizer rules.
pub(crate) static REGISTER_ANY_CASE: LazyRegex = LazyRegex::new(register_pattern!("(?i)"));

#[test]
fn test_register_pattern() {
    for good in ["A0", "S7", "PS3", "SB1", "SM", "SM17", "B77", "B5", "T70", "VL", "XA"] {
        assert!(REGISTER.is_match(good), "{good} should be a register");
    }
    for bad in ["A8", "A10", "B777", "FS1", "VL1", "a1", "SIGN"] {
        assert!(!REGISTER.is_match(bad), "{bad} should not be a register");
    }
    assert!(REGISTER_ANY_CASE.is_match("a1"));
}
