//! Micro substitution.
//!
//! A micro is a named piece of text.  Wherever `"name"` appears in a
//! source statement, it is replaced by the text of the micro before
//! the statement is divided into fields.
use std::time::SystemTime;

use super::scanner::is_identifier;

/// The statement after micro substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Substituted {
    pub(crate) text: String,
    /// Some `"name"` did not name a micro.
    pub(crate) unknown: bool,
    /// At least one substitution was made.
    pub(crate) changed: bool,
}

/// Replace each `"name"` in `line` by the micro `lookup` returns for
/// it.  Unknown micros become empty text.  Underscores outside
/// substituted text and outside quoted strings are deleted; they
/// join a micro reference to the text around it.
pub(crate) fn substitute<F>(line: &str, mut lookup: F) -> Substituted
where
    F: FnMut(&str) -> Option<String>,
{
    let mut text = String::with_capacity(line.len());
    let mut unknown = false;
    let mut changed = false;
    let mut quoted = false;
    let mut rest = line;
    while let Some(ch) = rest.chars().next() {
        if ch == '"' {
            if let Some(close) = rest[1..].find('"') {
                let name = &rest[1..=close];
                if is_identifier(name) {
                    match lookup(name) {
                        Some(value) => text.push_str(&value),
                        None => unknown = true,
                    }
                    changed = true;
                    rest = &rest[close + 2..];
                    continue;
                }
            }
        }
        match ch {
            '\'' => {
                quoted = !quoted;
                text.push(ch);
            }
            '_' if !quoted => changed = true,
            _ => text.push(ch),
        }
        rest = &rest[ch.len_utf8()..];
    }
    Substituted {
        text,
        unknown,
        changed,
    }
}

/// The date and time micros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Clock {
    /// `MM/DD/YY`
    pub(crate) date: String,
    /// `HH:MM:SS`
    pub(crate) time: String,
    /// `YYDDD`, the year and day of the year.
    pub(crate) julian: String,
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn day_of_year(year: u32, month: u32, day: u32) -> u32 {
    const CUMULATIVE: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let index = usize::try_from(month.clamp(1, 12) - 1).unwrap_or(0);
    let leap = u32::from(month > 2 && is_leap_year(year));
    CUMULATIVE[index] + day + leap
}

impl Clock {
    pub(crate) fn at(when: SystemTime) -> Clock {
        // e.g. 2024-03-01T12:34:56Z
        let stamp = humantime::format_rfc3339_seconds(when).to_string();
        let field = |range: std::ops::Range<usize>| -> u32 {
            stamp
                .get(range)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        };
        let (year, month, day) = (field(0..4), field(5..7), field(8..10));
        let time = stamp.get(11..19).unwrap_or("00:00:00").to_string();
        Clock {
            date: format!("{month:02}/{day:02}/{:02}", year % 100),
            time,
            julian: format!("{:02}{:03}", year % 100, day_of_year(year, month, day)),
        }
    }
}

/// The text of the built-in micros which do not depend on the date.
pub(crate) fn builtin(name: &str, qualifier: &str) -> Option<String> {
    match name {
        "$CNC" => Some("_".to_string()),
        "$CPU" => Some("CRAY XMP".to_string()),
        "$MIC" => Some("\"".to_string()),
        "$QUAL" => Some(qualifier.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    fn table(name: &str) -> Option<String> {
        match name {
            "REG" => Some("A1".to_string()),
            "U" => Some("X_Y".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_substitution() {
        let s = substitute(" \"REG\" 5", table);
        assert_eq!(s.text, " A1 5");
        assert!(s.changed);
        assert!(!s.unknown);
    }

    #[test]
    fn test_unknown_micro_is_empty() {
        let s = substitute("X\"NONE\"Y", table);
        assert_eq!(s.text, "XY");
        assert!(s.unknown);
    }

    #[test]
    fn test_underscores() {
        assert_eq!(substitute("A_\"REG\"", table).text, "AA1");
        assert_eq!(substitute("\"U\"", table).text, "X_Y");
        assert_eq!(substitute("'A_B'", table).text, "'A_B'");
    }

    #[test]
    fn test_lone_quote_is_kept() {
        let s = substitute("A\"B C", table);
        assert_eq!(s.text, "A\"B C");
        assert!(!s.changed);
    }

    #[test]
    fn test_clock() {
        // 2024-03-01T12:34:56Z
        let when = UNIX_EPOCH + Duration::from_secs(1_709_296_496);
        let clock = Clock::at(when);
        assert_eq!(clock.date, "03/01/24");
        assert_eq!(clock.time, "12:34:56");
        assert_eq!(clock.julian, "24061");
    }
}
