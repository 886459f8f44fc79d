use std::fmt::{self, Display, Formatter};

use super::diagnostic::Tally;
use super::types::LineNumber;

/// A statement as it appears in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListedLine {
    pub(crate) number: LineNumber,
    pub(crate) indicators: String,
    pub(crate) address: Option<String>,
    pub(crate) value: Option<String>,
    /// Octal renderings of the generated code or data; the first
    /// appears beside the statement, the rest on lines of their own.
    pub(crate) generated: Vec<String>,
    pub(crate) text: String,
    /// The line was generated by a macro call or a `DUP`.
    pub(crate) expansion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Item {
    Line(ListedLine),
    Title(String),
    Subtitle(String),
    Space(u64),
    Eject,
    Symbols {
        module: String,
        /// Qualified name and value.
        symbols: Vec<(String, String)>,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Listing {
    items: Vec<Item>,
    summary: Option<Tally>,
}

impl Listing {
    pub(crate) fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub(crate) fn set_summary(&mut self, tally: Tally) {
        self.summary = Some(tally);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.summary = None;
    }

    #[cfg(test)]
    pub(crate) fn items(&self) -> &[Item] {
        &self.items
    }
}

const FORM_FEED: char = '\u{0c}';
const EMPTY: &str = "";

impl Display for ListedLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let address = self.address.as_deref().unwrap_or(EMPTY);
        let mut generated = self.generated.iter();
        let first = self
            .value
            .as_deref()
            .or_else(|| generated.next().map(String::as_str))
            .unwrap_or(EMPTY);
        let marker = if self.expansion { '+' } else { ' ' };
        writeln!(
            f,
            "{:<4}{:>6}{marker} {address:>8}  {first:<22}  {}",
            self.indicators,
            self.number,
            self.text.trim_end()
        )?;
        for more in generated {
            writeln!(f, "{EMPTY:<4}{EMPTY:>6}  {EMPTY:>8}  {more:<22}")?;
        }
        Ok(())
    }
}

impl Display for Listing {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            match item {
                Item::Line(line) => write!(f, "{line}")?,
                Item::Title(title) => writeln!(f, "{FORM_FEED}{title}")?,
                Item::Subtitle(subtitle) => writeln!(f, "{subtitle}\n")?,
                Item::Space(n) => {
                    for _ in 0..*n {
                        writeln!(f)?;
                    }
                }
                Item::Eject => writeln!(f, "{FORM_FEED}")?,
                Item::Symbols { module, symbols } => {
                    writeln!(f, "\nSymbols of module {module:?}:")?;
                    for (name, value) in symbols {
                        writeln!(f, "  {name:<24} {value}")?;
                    }
                }
            }
        }
        if let Some(tally) = &self.summary {
            writeln!(
                f,
                "\n{} error(s), {} warning(s)",
                tally.errors, tally.warnings
            )?;
            for d in tally.seen.iter() {
                if d.is_error() || d.is_warning() {
                    writeln!(f, "  {d}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{DiagnosticSet, ErrorKind};

    #[test]
    fn test_line_layout() {
        let line = ListedLine {
            number: 12,
            indicators: "U".to_string(),
            address: Some("3b".to_string()),
            value: None,
            generated: vec!["020100 000007".to_string()],
            text: "         A1       LAB".to_string(),
            expansion: false,
        };
        let shown = line.to_string();
        assert!(shown.starts_with("U       12 "));
        assert!(shown.contains("3b  020100 000007"));
        assert!(shown.trim_end().ends_with("A1       LAB"));
    }

    #[test]
    fn test_summary() {
        let mut listing = Listing::default();
        let mut seen = DiagnosticSet::default();
        seen.insert(ErrorKind::Undefined.into());
        let mut tally = Tally::default();
        tally.add_statement(&seen);
        listing.set_summary(tally);
        let shown = listing.to_string();
        assert!(shown.contains("1 error(s), 0 warning(s)"));
        assert!(shown.contains("undefined symbol"));
    }
}
