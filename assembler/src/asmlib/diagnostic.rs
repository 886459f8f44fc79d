//! Statement diagnostics.
//!
//! Problems in the program being assembled are registered against the
//! statement in which they are found.  They never stop the assembler;
//! the statement is marked (in the listing gutter) and assembly goes
//! on.  Registration is idempotent within a statement.
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    DataItem,
    DoubleDefinition,
    IllegalNesting,
    TooManyEntries,
    InstructionPlacement,
    LocationField,
    RelocatableField,
    OperandField,
    Programmer,
    ResultField,
    Syntax,
    Type,
    Undefined,
    FieldWidth,
    Expression,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::DataItem,
        ErrorKind::DoubleDefinition,
        ErrorKind::IllegalNesting,
        ErrorKind::TooManyEntries,
        ErrorKind::InstructionPlacement,
        ErrorKind::LocationField,
        ErrorKind::RelocatableField,
        ErrorKind::OperandField,
        ErrorKind::Programmer,
        ErrorKind::ResultField,
        ErrorKind::Syntax,
        ErrorKind::Type,
        ErrorKind::Undefined,
        ErrorKind::FieldWidth,
        ErrorKind::Expression,
    ];

    #[must_use]
    pub fn indicator(self) -> char {
        match self {
            ErrorKind::DataItem => 'C',
            ErrorKind::DoubleDefinition => 'D',
            ErrorKind::IllegalNesting => 'N',
            ErrorKind::TooManyEntries => 'M',
            ErrorKind::InstructionPlacement => 'I',
            ErrorKind::LocationField => 'L',
            ErrorKind::RelocatableField => 'R',
            ErrorKind::OperandField => 'O',
            ErrorKind::Programmer => 'P',
            ErrorKind::ResultField => 'F',
            ErrorKind::Syntax => 'S',
            ErrorKind::Type => 'T',
            ErrorKind::Undefined => 'U',
            ErrorKind::FieldWidth => 'W',
            ErrorKind::Expression => 'E',
        }
    }

    /// Look up the error whose listing indicator is `ch`.  The
    /// `ERROR` pseudo-instruction names errors this way.
    #[must_use]
    pub fn from_indicator(ch: char) -> Option<ErrorKind> {
        ErrorKind::ALL.into_iter().find(|k| k.indicator() == ch)
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::DataItem => "invalid data item",
            ErrorKind::DoubleDefinition => "symbol or name is defined more than once",
            ErrorKind::IllegalNesting => "illegal nesting or nesting too deep",
            ErrorKind::TooManyEntries => "too many entries for an internal table",
            ErrorKind::InstructionPlacement => "instruction or data is not allowed in this section",
            ErrorKind::LocationField => "invalid location field",
            ErrorKind::RelocatableField => "invalid use of a relocatable or external value",
            ErrorKind::OperandField => "invalid operand field",
            ErrorKind::Programmer => "error raised by the program",
            ErrorKind::ResultField => "unrecognised or unimplemented result field",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Type => "operation is not valid for this type of value",
            ErrorKind::Undefined => "undefined symbol",
            ErrorKind::FieldWidth => "value does not fit in its field",
            ErrorKind::Expression => "invalid expression",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningKind {
    Programmer,
    IgnoredLocationSymbol,
    BadLocationSymbol,
    ExpressionElement,
    MachineInstruction,
    Truncation,
    UndefinedLocationSymbol,
    MicroSubstitution,
    AddressCounter,
    ExternalDeclaration,
    RedefinedMacro,
}

impl WarningKind {
    pub const ALL: [WarningKind; 11] = [
        WarningKind::Programmer,
        WarningKind::IgnoredLocationSymbol,
        WarningKind::BadLocationSymbol,
        WarningKind::ExpressionElement,
        WarningKind::MachineInstruction,
        WarningKind::Truncation,
        WarningKind::UndefinedLocationSymbol,
        WarningKind::MicroSubstitution,
        WarningKind::AddressCounter,
        WarningKind::ExternalDeclaration,
        WarningKind::RedefinedMacro,
    ];

    #[must_use]
    pub fn indicator(self) -> char {
        match self {
            WarningKind::Programmer => 'p',
            WarningKind::IgnoredLocationSymbol => 'l',
            WarningKind::BadLocationSymbol => 'b',
            WarningKind::ExpressionElement => 'e',
            WarningKind::MachineInstruction => 'm',
            WarningKind::Truncation => 't',
            WarningKind::UndefinedLocationSymbol => 'u',
            WarningKind::MicroSubstitution => 'q',
            WarningKind::AddressCounter => 'a',
            WarningKind::ExternalDeclaration => 'x',
            WarningKind::RedefinedMacro => 'r',
        }
    }

    #[must_use]
    pub fn from_indicator(ch: char) -> Option<WarningKind> {
        WarningKind::ALL.into_iter().find(|k| k.indicator() == ch)
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            WarningKind::Programmer => "warning raised by the program",
            WarningKind::IgnoredLocationSymbol => "location field symbol is ignored",
            WarningKind::BadLocationSymbol => "location field symbol is not valid here",
            WarningKind::ExpressionElement => "mixed address kinds in expression",
            WarningKind::MachineInstruction => "questionable machine instruction",
            WarningKind::Truncation => "source line truncated",
            WarningKind::UndefinedLocationSymbol => "location field symbol is undefined",
            WarningKind::MicroSubstitution => "unknown micro",
            WarningKind::AddressCounter => "address counter is not on the expected boundary",
            WarningKind::ExternalDeclaration => "external declared in an absolute module",
            WarningKind::RedefinedMacro => "macro redefined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Diagnostic {
    Error(ErrorKind),
    Warning(WarningKind),
    /// Informational: the statement closed the current module.
    ModuleEnd,
}

impl Diagnostic {
    #[must_use]
    pub fn indicator(self) -> char {
        match self {
            Diagnostic::Error(e) => e.indicator(),
            Diagnostic::Warning(w) => w.indicator(),
            Diagnostic::ModuleEnd => ' ',
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Diagnostic::Error(e) => e.message(),
            Diagnostic::Warning(w) => w.message(),
            Diagnostic::ModuleEnd => "end of module",
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    #[must_use]
    pub fn is_warning(self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }

    fn bit(self) -> u32 {
        let index = match self {
            Diagnostic::Error(e) => e as u32,
            Diagnostic::Warning(w) => ErrorKind::ALL.len() as u32 + w as u32,
            Diagnostic::ModuleEnd => (ErrorKind::ALL.len() + WarningKind::ALL.len()) as u32,
        };
        1 << index
    }
}

impl From<ErrorKind> for Diagnostic {
    fn from(e: ErrorKind) -> Diagnostic {
        Diagnostic::Error(e)
    }
}

impl From<WarningKind> for Diagnostic {
    fn from(w: WarningKind) -> Diagnostic {
        Diagnostic::Warning(w)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Error(_) => write!(f, "error {}: {}", self.indicator(), self.message()),
            Diagnostic::Warning(_) => {
                write!(f, "warning {}: {}", self.indicator(), self.message())
            }
            Diagnostic::ModuleEnd => f.write_str(self.message()),
        }
    }
}

/// The set of diagnostics raised by one statement (or, accumulated,
/// by a module or a whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSet(u32);

impl DiagnosticSet {
    /// Add `d`; returns true if it was not already present.
    pub fn insert(&mut self, d: Diagnostic) -> bool {
        let bit = d.bit();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    #[must_use]
    pub fn contains(&self, d: Diagnostic) -> bool {
        self.0 & d.bit() != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn union(&mut self, other: DiagnosticSet) {
        self.0 |= other.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = Diagnostic> + '_ {
        ErrorKind::ALL
            .into_iter()
            .map(Diagnostic::Error)
            .chain(WarningKind::ALL.into_iter().map(Diagnostic::Warning))
            .chain(std::iter::once(Diagnostic::ModuleEnd))
            .filter(|d| self.contains(*d))
    }

    /// The listing gutter for a statement: the indicators of its
    /// errors and warnings.
    #[must_use]
    pub fn indicators(&self) -> String {
        self.iter()
            .filter(|d| *d != Diagnostic::ModuleEnd)
            .map(Diagnostic::indicator)
            .collect()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.iter().any(Diagnostic::is_error)
    }
}

/// Error and warning counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub errors: usize,
    pub warnings: usize,
    pub seen: DiagnosticSet,
}

impl Tally {
    /// Count the diagnostics of one statement.
    pub fn add_statement(&mut self, statement: &DiagnosticSet) {
        for d in statement.iter() {
            match d {
                Diagnostic::Error(_) => self.errors += 1,
                Diagnostic::Warning(_) => self.warnings += 1,
                Diagnostic::ModuleEnd => (),
            }
        }
        self.seen.union(*statement);
    }

    #[must_use]
    pub fn saw(&self, d: impl Into<Diagnostic>) -> bool {
        self.seen.contains(d.into())
    }

    /// Assembly fails when there are errors, or when warnings are
    /// fatal and there are warnings.
    #[must_use]
    pub fn failed(&self, warnings_fatal: bool) -> bool {
        self.errors > 0 || (warnings_fatal && self.warnings > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_idempotent() {
        let mut set = DiagnosticSet::default();
        assert!(set.insert(ErrorKind::Undefined.into()));
        assert!(!set.insert(ErrorKind::Undefined.into()));
        assert!(set.insert(WarningKind::Truncation.into()));
        let mut tally = Tally::default();
        tally.add_statement(&set);
        assert_eq!(tally.errors, 1);
        assert_eq!(tally.warnings, 1);
        assert!(tally.saw(ErrorKind::Undefined));
        assert!(!tally.saw(ErrorKind::Syntax));
    }

    #[test]
    fn test_indicators_are_distinct() {
        let mut seen = std::collections::BTreeSet::new();
        for e in ErrorKind::ALL {
            assert!(seen.insert(e.indicator()), "duplicate indicator for {e:?}");
            assert_eq!(ErrorKind::from_indicator(e.indicator()), Some(e));
        }
        for w in WarningKind::ALL {
            assert!(seen.insert(w.indicator()), "duplicate indicator for {w:?}");
            assert_eq!(WarningKind::from_indicator(w.indicator()), Some(w));
        }
    }

    #[test]
    fn test_gutter() {
        let mut set = DiagnosticSet::default();
        set.insert(WarningKind::ExpressionElement.into());
        set.insert(ErrorKind::OperandField.into());
        set.insert(Diagnostic::ModuleEnd);
        assert_eq!(set.indicators(), "Oe");
        assert!(set.has_errors());
    }

    #[test]
    fn test_warnings_fatal() {
        let mut set = DiagnosticSet::default();
        set.insert(WarningKind::RedefinedMacro.into());
        let mut tally = Tally::default();
        tally.add_statement(&set);
        assert!(!tally.failed(false));
        assert!(tally.failed(true));
    }
}
