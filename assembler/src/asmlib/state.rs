use bitflags::bitflags;

/// The radix used for numbers which carry no explicit base prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum NumeralBase {
    #[default]
    Decimal,
    /// Octal in machine instructions, decimal everywhere else.
    Mixed,
    Octal,
}

impl NumeralBase {
    pub(crate) fn radix(self, in_machine_instruction: bool) -> u32 {
        match (self, in_machine_instruction) {
            (NumeralBase::Decimal, _) | (NumeralBase::Mixed, false) => 10,
            (NumeralBase::Octal, _) | (NumeralBase::Mixed, true) => 8,
        }
    }

    pub(crate) fn from_operand(s: &str) -> Option<NumeralBase> {
        match s {
            "D" => Some(NumeralBase::Decimal),
            "M" => Some(NumeralBase::Mixed),
            "O" => Some(NumeralBase::Octal),
            _ => None,
        }
    }
}

#[test]
fn test_numeral_base_default() {
    assert_eq!(NumeralBase::default(), NumeralBase::Decimal);
    assert_eq!(NumeralBase::Mixed.radix(true), 8);
    assert_eq!(NumeralBase::Mixed.radix(false), 10);
}

bitflags! {
    /// Listing control, as set by the `LIST` pseudo-instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct ListFlags: u16 {
        /// Listing is enabled at all.
        const ON = 1 << 0;
        /// List lines edited by micro substitution as edited.
        const ED = 1 << 1;
        /// Include the symbol table at the end of each module.
        const XRF = 1 << 2;
        /// List lines generated by `DUP`.
        const DUP = 1 << 3;
        /// List lines generated by macro expansion.
        const MAC = 1 << 4;
        /// List only those macro lines which generate code or data.
        const MBO = 1 << 5;
        /// List the micro-substituted text alongside the original.
        const MIC = 1 << 6;
        /// Enable warnings about macro definitions.
        const WEM = 1 << 7;
        /// Warn when a macro is redefined (needs `WEM` too).
        const WMR = 1 << 8;
    }
}

impl Default for ListFlags {
    fn default() -> ListFlags {
        ListFlags::ON | ListFlags::ED | ListFlags::XRF | ListFlags::DUP
    }
}

impl ListFlags {
    /// Decode one keyword of a `LIST` operand.  Returns the flag and
    /// whether it is to be set (`MAC`) or cleared (`NOMAC`, and
    /// `OFF` for `ON`).
    pub(crate) fn keyword(kw: &str) -> Option<(ListFlags, bool)> {
        if kw == "OFF" {
            return Some((ListFlags::ON, false));
        }
        let (name, set) = match kw.strip_prefix("NO") {
            Some(rest) if !rest.is_empty() => (rest, false),
            _ => (kw, true),
        };
        ListFlags::from_name(name).map(|flag| (flag, set))
    }
}

#[test]
fn test_list_keywords() {
    assert_eq!(ListFlags::keyword("MAC"), Some((ListFlags::MAC, true)));
    assert_eq!(ListFlags::keyword("NOMAC"), Some((ListFlags::MAC, false)));
    assert_eq!(ListFlags::keyword("OFF"), Some((ListFlags::ON, false)));
    assert_eq!(ListFlags::keyword("ON"), Some((ListFlags::ON, true)));
    assert_eq!(ListFlags::keyword("BOGUS"), None);
    assert!(!ListFlags::default().contains(ListFlags::WEM));
}

/// Source statement format, selected by the `FORMAT` pseudo-instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum SourceFormat {
    /// A `;` outside a character string starts a comment.
    #[default]
    New,
    /// Columns past 72 are ignored.
    Old,
}

impl SourceFormat {
    pub(crate) const OLD_FORMAT_WIDTH: usize = 72;

    pub(crate) fn from_operand(s: &str) -> Option<SourceFormat> {
        match s {
            "NEW" => Some(SourceFormat::New),
            "OLD" => Some(SourceFormat::Old),
            _ => None,
        }
    }
}
