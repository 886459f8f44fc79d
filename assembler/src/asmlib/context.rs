//! The state of an assembly in progress.
//!
//! Everything a statement may consult or change lives in
//! [`AsmContext`]: the modules and the cursors selecting the current
//! module, section and qualifier, the stacks which `*` operands pop,
//! the macro call stack, and the diagnostics of the statement being
//! assembled.
use tracing::{event, Level};

use base::prelude::{f64_to_cray, pack_bytes};

use super::collections::BoundedStack;
use super::diagnostic::{Diagnostic, DiagnosticSet, ErrorKind, Tally, WarningKind};
use super::eval::{evaluate, EvalContext, Evaluation, SymbolRef};
use super::expr::{parse_complete, Expr};
use super::lexer::{tokenize, Counter, Name, TokenKind};
use super::listing::Listing;
use super::macros::{Frame, Prototype};
use super::micro::Clock;
use super::module::Module;
use super::object::ObjectModule;
use super::scanner::is_identifier;
use super::section::{Section, SectionId, LITERALS_SECTION, NOMINAL_SECTION};
use super::state::{ListFlags, NumeralBase, SourceFormat};
use super::symtab::{Pass, SymbolKey};
use super::types::LineNumber;
use super::value::{AddressKind, Attributes, Value};

/// Depth of the stacks popped by `QUAL *`, `SECTION *` and so on.
pub(crate) const STACK_DEPTH: usize = 16;
/// Depth of nested macro calls and `DUP` groups.
pub(crate) const CALL_DEPTH: usize = 64;

/// Settings which hold for the whole assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Settings {
    /// Accept lower case mnemonics and register names.
    pub(crate) flexible: bool,
    /// `SECTION *` selects the nominal section instead of popping.
    pub(crate) no_section_stack: bool,
    /// Symbols still undefined after pass 1 become externals.
    pub(crate) implicit_externals: bool,
}

/// Lines are being skipped because of a false condition (or `SKIP`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Skip {
    /// Skip this many more statements.
    Statements(u64),
    /// Skip up to the statement with this location field.
    UntilLocation(String),
}

/// Lines which are being collected rather than assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Capture {
    /// `MACRO` was seen; the next statement is the prototype.
    Prototype,
    Macro {
        prototype: Prototype,
        body: Vec<String>,
    },
    Dup {
        /// The location field of the `DUP`, which its `ENDDUP` repeats.
        name: String,
        count: u64,
        /// When given, the number of statements in the group;
        /// otherwise the group ends at `ENDDUP`.
        statements: Option<u64>,
        body: Vec<String>,
    },
}

/// What is known about the statement being assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Statement {
    pub(crate) line: LineNumber,
    pub(crate) diagnostics: DiagnosticSet,
    /// The address shown against the statement in the listing.
    pub(crate) address: Option<String>,
    /// The value shown for a symbol-defining statement.
    pub(crate) value: Option<String>,
    /// Octal renderings of the code and data generated.
    pub(crate) generated: Vec<String>,
}

/// A statement which drew diagnostics in pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub line: LineNumber,
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Format an address for the listing: word addresses in octal,
/// parcel addresses with a parcel letter `a` to `d`.
pub(crate) fn format_address(value: u64, kind: AddressKind) -> String {
    match kind {
        AddressKind::Parcel => {
            let letter = char::from(b'a' + (value % 4) as u8);
            format!("{:o}{letter}", value / 4)
        }
        _ => format!("{value:o}"),
    }
}

#[derive(Debug)]
pub(crate) struct AsmContext {
    pub(crate) settings: Settings,
    pub(crate) pass: Pass,
    /// Module 0 is the anonymous module, current outside
    /// `IDENT`...`END`.
    pub(crate) modules: Vec<Module>,
    pub(crate) module: usize,
    /// How many `IDENT`s have opened a module in this pass.
    pub(crate) modules_opened: usize,
    pub(crate) section: SectionId,
    pub(crate) section_stack: BoundedStack<SectionId>,
    pub(crate) qualifier: String,
    pub(crate) qualifier_stack: BoundedStack<String>,
    pub(crate) base: NumeralBase,
    pub(crate) base_stack: BoundedStack<NumeralBase>,
    pub(crate) list: ListFlags,
    pub(crate) list_stack: BoundedStack<ListFlags>,
    pub(crate) format: SourceFormat,
    pub(crate) format_stack: BoundedStack<SourceFormat>,
    pub(crate) frames: BoundedStack<Frame>,
    pub(crate) skip: Option<Skip>,
    pub(crate) capture: Option<Capture>,
    pub(crate) statement: Statement,
    /// A machine instruction is being assembled (for `BASE M`).
    pub(crate) in_instruction: bool,
    pub(crate) tally: Tally,
    pub(crate) clock: Clock,
    pub(crate) objects: Vec<ObjectModule>,
    pub(crate) listing: Listing,
    pub(crate) reports: Vec<Report>,
}

impl AsmContext {
    pub(crate) fn new(settings: Settings, clock: Clock) -> AsmContext {
        AsmContext {
            settings,
            pass: Pass::One,
            modules: vec![Module::new("")],
            module: 0,
            modules_opened: 0,
            section: NOMINAL_SECTION,
            section_stack: BoundedStack::new(STACK_DEPTH),
            qualifier: String::new(),
            qualifier_stack: BoundedStack::new(STACK_DEPTH),
            base: NumeralBase::default(),
            base_stack: BoundedStack::new(STACK_DEPTH),
            list: ListFlags::default(),
            list_stack: BoundedStack::new(STACK_DEPTH),
            format: SourceFormat::default(),
            format_stack: BoundedStack::new(STACK_DEPTH),
            frames: BoundedStack::new(CALL_DEPTH),
            skip: None,
            capture: None,
            statement: Statement::default(),
            in_instruction: false,
            tally: Tally::default(),
            clock,
            objects: Vec::new(),
            listing: Listing::default(),
            reports: Vec::new(),
        }
    }

    /// Return to the anonymous module with every stack empty, as at
    /// the start of a pass.
    pub(crate) fn reset_cursors(&mut self) {
        self.module = 0;
        self.modules_opened = 0;
        self.reset_module_state();
        self.list = ListFlags::default();
        self.list_stack.clear();
        self.format = SourceFormat::default();
        self.format_stack.clear();
        self.frames.clear();
        self.skip = None;
        self.capture = None;
    }

    /// The state `IDENT` starts a module with.
    pub(crate) fn reset_module_state(&mut self) {
        self.section = NOMINAL_SECTION;
        self.section_stack.clear();
        self.qualifier.clear();
        self.qualifier_stack.clear();
        self.base = NumeralBase::default();
        self.base_stack.clear();
    }

    pub(crate) fn current_module(&self) -> &Module {
        &self.modules[self.module]
    }

    pub(crate) fn current_module_mut(&mut self) -> &mut Module {
        &mut self.modules[self.module]
    }

    pub(crate) fn current_section(&self) -> &Section {
        self.current_module().section(self.section)
    }

    pub(crate) fn current_section_mut(&mut self) -> &mut Section {
        let id = self.section;
        self.current_module_mut().section_mut(id)
    }

    /// Addresses in the current module are relocatable.
    pub(crate) fn relocatable(&self) -> bool {
        !self.current_module().absolute
    }

    pub(crate) fn error(&mut self, kind: ErrorKind) {
        self.statement.diagnostics.insert(Diagnostic::Error(kind));
    }

    pub(crate) fn warn(&mut self, kind: WarningKind) {
        self.statement.diagnostics.insert(Diagnostic::Warning(kind));
    }

    pub(crate) fn note(&mut self, d: Diagnostic) {
        self.statement.diagnostics.insert(d);
    }

    pub(crate) fn key(&self, name: &str) -> SymbolKey {
        SymbolKey::new(&self.qualifier, name)
    }

    /// Look up a macro for a call in this pass.  Macros defined
    /// outside any module are available inside every module.
    pub(crate) fn find_macro(&self, name: &str) -> Option<&super::macros::MacroDef> {
        [self.module, 0]
            .into_iter()
            .filter_map(|m| self.modules[m].macros.get(name))
            .find(|def| def.creation_pass == self.pass)
    }

    pub(crate) fn find_micro(&self, name: &str) -> Option<String> {
        if let Some(text) = [self.module, 0]
            .into_iter()
            .find_map(|m| self.modules[m].micros.get(name))
        {
            return Some(text.clone());
        }
        match name {
            "$DATE" => Some(self.clock.date.clone()),
            "$TIME" => Some(self.clock.time.clone()),
            "$JDATE" => Some(self.clock.julian.clone()),
            _ => super::micro::builtin(name, &self.qualifier),
        }
    }

    /// Tokenize and parse an operand as a single expression.
    pub(crate) fn parse_operand(&mut self, text: &str) -> Option<Expr> {
        let tokens = tokenize(text, self.settings.flexible);
        if tokens
            .iter()
            .any(|t| matches!(t.kind, TokenKind::Error(_)))
        {
            self.error(ErrorKind::Syntax);
            return None;
        }
        match parse_complete(&tokens, text) {
            Ok(expr) => Some(expr),
            Err(e) => {
                event!(Level::DEBUG, "line {}: {text}: {e}", self.statement.line);
                self.error(ErrorKind::Syntax);
                None
            }
        }
    }

    /// Evaluate an expression, registering its warnings and any
    /// error.  An undefined result registers `Undefined` but is still
    /// returned.
    pub(crate) fn evaluate_expr(&mut self, expr: &Expr) -> Option<Evaluation> {
        match evaluate(expr, self) {
            Ok(ev) => {
                for w in &ev.warnings {
                    self.warn(*w);
                }
                if ev.value.is_undefined() {
                    self.error(ErrorKind::Undefined);
                }
                Some(ev)
            }
            Err(kind) => {
                self.error(kind);
                None
            }
        }
    }

    pub(crate) fn evaluate_operand(&mut self, text: &str) -> Option<Evaluation> {
        let expr = self.parse_operand(text)?;
        self.evaluate_expr(&expr)
    }

    /// Evaluate an operand which must be a known, non-relocatable
    /// integer (a count, a width or a position).
    pub(crate) fn absolute_operand(&mut self, text: &str) -> Option<u64> {
        let ev = self.evaluate_operand(text)?;
        let v = ev.value;
        if v.is_undefined() {
            return None;
        }
        if v.is_relocatable() || v.is_external() {
            self.error(ErrorKind::RelocatableField);
            return None;
        }
        if v.is_float() {
            self.error(ErrorKind::Type);
            return None;
        }
        Some(v.numeric)
    }

    /// Define the symbol named in a location field.  An empty
    /// location field defines nothing.
    pub(crate) fn define_symbol(&mut self, location: &str, value: Value, redefinable: bool) {
        if location.is_empty() {
            return;
        }
        if !is_identifier(location) {
            self.error(ErrorKind::LocationField);
            return;
        }
        let key = self.key(location);
        let pass = self.pass;
        let module = self.current_module_mut();
        if let Err(kind) = module.symbols.define(&key, value, redefinable, pass) {
            self.error(kind);
        }
    }

    /// Define a location field symbol as the current word address
    /// (the location counter must already be on a word boundary).
    pub(crate) fn define_word_label(&mut self, location: &str) {
        let section = self.current_section();
        let value = Value::address(
            AddressKind::Word,
            self.section,
            section.location_word(),
            self.relocatable(),
        );
        self.statement.address = Some(format_address(value.numeric, AddressKind::Word));
        self.define_symbol(location, value, false);
    }

    /// Define a location field symbol as the current parcel address.
    pub(crate) fn define_parcel_label(&mut self, location: &str) {
        let section = self.current_section();
        let value = Value::address(
            AddressKind::Parcel,
            self.section,
            section.location_parcel(),
            self.relocatable(),
        );
        self.statement.address = Some(format_address(value.numeric, AddressKind::Parcel));
        self.define_symbol(location, value, false);
    }

    /// Complain about a location field on a statement which does not
    /// use one.
    pub(crate) fn ignore_location(&mut self, location: &str) {
        if !location.is_empty() {
            self.warn(WarningKind::IgnoredLocationSymbol);
        }
    }

    fn literal_words(&mut self, operand: &Expr) -> Result<(Vec<u64>, bool), ErrorKind> {
        if let Expr::Str(s) = operand {
            return Ok((pack_bytes(&s.bytes, s.field_chars(), s.justification), false));
        }
        let ev = evaluate(operand, self)?;
        let v = ev.value;
        if v.is_undefined() {
            return Ok((vec![0], true));
        }
        if v.is_relocatable() || v.is_external() {
            return Err(ErrorKind::RelocatableField);
        }
        let word = if v.is_float() {
            f64_to_cray(v.as_f64()).map_err(|_| ErrorKind::Type)?
        } else {
            v.numeric
        };
        Ok((vec![word], false))
    }
}

impl EvalContext for AsmContext {
    fn symbol(&mut self, name: &Name) -> SymbolRef {
        let pass = self.pass;
        let qualifier = self.qualifier.clone();
        let module = self.current_module_mut();
        let key = module.symbols.resolve(name, &qualifier);
        let value = module.symbols.reference(&key).value;
        let forward = match pass {
            Pass::One => value.is_undefined(),
            Pass::Two => {
                !value.is_external() && !value.attributes.contains(Attributes::DEFINED_P2)
            }
        };
        SymbolRef { value, forward }
    }

    fn counter(&mut self, counter: Counter) -> Value {
        let relocatable = self.relocatable();
        let id = self.section;
        let section = self.current_section();
        match counter {
            Counter::Location => {
                Value::address(AddressKind::Word, id, section.location_word(), relocatable)
            }
            Counter::Parcel => {
                Value::address(AddressKind::Parcel, id, section.location_parcel(), relocatable)
            }
            Counter::Origin => {
                Value::address(AddressKind::Word, id, section.origin_word(), relocatable)
            }
            Counter::Absolute => Value::absolute(section.location_word()),
            Counter::WordBit => Value::absolute(u64::from(section.word_bit())),
            Counter::ParcelBit => Value::absolute(u64::from(section.parcel_bit())),
        }
    }

    fn literal(&mut self, key: &str, operand: &Expr) -> Result<Value, ErrorKind> {
        let (words, undefined) = self.literal_words(operand)?;
        let pass = self.pass;
        let module = self.current_module_mut();
        let offset = module.literals.intern(key, words);
        if undefined && pass == Pass::Two {
            return Err(ErrorKind::Undefined);
        }
        let base = module.section(LITERALS_SECTION).origin_offset;
        let mut value = Value::address(
            AddressKind::Word,
            LITERALS_SECTION,
            base + offset,
            !module.absolute,
        );
        value.attributes.insert(Attributes::LITERAL);
        Ok(value)
    }

    fn radix(&self) -> u32 {
        self.base.radix(self.in_instruction)
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    fn context() -> AsmContext {
        AsmContext::new(Settings::default(), Clock::at(UNIX_EPOCH))
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(0o14, AddressKind::Word), "14");
        assert_eq!(format_address(0o61, AddressKind::Parcel), "14b");
    }

    #[test]
    fn test_symbols_are_qualified() {
        let mut ctx = context();
        ctx.qualifier = "Q".to_string();
        ctx.define_symbol("X", Value::absolute(3), false);
        assert!(ctx.statement.diagnostics.is_empty());
        let ev = ctx.evaluate_operand("X+1").expect("evaluates");
        assert_eq!(ev.value.numeric, 4);
        ctx.qualifier.clear();
        let ev = ctx.evaluate_operand("/Q/X").expect("evaluates");
        assert_eq!(ev.value.numeric, 3);
    }

    #[test]
    fn test_bad_location_field() {
        let mut ctx = context();
        ctx.define_symbol("1X", Value::absolute(3), false);
        assert!(ctx
            .statement
            .diagnostics
            .contains(Diagnostic::Error(ErrorKind::LocationField)));
    }

    #[test]
    fn test_literals_are_pooled() {
        let mut ctx = context();
        let a = ctx.evaluate_operand("=X'FF'").expect("evaluates");
        let b = ctx.evaluate_operand("=X'FF'").expect("evaluates");
        assert_eq!(a.value, b.value);
        assert!(a.value.attributes.contains(Attributes::LITERAL));
        assert_eq!(a.value.section, Some(LITERALS_SECTION));
        assert_eq!(ctx.current_module().literals.size(), 1);
    }

    #[test]
    fn test_counters() {
        let mut ctx = context();
        ctx.current_section_mut().advance(5 * 16);
        assert_eq!(ctx.evaluate_operand("*P").expect("evaluates").value.numeric, 5);
        assert_eq!(ctx.evaluate_operand("*").expect("evaluates").value.numeric, 1);
        assert_eq!(ctx.evaluate_operand("*W").expect("evaluates").value.numeric, 16);
    }

    #[test]
    fn test_undefined_is_registered() {
        let mut ctx = context();
        let ev = ctx.evaluate_operand("NOWHERE").expect("evaluates");
        assert!(ev.value.is_undefined());
        assert!(ev.forward);
        assert!(ctx
            .statement
            .diagnostics
            .contains(Diagnostic::Error(ErrorKind::Undefined)));
    }
}
