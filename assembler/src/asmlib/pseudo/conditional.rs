//! Conditional assembly.
//!
//! A false condition skips either a number of statements or, when
//! no count is given, the statements up to one whose location field
//! repeats the location field of the condition (normally its `ELSE`
//! or `ENDIF`).
use std::cmp::Ordering;

use super::super::context::{AsmContext, Skip};
use super::super::diagnostic::{ErrorKind, WarningKind};
use super::super::fields::{split_subfields, unquote, Fields};
use super::super::lexer::Name;
use super::super::scanner::is_identifier;
use super::super::symtab::Pass;
use super::super::value::{AddressKind, Attributes, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn parse(s: &str) -> Option<Relation> {
        Some(match s {
            "EQ" => Relation::Eq,
            "NE" => Relation::Ne,
            "LT" => Relation::Lt,
            "LE" => Relation::Le,
            "GT" => Relation::Gt,
            "GE" => Relation::Ge,
            _ => {
                return None;
            }
        })
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Relation::Eq => ordering == Ordering::Equal,
            Relation::Ne => ordering != Ordering::Equal,
            Relation::Lt => ordering == Ordering::Less,
            Relation::Le => ordering != Ordering::Greater,
            Relation::Gt => ordering == Ordering::Greater,
            Relation::Ge => ordering != Ordering::Less,
        }
    }
}

fn begin_skip(ctx: &mut AsmContext, location: &str, count: Option<u64>) {
    ctx.skip = match count {
        Some(0) => None,
        Some(n) => Some(Skip::Statements(n)),
        None if !location.is_empty() => Some(Skip::UntilLocation(location.to_string())),
        None => Some(Skip::Statements(1)),
    };
}

/// The optional statement count of a condition.  `Err` means the
/// count was given but is unusable.
fn statement_count(ctx: &mut AsmContext, part: Option<&&str>) -> Result<Option<u64>, ()> {
    match part {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => ctx.absolute_operand(s).map(Some).ok_or(()),
    }
}

/// Check the location field of a condition, and act on the outcome.
fn conclude(ctx: &mut AsmContext, fields: &Fields, condition: bool, count: Option<&&str>) {
    if !fields.location.is_empty() && !is_identifier(&fields.location) {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let Ok(count) = statement_count(ctx, count) else {
        return;
    };
    if !condition {
        begin_skip(ctx, &fields.location, count);
    }
}

fn symbol_value(ctx: &mut AsmContext, name: &str) -> Option<Value> {
    let qualifier = ctx.qualifier.clone();
    let symbols = &ctx.current_module().symbols;
    let key = symbols.resolve(
        &Name {
            qualifier: None,
            name: name.to_string(),
        },
        &qualifier,
    );
    symbols.get(&key).map(|sym| sym.value)
}

/// A symbol counts as defined once its definition has been seen in
/// the current pass.
fn defined_in_pass(value: &Value, pass: Pass) -> bool {
    match pass {
        Pass::One => !value.is_undefined(),
        Pass::Two => value.is_external() || value.attributes.contains(Attributes::DEFINED_P2),
    }
}

fn attribute_holds(ctx: &mut AsmContext, attribute: &str, name: &str) -> Option<bool> {
    let pass = ctx.pass;
    let value = symbol_value(ctx, name);
    let defined = value.filter(|v| defined_in_pass(v, pass));
    Some(match attribute {
        "DEF" => defined.is_some(),
        "SET" => defined.is_some_and(|v| v.attributes.contains(Attributes::REDEFINABLE)),
        "ABS" => defined.is_some_and(|v| !v.is_relocatable() && !v.is_external()),
        "REL" => defined.is_some_and(|v| v.is_relocatable()),
        "EXT" => value.is_some_and(|v| v.is_external()),
        "PA" => defined.is_some_and(|v| v.address_kind() == AddressKind::Parcel),
        "WA" => defined.is_some_and(|v| v.address_kind() == AddressKind::Word),
        "VAL" => defined.is_some_and(|v| v.address_kind() == AddressKind::Value),
        "MIC" => ctx.find_micro(name).is_some(),
        "MAC" => ctx.find_macro(name).is_some(),
        _ => {
            return None;
        }
    })
}

/// `IFA attribute,name[,count]`; a `#` before the attribute negates it.
pub(super) fn ifa(ctx: &mut AsmContext, fields: &Fields) {
    let parts = split_subfields(&fields.operand);
    if !(2..=3).contains(&parts.len()) || !is_identifier(parts[1]) {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    let (negated, attribute) = match parts[0].strip_prefix('#') {
        Some(rest) => (true, rest),
        None => (false, parts[0]),
    };
    let Some(holds) = attribute_holds(ctx, attribute, parts[1]) else {
        ctx.error(ErrorKind::OperandField);
        return;
    };
    conclude(ctx, fields, holds != negated, parts.get(2));
}

/// The text of an `IFC` operand: a quoted string, or bare text.
fn string_operand(s: &str) -> String {
    unquote(s).unwrap_or_else(|| s.to_string())
}

/// `IFC string,relation,string[,count]`
pub(super) fn ifc(ctx: &mut AsmContext, fields: &Fields) {
    let parts = split_subfields(&fields.operand);
    if !(3..=4).contains(&parts.len()) {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    let Some(relation) = Relation::parse(parts[1]) else {
        ctx.error(ErrorKind::OperandField);
        return;
    };
    let ordering = string_operand(parts[0]).cmp(&string_operand(parts[2]));
    conclude(ctx, fields, relation.holds(ordering), parts.get(3));
}

/// Compare two expressions.  `None` when they cannot be compared
/// (the reason has been registered).
///
/// A symbol not yet defined makes the expressions incomparable in
/// both passes, although in pass 2 it has its pass 1 value.
fn compare_values(ctx: &mut AsmContext, left: &str, right: &str) -> Option<Ordering> {
    let left = ctx.evaluate_operand(left)?;
    let right = ctx.evaluate_operand(right)?;
    if left.forward || right.forward {
        ctx.error(ErrorKind::Undefined);
        return None;
    }
    let (a, b) = (left.value, right.value);
    if a.is_undefined() || b.is_undefined() {
        return None;
    }
    if a.is_external() || b.is_external() || (a.section.is_some() && a.section != b.section) {
        ctx.error(ErrorKind::RelocatableField);
        return None;
    }
    if a.is_float() || b.is_float() {
        return a.as_f64().partial_cmp(&b.as_f64());
    }
    Some(a.as_i64().cmp(&b.as_i64()))
}

fn expression_condition(ctx: &mut AsmContext, parts: &[&str]) -> Option<bool> {
    let Some(relation) = Relation::parse(parts[1]) else {
        ctx.error(ErrorKind::OperandField);
        return None;
    };
    Some(compare_values(ctx, parts[0], parts[2]).is_some_and(|o| relation.holds(o)))
}

/// `IFE expression,relation,expression[,count]`
pub(super) fn ife(ctx: &mut AsmContext, fields: &Fields) {
    let parts = split_subfields(&fields.operand);
    if !(3..=4).contains(&parts.len()) {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    if let Some(holds) = expression_condition(ctx, &parts) {
        conclude(ctx, fields, holds, parts.get(3));
    }
}

/// Reached only while assembling: the condition was true, so what
/// follows up to the matching location field is skipped.
pub(super) fn else_(ctx: &mut AsmContext, fields: &Fields) {
    if fields.location.is_empty() {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    super::no_operand(ctx, fields);
    ctx.skip = Some(Skip::UntilLocation(fields.location.clone()));
}

pub(super) fn endif(ctx: &mut AsmContext, fields: &Fields) {
    if fields.location.is_empty() {
        ctx.error(ErrorKind::LocationField);
    }
    super::no_operand(ctx, fields);
}

/// `SKIP [count]` skips unconditionally.
pub(super) fn skip(ctx: &mut AsmContext, fields: &Fields) {
    let parts = split_subfields(&fields.operand);
    if parts.len() > 1 {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    conclude(ctx, fields, false, parts.first());
}

/// `ERRIF expression,relation,expression` raises an error when the
/// relation holds.
pub(super) fn errif(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let parts = split_subfields(&fields.operand);
    if parts.len() != 3 {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    if expression_condition(ctx, &parts) == Some(true) {
        ctx.error(ErrorKind::Programmer);
    }
}

/// `ERROR` registers the diagnostic whose indicator is given in the
/// location field (by default, a programmer error).
pub(super) fn error(ctx: &mut AsmContext, fields: &Fields) {
    super::no_operand(ctx, fields);
    let mut chars = fields.location.chars();
    match (chars.next(), chars.next()) {
        (None, _) => ctx.error(ErrorKind::Programmer),
        (Some(ch), None) => {
            if let Some(kind) = ErrorKind::from_indicator(ch) {
                ctx.error(kind);
            } else if let Some(kind) = WarningKind::from_indicator(ch) {
                ctx.warn(kind);
            } else {
                ctx.error(ErrorKind::LocationField);
            }
        }
        _ => ctx.error(ErrorKind::LocationField),
    }
}
