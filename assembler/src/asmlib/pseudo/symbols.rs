//! Symbols, externals, entry points, micros and synonyms.
use super::super::context::AsmContext;
use super::super::diagnostic::{ErrorKind, WarningKind};
use super::super::fields::{split_subfields, unquote, Fields};
use super::super::scanner::is_identifier;
use super::super::value::Value;
use super::name_list;

fn define_value(ctx: &mut AsmContext, fields: &Fields, redefinable: bool) {
    if fields.location.is_empty() {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let Some(ev) = ctx.evaluate_operand(&fields.operand) else {
        return;
    };
    ctx.statement.value = Some(ev.value.to_string());
    ctx.define_symbol(&fields.location, ev.value, redefinable);
}

pub(super) fn equ(ctx: &mut AsmContext, fields: &Fields) {
    define_value(ctx, fields, false);
}

pub(super) fn set(ctx: &mut AsmContext, fields: &Fields) {
    define_value(ctx, fields, true);
}

/// `sym MICSIZE name` sets `sym` to the length of the micro `name`.
pub(super) fn micsize(ctx: &mut AsmContext, fields: &Fields) {
    if fields.location.is_empty() {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    if !is_identifier(&fields.operand) {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    let size = match ctx.find_micro(&fields.operand) {
        Some(text) => text.chars().count() as u64,
        None => {
            ctx.warn(WarningKind::MicroSubstitution);
            0
        }
    };
    let value = Value::absolute(size);
    ctx.statement.value = Some(value.to_string());
    ctx.define_symbol(&fields.location, value, true);
}

pub(super) fn ext(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let Some(names) = name_list(ctx, fields) else {
        return;
    };
    if ctx.current_module().absolute {
        ctx.warn(WarningKind::ExternalDeclaration);
    }
    for name in names {
        let key = ctx.key(name);
        let module = ctx.current_module_mut();
        let index = module
            .externals
            .iter()
            .position(|k| *k == key)
            .unwrap_or(module.externals.len());
        match module.symbols.make_external(&key, index) {
            Ok(()) => {
                module.add_external(&key);
            }
            Err(kind) => ctx.error(kind),
        }
    }
}

pub(super) fn entry(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let Some(names) = name_list(ctx, fields) else {
        return;
    };
    for name in names {
        let key = ctx.key(name);
        let module = ctx.current_module_mut();
        module.symbols.mark_entry(&key);
        module.add_entry(&key);
    }
}

/// `name MICRO 'text'[,count[,start]]` defines a micro as `count`
/// characters of `text` from (1-based) character `start`.  With an
/// empty operand field the micro is removed.
pub(super) fn micro(ctx: &mut AsmContext, fields: &Fields) {
    let name = fields.location.as_str();
    if !is_identifier(name) {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let parts = split_subfields(&fields.operand);
    let Some(first) = parts.first() else {
        ctx.current_module_mut().micros.remove(name);
        return;
    };
    let Some(text) = unquote(first) else {
        ctx.error(ErrorKind::OperandField);
        return;
    };
    let chars: Vec<char> = text.chars().collect();
    let mut count = chars.len() as u64;
    let mut start = 1;
    if let Some(s) = parts.get(1).filter(|s| !s.is_empty()) {
        let Some(n) = ctx.absolute_operand(s) else {
            return;
        };
        count = n;
    }
    if let Some(s) = parts.get(2).filter(|s| !s.is_empty()) {
        let Some(n) = ctx.absolute_operand(s) else {
            return;
        };
        start = n;
    }
    if start == 0 || parts.len() > 3 {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    let selected: String = chars
        .iter()
        .skip(usize::try_from(start - 1).unwrap_or(usize::MAX))
        .take(usize::try_from(count).unwrap_or(usize::MAX))
        .collect();
    ctx.current_module_mut()
        .micros
        .insert(name.to_string(), selected);
}

/// Define a micro holding a number.  With a width, the number is
/// padded on the left with zeros to that many characters.
fn numeric_micro(ctx: &mut AsmContext, fields: &Fields, render: fn(&Value) -> String) {
    let name = fields.location.as_str();
    if !is_identifier(name) {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let parts = split_subfields(&fields.operand);
    let (expr, width) = match parts.as_slice() {
        [expr] => (*expr, None),
        [expr, width] => (*expr, Some(*width)),
        _ => {
            ctx.error(ErrorKind::OperandField);
            return;
        }
    };
    let Some(ev) = ctx.evaluate_operand(expr) else {
        return;
    };
    if ev.value.is_relocatable() || ev.value.is_external() {
        ctx.error(ErrorKind::RelocatableField);
        return;
    }
    let mut text = render(&ev.value);
    if let Some(width) = width {
        let Some(width) = ctx.absolute_operand(width) else {
            return;
        };
        let width = usize::try_from(width).unwrap_or(usize::MAX);
        if text.len() > width {
            ctx.error(ErrorKind::FieldWidth);
        } else {
            let (sign, digits) = match text.strip_prefix('-') {
                Some(digits) => ("-", digits),
                None => ("", text.as_str()),
            };
            text = format!("{sign}{digits:0>pad$}", pad = width - sign.len());
        }
    }
    ctx.current_module_mut().micros.insert(name.to_string(), text);
}

pub(super) fn decmic(ctx: &mut AsmContext, fields: &Fields) {
    numeric_micro(ctx, fields, |v| v.as_i64().to_string());
}

pub(super) fn octmic(ctx: &mut AsmContext, fields: &Fields) {
    numeric_micro(ctx, fields, |v| format!("{:o}", v.numeric));
}

/// `new OPSYN old` makes `new` another name for the instruction,
/// pseudo-instruction or macro `old`.
pub(super) fn opsyn(ctx: &mut AsmContext, fields: &Fields) {
    let new = fields.location.as_str();
    if !is_identifier(new) {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let old = fields.operand.as_str();
    if old.is_empty() {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    let target = ctx.find_opsyn(old).unwrap_or_else(|| old.to_string());
    if target != new {
        ctx.current_module_mut()
            .opsyns
            .insert(new.to_string(), target);
    }
}
