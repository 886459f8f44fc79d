//! Data generation: `CON`, `DATA` and `VWD`.
use base::prelude::{f64_to_cray, fits_field, pack_bytes, WORD_BITS};

use super::super::context::AsmContext;
use super::super::diagnostic::{ErrorKind, WarningKind};
use super::super::expr::Expr;
use super::super::fields::{split_subfields, Fields};
use super::super::value::Value;

/// Data cannot be placed in sections which are only reserved.
fn data_allowed(ctx: &mut AsmContext) -> bool {
    let allowed = ctx.current_section().section_type.allows_image();
    if !allowed {
        ctx.error(ErrorKind::InstructionPlacement);
    }
    allowed
}

/// Floating-point values are stored in the machine's format.
fn storable(ctx: &mut AsmContext, value: Value) -> Value {
    if !value.is_float() {
        return value;
    }
    match f64_to_cray(value.as_f64()) {
        Ok(word) => Value::absolute(word),
        Err(_) => {
            ctx.error(ErrorKind::Type);
            Value::absolute(0)
        }
    }
}

fn emit_expression_word(ctx: &mut AsmContext, expr: &Expr) {
    let value = ctx
        .evaluate_expr(expr)
        .map_or_else(Value::undefined, |ev| ev.value);
    let value = storable(ctx, value);
    ctx.emit_field(WORD_BITS, &value);
}

pub(super) fn con(ctx: &mut AsmContext, fields: &Fields) {
    if !data_allowed(ctx) {
        return;
    }
    ctx.force_word_boundary();
    ctx.define_word_label(&fields.location);
    for item in split_subfields(&fields.operand) {
        match ctx.parse_operand(item) {
            Some(expr) => emit_expression_word(ctx, &expr),
            None => ctx.emit_word(0),
        }
    }
}

pub(super) fn data(ctx: &mut AsmContext, fields: &Fields) {
    if !data_allowed(ctx) {
        return;
    }
    ctx.force_word_boundary();
    ctx.define_word_label(&fields.location);
    for item in split_subfields(&fields.operand) {
        match ctx.parse_operand(item) {
            Some(Expr::Str(s)) => {
                for word in pack_bytes(&s.bytes, s.field_chars(), s.justification) {
                    ctx.emit_word(word);
                }
            }
            Some(expr) => emit_expression_word(ctx, &expr),
            None => ctx.emit_word(0),
        }
    }
}

/// `VWD width/value,...` packs values into fields of the given widths,
/// without regard to word boundaries.
pub(super) fn vwd(ctx: &mut AsmContext, fields: &Fields) {
    if !data_allowed(ctx) {
        return;
    }
    let section = ctx.current_section();
    let (word_bit, parcel_bit) = (section.word_bit(), section.parcel_bit());
    if word_bit == 0 {
        ctx.define_word_label(&fields.location);
    } else if parcel_bit == 0 {
        ctx.define_parcel_label(&fields.location);
    } else if !fields.location.is_empty() {
        ctx.warn(WarningKind::BadLocationSymbol);
    }
    for item in split_subfields(&fields.operand) {
        let Some((width, expr)) = item.split_once('/') else {
            ctx.error(ErrorKind::DataItem);
            continue;
        };
        let Some(width) = ctx.absolute_operand(width) else {
            continue;
        };
        let Ok(width) = u32::try_from(width) else {
            ctx.error(ErrorKind::FieldWidth);
            continue;
        };
        if width > WORD_BITS {
            ctx.error(ErrorKind::FieldWidth);
            continue;
        }
        if expr.is_empty() {
            ctx.error(ErrorKind::DataItem);
            continue;
        }
        let value = ctx
            .evaluate_operand(expr)
            .map_or_else(Value::undefined, |ev| ev.value);
        let value = storable(ctx, value);
        if value.is_constant() && !fits_field(value.numeric, width) {
            ctx.warn(WarningKind::Truncation);
        }
        if width > 0 {
            ctx.emit_field(width, &value);
        }
    }
}
