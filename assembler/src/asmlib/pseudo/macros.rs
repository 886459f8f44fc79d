//! Macro definitions and duplicated groups of statements.
use super::super::context::{AsmContext, Capture};
use super::super::diagnostic::ErrorKind;
use super::super::fields::{split_subfields, Fields};
use super::super::scanner::is_identifier;
use super::no_operand;

/// `MACRO` starts a definition; the prototype is the next statement.
pub(super) fn macro_(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    no_operand(ctx, fields);
    ctx.capture = Some(Capture::Prototype);
}

/// `ENDM` or `ENDDUP` which ends no definition.
pub(super) fn stray_end(ctx: &mut AsmContext, _fields: &Fields) {
    ctx.error(ErrorKind::IllegalNesting);
}

/// `name DUP count[,statements]` assembles a group of statements
/// `count` times.  The group is either the next `statements`
/// statements or those up to `name ENDDUP`.
pub(super) fn dup(ctx: &mut AsmContext, fields: &Fields) {
    let name = fields.location.as_str();
    if !name.is_empty() && !is_identifier(name) {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let parts = split_subfields(&fields.operand);
    let (count, statements) = match parts.as_slice() {
        [count] => (*count, None),
        [count, statements] => (*count, Some(*statements)),
        _ => {
            ctx.error(ErrorKind::OperandField);
            return;
        }
    };
    let statements = match statements {
        None => None,
        Some(s) => match ctx.absolute_operand(s) {
            Some(n) => Some(n),
            None => return,
        },
    };
    if statements.is_none() && name.is_empty() {
        // Without a name, the group cannot be ended.
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let count = ctx.absolute_operand(count).unwrap_or(0);
    if statements == Some(0) {
        return;
    }
    ctx.capture = Some(Capture::Dup {
        name: name.to_string(),
        count,
        statements,
        body: Vec::new(),
    });
}
