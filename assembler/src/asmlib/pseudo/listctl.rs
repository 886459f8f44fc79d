//! Listing control.
use super::super::context::AsmContext;
use super::super::diagnostic::ErrorKind;
use super::super::fields::{split_subfields, unquote, Fields};
use super::super::listing::Item;
use super::super::state::ListFlags;
use super::super::symtab::Pass;
use super::layout::{replace, restore, report};
use super::no_operand;

/// `LIST kw,...` saves the listing options and changes them; `LIST *`
/// restores the saved options.
pub(super) fn list(ctx: &mut AsmContext, fields: &Fields) {
    if fields.operand == "*" {
        let outcome = restore(&mut ctx.list_stack, &mut ctx.list);
        report(ctx, outcome);
        return;
    }
    let mut flags = ctx.list | ListFlags::ON;
    for keyword in split_subfields(&fields.operand) {
        match ListFlags::keyword(keyword) {
            Some((flag, true)) => flags.insert(flag),
            Some((flag, false)) => flags.remove(flag),
            None => {
                ctx.error(ErrorKind::OperandField);
                return;
            }
        }
    }
    let outcome = replace(&mut ctx.list_stack, &mut ctx.list, flags);
    report(ctx, outcome);
}

fn heading(ctx: &mut AsmContext, fields: &Fields) -> Option<String> {
    ctx.ignore_location(&fields.location);
    if fields.operand.is_empty() {
        return Some(String::new());
    }
    let text = unquote(&fields.operand);
    if text.is_none() {
        ctx.error(ErrorKind::OperandField);
    }
    text
}

pub(super) fn title(ctx: &mut AsmContext, fields: &Fields) {
    if let Some(text) = heading(ctx, fields) {
        if ctx.pass == Pass::Two {
            ctx.listing.push(Item::Title(text));
        }
    }
}

pub(super) fn subtitle(ctx: &mut AsmContext, fields: &Fields) {
    if let Some(text) = heading(ctx, fields) {
        if ctx.pass == Pass::Two {
            ctx.listing.push(Item::Subtitle(text));
        }
    }
}

/// `SPACE [n]` leaves `n` (default 1) blank lines in the listing.
pub(super) fn space(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let lines = if fields.operand.is_empty() {
        1
    } else {
        match ctx.absolute_operand(&fields.operand) {
            Some(n) => n,
            None => return,
        }
    };
    if ctx.pass == Pass::Two && ctx.list.contains(ListFlags::ON) {
        ctx.listing.push(Item::Space(lines));
    }
}

pub(super) fn eject(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    no_operand(ctx, fields);
    if ctx.pass == Pass::Two && ctx.list.contains(ListFlags::ON) {
        ctx.listing.push(Item::Eject);
    }
}

/// `TEXT` and `ENDTEXT` delimit text kept out of the listing by some
/// assemblers.  Here, the text is listed as usual.
pub(super) fn text(_ctx: &mut AsmContext, _fields: &Fields) {}
