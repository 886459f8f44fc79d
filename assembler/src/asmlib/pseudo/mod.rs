//! Pseudo-instructions.
//!
//! Each pseudo-instruction is a function of the assembly context and
//! the fields of the statement.  The handlers are grouped by what
//! they act on.
use super::context::AsmContext;
use super::diagnostic::ErrorKind;
use super::fields::Fields;

mod conditional;
mod data;
mod layout;
mod listctl;
mod macros;
mod symbols;

pub(crate) type Handler = fn(&mut AsmContext, &Fields);

/// Find the handler for the pseudo-instruction `name`.
pub(crate) fn lookup(name: &str) -> Option<Handler> {
    let handler: Handler = match name {
        "IDENT" => layout::ident,
        "END" => layout::end,
        "ABS" => layout::abs,
        "COMMENT" => layout::comment,
        "STACK" => layout::stack,
        "START" => layout::start,
        "SECTION" => layout::section,
        "BLOCK" => layout::block,
        "COMMON" => layout::common,
        "QUAL" => layout::qual,
        "BASE" => layout::base,
        "FORMAT" => layout::format,
        "LOC" => layout::loc,
        "ORG" => layout::org,
        "BSS" => layout::bss,
        "BSSZ" => layout::bssz,
        "ALIGN" => layout::align,
        "BITW" => layout::bitw,
        "BITP" => layout::bitp,
        "EQU" | "=" => symbols::equ,
        "SET" => symbols::set,
        "MICSIZE" => symbols::micsize,
        "EXT" => symbols::ext,
        "ENTRY" => symbols::entry,
        "MICRO" => symbols::micro,
        "DECMIC" => symbols::decmic,
        "OCTMIC" => symbols::octmic,
        "OPSYN" => symbols::opsyn,
        "DATA" => data::data,
        "CON" => data::con,
        "VWD" => data::vwd,
        "IFA" => conditional::ifa,
        "IFC" => conditional::ifc,
        "IFE" => conditional::ife,
        "ELSE" => conditional::else_,
        "ENDIF" => conditional::endif,
        "SKIP" => conditional::skip,
        "ERRIF" => conditional::errif,
        "ERROR" => conditional::error,
        "LIST" => listctl::list,
        "TITLE" => listctl::title,
        "SUBTITLE" => listctl::subtitle,
        "SPACE" => listctl::space,
        "EJECT" => listctl::eject,
        "TEXT" | "ENDTEXT" => listctl::text,
        "MACRO" => macros::macro_,
        "ENDM" | "ENDDUP" => macros::stray_end,
        "DUP" => macros::dup,
        "LOCAL" | "MODULE" | "OPDEF" | "REP" | "ECHO" | "STOPDUP" => unimplemented_pseudo,
        _ => {
            return None;
        }
    };
    Some(handler)
}

fn unimplemented_pseudo(ctx: &mut AsmContext, _fields: &Fields) {
    ctx.error(ErrorKind::ResultField);
}

/// Require an empty operand field.
fn no_operand(ctx: &mut AsmContext, fields: &Fields) {
    if !fields.operand.is_empty() {
        ctx.error(ErrorKind::OperandField);
    }
}

/// Names which an operand field lists, such as `EXT A,B,C`.  Returns
/// `None` (having registered the error) when any is not a valid
/// identifier.
fn name_list<'f>(ctx: &mut AsmContext, fields: &'f Fields) -> Option<Vec<&'f str>> {
    let names = super::fields::split_subfields(&fields.operand);
    if names.is_empty() || !names.iter().all(|n| super::scanner::is_identifier(n)) {
        ctx.error(ErrorKind::OperandField);
        return None;
    }
    Some(names)
}

#[cfg(test)]
mod tests;
