//! Modules, sections, qualifiers and the location counters.
use tracing::{event, Level};

use base::prelude::{PARCEL_BITS, WORD_BITS};

use super::super::collections::{BoundedStack, StackError};
use super::super::context::AsmContext;
use super::super::diagnostic::{Diagnostic, ErrorKind, WarningKind};
use super::super::emitter::PASS_PARCEL;
use super::super::fields::{split_subfields, unquote, Fields};
use super::super::lexer::Name;
use super::super::module::Module;
use super::super::scanner::is_identifier;
use super::super::section::{Residency, SectionId, SectionType, NOMINAL_SECTION};
use super::super::state::{NumeralBase, SourceFormat};
use super::super::symtab::Pass;
use super::super::value::{AddressKind, Value};
use super::no_operand;

/// Module names are at most this long.
pub(crate) const MAX_MODULE_NAME: usize = 8;

/// `ALIGN` moves to the start of an instruction buffer.
const INSTRUCTION_BUFFER_WORDS: u64 = 32;

/// The most words `BSS` and `BSSZ` may reserve at once.
const MAX_RESERVE_WORDS: u64 = 1 << 22;

/// Save `current` on `stack` and replace it with `new`.
pub(super) fn replace<T: Clone>(
    stack: &mut BoundedStack<T>,
    current: &mut T,
    new: T,
) -> Result<(), StackError> {
    stack.push(current.clone())?;
    *current = new;
    Ok(())
}

/// Restore the setting last saved on `stack`.
pub(super) fn restore<T>(stack: &mut BoundedStack<T>, current: &mut T) -> Result<(), StackError> {
    *current = stack.pop()?;
    Ok(())
}

pub(super) fn report(ctx: &mut AsmContext, outcome: Result<(), StackError>) {
    if let Err(e) = outcome {
        ctx.error(e.into());
    }
}

pub(super) fn ident(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let name = fields.operand.as_str();
    if !is_identifier(name) || name.len() > MAX_MODULE_NAME {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    if ctx.module != 0 {
        ctx.error(ErrorKind::IllegalNesting);
        return;
    }
    match ctx.pass {
        Pass::One => {
            if ctx.modules.iter().skip(1).any(|m| m.name == name) {
                ctx.error(ErrorKind::DoubleDefinition);
                return;
            }
            ctx.modules.push(Module::new(name));
            ctx.module = ctx.modules.len() - 1;
        }
        Pass::Two => {
            // Modules are opened in the same order in both passes.
            let next = ctx.modules_opened + 1;
            if ctx.modules.get(next).is_some_and(|m| m.name == name) {
                ctx.module = next;
            } else {
                ctx.error(ErrorKind::DoubleDefinition);
                return;
            }
        }
    }
    ctx.modules_opened += 1;
    ctx.reset_module_state();
    ctx.frames.clear();
    event!(Level::DEBUG, "module {name} opened in pass {:?}", ctx.pass);
}

pub(super) fn end(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    no_operand(ctx, fields);
    if ctx.module == 0 {
        ctx.error(ErrorKind::IllegalNesting);
        return;
    }
    ctx.close_module();
    ctx.note(Diagnostic::ModuleEnd);
}

pub(super) fn abs(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    no_operand(ctx, fields);
    ctx.current_module_mut().absolute = true;
}

pub(super) fn comment(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    match unquote(&fields.operand) {
        Some(text) => ctx.current_module_mut().comment = text,
        None => ctx.error(ErrorKind::OperandField),
    }
}

pub(super) fn stack(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    if let Some(words) = ctx.absolute_operand(&fields.operand) {
        if ctx.pass == Pass::One {
            let module = ctx.current_module_mut();
            module.stack_size = module.stack_size.saturating_add(words);
        }
    }
}

pub(super) fn start(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let name = fields.operand.as_str();
    if !is_identifier(name) {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    if ctx.pass != Pass::Two {
        return;
    }
    let qualifier = ctx.qualifier.clone();
    let module = ctx.current_module_mut();
    let key = module.symbols.resolve(
        &Name {
            qualifier: None,
            name: name.to_string(),
        },
        &qualifier,
    );
    let usable = module
        .symbols
        .get(&key)
        .is_some_and(|sym| !sym.value.is_undefined() && !sym.value.is_external());
    if usable {
        module.start = Some(key);
    } else {
        ctx.error(ErrorKind::Undefined);
    }
}

/// Select (creating it in pass 1) the section with this name, type and
/// residency.
fn open_section(
    ctx: &mut AsmContext,
    name: &str,
    section_type: SectionType,
    residency: Residency,
) -> Option<SectionId> {
    let found = ctx
        .current_module()
        .find_section(name, section_type, residency);
    let id = match (found, ctx.pass) {
        (Some(id), _) => id,
        (None, Pass::One) => {
            event!(
                Level::TRACE,
                "new section '{name}' ({section_type}, {residency})"
            );
            ctx.current_module_mut()
                .add_section(name, section_type, residency)
        }
        (None, Pass::Two) => {
            ctx.error(ErrorKind::OperandField);
            return None;
        }
    };
    if ctx.settings.no_section_stack {
        ctx.section = id;
    } else {
        let outcome = replace(&mut ctx.section_stack, &mut ctx.section, id);
        report(ctx, outcome);
    }
    Some(id)
}

fn previous_section(ctx: &mut AsmContext) {
    if ctx.settings.no_section_stack {
        ctx.section = NOMINAL_SECTION;
    } else {
        let outcome = restore(&mut ctx.section_stack, &mut ctx.section);
        report(ctx, outcome);
    }
}

pub(super) fn section(ctx: &mut AsmContext, fields: &Fields) {
    if fields.operand == "*" {
        ctx.ignore_location(&fields.location);
        previous_section(ctx);
        return;
    }
    let mut section_type = SectionType::Mixed;
    let mut residency = Residency::Cm;
    for keyword in split_subfields(&fields.operand) {
        if keyword.is_empty() {
            continue;
        }
        if let Some(t) = SectionType::from_keyword(keyword) {
            section_type = t;
        } else if let Some(r) = Residency::from_keyword(keyword) {
            residency = r;
        } else {
            ctx.error(ErrorKind::OperandField);
            return;
        }
    }
    let name = fields.location.as_str();
    if !name.is_empty() && !is_identifier(name) {
        ctx.error(ErrorKind::LocationField);
        return;
    }
    let Some(id) = open_section(ctx, name, section_type, residency) else {
        return;
    };
    if section_type == SectionType::TaskCom && !name.is_empty() {
        let base = ctx.current_section().base_word();
        let value = Value::address(AddressKind::Word, id, base, ctx.relocatable());
        ctx.define_symbol(name, value, false);
    }
}

fn named_section(ctx: &mut AsmContext, fields: &Fields, section_type: SectionType) {
    ctx.ignore_location(&fields.location);
    let name = fields.operand.as_str();
    if name == "*" {
        previous_section(ctx);
    } else if name.is_empty() || is_identifier(name) {
        open_section(ctx, name, section_type, Residency::Cm);
    } else {
        ctx.error(ErrorKind::OperandField);
    }
}

pub(super) fn block(ctx: &mut AsmContext, fields: &Fields) {
    named_section(ctx, fields, SectionType::Mixed);
}

pub(super) fn common(ctx: &mut AsmContext, fields: &Fields) {
    named_section(ctx, fields, SectionType::Common);
}

pub(super) fn qual(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let name = fields.operand.as_str();
    let outcome = if name == "*" {
        restore(&mut ctx.qualifier_stack, &mut ctx.qualifier)
    } else if name.is_empty() || is_identifier(name) {
        ctx.current_module_mut().symbols.add_qualifier(name);
        replace(&mut ctx.qualifier_stack, &mut ctx.qualifier, name.to_string())
    } else {
        ctx.error(ErrorKind::OperandField);
        return;
    };
    report(ctx, outcome);
}

pub(super) fn base(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let outcome = if fields.operand == "*" {
        restore(&mut ctx.base_stack, &mut ctx.base)
    } else if let Some(base) = NumeralBase::from_operand(&fields.operand) {
        replace(&mut ctx.base_stack, &mut ctx.base, base)
    } else {
        ctx.error(ErrorKind::OperandField);
        return;
    };
    report(ctx, outcome);
}

pub(super) fn format(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let outcome = if fields.operand == "*" {
        restore(&mut ctx.format_stack, &mut ctx.format)
    } else if let Some(format) = SourceFormat::from_operand(&fields.operand) {
        replace(&mut ctx.format_stack, &mut ctx.format, format)
    } else {
        ctx.error(ErrorKind::OperandField);
        return;
    };
    report(ctx, outcome);
}

/// Evaluate the operand of `LOC` or `ORG`: a word address in the
/// current section, or a number.
fn counter_operand(ctx: &mut AsmContext, operand: &str) -> Option<u64> {
    let v = ctx.evaluate_operand(operand)?.value;
    if v.is_undefined() {
        return None;
    }
    if v.is_external() || v.section.is_some_and(|s| s != ctx.section) {
        ctx.error(ErrorKind::RelocatableField);
        return None;
    }
    if v.is_float() {
        ctx.error(ErrorKind::Type);
        return None;
    }
    match v.address_kind() {
        AddressKind::Parcel => {
            if v.numeric % 4 != 0 {
                ctx.warn(WarningKind::AddressCounter);
            }
            Some(v.numeric / 4)
        }
        _ => Some(v.numeric),
    }
}

pub(super) fn loc(ctx: &mut AsmContext, fields: &Fields) {
    ctx.force_word_boundary();
    let Some(word) = counter_operand(ctx, &fields.operand) else {
        return;
    };
    if word < ctx.current_section().location_word() {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    ctx.current_section_mut().set_location_word(word);
    ctx.define_word_label(&fields.location);
}

pub(super) fn org(ctx: &mut AsmContext, fields: &Fields) {
    ctx.force_word_boundary();
    let Some(word) = counter_operand(ctx, &fields.operand) else {
        return;
    };
    if word < ctx.current_section().origin_word() {
        ctx.error(ErrorKind::OperandField);
        return;
    }
    let section = ctx.current_section_mut();
    section.set_origin_word(word);
    section.org_set = true;
    ctx.define_word_label(&fields.location);
}

fn reserve_count(ctx: &mut AsmContext, fields: &Fields) -> Option<u64> {
    ctx.force_word_boundary();
    ctx.define_word_label(&fields.location);
    let words = ctx.absolute_operand(&fields.operand)?;
    if words > MAX_RESERVE_WORDS {
        ctx.error(ErrorKind::FieldWidth);
        return None;
    }
    Some(words)
}

pub(super) fn bss(ctx: &mut AsmContext, fields: &Fields) {
    if let Some(words) = reserve_count(ctx, fields) {
        ctx.reserve_bits(words * u64::from(WORD_BITS));
    }
}

pub(super) fn bssz(ctx: &mut AsmContext, fields: &Fields) {
    if let Some(words) = reserve_count(ctx, fields) {
        for _ in 0..words {
            ctx.emit_bits(WORD_BITS, 0);
        }
    }
}

pub(super) fn align(ctx: &mut AsmContext, fields: &Fields) {
    no_operand(ctx, fields);
    if ctx.current_section().section_type.allows_instructions() {
        ctx.force_parcel_boundary();
        let parcels = INSTRUCTION_BUFFER_WORDS * 4;
        while ctx.current_section().location_parcel() % parcels != 0 {
            ctx.emit_bits(PARCEL_BITS, u64::from(PASS_PARCEL));
        }
    } else {
        ctx.force_word_boundary();
        while ctx.current_section().location_word() % INSTRUCTION_BUFFER_WORDS != 0 {
            ctx.emit_bits(WORD_BITS, 0);
        }
    }
    ctx.define_word_label(&fields.location);
}

pub(super) fn bitw(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let Some(bit) = ctx.absolute_operand(&fields.operand) else {
        return;
    };
    match u32::try_from(bit) {
        Ok(WORD_BITS) => ctx.force_word_boundary(),
        Ok(bit) if bit < WORD_BITS => {
            let bits = ctx.current_section().bits_to_reach(bit);
            if bits > 0 {
                ctx.emit_bits(bits as u32, 0);
            }
        }
        _ => ctx.error(ErrorKind::FieldWidth),
    }
}

pub(super) fn bitp(ctx: &mut AsmContext, fields: &Fields) {
    ctx.ignore_location(&fields.location);
    let Some(bit) = ctx.absolute_operand(&fields.operand) else {
        return;
    };
    match u32::try_from(bit) {
        Ok(PARCEL_BITS) => ctx.force_parcel_boundary(),
        Ok(bit) if bit < PARCEL_BITS => {
            let current = ctx.current_section().parcel_bit();
            let bits = if bit >= current {
                bit - current
            } else {
                PARCEL_BITS - current + bit
            };
            if bits > 0 {
                ctx.emit_bits(bits, 0);
            }
        }
        _ => ctx.error(ErrorKind::FieldWidth),
    }
}
