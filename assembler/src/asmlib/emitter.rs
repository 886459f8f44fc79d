//! Placing instructions and data in the image of the current section.
//!
//! In pass 1 nothing is written, but the counters move exactly as
//! they do in pass 2, so that both passes assign the same addresses.
use base::prelude::{
    format_parcel, gh_i_j_k, gh_i_jk, gh_ijk, mask_right, JKM_BITS, PARCEL_BITS, WORD_BITS,
};

use super::context::AsmContext;
use super::diagnostic::ErrorKind;
use super::object::{EntryKind, ExternalEntry, RelocationEntry};
use super::symtab::Pass;
use super::value::Value;

/// The one-parcel no-operation instruction.
pub(crate) const PASS_PARCEL: u16 = 0o001_000;

impl AsmContext {
    /// Place the low `width` bits of `bits` at the origin counter.
    pub(crate) fn emit_bits(&mut self, width: u32, bits: u64) {
        let writing = self.pass == Pass::Two;
        let section = self.current_section_mut();
        let written = if writing && section.section_type.allows_image() {
            let at = section.origin_bit_address();
            section.block.write_bits(at, width, bits)
        } else {
            Ok(())
        };
        section.advance(u64::from(width));
        if let Err(kind) = written {
            self.error(kind);
        }
    }

    /// Move the counters on by `bits` without writing anything.
    pub(crate) fn reserve_bits(&mut self, bits: u64) {
        self.current_section_mut().advance(bits);
    }

    fn show(&mut self, text: String) {
        if self.pass == Pass::Two {
            self.statement.generated.push(text);
        }
    }

    pub(crate) fn emit_parcel(&mut self, parcel: u16) {
        self.emit_bits(PARCEL_BITS, u64::from(parcel));
        self.show(format_parcel(parcel));
    }

    pub(crate) fn emit_gh_ijk(&mut self, gh: u8, ijk: u16) {
        self.emit_parcel(gh_ijk(gh, ijk));
    }

    pub(crate) fn emit_gh_i_jk(&mut self, gh: u8, i: u8, jk: u8) {
        self.emit_parcel(gh_i_jk(gh, i, jk));
    }

    pub(crate) fn emit_gh_i_j_k(&mut self, gh: u8, i: u8, j: u8, k: u8) {
        self.emit_parcel(gh_i_j_k(gh, i, j, k));
    }

    /// Emit a two-parcel instruction whose low 22 bits hold
    /// `address`.  When `address` is relocatable or external the
    /// field is recorded in the relocation or external table of the
    /// section.  `parcel` says the field holds a parcel address.
    pub(crate) fn emit_address_instruction(
        &mut self,
        instruction: u32,
        address: &Value,
        parcel: bool,
    ) {
        let at = self.current_section().origin_bit_address();
        self.record_reference(at, EntryKind::Standard, JKM_BITS, address, parcel);
        self.emit_bits(2 * PARCEL_BITS, u64::from(instruction));
        let high = (instruction >> PARCEL_BITS) as u16;
        let low = (instruction & 0xFFFF) as u16;
        self.show(format!("{} {low:06o}", format_parcel(high)));
    }

    /// Emit a field of data `width` bits wide holding `value`.
    pub(crate) fn emit_field(&mut self, width: u32, value: &Value) {
        let at = self.current_section().origin_bit_address();
        self.record_reference(at, EntryKind::Extended, width, value, false);
        let bits = if value.is_undefined() { 0 } else { value.numeric };
        self.emit_bits(width, bits);
        if width == WORD_BITS {
            self.show(format!("{bits:022o}"));
        } else {
            let masked = bits & mask_right(width);
            self.show(format!("{masked:o}"));
        }
    }

    /// Emit a data word which needs no relocation.
    pub(crate) fn emit_word(&mut self, word: u64) {
        self.emit_bits(WORD_BITS, word);
        self.show(format!("{word:022o}"));
    }

    fn record_reference(
        &mut self,
        bit_address: u64,
        kind: EntryKind,
        field_length: u32,
        value: &Value,
        parcel: bool,
    ) {
        if value.is_undefined() {
            return;
        }
        if value.is_external() {
            if value.coefficient != 1 || value.section.is_some() {
                self.error(ErrorKind::RelocatableField);
                return;
            }
            if let (Pass::Two, Some(external_index)) = (self.pass, value.external) {
                self.current_section_mut()
                    .block
                    .add_external(ExternalEntry {
                        kind,
                        external_index,
                        bit_address,
                        field_length,
                        parcel,
                    });
            }
            return;
        }
        if !value.is_relocatable() {
            return;
        }
        if value.coefficient != 1 {
            self.error(ErrorKind::RelocatableField);
            return;
        }
        if let (Pass::Two, Some(target)) = (self.pass, value.section) {
            self.current_section_mut()
                .block
                .add_relocation(RelocationEntry {
                    kind,
                    target_block: target.0,
                    bit_address,
                    field_length,
                    parcel,
                });
        }
    }

    /// Zero fill to the next parcel boundary.
    pub(crate) fn force_parcel_boundary(&mut self) {
        let bit = self.current_section().parcel_bit();
        if bit != 0 {
            self.emit_bits(PARCEL_BITS - bit, 0);
        }
    }

    /// Zero fill to the next word boundary.
    pub(crate) fn force_word_boundary(&mut self) {
        let bit = self.current_section().word_bit();
        if bit != 0 {
            self.emit_bits(WORD_BITS - bit, 0);
        }
    }

    /// Reach the next word boundary, filling whole parcels with
    /// `PASS` instructions.
    pub(crate) fn force_inst_word_boundary(&mut self) {
        self.force_parcel_boundary();
        while self.current_section().word_bit() != 0 {
            self.emit_bits(PARCEL_BITS, u64::from(PASS_PARCEL));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::context::Settings;
    use crate::micro::Clock;
    use crate::section::SectionId;
    use crate::value::AddressKind;

    fn pass_two() -> AsmContext {
        let mut ctx = AsmContext::new(Settings::default(), Clock::at(UNIX_EPOCH));
        ctx.pass = Pass::Two;
        ctx
    }

    #[test]
    fn test_counters_move_in_pass_one() {
        let mut ctx = AsmContext::new(Settings::default(), Clock::at(UNIX_EPOCH));
        ctx.emit_gh_i_jk(0o022, 1, 5);
        assert_eq!(ctx.current_section().location_parcel(), 1);
        assert!(ctx.current_section().block.is_empty());
        assert!(ctx.statement.generated.is_empty());
    }

    #[test]
    fn test_parcel_then_word_boundary() {
        let mut ctx = pass_two();
        ctx.emit_gh_i_jk(0o022, 1, 5);
        ctx.force_inst_word_boundary();
        let image = ctx.current_section().block.image().map(|(w, words)| (w, words.to_vec()));
        assert_eq!(
            image,
            Some((0, vec![0o022105_u64 << 48 | 0o001000 << 32 | 0o001000 << 16 | 0o001000]))
        );
    }

    #[test]
    fn test_relocatable_address_is_recorded() {
        let mut ctx = pass_two();
        ctx.emit_gh_i_jk(0o022, 1, 5);
        let target = Value::address(AddressKind::Word, SectionId(0), 7, true);
        ctx.emit_address_instruction(base::prelude::gh_i_jkm(0o020, 1, 7), &target, false);
        let block = &ctx.current_section().block;
        assert_eq!(block.relocations.len(), 1);
        assert_eq!(block.relocations[0].bit_address, 16);
        assert_eq!(block.relocations[0].field_length, 22);
        assert_eq!(ctx.statement.generated[1], "020100 000007");
    }

    #[test]
    fn test_external_field() {
        let mut ctx = pass_two();
        ctx.emit_field(64, &Value::external(0));
        let block = &ctx.current_section().block;
        assert_eq!(block.externals.len(), 1);
        assert_eq!(block.externals[0].kind, EntryKind::Extended);
        assert_eq!(block.externals[0].field_length, 64);
    }

    #[test]
    fn test_scaled_relocatable_value_is_refused() {
        let mut ctx = pass_two();
        let mut v = Value::address(AddressKind::Word, SectionId(0), 7, true);
        v.coefficient = 2;
        ctx.emit_field(64, &v);
        assert!(ctx
            .statement
            .diagnostics
            .contains(crate::diagnostic::Diagnostic::Error(ErrorKind::RelocatableField)));
    }
}
