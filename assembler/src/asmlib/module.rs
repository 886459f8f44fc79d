//! Modules: the unit of assembly between `IDENT` and `END`.
use std::collections::BTreeMap;

use tracing::{event, Level};

use super::macros::MacroDef;
use super::section::{
    Residency, Section, SectionId, SectionType, LITERALS_SECTION, NOMINAL_SECTION,
};
use super::symtab::{SymbolKey, SymbolTable};

/// Name of the section which holds the literal pool.
pub(crate) const LITERALS_NAME: &str = "=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Literal {
    pub(crate) key: String,
    /// Word offset within the literals section.
    pub(crate) offset: u64,
    pub(crate) words: Vec<u64>,
}

/// The literal pool of a module.  Entries are identified by the text
/// of the literal, and keep the offset they were given when first
/// seen, so that both passes agree on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LiteralPool {
    entries: Vec<Literal>,
    by_key: BTreeMap<String, usize>,
    size: u64,
}

impl LiteralPool {
    /// The offset of the literal `key`.  A literal seen for the first
    /// time is given `words` words at the end of the pool.
    pub(crate) fn intern(&mut self, key: &str, words: Vec<u64>) -> u64 {
        if let Some(&index) = self.by_key.get(key) {
            let entry = &mut self.entries[index];
            if entry.words.len() == words.len() {
                entry.words = words;
            }
            return entry.offset;
        }
        let offset = self.size;
        self.size += words.len() as u64;
        self.by_key.insert(key.to_string(), self.entries.len());
        self.entries.push(Literal {
            key: key.to_string(),
            offset,
            words,
        });
        offset
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Module {
    pub(crate) name: String,
    pub(crate) absolute: bool,
    pub(crate) stack_size: u64,
    pub(crate) comment: String,
    pub(crate) sections: Vec<Section>,
    pub(crate) symbols: SymbolTable,
    pub(crate) macros: BTreeMap<String, MacroDef>,
    pub(crate) micros: BTreeMap<String, String>,
    /// Synonyms created by `OPSYN`.
    pub(crate) opsyns: BTreeMap<String, String>,
    pub(crate) literals: LiteralPool,
    pub(crate) start: Option<SymbolKey>,
    /// Entry points, in the order they were declared.
    pub(crate) entries: Vec<SymbolKey>,
    /// The external chain; a symbol's index here is its external
    /// index.
    pub(crate) externals: Vec<SymbolKey>,
    /// `END` has been seen in the current pass.
    pub(crate) ended: bool,
}

impl Module {
    pub(crate) fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            absolute: false,
            stack_size: 0,
            comment: String::new(),
            sections: vec![
                Section::new("", SectionType::Mixed, Residency::Cm),
                Section::new(LITERALS_NAME, SectionType::Data, Residency::Cm),
            ],
            symbols: SymbolTable::default(),
            macros: BTreeMap::new(),
            micros: BTreeMap::new(),
            opsyns: BTreeMap::new(),
            literals: LiteralPool::default(),
            start: None,
            entries: Vec::new(),
            externals: Vec::new(),
            ended: false,
        }
    }

    pub(crate) fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    pub(crate) fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0]
    }

    pub(crate) fn find_section(
        &self,
        name: &str,
        section_type: SectionType,
        residency: Residency,
    ) -> Option<SectionId> {
        self.sections
            .iter()
            .position(|s| {
                s.name == name && s.section_type == section_type && s.residency == residency
            })
            .map(SectionId)
    }

    pub(crate) fn add_section(
        &mut self,
        name: &str,
        section_type: SectionType,
        residency: Residency,
    ) -> SectionId {
        self.sections
            .push(Section::new(name, section_type, residency));
        SectionId(self.sections.len() - 1)
    }

    /// Add a symbol to the external chain (once) and return its index.
    pub(crate) fn add_external(&mut self, key: &SymbolKey) -> usize {
        if let Some(index) = self.externals.iter().position(|k| k == key) {
            return index;
        }
        self.externals.push(key.clone());
        self.externals.len() - 1
    }

    pub(crate) fn add_entry(&mut self, key: &SymbolKey) {
        if !self.entries.contains(key) {
            self.entries.push(key.clone());
        }
    }

    /// True when the module would produce no object code.
    pub(crate) fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.size_words() == 0)
            && self.entries.is_empty()
            && self.externals.is_empty()
    }

    /// The work done between the passes: sections of an absolute
    /// module are laid out one after another (except those placed by
    /// `ORG`), symbols are moved accordingly, and every section's
    /// counters are reset.
    pub(crate) fn prepare_pass_two(&mut self) {
        if self.absolute {
            let mut next = 0;
            for section in &mut self.sections {
                if section.org_set {
                    section.origin_offset = 0;
                    next = next.max(section.end_word());
                } else {
                    let size = section.size_words();
                    section.origin_offset = next;
                    next += size;
                }
            }
        }
        let offsets: Vec<u64> = self.sections.iter().map(|s| s.origin_offset).collect();
        self.symbols
            .adjust_for_pass_two(|id| offsets.get(id.0).copied().unwrap_or(0));
        for section in &mut self.sections {
            event!(
                Level::DEBUG,
                "module '{}' section '{}' ({}, {}): {} words at offset {}",
                self.name,
                section.name,
                section.section_type,
                section.residency,
                section.size_words(),
                section.origin_offset
            );
            section.restart();
        }
        self.micros.clear();
        self.opsyns.clear();
        self.ended = false;
    }

    pub(crate) fn literals_section(&self) -> &Section {
        self.section(LITERALS_SECTION)
    }

    pub(crate) fn nominal_section(&self) -> &Section {
        self.section(NOMINAL_SECTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::Pass;
    use crate::value::{AddressKind, Value};

    #[test]
    fn test_new_module_has_two_sections() {
        let m = Module::new("M");
        assert_eq!(m.sections.len(), 2);
        assert_eq!(m.literals_section().name, LITERALS_NAME);
        assert_eq!(m.nominal_section().section_type, SectionType::Mixed);
        assert!(m.is_empty());
    }

    #[test]
    fn test_literal_pool_reuses_offsets() {
        let mut pool = LiteralPool::default();
        assert_eq!(pool.intern("X'FF'", vec![0xFF]), 0);
        assert_eq!(pool.intern("'ABCDEFGHIJ'", vec![1, 2]), 1);
        assert_eq!(pool.intern("X'FF'", vec![0xFF]), 0);
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.iter().count(), 2);
    }

    #[test]
    fn test_external_chain_order() {
        let mut m = Module::new("M");
        let a = SymbolKey::new("", "A");
        let b = SymbolKey::new("", "B");
        assert_eq!(m.add_external(&a), 0);
        assert_eq!(m.add_external(&b), 1);
        assert_eq!(m.add_external(&a), 0);
    }

    #[test]
    fn test_absolute_layout() {
        let mut m = Module::new("M");
        m.absolute = true;
        let data = m.add_section("D", SectionType::Data, Residency::Cm);
        m.section_mut(NOMINAL_SECTION).advance(3 * 64);
        m.section_mut(data).advance(2 * 64);
        let key = SymbolKey::new("", "X");
        m.symbols
            .define(
                &key,
                Value::address(AddressKind::Word, data, 1, false),
                false,
                Pass::One,
            )
            .expect("define X");
        m.prepare_pass_two();
        assert_eq!(m.section(NOMINAL_SECTION).origin_offset, 0);
        // The (empty) literals section occupies no space.
        assert_eq!(m.section(data).origin_offset, 3);
        assert_eq!(m.symbols.get(&key).map(|s| s.value.numeric), Some(4));
        assert_eq!(m.section(data).origin_bit_address(), 3 * 64);
    }
}
