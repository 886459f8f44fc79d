//! Qualifiers and the symbols scoped to them.
use std::collections::BTreeMap;

use tracing::{event, Level};

use super::diagnostic::ErrorKind;
use super::lexer::Name;
use super::section::SectionId;
use super::value::{AddressKind, Attributes, Value};

/// Which pass of the assembler is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Pass {
    One,
    Two,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Symbol {
    pub(crate) value: Value,
}

/// A namespace of symbols within a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Qualifier {
    pub(crate) symbols: BTreeMap<String, Symbol>,
}

/// All the qualifiers of a module.  The anonymous qualifier `""` is
/// always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SymbolTable {
    qualifiers: BTreeMap<String, Qualifier>,
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        let mut qualifiers = BTreeMap::new();
        qualifiers.insert(String::new(), Qualifier::default());
        SymbolTable { qualifiers }
    }
}

/// Identifies one symbol: the qualifier it belongs to, and its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SymbolKey {
    pub(crate) qualifier: String,
    pub(crate) name: String,
}

impl SymbolKey {
    pub(crate) fn new(qualifier: &str, name: &str) -> SymbolKey {
        SymbolKey {
            qualifier: qualifier.to_string(),
            name: name.to_string(),
        }
    }
}

impl SymbolTable {
    pub(crate) fn add_qualifier(&mut self, name: &str) {
        self.qualifiers.entry(name.to_string()).or_default();
    }

    pub(crate) fn get(&self, key: &SymbolKey) -> Option<&Symbol> {
        self.qualifiers
            .get(&key.qualifier)
            .and_then(|q| q.symbols.get(&key.name))
    }

    fn get_mut(&mut self, key: &SymbolKey) -> Option<&mut Symbol> {
        self.qualifiers
            .get_mut(&key.qualifier)
            .and_then(|q| q.symbols.get_mut(&key.name))
    }

    fn is_defined(&self, key: &SymbolKey) -> bool {
        self.get(key).is_some_and(|sym| !sym.value.is_undefined())
    }

    /// Work out which symbol a (possibly qualified) name refers to.
    /// An unqualified name refers to the current qualifier, unless it
    /// is only defined in the anonymous qualifier.  An entry left in
    /// the current qualifier by an earlier reference does not hide a
    /// definition in the anonymous qualifier.
    pub(crate) fn resolve(&self, name: &Name, current: &str) -> SymbolKey {
        match &name.qualifier {
            Some(q) => SymbolKey::new(q, &name.name),
            None => {
                let here = SymbolKey::new(current, &name.name);
                if current.is_empty() || self.is_defined(&here) {
                    return here;
                }
                let global = SymbolKey::new("", &name.name);
                if self.is_defined(&global)
                    || (self.get(&here).is_none() && self.get(&global).is_some())
                {
                    global
                } else {
                    here
                }
            }
        }
    }

    /// An undefined entry in a named qualifier whose name is defined
    /// in the anonymous qualifier.  Unqualified references resolve to
    /// the anonymous definition instead.
    pub(crate) fn is_shadow(&self, key: &SymbolKey) -> bool {
        !key.qualifier.is_empty() && self.is_defined(&SymbolKey::new("", &key.name))
    }

    /// Look a symbol up for use in an expression.  A symbol which has
    /// never been seen is entered as undefined so that it can later be
    /// listed, declared external or reported.
    pub(crate) fn reference(&mut self, key: &SymbolKey) -> &Symbol {
        let q = self.qualifiers.entry(key.qualifier.clone()).or_default();
        q.symbols.entry(key.name.clone()).or_insert_with(|| Symbol {
            value: Value::undefined(),
        })
    }

    /// Define a symbol.
    ///
    /// In pass 1 a symbol may only be defined once, unless both the
    /// existing and the new definitions are redefinable.  In pass 2
    /// each definition must agree with the one made in pass 1, except
    /// for redefinable symbols.
    pub(crate) fn define(
        &mut self,
        key: &SymbolKey,
        mut value: Value,
        redefinable: bool,
        pass: Pass,
    ) -> Result<(), ErrorKind> {
        value.attributes.remove(Attributes::SYMBOL_ONLY);
        if redefinable {
            value.attributes.insert(Attributes::REDEFINABLE);
        }
        if pass == Pass::Two {
            value.attributes.insert(Attributes::DEFINED_P2);
        }
        let Some(existing) = self.get_mut(key) else {
            event!(
                Level::TRACE,
                "defining {}/{} = {value} in {pass:?}",
                key.qualifier,
                key.name
            );
            self.qualifiers
                .entry(key.qualifier.clone())
                .or_default()
                .symbols
                .insert(key.name.clone(), Symbol { value });
            return Ok(());
        };
        let old = existing.value;
        if old.is_external() {
            return Err(ErrorKind::DoubleDefinition);
        }
        let may_redefine = redefinable && old.attributes.contains(Attributes::REDEFINABLE);
        let conflict = match pass {
            Pass::One => !old.is_undefined() && !may_redefine,
            Pass::Two => {
                if old.attributes.contains(Attributes::DEFINED_P2) {
                    !may_redefine
                } else {
                    !redefinable && !old.is_undefined() && !old.same_as(&value)
                }
            }
        };
        if conflict {
            event!(
                Level::DEBUG,
                "{}/{} was {old}, cannot now become {value}",
                key.qualifier,
                key.name
            );
            return Err(ErrorKind::DoubleDefinition);
        }
        value.attributes |= old.attributes & Attributes::ENTRY;
        existing.value = value;
        Ok(())
    }

    /// Mark a symbol as an entry point, creating it (undefined) if
    /// necessary.
    pub(crate) fn mark_entry(&mut self, key: &SymbolKey) {
        self.reference(key);
        if let Some(sym) = self.get_mut(key) {
            sym.value.attributes.insert(Attributes::ENTRY);
        }
    }

    /// Make a symbol external with the given index in the module's
    /// external chain.
    pub(crate) fn make_external(&mut self, key: &SymbolKey, index: usize) -> Result<(), ErrorKind> {
        self.reference(key);
        let Some(sym) = self.get_mut(key) else {
            return Err(ErrorKind::Undefined);
        };
        if sym.value.is_external() {
            return Ok(());
        }
        if !sym.value.is_undefined() {
            return Err(ErrorKind::DoubleDefinition);
        }
        let entry = sym.value.attributes & Attributes::ENTRY;
        sym.value = Value::external(index);
        sym.value.attributes |= entry;
        Ok(())
    }

    /// Prepare symbols for pass 2: addresses in sections which were
    /// moved (in an absolute module) are displaced by the section's
    /// origin offset.
    pub(crate) fn adjust_for_pass_two(&mut self, origin_offset: impl Fn(SectionId) -> u64) {
        for q in self.qualifiers.values_mut() {
            for sym in q.symbols.values_mut() {
                let v = &mut sym.value;
                if v.is_undefined() || v.is_external() {
                    continue;
                }
                let Some(section) = v.section else {
                    continue;
                };
                let kind = v.address_kind();
                if kind == AddressKind::Value {
                    continue;
                }
                let words = origin_offset(section);
                v.numeric = v.numeric.wrapping_add(words * kind.per_word());
            }
        }
    }

    /// Iterate over every symbol, in qualifier then name order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (SymbolKey, &Symbol)> + '_ {
        self.qualifiers.iter().flat_map(|(qname, q)| {
            q.symbols
                .iter()
                .map(move |(name, sym)| (SymbolKey::new(qname, name), sym))
        })
    }

    /// Keys of the symbols which are still undefined.
    pub(crate) fn undefined(&self) -> Vec<SymbolKey> {
        self.iter()
            .filter(|(key, sym)| sym.value.is_undefined() && !self.is_shadow(key))
            .map(|(key, _)| key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> Name {
        Name {
            qualifier: None,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_double_definition_in_pass_one() {
        let mut t = SymbolTable::default();
        let k = SymbolKey::new("", "A");
        assert_eq!(t.define(&k, Value::absolute(1), false, Pass::One), Ok(()));
        assert_eq!(
            t.define(&k, Value::absolute(2), false, Pass::One),
            Err(ErrorKind::DoubleDefinition)
        );
    }

    #[test]
    fn test_set_may_be_repeated() {
        let mut t = SymbolTable::default();
        let k = SymbolKey::new("", "A");
        assert_eq!(t.define(&k, Value::absolute(1), true, Pass::One), Ok(()));
        assert_eq!(t.define(&k, Value::absolute(2), true, Pass::One), Ok(()));
        assert_eq!(t.get(&k).map(|s| s.value.numeric), Some(2));
        // But not as an EQU.
        assert_eq!(
            t.define(&k, Value::absolute(3), false, Pass::One),
            Err(ErrorKind::DoubleDefinition)
        );
    }

    #[test]
    fn test_pass_two_must_agree() {
        let mut t = SymbolTable::default();
        let k = SymbolKey::new("", "A");
        t.define(&k, Value::absolute(1), false, Pass::One)
            .expect("first definition");
        assert_eq!(t.define(&k, Value::absolute(1), false, Pass::Two), Ok(()));
        assert!(t
            .get(&k)
            .is_some_and(|s| s.value.attributes.contains(Attributes::DEFINED_P2)));
        assert_eq!(
            t.define(&k, Value::absolute(1), false, Pass::Two),
            Err(ErrorKind::DoubleDefinition)
        );

        let k2 = SymbolKey::new("", "B");
        t.define(&k2, Value::absolute(1), false, Pass::One)
            .expect("first definition");
        assert_eq!(
            t.define(&k2, Value::absolute(9), false, Pass::Two),
            Err(ErrorKind::DoubleDefinition)
        );
    }

    #[test]
    fn test_forward_reference_then_definition() {
        let mut t = SymbolTable::default();
        let k = t.resolve(&plain("LAB"), "");
        assert!(t.reference(&k).value.is_undefined());
        assert_eq!(t.define(&k, Value::absolute(7), false, Pass::One), Ok(()));
        assert_eq!(t.undefined(), Vec::new());
    }

    #[test]
    fn test_resolution_falls_back_to_anonymous_qualifier() {
        let mut t = SymbolTable::default();
        t.define(&SymbolKey::new("", "G"), Value::absolute(1), false, Pass::One)
            .expect("define G");
        t.add_qualifier("Q");
        assert_eq!(t.resolve(&plain("G"), "Q"), SymbolKey::new("", "G"));
        assert_eq!(t.resolve(&plain("H"), "Q"), SymbolKey::new("Q", "H"));
        let explicit = Name {
            qualifier: Some("Q".to_string()),
            name: "G".to_string(),
        };
        assert_eq!(t.resolve(&explicit, ""), SymbolKey::new("Q", "G"));
    }

    #[test]
    fn test_reference_in_qualifier_does_not_hide_later_global() {
        let mut t = SymbolTable::default();
        t.add_qualifier("Q");
        // Referenced inside QUAL Q before the global definition.
        let early = t.resolve(&plain("H"), "Q");
        assert_eq!(early, SymbolKey::new("Q", "H"));
        assert!(t.reference(&early).value.is_undefined());
        t.define(&SymbolKey::new("", "H"), Value::absolute(1), false, Pass::One)
            .expect("define H");
        assert_eq!(t.resolve(&plain("H"), "Q"), SymbolKey::new("", "H"));
        assert_eq!(t.undefined(), Vec::new());

        // A definition in the qualifier itself still wins.
        t.define(&early, Value::absolute(2), false, Pass::One)
            .expect("define Q/H");
        assert_eq!(t.resolve(&plain("H"), "Q"), early);
    }

    #[test]
    fn test_externals() {
        let mut t = SymbolTable::default();
        let k = SymbolKey::new("", "SUB");
        assert_eq!(t.make_external(&k, 0), Ok(()));
        assert!(t.get(&k).is_some_and(|s| s.value.is_external()));
        assert_eq!(
            t.define(&k, Value::absolute(1), false, Pass::One),
            Err(ErrorKind::DoubleDefinition)
        );
    }

    #[test]
    fn test_adjust_for_pass_two() {
        let mut t = SymbolTable::default();
        let k = SymbolKey::new("", "L");
        t.define(
            &k,
            Value::address(AddressKind::Parcel, SectionId(2), 3, false),
            false,
            Pass::One,
        )
        .expect("define L");
        t.adjust_for_pass_two(|s| if s == SectionId(2) { 10 } else { 0 });
        assert_eq!(t.get(&k).map(|s| s.value.numeric), Some(43));
    }
}
