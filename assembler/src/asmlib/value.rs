use std::fmt::{self, Display, Formatter};

use bitflags::bitflags;

use super::section::SectionId;

bitflags! {
    /// Attributes of a value or of the symbol which holds it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct Attributes: u16 {
        /// Defined by `SET` (or `MICSIZE`), so may be defined again.
        const REDEFINABLE = 1 << 0;
        const WORD_ADDRESS = 1 << 1;
        const PARCEL_ADDRESS = 1 << 2;
        const BYTE_ADDRESS = 1 << 3;
        /// The address of a literal pool entry.
        const LITERAL = 1 << 4;
        /// An address in a section of a relocatable module.
        const RELOCATABLE = 1 << 5;
        /// An address in a section of an absolute module.
        const IMMOBILE = 1 << 6;
        /// Refers to a symbol defined in another module.
        const EXTERNAL = 1 << 7;
        /// The symbol is an entry point of its module.
        const ENTRY = 1 << 8;
        /// A location counter value.
        const COUNTER = 1 << 9;
        /// The symbol has been referenced but not (yet) defined.
        const UNDEFINED = 1 << 10;
        /// The symbol has been defined in pass 2.
        const DEFINED_P2 = 1 << 11;
    }
}

impl Attributes {
    pub(crate) const ADDRESS_KINDS: Attributes = Attributes::WORD_ADDRESS
        .union(Attributes::PARCEL_ADDRESS)
        .union(Attributes::BYTE_ADDRESS);

    /// Attributes which describe a symbol rather than the value it
    /// holds, and which do not carry through arithmetic.
    pub(crate) const SYMBOL_ONLY: Attributes = Attributes::REDEFINABLE
        .union(Attributes::ENTRY)
        .union(Attributes::DEFINED_P2)
        .union(Attributes::COUNTER);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ValueType {
    #[default]
    Integer,
    Float,
}

/// The unit in which a value counts, if it is an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Value,
    Parcel,
    Word,
    Byte,
}

impl AddressKind {
    pub(crate) fn attribute(self) -> Attributes {
        match self {
            AddressKind::Value => Attributes::empty(),
            AddressKind::Parcel => Attributes::PARCEL_ADDRESS,
            AddressKind::Word => Attributes::WORD_ADDRESS,
            AddressKind::Byte => Attributes::BYTE_ADDRESS,
        }
    }

    /// Number of these units in a word.
    pub(crate) fn per_word(self) -> u64 {
        match self {
            AddressKind::Value | AddressKind::Word => 1,
            AddressKind::Parcel => 4,
            AddressKind::Byte => 8,
        }
    }

    /// The representation used in object files.
    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            AddressKind::Value => 0,
            AddressKind::Parcel => 1,
            AddressKind::Word => 2,
            AddressKind::Byte => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: u64) -> Option<AddressKind> {
        match code {
            0 => Some(AddressKind::Value),
            1 => Some(AddressKind::Parcel),
            2 => Some(AddressKind::Word),
            3 => Some(AddressKind::Byte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Value {
    pub(crate) kind: ValueType,
    pub(crate) attributes: Attributes,
    /// The section an address belongs to.
    pub(crate) section: Option<SectionId>,
    /// Index into the module's external chain.
    pub(crate) external: Option<usize>,
    /// How many times the base address of `section` (or of the
    /// external) is included in the value.  Only 0 and 1 can be
    /// represented in the object file.
    pub(crate) coefficient: i64,
    /// The integer value, or the bits of an `f64` when `kind` is
    /// [`ValueType::Float`].
    pub(crate) numeric: u64,
}

impl Value {
    pub(crate) fn absolute(n: u64) -> Value {
        Value {
            numeric: n,
            ..Value::default()
        }
    }

    pub(crate) fn float(x: f64) -> Value {
        Value {
            kind: ValueType::Float,
            numeric: x.to_bits(),
            ..Value::default()
        }
    }

    pub(crate) fn undefined() -> Value {
        Value {
            attributes: Attributes::UNDEFINED,
            ..Value::default()
        }
    }

    /// An address in `section`.  `relocatable` says whether the
    /// module is relocatable (rather than absolute).
    pub(crate) fn address(
        kind: AddressKind,
        section: SectionId,
        numeric: u64,
        relocatable: bool,
    ) -> Value {
        let placement = if relocatable {
            Attributes::RELOCATABLE
        } else {
            Attributes::IMMOBILE
        };
        Value {
            kind: ValueType::Integer,
            attributes: kind.attribute() | placement,
            section: Some(section),
            external: None,
            coefficient: 1,
            numeric,
        }
    }

    pub(crate) fn external(index: usize) -> Value {
        Value {
            attributes: Attributes::EXTERNAL,
            external: Some(index),
            coefficient: 1,
            ..Value::default()
        }
    }

    pub(crate) fn address_kind(&self) -> AddressKind {
        if self.attributes.contains(Attributes::PARCEL_ADDRESS) {
            AddressKind::Parcel
        } else if self.attributes.contains(Attributes::WORD_ADDRESS) {
            AddressKind::Word
        } else if self.attributes.contains(Attributes::BYTE_ADDRESS) {
            AddressKind::Byte
        } else {
            AddressKind::Value
        }
    }

    #[must_use]
    pub(crate) fn with_address_kind(mut self, kind: AddressKind) -> Value {
        self.attributes.remove(Attributes::ADDRESS_KINDS);
        self.attributes.insert(kind.attribute());
        self
    }

    pub(crate) fn is_undefined(&self) -> bool {
        self.attributes.contains(Attributes::UNDEFINED)
    }

    pub(crate) fn is_relocatable(&self) -> bool {
        self.attributes.contains(Attributes::RELOCATABLE) && self.coefficient != 0
    }

    pub(crate) fn is_external(&self) -> bool {
        self.attributes.contains(Attributes::EXTERNAL)
    }

    pub(crate) fn is_float(&self) -> bool {
        self.kind == ValueType::Float
    }

    /// True for a plain number: not an address in any section, not
    /// external and not undefined.
    pub(crate) fn is_constant(&self) -> bool {
        self.section.is_none()
            && !self.is_external()
            && !self.is_undefined()
            && self.kind == ValueType::Integer
    }

    pub(crate) fn as_f64(&self) -> f64 {
        match self.kind {
            ValueType::Float => f64::from_bits(self.numeric),
            ValueType::Integer => self.numeric as i64 as f64,
        }
    }

    pub(crate) fn as_i64(&self) -> i64 {
        self.numeric as i64
    }

    /// The value as it should be compared between passes: the
    /// symbol-only attributes are ignored.
    pub(crate) fn same_as(&self, other: &Value) -> bool {
        let strip = |v: &Value| Value {
            attributes: v.attributes.difference(Attributes::SYMBOL_ONLY),
            ..*v
        };
        strip(self) == strip(other)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return f.write_str("undefined");
        }
        match self.kind {
            ValueType::Float => write!(f, "{}", f64::from_bits(self.numeric))?,
            ValueType::Integer => write!(f, "{:o}", self.numeric)?,
        }
        match self.address_kind() {
            AddressKind::Parcel => f.write_str("p")?,
            AddressKind::Word => f.write_str("w")?,
            AddressKind::Byte => f.write_str("b")?,
            AddressKind::Value => (),
        }
        if self.is_relocatable() {
            f.write_str("+")?;
        }
        if let Some(ext) = self.external {
            write!(f, " x{ext}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_kinds() {
        let v = Value::address(AddressKind::Parcel, SectionId(0), 5, true);
        assert_eq!(v.address_kind(), AddressKind::Parcel);
        assert!(v.is_relocatable());
        let w = v.with_address_kind(AddressKind::Word);
        assert_eq!(w.address_kind(), AddressKind::Word);
        assert!(!w.attributes.contains(Attributes::PARCEL_ADDRESS));
    }

    #[test]
    fn test_same_as_ignores_symbol_flags() {
        let a = Value::absolute(7);
        let mut b = a;
        b.attributes.insert(Attributes::DEFINED_P2);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&Value::absolute(8)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::absolute(8).to_string(), "10");
        assert_eq!(
            Value::address(AddressKind::Word, SectionId(1), 3, true).to_string(),
            "3w+"
        );
        assert_eq!(Value::undefined().to_string(), "undefined");
    }
}
