//! Sections and the object blocks assembled from them.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::{deposit, mask_right, PARCEL_BITS, WORD_BITS};

use super::diagnostic::ErrorKind;
use super::object::{ExternalEntry, RelocationEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SectionId(pub(crate) usize);

/// Index of the section which is current when a module starts.
pub(crate) const NOMINAL_SECTION: SectionId = SectionId(0);
/// Index of the section holding the literal pool.
pub(crate) const LITERALS_SECTION: SectionId = SectionId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionType {
    #[default]
    Mixed,
    Code,
    Data,
    Stack,
    Common,
    Dynamic,
    TaskCom,
    None,
}

impl SectionType {
    pub(crate) fn from_keyword(s: &str) -> Option<SectionType> {
        Some(match s {
            "MIXED" => SectionType::Mixed,
            "CODE" => SectionType::Code,
            "DATA" => SectionType::Data,
            "STACK" => SectionType::Stack,
            "COMMON" => SectionType::Common,
            "DYNAMIC" => SectionType::Dynamic,
            "TASKCOM" => SectionType::TaskCom,
            _ => {
                return None;
            }
        })
    }

    /// Machine instructions may only be placed in these sections.
    pub(crate) fn allows_instructions(self) -> bool {
        matches!(self, SectionType::Mixed | SectionType::Code)
    }

    /// Sections whose contents are only reserved at load or run time
    /// cannot hold image data.
    pub(crate) fn allows_image(self) -> bool {
        !matches!(self, SectionType::Stack | SectionType::Dynamic)
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            SectionType::Mixed => 0,
            SectionType::Code => 1,
            SectionType::Data => 2,
            SectionType::Stack => 3,
            SectionType::Common => 4,
            SectionType::Dynamic => 5,
            SectionType::TaskCom => 6,
            SectionType::None => 7,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<SectionType> {
        [
            SectionType::Mixed,
            SectionType::Code,
            SectionType::Data,
            SectionType::Stack,
            SectionType::Common,
            SectionType::Dynamic,
            SectionType::TaskCom,
            SectionType::None,
        ]
        .into_iter()
        .find(|t| t.code() == code)
    }
}

impl Display for SectionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SectionType::Mixed => "MIXED",
            SectionType::Code => "CODE",
            SectionType::Data => "DATA",
            SectionType::Stack => "STACK",
            SectionType::Common => "COMMON",
            SectionType::Dynamic => "DYNAMIC",
            SectionType::TaskCom => "TASKCOM",
            SectionType::None => "NONE",
        })
    }
}

/// The memory a section is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Residency {
    /// Central memory.
    #[default]
    Cm,
    /// Extended memory.
    Em,
    /// Local memory.
    Lm,
    None,
}

impl Residency {
    pub(crate) fn from_keyword(s: &str) -> Option<Residency> {
        match s {
            "CM" => Some(Residency::Cm),
            "EM" => Some(Residency::Em),
            "LM" => Some(Residency::Lm),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Residency::Cm => 0,
            Residency::Em => 1,
            Residency::Lm => 2,
            Residency::None => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Residency> {
        [Residency::Cm, Residency::Em, Residency::Lm, Residency::None]
            .into_iter()
            .find(|r| r.code() == code)
    }
}

impl Display for Residency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Residency::Cm => "CM",
            Residency::Em => "EM",
            Residency::Lm => "LM",
            Residency::None => "NONE",
        })
    }
}

/// The image buffer grows by this many words at a time.
const IMAGE_INCREMENT: usize = 512;

/// The image and tables assembled for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ObjectBlock {
    /// Word address of `words[0]`; set by the first write.
    base_word: Option<u64>,
    words: Vec<u64>,
    /// Lowest parcel written, and one past the highest.
    low_parcel: Option<u64>,
    high_parcel: u64,
    pub(crate) relocations: Vec<RelocationEntry>,
    pub(crate) externals: Vec<ExternalEntry>,
}

impl ObjectBlock {
    fn word_mut(&mut self, word_address: u64) -> &mut u64 {
        let base = *self.base_word.get_or_insert(word_address);
        let index = usize::try_from(word_address - base).unwrap_or(usize::MAX);
        if index >= self.words.len() {
            let wanted = (index / IMAGE_INCREMENT + 1) * IMAGE_INCREMENT;
            self.words.resize(wanted, 0);
        }
        &mut self.words[index]
    }

    /// Store the low `width` bits of `value` in the field starting at
    /// absolute bit address `bit_address`.  The field may straddle a
    /// word boundary.
    ///
    /// # Errors
    ///
    /// `InstructionPlacement` if the field lies below the first word
    /// of the image; nothing is written.
    pub(crate) fn write_bits(
        &mut self,
        bit_address: u64,
        width: u32,
        value: u64,
    ) -> Result<(), ErrorKind> {
        if width == 0 {
            return Ok(());
        }
        if let Some(base) = self.base_word {
            if bit_address / u64::from(WORD_BITS) < base {
                event!(
                    Level::ERROR,
                    "image write at bit {bit_address} lies below the image base word {base}"
                );
                return Err(ErrorKind::InstructionPlacement);
            }
        }
        let value = value & mask_right(width);
        let start = (bit_address % u64::from(WORD_BITS)) as u32;
        let word = bit_address / u64::from(WORD_BITS);
        if start + width <= WORD_BITS {
            let w = self.word_mut(word);
            *w = deposit(*w, start, width, value);
        } else {
            let first = WORD_BITS - start;
            let second = width - first;
            let w = self.word_mut(word);
            *w = deposit(*w, start, first, value >> second);
            let w = self.word_mut(word + 1);
            *w = deposit(*w, 0, second, value);
        }
        let parcel_bits = u64::from(PARCEL_BITS);
        let low = bit_address / parcel_bits;
        let high = (bit_address + u64::from(width)).div_ceil(parcel_bits);
        self.low_parcel = Some(self.low_parcel.map_or(low, |p| p.min(low)));
        self.high_parcel = self.high_parcel.max(high);
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.low_parcel.is_none()
    }

    /// The written part of the image: the word address of its first
    /// word, and the words.
    pub(crate) fn image(&self) -> Option<(u64, &[u64])> {
        let low = self.low_parcel?;
        let base = self.base_word?;
        let first = low / 4;
        let last = self.high_parcel.div_ceil(4);
        let from = usize::try_from(first - base).ok()?;
        let to = usize::try_from(last - base).ok()?;
        Some((first, &self.words[from..to.min(self.words.len())]))
    }

    pub(crate) fn add_relocation(&mut self, entry: RelocationEntry) {
        self.relocations.push(entry);
    }

    pub(crate) fn add_external(&mut self, entry: ExternalEntry) {
        self.externals.push(entry);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Section {
    pub(crate) name: String,
    pub(crate) section_type: SectionType,
    pub(crate) residency: Residency,
    /// Words by which the section is displaced from address zero in
    /// an absolute module.
    pub(crate) origin_offset: u64,
    /// Set when `ORG` has placed the section explicitly.
    pub(crate) org_set: bool,
    location_bits: u64,
    origin_bits: u64,
    first_bits: Option<u64>,
    high_bits: u64,
    pub(crate) block: ObjectBlock,
}

impl Section {
    pub(crate) fn new(name: &str, section_type: SectionType, residency: Residency) -> Section {
        Section {
            name: name.to_string(),
            section_type,
            residency,
            origin_offset: 0,
            org_set: false,
            location_bits: 0,
            origin_bits: 0,
            first_bits: None,
            high_bits: 0,
            block: ObjectBlock::default(),
        }
    }

    /// The location counter, in parcels.
    pub(crate) fn location_parcel(&self) -> u64 {
        self.location_bits / u64::from(PARCEL_BITS)
    }

    /// The location counter, in words.
    pub(crate) fn location_word(&self) -> u64 {
        self.location_bits / u64::from(WORD_BITS)
    }

    /// The origin counter, in words.
    pub(crate) fn origin_word(&self) -> u64 {
        self.origin_bits / u64::from(WORD_BITS)
    }

    /// The bit address in the section at which the next bits are
    /// placed.
    pub(crate) fn origin_bit_address(&self) -> u64 {
        self.origin_bits
    }

    /// The word-bit-position counter (0-63).
    pub(crate) fn word_bit(&self) -> u32 {
        (self.location_bits % u64::from(WORD_BITS)) as u32
    }

    /// The parcel-bit-position counter (0-15).
    pub(crate) fn parcel_bit(&self) -> u32 {
        (self.location_bits % u64::from(PARCEL_BITS)) as u32
    }

    /// Account for `bits` bits placed (or reserved) at the counters.
    pub(crate) fn advance(&mut self, bits: u64) {
        if bits == 0 {
            return;
        }
        if self.first_bits.is_none() {
            self.first_bits = Some(self.origin_bits);
        }
        self.location_bits += bits;
        self.origin_bits += bits;
        self.high_bits = self.high_bits.max(self.origin_bits);
    }

    pub(crate) fn set_location_word(&mut self, word: u64) {
        self.location_bits = word * u64::from(WORD_BITS);
    }

    /// Set both the origin and location counters.
    pub(crate) fn set_origin_word(&mut self, word: u64) {
        self.origin_bits = word * u64::from(WORD_BITS);
        self.location_bits = self.origin_bits;
        self.high_bits = self.high_bits.max(self.origin_bits);
    }

    /// How far the counters must move to reach bit `bit` of the
    /// current word (or of the next word, if `bit` is behind them).
    pub(crate) fn bits_to_reach(&self, bit: u32) -> u64 {
        let current = self.word_bit();
        if bit >= current {
            u64::from(bit - current)
        } else {
            u64::from(WORD_BITS - current + bit)
        }
    }

    /// Word address of the start of the section's contents.
    pub(crate) fn base_word(&self) -> u64 {
        match self.first_bits {
            Some(bits) => bits / u64::from(WORD_BITS),
            None => self.origin_offset,
        }
    }

    /// Size of the section, in words, from its base.
    pub(crate) fn size_words(&self) -> u64 {
        self.high_bits
            .div_ceil(u64::from(WORD_BITS))
            .saturating_sub(self.base_word())
    }

    /// One past the last word the section occupies.
    pub(crate) fn end_word(&self) -> u64 {
        self.high_bits.div_ceil(u64::from(WORD_BITS)).max(self.origin_offset)
    }

    /// Prepare for the next pass: the counters restart at the
    /// section's origin offset and the object block is emptied.
    pub(crate) fn restart(&mut self) {
        self.origin_bits = self.origin_offset * u64::from(WORD_BITS);
        self.location_bits = self.origin_bits;
        self.first_bits = None;
        self.high_bits = self.origin_bits;
        self.block = ObjectBlock::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_advance_together() {
        let mut s = Section::new("", SectionType::Mixed, Residency::Cm);
        s.advance(16);
        assert_eq!(s.location_parcel(), 1);
        assert_eq!(s.parcel_bit(), 0);
        assert_eq!(s.word_bit(), 16);
        s.advance(5);
        assert_eq!(s.parcel_bit(), 5);
        assert_eq!(s.word_bit(), 21);
        assert_eq!(s.origin_bit_address(), 21);
    }

    #[test]
    fn test_org_moves_base() {
        let mut s = Section::new("", SectionType::Code, Residency::Cm);
        s.set_origin_word(100);
        s.advance(16);
        assert_eq!(s.base_word(), 100);
        assert_eq!(s.size_words(), 1);
    }

    #[test]
    fn test_bits_to_reach() {
        let mut s = Section::new("", SectionType::Data, Residency::Cm);
        s.advance(10);
        assert_eq!(s.bits_to_reach(32), 22);
        assert_eq!(s.bits_to_reach(4), 58);
        assert_eq!(s.bits_to_reach(10), 0);
    }

    #[test]
    fn test_write_bits_straddles_words() {
        let mut block = ObjectBlock::default();
        assert_eq!(block.write_bits(60, 8, 0xAB), Ok(()));
        let (first, words) = block.image().expect("image was written");
        assert_eq!(first, 0);
        assert_eq!(words, &[0xA, 0xB000_0000_0000_0000]);
    }

    #[test]
    fn test_write_below_image_is_refused() {
        let mut block = ObjectBlock::default();
        assert_eq!(block.write_bits(10 * 64, 64, 1), Ok(()));
        assert_eq!(
            block.write_bits(64, 16, 0o777),
            Err(ErrorKind::InstructionPlacement)
        );
        let (first, words) = block.image().expect("image was written");
        assert_eq!(first, 10);
        assert_eq!(words, &[1]);
    }

    #[test]
    fn test_image_starts_at_first_write() {
        let mut block = ObjectBlock::default();
        assert_eq!(block.write_bits(100 * 64, 16, 0o022105), Ok(()));
        let (first, words) = block.image().expect("image was written");
        assert_eq!(first, 100);
        assert_eq!(words, &[0o022105_u64 << 48]);
    }

    #[test]
    fn test_type_codes() {
        for t in [SectionType::Mixed, SectionType::TaskCom, SectionType::None] {
            assert_eq!(SectionType::from_code(t.code()), Some(t));
        }
        for r in [Residency::Cm, Residency::Lm] {
            assert_eq!(Residency::from_code(r.code()), Some(r));
        }
    }
}
