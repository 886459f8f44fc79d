//! Relocatable object modules, and their representation as records.
//!
//! Each module is written as one file of the object dataset:
//!
//! | record | contents                                                  |
//! |--------|-----------------------------------------------------------|
//! | PDT    | module name, flags, stack size, comment, blocks, entries  |
//! | TXT    | the image of one block                                    |
//! | REL    | the relocation table of one block                         |
//! | XTB    | the external reference table of one block                 |
//! | XNS    | the names of the externals, then the entry points         |
//! | START  | the start address, if `START` was given                   |
//!
//! Every record starts with a header word holding the record type in
//! the top byte and the length of the rest of the record in the low
//! bits.  Character strings are a length word followed by the
//! characters, packed eight to a word.
use std::fmt::{self, Display, Formatter};

use tracing::{event, span, Level};

use base::prelude::{pack_bytes, Justification};

use super::dataset::{Dataset, CONTROL_EOD, CONTROL_EOF, CONTROL_MASK, CONTROL_RECORD};
use super::section::{Residency, SectionType};
use super::types::{AssemblerFailure, IoFailed};
use super::value::AddressKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The 22-bit address field of a two-parcel instruction.
    Standard,
    /// A field of any width.
    Extended,
}

/// A field of the image which must be adjusted by the load address of
/// a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationEntry {
    pub kind: EntryKind,
    /// The block whose load address is added.
    pub target_block: usize,
    /// Bit address (within the image of the block holding the entry)
    /// of the start of the instruction or field.
    pub bit_address: u64,
    pub field_length: u32,
    /// The field holds a parcel address.
    pub parcel: bool,
}

/// A field of the image which must be filled in with the address of
/// an external symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEntry {
    pub kind: EntryKind,
    /// Index into the module's list of externals.
    pub external_index: usize,
    pub bit_address: u64,
    pub field_length: u32,
    pub parcel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Word address (within the block) of the first word.
    pub load_word: u64,
    pub words: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub index: usize,
    pub name: String,
    pub section_type: SectionType,
    pub residency: Residency,
    /// Size in words.
    pub size: u64,
    /// Word address of the start of the block.
    pub origin: u64,
    pub image: Option<Image>,
    pub relocations: Vec<RelocationEntry>,
    pub externals: Vec<ExternalEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    /// The block the entry point's address lies in, if it is an
    /// address.
    pub block: Option<usize>,
    pub value: u64,
    pub kind: AddressKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPoint {
    pub name: String,
    pub block: Option<usize>,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectModule {
    pub name: String,
    pub absolute: bool,
    pub stack_size: u64,
    pub comment: String,
    pub blocks: Vec<BlockRecord>,
    pub entries: Vec<EntryPoint>,
    pub externals: Vec<String>,
    pub start: Option<StartPoint>,
}

impl ObjectModule {
    /// A module with no blocks, entries or externals.
    #[must_use]
    pub fn empty(name: &str) -> ObjectModule {
        ObjectModule {
            name: name.to_string(),
            absolute: false,
            stack_size: 0,
            comment: String::new(),
            blocks: Vec::new(),
            entries: Vec::new(),
            externals: Vec::new(),
            start: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    ProgramDescription,
    Text,
    Relocation,
    ExternalTable,
    Names,
    Start,
}

impl RecordType {
    fn code(self) -> u64 {
        match self {
            RecordType::ProgramDescription => 1,
            RecordType::Text => 2,
            RecordType::Relocation => 3,
            RecordType::ExternalTable => 4,
            RecordType::Names => 5,
            RecordType::Start => 6,
        }
    }

    fn from_code(code: u64) -> Option<RecordType> {
        [
            RecordType::ProgramDescription,
            RecordType::Text,
            RecordType::Relocation,
            RecordType::ExternalTable,
            RecordType::Names,
            RecordType::Start,
        ]
        .into_iter()
        .find(|t| t.code() == code)
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordType::ProgramDescription => "PDT",
            RecordType::Text => "TXT",
            RecordType::Relocation => "REL",
            RecordType::ExternalTable => "XTB",
            RecordType::Names => "XNS",
            RecordType::Start => "START",
        })
    }
}

const NO_BLOCK: u64 = u64::MAX;
const EXTENDED_BIT: u64 = 1 << 63;
const PARCEL_BIT: u64 = 1 << 62;
const INDEX_SHIFT: u32 = 32;
const INDEX_MASK: u64 = (1 << 30) - 1;
const LENGTH_MASK: u64 = (1 << 32) - 1;

fn push_string(out: &mut Vec<u64>, s: &str) {
    out.push(s.len() as u64);
    out.extend(pack_bytes(s.as_bytes(), s.len(), Justification::LeftZero));
}

fn entry_word(kind: EntryKind, parcel: bool, index: usize, field_length: u32) -> u64 {
    let mut w = ((index as u64 & INDEX_MASK) << INDEX_SHIFT) | u64::from(field_length);
    if kind == EntryKind::Extended {
        w |= EXTENDED_BIT;
    }
    if parcel {
        w |= PARCEL_BIT;
    }
    w
}

fn block_word(block: Option<usize>) -> u64 {
    block.map_or(NO_BLOCK, |b| b as u64)
}

fn write_record(
    dataset: &mut dyn Dataset,
    record_type: RecordType,
    body: &[u64],
) -> Result<(), IoFailed> {
    event!(
        Level::TRACE,
        "{record_type} record, {} words",
        body.len()
    );
    dataset.write(&[(record_type.code() << 56) | body.len() as u64])?;
    dataset.write(body)?;
    dataset.write_eor()
}

/// Write one module as a file of the dataset.
///
/// # Errors
///
/// When the dataset cannot be written.
pub fn write_module(dataset: &mut dyn Dataset, module: &ObjectModule) -> Result<(), IoFailed> {
    let span = span!(Level::INFO, "write module", name = %module.name);
    let _enter = span.enter();

    let mut pdt = Vec::new();
    push_string(&mut pdt, &module.name);
    pdt.push(u64::from(module.absolute));
    pdt.push(module.stack_size);
    push_string(&mut pdt, &module.comment);
    pdt.push(module.blocks.len() as u64);
    for block in &module.blocks {
        push_string(&mut pdt, &block.name);
        pdt.push(
            ((block.index as u64) << INDEX_SHIFT)
                | (u64::from(block.section_type.code()) << 8)
                | u64::from(block.residency.code()),
        );
        pdt.push(block.size);
        pdt.push(block.origin);
    }
    pdt.push(module.entries.len() as u64);
    for entry in &module.entries {
        push_string(&mut pdt, &entry.name);
    }
    write_record(dataset, RecordType::ProgramDescription, &pdt)?;

    for block in &module.blocks {
        if let Some(image) = &block.image {
            let mut txt = vec![block.index as u64, image.load_word, image.words.len() as u64];
            txt.extend_from_slice(&image.words);
            write_record(dataset, RecordType::Text, &txt)?;
        }
    }
    for block in &module.blocks {
        if !block.relocations.is_empty() {
            let mut rel = vec![block.index as u64, block.relocations.len() as u64];
            for r in &block.relocations {
                rel.push(entry_word(r.kind, r.parcel, r.target_block, r.field_length));
                rel.push(r.bit_address);
            }
            write_record(dataset, RecordType::Relocation, &rel)?;
        }
    }
    for block in &module.blocks {
        if !block.externals.is_empty() {
            let mut xtb = vec![block.index as u64, block.externals.len() as u64];
            for x in &block.externals {
                xtb.push(entry_word(x.kind, x.parcel, x.external_index, x.field_length));
                xtb.push(x.bit_address);
            }
            write_record(dataset, RecordType::ExternalTable, &xtb)?;
        }
    }

    let mut xns = vec![module.externals.len() as u64];
    for name in &module.externals {
        push_string(&mut xns, name);
    }
    xns.push(module.entries.len() as u64);
    for entry in &module.entries {
        push_string(&mut xns, &entry.name);
        xns.push(block_word(entry.block));
        xns.push(entry.value);
        xns.push(entry.kind.code());
    }
    write_record(dataset, RecordType::Names, &xns)?;

    if let Some(start) = &module.start {
        let mut body = Vec::new();
        push_string(&mut body, &start.name);
        body.push(block_word(start.block));
        body.push(start.value);
        write_record(dataset, RecordType::Start, &body)?;
    }
    dataset.write_eof()
}

/// Write a complete object dataset.
///
/// # Errors
///
/// When the dataset cannot be written.
pub fn write_object_file(
    dataset: &mut dyn Dataset,
    modules: &[ObjectModule],
) -> Result<(), IoFailed> {
    for module in modules {
        write_module(dataset, module)?;
    }
    dataset.write_eod()?;
    dataset.close()
}

/// Reads the words of one record.
struct Cursor<'a> {
    words: &'a [u64],
    pos: usize,
    /// Offset of `words[0]` within the whole dataset, for messages.
    base: usize,
}

impl<'a> Cursor<'a> {
    fn bad<T>(&self, msg: &str) -> Result<T, AssemblerFailure> {
        Err(AssemblerFailure::BadObjectFile {
            word_offset: self.base + self.pos,
            msg: msg.to_string(),
        })
    }

    fn word(&mut self) -> Result<u64, AssemblerFailure> {
        match self.words.get(self.pos) {
            Some(w) => {
                self.pos += 1;
                Ok(*w)
            }
            None => self.bad("record is too short"),
        }
    }

    fn count(&mut self) -> Result<usize, AssemblerFailure> {
        let w = self.word()?;
        match usize::try_from(w) {
            Ok(n) if n <= self.words.len() * 8 => Ok(n),
            _ => self.bad("implausible count"),
        }
    }

    fn words(&mut self, n: usize) -> Result<&'a [u64], AssemblerFailure> {
        let end = self.pos + n;
        match self.words.get(self.pos..end) {
            Some(slice) => {
                self.pos = end;
                Ok(slice)
            }
            None => self.bad("record is too short"),
        }
    }

    fn string(&mut self) -> Result<String, AssemblerFailure> {
        let len = self.count()?;
        let packed = self.words(len.div_ceil(8))?;
        let bytes: Vec<u8> = packed
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .take(len)
            .collect();
        match String::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(_) => self.bad("string is not valid text"),
        }
    }

    fn block(&mut self) -> Result<Option<usize>, AssemblerFailure> {
        let w = self.word()?;
        if w == NO_BLOCK {
            Ok(None)
        } else {
            match usize::try_from(w) {
                Ok(b) => Ok(Some(b)),
                Err(_) => self.bad("bad block index"),
            }
        }
    }

    fn entry(&mut self) -> Result<(EntryKind, bool, usize, u32, u64), AssemblerFailure> {
        let w0 = self.word()?;
        let w1 = self.word()?;
        let kind = if w0 & EXTENDED_BIT != 0 {
            EntryKind::Extended
        } else {
            EntryKind::Standard
        };
        let index = usize::try_from((w0 >> INDEX_SHIFT) & INDEX_MASK).unwrap_or(usize::MAX);
        let length = u32::try_from(w0 & LENGTH_MASK).unwrap_or(u32::MAX);
        Ok((kind, w0 & PARCEL_BIT != 0, index, length, w1))
    }
}

fn find_block<'m>(
    module: &'m mut ObjectModule,
    index: u64,
    cursor: &Cursor<'_>,
) -> Result<&'m mut BlockRecord, AssemblerFailure> {
    match module.blocks.iter_mut().find(|b| b.index as u64 == index) {
        Some(b) => Ok(b),
        None => cursor.bad(&format!("no block {index}")),
    }
}

fn read_record(
    module: Option<&mut ObjectModule>,
    record_type: RecordType,
    cursor: &mut Cursor<'_>,
    entry_names: &mut Vec<String>,
) -> Result<Option<ObjectModule>, AssemblerFailure> {
    if record_type == RecordType::ProgramDescription {
        let mut m = ObjectModule::empty(&cursor.string()?);
        m.absolute = cursor.word()? & 1 != 0;
        m.stack_size = cursor.word()?;
        m.comment = cursor.string()?;
        let nblocks = cursor.count()?;
        for _ in 0..nblocks {
            let name = cursor.string()?;
            let w = cursor.word()?;
            let section_type = u8::try_from((w >> 8) & 0xFF)
                .ok()
                .and_then(SectionType::from_code);
            let residency = u8::try_from(w & 0xFF).ok().and_then(Residency::from_code);
            let (Some(section_type), Some(residency)) = (section_type, residency) else {
                return cursor.bad("bad block attributes");
            };
            let size = cursor.word()?;
            let origin = cursor.word()?;
            m.blocks.push(BlockRecord {
                index: usize::try_from(w >> INDEX_SHIFT).unwrap_or(usize::MAX),
                name,
                section_type,
                residency,
                size,
                origin,
                image: None,
                relocations: Vec::new(),
                externals: Vec::new(),
            });
        }
        let nentries = cursor.count()?;
        entry_names.clear();
        for _ in 0..nentries {
            entry_names.push(cursor.string()?);
        }
        return Ok(Some(m));
    }
    let Some(module) = module else {
        return cursor.bad(&format!("{record_type} record outside a module"));
    };
    match record_type {
        RecordType::ProgramDescription => (),
        RecordType::Text => {
            let index = cursor.word()?;
            let load_word = cursor.word()?;
            let n = cursor.count()?;
            let words = cursor.words(n)?.to_vec();
            find_block(module, index, cursor)?.image = Some(Image { load_word, words });
        }
        RecordType::Relocation => {
            let index = cursor.word()?;
            let n = cursor.count()?;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                let (kind, parcel, target_block, field_length, bit_address) = cursor.entry()?;
                entries.push(RelocationEntry {
                    kind,
                    target_block,
                    bit_address,
                    field_length,
                    parcel,
                });
            }
            find_block(module, index, cursor)?.relocations = entries;
        }
        RecordType::ExternalTable => {
            let index = cursor.word()?;
            let n = cursor.count()?;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                let (kind, parcel, external_index, field_length, bit_address) = cursor.entry()?;
                entries.push(ExternalEntry {
                    kind,
                    external_index,
                    bit_address,
                    field_length,
                    parcel,
                });
            }
            find_block(module, index, cursor)?.externals = entries;
        }
        RecordType::Names => {
            let n = cursor.count()?;
            for _ in 0..n {
                let name = cursor.string()?;
                module.externals.push(name);
            }
            let n = cursor.count()?;
            if n != entry_names.len() {
                return cursor.bad("entry point lists disagree");
            }
            for _ in 0..n {
                let name = cursor.string()?;
                let block = cursor.block()?;
                let value = cursor.word()?;
                let Some(kind) = AddressKind::from_code(cursor.word()?) else {
                    return cursor.bad("bad address kind");
                };
                module.entries.push(EntryPoint {
                    name,
                    block,
                    value,
                    kind,
                });
            }
        }
        RecordType::Start => {
            let name = cursor.string()?;
            let block = cursor.block()?;
            let value = cursor.word()?;
            module.start = Some(StartPoint { name, block, value });
        }
    }
    Ok(None)
}

/// Decode an object dataset written by [`write_object_file`].
///
/// # Errors
///
/// When `bytes` is not a well-formed object dataset.
pub fn read_object_stream(bytes: &[u8]) -> Result<Vec<ObjectModule>, AssemblerFailure> {
    if bytes.len() % 8 != 0 {
        return Err(AssemblerFailure::BadObjectFile {
            word_offset: bytes.len() / 8,
            msg: "length is not a whole number of words".to_string(),
        });
    }
    let words: Vec<u64> = bytes
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0_u8; 8];
            b.copy_from_slice(c);
            u64::from_be_bytes(b)
        })
        .collect();
    let mut modules = Vec::new();
    let mut current: Option<ObjectModule> = None;
    let mut entry_names = Vec::new();
    let mut pos = 0;
    while let Some(&control) = words.get(pos) {
        let here = Cursor {
            words: &words,
            pos,
            base: 0,
        };
        pos += 1;
        match control & CONTROL_MASK {
            CONTROL_EOD => {
                if current.is_some() {
                    return here.bad("end of data inside a file");
                }
                return Ok(modules);
            }
            CONTROL_EOF => match current.take() {
                Some(m) => modules.push(m),
                None => {
                    return here.bad("end of file without a module");
                }
            },
            CONTROL_RECORD => {
                let len = usize::try_from(control & !CONTROL_MASK).unwrap_or(usize::MAX);
                let Some(record) = words.get(pos..pos.saturating_add(len)) else {
                    return here.bad("record runs past the end of the data");
                };
                let mut cursor = Cursor {
                    words: record,
                    pos: 0,
                    base: pos,
                };
                pos += len;
                let header = cursor.word()?;
                let Some(record_type) = RecordType::from_code(header >> 56) else {
                    return cursor.bad("unknown record type");
                };
                if let Some(m) =
                    read_record(current.as_mut(), record_type, &mut cursor, &mut entry_names)?
                {
                    if current.is_some() {
                        return cursor.bad("PDT record inside a module");
                    }
                    current = Some(m);
                }
            }
            _ => {
                return here.bad("bad control word");
            }
        }
    }
    Err(AssemblerFailure::BadObjectFile {
        word_offset: pos,
        msg: "missing end of data".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;

    fn round_trip(modules: &[ObjectModule]) -> Vec<ObjectModule> {
        let mut ds = MemoryDataset::in_memory();
        write_object_file(&mut ds, modules).expect("write to memory");
        read_object_stream(&ds.into_inner()).expect("read back")
    }

    fn sample() -> ObjectModule {
        ObjectModule {
            name: "SAMPLE".to_string(),
            absolute: false,
            stack_size: 12,
            comment: "a comment longer than one word".to_string(),
            blocks: vec![BlockRecord {
                index: 0,
                name: String::new(),
                section_type: SectionType::Mixed,
                residency: Residency::Cm,
                size: 2,
                origin: 0,
                image: Some(Image {
                    load_word: 0,
                    words: vec![0o0071_0000_0000_0000_0000, 5],
                }),
                relocations: vec![RelocationEntry {
                    kind: EntryKind::Standard,
                    target_block: 0,
                    bit_address: 16,
                    field_length: 22,
                    parcel: true,
                }],
                externals: vec![ExternalEntry {
                    kind: EntryKind::Standard,
                    external_index: 0,
                    bit_address: 0,
                    field_length: 22,
                    parcel: true,
                }],
            }],
            entries: vec![EntryPoint {
                name: "GO".to_string(),
                block: Some(0),
                value: 4,
                kind: AddressKind::Parcel,
            }],
            externals: vec!["SUB".to_string()],
            start: Some(StartPoint {
                name: "GO".to_string(),
                block: Some(0),
                value: 4,
            }),
        }
    }

    #[test]
    fn test_round_trip() {
        let modules = vec![sample(), ObjectModule::empty("E")];
        assert_eq!(round_trip(&modules), modules);
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(round_trip(&[]), Vec::new());
    }

    #[test]
    fn test_truncated_stream() {
        let mut ds = MemoryDataset::in_memory();
        write_object_file(&mut ds, &[sample()]).expect("write to memory");
        let mut bytes = ds.into_inner();
        bytes.truncate(bytes.len() - 16);
        assert!(matches!(
            read_object_stream(&bytes),
            Err(AssemblerFailure::BadObjectFile { .. })
        ));
        assert!(read_object_stream(&[0; 3]).is_err());
    }
}
