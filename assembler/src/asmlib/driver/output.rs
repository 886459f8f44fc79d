//! Finishing modules, and writing the listing and the object file.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::{event, span, Level};

use base::prelude::WORD_BITS;

use super::super::context::AsmContext;
use super::super::dataset::BlockedDataset;
use super::super::diagnostic::ErrorKind;
use super::super::listing::Item;
use super::super::module::Module;
use super::super::object::{
    write_object_file, BlockRecord, EntryPoint, ExternalEntry, Image, ObjectModule,
    RelocationEntry, StartPoint,
};
use super::super::options::{Destination, Options};
use super::super::section::{Section, LITERALS_SECTION};
use super::super::state::ListFlags;
use super::super::symtab::{Pass, SymbolKey};
use super::super::types::{AssemblerFailure, IoAction, IoFailed, IoTarget};
use super::Assembly;

/// Place the literal pool at the end of the literals section.
fn flush_literals(module: &mut Module) -> Result<(), ErrorKind> {
    let words: Vec<(u64, u64)> = module
        .literals
        .iter()
        .flat_map(|lit| (lit.offset..).zip(lit.words.iter().copied()))
        .collect();
    let size = module.literals.size();
    let section = module.section_mut(LITERALS_SECTION);
    let base = section.origin_bit_address();
    let written = words.into_iter().try_for_each(|(offset, word)| {
        section
            .block
            .write_bits(base + offset * u64::from(WORD_BITS), WORD_BITS, word)
    });
    section.advance(size * u64::from(WORD_BITS));
    written
}

fn block_record(index: usize, section: &Section) -> BlockRecord {
    let origin = section.base_word();
    let origin_bits = origin * u64::from(WORD_BITS);
    let image = section.block.image().map(|(first, words)| Image {
        load_word: first.saturating_sub(origin),
        words: words.to_vec(),
    });
    BlockRecord {
        index,
        name: section.name.clone(),
        section_type: section.section_type,
        residency: section.residency,
        size: section.size_words(),
        origin,
        image,
        relocations: section
            .block
            .relocations
            .iter()
            .map(|r| RelocationEntry {
                bit_address: r.bit_address.saturating_sub(origin_bits),
                ..r.clone()
            })
            .collect(),
        externals: section
            .block
            .externals
            .iter()
            .map(|x| ExternalEntry {
                bit_address: x.bit_address.saturating_sub(origin_bits),
                ..x.clone()
            })
            .collect(),
    }
}

/// Build the object module.  Entry points which were never defined
/// are left out, and returned.
fn object_module(module: &Module) -> (ObjectModule, Vec<SymbolKey>) {
    let mut undefined = Vec::new();
    let mut entries = Vec::new();
    for key in &module.entries {
        match module.symbols.get(key).map(|sym| sym.value) {
            Some(value) if !value.is_undefined() && !value.is_external() => {
                entries.push(EntryPoint {
                    name: key.name.clone(),
                    block: value.section.map(|s| s.0),
                    value: value.numeric,
                    kind: value.address_kind(),
                });
            }
            _ => undefined.push(key.clone()),
        }
    }
    let start = module.start.as_ref().and_then(|key| {
        module.symbols.get(key).map(|sym| StartPoint {
            name: key.name.clone(),
            block: sym.value.section.map(|s| s.0),
            value: sym.value.numeric,
        })
    });
    let object = ObjectModule {
        name: module.name.clone(),
        absolute: module.absolute,
        stack_size: module.stack_size,
        comment: module.comment.clone(),
        blocks: module
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| block_record(index, section))
            .collect(),
        entries,
        externals: module.externals.iter().map(|k| k.name.clone()).collect(),
        start,
    };
    (object, undefined)
}

fn qualified_name(key: &SymbolKey) -> String {
    if key.qualifier.is_empty() {
        key.name.clone()
    } else {
        format!("/{}/{}", key.qualifier, key.name)
    }
}

impl AsmContext {
    /// Finish the current module: place its literals and, in pass 2,
    /// produce its object module and its symbol table listing.
    pub(crate) fn close_module(&mut self) {
        if let Err(kind) = flush_literals(self.current_module_mut()) {
            self.error(kind);
        }
        self.current_module_mut().ended = true;
        if self.pass != Pass::Two {
            return;
        }
        let module = self.current_module();
        if self.module == 0 && module.is_empty() {
            return;
        }
        let (object, undefined) = object_module(module);
        let symbols: Vec<(String, String)> = module
            .symbols
            .iter()
            .filter(|(key, _)| !module.symbols.is_shadow(key))
            .map(|(key, sym)| (qualified_name(&key), sym.value.to_string()))
            .collect();
        if self.list.contains(ListFlags::ON | ListFlags::XRF) {
            self.listing.push(Item::Symbols {
                module: object.name.clone(),
                symbols,
            });
        }
        for key in undefined {
            event!(Level::DEBUG, "entry point {} is undefined", key.name);
            self.error(ErrorKind::Undefined);
        }
        event!(
            Level::DEBUG,
            "module {} has {} block(s)",
            object.name,
            object.blocks.len()
        );
        self.objects.push(object);
    }
}

fn write_listing(listing: &str, destination: &Destination) -> Result<(), AssemblerFailure> {
    match destination {
        Destination::Suppressed => Ok(()),
        Destination::Stdout => io::stdout()
            .lock()
            .write_all(listing.as_bytes())
            .map_err(|error| {
                AssemblerFailure::Io(IoFailed {
                    action: IoAction::Write,
                    target: IoTarget::Stdout,
                    error,
                })
            }),
        Destination::File(path) => std::fs::write(path, listing)
            .map_err(|e| AssemblerFailure::Io(IoFailed::on_file(IoAction::Write, path, e))),
    }
}

fn write_object_to_file(path: &Path, objects: &[ObjectModule]) -> Result<(), AssemblerFailure> {
    let file = File::create(path).map_err(|e| IoFailed::on_file(IoAction::Open, path, e))?;
    let target = IoTarget::File(path.to_path_buf());
    let mut dataset = BlockedDataset::new(BufWriter::new(file), target);
    write_object_file(&mut dataset, objects)?;
    Ok(())
}

fn write_objects(
    objects: &[ObjectModule],
    destination: &Destination,
) -> Result<(), AssemblerFailure> {
    let span = span!(Level::INFO, "write objects", modules = objects.len());
    let _enter = span.enter();
    match destination {
        Destination::Suppressed => Ok(()),
        Destination::Stdout => {
            let mut dataset = BlockedDataset::new(io::stdout().lock(), IoTarget::Stdout);
            write_object_file(&mut dataset, objects)?;
            Ok(())
        }
        Destination::File(path) => write_object_to_file(path, objects),
    }
}

/// Write the listing, and the object file unless there were errors.
pub(super) fn write_outputs(
    assembly: &Assembly,
    options: &Options,
) -> Result<(), AssemblerFailure> {
    write_listing(&assembly.listing, &options.listing)?;
    if assembly.tally.errors > 0 {
        event!(
            Level::WARN,
            "not writing the object file because of {} error(s)",
            assembly.tally.errors
        );
        return Ok(());
    }
    write_objects(&assembly.objects, &options.object)
}
