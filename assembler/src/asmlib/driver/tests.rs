use base::prelude::{split_parcels, WORD_BITS};

use super::super::diagnostic::{ErrorKind, WarningKind};
use super::super::object::{EntryKind, ExternalEntry, ObjectModule};
use super::super::options::Options;
use super::*;

/// Assemble statements given one per element, each already laid out
/// in columns.
fn assemble(lines: &[&str]) -> Assembly {
    assemble_with(lines, &Options::default())
}

fn assemble_with(lines: &[&str], options: &Options) -> Assembly {
    let mut text = lines.join("\n");
    text.push('\n');
    assemble_text(&text, options)
}

fn assemble_cleanly(lines: &[&str]) -> Assembly {
    let assembly = assemble(lines);
    assert_eq!(
        assembly.tally.errors, 0,
        "unexpected errors: {:?}",
        assembly.reports
    );
    assembly
}

fn only_module(assembly: &Assembly) -> &ObjectModule {
    match assembly.objects.as_slice() {
        [module] => module,
        other => panic!("expected exactly one object module, got {other:?}"),
    }
}

/// The parcels of the image of block `index`.
fn parcels(module: &ObjectModule, index: usize) -> Vec<u16> {
    module.blocks[index]
        .image
        .as_ref()
        .map(|image| image.words.iter().flat_map(|w| split_parcels(*w)).collect())
        .unwrap_or_default()
}

#[test]
fn test_empty_module() {
    let assembly = assemble_cleanly(&["         IDENT    M", "         END"]);
    let module = only_module(&assembly);
    assert_eq!(module.name, "M");
    assert_eq!(module.blocks.len(), 2);
    assert!(module.blocks.iter().all(|b| b.size == 0 && b.image.is_none()));
    assert!(module.entries.is_empty());
    assert!(module.externals.is_empty());
    assert!(module.start.is_none());
}

#[test]
fn test_simple_absolute_module() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         ABS",
        "         ORG      100",
        "         A1       5",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert!(module.absolute);
    let code = &module.blocks[0];
    assert_eq!(code.origin, 100);
    assert_eq!(code.size, 1);
    assert!(code.relocations.is_empty());
    assert!(code.externals.is_empty());
    assert_eq!(parcels(module, 0), [0o022_105, 0, 0, 0]);
    assert!(module.externals.is_empty());
}

#[test]
fn test_external_call() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         EXT      SUB",
        "         R        SUB",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_eq!(module.externals, ["SUB"]);
    assert_eq!(
        module.blocks[0].externals,
        [ExternalEntry {
            kind: EntryKind::Standard,
            external_index: 0,
            bit_address: 0,
            field_length: 22,
            parcel: true,
        }]
    );
}

/// Every relocation and external field lies inside the image of the
/// block holding it, and refers to a block or external which exists.
fn assert_tables_fit_images(module: &ObjectModule) {
    let word_bits = u64::from(WORD_BITS);
    for block in &module.blocks {
        let (low, high) = block.image.as_ref().map_or((0, 0), |image| {
            let low = image.load_word * word_bits;
            (low, low + image.words.len() as u64 * word_bits)
        });
        for r in &block.relocations {
            assert!(r.target_block < module.blocks.len(), "{r:?}");
            assert!(
                low <= r.bit_address && r.bit_address + u64::from(r.field_length) <= high,
                "{r:?} lies outside the image of block {}",
                block.index
            );
        }
        for x in &block.externals {
            assert!(x.external_index < module.externals.len(), "{x:?}");
            assert!(
                low <= x.bit_address && x.bit_address + u64::from(x.field_length) <= high,
                "{x:?} lies outside the image of block {}",
                block.index
            );
        }
    }
}

#[test]
fn test_tables_of_several_sections_fit_their_blocks() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         EXT      SUB",
        "         ENTRY    GO",
        "TABLES   SECTION  DATA",
        "VALS     CON      1,2",
        "PTRS     CON      GO,SUB",
        "         SECTION  *",
        "GO       S1       VALS",
        "         S2       =X'FF'",
        "         R        SUB",
        "         S3       LATER",
        "LATER    CON      7",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_eq!(module.blocks.len(), 3);
    assert_eq!(module.blocks[2].name, "TABLES");
    assert_eq!(module.blocks[2].size, 4);
    assert_tables_fit_images(module);

    let targets: Vec<usize> = module.blocks[0]
        .relocations
        .iter()
        .map(|r| r.target_block)
        .collect();
    assert_eq!(targets, [2, 1, 0]);
    assert_eq!(module.blocks[0].externals.len(), 1);
    assert_eq!(module.blocks[2].relocations.len(), 1);
    assert_eq!(module.blocks[2].relocations[0].target_block, 0);
    assert_eq!(module.blocks[2].externals.len(), 1);
    assert_eq!(module.entries[0].name, "GO");
    assert_eq!(module.entries[0].block, Some(0));
}

#[test]
fn test_absolute_sections_are_laid_out_consistently() {
    // A pass 2 value which differed from pass 1 would be reported as
    // a double definition.
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         ABS",
        "         ENTRY    VALS",
        "TABLES   SECTION  DATA",
        "VALS     CON      1",
        "         SECTION  *",
        "         S1       VALS",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_tables_fit_images(module);
    assert!(module.blocks.iter().all(|b| b.relocations.is_empty()));
    assert_eq!(module.blocks[0].origin, 0);
    assert_eq!(module.blocks[2].origin, 1);
    assert_eq!(module.entries[0].value, 1);
}

#[test]
fn test_literal_pooling() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         S1       =X'FF'",
        "         S2       =X'FF'",
        "         END",
    ]);
    let module = only_module(&assembly);
    let literals = &module.blocks[1];
    assert_eq!(
        literals.image.as_ref().map(|image| image.words.clone()),
        Some(vec![0xFF])
    );
    // Both loads address word 0 of the literals block.
    assert_eq!(parcels(module, 0), [0o120_100, 0, 0o120_200, 0]);
    let relocations = &module.blocks[0].relocations;
    assert_eq!(relocations.len(), 2);
    assert!(relocations.iter().all(|r| r.target_block == 1));
}

#[test]
fn test_macro_expansion() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         MACRO",
        "         FOO      A,B=1",
        "         CON      A+B",
        "FOO      ENDM",
        "         FOO      10",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_eq!(
        module.blocks[0].image.as_ref().map(|image| image.words.clone()),
        Some(vec![11])
    );
}

#[test]
fn test_forward_reference() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         A1       LAB",
        "LAB      =        7",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_eq!(parcels(module, 0), [0o020_100, 7, 0, 0]);
}

#[test]
fn test_conditional_skip() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "COND     IFE      1,EQ,2",
        "         A1       1",
        "         A1       2",
        "         A1       3",
        "COND     ENDIF",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_eq!(module.blocks[0].size, 0);
    assert!(module.blocks[0].image.is_none());
}

#[test]
fn test_entry_points_and_start() {
    let assembly = assemble_cleanly(&[
        "         IDENT    M",
        "         ENTRY    GO",
        "         A1       1",
        "GO       A2       2",
        "         START    GO",
        "         END",
    ]);
    let module = only_module(&assembly);
    assert_eq!(module.entries.len(), 1);
    assert_eq!(module.entries[0].name, "GO");
    assert_eq!(module.entries[0].value, 1);
    assert_eq!(module.entries[0].block, Some(0));
    let start = module.start.as_ref().expect("START was given");
    assert_eq!(start.name, "GO");
    assert_eq!(start.value, 1);
}

#[test]
fn test_undefined_entry_point() {
    let assembly = assemble(&["         IDENT    M", "         ENTRY    NOWHERE", "         END"]);
    assert!(assembly.tally.saw(ErrorKind::Undefined));
    assert!(only_module(&assembly).entries.is_empty());
}

#[test]
fn test_missing_end_is_supplied() {
    let assembly = assemble(&["         IDENT    M", "         A1       1"]);
    assert_eq!(assembly.objects.len(), 1);
    assert_eq!(assembly.objects[0].name, "M");
}

#[test]
fn test_anonymous_module_is_named() {
    let options = Options {
        module_id: Some("averylongname".to_string()),
        ..Options::default()
    };
    let assembly = assemble_with(&["         A1       1"], &options);
    let module = only_module(&assembly);
    assert_eq!(module.name.len(), 8);
    assert!(module.name.starts_with("AVER"));
}

#[test]
fn test_undefined_symbol() {
    let assembly = assemble(&["         IDENT    M", "         A1       NOPE", "         END"]);
    assert!(assembly.failed(false));
    assert!(assembly.tally.saw(ErrorKind::Undefined));
    assert_eq!(assembly.reports.len(), 1);
    assert_eq!(assembly.reports[0].line, 2);
}

#[test]
fn test_implicit_externals() {
    let options = Options {
        implicit_externals: true,
        ..Options::default()
    };
    let assembly = assemble_with(
        &["         IDENT    M", "         R        NOPE", "         END"],
        &options,
    );
    assert_eq!(assembly.tally.errors, 0, "{:?}", assembly.reports);
    assert_eq!(only_module(&assembly).externals, ["NOPE"]);
}

#[test]
fn test_warnings_may_be_fatal() {
    let assembly = assemble(&[
        "         IDENT    M",
        "         ABS",
        "         EXT      X",
        "         END",
    ]);
    assert!(assembly.tally.saw(WarningKind::ExternalDeclaration));
    assert!(!assembly.failed(false));
    assert!(assembly.failed(true));
}

#[test]
fn test_modules_are_separate() {
    let assembly = assemble_cleanly(&[
        "         IDENT    ONE",
        "X        =        1",
        "         END",
        "         IDENT    TWO",
        "X        =        2",
        "         A1       X",
        "         END",
    ]);
    assert_eq!(assembly.objects.len(), 2);
    assert_eq!(parcels(&assembly.objects[1], 0), [0o022_102, 0, 0, 0]);
}

#[test]
fn test_listing_shows_source_and_summary() {
    let assembly = assemble(&["         IDENT    M", "         A1       NOPE", "         END"]);
    assert!(assembly.listing.contains("A1       NOPE"));
    assert!(assembly.listing.contains("1 error(s)"));
}

#[test]
fn test_reference_in_qualifier_to_later_global() {
    let lines = [
        "         IDENT    M",
        "         QUAL     Q",
        "         A1       H",
        "         QUAL     *",
        "H        =        1",
        "         END",
    ];
    let assembly = assemble_cleanly(&lines);
    assert_eq!(parcels(only_module(&assembly), 0), [0o020_100, 1, 0, 0]);

    let options = Options {
        implicit_externals: true,
        ..Options::default()
    };
    let assembly = assemble_with(&lines, &options);
    assert_eq!(assembly.tally.errors, 0, "{:?}", assembly.reports);
    assert!(only_module(&assembly).externals.is_empty());
}
