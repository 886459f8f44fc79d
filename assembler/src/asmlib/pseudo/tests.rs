use std::time::UNIX_EPOCH;

use super::super::context::{AsmContext, Settings};
use super::super::diagnostic::{ErrorKind, WarningKind};
use super::super::listing::Item;
use super::super::micro::Clock;
use super::super::state::ListFlags;
use super::super::symtab::{Pass, SymbolKey};

/// Run both passes over `lines`, which are outside any module.
fn assemble(lines: &[&str]) -> AsmContext {
    let mut ctx = AsmContext::new(Settings::default(), Clock::at(UNIX_EPOCH));
    for pass in [Pass::One, Pass::Two] {
        if pass == Pass::Two {
            for module in &mut ctx.modules {
                module.prepare_pass_two();
            }
        }
        ctx.pass = pass;
        ctx.reset_cursors();
        for (n, line) in lines.iter().enumerate() {
            ctx.assemble_statement(n + 1, line, None);
            ctx.run_frames();
        }
    }
    ctx
}

fn assemble_cleanly(lines: &[&str]) -> AsmContext {
    let ctx = assemble(lines);
    assert_eq!(ctx.tally.errors, 0, "unexpected errors: {:?}", ctx.reports);
    ctx
}

fn symbol_value(ctx: &AsmContext, name: &str) -> Option<u64> {
    ctx.current_module()
        .symbols
        .get(&SymbolKey::new("", name))
        .map(|sym| sym.value.numeric)
}

fn micro(ctx: &AsmContext, name: &str) -> Option<String> {
    ctx.current_module().micros.get(name).cloned()
}

#[test]
fn test_set_is_redefinable_but_equ_is_not() {
    let ctx = assemble_cleanly(&[
        "X        SET      1",
        "X        SET      2",
        "Y        EQU      3",
    ]);
    assert_eq!(symbol_value(&ctx, "X"), Some(2));
    assert_eq!(symbol_value(&ctx, "Y"), Some(3));

    let ctx = assemble(&["Y        EQU      3", "Y        EQU      4"]);
    assert!(ctx.tally.saw(ErrorKind::DoubleDefinition));
}

#[test]
fn test_equ_needs_a_location() {
    let ctx = assemble(&["         =        3"]);
    assert!(ctx.tally.saw(ErrorKind::LocationField));
}

#[test]
fn test_micro_selects_characters() {
    let ctx = assemble_cleanly(&[
        "ALL      MICRO    'ABCDEF'",
        "PART     MICRO    'ABCDEF',3,2",
        "LEN      MICSIZE  PART",
    ]);
    assert_eq!(micro(&ctx, "ALL").as_deref(), Some("ABCDEF"));
    assert_eq!(micro(&ctx, "PART").as_deref(), Some("BCD"));
    assert_eq!(symbol_value(&ctx, "LEN"), Some(3));
}

#[test]
fn test_micro_substitution_in_operand() {
    let ctx = assemble_cleanly(&["M        MICRO    '5'", "         A1       \"M\""]);
    assert_eq!(ctx.current_section().location_parcel(), 1);
}

#[test]
fn test_numeric_micros() {
    let ctx = assemble_cleanly(&[
        "D        DECMIC   10,4",
        "O        OCTMIC   8",
        "N        DECMIC   -7",
    ]);
    assert_eq!(micro(&ctx, "D").as_deref(), Some("0010"));
    assert_eq!(micro(&ctx, "O").as_deref(), Some("10"));
    assert_eq!(micro(&ctx, "N").as_deref(), Some("-7"));

    let ctx = assemble(&["D        DECMIC   12345,2"]);
    assert!(ctx.tally.saw(ErrorKind::FieldWidth));
}

#[test]
fn test_opsyn() {
    let ctx = assemble_cleanly(&["EQUALS   OPSYN    EQU", "X        EQUALS   3"]);
    assert_eq!(symbol_value(&ctx, "X"), Some(3));
}

#[test]
fn test_ifa_defined() {
    let ctx = assemble_cleanly(&[
        "X        =        1",
        "A        IFA      DEF,X",
        "         A1       1",
        "A        ENDIF",
        "B        IFA      DEF,NOTHERE",
        "         A1       2",
        "B        ENDIF",
        "         IFA      #DEF,NOTHERE,1",
        "         A1       3",
    ]);
    assert_eq!(ctx.current_section().location_parcel(), 2);
}

#[test]
fn test_ifc_compares_strings() {
    let ctx = assemble_cleanly(&[
        "         IFC      'AB',LT,'AC',1",
        "         A1       1",
        "         IFC      'AB',EQ,'AC',1",
        "         A1       2",
    ]);
    assert_eq!(ctx.current_section().location_parcel(), 1);
}

#[test]
fn test_ife_with_else() {
    let ctx = assemble_cleanly(&[
        "C        IFE      2,GT,1",
        "         A1       1",
        "C        ELSE",
        "         A1       2",
        "         A1       3",
        "C        ENDIF",
        "         A1       4",
    ]);
    assert_eq!(ctx.current_section().location_parcel(), 2);
    assert!(ctx.skip.is_none());
}

#[test]
fn test_ife_false_takes_else() {
    let ctx = assemble_cleanly(&[
        "C        IFE      1,GT,2",
        "         A1       1",
        "C        ELSE",
        "         A1       2",
        "         A1       3",
        "C        ENDIF",
    ]);
    assert_eq!(ctx.current_section().location_parcel(), 2);
}

#[test]
fn test_ife_on_later_symbol_is_false_in_both_passes() {
    let ctx = assemble(&[
        "C        IFE      N,EQ,1",
        "         A1       1",
        "C        ENDIF",
        "X        A2       2",
        "N        =        1",
    ]);
    assert!(ctx.tally.saw(ErrorKind::Undefined));
    assert!(!ctx.tally.saw(ErrorKind::DoubleDefinition));
    assert!(ctx.reports.iter().all(|report| report.line == 1));
    assert_eq!(symbol_value(&ctx, "X"), Some(0));
}

#[test]
fn test_else_needs_a_location() {
    let ctx = assemble(&["         ELSE"]);
    assert!(ctx.tally.saw(ErrorKind::LocationField));
}

#[test]
fn test_skip() {
    let ctx = assemble_cleanly(&[
        "         SKIP     2",
        "         A1       1",
        "         A1       2",
        "         A1       3",
    ]);
    assert_eq!(ctx.current_section().location_parcel(), 1);
}

#[test]
fn test_errif() {
    let ctx = assemble(&["         ERRIF    1,EQ,1"]);
    assert!(ctx.tally.saw(ErrorKind::Programmer));
    let ctx = assemble(&["         ERRIF    1,EQ,2"]);
    assert_eq!(ctx.tally.errors, 0);
}

#[test]
fn test_error_indicator_from_location() {
    let ctx = assemble(&["         ERROR"]);
    assert!(ctx.tally.saw(ErrorKind::Programmer));
    let ctx = assemble(&["W        ERROR"]);
    assert!(ctx.tally.saw(ErrorKind::FieldWidth));
    assert!(!ctx.tally.saw(ErrorKind::Programmer));
    let ctx = assemble(&["XY       ERROR"]);
    assert!(ctx.tally.saw(ErrorKind::LocationField));
}

#[test]
fn test_list_push_and_restore() {
    let ctx = assemble_cleanly(&["         LIST     MAC,NOXRF"]);
    assert!(ctx.list.contains(ListFlags::MAC));
    assert!(!ctx.list.contains(ListFlags::XRF));

    let ctx = assemble_cleanly(&["         LIST     MAC", "         LIST     *"]);
    assert_eq!(ctx.list, ListFlags::default());

    let ctx = assemble(&["         LIST     *"]);
    assert!(ctx.tally.saw(ErrorKind::OperandField));

    let ctx = assemble(&["         LIST     NOSUCH"]);
    assert!(ctx.tally.saw(ErrorKind::OperandField));
}

#[test]
fn test_titles_are_listed() {
    let ctx = assemble_cleanly(&["         TITLE    'PAYROLL'", "         SPACE    2"]);
    let items = ctx.listing.items();
    assert!(items
        .iter()
        .any(|item| matches!(item, Item::Title(t) if t == "PAYROLL")));
    assert!(items.iter().any(|item| matches!(item, Item::Space(2))));
}

#[test]
fn test_named_dup() {
    let ctx = assemble_cleanly(&[
        "REP      DUP      3",
        "         A1       1",
        "REP      ENDDUP",
        "         A2       2",
    ]);
    assert_eq!(ctx.current_section().location_parcel(), 4);
}

#[test]
fn test_dup_of_nothing() {
    let ctx = assemble_cleanly(&["         DUP      5,0", "         A1       1"]);
    assert_eq!(ctx.current_section().location_parcel(), 1);
    assert!(ctx.capture.is_none());
}

#[test]
fn test_stray_macro_end() {
    let ctx = assemble(&["FOO      ENDM"]);
    assert!(ctx.tally.saw(ErrorKind::IllegalNesting));
}

#[test]
fn test_bss_reserves_words() {
    let ctx = assemble_cleanly(&["         BSS      3", "LAB      CON      1"]);
    assert_eq!(ctx.current_section().location_word(), 4);
    assert_eq!(symbol_value(&ctx, "LAB"), Some(3));
}

#[test]
fn test_loc_cannot_move_backwards() {
    let ctx = assemble(&["         BSS      3", "         LOC      1"]);
    assert!(ctx.tally.saw(ErrorKind::OperandField));
}

#[test]
fn test_bitw_forces_word_boundary() {
    let ctx = assemble_cleanly(&["         A1       1", "         BITW     64"]);
    assert_eq!(ctx.current_section().location_parcel(), 4);
    let ctx = assemble(&["         BITW     65"]);
    assert!(ctx.tally.saw(ErrorKind::FieldWidth));
}

#[test]
fn test_vwd_packs_fields() {
    let ctx = assemble_cleanly(&["         VWD      8/1,8/2"]);
    assert_eq!(ctx.current_section().location_parcel(), 1);
    let ctx = assemble_cleanly(&["         VWD      2/7"]);
    assert!(ctx.tally.saw(WarningKind::Truncation));
}

#[test]
fn test_ident_nesting() {
    let ctx = assemble(&["         END"]);
    assert!(ctx.tally.saw(ErrorKind::IllegalNesting));
    let ctx = assemble(&["         IDENT    ONE", "         IDENT    TWO"]);
    assert!(ctx.tally.saw(ErrorKind::IllegalNesting));
}

#[test]
fn test_external_in_absolute_module() {
    let ctx = assemble(&["         IDENT    M", "         ABS", "         EXT      X"]);
    assert!(ctx.tally.saw(WarningKind::ExternalDeclaration));
    assert_eq!(ctx.tally.errors, 0);
}

#[test]
fn test_sections() {
    let ctx = assemble_cleanly(&[
        "         IDENT    M",
        "TABLES   SECTION  DATA",
        "         CON      1",
        "         CON      2",
        "         SECTION  *",
        "         CON      3",
    ]);
    let module = ctx.current_module();
    let tables = module
        .sections
        .iter()
        .find(|s| s.name == "TABLES")
        .expect("TABLES section should exist");
    assert_eq!(tables.size_words(), 2);
    assert_eq!(ctx.current_section().name, "");
}

#[test]
fn test_unimplemented_pseudo_instruction() {
    let ctx = assemble(&["         LOCAL    X"]);
    assert!(ctx.tally.saw(ErrorKind::ResultField));
}
