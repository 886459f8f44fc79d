use std::time::UNIX_EPOCH;

use super::*;
use crate::context::Settings;
use crate::diagnostic::Diagnostic;
use crate::micro::Clock;
use crate::symtab::Pass;

fn assemble(result: &str, operand: &str) -> AsmContext {
    let mut ctx = AsmContext::new(Settings::default(), Clock::at(UNIX_EPOCH));
    ctx.pass = Pass::Two;
    ctx.machine_instruction(&Fields {
        result: result.to_string(),
        operand: operand.to_string(),
        ..Fields::default()
    });
    ctx
}

fn generated(result: &str, operand: &str) -> Vec<String> {
    let ctx = assemble(result, operand);
    assert!(
        ctx.statement.diagnostics.is_empty(),
        "{result} {operand}: unexpected diagnostics {:?}",
        ctx.statement.diagnostics
    );
    ctx.statement.generated
}

fn has_error(ctx: &AsmContext, kind: ErrorKind) -> bool {
    ctx.statement.diagnostics.contains(Diagnostic::Error(kind))
}

#[test]
fn test_table_builds() {
    assert_eq!(instruction_table().len(), INSTRUCTIONS.len());
}

#[test]
fn test_register_forms() {
    assert_eq!(generated("S1", "S2+S3"), ["060123"]);
    assert_eq!(generated("S1", "S2+FS3"), ["062123"]);
    assert_eq!(generated("A4", "B17"), ["024417"]);
    assert_eq!(generated("B17", "A4"), ["025417"]);
    assert_eq!(generated("S6", "S5"), ["051605"]);
    assert_eq!(generated("V1", "V2*FV3"), ["161123"]);
    assert_eq!(generated("EX", ""), ["004000"]);
}

#[test]
fn test_small_constant_load() {
    assert_eq!(generated("A1", "5"), ["022105"]);
}

#[test]
fn test_negative_constant_load() {
    assert_eq!(generated("A2", "-1"), ["021200 000000"]);
}

#[test]
fn test_mask_loads() {
    assert_eq!(generated("S1", ">8"), ["042170"]);
    assert_eq!(generated("S1", "<8"), ["043110"]);
}

#[test]
fn test_branch() {
    assert_eq!(generated("J", "100"), ["006000 000144"]);
}

#[test]
fn test_memory_reference() {
    assert_eq!(generated("A1", "100,A2"), ["102100 000144"]);
}

#[test]
fn test_shift_needs_same_register() {
    assert_eq!(generated("S1", "S1<3"), ["054103"]);
    let ctx = assemble("S1", "S2<3");
    assert!(has_error(&ctx, ErrorKind::OperandField));
    assert!(ctx.statement.generated.is_empty());
}

#[test]
fn test_unknown_result() {
    let ctx = assemble("XYZ", "A1");
    assert!(has_error(&ctx, ErrorKind::ResultField));
}

#[test]
fn test_bad_operand() {
    let ctx = assemble("A1", "S2&S3");
    assert!(has_error(&ctx, ErrorKind::OperandField));
}
