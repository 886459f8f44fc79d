//! The machine instructions, and how each is encoded.
use std::sync::OnceLock;

use base::prelude::{
    fits_field, fits_unsigned, g_h_i_jkm, gh_i_jkm, gh_ijkm, f64_to_cray, JKM_BITS,
};

use super::context::AsmContext;
use super::diagnostic::{ErrorKind, WarningKind};
use super::eval::Evaluation;
use super::expr::{Expr, UnaryOp};
use super::fields::Fields;
use super::lexer::tokenize;
use super::matcher::{Arg, FieldTokens, MatchError, Matcher};
use super::value::{AddressKind, Value};

/// Width of the parcel address in a branch instruction.
const BRANCH_ADDRESS_BITS: u32 = 24;

/// Where a field of the instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Part {
    /// The number of the n'th register in the statement.
    Reg(usize),
    /// A fixed value.
    Lit(u8),
}

use Part::{Lit, Reg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    /// `gh i j k`
    Fields { gh: u8, i: Part, j: Part, k: Part },
    /// `gh i jk`, where `jk` is a register number.
    Wide { gh: u8, i: Part, jk: Part },
    /// `gh ijk` with a fixed `ijk`.
    Constant { gh: u8, ijk: u16 },
    /// A branch to the parcel address given by argument `address`.
    Branch { gh: u8, address: usize },
    /// A memory reference, `g h i jkm`.  Without an address the
    /// address is zero; without an index register `h` is zero.
    Memory {
        g: u8,
        i: usize,
        address: Option<usize>,
        index: Option<usize>,
    },
    /// `Ai exp`
    LoadA { i: usize, value: usize },
    /// `Si exp`
    LoadS { i: usize, value: usize },
    /// Shift register argument `i` by a constant.
    Shift {
        gh: u8,
        i: usize,
        count: usize,
        right: bool,
    },
    /// `SMjk 0` or `SMjk 1`.
    SetSemaphore { jk: usize, value: usize },
    /// `SMjk 1,TS`
    TestSemaphore { jk: usize, value: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rule {
    pub(crate) encoding: Encoding,
    /// Two register arguments which must name the same register.
    pub(crate) same: Option<(usize, usize)>,
}

const fn fields(gh: u8, i: Part, j: Part, k: Part) -> Rule {
    Rule {
        encoding: Encoding::Fields { gh, i, j, k },
        same: None,
    }
}

const fn ijk(gh: u8) -> Rule {
    fields(gh, Reg(0), Reg(1), Reg(2))
}

const fn wide(gh: u8, i: Part, jk: Part) -> Rule {
    Rule {
        encoding: Encoding::Wide { gh, i, jk },
        same: None,
    }
}

const fn constant(gh: u8, ijk: u16) -> Rule {
    Rule {
        encoding: Encoding::Constant { gh, ijk },
        same: None,
    }
}

const fn branch(gh: u8) -> Rule {
    Rule {
        encoding: Encoding::Branch { gh, address: 0 },
        same: None,
    }
}

const fn memory(g: u8, i: usize, address: Option<usize>, index: Option<usize>) -> Rule {
    Rule {
        encoding: Encoding::Memory {
            g,
            i,
            address,
            index,
        },
        same: None,
    }
}

const fn shift(gh: u8, right: bool) -> Rule {
    Rule {
        encoding: Encoding::Shift {
            gh,
            i: 1,
            count: 2,
            right,
        },
        same: None,
    }
}

const fn same(rule: Rule, a: usize, b: usize) -> Rule {
    Rule {
        same: Some((a, b)),
        ..rule
    }
}

const fn only(encoding: Encoding) -> Rule {
    Rule {
        encoding,
        same: None,
    }
}

/// Register arguments are numbered in the order the registers appear
/// in the pattern, including fixed registers (`A0`) and registers
/// without a number (`VL`).
const INSTRUCTIONS: &[(&str, Rule)] = &[
    ("ERR", constant(0o000, 0)),
    ("PASS", constant(0o001, 0)),
    ("CA,Aj Ak", fields(0o001, Lit(0), Reg(1), Reg(2))),
    ("CL,Aj Ak", fields(0o001, Lit(1), Reg(1), Reg(2))),
    ("CI,Aj", fields(0o001, Lit(2), Reg(1), Lit(0))),
    ("MC,Aj", fields(0o001, Lit(2), Reg(1), Lit(1))),
    ("XA Aj", fields(0o001, Lit(3), Reg(1), Lit(0))),
    ("RT Sj", fields(0o001, Lit(4), Reg(1), Lit(0))),
    ("VL Ak", fields(0o002, Lit(0), Lit(0), Reg(1))),
    ("EFI", constant(0o002, 0o100)),
    ("DFI", constant(0o002, 0o200)),
    ("ERI", constant(0o002, 0o300)),
    ("DRI", constant(0o002, 0o400)),
    ("DBM", constant(0o002, 0o500)),
    ("EBM", constant(0o002, 0o600)),
    ("CMR", constant(0o002, 0o700)),
    ("VM Sj", fields(0o003, Lit(0), Reg(1), Lit(0))),
    (
        "SMjk $,TS",
        only(Encoding::TestSemaphore { jk: 0, value: 1 }),
    ),
    ("SMjk $", only(Encoding::SetSemaphore { jk: 0, value: 1 })),
    ("EX", constant(0o004, 0)),
    ("J Bjk", wide(0o005, Lit(0), Reg(0))),
    ("J $", branch(0o006)),
    ("R $", branch(0o007)),
    ("JAZ $", branch(0o010)),
    ("JAN $", branch(0o011)),
    ("JAP $", branch(0o012)),
    ("JAM $", branch(0o013)),
    ("JSZ $", branch(0o014)),
    ("JSN $", branch(0o015)),
    ("JSP $", branch(0o016)),
    ("JSM $", branch(0o017)),
    ("Ai $", only(Encoding::LoadA { i: 0, value: 1 })),
    ("Ai Sj", fields(0o023, Reg(0), Reg(1), Lit(0))),
    ("Ai VL", fields(0o023, Reg(0), Lit(0), Lit(1))),
    ("Ai Bjk", wide(0o024, Reg(0), Reg(1))),
    ("Bjk Ai", wide(0o025, Reg(1), Reg(0))),
    ("Ai PSj", fields(0o026, Reg(0), Reg(1), Lit(0))),
    ("Ai QSj", fields(0o026, Reg(0), Reg(1), Lit(1))),
    ("Ai SBj", fields(0o026, Reg(0), Reg(1), Lit(7))),
    ("Ai ZSj", fields(0o027, Reg(0), Reg(1), Lit(0))),
    ("SBj Ai", fields(0o027, Reg(1), Reg(0), Lit(7))),
    ("Ai Aj+Ak", ijk(0o030)),
    ("Ai Ak", fields(0o030, Reg(0), Lit(0), Reg(1))),
    ("Ai Aj-Ak", ijk(0o031)),
    ("Ai -Ak", fields(0o031, Reg(0), Lit(0), Reg(1))),
    ("Ai Aj*Ak", ijk(0o032)),
    ("Ai CI", fields(0o033, Reg(0), Lit(0), Lit(0))),
    ("Ai CA,Aj", fields(0o033, Reg(0), Reg(2), Lit(0))),
    ("Ai CE,Aj", fields(0o033, Reg(0), Reg(2), Lit(1))),
    ("Bjk,Ai ,A0", wide(0o034, Reg(1), Reg(0))),
    (",A0 Bjk,Ai", wide(0o035, Reg(2), Reg(1))),
    ("Tjk,Ai ,A0", wide(0o036, Reg(1), Reg(0))),
    (",A0 Tjk,Ai", wide(0o037, Reg(2), Reg(1))),
    ("Ai $,Ah", memory(0o10, 0, Some(1), Some(2))),
    ("Ai $,", memory(0o10, 0, Some(1), None)),
    ("Ai ,Ah", memory(0o10, 0, None, Some(1))),
    ("$,Ah Ai", memory(0o11, 2, Some(0), Some(1))),
    ("$, Ai", memory(0o11, 1, Some(0), None)),
    (",Ah Ai", memory(0o11, 1, None, Some(0))),
    ("Si $,Ah", memory(0o12, 0, Some(1), Some(2))),
    ("Si $,", memory(0o12, 0, Some(1), None)),
    ("Si ,Ah", memory(0o12, 0, None, Some(1))),
    ("$,Ah Si", memory(0o13, 2, Some(0), Some(1))),
    ("$, Si", memory(0o13, 1, Some(0), None)),
    (",Ah Si", memory(0o13, 1, None, Some(0))),
    ("Si $", only(Encoding::LoadS { i: 0, value: 1 })),
    ("Si Sj&Sk", ijk(0o044)),
    ("Si #Sk&Sj", fields(0o045, Reg(0), Reg(2), Reg(1))),
    ("Si Sj\\Sk", ijk(0o046)),
    ("Si #Sj\\Sk", ijk(0o047)),
    ("Si Sj!Si&Sk", same(fields(0o050, Reg(0), Reg(1), Reg(3)), 0, 2)),
    ("Si Sj!Sk", ijk(0o051)),
    ("Si Sk", fields(0o051, Reg(0), Lit(0), Reg(1))),
    ("S0 Si<$", shift(0o052, false)),
    ("S0 Si>$", shift(0o053, true)),
    ("Si Si<$", same(shift(0o054, false), 0, 1)),
    ("Si Si>$", same(shift(0o055, true), 0, 1)),
    ("Si Si,Sj<Ak", same(fields(0o056, Reg(0), Reg(2), Reg(3)), 0, 1)),
    ("Si Sj,Si>Ak", same(fields(0o057, Reg(0), Reg(1), Reg(3)), 0, 2)),
    ("Si Sj+Sk", ijk(0o060)),
    ("Si Sj-Sk", ijk(0o061)),
    ("Si -Sk", fields(0o061, Reg(0), Lit(0), Reg(1))),
    ("Si Sj+FSk", ijk(0o062)),
    ("Si Sj-FSk", ijk(0o063)),
    ("Si Sj*FSk", ijk(0o064)),
    ("Si Sj*HSk", ijk(0o065)),
    ("Si Sj*RSk", ijk(0o066)),
    ("Si Sj*ISk", ijk(0o067)),
    ("Si /HSj", fields(0o070, Reg(0), Reg(1), Lit(0))),
    ("Si Ak", fields(0o071, Reg(0), Lit(0), Reg(1))),
    ("Si +Ak", fields(0o071, Reg(0), Lit(1), Reg(1))),
    ("Si +FAk", fields(0o071, Reg(0), Lit(2), Reg(1))),
    ("Si RT", fields(0o072, Reg(0), Lit(0), Lit(0))),
    ("Si SM", fields(0o072, Reg(0), Lit(0), Lit(2))),
    ("Si STj", fields(0o072, Reg(0), Reg(1), Lit(3))),
    ("Si VM", fields(0o073, Reg(0), Lit(0), Lit(0))),
    ("Si SRj", fields(0o073, Reg(0), Reg(1), Lit(1))),
    ("SM Si", fields(0o073, Reg(1), Lit(0), Lit(2))),
    ("STj Si", fields(0o073, Reg(1), Reg(0), Lit(3))),
    ("Si Tjk", wide(0o074, Reg(0), Reg(1))),
    ("Tjk Si", wide(0o075, Reg(1), Reg(0))),
    ("Si Vj,Ak", ijk(0o076)),
    ("Vi,Ak Sj", fields(0o077, Reg(0), Reg(2), Reg(1))),
    ("Vi Sj&Vk", ijk(0o140)),
    ("Vi Vj&Vk", ijk(0o141)),
    ("Vi Sj!Vk", ijk(0o142)),
    ("Vi Vk", fields(0o142, Reg(0), Lit(0), Reg(1))),
    ("Vi Vj!Vk", ijk(0o143)),
    ("Vi Sj\\Vk", ijk(0o144)),
    ("Vi Vj\\Vk", ijk(0o145)),
    ("Vi Sj!Vk&VM", ijk(0o146)),
    ("Vi Vj!Vk&VM", ijk(0o147)),
    ("Vi Vj<Ak", ijk(0o150)),
    ("Vi Vj>Ak", ijk(0o151)),
    ("Vi Vj,Vj<Ak", same(fields(0o152, Reg(0), Reg(1), Reg(3)), 1, 2)),
    ("Vi Vj,Vj>Ak", same(fields(0o153, Reg(0), Reg(1), Reg(3)), 1, 2)),
    ("Vi Sj+Vk", ijk(0o154)),
    ("Vi Vj+Vk", ijk(0o155)),
    ("Vi Sj-Vk", ijk(0o156)),
    ("Vi Vj-Vk", ijk(0o157)),
    ("Vi Sj*FVk", ijk(0o160)),
    ("Vi Vj*FVk", ijk(0o161)),
    ("Vi Sj*HVk", ijk(0o162)),
    ("Vi Vj*HVk", ijk(0o163)),
    ("Vi Sj*RVk", ijk(0o164)),
    ("Vi Vj*RVk", ijk(0o165)),
    ("Vi Sj*IVk", ijk(0o166)),
    ("Vi Vj*IVk", ijk(0o167)),
    ("Vi Sj+FVk", ijk(0o170)),
    ("Vi Vj+FVk", ijk(0o171)),
    ("Vi Sj-FVk", ijk(0o172)),
    ("Vi Vj-FVk", ijk(0o173)),
    ("Vi /HVj", fields(0o174, Reg(0), Reg(1), Lit(0))),
    ("Vi PVj", fields(0o174, Reg(0), Reg(1), Lit(1))),
    ("Vi QVj", fields(0o174, Reg(0), Reg(1), Lit(2))),
    ("VM Vj,Z", fields(0o175, Lit(0), Reg(1), Lit(0))),
    ("VM Vj,N", fields(0o175, Lit(0), Reg(1), Lit(1))),
    ("VM Vj,P", fields(0o175, Lit(0), Reg(1), Lit(2))),
    ("VM Vj,M", fields(0o175, Lit(0), Reg(1), Lit(3))),
    ("Vi ,A0,Ak", fields(0o176, Reg(0), Lit(0), Reg(2))),
    (",A0,Ak Vj", fields(0o177, Lit(0), Reg(2), Reg(1))),
];

static INSTRUCTION_TABLE: OnceLock<Matcher<Rule>> = OnceLock::new();

pub(crate) fn instruction_table() -> &'static Matcher<Rule> {
    INSTRUCTION_TABLE.get_or_init(|| {
        let mut m = Matcher::default();
        for (pattern, rule) in INSTRUCTIONS {
            m.insert(pattern, *rule);
        }
        m
    })
}

fn register(args: &[Arg], n: usize) -> u8 {
    match args.get(n) {
        Some(Arg::Register(r)) => *r,
        _ => 0,
    }
}

fn part(args: &[Arg], p: Part) -> u8 {
    match p {
        Reg(n) => register(args, n),
        Lit(v) => v,
    }
}

fn expression(args: &[Arg], n: usize) -> Option<&Expr> {
    match args.get(n) {
        Some(Arg::Expression(e)) => Some(e),
        _ => None,
    }
}

/// The low 22 bits of a value, for the `jkm` field.
fn jkm(value: u64) -> u32 {
    (value & ((1 << JKM_BITS) - 1)) as u32
}

fn is_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Literal { .. } => true,
        Expr::SubExpr(inner) => is_literal(inner),
        _ => false,
    }
}

impl AsmContext {
    /// Evaluate an instruction operand.  When evaluation fails the
    /// operand is taken as undefined (the error is already
    /// registered) so that the instruction still occupies its space.
    fn operand_value(&mut self, expr: Option<&Expr>) -> Evaluation {
        let ev = expr.and_then(|e| self.evaluate_expr(e));
        ev.unwrap_or(Evaluation {
            value: Value::undefined(),
            forward: true,
            warnings: Vec::new(),
        })
    }

    /// Assemble a statement whose result field is not a
    /// pseudo-instruction or macro name.
    pub(crate) fn machine_instruction(&mut self, fields: &Fields) {
        let flexible = self.settings.flexible;
        let result_tokens = tokenize(&fields.result, flexible);
        let operand_tokens = tokenize(&fields.operand, flexible);
        let found = instruction_table().find(
            FieldTokens {
                tokens: &result_tokens,
                text: &fields.result,
            },
            FieldTokens {
                tokens: &operand_tokens,
                text: &fields.operand,
            },
            flexible,
        );
        let found = match found {
            Ok(found) => found,
            Err(MatchError::NoMatch) => {
                let starts_with_register = result_tokens.first().is_some_and(|t| t.is_register());
                self.error(if starts_with_register {
                    ErrorKind::OperandField
                } else {
                    ErrorKind::ResultField
                });
                return;
            }
            Err(MatchError::BadExpression(_)) => {
                self.error(ErrorKind::Syntax);
                return;
            }
        };
        if !self.current_section().section_type.allows_instructions() {
            self.error(ErrorKind::InstructionPlacement);
            return;
        }
        self.force_parcel_boundary();
        self.define_parcel_label(&fields.location);
        let rule = *found.handler;
        let args = found.args;
        if let Some((a, b)) = rule.same {
            if register(&args, a) != register(&args, b) {
                self.error(ErrorKind::OperandField);
                return;
            }
        }
        self.in_instruction = true;
        self.encode(rule.encoding, &args);
        self.in_instruction = false;
    }

    fn encode(&mut self, encoding: Encoding, args: &[Arg]) {
        match encoding {
            Encoding::Fields { gh, i, j, k } => {
                self.emit_gh_i_j_k(gh, part(args, i), part(args, j), part(args, k));
            }
            Encoding::Wide { gh, i, jk } => {
                self.emit_gh_i_jk(gh, part(args, i), part(args, jk));
            }
            Encoding::Constant { gh, ijk } => self.emit_gh_ijk(gh, ijk),
            Encoding::Branch { gh, address } => {
                let ev = self.operand_value(expression(args, address));
                self.branch(gh, ev.value);
            }
            Encoding::Memory {
                g,
                i,
                address,
                index,
            } => {
                let value = match address {
                    Some(n) => self.operand_value(expression(args, n)).value,
                    None => Value::absolute(0),
                };
                let h = index.map_or(0, |n| register(args, n));
                self.memory_reference(g, h, register(args, i), value);
            }
            Encoding::LoadA { i, value } => {
                let expr = expression(args, value);
                if expr.is_some_and(is_literal) {
                    let v = self.operand_value(expr).value;
                    self.memory_reference(0o10, 0, register(args, i), v);
                } else {
                    let ev = self.operand_value(expr);
                    self.load_a(register(args, i), &ev);
                }
            }
            Encoding::LoadS { i, value } => {
                let expr = expression(args, value);
                if expr.is_some_and(is_literal) {
                    let v = self.operand_value(expr).value;
                    self.memory_reference(0o12, 0, register(args, i), v);
                } else {
                    self.load_s(register(args, i), expr);
                }
            }
            Encoding::Shift {
                gh,
                i,
                count,
                right,
            } => {
                let ev = self.operand_value(expression(args, count));
                let n = if ev.value.is_undefined() {
                    0
                } else {
                    ev.value.numeric
                };
                let limit = if right { 64 } else { 63 };
                if n > limit || !ev.value.is_constant() && !ev.value.is_undefined() {
                    self.error(ErrorKind::FieldWidth);
                }
                let jk = if right { 64 - n.min(64) } else { n.min(63) };
                self.emit_gh_i_jk(gh, register(args, i), (jk & 0o77) as u8);
            }
            Encoding::SetSemaphore { jk, value } => {
                let ev = self.operand_value(expression(args, value));
                let i = match (ev.value.is_undefined(), ev.value.numeric) {
                    (false, 0) => 6,
                    (false, 1) => 7,
                    (true, _) => 6,
                    _ => {
                        self.error(ErrorKind::OperandField);
                        6
                    }
                };
                self.emit_gh_i_jk(0o003, i, register(args, jk));
            }
            Encoding::TestSemaphore { jk, value } => {
                let ev = self.operand_value(expression(args, value));
                if !ev.value.is_undefined() && ev.value.numeric != 1 {
                    self.error(ErrorKind::OperandField);
                }
                self.emit_gh_i_jk(0o003, 4, register(args, jk));
            }
        }
    }

    fn branch(&mut self, gh: u8, value: Value) {
        let target = match value.address_kind() {
            AddressKind::Word => Value {
                numeric: value.numeric.wrapping_mul(4),
                ..value
            }
            .with_address_kind(AddressKind::Parcel),
            _ => value,
        };
        if target.is_float() {
            self.error(ErrorKind::Type);
        } else if !target.is_undefined() && !fits_unsigned(target.numeric, BRANCH_ADDRESS_BITS) {
            self.error(ErrorKind::FieldWidth);
        }
        let address = if target.is_undefined() {
            0
        } else {
            (target.numeric & ((1 << BRANCH_ADDRESS_BITS) - 1)) as u32
        };
        self.emit_address_instruction(gh_ijkm(gh, address), &target, true);
    }

    fn memory_reference(&mut self, g: u8, h: u8, i: u8, value: Value) {
        let value = match value.address_kind() {
            AddressKind::Parcel => {
                self.warn(WarningKind::MachineInstruction);
                Value {
                    numeric: value.numeric / 4,
                    ..value
                }
                .with_address_kind(AddressKind::Word)
            }
            _ => value,
        };
        if value.is_float() {
            self.error(ErrorKind::Type);
        } else if !value.is_undefined() && !fits_field(value.numeric, JKM_BITS) {
            self.error(ErrorKind::FieldWidth);
        }
        let address = if value.is_undefined() {
            0
        } else {
            jkm(value.numeric)
        };
        self.emit_address_instruction(g_h_i_jkm(g, h, i, address), &value, false);
    }

    /// `Ai exp`: a small known constant fits in the one-parcel form;
    /// a known negative constant uses the complement form; anything
    /// else, including every forward reference, takes the 22-bit form.
    fn load_a(&mut self, i: u8, ev: &Evaluation) {
        let v = ev.value;
        if v.is_float() {
            self.error(ErrorKind::Type);
        }
        let known = v.is_constant() && !ev.forward;
        if known && v.numeric < 64 {
            self.emit_gh_i_jk(0o022, i, v.numeric as u8);
            return;
        }
        if known && v.as_i64() < 0 && fits_unsigned(!v.numeric, JKM_BITS) {
            let instruction = gh_i_jkm(0o021, i, jkm(!v.numeric));
            self.emit_address_instruction(instruction, &Value::absolute(0), false);
            return;
        }
        if !v.is_undefined() && !fits_field(v.numeric, JKM_BITS) {
            self.error(ErrorKind::FieldWidth);
        }
        let field = if v.is_undefined() { 0 } else { jkm(v.numeric) };
        self.emit_address_instruction(gh_i_jkm(0o020, i, field), &v, false);
    }

    /// `Si exp`: masks written as `>n` or `<n` have one-parcel forms;
    /// other values take a two-parcel form.
    fn load_s(&mut self, i: u8, expr: Option<&Expr>) {
        if let Some((op @ (UnaryOp::MaskRight | UnaryOp::MaskLeft), inner)) =
            expr.and_then(Expr::root_unary)
        {
            let ev = self.operand_value(Some(inner));
            let n = ev.value.numeric;
            if ev.value.is_undefined() || !ev.value.is_constant() || n > 64 {
                if !ev.value.is_undefined() {
                    self.error(ErrorKind::FieldWidth);
                }
                self.emit_gh_i_jk(0o042, i, 0);
                return;
            }
            match op {
                UnaryOp::MaskRight => self.emit_gh_i_jk(0o042, i, ((64 - n) & 0o77) as u8),
                _ => self.emit_gh_i_jk(0o043, i, (n & 0o77) as u8),
            }
            return;
        }
        let ev = self.operand_value(expr);
        let mut v = ev.value;
        if v.is_float() {
            match f64_to_cray(v.as_f64()) {
                Ok(word) => v = Value::absolute(word),
                Err(_) => self.error(ErrorKind::Type),
            }
        }
        if v.is_undefined() || !v.is_constant() {
            let field = if v.is_undefined() { 0 } else { jkm(v.numeric) };
            if !v.is_undefined() && !fits_field(v.numeric, JKM_BITS) {
                self.error(ErrorKind::FieldWidth);
            }
            self.emit_address_instruction(gh_i_jkm(0o040, i, field), &v, false);
        } else if fits_unsigned(v.numeric, JKM_BITS) {
            self.emit_address_instruction(gh_i_jkm(0o040, i, jkm(v.numeric)), &v, false);
        } else if fits_unsigned(!v.numeric, JKM_BITS) {
            let instruction = gh_i_jkm(0o041, i, jkm(!v.numeric));
            self.emit_address_instruction(instruction, &Value::absolute(0), false);
        } else {
            self.error(ErrorKind::FieldWidth);
            self.emit_address_instruction(gh_i_jkm(0o040, i, jkm(v.numeric)), &v, false);
        }
    }
}

#[cfg(test)]
mod tests;
