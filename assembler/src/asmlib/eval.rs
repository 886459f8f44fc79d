//! Expression evaluation.
//!
//! The tree produced by the parser is flattened into postfix order and
//! then executed against an operand stack.  Parenthesised groups were
//! already resolved into the shape of the tree by the parser, so the
//! postfix order preserves their grouping.
use base::prelude::{mask_left, mask_right, pack_bytes};

use super::diagnostic::{ErrorKind, WarningKind};
use super::expr::{BinaryOp, Expr, UnaryOp};
use super::lexer::{Counter, Name};
use super::scanner::{parse_number, Number};
use super::section::SectionId;
use super::value::{AddressKind, Attributes, Value, ValueType};

/// The result of looking up a symbol while evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SymbolRef {
    pub(crate) value: Value,
    /// The symbol has not been defined yet in this pass.
    pub(crate) forward: bool,
}

/// What the evaluator needs from the assembler.
pub(crate) trait EvalContext {
    /// Look up a symbol.  A symbol which is not known is entered into
    /// the symbol table as undefined.
    fn symbol(&mut self, name: &Name) -> SymbolRef;

    /// The value of a location counter.
    fn counter(&mut self, counter: Counter) -> Value;

    /// The address of the literal pool entry identified by `key`,
    /// whose value is given by `operand`.
    fn literal(&mut self, key: &str, operand: &Expr) -> Result<Value, ErrorKind>;

    /// The radix of numbers without an explicit base.
    fn radix(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Evaluation {
    pub(crate) value: Value,
    /// Some symbol in the expression was not yet defined.
    pub(crate) forward: bool,
    pub(crate) warnings: Vec<WarningKind>,
}

#[derive(Debug)]
enum Step<'e> {
    Operand(&'e Expr),
    Unary(UnaryOp),
    Binary(BinaryOp),
}

fn flatten<'e>(expr: &'e Expr, out: &mut Vec<Step<'e>>) {
    match expr {
        Expr::Unary(op, operand) => {
            flatten(operand, out);
            out.push(Step::Unary(*op));
        }
        Expr::Binary(op, left, right) => {
            flatten(left, out);
            flatten(right, out);
            out.push(Step::Binary(*op));
        }
        Expr::SubExpr(inner) => flatten(inner, out),
        Expr::Symbol(_)
        | Expr::Number(_)
        | Expr::Based(_)
        | Expr::Str(_)
        | Expr::Location(_)
        | Expr::Literal { .. } => out.push(Step::Operand(expr)),
    }
}

/// What a value's address is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Absolute,
    Section(SectionId),
    External(usize),
}

fn base_of(v: &Value) -> Base {
    match (v.external, v.section) {
        (Some(ext), _) if v.coefficient != 0 => Base::External(ext),
        (_, Some(section)) if v.is_relocatable() => Base::Section(section),
        _ => Base::Absolute,
    }
}

struct Machine<'c, C: EvalContext> {
    ctx: &'c mut C,
    stack: Vec<Value>,
    forward: bool,
    warnings: Vec<WarningKind>,
}

impl<C: EvalContext> Machine<'_, C> {
    fn warn(&mut self, w: WarningKind) {
        if !self.warnings.contains(&w) {
            self.warnings.push(w);
        }
    }

    fn pop(&mut self) -> Result<Value, ErrorKind> {
        self.stack.pop().ok_or(ErrorKind::Expression)
    }

    fn operand(&mut self, expr: &Expr) -> Result<Value, ErrorKind> {
        match expr {
            Expr::Symbol(name) => {
                let found = self.ctx.symbol(name);
                self.forward |= found.forward;
                let mut value = found.value;
                value.attributes.remove(Attributes::SYMBOL_ONLY);
                Ok(value)
            }
            Expr::Number(text) => match parse_number(text, self.ctx.radix()) {
                Ok(Number::Integer(n)) => Ok(Value::absolute(n)),
                Ok(Number::Float(x)) => Ok(Value::float(x)),
                Err(_) => Err(ErrorKind::Syntax),
            },
            Expr::Based(n) => Ok(Value::absolute(*n)),
            Expr::Str(lit) => {
                let words = pack_bytes(&lit.bytes, lit.field_chars(), lit.justification);
                match words.as_slice() {
                    [] => Ok(Value::absolute(0)),
                    [word] => Ok(Value::absolute(*word)),
                    _ => Err(ErrorKind::DataItem),
                }
            }
            Expr::Location(counter) => Ok(self.ctx.counter(*counter)),
            Expr::Literal { key, operand } => self.ctx.literal(key, operand),
            Expr::Unary(..) | Expr::Binary(..) | Expr::SubExpr(_) => {
                // flatten() never yields these as operands.
                Err(ErrorKind::Expression)
            }
        }
    }

    fn run(&mut self, steps: &[Step<'_>]) -> Result<Value, ErrorKind> {
        for step in steps {
            let result = match step {
                Step::Operand(expr) => self.operand(expr)?,
                Step::Unary(op) => {
                    let v = self.pop()?;
                    self.unary(*op, v)?
                }
                Step::Binary(op) => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.binary(*op, left, right)?
                }
            };
            self.stack.push(result);
        }
        let result = self.pop()?;
        if self.stack.is_empty() {
            Ok(result)
        } else {
            Err(ErrorKind::Expression)
        }
    }

    fn unary(&mut self, op: UnaryOp, v: Value) -> Result<Value, ErrorKind> {
        if v.is_undefined() {
            return Ok(Value::undefined());
        }
        match op {
            UnaryOp::Plus => Ok(v),
            UnaryOp::Minus => {
                if v.is_float() {
                    return Ok(Value::float(-v.as_f64()));
                }
                if v.is_external() {
                    return Err(ErrorKind::RelocatableField);
                }
                Ok(Value {
                    numeric: v.as_i64().wrapping_neg() as u64,
                    coefficient: -v.coefficient,
                    ..v
                })
            }
            UnaryOp::Complement
            | UnaryOp::MaskLeft
            | UnaryOp::MaskRight
            | UnaryOp::ComplementMaskLeft
            | UnaryOp::ComplementMaskRight => {
                if v.is_float() {
                    return Err(ErrorKind::Type);
                }
                if base_of(&v) != Base::Absolute {
                    return Err(ErrorKind::RelocatableField);
                }
                let n = v.numeric;
                let width = || -> Result<u32, ErrorKind> {
                    match u32::try_from(n) {
                        Ok(w) if w <= 64 => Ok(w),
                        _ => Err(ErrorKind::FieldWidth),
                    }
                };
                let bits = match op {
                    UnaryOp::Complement => !n,
                    UnaryOp::MaskLeft => mask_left(width()?),
                    UnaryOp::MaskRight => mask_right(width()?),
                    UnaryOp::ComplementMaskLeft => !mask_left(width()?),
                    _ => !mask_right(width()?),
                };
                Ok(Value::absolute(bits))
            }
            UnaryOp::ParcelAddress => Ok(self.convert(v, AddressKind::Parcel)),
            UnaryOp::WordAddress => Ok(self.convert(v, AddressKind::Word)),
        }
    }

    /// Express `v` in units of `kind`.  A plain value simply takes on
    /// the address kind.
    fn convert(&self, v: Value, kind: AddressKind) -> Value {
        let from = v.address_kind();
        if from == kind || from == AddressKind::Value || kind == AddressKind::Value {
            return v.with_address_kind(kind);
        }
        let numeric = if kind.per_word() > from.per_word() {
            v.numeric.wrapping_mul(kind.per_word() / from.per_word())
        } else {
            v.numeric / (from.per_word() / kind.per_word())
        };
        Value { numeric, ..v }.with_address_kind(kind)
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value, ErrorKind> {
        if left.is_undefined() || right.is_undefined() {
            return Ok(Value::undefined());
        }
        match op {
            BinaryOp::Add => self.additive(left, right, false),
            BinaryOp::Subtract => self.additive(left, right, true),
            BinaryOp::Multiply | BinaryOp::Divide => self.multiplicative(op, left, right),
            BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor
            | BinaryOp::ShiftLeft
            | BinaryOp::ShiftRight => {
                if left.is_float() || right.is_float() {
                    return Err(ErrorKind::Type);
                }
                if base_of(&left) != Base::Absolute || base_of(&right) != Base::Absolute {
                    return Err(ErrorKind::RelocatableField);
                }
                let (a, b) = (left.numeric, right.numeric);
                let bits = match op {
                    BinaryOp::And => a & b,
                    BinaryOp::Or => a | b,
                    BinaryOp::Xor => a ^ b,
                    BinaryOp::ShiftLeft => a.checked_shl(shift_count(b)).unwrap_or(0),
                    _ => a.checked_shr(shift_count(b)).unwrap_or(0),
                };
                Ok(Value::absolute(bits))
            }
        }
    }

    fn additive(&mut self, left: Value, right: Value, subtract: bool) -> Result<Value, ErrorKind> {
        if left.is_float() || right.is_float() {
            if base_of(&left) != Base::Absolute || base_of(&right) != Base::Absolute {
                return Err(ErrorKind::RelocatableField);
            }
            let (a, b) = (left.as_f64(), right.as_f64());
            return Ok(Value::float(if subtract { a - b } else { a + b }));
        }
        let lk = left.address_kind();
        let mut right = right;
        if lk != AddressKind::Value
            && right.address_kind() != AddressKind::Value
            && right.address_kind() != lk
        {
            self.warn(WarningKind::ExpressionElement);
            right = self.convert(right, lk);
        }
        let rk = right.address_kind();
        let kind = if lk == AddressKind::Value { rk } else { lk };

        let numeric = if subtract {
            left.numeric.wrapping_sub(right.numeric)
        } else {
            left.numeric.wrapping_add(right.numeric)
        };
        let signed = |c: i64| if subtract { -c } else { c };
        let (base, coefficient) = match (base_of(&left), base_of(&right)) {
            (Base::Absolute, Base::Absolute) => (Base::Absolute, 0),
            (Base::External(e), Base::Absolute) => (Base::External(e), left.coefficient),
            (Base::Absolute, Base::External(e)) if !subtract => {
                (Base::External(e), right.coefficient)
            }
            (Base::Section(s), Base::Absolute) => (Base::Section(s), left.coefficient),
            (Base::Absolute, Base::Section(s)) => (Base::Section(s), signed(right.coefficient)),
            (Base::Section(a), Base::Section(b)) if a == b => {
                (Base::Section(a), left.coefficient + signed(right.coefficient))
            }
            _ => {
                return Err(ErrorKind::RelocatableField);
            }
        };

        let mut attributes = Attributes::empty();
        let mut section = None;
        let mut external = None;
        let kind = match base {
            Base::Section(s) if coefficient != 0 => {
                attributes |= Attributes::RELOCATABLE;
                section = Some(s);
                kind
            }
            // The difference of two addresses in one section.
            Base::Section(_) => AddressKind::Value,
            Base::External(e) => {
                attributes |= Attributes::EXTERNAL;
                external = Some(e);
                kind
            }
            Base::Absolute => {
                let immobile = left.attributes.union(right.attributes);
                if kind != AddressKind::Value && immobile.contains(Attributes::IMMOBILE) {
                    attributes |= Attributes::IMMOBILE;
                    section = left.section.or(right.section);
                }
                kind
            }
        };
        attributes |= kind.attribute();
        Ok(Value {
            kind: ValueType::Integer,
            attributes,
            section,
            external,
            coefficient: if section.is_some() || external.is_some() {
                coefficient
            } else {
                0
            },
            numeric,
        })
    }

    fn multiplicative(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
    ) -> Result<Value, ErrorKind> {
        let (lb, rb) = (base_of(&left), base_of(&right));
        if matches!(lb, Base::External(_)) || matches!(rb, Base::External(_)) {
            return Err(ErrorKind::RelocatableField);
        }
        let divide = op == BinaryOp::Divide;
        if left.is_float() || right.is_float() {
            if lb != Base::Absolute || rb != Base::Absolute {
                return Err(ErrorKind::RelocatableField);
            }
            let (a, b) = (left.as_f64(), right.as_f64());
            if divide && b == 0.0 {
                return Err(ErrorKind::Expression);
            }
            return Ok(Value::float(if divide { a / b } else { a * b }));
        }
        let (lk, rk) = (left.address_kind(), right.address_kind());
        let kind = match (lk, rk) {
            (AddressKind::Value, k) | (k, AddressKind::Value) => k,
            _ => {
                self.warn(WarningKind::ExpressionElement);
                AddressKind::Value
            }
        };
        let (a, b) = (left.as_i64(), right.as_i64());
        if divide {
            if lb != Base::Absolute || rb != Base::Absolute {
                return Err(ErrorKind::RelocatableField);
            }
            if b == 0 {
                return Err(ErrorKind::Expression);
            }
            return Ok(Value::absolute(a.wrapping_div(b) as u64).with_address_kind(kind));
        }
        let product = a.wrapping_mul(b) as u64;
        match (lb, rb) {
            (Base::Absolute, Base::Absolute) => {
                Ok(Value::absolute(product).with_address_kind(kind))
            }
            (Base::Section(_), Base::Absolute) => Ok(Value {
                numeric: product,
                coefficient: left.coefficient.wrapping_mul(b),
                ..left
            }
            .with_address_kind(kind)),
            (Base::Absolute, Base::Section(_)) => Ok(Value {
                numeric: product,
                coefficient: right.coefficient.wrapping_mul(a),
                ..right
            }
            .with_address_kind(kind)),
            _ => Err(ErrorKind::RelocatableField),
        }
    }
}

fn shift_count(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Evaluate an expression.
///
/// Undefined symbols do not make evaluation fail; the result is then
/// an undefined value, and it is up to the caller to decide whether
/// that is an error.
pub(crate) fn evaluate<C: EvalContext>(expr: &Expr, ctx: &mut C) -> Result<Evaluation, ErrorKind> {
    let mut steps = Vec::new();
    flatten(expr, &mut steps);
    let mut machine = Machine {
        ctx,
        stack: Vec::with_capacity(steps.len()),
        forward: false,
        warnings: Vec::new(),
    };
    let value = machine.run(&steps)?;
    Ok(Evaluation {
        value,
        forward: machine.forward,
        warnings: machine.warnings,
    })
}
