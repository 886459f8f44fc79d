use super::*;
use crate::scanner::StringCount;

fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input, false).into_iter().map(|t| t.kind).collect()
}

fn reg(class: RegisterClass, number: u8) -> TokenKind {
    TokenKind::Register(Register { class, number })
}

fn name(s: &str) -> TokenKind {
    TokenKind::Name(Name {
        qualifier: None,
        name: s.to_string(),
    })
}

fn op(o: Operator) -> TokenKind {
    TokenKind::Op(o)
}

#[test]
fn test_empty_input() {
    assert_eq!(kinds(""), Vec::new());
}

#[test]
fn test_registers_and_operators() {
    assert_eq!(
        kinds("A2+A3"),
        vec![
            reg(RegisterClass::A, 2),
            op(Operator::Plus),
            reg(RegisterClass::A, 3)
        ]
    );
    assert_eq!(kinds("B77"), vec![reg(RegisterClass::B, 0o77)]);
    assert_eq!(kinds("SM"), vec![reg(RegisterClass::Semaphores, 0)]);
    assert_eq!(kinds("SM12"), vec![reg(RegisterClass::SmBit, 0o12)]);
    // Not registers.
    assert_eq!(kinds("A8"), vec![name("A8")]);
    assert_eq!(kinds("a1"), vec![name("a1")]);
}

#[test]
fn test_flexible_case() {
    let toks: Vec<TokenKind> = tokenize("a1", true).into_iter().map(|t| t.kind).collect();
    assert_eq!(toks, vec![reg(RegisterClass::A, 1)]);
}

#[test]
fn test_float_operators_need_a_register() {
    assert_eq!(
        kinds("S2*FS3"),
        vec![
            reg(RegisterClass::S, 2),
            op(Operator::FloatTimes),
            reg(RegisterClass::S, 3)
        ]
    );
    assert_eq!(
        kinds("-FS3"),
        vec![op(Operator::FloatMinus), reg(RegisterClass::S, 3)]
    );
    assert_eq!(
        kinds("/HV1"),
        vec![op(Operator::Reciprocal), reg(RegisterClass::V, 1)]
    );
    // FOO is not a register, so this is an ordinary product.
    assert_eq!(
        kinds("X*FOO"),
        vec![name("X"), op(Operator::Star), name("FOO")]
    );
}

#[test]
fn test_location_counter() {
    assert_eq!(
        kinds("*+2"),
        vec![
            TokenKind::Location(Counter::Location),
            op(Operator::Plus),
            TokenKind::Number("2".to_string())
        ]
    );
    assert_eq!(kinds("*P"), vec![TokenKind::Location(Counter::Parcel)]);
    assert_eq!(
        kinds("2**"),
        vec![
            TokenKind::Number("2".to_string()),
            op(Operator::Star),
            TokenKind::Location(Counter::Location)
        ]
    );
}

#[test]
fn test_qualified_names() {
    assert_eq!(
        kinds("/Q/X+//Y"),
        vec![
            TokenKind::Name(Name {
                qualifier: Some("Q".to_string()),
                name: "X".to_string()
            }),
            op(Operator::Plus),
            TokenKind::Name(Name {
                qualifier: Some(String::new()),
                name: "Y".to_string()
            }),
        ]
    );
    // After an operand, a slash divides.
    assert_eq!(
        kinds("X/Y"),
        vec![name("X"), op(Operator::Slash), name("Y")]
    );
}

#[test]
fn test_prefixes() {
    assert_eq!(
        kinds("W.LAB"),
        vec![op(Operator::WordPrefix), name("LAB")]
    );
    assert_eq!(
        kinds("#<5"),
        vec![op(Operator::HashLess), TokenKind::Number("5".to_string())]
    );
}

#[test]
fn test_constants() {
    assert_eq!(kinds("X'FF'"), vec![TokenKind::Based(255)]);
    assert_eq!(kinds("O'17"), vec![TokenKind::Based(15)]);
    assert_eq!(
        kinds("1.5E2"),
        vec![TokenKind::Number("1.5E2".to_string())]
    );
    match kinds("'AB'R").as_slice() {
        [TokenKind::Str(lit)] => {
            assert_eq!(lit.bytes, b"AB");
            assert_eq!(lit.justification, Justification::RightZero);
            assert_eq!(lit.count, StringCount::Words);
        }
        other => panic!("unexpected tokens {other:?}"),
    }
    match kinds("A'X'").as_slice() {
        [TokenKind::Str(lit)] => {
            assert_eq!(lit.justification, Justification::RightZero);
        }
        other => panic!("unexpected tokens {other:?}"),
    }
}

#[test]
fn test_literal_and_subfields() {
    assert_eq!(
        kinds("=X'FF',A1"),
        vec![
            op(Operator::Equals),
            TokenKind::Based(255),
            TokenKind::Comma,
            reg(RegisterClass::A, 1)
        ]
    );
}

#[test]
fn test_errors() {
    assert!(matches!(kinds("12AB").as_slice(), [TokenKind::Error(_)]));
    assert!(matches!(kinds("'AB").as_slice(), [TokenKind::Error(_), ..]));
    assert!(matches!(kinds(".").as_slice(), [TokenKind::Error(_)]));
}

#[test]
fn test_spans() {
    let toks = tokenize("S1 *FS2", false);
    let spans: Vec<Span> = toks.into_iter().map(|t| t.span).collect();
    assert_eq!(spans, vec![0..2, 3..5, 5..7]);
}
