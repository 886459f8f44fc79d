//! Expression parser, built with `chumsky` over the tokens produced
//! by the lexer.
//!
//! Operator precedence (a lower number binds more tightly):
//!
//! | precedence | operators                                      |
//! |------------|------------------------------------------------|
//! | 1          | unary `+ - # < > #< #> P. W. =`                |
//! | 2          | `*` `/` `&`, and `<` `>` as shifts             |
//! | 3          | `+` `-` `!` (or) `\` (exclusive or)            |
//!
//! Binary operators at the same level associate to the left.
//! Parenthesised groups produce [`Expr::SubExpr`] nodes.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use chumsky::error::Rich;
use chumsky::extra::Full;
use chumsky::input::ValueInput;
use chumsky::inspector::SimpleState;
use chumsky::prelude::{any, choice, recursive, Input, SimpleSpan};
use chumsky::select;
use chumsky::Parser;

use super::lexer::{Counter, Name, Operator, Token, TokenKind};
use super::scanner::StringLit;
use super::span::{extract_span, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Plus,
    Minus,
    /// `#`: ones complement.
    Complement,
    /// `<n`: a mask of `n` ones at the left of the word.
    MaskLeft,
    /// `>n`: a mask of `n` ones at the right of the word.
    MaskRight,
    /// `#<n`: the complement of `<n`.
    ComplementMaskLeft,
    /// `#>n`: the complement of `>n`.
    ComplementMaskRight,
    /// `P.`
    ParcelAddress,
    /// `W.`
    WordAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Symbol(Name),
    Number(String),
    Based(u64),
    Str(StringLit),
    Location(Counter),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    SubExpr(Box<Expr>),
    /// `=expr`: the address of a literal pool entry holding the
    /// value.  `key` is the source text of the operand, which
    /// identifies the pool entry.
    Literal {
        key: String,
        operand: Box<Expr>,
    },
}

impl Expr {
    /// The operator at the root of the tree, ignoring parentheses.
    pub(crate) fn root_unary(&self) -> Option<(UnaryOp, &Expr)> {
        match self {
            Expr::Unary(op, operand) => Some((*op, operand)),
            Expr::SubExpr(inner) => inner.root_unary(),
            _ => None,
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExprError {
    pub(crate) msg: String,
    pub(crate) span: Option<Span>,
}

impl Display for ExprError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl Error for ExprError {}

/// The tokens being parsed and the field they were scanned from.
/// Literal keys are taken from the field text.
#[derive(Debug, Clone, Copy)]
struct Source<'a> {
    tokens: &'a [Token],
    text: &'a str,
}

impl Source<'_> {
    /// The field text covered by the tokens in `span`.
    fn text_of(&self, span: SimpleSpan) -> String {
        let first = self.tokens.get(span.start);
        let last = span.end.checked_sub(1).and_then(|i| self.tokens.get(i));
        match (first, last) {
            (Some(first), Some(last)) if first.span.start <= last.span.end => {
                extract_span(self.text, &(first.span.start..last.span.end))
                    .trim()
                    .to_string()
            }
            _ => String::new(),
        }
    }
}

type Extra<'a> = Full<Rich<'a, Token>, SimpleState<Source<'a>>, ()>;

fn operand<'a, I>() -> impl Parser<'a, I, Expr, Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    select! {
        Token { kind: TokenKind::Name(name), .. } => Expr::Symbol(name),
        Token { kind: TokenKind::Number(text), .. } => Expr::Number(text),
        Token { kind: TokenKind::Based(n), .. } => Expr::Based(n),
        Token { kind: TokenKind::Str(lit), .. } => Expr::Str(lit),
        Token { kind: TokenKind::Location(counter), .. } => Expr::Location(counter),
    }
    .labelled("operand")
}

fn left_paren<'a, I>() -> impl Parser<'a, I, (), Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    select! { Token { kind: TokenKind::LeftParen, .. } => () }.labelled("'('")
}

fn right_paren<'a, I>() -> impl Parser<'a, I, (), Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    select! { Token { kind: TokenKind::RightParen, .. } => () }.labelled("')'")
}

fn equals<'a, I>() -> impl Parser<'a, I, (), Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    select! { Token { kind: TokenKind::Op(Operator::Equals), .. } => () }
}

fn prefix_operator<'a, I>() -> impl Parser<'a, I, UnaryOp, Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    select! {
        Token { kind: TokenKind::Op(Operator::Plus), .. } => UnaryOp::Plus,
        Token { kind: TokenKind::Op(Operator::Minus), .. } => UnaryOp::Minus,
        Token { kind: TokenKind::Op(Operator::Hash), .. } => UnaryOp::Complement,
        Token { kind: TokenKind::Op(Operator::Less), .. } => UnaryOp::MaskLeft,
        Token { kind: TokenKind::Op(Operator::Greater), .. } => UnaryOp::MaskRight,
        Token { kind: TokenKind::Op(Operator::HashLess), .. } => UnaryOp::ComplementMaskLeft,
        Token { kind: TokenKind::Op(Operator::HashGreater), .. } => UnaryOp::ComplementMaskRight,
        Token { kind: TokenKind::Op(Operator::ParcelPrefix), .. } => UnaryOp::ParcelAddress,
        Token { kind: TokenKind::Op(Operator::WordPrefix), .. } => UnaryOp::WordAddress,
    }
    .labelled("unary operator")
}

/// A binary operator is not taken as part of the expression when a
/// register follows it, as it then belongs to an instruction pattern
/// (for example `$+Ak`).
fn binary<'a, I, P>(operator: P) -> impl Parser<'a, I, BinaryOp, Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
    P: Parser<'a, I, BinaryOp, Extra<'a>> + Clone,
{
    let register = select! { Token { kind: TokenKind::Register(_), .. } => () };
    operator.then_ignore(register.not())
}

/// Operators of precedence 2.
fn multiplying_operator<'a, I>() -> impl Parser<'a, I, BinaryOp, Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    binary(select! {
        Token { kind: TokenKind::Op(Operator::Star), .. } => BinaryOp::Multiply,
        Token { kind: TokenKind::Op(Operator::Slash), .. } => BinaryOp::Divide,
        Token { kind: TokenKind::Op(Operator::Ampersand), .. } => BinaryOp::And,
        Token { kind: TokenKind::Op(Operator::Less), .. } => BinaryOp::ShiftLeft,
        Token { kind: TokenKind::Op(Operator::Greater), .. } => BinaryOp::ShiftRight,
    })
}

/// Operators of precedence 3.
fn adding_operator<'a, I>() -> impl Parser<'a, I, BinaryOp, Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    binary(select! {
        Token { kind: TokenKind::Op(Operator::Plus), .. } => BinaryOp::Add,
        Token { kind: TokenKind::Op(Operator::Minus), .. } => BinaryOp::Subtract,
        Token { kind: TokenKind::Op(Operator::Bang), .. } => BinaryOp::Or,
        Token { kind: TokenKind::Op(Operator::Backslash), .. } => BinaryOp::Xor,
    })
}

fn expression<'a, I>() -> impl Parser<'a, I, Expr, Extra<'a>> + Clone
where
    I: Input<'a, Token = Token, Span = SimpleSpan> + ValueInput<'a>,
{
    recursive(|expr| {
        // (E) where E is some expression.
        let parenthesised = expr
            .delimited_by(left_paren(), right_paren())
            .map(|inner| Expr::SubExpr(Box::new(inner)))
            .labelled("parenthesised expression");
        let atom = choice((operand(), parenthesised));

        // Unary operators bind more tightly than any binary operator,
        // and may be stacked (`-#X`).
        let unary = recursive(|unary| {
            let literal = equals().ignore_then(unary.clone().map_with(|operand, extra| {
                let span = extra.span();
                let source: &SimpleState<Source<'a>> = extra.state();
                Expr::Literal {
                    key: source.text_of(span),
                    operand: Box::new(operand),
                }
            }));
            let prefixed = prefix_operator()
                .then(unary)
                .map(|(op, operand)| Expr::Unary(op, Box::new(operand)));
            choice((literal, prefixed, atom))
        });

        let term = unary.clone().foldl(
            multiplying_operator().then(unary).repeated(),
            |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
        );
        term.clone().foldl(
            adding_operator().then(term).repeated(),
            |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
        )
    })
    .labelled("expression")
}

fn expression_error(errors: &[Rich<'_, Token>], tokens: &[Token], text: &str) -> ExprError {
    let at = errors.first().and_then(|e| tokens.get(e.span().start));
    let msg = match at {
        None => "expression expected".to_string(),
        Some(Token {
            kind: TokenKind::Error(msg),
            ..
        }) => msg.clone(),
        Some(Token {
            kind: TokenKind::Register(_),
            ..
        }) => "a register cannot appear in an expression".to_string(),
        Some(tok) => format!("unexpected '{}'", extract_span(text, &tok.span)),
    };
    ExprError {
        msg,
        span: at.map(|tok| tok.span.clone()),
    }
}

/// Parse the longest expression at the start of `tokens`.  Returns
/// the expression and the number of tokens it occupies.  `text` is
/// the field the tokens were scanned from.
pub(crate) fn parse_expression(tokens: &[Token], text: &str) -> Result<(Expr, usize), ExprError> {
    let mut state = SimpleState::from(Source { tokens, text });
    expression::<&[Token]>()
        .map_with(|expr, extra| (expr, extra.span().end))
        .then_ignore(any().repeated())
        .parse_with_state(tokens, &mut state)
        .into_result()
        .map_err(|errors| expression_error(&errors, tokens, text))
}

/// Parse `tokens` as exactly one expression.
pub(crate) fn parse_complete(tokens: &[Token], text: &str) -> Result<Expr, ExprError> {
    let mut state = SimpleState::from(Source { tokens, text });
    expression()
        .parse_with_state(tokens, &mut state)
        .into_result()
        .map_err(|errors| expression_error(&errors, tokens, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(s: &str) -> Expr {
        let tokens = tokenize(s, false);
        parse_complete(&tokens, s).expect("expression should be valid")
    }

    fn sym(s: &str) -> Box<Expr> {
        Box::new(Expr::Symbol(Name {
            qualifier: None,
            name: s.to_string(),
        }))
    }

    fn num(s: &str) -> Box<Expr> {
        Box::new(Expr::Number(s.to_string()))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("A+B*2"),
            Expr::Binary(
                BinaryOp::Add,
                sym("A"),
                Box::new(Expr::Binary(BinaryOp::Multiply, sym("B"), num("2")))
            )
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(
            parse("A-B-C"),
            Expr::Binary(
                BinaryOp::Subtract,
                Box::new(Expr::Binary(BinaryOp::Subtract, sym("A"), sym("B"))),
                sym("C")
            )
        );
    }

    #[test]
    fn test_unary_binds_tightest() {
        assert_eq!(
            parse("-A*B"),
            Expr::Binary(
                BinaryOp::Multiply,
                Box::new(Expr::Unary(UnaryOp::Minus, sym("A"))),
                sym("B")
            )
        );
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(
            parse("(A+B)*2"),
            Expr::Binary(
                BinaryOp::Multiply,
                Box::new(Expr::SubExpr(Box::new(Expr::Binary(
                    BinaryOp::Add,
                    sym("A"),
                    sym("B")
                )))),
                num("2")
            )
        );
    }

    #[test]
    fn test_shift_and_mask() {
        assert_eq!(
            parse("A<3"),
            Expr::Binary(BinaryOp::ShiftLeft, sym("A"), num("3"))
        );
        assert_eq!(parse(">12"), Expr::Unary(UnaryOp::MaskRight, num("12")));
        assert_eq!(
            parse("(<3)").root_unary(),
            Some((UnaryOp::MaskLeft, &Expr::Number("3".to_string())))
        );
    }

    #[test]
    fn test_literal_key() {
        match parse("=X'FF'") {
            Expr::Literal { key, operand } => {
                assert_eq!(key, "X'FF'");
                assert_eq!(*operand, Expr::Based(255));
            }
            other => panic!("expected a literal, got {other:?}"),
        }
    }

    #[test]
    fn test_stops_before_register_operand() {
        let text = "LAB,A1";
        let tokens = tokenize(text, false);
        let (expr, used) = parse_expression(&tokens, text).expect("valid");
        assert_eq!(expr, *sym("LAB"));
        assert_eq!(used, 1);

        let text = "5+A2";
        let tokens = tokenize(text, false);
        let (_, used) = parse_expression(&tokens, text).expect("valid");
        assert_eq!(used, 1);
    }

    #[test]
    fn test_errors() {
        let tokens = tokenize("A+", false);
        assert!(parse_complete(&tokens, "A+").is_err());
        let tokens = tokenize("(A", false);
        assert!(parse_complete(&tokens, "(A").is_err());
        let tokens = tokenize("A B", false);
        let e = parse_complete(&tokens, "A B").expect_err("trailing name");
        assert_eq!(e.msg, "unexpected 'B'");
        assert_eq!(e.span, Some(2..3));
        let tokens = tokenize("A1", false);
        let e = parse_complete(&tokens, "A1").expect_err("register");
        assert_eq!(e.msg, "a register cannot appear in an expression");
    }

    #[test]
    fn test_stacked_unary_operators() {
        assert_eq!(
            parse("-#X"),
            Expr::Unary(
                UnaryOp::Minus,
                Box::new(Expr::Unary(UnaryOp::Complement, sym("X")))
            )
        );
    }
}
