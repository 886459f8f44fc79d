//! Tokenizer for the result and operand fields of a statement.
//!
//! Scanning happens in two stages.  The first, driven by `logos`,
//! splits the field into raw lexemes.  The second looks at each raw
//! lexeme in context (is an operand expected here? is the next
//! lexeme adjacent?) to recognise register designators, qualified
//! names, the location counter symbols, the `P.` and `W.` prefixes
//! and the floating-point operator variants.
use std::fmt::{self, Display, Formatter};

use logos::Logos;

use super::scanner::{self, StringLit};
use super::span::{adjacent, Span};
use base::prelude::Justification;

mod rx;
#[cfg(test)]
mod tests;

pub use rx::LazyRegex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum RegisterClass {
    A,
    S,
    /// Population count of an S register.
    Ps,
    /// Parity of an S register.
    Qs,
    /// Leading zero count of an S register.
    Zs,
    V,
    Pv,
    Qv,
    /// Shared B registers.
    Sb,
    /// A single semaphore bit, `SMjk`.
    SmBit,
    /// Status registers.
    Sr,
    /// Shared T registers.
    St,
    B,
    T,
    /// The whole semaphore register, `SM`.
    Semaphores,
    /// Channel address.
    Ca,
    /// Channel error flag.
    Ce,
    /// Channel interrupt.
    Ci,
    /// Channel limit.
    Cl,
    /// Master clear.
    Mc,
    /// Real-time clock.
    Rt,
    /// Vector length.
    Vl,
    /// Vector mask.
    Vm,
    /// Exchange address.
    Xa,
}

impl RegisterClass {
    pub(crate) fn from_prefix(prefix: &str, numbered: bool) -> Option<RegisterClass> {
        use RegisterClass::*;
        Some(match (prefix, numbered) {
            ("A", true) => A,
            ("S", true) => S,
            ("PS", true) => Ps,
            ("QS", true) => Qs,
            ("ZS", true) => Zs,
            ("V", true) => V,
            ("PV", true) => Pv,
            ("QV", true) => Qv,
            ("SB", true) => Sb,
            ("SM", true) => SmBit,
            ("SR", true) => Sr,
            ("ST", true) => St,
            ("B", true) => B,
            ("T", true) => T,
            ("SM", false) => Semaphores,
            ("CA", false) => Ca,
            ("CE", false) => Ce,
            ("CI", false) => Ci,
            ("CL", false) => Cl,
            ("MC", false) => Mc,
            ("RT", false) => Rt,
            ("VL", false) => Vl,
            ("VM", false) => Vm,
            ("XA", false) => Xa,
            _ => {
                return None;
            }
        })
    }

    /// Registers whose number may have two octal digits.
    pub(crate) fn has_wide_number(self) -> bool {
        matches!(
            self,
            RegisterClass::SmBit | RegisterClass::B | RegisterClass::T
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Register {
    pub(crate) class: RegisterClass,
    pub(crate) number: u8,
}

impl Register {
    /// Recognise a register designator.  With `any_case`, lower case
    /// designators are accepted too.
    pub(crate) fn parse(text: &str, any_case: bool) -> Option<Register> {
        let rx = if any_case {
            &rx::REGISTER_ANY_CASE
        } else {
            &rx::REGISTER
        };
        let caps = rx.captures(text)?;
        let (prefix, digits) = if let Some(m) = caps.name("one") {
            (m.as_str(), caps.name("d1").map(|d| d.as_str()))
        } else if let Some(m) = caps.name("two") {
            (m.as_str(), caps.name("d2").map(|d| d.as_str()))
        } else {
            (caps.name("bare")?.as_str(), None)
        };
        let class = RegisterClass::from_prefix(&prefix.to_ascii_uppercase(), digits.is_some())?;
        let number = match digits {
            Some(d) => u8::from_str_radix(d, 8).ok()?,
            None => 0,
        };
        Some(Register { class, number })
    }
}

/// The location counter pseudo-symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    /// `*`: the location counter, as a word address.
    Location,
    /// `*A`: the location counter as an absolute value.
    Absolute,
    /// `*B`: the bit position within the current parcel.
    ParcelBit,
    /// `*O`: the origin counter, as a word address.
    Origin,
    /// `*P`: the location counter, as a parcel address.
    Parcel,
    /// `*W`: the bit position within the current word.
    WordBit,
}

impl Counter {
    fn from_suffix(s: &str) -> Option<Counter> {
        match s {
            "A" => Some(Counter::Absolute),
            "B" => Some(Counter::ParcelBit),
            "O" => Some(Counter::Origin),
            "P" => Some(Counter::Parcel),
            "W" => Some(Counter::WordBit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Bang,
    Ampersand,
    Hash,
    Less,
    Greater,
    HashLess,
    HashGreater,
    Equals,
    /// `P.`: treat the operand as a parcel address.
    ParcelPrefix,
    /// `W.`: treat the operand as a word address.
    WordPrefix,
    /// `+F`
    FloatPlus,
    /// `-F`
    FloatMinus,
    /// `*F`
    FloatTimes,
    /// `*H`
    HalfTimes,
    /// `*I`
    IterationTimes,
    /// `*R`
    RoundedTimes,
    /// `/H`
    Reciprocal,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Backslash => "\\",
            Operator::Bang => "!",
            Operator::Ampersand => "&",
            Operator::Hash => "#",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::HashLess => "#<",
            Operator::HashGreater => "#>",
            Operator::Equals => "=",
            Operator::ParcelPrefix => "P.",
            Operator::WordPrefix => "W.",
            Operator::FloatPlus => "+F",
            Operator::FloatMinus => "-F",
            Operator::FloatTimes => "*F",
            Operator::HalfTimes => "*H",
            Operator::IterationTimes => "*I",
            Operator::RoundedTimes => "*R",
            Operator::Reciprocal => "/H",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Name {
    /// `None` for an unqualified name, `Some("")` for `//name`.
    pub(crate) qualifier: Option<String>,
    pub(crate) name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Register(Register),
    Name(Name),
    /// A numeric constant whose radix may depend on context; the text
    /// is kept until evaluation.
    Number(String),
    /// A constant with an explicit base (`D'..'`, `O'..'`, `X'..'`).
    Based(u64),
    Str(StringLit),
    Location(Counter),
    Op(Operator),
    LeftParen,
    RightParen,
    Comma,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

impl Token {
    pub(crate) fn is_register(&self) -> bool {
        matches!(self.kind, TokenKind::Register(_))
    }

    pub(crate) fn is_op(&self, op: Operator) -> bool {
        self.kind == TokenKind::Op(op)
    }
}

fn scan_number_tail(lex: &mut logos::Lexer<RawToken>) -> bool {
    let rest = lex.remainder().as_bytes();
    let digits_from = |start: usize| rest[start.min(rest.len())..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let mut n = 0;
    if rest.first() == Some(&b'.') {
        n = 1 + digits_from(1);
    }
    for markers in [[b'E', b'e'], [b'S', b's']] {
        if rest.get(n).is_some_and(|b| markers.contains(b)) {
            let mut m = n + 1;
            if matches!(rest.get(m), Some(b'+' | b'-')) {
                m += 1;
            }
            let d = digits_from(m);
            if d > 0 {
                n = m + d;
            }
        }
    }
    lex.bump(n);
    true
}

fn scan_based(lex: &mut logos::Lexer<RawToken>) -> (u32, String) {
    let radix = match lex.slice().as_bytes().first() {
        Some(b'D' | b'd') => 10,
        Some(b'O' | b'o') => 8,
        _ => 16,
    };
    let rest = lex.remainder();
    let digits: String = rest.chars().take_while(char::is_ascii_hexdigit).collect();
    let mut n = digits.len();
    if rest[n..].starts_with('\'') {
        n += 1;
    }
    lex.bump(n);
    (radix, digits)
}

fn scan_quoted(lex: &mut logos::Lexer<RawToken>) -> Option<StringLit> {
    let (lit, used) = scanner::scan_string(lex.remainder())?;
    lex.bump(used);
    Some(lit)
}

fn scan_ascii(lex: &mut logos::Lexer<RawToken>) -> Option<StringLit> {
    scan_quoted(lex).map(|lit| StringLit {
        justification: Justification::RightZero,
        ..lit
    })
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
enum RawToken {
    #[regex(r"[A-Za-z$@%][A-Za-z0-9$@%]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", scan_number_tail)]
    Number,

    #[regex(r"[DdOoXx]'", scan_based)]
    Based((u32, String)),

    #[regex(r"[Aa]'", scan_ascii)]
    Ascii(StringLit),

    #[token("'", scan_quoted)]
    Quoted(StringLit),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("\\")]
    Backslash,
    #[token("!")]
    Bang,
    #[token("&")]
    Ampersand,
    #[token("#")]
    Hash,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Equals,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
}

type RawItem = (Result<RawToken, ()>, Span);

struct Cooker<'a> {
    text: &'a str,
    raw: Vec<RawItem>,
    pos: usize,
    any_case: bool,
    out: Vec<Token>,
}

impl Cooker<'_> {
    fn peek(&self, offset: usize) -> Option<&RawItem> {
        self.raw.get(self.pos + offset)
    }

    /// The identifier `offset` places ahead, if it directly follows
    /// the lexeme before it.
    fn adjacent_ident(&self, offset: usize) -> Option<(&str, Span)> {
        let (prev, next) = (self.peek(offset - 1)?, self.peek(offset)?);
        match next {
            (Ok(RawToken::Ident(s)), span) if adjacent(&prev.1, span) => {
                Some((s.as_str(), span.clone()))
            }
            _ => None,
        }
    }

    fn adjacent_is(&self, offset: usize, want: &RawToken) -> bool {
        match (self.peek(offset - 1), self.peek(offset)) {
            (Some(prev), Some((Ok(tok), span))) => tok == want && adjacent(&prev.1, span),
            _ => false,
        }
    }

    fn expecting_operand(&self) -> bool {
        match self.out.last() {
            None => true,
            Some(tok) => matches!(
                tok.kind,
                TokenKind::Op(_) | TokenKind::LeftParen | TokenKind::Comma
            ),
        }
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.out.push(Token { kind, span });
    }

    /// Recognise `opF`-style operators: an operator lexeme directly
    /// followed by an identifier made of the variant letter and a
    /// register designator (for example `*F` and `S3` in `*FS3`).
    fn float_variant(&mut self, op_span: &Span, letters: &[(char, Operator)]) -> bool {
        let Some((ident, ident_span)) = self.adjacent_ident(1) else {
            return false;
        };
        let mut chars = ident.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        let Some((_, op)) = letters
            .iter()
            .find(|(letter, _)| {
                *letter == first || (self.any_case && letter.eq_ignore_ascii_case(&first))
            })
        else {
            return false;
        };
        let Some(reg) = Register::parse(chars.as_str(), self.any_case) else {
            return false;
        };
        let op = *op;
        self.push(TokenKind::Op(op), op_span.start..ident_span.start + 1);
        self.push(TokenKind::Register(reg), ident_span.start + 1..ident_span.end);
        self.pos += 2;
        true
    }

    fn qualified_name(&mut self, slash_span: &Span) -> bool {
        // `//name`
        if self.adjacent_is(1, &RawToken::Slash) {
            if let Some((name, span)) = self.adjacent_ident(2) {
                let name = name.to_string();
                self.push(
                    TokenKind::Name(Name {
                        qualifier: Some(String::new()),
                        name,
                    }),
                    slash_span.start..span.end,
                );
                self.pos += 3;
                return true;
            }
            return false;
        }
        // `/qual/name`
        if let Some((qual, _)) = self.adjacent_ident(1) {
            if self.adjacent_is(2, &RawToken::Slash) {
                if let Some((name, span)) = self.adjacent_ident(3) {
                    let qual = qual.to_string();
                    let name = name.to_string();
                    self.push(
                        TokenKind::Name(Name {
                            qualifier: Some(qual),
                            name,
                        }),
                        slash_span.start..span.end,
                    );
                    self.pos += 4;
                    return true;
                }
            }
        }
        false
    }

    fn cook_one(&mut self) {
        let (item, span) = self.raw[self.pos].clone();
        let tok = match item {
            Err(()) => {
                let bad = &self.text[span.clone()];
                self.push(TokenKind::Error(format!("unexpected '{bad}'")), span);
                self.pos += 1;
                return;
            }
            Ok(tok) => tok,
        };
        match tok {
            RawToken::Ident(text) => {
                if (text == "P" || text == "W" || (self.any_case && (text == "p" || text == "w")))
                    && self.adjacent_is(1, &RawToken::Dot)
                {
                    let op = if text.eq_ignore_ascii_case("P") {
                        Operator::ParcelPrefix
                    } else {
                        Operator::WordPrefix
                    };
                    self.push(TokenKind::Op(op), span.start..span.end + 1);
                    self.pos += 2;
                    return;
                }
                let kind = match Register::parse(&text, self.any_case) {
                    Some(reg) => TokenKind::Register(reg),
                    None => TokenKind::Name(Name {
                        qualifier: None,
                        name: text,
                    }),
                };
                self.push(kind, span);
            }
            RawToken::Number => {
                let end = self.adjacent_ident(1).map(|(_, ident_span)| ident_span.end);
                if let Some(end) = end {
                    let whole = &self.text[span.start..end];
                    let msg = format!("'{whole}' is neither a number nor a name");
                    self.push(TokenKind::Error(msg), span.start..end);
                    self.pos += 2;
                    return;
                }
                let text = self.text[span.clone()].to_string();
                self.push(TokenKind::Number(text), span);
            }
            RawToken::Based((radix, digits)) => {
                let kind = match scanner::parse_based(&digits, radix) {
                    Ok(n) => TokenKind::Based(n),
                    Err(e) => TokenKind::Error(e.to_string()),
                };
                self.push(kind, span);
            }
            RawToken::Ascii(lit) | RawToken::Quoted(lit) => {
                self.push(TokenKind::Str(lit), span);
            }
            RawToken::Star => {
                if self.float_variant(
                    &span,
                    &[
                        ('F', Operator::FloatTimes),
                        ('H', Operator::HalfTimes),
                        ('I', Operator::IterationTimes),
                        ('R', Operator::RoundedTimes),
                    ],
                ) {
                    return;
                }
                if self.expecting_operand() {
                    if let Some((suffix, ident_span)) = self.adjacent_ident(1) {
                        if let Some(counter) = Counter::from_suffix(suffix) {
                            self.push(TokenKind::Location(counter), span.start..ident_span.end);
                            self.pos += 2;
                            return;
                        }
                    }
                    self.push(TokenKind::Location(Counter::Location), span);
                } else {
                    self.push(TokenKind::Op(Operator::Star), span);
                }
            }
            RawToken::Plus => {
                if self.float_variant(&span, &[('F', Operator::FloatPlus)]) {
                    return;
                }
                self.push(TokenKind::Op(Operator::Plus), span);
            }
            RawToken::Minus => {
                if self.float_variant(&span, &[('F', Operator::FloatMinus)]) {
                    return;
                }
                self.push(TokenKind::Op(Operator::Minus), span);
            }
            RawToken::Slash => {
                if self.expecting_operand() && self.qualified_name(&span) {
                    return;
                }
                if self.float_variant(&span, &[('H', Operator::Reciprocal)]) {
                    return;
                }
                self.push(TokenKind::Op(Operator::Slash), span);
            }
            RawToken::Hash => {
                if self.adjacent_is(1, &RawToken::Less) {
                    self.push(TokenKind::Op(Operator::HashLess), span.start..span.end + 1);
                    self.pos += 2;
                    return;
                }
                if self.adjacent_is(1, &RawToken::Greater) {
                    self.push(TokenKind::Op(Operator::HashGreater), span.start..span.end + 1);
                    self.pos += 2;
                    return;
                }
                self.push(TokenKind::Op(Operator::Hash), span);
            }
            RawToken::Backslash => self.push(TokenKind::Op(Operator::Backslash), span),
            RawToken::Bang => self.push(TokenKind::Op(Operator::Bang), span),
            RawToken::Ampersand => self.push(TokenKind::Op(Operator::Ampersand), span),
            RawToken::Less => self.push(TokenKind::Op(Operator::Less), span),
            RawToken::Greater => self.push(TokenKind::Op(Operator::Greater), span),
            RawToken::Equals => self.push(TokenKind::Op(Operator::Equals), span),
            RawToken::LeftParen => self.push(TokenKind::LeftParen, span),
            RawToken::RightParen => self.push(TokenKind::RightParen, span),
            RawToken::Comma => self.push(TokenKind::Comma, span),
            RawToken::Dot => self.push(TokenKind::Error("misplaced '.'".to_string()), span),
        }
        self.pos += 1;
    }
}

/// Split a field into tokens.  With `any_case` (the flexible
/// tokenizer rules) register designators may be written in lower
/// case.
pub(crate) fn tokenize(text: &str, any_case: bool) -> Vec<Token> {
    let raw: Vec<RawItem> = RawToken::lexer(text).spanned().collect();
    let mut cooker = Cooker {
        text,
        raw,
        pos: 0,
        any_case,
        out: Vec::new(),
    };
    while cooker.pos < cooker.raw.len() {
        cooker.cook_one();
    }
    cooker.out
}
