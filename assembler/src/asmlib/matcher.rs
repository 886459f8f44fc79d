//! Selection of machine instructions by the shape of their fields.
//!
//! Every machine instruction is described by a pattern such as
//! `"Si Sj+FSk"` or `"Ai $,Ah"`.  The patterns are compiled into a
//! trie; a statement is matched by walking the trie along its tokens,
//! without backtracking.
//!
//! In a pattern, a space separates the result field from the operand
//! field, `,` is a subfield separator and `$` stands for an
//! expression.  An upper case register prefix followed by a lower
//! case designator (`Ai`, `Bjk`, `SMjk`) matches any register of that
//! class; followed by digits (`A0`, `S0`) it matches only that
//! register.  Other upper case words are mnemonics which must appear
//! as written.
use std::fmt::{self, Debug, Formatter};

use super::expr::{parse_expression, Expr, ExprError};
use super::lexer::{Operator, Register, RegisterClass, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PatternItem {
    FieldDelimiter,
    SubfieldDelimiter,
    /// A register of the class; with a number, only that register.
    Register(RegisterClass, Option<u8>),
    Operator(Operator),
    Expression,
    Mnemonic(String),
}

fn float_operator(op: char, suffix: char) -> Option<Operator> {
    match (op, suffix) {
        ('+', 'F') => Some(Operator::FloatPlus),
        ('-', 'F') => Some(Operator::FloatMinus),
        ('*', 'F') => Some(Operator::FloatTimes),
        ('*', 'H') => Some(Operator::HalfTimes),
        ('*', 'I') => Some(Operator::IterationTimes),
        ('*', 'R') => Some(Operator::RoundedTimes),
        ('/', 'H') => Some(Operator::Reciprocal),
        _ => None,
    }
}

fn plain_operator(ch: char) -> Option<Operator> {
    match ch {
        '+' => Some(Operator::Plus),
        '-' => Some(Operator::Minus),
        '*' => Some(Operator::Star),
        '/' => Some(Operator::Slash),
        '\\' => Some(Operator::Backslash),
        '!' => Some(Operator::Bang),
        '&' => Some(Operator::Ampersand),
        '#' => Some(Operator::Hash),
        '<' => Some(Operator::Less),
        '>' => Some(Operator::Greater),
        _ => None,
    }
}

/// Convert the text of a pattern into the items it matches.
///
/// # Panics
///
/// On a malformed pattern; patterns are part of the assembler itself.
pub(crate) fn parse_pattern(pattern: &str) -> Vec<PatternItem> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            ' ' => {
                items.push(PatternItem::FieldDelimiter);
                pos += 1;
            }
            ',' => {
                items.push(PatternItem::SubfieldDelimiter);
                pos += 1;
            }
            '$' => {
                items.push(PatternItem::Expression);
                pos += 1;
            }
            c if c.is_ascii_uppercase() => {
                let start = pos;
                while pos < chars.len() && chars[pos].is_ascii_uppercase() {
                    pos += 1;
                }
                let prefix: String = chars[start..pos].iter().collect();
                let lower = pos;
                while pos < chars.len() && chars[pos].is_ascii_lowercase() {
                    pos += 1;
                }
                let digits = pos;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let item = if pos > digits {
                    let number: String = chars[digits..pos].iter().collect();
                    let class = RegisterClass::from_prefix(&prefix, true)
                        .unwrap_or_else(|| panic!("bad register {prefix} in pattern {pattern}"));
                    let number = u8::from_str_radix(&number, 8)
                        .unwrap_or_else(|_| panic!("bad register number in pattern {pattern}"));
                    PatternItem::Register(class, Some(number))
                } else if digits > lower {
                    let class = RegisterClass::from_prefix(&prefix, true)
                        .unwrap_or_else(|| panic!("bad register {prefix} in pattern {pattern}"));
                    PatternItem::Register(class, None)
                } else if let Some(class) = RegisterClass::from_prefix(&prefix, false) {
                    PatternItem::Register(class, None)
                } else {
                    PatternItem::Mnemonic(prefix)
                };
                items.push(item);
            }
            c => {
                let next = chars.get(pos + 1).copied();
                let after = chars.get(pos + 2).copied();
                if let (Some(suffix), Some(following)) = (next, after) {
                    if following.is_ascii_uppercase() {
                        if let Some(op) = float_operator(c, suffix) {
                            items.push(PatternItem::Operator(op));
                            pos += 2;
                            continue;
                        }
                    }
                }
                let op = match (c, next) {
                    ('#', Some('<')) => {
                        pos += 1;
                        Operator::HashLess
                    }
                    ('#', Some('>')) => {
                        pos += 1;
                        Operator::HashGreater
                    }
                    _ => plain_operator(c)
                        .unwrap_or_else(|| panic!("bad character {c:?} in pattern {pattern}")),
                };
                items.push(PatternItem::Operator(op));
                pos += 1;
            }
        }
    }
    if !items.contains(&PatternItem::FieldDelimiter) {
        items.push(PatternItem::FieldDelimiter);
    }
    items
}

#[derive(Debug, Default)]
struct TrieNode {
    children: Vec<(PatternItem, usize)>,
    /// Set when a pattern ends here.
    end: Option<usize>,
}

/// Something captured from the statement while matching.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Register(u8),
    Expression(Expr),
}

#[derive(Debug)]
pub(crate) struct Match<'m, T> {
    pub(crate) handler: &'m T,
    /// Registers and expressions, in the order they appear.
    pub(crate) args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MatchError {
    /// No pattern has this shape.
    NoMatch,
    /// The shape matched up to an expression which could not be
    /// parsed.
    BadExpression(ExprError),
}

/// The tokens of one field of a statement, and the text they came
/// from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldTokens<'a> {
    pub(crate) tokens: &'a [Token],
    pub(crate) text: &'a str,
}

pub(crate) struct Matcher<T> {
    nodes: Vec<TrieNode>,
    handlers: Vec<T>,
}

impl<T> Debug for Matcher<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("nodes", &self.nodes.len())
            .field("patterns", &self.handlers.len())
            .finish()
    }
}

impl<T> Default for Matcher<T> {
    fn default() -> Matcher<T> {
        Matcher {
            nodes: vec![TrieNode::default()],
            handlers: Vec::new(),
        }
    }
}

impl<T> Matcher<T> {
    fn child(&self, node: usize, item: &PatternItem) -> Option<usize> {
        self.nodes[node]
            .children
            .iter()
            .find(|(it, _)| it == item)
            .map(|(_, n)| *n)
    }

    /// Add a pattern.
    ///
    /// # Panics
    ///
    /// If an identical pattern is already present.
    pub(crate) fn insert(&mut self, pattern: &str, handler: T) {
        let mut node = 0;
        for item in parse_pattern(pattern) {
            node = match self.child(node, &item) {
                Some(n) => n,
                None => {
                    self.nodes.push(TrieNode::default());
                    let n = self.nodes.len() - 1;
                    self.nodes[node].children.push((item, n));
                    n
                }
            };
        }
        assert!(
            self.nodes[node].end.is_none(),
            "duplicate instruction pattern {pattern:?}"
        );
        self.handlers.push(handler);
        self.nodes[node].end = Some(self.handlers.len() - 1);
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Could the walk continue from `node` given that the next token
    /// is `next` (`None` at the end of the field)?
    fn accepts(&self, node: usize, next: Option<&Token>) -> bool {
        let n = &self.nodes[node];
        let has = |pred: &dyn Fn(&PatternItem) -> bool| n.children.iter().any(|(it, _)| pred(it));
        match next.map(|t| &t.kind) {
            None => n.end.is_some() || has(&|it| *it == PatternItem::FieldDelimiter),
            Some(TokenKind::Comma) => has(&|it| *it == PatternItem::SubfieldDelimiter),
            Some(TokenKind::Register(r)) => {
                has(&|it| matches!(it, PatternItem::Register(c, _) if *c == r.class))
            }
            Some(TokenKind::Op(op)) => has(&|it| {
                *it == PatternItem::Operator(*op) || *it == PatternItem::Expression
            }),
            Some(_) => has(&|it| {
                matches!(it, PatternItem::Expression | PatternItem::Mnemonic(_))
            }),
        }
    }

    fn register_child(&self, node: usize, reg: &Register, next: Option<&Token>) -> Option<usize> {
        let fixed = self.child(node, &PatternItem::Register(reg.class, Some(reg.number)));
        let general = self.child(node, &PatternItem::Register(reg.class, None));
        match (fixed, general) {
            (Some(f), Some(g)) => {
                if self.accepts(f, next) {
                    Some(f)
                } else {
                    Some(g)
                }
            }
            (f, g) => f.or(g),
        }
    }

    /// Find the pattern matching the result and operand fields of a
    /// statement.  With `any_case`, mnemonics may be written in lower
    /// case.
    pub(crate) fn find(
        &self,
        result: FieldTokens<'_>,
        operand: FieldTokens<'_>,
        any_case: bool,
    ) -> Result<Match<'_, T>, MatchError> {
        let mut node = 0;
        let mut args = Vec::new();
        for (field_index, field) in [result, operand].iter().enumerate() {
            if field_index > 0 {
                node = self
                    .child(node, &PatternItem::FieldDelimiter)
                    .ok_or(MatchError::NoMatch)?;
            }
            let tokens = field.tokens;
            let mut pos = 0;
            while pos < tokens.len() {
                let token = &tokens[pos];
                let next = tokens.get(pos + 1);
                let at_start = pos == 0 || tokens[pos - 1].kind == TokenKind::Comma;
                match &token.kind {
                    TokenKind::Comma => {
                        node = self
                            .child(node, &PatternItem::SubfieldDelimiter)
                            .ok_or(MatchError::NoMatch)?;
                        pos += 1;
                        continue;
                    }
                    TokenKind::Register(reg) => {
                        if let Some(n) = self.register_child(node, reg, next) {
                            node = n;
                            args.push(Arg::Register(reg.number));
                            pos += 1;
                            continue;
                        }
                    }
                    TokenKind::Op(op) => {
                        let op_child = self.child(node, &PatternItem::Operator(*op));
                        let has_expression = self.child(node, &PatternItem::Expression).is_some();
                        let expression_wins =
                            has_expression && at_start && !next.is_some_and(Token::is_register);
                        if let Some(n) = op_child {
                            if !expression_wins {
                                node = n;
                                pos += 1;
                                continue;
                            }
                        }
                    }
                    TokenKind::Name(name) if name.qualifier.is_none() && next.is_none() => {
                        let wanted = if any_case {
                            name.name.to_ascii_uppercase()
                        } else {
                            name.name.clone()
                        };
                        if let Some(n) = self.child(node, &PatternItem::Mnemonic(wanted)) {
                            node = n;
                            pos += 1;
                            continue;
                        }
                    }
                    _ => (),
                }
                let expr_node = self
                    .child(node, &PatternItem::Expression)
                    .ok_or(MatchError::NoMatch)?;
                let (expr, used) = parse_expression(&tokens[pos..], field.text)
                    .map_err(MatchError::BadExpression)?;
                if used == 0 {
                    return Err(MatchError::NoMatch);
                }
                args.push(Arg::Expression(expr));
                node = expr_node;
                pos += used;
            }
        }
        match self.nodes[node].end {
            Some(h) => Ok(Match {
                handler: &self.handlers[h],
                args,
            }),
            None => Err(MatchError::NoMatch),
        }
    }
}
