//! Macro definitions, and the frames which feed the lines of a macro
//! (or of a duplicated group) back to the assembler.
use std::collections::BTreeMap;

use super::diagnostic::ErrorKind;
use super::fields::{split_fields, split_subfields, strip_parens};
use super::scanner::{is_ident_char, is_ident_start, is_identifier};
use super::symtab::Pass;
use super::types::LineNumber;

/// A piece of a macro body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Text(String),
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BodyLine(pub(crate) Vec<Fragment>);

impl BodyLine {
    /// Divide `line` into literal text and references to the named
    /// parameters.  A parameter is only recognised as a whole
    /// identifier.
    pub(crate) fn parse(line: &str, parameters: &[&str]) -> BodyLine {
        let mut fragments = Vec::new();
        let mut text = String::new();
        let mut rest = line;
        while let Some(ch) = rest.chars().next() {
            if is_ident_start(ch) {
                let len = rest
                    .find(|c: char| !is_ident_char(c))
                    .unwrap_or(rest.len());
                let word = &rest[..len];
                if parameters.contains(&word) {
                    if !text.is_empty() {
                        fragments.push(Fragment::Text(std::mem::take(&mut text)));
                    }
                    fragments.push(Fragment::Parameter(word.to_string()));
                } else {
                    text.push_str(word);
                }
                rest = &rest[len..];
            } else if ch.is_ascii_digit() {
                // Digits followed by letters (such as 12AB) do not
                // contain a parameter reference.
                let len = rest
                    .find(|c: char| !is_ident_char(c))
                    .unwrap_or(rest.len());
                text.push_str(&rest[..len]);
                rest = &rest[len..];
            } else {
                text.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
        if !text.is_empty() {
            fragments.push(Fragment::Text(text));
        }
        BodyLine(fragments)
    }

    fn render(&self, bindings: &BTreeMap<String, String>) -> String {
        self.0
            .iter()
            .map(|f| match f {
                Fragment::Text(t) => t.as_str(),
                Fragment::Parameter(p) => bindings.get(p).map_or("", String::as_str),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MacroDef {
    pub(crate) name: String,
    pub(crate) creation_pass: Pass,
    pub(crate) location_parameter: Option<String>,
    pub(crate) positional: Vec<String>,
    /// Keyword parameters and their default values.
    pub(crate) keyword: Vec<(String, String)>,
    pub(crate) body: Vec<BodyLine>,
}

/// The prototype statement of a macro, before its body is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prototype {
    pub(crate) name: String,
    pub(crate) location_parameter: Option<String>,
    pub(crate) positional: Vec<String>,
    pub(crate) keyword: Vec<(String, String)>,
}

impl Prototype {
    /// Parse a prototype statement such as `LOC NAME P1,P2,K=DEFAULT`.
    pub(crate) fn parse(line: &str) -> Result<Prototype, ErrorKind> {
        let fields = split_fields(line);
        if !is_identifier(&fields.result) {
            return Err(ErrorKind::ResultField);
        }
        let location_parameter = if fields.location.is_empty() {
            None
        } else if is_identifier(&fields.location) {
            Some(fields.location.clone())
        } else {
            return Err(ErrorKind::LocationField);
        };
        let mut positional = Vec::new();
        let mut keyword: Vec<(String, String)> = Vec::new();
        for item in split_subfields(&fields.operand) {
            match item.split_once('=') {
                Some((name, default)) if is_identifier(name) => {
                    keyword.push((name.to_string(), strip_parens(default).to_string()));
                }
                None if is_identifier(item) => {
                    if !keyword.is_empty() {
                        // Positional parameters come first.
                        return Err(ErrorKind::OperandField);
                    }
                    positional.push(item.to_string());
                }
                _ => {
                    return Err(ErrorKind::OperandField);
                }
            }
        }
        Ok(Prototype {
            name: fields.result,
            location_parameter,
            positional,
            keyword,
        })
    }

    pub(crate) fn parameter_names(&self) -> Vec<&str> {
        self.location_parameter
            .iter()
            .map(String::as_str)
            .chain(self.positional.iter().map(String::as_str))
            .chain(self.keyword.iter().map(|(k, _)| k.as_str()))
            .collect()
    }

    pub(crate) fn define(self, body: &[String], creation_pass: Pass) -> MacroDef {
        let names = self.parameter_names();
        let body = body
            .iter()
            .map(|line| BodyLine::parse(line, &names))
            .collect();
        MacroDef {
            name: self.name,
            creation_pass,
            location_parameter: self.location_parameter,
            positional: self.positional,
            keyword: self.keyword,
            body,
        }
    }
}

impl MacroDef {
    /// Bind the arguments of a call and render the lines of the
    /// expansion.
    pub(crate) fn expand(&self, location: &str, operand: &str) -> Result<Vec<String>, ErrorKind> {
        let mut bindings: BTreeMap<String, String> = self
            .keyword
            .iter()
            .map(|(k, default)| (k.clone(), default.clone()))
            .collect();
        if let Some(p) = &self.location_parameter {
            bindings.insert(p.clone(), location.to_string());
        }
        let mut next_positional = self.positional.iter();
        for arg in split_subfields(operand) {
            if let Some((name, value)) = arg.split_once('=') {
                if self.keyword.iter().any(|(k, _)| k == name) {
                    bindings.insert(name.to_string(), strip_parens(value).to_string());
                    continue;
                }
            }
            match next_positional.next() {
                Some(p) => {
                    bindings.insert(p.clone(), strip_parens(arg).to_string());
                }
                None => {
                    return Err(ErrorKind::OperandField);
                }
            }
        }
        Ok(self.body.iter().map(|line| line.render(&bindings)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Macro,
    Dup,
}

/// Lines generated by a macro call or a `DUP`, waiting to be
/// assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) kind: FrameKind,
    /// The line of the statement which created the frame.
    pub(crate) origin: LineNumber,
    lines: Vec<String>,
    cursor: usize,
}

impl Frame {
    pub(crate) fn new(kind: FrameKind, origin: LineNumber, lines: Vec<String>) -> Frame {
        Frame {
            kind,
            origin,
            lines,
            cursor: 0,
        }
    }

    pub(crate) fn next_line(&mut self) -> Option<String> {
        let line = self.lines.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_line_fragments() {
        let line = BodyLine::parse("         CON      A+B+AB", &["A", "B"]);
        assert_eq!(
            line.0,
            vec![
                Fragment::Text("         CON      ".to_string()),
                Fragment::Parameter("A".to_string()),
                Fragment::Text("+".to_string()),
                Fragment::Parameter("B".to_string()),
                Fragment::Text("+AB".to_string()),
            ]
        );
    }

    #[test]
    fn test_prototype() {
        let p = Prototype::parse("LAB      FOO      A,B=1").expect("valid prototype");
        assert_eq!(p.name, "FOO");
        assert_eq!(p.location_parameter.as_deref(), Some("LAB"));
        assert_eq!(p.positional, vec!["A".to_string()]);
        assert_eq!(p.keyword, vec![("B".to_string(), "1".to_string())]);
        assert_eq!(
            Prototype::parse("         FOO      K=1,A"),
            Err(ErrorKind::OperandField)
        );
    }

    #[test]
    fn test_expansion_uses_defaults() {
        let p = Prototype::parse("         FOO      A,B=1").expect("valid prototype");
        let def = p.define(&["         CON      A+B".to_string()], Pass::One);
        assert_eq!(
            def.expand("", "10").expect("binds"),
            vec!["         CON      10+1".to_string()]
        );
        assert_eq!(
            def.expand("", "10,B=(2)").expect("binds"),
            vec!["         CON      10+2".to_string()]
        );
        assert_eq!(def.expand("", "1,2"), Err(ErrorKind::OperandField));
        // Unbound parameters are empty.
        assert_eq!(
            def.expand("", "").expect("binds"),
            vec!["         CON      +1".to_string()]
        );
    }

    #[test]
    fn test_frame() {
        let mut f = Frame::new(FrameKind::Dup, 3, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(f.next_line().as_deref(), Some("a"));
        assert_eq!(f.next_line().as_deref(), Some("b"));
        assert_eq!(f.next_line(), None);
    }
}
