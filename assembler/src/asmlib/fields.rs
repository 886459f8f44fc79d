//! Division of a source statement into its fields.
//!
//! A statement has up to three significant fields: location, result
//! and operand.  Anything after the operand field is commentary.
//! Fields are separated by blanks; a quoted string or a parenthesised
//! group is a single run even if it contains blanks.
use super::state::SourceFormat;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Fields {
    pub(crate) location: String,
    pub(crate) result: String,
    pub(crate) operand: String,
    /// Byte offset of the operand field within the statement.
    pub(crate) operand_column: usize,
}

/// True for a full-line comment.
pub(crate) fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('*')
}

/// Length of the run (of non-blank characters) at the start of `s`.
/// Quotes and parentheses make blanks inside them part of the run.
fn run_length(s: &str) -> usize {
    let mut depth = 0_usize;
    let mut quoted = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ' ' | '\t' if !quoted && depth == 0 => {
                return i;
            }
            _ => (),
        }
    }
    s.len()
}

fn skip_blanks(s: &str, pos: usize) -> usize {
    pos + s[pos..]
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(s.len() - pos)
}

/// Remove the part of the statement which the source format says is
/// not part of it: columns beyond 72 in the old format, and in the
/// new format anything after a `;` which is not inside quotes.
pub(crate) fn strip_commentary(line: &str, format: SourceFormat) -> &str {
    match format {
        SourceFormat::Old => match line.char_indices().nth(SourceFormat::OLD_FORMAT_WIDTH) {
            Some((cut, _)) => &line[..cut],
            None => line,
        },
        SourceFormat::New => {
            let mut quoted = false;
            for (i, ch) in line.char_indices() {
                match ch {
                    '\'' => quoted = !quoted,
                    ';' if !quoted => {
                        return &line[..i];
                    }
                    _ => (),
                }
            }
            line
        }
    }
}

/// Split a statement into fields.  The location field is present
/// when the statement starts with a non-blank character in column 0,
/// or in column 1 after a single blank.
pub(crate) fn split_fields(line: &str) -> Fields {
    let mut fields = Fields::default();
    let bytes = line.as_bytes();
    let mut pos = 0;
    let location_start = match bytes {
        [b, ..] if !b.is_ascii_whitespace() => Some(0),
        [_, b, ..] if !b.is_ascii_whitespace() => Some(1),
        _ => None,
    };
    if let Some(start) = location_start {
        let len = run_length(&line[start..]);
        fields.location = line[start..start + len].to_string();
        pos = start + len;
    }
    pos = skip_blanks(line, pos);
    let len = run_length(&line[pos..]);
    fields.result = line[pos..pos + len].to_string();
    pos = skip_blanks(line, pos + len);
    let len = run_length(&line[pos..]);
    fields.operand = line[pos..pos + len].to_string();
    fields.operand_column = pos;
    fields
}

/// Split a field at the commas which are not inside quotes or
/// parentheses.  An empty field has no subfields.
pub(crate) fn split_subfields(field: &str) -> Vec<&str> {
    if field.is_empty() {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut depth = 0_usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in field.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                result.push(&field[start..i]);
                start = i + 1;
            }
            _ => (),
        }
    }
    result.push(&field[start..]);
    result
}

/// Remove one level of enclosing parentheses.
pub(crate) fn strip_parens(s: &str) -> &str {
    match s.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => inner,
        None => s,
    }
}

/// Decode a quoted string such as `'it''s'`.  Returns `None` when
/// `s` is not exactly one quoted string.
pub(crate) fn unquote(s: &str) -> Option<String> {
    let body = s.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\'' && chars.next() != Some('\'') {
            return None;
        }
        out.push(ch);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> (String, String, String) {
        let f = split_fields(line);
        (f.location, f.result, f.operand)
    }

    #[test]
    fn test_location_columns() {
        assert_eq!(
            fields("LAB      A1       5   comment"),
            ("LAB".to_string(), "A1".to_string(), "5".to_string())
        );
        assert_eq!(
            fields(" LAB EQU 1"),
            ("LAB".to_string(), "EQU".to_string(), "1".to_string())
        );
        assert_eq!(
            fields("         IDENT    M"),
            (String::new(), "IDENT".to_string(), "M".to_string())
        );
        assert_eq!(fields("       "), (String::new(), String::new(), String::new()));
    }

    #[test]
    fn test_opaque_runs() {
        assert_eq!(
            fields("         DATA     'A B',(1, 2)  trailing"),
            (
                String::new(),
                "DATA".to_string(),
                "'A B',(1, 2)".to_string()
            )
        );
    }

    #[test]
    fn test_subfields() {
        assert_eq!(split_subfields("A,'x,y',(1,2)"), vec!["A", "'x,y'", "(1,2)"]);
        assert_eq!(split_subfields(",A0,Ak"), vec!["", "A0", "Ak"]);
        assert_eq!(split_subfields(""), Vec::<&str>::new());
    }

    #[test]
    fn test_strip_commentary() {
        assert_eq!(
            strip_commentary(" A1 5 ; load", SourceFormat::New),
            " A1 5 "
        );
        assert_eq!(
            strip_commentary(" DATA ';' ; x", SourceFormat::New),
            " DATA ';' "
        );
        let long = format!("{}{}", "X".repeat(72), "IGNORED");
        assert_eq!(strip_commentary(&long, SourceFormat::Old).len(), 72);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'it''s'"), Some("it's".to_string()));
        assert_eq!(unquote("'a'b'"), None);
        assert_eq!(unquote("abc"), None);
        assert_eq!(strip_parens("(1,2)"), "1,2");
    }
}
