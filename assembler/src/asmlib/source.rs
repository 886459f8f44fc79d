//! Reading source text as logical lines.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{event, Level};

use super::types::{AssemblerFailure, IoAction, IoFailed, LineNumber};

/// Logical lines longer than this are truncated.
pub(crate) const MAX_LINE: usize = 90;

/// Shorter lines are padded with blanks to this length.
const MIN_LINE: usize = 7;

/// A physical line starting with this continues the previous line.
const CONTINUATION: char = ',';

/// One statement's worth of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceLine {
    /// Where the statement starts.
    pub(crate) number: LineNumber,
    pub(crate) text: String,
    pub(crate) truncated: bool,
}

impl SourceLine {
    fn new(number: LineNumber, raw: &str) -> SourceLine {
        let mut text: String = raw.trim_end().chars().take(MAX_LINE).collect();
        let truncated = raw.trim_end().chars().count() > MAX_LINE;
        let len = text.chars().count();
        if len < MIN_LINE {
            text.push_str(&" ".repeat(MIN_LINE - len));
        }
        SourceLine {
            number,
            text,
            truncated,
        }
    }
}

/// Divide text into logical lines, numbering physical lines from
/// `first_line`.  The text after the marker of a continuation line is
/// appended to the line before it.
pub(crate) fn logical_lines(text: &str, first_line: LineNumber) -> Vec<SourceLine> {
    let mut joined: Vec<(LineNumber, String)> = Vec::new();
    for (n, physical) in text.lines().enumerate() {
        let number = first_line + n;
        match (physical.strip_prefix(CONTINUATION), joined.last_mut()) {
            (Some(rest), Some((_, previous))) => {
                previous.truncate(previous.trim_end().len());
                previous.push_str(rest);
            }
            _ => joined.push((number, physical.to_string())),
        }
    }
    joined
        .into_iter()
        .map(|(number, raw)| SourceLine::new(number, &raw))
        .collect()
}

/// A file of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    /// # Errors
    ///
    /// When the file cannot be read.
    pub fn read(path: &Path) -> Result<SourceFile, AssemblerFailure> {
        event!(Level::DEBUG, "reading {}", path.display());
        let text = fs::read_to_string(path)
            .map_err(|e| IoFailed::on_file(IoAction::Read, path, e))?;
        Ok(SourceFile {
            path: path.to_path_buf(),
            text,
        })
    }
}

/// Locate external text.  A name with a directory part, or which
/// exists as given, is used as it is; otherwise each directory of the
/// search path is tried in turn.
///
/// # Errors
///
/// `ExternalTextNotFound` when no candidate exists.
pub fn find_external_text(
    name: &Path,
    search_path: &[PathBuf],
) -> Result<PathBuf, AssemblerFailure> {
    let has_directory = name
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty());
    if has_directory || name.is_file() {
        return Ok(name.to_path_buf());
    }
    search_path
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| AssemblerFailure::ExternalTextNotFound {
            name: name.as_os_str().to_owned(),
            search_path: search_path.to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_and_trimming() {
        let lines = logical_lines("A\n         A1 5   \n", 1);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "A      ");
        assert_eq!(lines[1].text, "         A1 5");
        assert_eq!(lines[1].number, 2);
        assert!(!lines[0].truncated);
    }

    #[test]
    fn test_truncation() {
        let long = "X".repeat(MAX_LINE + 5);
        let lines = logical_lines(&long, 1);
        assert_eq!(lines[0].text.len(), MAX_LINE);
        assert!(lines[0].truncated);
    }

    #[test]
    fn test_continuation() {
        let lines = logical_lines("         CON   1,\n,2,3\n         CON   4", 10);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "         CON   1,2,3");
        assert_eq!(lines[0].number, 10);
        assert_eq!(lines[1].number, 12);
    }

    #[test]
    fn test_external_text_search() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let file = dir.path().join("defs.s");
        fs::write(&file, "* definitions\n").expect("write external text");
        let found = find_external_text(Path::new("defs.s"), &[dir.path().to_path_buf()])
            .expect("external text should be found");
        assert_eq!(found, file);
        assert!(matches!(
            find_external_text(Path::new("nothere.s"), &[dir.path().to_path_buf()]),
            Err(AssemblerFailure::ExternalTextNotFound { .. })
        ));
    }
}
