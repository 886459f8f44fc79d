//! Choices made by the user of the assembler.
use std::path::{Path, PathBuf};

use super::context::Settings;

/// Where an output (the listing or the object file) goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    #[default]
    Suppressed,
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// Interpret an output argument: `-` and `$OUT` mean standard
    /// output and `0` means no output at all.
    #[must_use]
    pub fn from_argument(arg: &str) -> Destination {
        match arg {
            "-" | "$OUT" => Destination::Stdout,
            "0" => Destination::Suppressed,
            path => Destination::File(PathBuf::from(path)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub listing: Destination,
    pub object: Destination,
    /// Directories searched for external text.
    pub search_path: Vec<PathBuf>,
    /// External text, assembled ahead of the source files.
    pub external_text: Option<PathBuf>,
    /// Accept lower case mnemonics and register names.
    pub flexible: bool,
    pub no_section_stack: bool,
    pub warnings_fatal: bool,
    /// Undefined symbols become externals.
    pub implicit_externals: bool,
    /// The name of any code assembled outside `IDENT`...`END`.
    pub module_id: Option<String>,
}

impl Options {
    pub(crate) fn settings(&self) -> Settings {
        Settings {
            flexible: self.flexible,
            no_section_stack: self.no_section_stack,
            implicit_externals: self.implicit_externals,
        }
    }
}

/// Split a search path.  Either `:` or `;` separates the directories.
#[must_use]
pub fn parse_search_path(path: &str) -> Vec<PathBuf> {
    path.split([':', ';'])
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// The longest module name the object format allows.
const MODULE_ID_LIMIT: usize = 8;

fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes.iter().fold(OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(PRIME)
    })
}

/// Make a module identifier from a name.  Names which are too long
/// keep their first four characters, followed by four hexadecimal
/// digits of a hash of the whole name, so that different long names
/// remain distinct.
#[must_use]
pub fn module_identifier(name: &str) -> String {
    let name = name.to_ascii_uppercase();
    if name.chars().count() <= MODULE_ID_LIMIT {
        return name;
    }
    let prefix: String = name.chars().take(MODULE_ID_LIMIT / 2).collect();
    format!("{prefix}{:04X}", fnv1a(name.as_bytes()) & 0xFFFF)
}

/// The default module identifier for a source file: its name without
/// directory or extension.
#[must_use]
pub fn module_identifier_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    module_identifier(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination() {
        assert_eq!(Destination::from_argument("-"), Destination::Stdout);
        assert_eq!(Destination::from_argument("$OUT"), Destination::Stdout);
        assert_eq!(Destination::from_argument("0"), Destination::Suppressed);
        assert_eq!(
            Destination::from_argument("x.o"),
            Destination::File(PathBuf::from("x.o"))
        );
    }

    #[test]
    fn test_search_path() {
        assert_eq!(
            parse_search_path("a:b;c::"),
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
    }

    #[test]
    fn test_fnv1a() {
        // Published test vectors for 32-bit FNV-1a.
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
    }

    #[test]
    fn test_module_identifier() {
        assert_eq!(module_identifier("prog"), "PROG");
        assert_eq!(module_identifier("EIGHTCHR"), "EIGHTCHR");
        let long = module_identifier("verylongname");
        assert_eq!(long.len(), 8);
        assert!(long.starts_with("VERY"));
        assert_ne!(long, module_identifier("verylongnamf"));
        assert_eq!(
            module_identifier_for(Path::new("/tmp/hello.s")),
            "HELLO"
        );
    }
}
