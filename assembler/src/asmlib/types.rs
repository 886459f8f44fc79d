use std::error::Error;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// Source line numbers count from 1.
pub type LineNumber = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoAction {
    Read,
    Write,
    Open,
    Close,
}

impl Display for IoAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoAction::Read => "read",
            IoAction::Write => "write",
            IoAction::Open => "open",
            IoAction::Close => "close",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoTarget {
    File(PathBuf),
    Stdout,
    /// An in-memory buffer.
    Memory,
}

impl Display for IoTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IoTarget::File(path) => write!(f, "file {}", path.display()),
            IoTarget::Stdout => f.write_str("standard output"),
            IoTarget::Memory => f.write_str("memory buffer"),
        }
    }
}

#[derive(Debug)]
pub struct IoFailed {
    pub action: IoAction,
    pub target: IoTarget,
    pub error: IoError,
}

impl Display for IoFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let IoFailed {
            action,
            target,
            error,
        } = self;
        write!(f, "failed to {action} {target}: {error}")
    }
}

impl IoFailed {
    pub(crate) fn on_file(action: IoAction, path: &Path, error: IoError) -> IoFailed {
        IoFailed {
            action,
            target: IoTarget::File(path.to_path_buf()),
            error,
        }
    }
}

/// Failures which stop the assembler.  Problems with the program
/// being assembled are not failures of this kind; they are recorded
/// as diagnostics against the statement concerned (see
/// [`crate::diagnostic`]).
#[derive(Debug)]
pub enum AssemblerFailure {
    Io(IoFailed),
    ExternalTextNotFound {
        name: OsString,
        search_path: Vec<PathBuf>,
    },
    BadObjectFile {
        word_offset: usize,
        msg: String,
    },
}

impl Display for AssemblerFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            AssemblerFailure::Io(e) => write!(f, "{e}"),
            AssemblerFailure::ExternalTextNotFound { name, search_path } => {
                write!(
                    f,
                    "cannot find external text {} in search path [",
                    name.to_string_lossy()
                )?;
                for (i, dir) in search_path.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", dir.display())?;
                }
                f.write_str("]")
            }
            AssemblerFailure::BadObjectFile { word_offset, msg } => {
                write!(f, "bad object file at word {word_offset}: {msg}")
            }
        }
    }
}

impl Error for AssemblerFailure {}

impl From<IoFailed> for AssemblerFailure {
    fn from(e: IoFailed) -> AssemblerFailure {
        AssemblerFailure::Io(e)
    }
}
