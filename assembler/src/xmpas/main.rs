#![deny(unsafe_code)]

use std::env;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use clap::ArgAction::{Append, Set, SetTrue};
use clap::Parser;
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use xmpasm::{
    assemble_files, parse_search_path, AssemblerFailure, Destination, LazyRegex, Options,
};

const ABOUT: &str = "Macro assembler for the Cray X-MP";

/// The environment variable holding the default external text search
/// path.
const TEXTPATH: &str = "TEXTPATH";

/// Macro assembler for the Cray X-MP
#[derive(Parser, Debug)]
#[clap(version, about = ABOUT, long_about = None)]
struct Cli {
    /// Source files, assembled in order as a single program.
    #[clap(action = Append, required = true)]
    inputs: Vec<PathBuf>,

    /// Listing destination: a file, `-` or `$OUT` for standard
    /// output, or `0` for no listing.
    #[clap(action = Set, short = 'l')]
    listing: Option<String>,

    /// Object file destination, or `0` for none.  By default the
    /// object file is named after the first source file.
    #[clap(action = Set, short = 'o')]
    object: Option<String>,

    /// Directories searched for external text, separated by `:` or
    /// `;`.  The default is taken from the TEXTPATH environment
    /// variable.
    #[clap(action = Set, short = 'T')]
    text_path: Option<String>,

    /// External text, assembled ahead of the source files.
    #[clap(action = Set, short = 't')]
    external_text: Option<PathBuf>,

    /// Accept lower-case mnemonics and register names.
    #[clap(action = SetTrue, short = 'f')]
    flexible: bool,

    /// `SECTION` replaces the current section instead of stacking it.
    #[clap(action = SetTrue, short = 's')]
    no_section_stack: bool,

    /// Fail if there are any warnings.
    #[clap(action = SetTrue, short = 'w')]
    warnings_fatal: bool,

    /// Treat undefined symbols as externals.
    #[clap(action = SetTrue, short = 'x')]
    implicit_externals: bool,

    /// Name for code assembled outside any IDENT.
    #[clap(action = Set, short = 'n')]
    module_id: Option<String>,
}

#[derive(Debug)]
enum Fail {
    /// The assembler could not read its input or write its output.
    AsmFail(AssemblerFailure),
    /// The program being assembled has errors (or warnings, when they
    /// are fatal).
    Diagnostics { errors: usize, warnings: usize },
    /// We were not able to correctly initialise the assembler.
    InitialisationFailure(String),
}

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fail::AsmFail(assembler_failure) => assembler_failure.fmt(f),
            Fail::Diagnostics { errors, warnings } => {
                write!(f, "assembly failed: {errors} error(s), {warnings} warning(s)")
            }
            Fail::InitialisationFailure(msg) => f.write_str(msg.as_str()),
        }
    }
}

impl Error for Fail {}

/// Host-native arguments: `key=value`, or a single flag letter.
static HOST_OPTION: LazyRegex =
    LazyRegex::new(r"^(?:(?<key>[LBITN])=(?<value>.*)|(?<flag>[FSWX]))$");

/// POSIX-style options whose value is the following argument.
const VALUE_OPTIONS: [&str; 5] = ["-l", "-o", "-T", "-t", "-n"];

/// Rewrite arguments in the host-native style (`L=file`, `B=file`,
/// `I=file`, `T=file`, `N=id` and the flags `F`, `S`, `W` and `X`)
/// into the equivalent POSIX-style options.  Other arguments, and the
/// values of POSIX-style options, are kept as they are.
fn rewrite_host_arguments(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    // The program name.
    let mut result: Vec<OsString> = args.next().into_iter().collect();
    while let Some(arg) = args.next() {
        if arg.to_str().is_some_and(|s| VALUE_OPTIONS.contains(&s)) {
            result.push(arg);
            result.extend(args.next());
            continue;
        }
        let Some(captures) = arg.to_str().and_then(|s| HOST_OPTION.captures(s)) else {
            result.push(arg);
            continue;
        };
        if let Some(flag) = captures.name("flag") {
            result.push(format!("-{}", flag.as_str().to_ascii_lowercase()).into());
            continue;
        }
        let value = captures.name("value").map_or("", |m| m.as_str());
        let option = match captures.name("key").map(|m| m.as_str()) {
            Some("L") => "-l",
            Some("B") => "-o",
            Some("T") => "-t",
            Some("N") => "-n",
            _ => {
                // I=file names a source file.
                result.push(value.into());
                continue;
            }
        };
        result.push(option.into());
        result.push(value.into());
    }
    result
}

fn default_object_path(source: &Path) -> PathBuf {
    source.with_extension("o")
}

fn options_from(cli: &Cli, default_text_path: Option<String>) -> Options {
    let object = match (&cli.object, cli.inputs.first()) {
        (Some(arg), _) => Destination::from_argument(arg),
        (None, Some(first)) => Destination::File(default_object_path(first)),
        (None, None) => Destination::Suppressed,
    };
    Options {
        listing: cli
            .listing
            .as_deref()
            .map_or(Destination::Suppressed, Destination::from_argument),
        object,
        search_path: cli
            .text_path
            .clone()
            .or(default_text_path)
            .as_deref()
            .map(parse_search_path)
            .unwrap_or_default(),
        external_text: cli.external_text.clone(),
        flexible: cli.flexible,
        no_section_stack: cli.no_section_stack,
        warnings_fatal: cli.warnings_fatal,
        implicit_externals: cli.implicit_externals,
        module_id: cli.module_id.clone(),
    }
}

fn run_assembler() -> Result<(), Fail> {
    let cli = Cli::parse_from(rewrite_host_arguments(env::args_os()));

    // Select which trace messages get printed with the RUST_LOG
    // environment variable.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))
    {
        Err(e) => {
            return Err(Fail::InitialisationFailure(format!(
                "failed to initialise tracing filter (perhaps there is a problem with environment variables): {e}"
            )));
        }
        Ok(layer) => layer,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let options = options_from(&cli, env::var(TEXTPATH).ok());
    let span = span!(Level::ERROR, "assemble", inputs=?cli.inputs, object=?options.object);
    let _enter = span.enter();
    let assembly = assemble_files(&cli.inputs, &options).map_err(|e| {
        event!(Level::ERROR, "assembly failed: {:?}", e);
        Fail::AsmFail(e)
    })?;
    for report in &assembly.reports {
        for diagnostic in &report.diagnostics {
            eprintln!("line {}: {}", report.line, diagnostic.message());
        }
    }
    if assembly.failed(options.warnings_fatal) {
        Err(Fail::Diagnostics {
            errors: assembly.tally.errors,
            warnings: assembly.tally.warnings,
        })
    } else {
        event!(Level::INFO, "assembly succeeded");
        Ok(())
    }
}

fn main() {
    match run_assembler() {
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Ok(()) => {
            std::process::exit(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(args: &[&str]) -> Vec<String> {
        rewrite_host_arguments(args.iter().map(OsString::from))
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_host_arguments_are_rewritten() {
        assert_eq!(
            rewrite(&["xmpas", "I=prog.s", "L=$OUT", "B=0", "X", "N=main"]),
            ["xmpas", "prog.s", "-l", "$OUT", "-o", "0", "-x", "-n", "main"]
        );
    }

    #[test]
    fn test_posix_arguments_are_kept() {
        assert_eq!(
            rewrite(&["xmpas", "-l", "-", "-w", "prog.s"]),
            ["xmpas", "-l", "-", "-w", "prog.s"]
        );
    }

    #[test]
    fn test_option_values_are_not_rewritten() {
        assert_eq!(
            rewrite(&["xmpas", "-o", "W", "-l", "L=x", "-n", "X", "prog.s"]),
            ["xmpas", "-o", "W", "-l", "L=x", "-n", "X", "prog.s"]
        );
        assert_eq!(rewrite(&["xmpas", "prog.s", "-t"]), ["xmpas", "prog.s", "-t"]);
    }

    #[test]
    fn test_options() {
        let cli = Cli::parse_from(["xmpas", "-l", "-", "-T", "a:b", "-s", "dir/prog.s"]);
        let options = options_from(&cli, Some("ignored".to_string()));
        assert_eq!(options.listing, Destination::Stdout);
        assert_eq!(
            options.object,
            Destination::File(PathBuf::from("dir/prog.o"))
        );
        assert_eq!(options.search_path, [PathBuf::from("a"), PathBuf::from("b")]);
        assert!(options.no_section_stack);
        assert!(!options.flexible);
    }

    #[test]
    fn test_text_path_default() {
        let cli = Cli::parse_from(["xmpas", "prog.s"]);
        let options = options_from(&cli, Some("lib;/usr/lib".to_string()));
        assert_eq!(
            options.search_path,
            [PathBuf::from("lib"), PathBuf::from("/usr/lib")]
        );
        assert_eq!(options.listing, Destination::Suppressed);
    }
}
