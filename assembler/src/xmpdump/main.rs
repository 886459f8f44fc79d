#![deny(unsafe_code)]

use std::error::Error;
use std::fmt::{self, Display, Formatter, Write};
use std::fs;
use std::path::PathBuf;

use clap::ArgAction::Set;
use clap::Parser;
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use xmpasm::{read_object_stream, BlockRecord, EntryKind, ObjectModule};

const ABOUT: &str = "Print the contents of Cray X-MP object files";

/// Print the contents of Cray X-MP object files
#[derive(Parser, Debug)]
#[clap(version, about = ABOUT, long_about = None)]
struct Cli {
    /// Object file to read
    #[clap(action = Set)]
    input: PathBuf,
}

#[derive(Debug)]
enum Fail {
    ReadFailed(String),
    BadObject(String),
    InitialisationFailure(String),
}

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fail::ReadFailed(message)
            | Fail::BadObject(message)
            | Fail::InitialisationFailure(message) => f.write_str(message),
        }
    }
}

impl Error for Fail {}

fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Standard => "std",
        EntryKind::Extended => "ext",
    }
}

fn dump_block(out: &mut String, block: &BlockRecord) -> fmt::Result {
    writeln!(
        out,
        "  block {} {:?} {} {} origin {:o} size {:o}",
        block.index, block.name, block.section_type, block.residency, block.origin, block.size
    )?;
    if let Some(image) = &block.image {
        for (i, word) in image.words.iter().enumerate() {
            writeln!(out, "    {:08o} {word:022o}", image.load_word + i as u64)?;
        }
    }
    for r in &block.relocations {
        writeln!(
            out,
            "    rel {} bit {} len {} block {}{}",
            kind_name(r.kind),
            r.bit_address,
            r.field_length,
            r.target_block,
            if r.parcel { " parcel" } else { "" }
        )?;
    }
    for x in &block.externals {
        writeln!(
            out,
            "    ext {} bit {} len {} external {}{}",
            kind_name(x.kind),
            x.bit_address,
            x.field_length,
            x.external_index,
            if x.parcel { " parcel" } else { "" }
        )?;
    }
    Ok(())
}

fn dump_module(out: &mut String, module: &ObjectModule) -> fmt::Result {
    writeln!(
        out,
        "module {}{} stack {}",
        module.name,
        if module.absolute { " (absolute)" } else { "" },
        module.stack_size
    )?;
    if !module.comment.is_empty() {
        writeln!(out, "  comment {:?}", module.comment)?;
    }
    for block in &module.blocks {
        dump_block(out, block)?;
    }
    for (i, name) in module.externals.iter().enumerate() {
        writeln!(out, "  external {i} {name}")?;
    }
    for entry in &module.entries {
        let block = entry
            .block
            .map_or_else(|| "-".to_string(), |b| b.to_string());
        writeln!(
            out,
            "  entry {} block {block} value {:o} {:?}",
            entry.name, entry.value, entry.kind
        )?;
    }
    if let Some(start) = &module.start {
        writeln!(out, "  start {} value {:o}", start.name, start.value)?;
    }
    Ok(())
}

fn dump(modules: &[ObjectModule]) -> String {
    let mut out = String::new();
    for module in modules {
        // Writing to a String cannot fail.
        let _ = dump_module(&mut out, module);
    }
    out
}

fn run_dump() -> Result<(), Fail> {
    let cli = Cli::parse();

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

    let span = span!(Level::ERROR, "dump", input=?cli.input);
    let _enter = span.enter();
    let bytes = fs::read(&cli.input).map_err(|e| {
        Fail::ReadFailed(format!("failed to read {}: {e}", cli.input.display()))
    })?;
    let modules = read_object_stream(&bytes).map_err(|e| Fail::BadObject(e.to_string()))?;
    event!(Level::DEBUG, "{} module(s)", modules.len());
    print!("{}", dump(&modules));
    Ok(())
}

fn main() {
    match run_dump() {
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

    #[test]
    fn test_dump_empty_module() {
        let text = dump(&[ObjectModule::empty("PROG")]);
        assert_eq!(text, "module PROG stack 0\n");
    }
}
