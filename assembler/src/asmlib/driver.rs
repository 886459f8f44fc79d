//! The two passes over the source.
//!
//! Pass 1 assigns addresses to every symbol.  Between the passes the
//! sections of each module are laid out and symbols moved to match.
//! Pass 2 repeats the work of pass 1 with every symbol known, writing
//! the image, the relocation and external tables, and the listing.
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{event, span, Level};

use super::context::{AsmContext, Report, Statement};
use super::diagnostic::Tally;
use super::micro::Clock;
use super::module::Module;
use super::object::ObjectModule;
use super::options::{module_identifier, module_identifier_for, Options};
use super::source::{find_external_text, logical_lines, SourceFile, SourceLine};
use super::symtab::Pass;
use super::types::AssemblerFailure;
use super::value::Attributes;

mod output;
#[cfg(test)]
mod tests;

/// The name given to code outside any module when there is neither a
/// module identifier option nor a source file to take it from.
const DEFAULT_MODULE_ID: &str = "MAIN";

/// Closes a module left open at the end of the input.
const IMPLICIT_END: &str = "         END";

/// The outcome of assembling a program.
#[derive(Debug)]
pub struct Assembly {
    /// One object module per `IDENT`, in source order, followed by
    /// the module holding any code assembled outside `IDENT`...`END`.
    pub objects: Vec<ObjectModule>,
    pub tally: Tally,
    pub listing: String,
    /// The statements which drew diagnostics.
    pub reports: Vec<Report>,
}

impl Assembly {
    #[must_use]
    pub fn failed(&self, warnings_fatal: bool) -> bool {
        self.tally.failed(warnings_fatal)
    }
}

/// Symbols still undefined after pass 1 become externals.
fn declare_implicit_externals(module: &mut Module) {
    for key in module.symbols.undefined() {
        let is_entry = module
            .symbols
            .get(&key)
            .is_some_and(|sym| sym.value.attributes.contains(Attributes::ENTRY));
        if is_entry {
            continue;
        }
        let index = module.add_external(&key);
        if let Err(kind) = module.symbols.make_external(&key, index) {
            event!(
                Level::WARN,
                "cannot make {} an implicit external: {kind:?}",
                key.name
            );
        }
    }
}

fn between_passes(ctx: &mut AsmContext) {
    let implicit_externals = ctx.settings.implicit_externals;
    for module in &mut ctx.modules {
        if implicit_externals {
            declare_implicit_externals(module);
        }
        module.prepare_pass_two();
    }
}

/// Close the anonymous module at the end of the input.  Diagnostics
/// raised while closing it belong to no source statement.
fn close_anonymous_module(ctx: &mut AsmContext, line: usize) {
    ctx.module = 0;
    ctx.statement = Statement {
        line,
        ..Statement::default()
    };
    ctx.close_module();
    let diagnostics = std::mem::take(&mut ctx.statement.diagnostics);
    if ctx.pass == Pass::Two && !diagnostics.is_empty() {
        ctx.tally.add_statement(&diagnostics);
        ctx.reports.push(Report {
            line,
            text: String::new(),
            diagnostics: diagnostics.iter().collect(),
        });
    }
}

fn run_pass(ctx: &mut AsmContext, lines: &[SourceLine], pass: Pass) {
    let span = span!(Level::INFO, "pass", ?pass);
    let _enter = span.enter();
    ctx.pass = pass;
    ctx.reset_cursors();
    for line in lines {
        ctx.assemble_source_line(line);
        ctx.run_frames();
    }
    let after_last = lines.last().map_or(1, |line| line.number + 1);
    if ctx.capture.take().is_some() {
        event!(Level::WARN, "definition still open at the end of the input");
    }
    if ctx.module != 0 {
        event!(
            Level::WARN,
            "module {} has no END statement",
            ctx.current_module().name
        );
        ctx.skip = None;
        ctx.frames.clear();
        ctx.assemble_statement(after_last, IMPLICIT_END, None);
    }
    close_anonymous_module(ctx, after_last);
}

fn assemble_lines(
    lines: &[SourceLine],
    module_id: &str,
    options: &Options,
    clock: Clock,
) -> Assembly {
    let span = span!(Level::INFO, "assemble", module_id);
    let _enter = span.enter();
    let mut ctx = AsmContext::new(options.settings(), clock);
    ctx.modules[0].name = module_id.to_string();
    run_pass(&mut ctx, lines, Pass::One);
    between_passes(&mut ctx);
    run_pass(&mut ctx, lines, Pass::Two);
    ctx.listing.set_summary(ctx.tally);
    event!(
        Level::INFO,
        "{} object module(s), {} error(s), {} warning(s)",
        ctx.objects.len(),
        ctx.tally.errors,
        ctx.tally.warnings
    );
    Assembly {
        objects: ctx.objects,
        tally: ctx.tally,
        listing: ctx.listing.to_string(),
        reports: ctx.reports,
    }
}

/// Assemble source text which is already in memory.  Any external
/// text comes first; lines are numbered continuously through all the
/// inputs.
#[must_use]
pub fn assemble_sources(
    external: Option<&SourceFile>,
    sources: &[SourceFile],
    options: &Options,
) -> Assembly {
    let mut lines: Vec<SourceLine> = Vec::new();
    let mut first_line = 1;
    for source in external.into_iter().chain(sources) {
        let statements = logical_lines(&source.text, first_line);
        event!(
            Level::DEBUG,
            "{}: {} statement(s)",
            source.path.display(),
            statements.len()
        );
        first_line += source.text.lines().count();
        lines.extend(statements);
    }
    let module_id = match (&options.module_id, sources.first()) {
        (Some(id), _) => module_identifier(id),
        (None, Some(first)) => module_identifier_for(&first.path),
        (None, None) => DEFAULT_MODULE_ID.to_string(),
    };
    assemble_lines(&lines, &module_id, options, Clock::at(SystemTime::now()))
}

/// Assemble a single piece of source text.
#[must_use]
pub fn assemble_text(text: &str, options: &Options) -> Assembly {
    let source = SourceFile {
        path: PathBuf::from(DEFAULT_MODULE_ID),
        text: text.to_string(),
    };
    assemble_sources(None, std::slice::from_ref(&source), options)
}

/// Read the source files (and any external text), assemble them and
/// write the listing and object file the options ask for.
///
/// # Errors
///
/// When an input cannot be read or an output cannot be written.
/// Problems in the program being assembled are not errors of this
/// kind; they are described by the returned [`Assembly`].
pub fn assemble_files(
    inputs: &[PathBuf],
    options: &Options,
) -> Result<Assembly, AssemblerFailure> {
    let external = match &options.external_text {
        Some(name) => {
            let path = find_external_text(name, &options.search_path)?;
            Some(SourceFile::read(&path)?)
        }
        None => None,
    };
    let sources = inputs
        .iter()
        .map(|path| SourceFile::read(path))
        .collect::<Result<Vec<_>, _>>()?;
    let assembly = assemble_sources(external.as_ref(), &sources, options);
    output::write_outputs(&assembly, options)?;
    Ok(assembly)
}
