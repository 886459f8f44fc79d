//! Assembling one statement.
//!
//! A line (from the source, or from a macro or `DUP` frame) is first
//! offered to any capture in progress, then micro substituted,
//! divided into fields and, unless it is being skipped, dispatched:
//! to a macro, to a pseudo-instruction or to the machine instruction
//! matcher.
use tracing::{event, Level};

use super::context::{AsmContext, Capture, Report, Skip, Statement};
use super::diagnostic::{Diagnostic, ErrorKind, WarningKind};
use super::fields::{is_comment, split_fields, strip_commentary, Fields};
use super::listing::{Item, ListedLine};
use super::macros::{Frame, FrameKind, Prototype};
use super::micro::substitute;
use super::pseudo;
use super::source::SourceLine;
use super::state::ListFlags;
use super::symtab::Pass;
use super::types::LineNumber;

impl AsmContext {
    /// Assemble one line, then account for its diagnostics and list it.
    /// `origin` says which kind of frame generated the line, if any.
    pub(crate) fn assemble_statement(
        &mut self,
        line: LineNumber,
        text: &str,
        origin: Option<FrameKind>,
    ) {
        self.statement = Statement {
            line,
            ..Statement::default()
        };
        let edited = self.assemble_line(text);
        self.finish_statement(text, edited, origin);
    }

    /// Assemble a line read from the source.
    pub(crate) fn assemble_source_line(&mut self, line: &SourceLine) {
        self.statement = Statement {
            line: line.number,
            ..Statement::default()
        };
        if line.truncated {
            self.warn(WarningKind::Truncation);
        }
        let edited = self.assemble_line(&line.text);
        self.finish_statement(&line.text, edited, None);
    }

    /// Assemble the lines generated by macro calls and `DUP` groups,
    /// until none remain.
    pub(crate) fn run_frames(&mut self) {
        while let Some((origin, text, kind)) = self.next_frame_line() {
            self.assemble_statement(origin, &text, Some(kind));
        }
    }

    /// Returns the micro-substituted text, when it differs.
    fn assemble_line(&mut self, line: &str) -> Option<String> {
        if self.capture.is_some() {
            self.capture_line(line);
            return None;
        }
        if is_comment(line) {
            return None;
        }
        let substituted = substitute(line, |name| self.find_micro(name));
        if substituted.unknown {
            self.warn(WarningKind::MicroSubstitution);
        }
        let mut fields = split_fields(strip_commentary(&substituted.text, self.format));
        if self.settings.flexible {
            fields.result = fields.result.to_ascii_uppercase();
        }
        if !self.skipping(&fields) {
            self.dispatch(&fields);
        }
        substituted.changed.then_some(substituted.text)
    }

    /// Decide whether a statement is skipped, and count it against
    /// the skip in progress.
    fn skipping(&mut self, fields: &Fields) -> bool {
        match &mut self.skip {
            None => false,
            Some(Skip::Statements(n)) => {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    self.skip = None;
                }
                true
            }
            Some(Skip::UntilLocation(name)) => {
                if fields.location != *name {
                    return true;
                }
                self.skip = None;
                // The matching ELSE turns assembly back on; it has
                // no other effect.
                fields.result == "ELSE"
            }
        }
    }

    fn dispatch(&mut self, fields: &Fields) {
        if fields.result.is_empty() {
            if !fields.location.is_empty() {
                self.error(ErrorKind::ResultField);
            }
            return;
        }
        let renamed;
        let fields = match self.find_opsyn(&fields.result) {
            Some(target) => {
                renamed = Fields {
                    result: target,
                    ..fields.clone()
                };
                &renamed
            }
            None => fields,
        };
        let expansion = self
            .find_macro(&fields.result)
            .map(|def| def.expand(&fields.location, &fields.operand));
        match expansion {
            Some(Ok(lines)) => self.push_frame(FrameKind::Macro, lines),
            Some(Err(kind)) => self.error(kind),
            None => match pseudo::lookup(&fields.result) {
                Some(handler) => handler(self, fields),
                None => self.machine_instruction(fields),
            },
        }
    }

    pub(crate) fn find_opsyn(&self, name: &str) -> Option<String> {
        [self.module, 0]
            .into_iter()
            .find_map(|m| self.modules[m].opsyns.get(name))
            .cloned()
    }

    pub(crate) fn push_frame(&mut self, kind: FrameKind, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let frame = Frame::new(kind, self.statement.line, lines);
        if let Err(e) = self.frames.push(frame) {
            self.error(e.into());
        }
    }

    /// The next line generated by the innermost frame, popping
    /// frames which are exhausted.
    pub(crate) fn next_frame_line(&mut self) -> Option<(LineNumber, String, FrameKind)> {
        loop {
            let frame = self.frames.top_mut()?;
            if let Some(line) = frame.next_line() {
                return Some((frame.origin, line, frame.kind));
            }
            // Cannot fail; the stack has a top.
            let _ = self.frames.pop();
        }
    }

    /// Add a line to the macro definition or `DUP` group being
    /// collected.
    fn capture_line(&mut self, line: &str) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        self.capture = match capture {
            Capture::Prototype => {
                if is_comment(line) || line.trim().is_empty() {
                    Some(Capture::Prototype)
                } else {
                    match Prototype::parse(line) {
                        Ok(prototype) => Some(Capture::Macro {
                            prototype,
                            body: Vec::new(),
                        }),
                        Err(kind) => {
                            self.error(kind);
                            None
                        }
                    }
                }
            }
            Capture::Macro {
                prototype,
                mut body,
            } => {
                let fields = split_fields(line);
                if !is_comment(line)
                    && fields.result.eq_ignore_ascii_case("ENDM")
                    && fields.location == prototype.name
                {
                    self.define_macro(prototype, &body);
                    None
                } else {
                    body.push(line.to_string());
                    Some(Capture::Macro { prototype, body })
                }
            }
            Capture::Dup {
                name,
                count,
                statements,
                mut body,
            } => {
                let finished = match statements {
                    Some(n) => {
                        body.push(line.to_string());
                        body.iter().filter(|l| !is_comment(l)).count() as u64 >= n
                    }
                    None => {
                        let fields = split_fields(line);
                        let end = !is_comment(line)
                            && fields.result.eq_ignore_ascii_case("ENDDUP")
                            && fields.location == name;
                        if !end {
                            body.push(line.to_string());
                        }
                        end
                    }
                };
                if finished {
                    let lines: Vec<String> =
                        (0..count).flat_map(|_| body.iter().cloned()).collect();
                    self.push_frame(FrameKind::Dup, lines);
                    None
                } else {
                    Some(Capture::Dup {
                        name,
                        count,
                        statements,
                        body,
                    })
                }
            }
        };
    }

    fn define_macro(&mut self, prototype: Prototype, body: &[String]) {
        let pass = self.pass;
        let redefined = self
            .current_module()
            .macros
            .get(&prototype.name)
            .is_some_and(|old| old.creation_pass == pass);
        if redefined && self.list.contains(ListFlags::WEM | ListFlags::WMR) {
            self.warn(WarningKind::RedefinedMacro);
        }
        event!(
            Level::TRACE,
            "defining macro {} with {} lines in {pass:?}",
            prototype.name,
            body.len()
        );
        let name = prototype.name.clone();
        let def = prototype.define(body, pass);
        self.current_module_mut().macros.insert(name, def);
    }

    fn finish_statement(&mut self, text: &str, edited: Option<String>, origin: Option<FrameKind>) {
        let statement = std::mem::take(&mut self.statement);
        if statement.diagnostics.contains(Diagnostic::ModuleEnd) {
            self.module = 0;
            self.reset_module_state();
        }
        if self.pass != Pass::Two {
            return;
        }
        self.tally.add_statement(&statement.diagnostics);
        let flagged = statement.diagnostics.has_errors()
            || statement.diagnostics.iter().any(Diagnostic::is_warning);
        if flagged {
            self.reports.push(Report {
                line: statement.line,
                text: text.to_string(),
                diagnostics: statement
                    .diagnostics
                    .iter()
                    .filter(|d| *d != Diagnostic::ModuleEnd)
                    .collect(),
            });
        }
        let wanted = match origin {
            None => self.list.contains(ListFlags::ON),
            Some(FrameKind::Macro) => {
                self.list.contains(ListFlags::ON | ListFlags::MAC)
                    || (self.list.contains(ListFlags::ON | ListFlags::MBO)
                        && !statement.generated.is_empty())
            }
            Some(FrameKind::Dup) => self.list.contains(ListFlags::ON | ListFlags::DUP),
        };
        if !(wanted || flagged) {
            return;
        }
        let shown = match edited {
            Some(edited) if self.list.contains(ListFlags::ED) => edited,
            _ => text.to_string(),
        };
        self.listing.push(Item::Line(ListedLine {
            number: statement.line,
            indicators: statement.diagnostics.indicators(),
            address: statement.address,
            value: statement.value,
            generated: statement.generated,
            text: shown,
            expansion: origin.is_some(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::context::Settings;
    use crate::micro::Clock;

    fn context() -> AsmContext {
        AsmContext::new(Settings::default(), Clock::at(UNIX_EPOCH))
    }

    /// Assemble lines in pass 2, running any frames they create.
    fn run(ctx: &mut AsmContext, lines: &[&str]) {
        ctx.pass = Pass::Two;
        for (n, line) in lines.iter().enumerate() {
            ctx.assemble_statement(n + 1, line, None);
            ctx.run_frames();
        }
    }

    #[test]
    fn test_comment_lines_are_ignored() {
        let mut ctx = context();
        run(&mut ctx, &["* A1 5"]);
        assert_eq!(ctx.current_section().location_parcel(), 0);
        assert_eq!(ctx.tally.errors, 0);
    }

    #[test]
    fn test_label_without_result() {
        let mut ctx = context();
        run(&mut ctx, &["LAB"]);
        assert!(ctx.tally.saw(ErrorKind::ResultField));
        assert_eq!(ctx.reports.len(), 1);
        assert_eq!(ctx.reports[0].line, 1);
    }

    #[test]
    fn test_unknown_micro_warns() {
        let mut ctx = context();
        run(&mut ctx, &["         A1       \"NOPE\"5"]);
        assert!(ctx.tally.saw(WarningKind::MicroSubstitution));
        assert_eq!(ctx.current_section().location_parcel(), 1);
    }

    #[test]
    fn test_dup_by_statement_count() {
        let mut ctx = context();
        run(
            &mut ctx,
            &["         DUP      3,1", "         A1       1", "         A2       2"],
        );
        // Three copies of the one-line group, then the line after it.
        assert_eq!(ctx.current_section().location_parcel(), 4);
        assert!(ctx.capture.is_none());
    }

    #[test]
    fn test_macro_redefinition_warning_needs_both_flags() {
        let source = [
            "         LIST     WEM,WMR",
            "         MACRO",
            "         M",
            "M        ENDM",
            "         MACRO",
            "         M",
            "M        ENDM",
        ];
        let mut ctx = context();
        run(&mut ctx, &source);
        assert!(ctx.tally.saw(WarningKind::RedefinedMacro));

        let mut ctx = context();
        run(&mut ctx, &source[1..]);
        assert!(!ctx.tally.saw(WarningKind::RedefinedMacro));
    }
}
