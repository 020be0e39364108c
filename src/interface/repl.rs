//! The REPL (C12, §4.12): a state machine over `{ top,
//! collecting-procedure, bracket-continuation, pause }` that reads
//! lines from a [`Host`], assembles complete instructions or `to ...
//! end` definitions, and feeds them to an [`Interpreter`]. Mirrors the
//! teacher's `Repl` (`interface::repl::Repl`): one struct holding the
//! interpretation context, a single `execute`-shaped entry point, and
//! accessors onto the underlying state for callers that want it.

use super::body::{bracket_delta, parse_instruction_line, parse_to_header};
use crate::error::ErrorKind;
use crate::eval::Interpreter;
use crate::host::{Host, ReadLine};
use crate::proc::UserProc;
use crate::value::{Status, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Top,
    CollectingProcedure,
    BracketContinuation,
}

/// How a call to [`Repl::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplOutcome {
    /// The host's input stream ran out.
    Eof,
}

/// Accumulates physical lines of one logical instruction until its
/// brackets balance (§4.12).
#[derive(Default)]
struct LineAcc {
    lines: Vec<String>,
    depth: i32,
}

impl LineAcc {
    /// Appends a physical line; returns `true` once brackets balance.
    fn push(&mut self, line: &str) -> bool {
        self.lines.push(line.to_string());
        self.depth += bracket_delta(line);
        self.depth <= 0
    }

    fn take_joined(&mut self) -> String {
        self.depth = 0;
        self.lines.drain(..).collect::<Vec<_>>().join("\n")
    }
}

/// What the caller of a single evaluated unit should do next.
enum Outcome {
    Continue,
    /// Enter a nested pause sub-REPL, prompted with this procedure name.
    EnterPause(String),
    /// `co`/`continue` exited exactly one pause level.
    Resume,
    /// `throw "toplevel` — keep unwinding until the outermost loop.
    UnwindToplevel,
}

pub struct Repl {
    interp: Interpreter,
    mode: Mode,
    proc_name: String,
    proc_params: Vec<String>,
    proc_lines: Vec<String>,
    proc_line_acc: LineAcc,
    top_acc: LineAcc,
}

impl Repl {
    pub fn new() -> Self {
        Repl {
            interp: Interpreter::new(),
            mode: Mode::Top,
            proc_name: String::new(),
            proc_params: Vec::new(),
            proc_lines: Vec::new(),
            proc_line_acc: LineAcc::default(),
            top_acc: LineAcc::default(),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// Feeds a whole file's worth of text through the same
    /// mode-accumulation state machine the interactive loop uses, with
    /// no prompts printed — for `--load <file>` (SPEC_FULL §E). A
    /// `pause` hit while loading is honored by recursing into a nested
    /// loop exactly as it would be interactively, so a file that drops
    /// into a paused sub-REPL still reads further lines from `host`.
    pub fn load_text(&mut self, host: &mut dyn Host, text: &str) {
        for line in text.lines() {
            let Some(status) = self.feed_line(host, line) else {
                continue;
            };
            if let Outcome::EnterPause(name) = self.handle_status(host, status, None) {
                self.loop_body(host, Some(&name));
            }
        }
    }

    /// Runs the interactive loop until the host's input is exhausted.
    /// EOF always exits, at whatever nesting this call represents —
    /// callers that need EOF mid-pause to also close the outer loop
    /// get that for free since every nested `run` returns `Eof` up the
    /// native call stack.
    pub fn run(&mut self, host: &mut dyn Host) -> ReplOutcome {
        match self.loop_body(host, None) {
            LoopSignal::Eof => ReplOutcome::Eof,
            LoopSignal::Resume | LoopSignal::UnwindToplevel => ReplOutcome::Eof,
        }
    }

    fn current_prompt(&self, pause_ctx: Option<&str>) -> String {
        if let Some(name) = pause_ctx {
            return format!("{name}> ");
        }
        match self.mode {
            Mode::Top => "? ".to_string(),
            Mode::CollectingProcedure if self.proc_line_acc.depth > 0 => "~ ".to_string(),
            Mode::CollectingProcedure => "> ".to_string(),
            Mode::BracketContinuation => "~ ".to_string(),
        }
    }

    fn loop_body(&mut self, host: &mut dyn Host, pause_ctx: Option<&str>) -> LoopSignal {
        loop {
            let prompt = self.current_prompt(pause_ctx);
            host.write(prompt.as_bytes());
            host.flush();

            let mut buf = Vec::new();
            let line = match host.read_line(&mut buf) {
                ReadLine::Eof => return LoopSignal::Eof,
                ReadLine::Interrupted => {
                    self.reset_accumulators();
                    continue;
                }
                ReadLine::Bytes(_) => String::from_utf8_lossy(&buf).trim_end_matches(['\n', '\r']).to_string(),
            };

            let Some(status) = self.feed_line(host, &line) else {
                continue;
            };

            match self.handle_status(host, status, pause_ctx) {
                Outcome::Continue => continue,
                Outcome::Resume => {
                    if pause_ctx.is_some() {
                        return LoopSignal::Resume;
                    }
                }
                Outcome::UnwindToplevel => {
                    if pause_ctx.is_some() {
                        return LoopSignal::UnwindToplevel;
                    }
                }
                Outcome::EnterPause(name) => match self.loop_body(host, Some(&name)) {
                    LoopSignal::Eof => return LoopSignal::Eof,
                    LoopSignal::Resume | LoopSignal::UnwindToplevel => continue,
                },
            }
        }
    }

    fn reset_accumulators(&mut self) {
        self.mode = Mode::Top;
        self.proc_lines.clear();
        self.proc_line_acc = LineAcc::default();
        self.top_acc = LineAcc::default();
    }

    /// Feeds one physical line into the accumulator state machine.
    /// Returns `Some(status)` once a complete unit (an instruction or a
    /// finished `to ... end`) has been evaluated; `None` means the line
    /// was absorbed into an in-progress accumulation and the caller
    /// should just prompt for the next one.
    fn feed_line(&mut self, host: &mut dyn Host, line: &str) -> Option<Status> {
        match self.mode {
            Mode::Top => {
                let trimmed = line.trim_start();
                let first_word = trimmed.split_whitespace().next().unwrap_or("");
                if first_word.eq_ignore_ascii_case("to") {
                    match parse_to_header(trimmed) {
                        Ok((name, params)) => {
                            if self.interp.is_primitive(&name) {
                                return Some(Status::Error(crate::error::RuntimeError::with_arg(
                                    ErrorKind::IsPrimitive,
                                    "to",
                                    name,
                                )));
                            }
                            if self.interp.procs.is_defined(&name) {
                                host.write_line(
                                    crate::error::RuntimeError::with_arg(ErrorKind::AlreadyDefined, "to", name.clone())
                                        .message()
                                        .as_bytes(),
                                );
                            }
                            self.proc_name = name;
                            self.proc_params = params;
                            self.proc_lines.clear();
                            self.proc_line_acc = LineAcc::default();
                            self.mode = Mode::CollectingProcedure;
                            None
                        }
                        Err(e) => Some(Status::Error(e)),
                    }
                } else if self.top_acc.push(line) {
                    let joined = self.top_acc.take_joined();
                    Some(self.eval_joined(host, &joined))
                } else {
                    self.mode = Mode::BracketContinuation;
                    None
                }
            }
            Mode::BracketContinuation => {
                if self.top_acc.push(line) {
                    self.mode = Mode::Top;
                    let joined = self.top_acc.take_joined();
                    Some(self.eval_joined(host, &joined))
                } else {
                    None
                }
            }
            Mode::CollectingProcedure => {
                if self.proc_line_acc.depth == 0 && line.trim().eq_ignore_ascii_case("end") {
                    self.mode = Mode::Top;
                    Some(self.finish_procedure())
                } else if self.proc_line_acc.push(line) {
                    self.proc_lines.push(self.proc_line_acc.take_joined());
                    None
                } else {
                    None
                }
            }
        }
    }

    fn eval_joined(&mut self, host: &mut dyn Host, text: &str) -> Status {
        self.interp.eval_text(host, text)
    }

    fn finish_procedure(&mut self) -> Status {
        let memory = &mut self.interp.memory;
        let mut line_nodes = Vec::with_capacity(self.proc_lines.len());
        for line in &self.proc_lines {
            match parse_instruction_line(memory, line) {
                Ok(n) => line_nodes.push(n),
                Err(e) => return Status::Error(e),
            }
        }
        let body = memory.cons_list(&line_nodes);
        let proc = UserProc { name: self.proc_name.clone(), params: std::mem::take(&mut self.proc_params), body };
        self.interp.procs.define(proc);
        Status::None
    }

    fn handle_status(&mut self, host: &mut dyn Host, status: Status, pause_ctx: Option<&str>) -> Outcome {
        match status {
            Status::None | Status::Ok(Value::None) => Outcome::Continue,
            Status::Ok(v) => {
                host.write_line(
                    crate::error::RuntimeError::dont_know_what_to_do_with(&self.interp.memory, v)
                        .message()
                        .as_bytes(),
                );
                Outcome::Continue
            }
            Status::Output(_) => {
                host.write_line(crate::error::RuntimeError::new(ErrorKind::OnlyInProcedure).message().as_bytes());
                Outcome::Continue
            }
            Status::Error(e) => {
                host.write_line(e.message().as_bytes());
                Outcome::Continue
            }
            Status::Stop => {
                if pause_ctx.is_some() {
                    Outcome::Resume
                } else {
                    Outcome::Continue
                }
            }
            Status::Pause(name) => Outcome::EnterPause(name),
            Status::Throw(tag, _) => {
                let tag_str = self.interp.memory.word_str(tag).to_string();
                if tag_str.eq_ignore_ascii_case("toplevel") {
                    Outcome::UnwindToplevel
                } else {
                    host.write_line(format!("Can't find a catch for \"{tag_str}").as_bytes());
                    Outcome::Continue
                }
            }
            Status::Call(..) | Status::Goto(..) => Outcome::Continue,
        }
    }
}

/// Runs a blocking sub-REPL for the `pause` primitive (§4.9, §4.12).
///
/// Unlike `Repl`'s own `loop_body`, this is invoked directly from
/// `p_pause` while the paused procedure's frame and the Rust call
/// stack underneath it are still live — Rust's native stack plays the
/// role of the continuation the spec's `body_cursor`/`line_cursor`
/// frame fields would otherwise reconstruct. Returning `Status::None`
/// here lets `run_body_line`'s loop pick up with the *next* body line
/// exactly as if `pause` had been an ordinary no-op command.
pub(crate) fn run_pause_repl(interp: &mut Interpreter, host: &mut dyn Host, proc_name: &str) -> Status {
    let prompt = format!("{proc_name}> ");
    let mut mode = Mode::Top;
    let mut def_name = String::new();
    let mut def_params: Vec<String> = Vec::new();
    let mut def_lines: Vec<String> = Vec::new();
    let mut def_line_acc = LineAcc::default();
    let mut top_acc = LineAcc::default();

    loop {
        host.write(prompt.as_bytes());
        host.flush();

        let mut buf = Vec::new();
        let line = match host.read_line(&mut buf) {
            ReadLine::Eof => return unwind_to_toplevel(interp),
            ReadLine::Interrupted => {
                mode = Mode::Top;
                def_lines.clear();
                def_line_acc = LineAcc::default();
                top_acc = LineAcc::default();
                continue;
            }
            ReadLine::Bytes(_) => String::from_utf8_lossy(&buf).trim_end_matches(['\n', '\r']).to_string(),
        };

        match mode {
            Mode::Top => {
                let trimmed = line.trim();
                if trimmed.eq_ignore_ascii_case("co") || trimmed.eq_ignore_ascii_case("continue") {
                    return Status::None;
                }
                let trimmed_start = line.trim_start();
                let first_word = trimmed_start.split_whitespace().next().unwrap_or("");
                if first_word.eq_ignore_ascii_case("to") {
                    match parse_to_header(trimmed_start) {
                        Ok((name, params)) => {
                            if interp.is_primitive(&name) {
                                host.write_line(
                                    crate::error::RuntimeError::with_arg(ErrorKind::IsPrimitive, "to", name)
                                        .message()
                                        .as_bytes(),
                                );
                                continue;
                            }
                            if interp.procs.is_defined(&name) {
                                host.write_line(
                                    crate::error::RuntimeError::with_arg(ErrorKind::AlreadyDefined, "to", name.clone())
                                        .message()
                                        .as_bytes(),
                                );
                            }
                            def_name = name;
                            def_params = params;
                            def_lines.clear();
                            def_line_acc = LineAcc::default();
                            mode = Mode::CollectingProcedure;
                        }
                        Err(e) => {
                            host.write_line(e.message().as_bytes());
                        }
                    }
                } else if top_acc.push(&line) {
                    let joined = top_acc.take_joined();
                    let status = interp.eval_text(host, &joined);
                    if let Some(resolved) = dispatch_pause_line(interp, host, status) {
                        return resolved;
                    }
                } else {
                    mode = Mode::BracketContinuation;
                }
            }
            Mode::BracketContinuation => {
                if top_acc.push(&line) {
                    mode = Mode::Top;
                    let joined = top_acc.take_joined();
                    let status = interp.eval_text(host, &joined);
                    if let Some(resolved) = dispatch_pause_line(interp, host, status) {
                        return resolved;
                    }
                }
            }
            Mode::CollectingProcedure => {
                if def_line_acc.depth == 0 && line.trim().eq_ignore_ascii_case("end") {
                    mode = Mode::Top;
                    let memory = &mut interp.memory;
                    let mut line_nodes = Vec::with_capacity(def_lines.len());
                    let mut parse_err = None;
                    for l in &def_lines {
                        match parse_instruction_line(memory, l) {
                            Ok(n) => line_nodes.push(n),
                            Err(e) => {
                                parse_err = Some(e);
                                break;
                            }
                        }
                    }
                    match parse_err {
                        Some(e) => host.write_line(e.message().as_bytes()),
                        None => {
                            let body = interp.memory.cons_list(&line_nodes);
                            let proc = UserProc { name: def_name.clone(), params: std::mem::take(&mut def_params), body };
                            interp.procs.define(proc);
                        }
                    }
                } else if def_line_acc.push(&line) {
                    def_lines.push(def_line_acc.take_joined());
                }
            }
        }
    }
}

/// Interprets one evaluated unit's `Status` while inside a pause
/// sub-REPL. `None` means: keep reading more lines at this pause
/// level. `Some(status)` means: the paused procedure is done — the
/// status is handed back to `p_pause`'s caller as if it had been the
/// paused procedure's own result.
fn dispatch_pause_line(interp: &mut Interpreter, host: &mut dyn Host, status: Status) -> Option<Status> {
    match status {
        Status::None | Status::Ok(Value::None) => None,
        Status::Ok(v) => {
            host.write_line(
                crate::error::RuntimeError::dont_know_what_to_do_with(&interp.memory, v).message().as_bytes(),
            );
            None
        }
        Status::Error(e) => {
            host.write_line(e.message().as_bytes());
            None
        }
        // `stop` aborts the paused procedure, same as at any other level.
        Status::Stop => Some(Status::Stop),
        // `output` inside a pause prompt ends the paused procedure with
        // a value — the pause prompt is still lexically inside it.
        Status::Output(v) => Some(Status::Output(v)),
        Status::Pause(_) => None,
        // Any throw — including `throw "toplevel` — propagates up
        // through `p_pause`'s return value to whatever's driving the
        // outermost REPL, which is the only place that resolves a
        // "toplevel" tag into actually unwinding everything.
        Status::Throw(tag, value) => Some(Status::Throw(tag, value)),
        Status::Call(..) | Status::Goto(..) => None,
    }
}

fn unwind_to_toplevel(interp: &mut Interpreter) -> Status {
    let tag = interp.memory.atom_str("toplevel");
    Status::Throw(tag, None)
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

enum LoopSignal {
    Eof,
    Resume,
    UnwindToplevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{NullHost, ScriptedHost};

    fn feed_all(repl: &mut Repl, host: &mut dyn Host, lines: &[&str]) {
        for line in lines {
            if let Some(status) = repl.feed_line(host, line) {
                let _ = repl.handle_status(host, status, None);
            }
        }
    }

    #[test]
    fn defines_and_runs_a_procedure_across_lines() {
        let mut repl = Repl::new();
        let mut host = NullHost::default();
        feed_all(&mut repl, &mut host, &["to square :n", "output :n * :n", "end"]);
        assert!(repl.interpreter().procs.is_defined("square"));
        let status = repl.eval_joined(&mut host, "print square 5");
        assert!(matches!(status, Status::None));
        assert_eq!(host.output, b"25\n".to_vec());
    }

    #[test]
    fn bracket_continuation_joins_physical_lines() {
        let mut repl = Repl::new();
        let mut host = NullHost::default();
        feed_all(&mut repl, &mut host, &["repeat 2 [", "print \"hi", "]"]);
        assert_eq!(host.output, b"hi\nhi\n".to_vec());
    }

    #[test]
    fn redefining_a_primitive_name_is_rejected() {
        let mut repl = Repl::new();
        let mut host = NullHost::default();
        let status = repl.feed_line(&mut host, "to print :x").unwrap();
        assert!(matches!(status, Status::Error(e) if e.kind == ErrorKind::IsPrimitive));
    }

    #[test]
    fn throw_toplevel_unwinds_a_live_pause() {
        let mut repl = Repl::new();
        let mut setup_host = NullHost::default();
        feed_all(&mut repl, &mut setup_host, &["to f", "pause", "end"]);

        let mut host = ScriptedHost::new(["throw \"toplevel"]);
        let status = repl.eval_joined(&mut host, "f");
        assert!(matches!(repl.handle_status(&mut host, status, None), Outcome::UnwindToplevel));
    }

    #[test]
    fn co_resumes_the_paused_procedure_body() {
        let mut repl = Repl::new();
        let mut setup_host = NullHost::default();
        feed_all(
            &mut repl,
            &mut setup_host,
            &["to f", "print \"before", "pause", "print \"after", "end"],
        );

        let mut host = ScriptedHost::new(["co"]);
        let status = repl.eval_joined(&mut host, "f");
        assert!(matches!(status, Status::None));
        assert_eq!(host.output, b"before\nf> after\n".to_vec());
    }

    #[test]
    fn pause_prompt_is_prefixed_with_the_active_procedure_name() {
        let mut repl = Repl::new();
        let mut setup_host = NullHost::default();
        feed_all(&mut repl, &mut setup_host, &["to myproc", "pause", "end"]);

        let mut host = ScriptedHost::new(["co"]);
        repl.eval_joined(&mut host, "myproc");
        assert!(String::from_utf8_lossy(&host.output).starts_with("myproc> "));
    }

    #[test]
    fn output_at_a_pause_prompt_ends_the_paused_procedure_with_a_value() {
        let mut repl = Repl::new();
        let mut setup_host = NullHost::default();
        feed_all(&mut repl, &mut setup_host, &["to f", "pause", "end"]);

        let mut host = ScriptedHost::new(["output 42"]);
        let status = repl.eval_joined(&mut host, "print f");
        assert!(matches!(status, Status::None));
        assert!(String::from_utf8_lossy(&host.output).ends_with("42\n"));
    }
}
