//! The evaluator (C9, §4.9): a Pratt parser driving a tree walk, with
//! primitive dispatch, list-as-code execution, and a CPS bailout that
//! lets non-self tail calls run without growing the native stack.
//!
//! [`Interpreter`] is the single aggregate the design notes (§9) call
//! for: the memory arena, variable/property/procedure stores, the
//! frame stack, and the handful of small globals (tail-call slot lives
//! on [`crate::proc::Procedures`], repcount stack here) are all fields
//! on one struct passed by `&mut` reference, rather than hidden
//! statics.

pub mod primitives;

use crate::config::MAX_PROC_PARAMS;
use crate::error::{ErrorKind, RuntimeError};
use crate::frame::FrameStack;
use crate::host::Host;
use crate::lexer::Mode;
use crate::memory::{Memory, Node};
use crate::proc::{PendingCall, Procedures, UserProc};
use crate::props::Properties;
use crate::token::TokenKind;
use crate::token_source::TokenSource;
use crate::value::{node_to_value, Status, Value};
use crate::vars::Variables;
use primitives::PrimitiveRegistry;

pub struct Interpreter {
    pub memory: Memory,
    pub vars: Variables,
    pub props: Properties,
    pub procs: Procedures,
    pub frames: FrameStack,
    pub primitives: PrimitiveRegistry,
    /// `repcount`: stack of `repeat`/`forever` iteration counters, one
    /// per nesting level, queried by the `repcount` primitive.
    pub repcount: Vec<i32>,
    in_tail_position: bool,
    primitive_arg_depth: u32,
    /// `EVAL_USE_VM` (§9 open question, SPEC_FULL §C): when the `vm`
    /// feature is compiled in, try the bytecode accelerator for each
    /// body line before falling back to the tree walk. Toggled at
    /// runtime by the CLI's `--vm`/`--no-vm` flags.
    #[cfg(feature = "vm")]
    pub use_vm: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter {
            memory: Memory::default(),
            vars: Variables::new(),
            props: Properties::new(),
            procs: Procedures::new(),
            frames: FrameStack::new(),
            primitives: primitives::build_registry(),
            repcount: Vec::new(),
            in_tail_position: false,
            primitive_arg_depth: 0,
            #[cfg(feature = "vm")]
            use_vm: true,
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::default()
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.primitives.contains(name)
    }

    // ---- top-level entry points -----------------------------------------

    /// Lexes and evaluates one line of surface text at the REPL (§4.9,
    /// §4.12). Reports a top-level "don't know what to do with" error
    /// if the line produced an unconsumed value outside any list.
    pub fn eval_text(&mut self, host: &mut dyn Host, text: &str) -> Status {
        let mut source = TokenSource::from_text(text, Mode::Code);
        self.eval_instructions(host, &mut source, true)
    }

    /// Runs a stored list as code (§4.9's `run_list_with_tco`),
    /// installing a node-iterator token source over it.
    pub fn run_list_with_tco(&mut self, host: &mut dyn Host, list: Node, enable_tco: bool) -> Status {
        let mut source = TokenSource::from_list(list);
        self.eval_instructions(host, &mut source, enable_tco)
    }

    /// One body line of a procedure: tries the bytecode accelerator
    /// first when the `vm` feature is compiled in and enabled, falling
    /// back to the tree walk whenever the compiler declines the line
    /// (any construct outside its recognized subset, including every
    /// non-self tail call, which needs the tree walk's CPS bailout).
    fn run_body_line(&mut self, host: &mut dyn Host, line: Node, enable_tco: bool) -> Status {
        #[cfg(feature = "vm")]
        {
            if let Some(status) = self.try_vm(host, line) {
                return status;
            }
        }
        self.run_list_with_tco(host, line, enable_tco)
    }

    #[cfg(feature = "vm")]
    fn try_vm(&mut self, host: &mut dyn Host, line: Node) -> Option<Status> {
        if !self.use_vm {
            return None;
        }
        let chunk = crate::vm::compiler::compile(&self.memory, line, &self.primitives)?;
        let mut vm = crate::vm::Vm::new();
        Some(vm.run(self, host, &chunk))
    }

    fn eval_instructions(&mut self, host: &mut dyn Host, source: &mut TokenSource, enable_tco: bool) -> Status {
        loop {
            if source.at_end(&self.memory) {
                return Status::None;
            }
            let is_last = self.peek_is_last_instruction(&*source);
            self.in_tail_position = enable_tco && is_last;
            let status = self.eval_expr(host, source, 0);
            match status {
                Status::Ok(Value::None) | Status::None => continue,
                Status::Ok(v) => {
                    // A bare value outside any list-building context at
                    // the top of an instruction is unconsumed (§4.9).
                    return Status::Error(RuntimeError::dont_know_what_to_do_with(&self.memory, v));
                }
                other => return other,
            }
        }
    }

    /// Structural lookahead (§4.9): true if the upcoming instruction is
    /// the last one on this line. Runs the same grammar `skip_expr`
    /// walks over a cloned source, so it consumes no real tokens and
    /// calls into no primitive or procedure bodies — only their known
    /// arities (`default_args`/`param_count`) are needed to know how
    /// many sub-expressions to step over.
    fn peek_is_last_instruction(&mut self, source: &TokenSource) -> bool {
        let mut probe = source.clone();
        self.skip_expr(&mut probe, 0);
        probe.at_end(&self.memory)
    }

    /// Steps over one expression without evaluating it, for tail-
    /// position lookahead only.
    fn skip_expr(&mut self, source: &mut TokenSource, min_bp: u8) {
        self.skip_primary(source);
        loop {
            match source.peek(&self.memory).kind {
                TokenKind::Operator(ref op) if is_infix(op) => {
                    let bp = binding_power(op);
                    if bp < min_bp {
                        return;
                    }
                    source.next(&self.memory);
                    self.skip_expr(source, bp + 1);
                }
                _ => return,
            }
        }
    }

    fn skip_primary(&mut self, source: &mut TokenSource) {
        let tok = source.next(&self.memory);
        match tok.kind {
            TokenKind::LBracket => {
                if source.consume_sublist().is_none() {
                    let mut depth = 1;
                    while depth > 0 {
                        match source.next(&self.memory).kind {
                            TokenKind::LBracket => depth += 1,
                            TokenKind::RBracket => depth -= 1,
                            TokenKind::Eof => break,
                            _ => {}
                        }
                    }
                }
            }
            TokenKind::LParen => {
                if let TokenKind::Word(name) = source.peek(&self.memory).kind {
                    if self.primitives.contains(&name) {
                        source.next(&self.memory);
                        loop {
                            match source.peek(&self.memory).kind {
                                TokenKind::RParen => {
                                    source.next(&self.memory);
                                    return;
                                }
                                TokenKind::Eof => return,
                                _ => self.skip_expr(source, 0),
                            }
                        }
                    }
                }
                self.skip_expr(source, 0);
                if matches!(source.peek(&self.memory).kind, TokenKind::RParen) {
                    source.next(&self.memory);
                }
            }
            TokenKind::Operator(ref op) if op == "unary-" || op == "-" => {
                self.skip_expr(source, 30);
            }
            TokenKind::Word(name) => {
                if self.primitives.contains(&name) {
                    for _ in 0..self.primitives.default_args(&name) {
                        self.skip_expr(source, 0);
                    }
                } else if let Some(param_count) = self.procs.find(&name).map(|p| p.params.len()) {
                    for _ in 0..param_count {
                        self.skip_expr(source, 0);
                    }
                }
            }
            _ => {}
        }
    }

    // ---- Pratt parser ----------------------------------------------------

    fn eval_expr(&mut self, host: &mut dyn Host, source: &mut TokenSource, min_bp: u8) -> Status {
        let was_tail = self.in_tail_position;
        let mut lhs = match self.primary(host, source) {
            Status::Ok(v) => v,
            other => return other,
        };
        self.in_tail_position = false;

        loop {
            let op = match source.peek(&self.memory).kind {
                TokenKind::Operator(ref op) if is_infix(op) => op.clone(),
                _ => break,
            };
            let bp = binding_power(&op);
            if bp < min_bp {
                break;
            }
            source.next(&self.memory);
            let rhs = match self.eval_expr(host, source, bp + 1) {
                Status::Ok(v) => v,
                other => return other,
            };
            lhs = match self.apply_infix(&op, lhs, rhs) {
                Ok(v) => v,
                Err(e) => return Status::Error(e),
            };
        }
        self.in_tail_position = was_tail;
        Status::Ok(lhs)
    }

    fn apply_infix(&mut self, op: &str, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
        match op {
            "=" => Ok(bool_word(&mut self.memory, lhs.equals(&rhs, &self.memory))),
            "<" => {
                let a = require_number(&self.memory, op, lhs)?;
                let b = require_number(&self.memory, op, rhs)?;
                Ok(bool_word(&mut self.memory, a < b))
            }
            ">" => {
                let a = require_number(&self.memory, op, lhs)?;
                let b = require_number(&self.memory, op, rhs)?;
                Ok(bool_word(&mut self.memory, a > b))
            }
            "+" => {
                let a = require_number(&self.memory, op, lhs)?;
                let b = require_number(&self.memory, op, rhs)?;
                Ok(Value::Number(a + b))
            }
            "-" => {
                let a = require_number(&self.memory, op, lhs)?;
                let b = require_number(&self.memory, op, rhs)?;
                Ok(Value::Number(a - b))
            }
            "*" => {
                let a = require_number(&self.memory, op, lhs)?;
                let b = require_number(&self.memory, op, rhs)?;
                Ok(Value::Number(a * b))
            }
            "/" => {
                let a = require_number(&self.memory, op, lhs)?;
                let b = require_number(&self.memory, op, rhs)?;
                if b == 0.0 {
                    return Err(RuntimeError::new(ErrorKind::DivideByZero));
                }
                Ok(Value::Number(a / b))
            }
            _ => unreachable!("is_infix admitted an unknown operator"),
        }
    }

    fn primary(&mut self, host: &mut dyn Host, source: &mut TokenSource) -> Status {
        let tok = source.next(&self.memory);
        match tok.kind {
            TokenKind::Number(n) => Status::Ok(Value::Number(n)),
            TokenKind::QuotedWord(w) => Status::Ok(Value::Word(self.memory.atom_str(&w))),
            TokenKind::Colon(name) => match self.lookup_var(&name) {
                Some(v) => Status::Ok(v),
                None => Status::Error(RuntimeError::with_arg(ErrorKind::NoValue, "thing", name)),
            },
            TokenKind::LBracket => self.build_list_literal(source),
            TokenKind::LParen => self.paren_expr(host, source),
            TokenKind::Operator(op) if op == "unary-" || op == "-" => {
                let was_tail = self.in_tail_position;
                self.in_tail_position = false;
                let v = match self.eval_expr(host, source, 30) {
                    Status::Ok(v) => v,
                    other => return other,
                };
                self.in_tail_position = was_tail;
                match require_number(&self.memory, "minus", v) {
                    Ok(n) => Status::Ok(Value::Number(-n)),
                    Err(e) => Status::Error(e),
                }
            }
            TokenKind::Word(name) => self.dispatch_word(host, source, &name),
            TokenKind::Newline => self.primary(host, source),
            TokenKind::Eof | TokenKind::RBracket | TokenKind::RParen => {
                Status::Error(RuntimeError::new(ErrorKind::DontKnowHow))
            }
        }
    }

    fn build_list_literal(&mut self, source: &mut TokenSource) -> Status {
        if let Some(existing) = source.consume_sublist() {
            return Status::Ok(Value::List(existing));
        }
        let mut items = Vec::new();
        loop {
            let tok = source.peek(&self.memory);
            match tok.kind {
                TokenKind::RBracket => {
                    source.next(&self.memory);
                    break;
                }
                TokenKind::Eof => return Status::Error(RuntimeError::new(ErrorKind::BracketMismatch)),
                TokenKind::LBracket => {
                    source.next(&self.memory);
                    match self.build_list_literal(source) {
                        Status::Ok(Value::List(n)) => items.push(n),
                        other => return other,
                    }
                }
                TokenKind::Newline => {
                    source.next(&self.memory);
                    items.push(Node::NEWLINE);
                }
                _ => {
                    source.next(&self.memory);
                    items.push(literal_node(&mut self.memory, &tok.kind));
                }
            }
        }
        Status::Ok(Value::List(self.memory.cons_list(&items)))
    }

    fn paren_expr(&mut self, host: &mut dyn Host, source: &mut TokenSource) -> Status {
        let lookahead = source.peek(&self.memory);
        if let TokenKind::Word(name) = &lookahead.kind {
            if self.primitives.contains(name) {
                let name = name.clone();
                source.next(&self.memory);
                return self.call_variadic_primitive(host, source, &name);
            }
        }
        let was_tail = self.in_tail_position;
        self.in_tail_position = false;
        let v = match self.eval_expr(host, source, 0) {
            Status::Ok(v) => v,
            other => return other,
        };
        self.in_tail_position = was_tail;
        match source.next(&self.memory).kind {
            TokenKind::RParen => Status::Ok(v),
            _ => Status::Error(RuntimeError::new(ErrorKind::ParenMismatch)),
        }
    }

    fn call_variadic_primitive(&mut self, host: &mut dyn Host, source: &mut TokenSource, name: &str) -> Status {
        let mut args = Vec::new();
        loop {
            match source.peek(&self.memory).kind {
                TokenKind::RParen => {
                    source.next(&self.memory);
                    break;
                }
                TokenKind::Eof => return Status::Error(RuntimeError::new(ErrorKind::ParenMismatch)),
                _ => {}
            }
            self.primitive_arg_depth += 1;
            let was_tail = self.in_tail_position;
            self.in_tail_position = false;
            let arg = self.eval_expr(host, source, 0);
            self.in_tail_position = was_tail;
            self.primitive_arg_depth -= 1;
            match arg {
                Status::Ok(v) => args.push(v),
                other => return other,
            }
        }
        self.invoke_primitive(host, name, args)
    }

    fn dispatch_word(&mut self, host: &mut dyn Host, source: &mut TokenSource, name: &str) -> Status {
        if self.primitives.contains(name) {
            let default_args = self.primitives.default_args(name);
            let mut args = Vec::with_capacity(default_args);
            for _ in 0..default_args {
                self.primitive_arg_depth += 1;
                let was_tail = self.in_tail_position;
                self.in_tail_position = false;
                let arg = self.eval_expr(host, source, 0);
                self.in_tail_position = was_tail;
                self.primitive_arg_depth -= 1;
                match arg {
                    Status::Ok(v) => args.push(v),
                    Status::Error(mut e) => {
                        e.set_error_proc(name);
                        return Status::Error(e);
                    }
                    other => return other,
                }
            }
            return self.invoke_primitive(host, name, args);
        }

        let Some(proc) = self.procs.find(name).cloned() else {
            return Status::Error(RuntimeError::with_arg(ErrorKind::DontKnowHow, "run", name));
        };

        let mut args = Vec::with_capacity(proc.params.len());
        for _ in 0..proc.params.len() {
            let was_tail = self.in_tail_position;
            self.in_tail_position = false;
            let arg = self.eval_expr(host, source, 0);
            self.in_tail_position = was_tail;
            match arg {
                Status::Ok(v) => args.push(v),
                other => return other,
            }
        }

        let in_tail = self.in_tail_position;
        let is_self_recursive =
            self.frames.top().is_some_and(|f| f.proc_name.eq_ignore_ascii_case(&proc.name)) && in_tail;

        if is_self_recursive && self.frames.depth() > 0 {
            self.procs.set_pending_tail_call(proc, args);
            return Status::Stop;
        }

        if in_tail && self.primitive_arg_depth == 0 {
            return Status::Call(proc, args);
        }

        self.proc_call(host, &proc, args)
    }

    fn invoke_primitive(&mut self, host: &mut dyn Host, name: &str, args: Vec<Value>) -> Status {
        let Some(entry) = self.primitives.lookup(name) else {
            return Status::Error(RuntimeError::with_arg(ErrorKind::DontKnowHow, "run", name));
        };
        match (entry.func)(self, host, args) {
            Status::Error(mut e) => {
                e.set_error_proc(name);
                Status::Error(e)
            }
            other => other,
        }
    }

    fn lookup_var(&self, name: &str) -> Option<Value> {
        self.frames.find_binding_in_chain(name).or_else(|| self.vars.get(name))
    }

    // ---- procedure call algorithm (C8, §4.8) ------------------------------

    /// `proc_call`: push (or reuse) a frame, run the body line by
    /// line, and loop on self-recursive tail calls instead of
    /// recursing the Rust stack.
    pub fn proc_call(&mut self, host: &mut dyn Host, proc: &UserProc, args: Vec<Value>) -> Status {
        if proc.params.len() != args.len() || proc.params.len() > MAX_PROC_PARAMS {
            return Status::Error(RuntimeError::with_proc(ErrorKind::NotEnoughInputs, proc.name.clone()));
        }

        let mut current_proc = proc.clone();
        let mut current_args = args;

        loop {
            let bindings: Vec<(String, Value)> =
                current_proc.params.iter().cloned().zip(current_args.iter().copied()).collect();

            let reused = self.frames.depth() > 0
                && self.frames.reuse_top_for_tail_call(current_proc.name.clone(), bindings.clone()).is_ok();
            if !reused {
                if self.frames.push(current_proc.name.clone(), bindings).is_err() {
                    return Status::Error(RuntimeError::new(ErrorKind::OutOfSpace));
                }
            }

            let mut body_cursor = current_proc.body;
            let result = loop {
                if body_cursor.is_nil() {
                    break Status::None;
                }
                let line = self.memory.car(body_cursor);
                let rest = self.memory.cdr(body_cursor);
                let enable_tco = rest.is_nil();
                match self.run_body_line(host, line, enable_tco) {
                    Status::None => {
                        body_cursor = rest;
                        continue;
                    }
                    Status::Goto(label) => match find_label(&self.memory, current_proc.body, &label) {
                        Some(target) => {
                            body_cursor = target;
                            continue;
                        }
                        None => break Status::Error(RuntimeError::with_arg(ErrorKind::DontKnowHow, "go", label)),
                    },
                    other => break other,
                }
            };

            match result {
                Status::Stop if self.procs.has_pending_tail_call() => {
                    let PendingCall { proc: next_proc, args: next_args } =
                        self.procs.take_pending_tail_call().unwrap();
                    current_proc = next_proc;
                    current_args = next_args;
                    continue;
                }
                Status::Stop => {
                    self.frames.pop();
                    return Status::None;
                }
                Status::Output(v) => {
                    self.frames.pop();
                    return Status::Ok(v);
                }
                Status::None => {
                    self.frames.pop();
                    return Status::None;
                }
                Status::Call(next_proc, next_args) => {
                    match self.proc_call(host, &next_proc, next_args) {
                        Status::Error(e) => {
                            self.frames.pop();
                            return Status::Error(e);
                        }
                        Status::Ok(v) => {
                            self.frames.pop();
                            return Status::Ok(v);
                        }
                        _ => {
                            self.frames.pop();
                            return Status::None;
                        }
                    }
                }
                other @ (Status::Error(_) | Status::Throw(_, _) | Status::Pause(_)) => {
                    self.frames.pop();
                    return other;
                }
                Status::Ok(_) | Status::Goto(_) => {
                    self.frames.pop();
                    return Status::None;
                }
            }
        }
    }
}

fn find_label(memory: &Memory, mut body: Node, label: &str) -> Option<Node> {
    while !body.is_nil() {
        let line = memory.car(body);
        let first = memory.car(line);
        if let Some(Value::Word(w)) = node_to_value(first) {
            if memory.word_str(w).eq_ignore_ascii_case("label") {
                let second = memory.car(memory.cdr(line));
                if let Some(Value::Word(tag)) = node_to_value(second) {
                    if memory.word_str(tag).eq_ignore_ascii_case(label) {
                        return Some(body);
                    }
                }
            }
        }
        body = memory.cdr(body);
    }
    None
}

pub(crate) fn literal_node(memory: &mut Memory, kind: &TokenKind) -> Node {
    match kind {
        TokenKind::Word(w) => memory.atom_str(w),
        TokenKind::Number(n) => memory.atom_str(&crate::value::format_number(*n)),
        TokenKind::QuotedWord(w) => memory.atom_str(&format!("\"{w}")),
        TokenKind::Colon(w) => memory.atom_str(&format!(":{w}")),
        TokenKind::Operator(op) => memory.atom_str(op),
        TokenKind::LParen => memory.atom_str("("),
        TokenKind::RParen => memory.atom_str(")"),
        _ => Node::NIL,
    }
}

pub(crate) fn is_infix(op: &str) -> bool {
    matches!(op, "=" | "<" | ">" | "+" | "-" | "*" | "/")
}

pub(crate) fn binding_power(op: &str) -> u8 {
    match op {
        "=" | "<" | ">" => 10,
        "+" | "-" => 20,
        "*" | "/" => 30,
        _ => 0,
    }
}

pub fn require_number(memory: &Memory, proc: &str, v: Value) -> Result<f32, RuntimeError> {
    v.as_number().ok_or_else(|| RuntimeError::with_arg(ErrorKind::DoesntLikeInput, proc, v.to_display_string(memory)))
}

pub fn bool_word(memory: &mut Memory, b: bool) -> Value {
    Value::Word(memory.atom_str(if b { "true" } else { "false" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    #[test]
    fn arithmetic_precedence_matches_spec() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let result = interp.eval_text(&mut host, "print 3 + 4 * 2");
        assert!(matches!(result, Status::None));
        assert_eq!(host.output, b"11\n");
    }

    #[test]
    fn parens_override_precedence() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "print (3 + 4) * 2");
        assert_eq!(host.output, b"14\n");
    }

    #[test]
    fn minus_and_plus_negative_agree() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "make \"a 5 - 2");
        let a = interp.vars.get("a").unwrap();
        interp.eval_text(&mut host, "make \"b 5 + -2");
        let b = interp.vars.get("b").unwrap();
        assert_eq!(a.as_number(), b.as_number());
    }

    #[test]
    fn make_and_thing_round_trip() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "make \"x 10");
        interp.eval_text(&mut host, "print :x + :x");
        assert_eq!(host.output, b"20\n");
    }

    #[test]
    fn repeat_runs_body_n_times() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "repeat 3 [print \"hi]");
        assert_eq!(host.output, b"hi\nhi\nhi\n");
    }

    #[test]
    fn divide_by_zero_is_reported() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let result = interp.eval_text(&mut host, "print quotient 5 0");
        match result {
            Status::Error(e) => assert_eq!(e.message(), "Can't divide by zero"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn unbound_variable_is_no_value_error() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let result = interp.eval_text(&mut host, "print :nope");
        match result {
            Status::Error(e) => assert!(e.message().contains("has no value")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_word_is_dont_know_how() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let result = interp.eval_text(&mut host, "frobnicate 1");
        match result {
            Status::Error(e) => assert!(e.message().contains("don't know how")),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
